//! Control permission evaluation for shared shockers.
//!
//! Owners are unrestricted. Users a shocker has been shared with carry a
//! [`SharePermissions`] record deciding which control kinds they may send.

use serde::{Deserialize, Serialize};

/// Kind of a control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlType {
    Stop,
    Shock,
    Vibrate,
    Sound,
}

/// Permission bits of one share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SharePermissions {
    pub shock: bool,
    pub vibrate: bool,
    pub sound: bool,
    /// Required in addition to the kind bit for live control.
    pub live: bool,
}

impl SharePermissions {
    /// Every bit set.
    pub const fn all() -> Self {
        Self {
            shock: true,
            vibrate: true,
            sound: true,
            live: true,
        }
    }
}

/// Decide whether a command of `control` may be sent.
///
/// `None` is the unrestricted case. A stop is allowed when any kind bit is
/// set. Live commands other than stop additionally need the live bit.
pub fn is_allowed(control: ControlType, is_live: bool, perms: Option<&SharePermissions>) -> bool {
    let Some(perms) = perms else {
        return true;
    };
    if is_live && control != ControlType::Stop && !perms.live {
        return false;
    }
    match control {
        ControlType::Stop => perms.shock || perms.vibrate || perms.sound,
        ControlType::Shock => perms.shock,
        ControlType::Vibrate => perms.vibrate,
        ControlType::Sound => perms.sound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOUND_ONLY: SharePermissions = SharePermissions {
        shock: false,
        vibrate: false,
        sound: true,
        live: false,
    };

    #[test]
    fn stop_needs_any_kind_bit() {
        assert!(is_allowed(ControlType::Stop, false, Some(&SOUND_ONLY)));
        assert!(!is_allowed(
            ControlType::Stop,
            false,
            Some(&SharePermissions::default())
        ));
    }

    #[test]
    fn live_requires_live_bit() {
        let perms = SharePermissions {
            shock: true,
            ..SharePermissions::default()
        };
        assert!(!is_allowed(ControlType::Shock, true, Some(&perms)));
        assert!(is_allowed(ControlType::Shock, false, Some(&perms)));
        assert!(is_allowed(
            ControlType::Shock,
            true,
            Some(&SharePermissions::all())
        ));
    }

    #[test]
    fn live_stop_skips_live_bit() {
        assert!(is_allowed(ControlType::Stop, true, Some(&SOUND_ONLY)));
    }

    #[test]
    fn specific_bits_decide_kinds() {
        assert!(!is_allowed(ControlType::Shock, false, Some(&SOUND_ONLY)));
        assert!(!is_allowed(ControlType::Vibrate, false, Some(&SOUND_ONLY)));
        assert!(is_allowed(ControlType::Sound, false, Some(&SOUND_ONLY)));
    }

    #[test]
    fn no_record_means_unrestricted() {
        for control in [
            ControlType::Stop,
            ControlType::Shock,
            ControlType::Vibrate,
            ControlType::Sound,
        ] {
            assert!(is_allowed(control, true, None));
            assert!(is_allowed(control, false, None));
        }
    }
}
