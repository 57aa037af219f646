//! Translation of hub OTA reports into tracker transitions and owner events.

use std::sync::Arc;

use hubwire_proto::{BootType, OtaUpdateTask, SemVer, hub_message};
use tracing::{debug, info, warn};

use super::HubIdentity;
use crate::notifications::{HubEvent, OwnerNotifier};
use crate::ota::OtaTracker;

/// Message recorded when a normal boot leaves an update open.
pub const IMPLICIT_ROLLBACK_MESSAGE: &str = "unfinished update, implicit rollback";
pub const EXPLICIT_ROLLBACK_MESSAGE: &str = "hub rolled back to previous firmware";

/// OTA-related report from a hub.
#[derive(Debug, Clone, PartialEq)]
pub enum OtaReport {
    Started {
        update_id: i32,
        version: Option<semver::Version>,
    },
    Progress {
        update_id: i32,
        task: OtaUpdateTask,
        progress: f32,
    },
    Failed {
        update_id: i32,
        fatal: bool,
        message: String,
    },
    Boot {
        boot_type: BootType,
        update_id: i32,
        version: Option<semver::Version>,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OtaReportError {
    #[error("unknown enum value {value} for {field}")]
    UnknownEnum { field: &'static str, value: i32 },
}

fn version(wire: Option<&SemVer>) -> Option<semver::Version> {
    wire.and_then(|v| semver::Version::try_from(v).ok())
}

impl OtaReport {
    /// Extract an OTA report from a hub payload. `Ok(None)` for non-OTA payloads.
    pub fn from_payload(payload: &hub_message::Payload) -> Result<Option<Self>, OtaReportError> {
        use hub_message::Payload;

        let report = match payload {
            Payload::OtaUpdateStarted(m) => Self::Started {
                update_id: m.update_id,
                version: version(m.version.as_ref()),
            },
            Payload::OtaUpdateProgress(m) => Self::Progress {
                update_id: m.update_id,
                task: OtaUpdateTask::try_from(m.task).map_err(|_| OtaReportError::UnknownEnum {
                    field: "task",
                    value: m.task,
                })?,
                progress: m.progress.clamp(0.0, 1.0),
            },
            Payload::OtaUpdateFailed(m) => Self::Failed {
                update_id: m.update_id,
                fatal: m.fatal,
                message: m.message.clone(),
            },
            Payload::BootStatus(m) => Self::Boot {
                boot_type: BootType::try_from(m.boot_type).map_err(|_| {
                    OtaReportError::UnknownEnum {
                        field: "boot_type",
                        value: m.boot_type,
                    }
                })?,
                update_id: m.ota_update_id,
                version: version(m.firmware_version.as_ref()),
            },
            Payload::KeepAlive(_) | Payload::Pong(_) => return Ok(None),
        };
        Ok(Some(report))
    }
}

/// Applies OTA reports. Downstream failures are logged, never propagated,
/// so a broken tracker cannot stall the hub connection.
#[derive(Clone)]
pub struct OtaDispatcher {
    tracker: Arc<dyn OtaTracker>,
    notifier: Arc<dyn OwnerNotifier>,
}

impl OtaDispatcher {
    pub fn new(tracker: Arc<dyn OtaTracker>, notifier: Arc<dyn OwnerNotifier>) -> Self {
        Self { tracker, notifier }
    }

    pub async fn dispatch(&self, hub: &HubIdentity, report: OtaReport) {
        let hub_id = hub.hub_id.as_str();
        match report {
            OtaReport::Started { update_id, version } => {
                info!(hub_id, update_id, version = ?version.as_ref().map(ToString::to_string), "OTA update started");
                if let Err(e) = self.tracker.started(hub_id, update_id, version.as_ref()).await {
                    warn!(hub_id, update_id, error = %e, "Failed to record OTA start");
                }
                self.notify(
                    hub,
                    HubEvent::OtaStarted {
                        hub_id: hub_id.to_string(),
                        update_id,
                        version,
                    },
                )
                .await;
            }
            OtaReport::Progress {
                update_id,
                task,
                progress,
            } => {
                debug!(hub_id, update_id, task = task.as_str(), progress, "OTA update progress");
                match self.tracker.progress(hub_id, update_id).await {
                    Ok(true) => {}
                    Ok(false) => debug!(hub_id, update_id, "Progress for unknown or closed OTA run"),
                    Err(e) => warn!(hub_id, update_id, error = %e, "Failed to record OTA progress"),
                }
                self.notify(
                    hub,
                    HubEvent::OtaProgress {
                        hub_id: hub_id.to_string(),
                        update_id,
                        task: task.as_str().to_string(),
                        progress,
                    },
                )
                .await;
            }
            OtaReport::Failed {
                update_id,
                fatal,
                message,
            } => {
                warn!(hub_id, update_id, fatal, message = %message, "OTA update failed");
                if let Err(e) = self.tracker.failed(hub_id, update_id, &message).await {
                    warn!(hub_id, update_id, error = %e, "Failed to record OTA failure");
                }
                self.notify(
                    hub,
                    HubEvent::OtaFailed {
                        hub_id: hub_id.to_string(),
                        update_id,
                        fatal,
                        message,
                    },
                )
                .await;
            }
            OtaReport::Boot {
                boot_type,
                update_id,
                version,
            } => self.boot(hub, boot_type, update_id, version).await,
        }
    }

    async fn boot(
        &self,
        hub: &HubIdentity,
        boot_type: BootType,
        update_id: i32,
        version: Option<semver::Version>,
    ) {
        let hub_id = hub.hub_id.as_str();
        match boot_type {
            BootType::NewFirmware => {
                info!(hub_id, update_id, "Hub booted into new firmware");
                if let Err(e) = self.tracker.finished(hub_id, update_id).await {
                    warn!(hub_id, update_id, error = %e, "Failed to record OTA success");
                }
                self.notify(
                    hub,
                    HubEvent::OtaSucceeded {
                        hub_id: hub_id.to_string(),
                        update_id,
                        version,
                    },
                )
                .await;
            }
            BootType::Rollback => {
                warn!(hub_id, update_id, "Hub rolled back firmware");
                self.rollback(hub, update_id, EXPLICIT_ROLLBACK_MESSAGE).await;
            }
            BootType::Normal => {
                if update_id == 0 {
                    return;
                }
                match self.tracker.is_unfinished(hub_id, update_id).await {
                    Ok(true) => {
                        warn!(hub_id, update_id, "Normal boot with an open OTA run");
                        self.rollback(hub, update_id, IMPLICIT_ROLLBACK_MESSAGE).await;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(hub_id, update_id, error = %e, "Failed to look up OTA run on boot");
                    }
                }
            }
        }
    }

    async fn rollback(&self, hub: &HubIdentity, update_id: i32, message: &str) {
        let hub_id = hub.hub_id.as_str();
        match self.tracker.failed(hub_id, update_id, message).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(hub_id, update_id, "Rollback for unknown or closed OTA run");
                return;
            }
            Err(e) => {
                warn!(hub_id, update_id, error = %e, "Failed to record OTA rollback");
                return;
            }
        }
        self.notify(
            hub,
            HubEvent::OtaRollback {
                hub_id: hub_id.to_string(),
                update_id,
                message: message.to_string(),
            },
        )
        .await;
    }

    async fn notify(&self, hub: &HubIdentity, event: HubEvent) {
        if let Err(e) = self.notifier.notify(&hub.owner_id, &event).await {
            warn!(hub_id = %hub.hub_id, error = %e, "Failed to notify hub owner");
        }
    }
}
