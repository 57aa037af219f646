//! Country lookup and great-circle distance.
//!
//! Lookup never fails: unmapped codes resolve to [`UNKNOWN`] at (0, 0).

use serde::Serialize;

/// Mean Earth radius used by [`distance_km`].
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Coarse geographic region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Region {
    Europe,
    NorthAmerica,
    SouthAmerica,
    Asia,
    Africa,
    Oceania,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub region: Region,
}

pub const UNKNOWN: CountryInfo = CountryInfo {
    code: "XX",
    name: "Unknown",
    latitude: 0.0,
    longitude: 0.0,
    region: Region::Unknown,
};

const fn c(
    code: &'static str,
    name: &'static str,
    latitude: f64,
    longitude: f64,
    region: Region,
) -> CountryInfo {
    CountryInfo {
        code,
        name,
        latitude,
        longitude,
        region,
    }
}

use Region::{Africa, Asia, Europe, NorthAmerica, Oceania, SouthAmerica};

/// Approximate geographic centre per ISO 3166-1 alpha-2 code.
static COUNTRIES: &[CountryInfo] = &[
    c("AD", "Andorra", 42.5, 1.5, Europe),
    c("AE", "United Arab Emirates", 24.0, 54.0, Asia),
    c("AR", "Argentina", -34.0, -64.0, SouthAmerica),
    c("AT", "Austria", 47.33, 13.33, Europe),
    c("AU", "Australia", -27.0, 133.0, Oceania),
    c("BE", "Belgium", 50.83, 4.0, Europe),
    c("BG", "Bulgaria", 43.0, 25.0, Europe),
    c("BR", "Brazil", -10.0, -55.0, SouthAmerica),
    c("BY", "Belarus", 53.0, 28.0, Europe),
    c("CA", "Canada", 60.0, -95.0, NorthAmerica),
    c("CH", "Switzerland", 47.0, 8.0, Europe),
    c("CL", "Chile", -30.0, -71.0, SouthAmerica),
    c("CN", "China", 35.0, 105.0, Asia),
    c("CO", "Colombia", 4.0, -72.0, SouthAmerica),
    c("CZ", "Czechia", 49.75, 15.5, Europe),
    c("DE", "Germany", 51.0, 9.0, Europe),
    c("DK", "Denmark", 56.0, 10.0, Europe),
    c("EE", "Estonia", 59.0, 26.0, Europe),
    c("EG", "Egypt", 27.0, 30.0, Africa),
    c("ES", "Spain", 40.0, -4.0, Europe),
    c("FI", "Finland", 64.0, 26.0, Europe),
    c("FR", "France", 46.0, 2.0, Europe),
    c("GB", "United Kingdom", 54.0, -2.0, Europe),
    c("GR", "Greece", 39.0, 22.0, Europe),
    c("HK", "Hong Kong", 22.25, 114.17, Asia),
    c("HR", "Croatia", 45.17, 15.5, Europe),
    c("HU", "Hungary", 47.0, 20.0, Europe),
    c("ID", "Indonesia", -5.0, 120.0, Asia),
    c("IE", "Ireland", 53.0, -8.0, Europe),
    c("IL", "Israel", 31.5, 34.75, Asia),
    c("IN", "India", 20.0, 77.0, Asia),
    c("IS", "Iceland", 65.0, -18.0, Europe),
    c("IT", "Italy", 42.83, 12.83, Europe),
    c("JP", "Japan", 36.0, 138.0, Asia),
    c("KE", "Kenya", 1.0, 38.0, Africa),
    c("KR", "South Korea", 37.0, 127.5, Asia),
    c("LT", "Lithuania", 56.0, 24.0, Europe),
    c("LU", "Luxembourg", 49.75, 6.17, Europe),
    c("LV", "Latvia", 57.0, 25.0, Europe),
    c("MA", "Morocco", 32.0, -5.0, Africa),
    c("MX", "Mexico", 23.0, -102.0, NorthAmerica),
    c("MY", "Malaysia", 2.5, 112.5, Asia),
    c("NG", "Nigeria", 10.0, 8.0, Africa),
    c("NL", "Netherlands", 52.5, 5.75, Europe),
    c("NO", "Norway", 62.0, 10.0, Europe),
    c("NZ", "New Zealand", -41.0, 174.0, Oceania),
    c("PE", "Peru", -10.0, -76.0, SouthAmerica),
    c("PH", "Philippines", 13.0, 122.0, Asia),
    c("PL", "Poland", 52.0, 20.0, Europe),
    c("PT", "Portugal", 39.5, -8.0, Europe),
    c("RO", "Romania", 46.0, 25.0, Europe),
    c("RS", "Serbia", 44.0, 21.0, Europe),
    c("RU", "Russia", 60.0, 100.0, Europe),
    c("SA", "Saudi Arabia", 25.0, 45.0, Asia),
    c("SE", "Sweden", 62.0, 15.0, Europe),
    c("SG", "Singapore", 1.37, 103.8, Asia),
    c("SI", "Slovenia", 46.12, 14.82, Europe),
    c("SK", "Slovakia", 48.67, 19.5, Europe),
    c("TH", "Thailand", 15.0, 100.0, Asia),
    c("TR", "Turkey", 39.0, 35.0, Asia),
    c("TW", "Taiwan", 23.5, 121.0, Asia),
    c("UA", "Ukraine", 49.0, 32.0, Europe),
    c("US", "United States", 38.0, -97.0, NorthAmerica),
    c("VN", "Vietnam", 16.0, 106.0, Asia),
    c("ZA", "South Africa", -29.0, 24.0, Africa),
];

/// Resolve an alpha-2 code, case-insensitively.
pub fn lookup(code: &str) -> &'static CountryInfo {
    let code = code.trim();
    COUNTRIES
        .iter()
        .find(|c| c.code.eq_ignore_ascii_case(code))
        .unwrap_or(&UNKNOWN)
}

/// Whether `code` maps to a real entry.
pub fn is_known(code: &str) -> bool {
    lookup(code).region != Region::Unknown
}

/// Haversine distance between two coordinates in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Distance between two countries' centres in kilometres.
pub fn distance_km(a: &CountryInfo, b: &CountryInfo) -> f64 {
    haversine_km(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Distance between two alpha-2 codes; unmapped codes use the sentinel.
pub fn distance_between(a: &str, b: &str) -> f64 {
    distance_km(lookup(a), lookup(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("de").name, "Germany");
        assert_eq!(lookup(" DE ").region, Region::Europe);
    }

    #[test]
    fn unmapped_resolves_to_sentinel() {
        let info = lookup("QQ");
        assert_eq!(info.name, "Unknown");
        assert!(info.latitude.abs() < f64::EPSILON && info.longitude.abs() < f64::EPSILON);
        assert_eq!(lookup("").region, Region::Unknown);
        assert!(!is_known("QQ"));
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert!(distance_between("US", "US").abs() < 1e-9);
        assert!(distance_between("QQ", "ZZ").abs() < 1e-9);
    }

    #[test]
    fn distance_is_symmetric() {
        for (a, b) in [("DE", "US"), ("JP", "BR"), ("NZ", "IS"), ("QQ", "FR")] {
            let diff = distance_between(a, b) - distance_between(b, a);
            assert!(diff.abs() < 1e-9, "{a}/{b}");
        }
    }

    #[test]
    fn known_distance_is_plausible() {
        // Germany to France centres are roughly 690 km apart.
        let d = distance_between("DE", "FR");
        assert!((600.0..800.0).contains(&d), "got {d}");
    }

    #[test]
    fn antipodes_are_half_circumference() {
        let d = haversine_km(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn codes_are_unique_uppercase_pairs() {
        let mut codes: Vec<_> = COUNTRIES.iter().map(|c| c.code).collect();
        assert!(codes.iter().all(|c| c.len() == 2 && c.chars().all(|ch| ch.is_ascii_uppercase())));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), COUNTRIES.len());
    }
}
