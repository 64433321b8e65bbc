//! Location lookup stand-in. Labels are hashed into coordinates; nothing here
//! talks to a geocoder and the output has no geographic meaning.

use serde::{Deserialize, Serialize};

pub const DEFAULT_LATITUDE: f64 = 40.7128;
pub const DEFAULT_LONGITUDE: f64 = -74.0060;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self {
            latitude: DEFAULT_LATITUDE,
            longitude: DEFAULT_LONGITUDE,
        }
    }
}

pub fn resolve_location(label: &str) -> GeoPoint {
    let normalized = label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    if normalized.is_empty() {
        return GeoPoint::default();
    }

    let hash = fnv1a(normalized.as_bytes());
    let lat_unit = (hash & 0xFFFF_FFFF) as f64 / 4_294_967_296.0;
    let lon_unit = (hash >> 32) as f64 / 4_294_967_296.0;

    GeoPoint {
        latitude: -60.0 + lat_unit * 130.0,
        longitude: -180.0 + lon_unit * 360.0,
    }
}

pub(crate) fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_label_uses_onboarding_default() {
        assert_eq!(resolve_location("   "), GeoPoint::default());
    }

    #[test]
    fn same_label_same_point_within_bounds() {
        let first = resolve_location("Lisbon,  Portugal");
        let second = resolve_location("lisbon, portugal");
        assert_eq!(first, second);
        assert!((-60.0..70.0).contains(&first.latitude));
        assert!((-180.0..180.0).contains(&first.longitude));
    }
}
