//! Login-attempt record type

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One login attempt as stored by the authentication service.
///
/// Records are treated as immutable input rows; every optional field may be
/// absent and the feature engineer substitutes sentinels for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginAttemptRecord {
    /// Opaque identifier
    pub id: String,
    /// User the attempt was made for, if it resolved to one
    pub user_id: Option<String>,
    /// Whether the attempt succeeded
    pub success: bool,
    /// Textual IPv4/IPv6 address
    pub ip_address: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    /// Autonomous system, e.g. `AS8866 Vivacom`
    pub asn: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Timestamp in the timezone it was stored with
    pub created_at: DateTime<FixedOffset>,
}

impl LoginAttemptRecord {
    /// Create a record with every optional field empty
    pub fn new(id: impl Into<String>, created_at: DateTime<FixedOffset>) -> Self {
        Self {
            id: id.into(),
            user_id: None,
            success: false,
            ip_address: None,
            country: None,
            city: None,
            asn: None,
            latitude: None,
            longitude: None,
            created_at,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Set country, city and ASN together
    pub fn with_location(
        mut self,
        country: impl Into<String>,
        city: impl Into<String>,
        asn: impl Into<String>,
    ) -> Self {
        self.country = Some(country.into());
        self.city = Some(city.into());
        self.asn = Some(asn.into());
        self
    }

    pub fn with_asn(mut self, asn: impl Into<String>) -> Self {
        self.asn = Some(asn.into());
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339, the Postgres text rendering
/// (`2024-05-01 10:00:00.123+02` or `+02:00`), and naive date-times, which
/// are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(ts) = DateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    None
}

/// Substitute for timestamps that cannot be parsed
pub fn epoch() -> DateTime<FixedOffset> {
    DateTime::<Utc>::UNIX_EPOCH.fixed_offset()
}
