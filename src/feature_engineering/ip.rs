//! IP address to numeric feature mapping

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// How the `ip_numeric` feature of a record was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpStatus {
    /// Address parsed; feature is `ln(1 + address)`
    Parsed,
    /// Null or empty; feature is the 0.0 sentinel
    Missing,
    /// Not an IPv4/IPv6 address; feature is the 0.0 sentinel
    Invalid,
}

/// Integer value of an address: 32-bit for IPv4, 128-bit for IPv6
pub fn ip_to_int(raw: &str) -> Option<u128> {
    match raw.parse::<IpAddr>().ok()? {
        IpAddr::V4(v4) => Some(u128::from(u32::from(v4))),
        IpAddr::V6(v6) => Some(u128::from(v6)),
    }
}

/// Log-scaled numeric value of an address.
///
/// Never fails: null, empty and unparseable input map to 0.0.
pub fn ip_to_numeric(raw: Option<&str>) -> (f64, IpStatus) {
    match raw {
        None | Some("") => (0.0, IpStatus::Missing),
        Some(s) => match ip_to_int(s) {
            Some(v) => ((v as f64).ln_1p(), IpStatus::Parsed),
            None => (0.0, IpStatus::Invalid),
        },
    }
}
