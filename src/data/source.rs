//! Record sources: where the full and trusted datasets come from

use crate::data::loader::RecordLoader;
use crate::data::record::LoginAttemptRecord;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Hosting, VPN and Tor-exit networks excluded from the trusted set by default
pub const DEFAULT_EXCLUDED_ASNS: [&str; 11] = [
    "AS9009 M247",
    "AS16276 OVH",
    "AS14061 DigitalOcean",
    "AS138915 Cloud9",
    "AS60068 Datacamp",
    "AS202425 1984",
    "AS50613 Arktur",
    "AS13335 Cloudflare",
    "AS45102 Alibaba",
    "AS200130 Tor-Exit",
    "AS56630 Tor-Exit",
];

/// Decides which records are trusted enough to train on.
///
/// A record is trusted iff its ASN is present and not excluded. Records
/// without an ASN are never trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustPolicy {
    pub excluded_asns: BTreeSet<String>,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            excluded_asns: DEFAULT_EXCLUDED_ASNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TrustPolicy {
    /// Policy that excludes nothing except records without an ASN
    pub fn empty() -> Self {
        Self {
            excluded_asns: BTreeSet::new(),
        }
    }

    /// Add an excluded ASN
    pub fn exclude(mut self, asn: impl Into<String>) -> Self {
        self.excluded_asns.insert(asn.into());
        self
    }

    pub fn is_trusted(&self, record: &LoginAttemptRecord) -> bool {
        record
            .asn
            .as_ref()
            .is_some_and(|asn| !self.excluded_asns.contains(asn))
    }

    /// Trusted subset, preserving order
    pub fn filter(&self, records: &[LoginAttemptRecord]) -> Vec<LoginAttemptRecord> {
        records.iter().filter(|r| self.is_trusted(r)).cloned().collect()
    }
}

/// Supplier of the two datasets the scoring pipeline consumes.
///
/// Both sequences are ordered by `created_at` ascending.
pub trait RecordSource {
    /// Every login attempt
    fn all_records(&self) -> Result<Vec<LoginAttemptRecord>>;

    /// Login attempts trusted enough to train on
    fn trusted_records(&self) -> Result<Vec<LoginAttemptRecord>>;
}

/// Source backed by records held in memory
#[derive(Debug, Clone)]
pub struct InMemorySource {
    records: Vec<LoginAttemptRecord>,
    trusted: Option<Vec<LoginAttemptRecord>>,
    policy: TrustPolicy,
}

impl InMemorySource {
    /// Wrap records; the trusted set is derived with the default policy
    pub fn new(mut records: Vec<LoginAttemptRecord>) -> Self {
        sort_by_time(&mut records);
        Self {
            records,
            trusted: None,
            policy: TrustPolicy::default(),
        }
    }

    /// Load records from a file with [`RecordLoader::load_auto`]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(RecordLoader::new().load_auto(path)?))
    }

    pub fn with_policy(mut self, policy: TrustPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use an explicit trusted set instead of deriving one from the policy
    pub fn with_trusted(mut self, mut trusted: Vec<LoginAttemptRecord>) -> Self {
        sort_by_time(&mut trusted);
        self.trusted = Some(trusted);
        self
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }
}

impl RecordSource for InMemorySource {
    fn all_records(&self) -> Result<Vec<LoginAttemptRecord>> {
        Ok(self.records.clone())
    }

    fn trusted_records(&self) -> Result<Vec<LoginAttemptRecord>> {
        Ok(match &self.trusted {
            Some(trusted) => trusted.clone(),
            None => self.policy.filter(&self.records),
        })
    }
}

fn sort_by_time(records: &mut [LoginAttemptRecord]) {
    records.sort_by_key(|r| r.created_at);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::parse_timestamp;

    fn record(id: &str, ts: &str, asn: Option<&str>) -> LoginAttemptRecord {
        let mut r = LoginAttemptRecord::new(id, parse_timestamp(ts).unwrap());
        r.asn = asn.map(|s| s.to_string());
        r
    }

    #[test]
    fn test_policy_excludes_hosting_and_missing_asn() {
        let policy = TrustPolicy::default();
        assert!(policy.is_trusted(&record("1", "2024-01-01T00:00:00Z", Some("AS8866 Vivacom"))));
        assert!(!policy.is_trusted(&record("2", "2024-01-01T00:00:00Z", Some("AS200130 Tor-Exit"))));
        assert!(!policy.is_trusted(&record("3", "2024-01-01T00:00:00Z", None)));
    }

    #[test]
    fn test_source_orders_by_time() {
        let source = InMemorySource::new(vec![
            record("late", "2024-01-02T00:00:00Z", Some("AS1 A")),
            record("early", "2024-01-01T00:00:00Z", Some("AS16276 OVH")),
        ]);
        let all = source.all_records().unwrap();
        assert_eq!(all[0].id, "early");
        let trusted = source.trusted_records().unwrap();
        assert_eq!(trusted.len(), 1);
        assert_eq!(trusted[0].id, "late");
    }

    #[test]
    fn test_explicit_trusted_set() {
        let source = InMemorySource::new(vec![record("a", "2024-01-01T00:00:00Z", None)])
            .with_trusted(vec![]);
        assert!(source.trusted_records().unwrap().is_empty());
        assert_eq!(source.all_records().unwrap().len(), 1);
    }

    #[test]
    fn test_custom_policy() {
        let policy = TrustPolicy::empty().exclude("AS64500 Example");
        assert_eq!(policy.excluded_asns.len(), 1);

        let base = parse_timestamp("2024-01-01T00:00:00Z").unwrap();
        let hosting = LoginAttemptRecord::new("a", base).with_asn("AS16276 OVH");
        let excluded = LoginAttemptRecord::new("b", base).with_asn("AS64500 Example");
        let unknown = LoginAttemptRecord::new("c", base);
        assert!(policy.is_trusted(&hosting));
        assert!(!policy.is_trusted(&excluded));
        assert!(!policy.is_trusted(&unknown));

        let source = InMemorySource::new(vec![hosting, excluded, unknown]).with_policy(policy);
        let trusted = source.trusted_records().unwrap();
        assert_eq!(trusted.len(), 1);
        assert_eq!(trusted[0].id, "a");
        assert_eq!(source.policy().excluded_asns.len(), 1);
    }
}
