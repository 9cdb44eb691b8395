//! Login-attempt records and the collaborators that supply them

pub mod loader;
pub mod record;
pub mod source;

pub use loader::{RawLoginAttempt, RecordFormat, RecordLoader};
pub use record::{parse_timestamp, LoginAttemptRecord};
pub use source::{InMemorySource, RecordSource, TrustPolicy, DEFAULT_EXCLUDED_ASNS};
