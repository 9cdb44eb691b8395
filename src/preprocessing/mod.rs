//! Feature preprocessing
//!
//! Login-attempt features are heavy-tailed (IP-derived and frequency-derived
//! columns especially), so scaling uses the median and interquartile range
//! rather than mean and standard deviation.

mod scaler;

pub use scaler::{ColumnStats, FittedScaler, RobustScaler};
