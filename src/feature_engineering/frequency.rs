//! Normalized frequency encoding of categorical columns

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category -> count / max count, computed over one dataset.
///
/// The most frequent category maps to 1.0; absent or unseen categories map
/// to 0.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyTable {
    frequencies: HashMap<String, f64>,
}

impl FrequencyTable {
    /// Count every present value. `None` values are not counted.
    pub fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for value in values.into_iter().flatten() {
            *counts.entry(value).or_insert(0) += 1;
        }

        let max = counts.values().copied().max().unwrap_or(0);
        if max == 0 {
            return Self::default();
        }

        let frequencies = counts
            .into_iter()
            .map(|(category, count)| (category.to_string(), count as f64 / max as f64))
            .collect();
        Self { frequencies }
    }

    /// Normalized frequency of `value`
    pub fn encode(&self, value: Option<&str>) -> f64 {
        value
            .and_then(|v| self.frequencies.get(v))
            .copied()
            .unwrap_or(0.0)
    }

    /// Number of distinct categories
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}
