//! Deterministic assignment of participants to experimental cases.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::StudyError;
use crate::core::AppConfig;

/// One arm of the protocol, labelled `1..=K`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Case(u32);

impl Case {
    pub fn new(label: u32) -> Self {
        Self(label)
    }

    pub fn label(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Case {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "case{}", self.0)
    }
}

/// Maps participant ids onto `K` cases with `(id mod K) + 1`.
#[derive(Clone, Debug)]
pub struct CaseAssigner {
    case_count: u32,
    delay_cases: Vec<u32>,
}

impl CaseAssigner {
    pub fn new(case_count: u32, delay_cases: Vec<u32>) -> Self {
        Self {
            case_count: case_count.max(1),
            delay_cases,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.case_count, config.delay_cases.clone())
    }

    /// Ids of any length are accepted. The remainder is folded one digit
    /// at a time so nothing is limited to the width of a machine integer.
    pub fn assign(&self, participant_id: &str) -> Result<Case, StudyError> {
        let invalid = || StudyError::InvalidIdentifier(participant_id.to_string());
        let trimmed = participant_id.trim();
        let (negative, digits) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let k = u64::from(self.case_count);
        let rem = digits
            .bytes()
            .fold(0u64, |rem, b| (rem * 10 + u64::from(b - b'0')) % k);
        // Euclidean remainder keeps negative ids inside 1..=K
        let rem = if negative { (k - rem) % k } else { rem };
        let label = u32::try_from(rem + 1).map_err(|_| invalid())?;
        Ok(Case(label))
    }

    pub fn is_delay_enabled(&self, case: Case) -> bool {
        self.delay_cases.contains(&case.0)
    }
}

impl Default for CaseAssigner {
    fn default() -> Self {
        Self::new(4, vec![3, 4])
    }
}
