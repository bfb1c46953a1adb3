//! Verification helpers for apply-engine tests
//!
//! Assertions over the ordered list of captured store calls

use crate::recording_store::StoreCall;
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Expected a call matching '{expected}', captured: {captured:?}")]
    CallNotFound {
        expected: String,
        captured: Vec<String>,
    },

    #[error("Unexpected call matching '{unexpected}'")]
    UnexpectedCall { unexpected: String },

    #[error("Expected '{first}' before '{second}', captured: {captured:?}")]
    OrderViolation {
        first: String,
        second: String,
        captured: Vec<String>,
    },

    #[error("Expected {expected} calls matching '{pattern}', found {actual}")]
    CallCountMismatch {
        pattern: String,
        expected: usize,
        actual: usize,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Operation sequence verifier
pub struct OpVerifier {
    labels: Vec<String>,
}

impl OpVerifier {
    /// Create a verifier over captured calls
    pub fn new(calls: &[StoreCall]) -> Self {
        Self {
            labels: calls.iter().map(StoreCall::label).collect(),
        }
    }

    /// Index of the first call whose label contains `pattern`
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.labels.iter().position(|l| l.contains(pattern))
    }

    /// Verify that a matching call was made
    pub fn assert_called(&self, pattern: &str) -> VerifyResult<usize> {
        self.position(pattern)
            .ok_or_else(|| VerificationError::CallNotFound {
                expected: pattern.to_string(),
                captured: self.labels.clone(),
            })
    }

    /// Verify that no matching call was made
    pub fn assert_not_called(&self, pattern: &str) -> VerifyResult<()> {
        match self.position(pattern) {
            Some(_) => Err(VerificationError::UnexpectedCall {
                unexpected: pattern.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Verify that the first call matching `first` precedes the first matching `second`
    pub fn assert_before(&self, first: &str, second: &str) -> VerifyResult<()> {
        let a = self.assert_called(first)?;
        let b = self.assert_called(second)?;
        if a < b {
            Ok(())
        } else {
            Err(VerificationError::OrderViolation {
                first: first.to_string(),
                second: second.to_string(),
                captured: self.labels.clone(),
            })
        }
    }

    /// Verify the number of matching calls
    pub fn assert_count(&self, pattern: &str, expected: usize) -> VerifyResult<()> {
        let actual = self.labels.iter().filter(|l| l.contains(pattern)).count();
        if actual == expected {
            Ok(())
        } else {
            Err(VerificationError::CallCountMismatch {
                pattern: pattern.to_string(),
                expected,
                actual,
            })
        }
    }

    /// Captured labels
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}
