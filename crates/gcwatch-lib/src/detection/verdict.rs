//! Detection results

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome class of a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// No overflow, everything OK
    Ok,
    /// Memory usage is heading toward exhaustion
    Overflow,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::Overflow => write!(f, "OVERFLOW"),
        }
    }
}

/// Whether (and why, or why not) an overflow was detected
///
/// A verdict is always a valid result. The reason is a free-text
/// diagnostic and is not meant to be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    status: Status,
    reason: String,
}

impl Verdict {
    pub fn new(status: Status, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    pub fn ok(reason: impl Into<String>) -> Self {
        Self::new(Status::Ok, reason)
    }

    pub fn overflow(reason: impl Into<String>) -> Self {
        Self::new(Status::Overflow, reason)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn is_overflow(&self) -> bool {
        self.status == Status::Overflow
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_json_shape() {
        let json = serde_json::to_value(Verdict::overflow("too full")).unwrap();
        assert_eq!(json["status"], "OVERFLOW");
        assert_eq!(json["reason"], "too full");

        let json = serde_json::to_value(Verdict::ok("fine")).unwrap();
        assert_eq!(json["status"], "OK");
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::ok("fine").to_string(), "OK: fine");
        assert!(!Verdict::ok("fine").is_overflow());
        assert!(Verdict::overflow("x").is_overflow());
    }
}
