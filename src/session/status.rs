//! OPC UA status codes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity bits of a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Good,
    Uncertain,
    Bad,
}

/// A 32-bit status word. The top two bits carry the severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StatusCode(pub u32);

const NAMES: &[(u32, &str)] = &[
    (0x0000_0000, "Good"),
    (0x4000_0000, "Uncertain"),
    (0x8000_0000, "Bad"),
    (0x4090_0000, "UncertainLastUsableValue"),
    (0x8005_0000, "BadCommunicationError"),
    (0x800A_0000, "BadTimeout"),
    (0x8033_0000, "BadNodeIdInvalid"),
    (0x8034_0000, "BadNodeIdUnknown"),
    (0x809B_0000, "BadNoData"),
];

impl StatusCode {
    pub const GOOD: StatusCode = StatusCode(0x0000_0000);
    pub const UNCERTAIN: StatusCode = StatusCode(0x4000_0000);
    pub const BAD: StatusCode = StatusCode(0x8000_0000);
    pub const UNCERTAIN_LAST_USABLE_VALUE: StatusCode = StatusCode(0x4090_0000);
    pub const BAD_COMMUNICATION_ERROR: StatusCode = StatusCode(0x8005_0000);
    pub const BAD_TIMEOUT: StatusCode = StatusCode(0x800A_0000);
    pub const BAD_NODE_ID_INVALID: StatusCode = StatusCode(0x8033_0000);
    pub const BAD_NODE_ID_UNKNOWN: StatusCode = StatusCode(0x8034_0000);
    pub const BAD_NO_DATA: StatusCode = StatusCode(0x809B_0000);

    pub fn severity(self) -> Severity {
        match self.0 >> 30 {
            0 => Severity::Good,
            1 => Severity::Uncertain,
            _ => Severity::Bad,
        }
    }

    pub fn is_good(self) -> bool {
        self.severity() == Severity::Good
    }

    pub fn is_uncertain(self) -> bool {
        self.severity() == Severity::Uncertain
    }

    pub fn is_bad(self) -> bool {
        self.severity() == Severity::Bad
    }

    pub fn name(self) -> Option<&'static str> {
        NAMES.iter().find(|(code, _)| *code == self.0).map(|(_, n)| *n)
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::GOOD
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => {
                let severity = match self.severity() {
                    Severity::Good => "Good",
                    Severity::Uncertain => "Uncertain",
                    Severity::Bad => "Bad",
                };
                write!(f, "{} (0x{:08X})", severity, self.0)
            }
        }
    }
}

impl FromStr for StatusCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((code, _)) = NAMES.iter().find(|(_, n)| n.eq_ignore_ascii_case(s)) {
            return Ok(StatusCode(*code));
        }
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u32::from_str_radix(hex, 16)
                .map(StatusCode)
                .map_err(|_| format!("invalid status code '{}'", s));
        }
        Err(format!("unknown status code '{}'", s))
    }
}

impl TryFrom<String> for StatusCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StatusCode> for String {
    fn from(value: StatusCode) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_top_bits() {
        assert!(StatusCode::GOOD.is_good());
        assert!(StatusCode::UNCERTAIN_LAST_USABLE_VALUE.is_uncertain());
        assert!(StatusCode::BAD_NO_DATA.is_bad());
        assert!(StatusCode(0xC000_0000).is_bad());
    }

    #[test]
    fn test_display_named_and_unnamed() {
        assert_eq!(StatusCode::GOOD.to_string(), "Good");
        assert_eq!(StatusCode::BAD_NODE_ID_UNKNOWN.to_string(), "BadNodeIdUnknown");
        assert_eq!(StatusCode(0x80AB_0000).to_string(), "Bad (0x80AB0000)");
    }

    #[test]
    fn test_parse_names_and_hex() {
        assert_eq!("uncertain".parse::<StatusCode>().unwrap(), StatusCode::UNCERTAIN);
        assert_eq!("0x809B0000".parse::<StatusCode>().unwrap(), StatusCode::BAD_NO_DATA);
        assert!("Splendid".parse::<StatusCode>().is_err());
    }
}
