//! Human-written timer durations such as `20m`, `1h`, `90s` or `2d`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// A timer duration parsed from `<integer><unit>`, unit one of `s`, `m`,
/// `h`, `d` (case-insensitive, surrounding whitespace ignored).
///
/// On the wire it travels as the string form; `Display` renders the
/// largest unit that divides the duration evenly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MatchDuration(Duration);

impl MatchDuration {
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }
}

impl FromStr for MatchDuration {
    type Err = ProtocolError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim().to_ascii_lowercase();
        let invalid = || {
            ProtocolError::InvalidDuration(format!(
                "{text:?}: duration must look like 20m / 1h / 90s / 2d"
            ))
        };

        let unit = text.chars().last().ok_or_else(invalid)?;
        let digits = &text[..text.len() - unit.len_utf8()];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u64 = digits.parse().map_err(|_| invalid())?;
        let multiplier = match unit {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            _ => return Err(invalid()),
        };
        let secs = value.checked_mul(multiplier).ok_or_else(invalid)?;
        Ok(Self::from_secs(secs))
    }
}

impl TryFrom<String> for MatchDuration {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MatchDuration> for String {
    fn from(value: MatchDuration) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MatchDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.as_secs();
        match secs {
            0 => write!(f, "0s"),
            s if s % 86_400 == 0 => write!(f, "{}d", s / 86_400),
            s if s % 3_600 == 0 => write!(f, "{}h", s / 3_600),
            s if s % 60 == 0 => write!(f, "{}m", s / 60),
            s => write!(f, "{s}s"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_each_unit() {
        assert_eq!("90s".parse::<MatchDuration>().unwrap().as_secs(), 90);
        assert_eq!("20m".parse::<MatchDuration>().unwrap().as_secs(), 1_200);
        assert_eq!("1h".parse::<MatchDuration>().unwrap().as_secs(), 3_600);
        assert_eq!("2d".parse::<MatchDuration>().unwrap().as_secs(), 172_800);
    }

    #[test]
    fn test_ignores_case_and_whitespace() {
        assert_eq!(" 15M ".parse::<MatchDuration>().unwrap().as_secs(), 900);
    }

    #[test]
    fn test_rejects_malformed_input() {
        for bad in ["", "m", "20", "20x", "-5m", "1.5h", "20 m", "m20"] {
            assert!(
                bad.parse::<MatchDuration>().is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_overflow() {
        assert!("99999999999999999999d".parse::<MatchDuration>().is_err());
        assert!("18446744073709551615d".parse::<MatchDuration>().is_err());
    }

    #[test]
    fn test_display_uses_largest_even_unit() {
        assert_eq!(MatchDuration::from_secs(1_200).to_string(), "20m");
        assert_eq!(MatchDuration::from_secs(7_200).to_string(), "2h");
        assert_eq!(MatchDuration::from_secs(90).to_string(), "90s");
    }

    #[test]
    fn test_serde_uses_string_form() {
        let d: MatchDuration = serde_json::from_str("\"10m\"").unwrap();
        assert_eq!(d.as_secs(), 600);
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"10m\"");
        assert!(serde_json::from_str::<MatchDuration>("\"soon\"").is_err());
    }
}
