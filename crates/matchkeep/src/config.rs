//! Coordinator configuration.

use std::time::Duration;

use matchkeep_session::RosterLimits;
use matchkeep_timer::TimerConfig;
use serde::{Deserialize, Serialize};

use crate::MatchError;

/// Tunables for a [`Dispatcher`](crate::Dispatcher).
///
/// Every field has a default, so a JSON file only needs the keys it
/// changes:
///
/// ```rust
/// use std::time::Duration;
/// use matchkeep::CoordinatorConfig;
///
/// let config = CoordinatorConfig::from_json(br#"{ "channel_prefix": "Scrim" }"#).unwrap();
/// assert_eq!(config.channel_prefix, "Scrim");
/// assert_eq!(config.platform_timeout, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// How long before expiry the match timer warns.
    pub warning_lead: Duration,

    /// Upper bound on any single platform call.
    pub platform_timeout: Duration,

    /// Capacity of each community actor's command queue.
    pub command_buffer: usize,

    /// Match names are `{channel_prefix}-NNNN`.
    pub channel_prefix: String,

    /// Team count for a shuffle that doesn't name one.
    pub default_team_count: usize,

    /// Upper bound on teams per match.
    pub max_team_count: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            warning_lead: Duration::from_secs(5 * 60),
            platform_timeout: Duration::from_secs(10),
            command_buffer: 64,
            channel_prefix: "Match".to_string(),
            default_team_count: 2,
            max_team_count: 10,
        }
    }
}

impl CoordinatorConfig {
    /// Parses a JSON config; missing keys keep their defaults. The result
    /// is already [`validated`](Self::validated).
    ///
    /// # Errors
    /// [`MatchError::Config`] if the bytes aren't a valid config object.
    pub fn from_json(bytes: &[u8]) -> Result<Self, MatchError> {
        let config: Self = serde_json::from_slice(bytes).map_err(MatchError::Config)?;
        Ok(config.validated())
    }

    /// Clamps out-of-range values into something usable.
    pub fn validated(mut self) -> Self {
        if self.command_buffer == 0 {
            tracing::warn!("command_buffer must be positive, using 1");
            self.command_buffer = 1;
        }
        if self.platform_timeout.is_zero() {
            tracing::warn!("platform_timeout must be positive, using the default");
            self.platform_timeout = Self::default().platform_timeout;
        }
        if self.channel_prefix.trim().is_empty() {
            self.channel_prefix = Self::default().channel_prefix;
        }
        self.max_team_count = self.max_team_count.max(2);
        let clamped = self.default_team_count.clamp(2, self.max_team_count);
        if clamped != self.default_team_count {
            tracing::warn!(
                requested = self.default_team_count,
                using = clamped,
                "default_team_count out of range"
            );
            self.default_team_count = clamped;
        }
        self
    }

    pub fn timer(&self) -> TimerConfig {
        TimerConfig {
            warning_lead: self.warning_lead,
        }
    }

    pub fn roster_limits(&self) -> RosterLimits {
        RosterLimits {
            default_teams: self.default_team_count,
            max_teams: self.max_team_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.warning_lead, Duration::from_secs(300));
        assert_eq!(config.command_buffer, 64);
        assert_eq!(config.roster_limits(), RosterLimits::default());
    }

    #[test]
    fn test_validated_clamps() {
        let config = CoordinatorConfig {
            command_buffer: 0,
            platform_timeout: Duration::ZERO,
            channel_prefix: "  ".into(),
            default_team_count: 12,
            max_team_count: 4,
            ..CoordinatorConfig::default()
        }
        .validated();

        assert_eq!(config.command_buffer, 1);
        assert_eq!(config.platform_timeout, Duration::from_secs(10));
        assert_eq!(config.channel_prefix, "Match");
        assert_eq!(config.default_team_count, 4);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            CoordinatorConfig::from_json(b"[1, 2]"),
            Err(MatchError::Config(_))
        ));
    }

    #[test]
    fn test_json_round_trip_keeps_durations() {
        let config = CoordinatorConfig {
            warning_lead: Duration::from_secs(60),
            ..CoordinatorConfig::default()
        };
        let bytes = serde_json::to_vec(&config).unwrap();
        assert_eq!(CoordinatorConfig::from_json(&bytes).unwrap(), config);
    }
}
