//! Turning a [`RosterSpec`] into concrete starting teams.

use std::collections::{BTreeMap, HashSet};

use matchkeep_protocol::{MemberId, RosterSpec, TeamLabel};
use rand::seq::SliceRandom;

use crate::SessionError;

/// Bounds for generated and explicit team counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterLimits {
    /// Team count used by a shuffle that doesn't name one.
    pub default_teams: usize,
    /// Upper bound on teams per match.
    pub max_teams: usize,
}

impl Default for RosterLimits {
    fn default() -> Self {
        Self {
            default_teams: 2,
            max_teams: 10,
        }
    }
}

/// Resolves the starting teams.
///
/// Explicit rosters keep their labels; a member listed twice (in the
/// same team or across teams) is rejected. Shuffles deal the pool, after
/// shuffling and dropping duplicates, round-robin over `team1..teamN`,
/// so earlier teams get the extra member when the split is uneven.
pub fn plan_roster(
    roster: &RosterSpec,
    limits: RosterLimits,
) -> Result<BTreeMap<TeamLabel, Vec<MemberId>>, SessionError> {
    match roster {
        RosterSpec::Explicit { teams } => {
            if teams.len() < 2 || teams.len() > limits.max_teams {
                return Err(SessionError::InvalidRequest(format!(
                    "a match needs between 2 and {} teams, got {}",
                    limits.max_teams,
                    teams.len()
                )));
            }
            let mut seen = HashSet::new();
            for member in teams.values().flatten() {
                if !seen.insert(*member) {
                    return Err(SessionError::InvalidRequest(format!(
                        "member {member} is listed more than once"
                    )));
                }
            }
            Ok(teams.clone())
        }

        RosterSpec::Shuffle { pool, teams } => {
            let count = teams.unwrap_or(limits.default_teams);
            if count < 2 || count > limits.max_teams {
                return Err(SessionError::InvalidRequest(format!(
                    "a match needs between 2 and {} teams, got {count}",
                    limits.max_teams
                )));
            }

            let mut seen = HashSet::new();
            let mut members: Vec<MemberId> =
                pool.iter().copied().filter(|m| seen.insert(*m)).collect();
            members.shuffle(&mut rand::rng());

            let mut planned: BTreeMap<TeamLabel, Vec<MemberId>> =
                (1..=count).map(|n| (TeamLabel::numbered(n), Vec::new())).collect();
            for (i, member) in members.into_iter().enumerate() {
                planned
                    .entry(TeamLabel::numbered(i % count + 1))
                    .or_default()
                    .push(member);
            }
            Ok(planned)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<MemberId> {
        raw.iter().copied().map(MemberId).collect()
    }

    #[test]
    fn test_explicit_roster_passes_through() {
        let teams = BTreeMap::from([
            (TeamLabel::numbered(1), ids(&[1, 2])),
            (TeamLabel::numbered(2), ids(&[3])),
        ]);
        let roster = RosterSpec::Explicit {
            teams: teams.clone(),
        };
        assert_eq!(plan_roster(&roster, RosterLimits::default()).unwrap(), teams);
    }

    #[test]
    fn test_explicit_roster_rejects_duplicates() {
        let roster = RosterSpec::Explicit {
            teams: BTreeMap::from([
                (TeamLabel::numbered(1), ids(&[1, 2])),
                (TeamLabel::numbered(2), ids(&[2])),
            ]),
        };
        assert!(matches!(
            plan_roster(&roster, RosterLimits::default()),
            Err(SessionError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_explicit_roster_needs_two_teams() {
        let roster = RosterSpec::Explicit {
            teams: BTreeMap::from([(TeamLabel::numbered(1), ids(&[1]))]),
        };
        assert!(plan_roster(&roster, RosterLimits::default()).is_err());
    }

    #[test]
    fn test_shuffle_splits_evenly_with_first_team_larger() {
        let roster = RosterSpec::Shuffle {
            pool: ids(&[1, 2, 3, 4, 5]),
            teams: None,
        };
        let planned = plan_roster(&roster, RosterLimits::default()).unwrap();
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[&TeamLabel::numbered(1)].len(), 3);
        assert_eq!(planned[&TeamLabel::numbered(2)].len(), 2);

        let mut everyone: Vec<MemberId> = planned.values().flatten().copied().collect();
        everyone.sort();
        assert_eq!(everyone, ids(&[1, 2, 3, 4, 5]));
    }

    #[test]
    fn test_shuffle_drops_duplicate_pool_entries() {
        let roster = RosterSpec::Shuffle {
            pool: ids(&[1, 1, 2]),
            teams: Some(2),
        };
        let planned = plan_roster(&roster, RosterLimits::default()).unwrap();
        assert_eq!(planned.values().flatten().count(), 2);
    }

    #[test]
    fn test_shuffle_team_count_bounds() {
        for bad in [0, 1, 11] {
            let roster = RosterSpec::Shuffle {
                pool: ids(&[1, 2]),
                teams: Some(bad),
            };
            assert!(plan_roster(&roster, RosterLimits::default()).is_err());
        }
    }

    #[test]
    fn test_shuffle_of_empty_pool_makes_empty_teams() {
        let roster = RosterSpec::Shuffle {
            pool: Vec::new(),
            teams: Some(3),
        };
        let planned = plan_roster(&roster, RosterLimits::default()).unwrap();
        assert_eq!(planned.len(), 3);
        assert!(planned.values().all(Vec::is_empty));
    }
}
