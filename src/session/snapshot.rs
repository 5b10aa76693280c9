//! Outbound session snapshot.
//!
//! The snapshot is what every observer sees after each state change.
//! Set-valued fields are rendered as sequences with a stable order so the
//! JSON is deterministic for a given state.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::model::{Phase, SessionState, Team, TeamId, User, UserId};

/// Serializable view of a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamView {
    /// Team identifier
    pub id: TeamId,
    /// Display name
    pub name: String,
    /// Members in dealing order
    pub members: Vec<UserId>,
    /// Flavor tag
    pub context: String,
    /// Cumulative score
    pub score: f64,
    /// Scores received this round
    pub votes_current_round: Vec<u32>,
    /// Voters this round, sorted
    pub voters_this_round: Vec<UserId>,
}

impl From<&Team> for TeamView {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id.clone(),
            name: team.name.clone(),
            members: team.members.iter().cloned().collect(),
            context: team.context.clone(),
            score: team.score,
            votes_current_round: team.votes_current_round.clone(),
            voters_this_round: team.voters_this_round.iter().cloned().collect(),
        }
    }
}

/// Point-in-time view of the whole session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Current phase
    pub phase: Phase,
    /// Whole seconds left on the countdown (0 when idle)
    pub timer_seconds_remaining: u64,
    /// Whether the countdown is paused
    pub timer_paused: bool,
    /// Participants keyed by id, in join order
    pub users: IndexMap<UserId, User>,
    /// Teams keyed by id, in creation order
    pub teams: IndexMap<TeamId, TeamView>,
    /// Team on stage, if any
    pub presenting_team_id: Option<TeamId>,
    /// Teams already chosen to present, in presentation order
    pub presented_team_ids: Vec<TeamId>,
}

impl SessionSnapshot {
    /// Captures `state` with `timer_seconds_remaining` already computed.
    #[must_use]
    pub fn capture(state: &SessionState, timer_seconds_remaining: u64) -> Self {
        Self {
            phase: state.phase,
            timer_seconds_remaining,
            timer_paused: state.timer.is_paused(),
            users: state.users.clone(),
            teams: state
                .teams
                .iter()
                .map(|(id, team)| (id.clone(), TeamView::from(team)))
                .collect(),
            presenting_team_id: state.presenting_team_id.clone(),
            presented_team_ids: state.presented_teams.iter().cloned().collect(),
        }
    }
}

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    /// 1-based rank; tied scores share a rank
    pub rank: usize,
    /// Team identifier
    pub team_id: TeamId,
    /// Display name
    pub name: String,
    /// Flavor tag
    pub context: String,
    /// Cumulative score
    pub score: f64,
}

/// Ranks teams by score, highest first. Ties keep creation order and share a rank.
#[must_use]
pub fn standings(state: &SessionState) -> Vec<Standing> {
    let mut teams: Vec<&Team> = state.teams.values().collect();
    // Stable sort keeps creation order among equal scores.
    teams.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut rows: Vec<Standing> = Vec::with_capacity(teams.len());
    for (index, team) in teams.into_iter().enumerate() {
        let rank = match rows.last() {
            Some(prev) if prev.score.total_cmp(&team.score).is_eq() => prev.rank,
            _ => index + 1,
        };
        rows.push(Standing {
            rank,
            team_id: team.id.clone(),
            name: team.name.clone(),
            context: team.context.clone(),
            score: team.score,
        });
    }
    rows
}
