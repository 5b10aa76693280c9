//! Session data model.
//!
//! Users, teams and the session aggregate. All mutation goes through
//! [`SessionEngine`](super::SessionEngine); the types here only hold data
//! and answer questions about it.

use std::collections::BTreeSet;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::timer::Timer;

/// Stage of the workshop session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Participants gather and teams are formed
    #[default]
    Lobby,
    /// Teams prepare against a countdown
    Prep,
    /// One team presents against a countdown
    Presenting,
    /// The audience scores the presenting team
    Voting,
    /// Every team has presented; final standings
    Leaderboard,
}

impl Phase {
    /// Wire and label name of the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lobby => "LOBBY",
            Self::Prep => "PREP",
            Self::Presenting => "PRESENTING",
            Self::Voting => "VOTING",
            Self::Leaderboard => "LEADERBOARD",
        }
    }

    /// Whether the phase carries a countdown that the host can control.
    #[must_use]
    pub const fn is_timed(self) -> bool {
        matches!(self, Self::Prep | Self::Presenting)
    }

    /// All phases in session order.
    pub const ALL: [Self; 5] = [
        Self::Lobby,
        Self::Prep,
        Self::Presenting,
        Self::Voting,
        Self::Leaderboard,
    ];
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participant-supplied stable identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Creates a new `UserId`.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generated team identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub String);

impl TeamId {
    /// Creates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A workshop participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier chosen by the participant's client
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Team assignment, if teams have been formed
    pub team_id: Option<TeamId>,
    /// Whether the participant currently has a live connection
    pub connected: bool,
}

/// A team of participants.
#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    /// Generated identifier
    pub id: TeamId,
    /// Display name ("Team 1", "Team 2", ...)
    pub name: String,
    /// Members in dealing order
    pub members: IndexSet<UserId>,
    /// Flavor tag drawn from the context pool
    pub context: String,
    /// Cumulative score
    pub score: f64,
    /// Scores received in the current presentation round
    pub votes_current_round: Vec<u32>,
    /// Users who voted in the current presentation round
    pub voters_this_round: BTreeSet<UserId>,
}

impl Team {
    /// Creates an empty team.
    #[must_use]
    pub fn new(id: TeamId, name: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            members: IndexSet::new(),
            context: context.into(),
            score: 0.0,
            votes_current_round: Vec::new(),
            voters_this_round: BTreeSet::new(),
        }
    }

    /// Clears this team's round ledger.
    pub fn reset_round(&mut self) {
        self.votes_current_round.clear();
        self.voters_this_round.clear();
    }

    /// Arithmetic mean of the current round's votes, if any were cast.
    #[must_use]
    pub fn round_mean(&self) -> Option<f64> {
        if self.votes_current_round.is_empty() {
            return None;
        }
        let total: f64 = self.votes_current_round.iter().map(|&v| f64::from(v)).sum();
        #[allow(clippy::cast_precision_loss)]
        let count = self.votes_current_round.len() as f64;
        Some(total / count)
    }
}

/// What a restart does with the participant roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Keep every user, clearing team assignments
    #[default]
    KeepRoster,
    /// Forget every user; clients must join again
    ClearRoster,
}

/// The session aggregate.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Current stage
    pub phase: Phase,
    /// Countdown for timed phases
    pub timer: Timer,
    /// Team on stage during PRESENTING and VOTING
    pub presenting_team_id: Option<TeamId>,
    /// Teams already chosen to present, in presentation order
    pub presented_teams: IndexSet<TeamId>,
    /// Participants in join order
    pub users: IndexMap<UserId, User>,
    /// Teams in creation order
    pub teams: IndexMap<TeamId, Team>,
}

impl SessionState {
    /// Number of users with a live connection.
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.users.values().filter(|u| u.connected).count()
    }

    /// The team currently on stage.
    #[must_use]
    pub fn presenting_team(&self) -> Option<&Team> {
        self.presenting_team_id
            .as_ref()
            .and_then(|id| self.teams.get(id))
    }

    /// Mutable access to the team currently on stage.
    pub fn presenting_team_mut(&mut self) -> Option<&mut Team> {
        let id = self.presenting_team_id.as_ref()?;
        self.teams.get_mut(id)
    }

    /// Teams that have not presented yet, in creation order.
    #[must_use]
    pub fn remaining_teams(&self) -> Vec<TeamId> {
        self.teams
            .keys()
            .filter(|id| !self.presented_teams.contains(*id))
            .cloned()
            .collect()
    }

    /// Connected users who are allowed to vote for the presenting team.
    #[must_use]
    pub fn eligible_voters(&self) -> Vec<&UserId> {
        let presenting = self.presenting_team();
        self.users
            .values()
            .filter(|u| u.connected)
            .filter(|u| presenting.is_none_or(|t| !t.members.contains(&u.id)))
            .map(|u| &u.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, connected: bool) -> User {
        User {
            id: UserId::new(id),
            name: id.to_uppercase(),
            team_id: None,
            connected,
        }
    }

    #[test]
    fn phase_serializes_screaming() {
        let json = serde_json::to_string(&Phase::Leaderboard).unwrap();
        assert_eq!(json, "\"LEADERBOARD\"");
        assert_eq!(Phase::Prep.to_string(), "PREP");
    }

    #[test]
    fn only_prep_and_presenting_are_timed() {
        let timed: Vec<_> = Phase::ALL.into_iter().filter(|p| p.is_timed()).collect();
        assert_eq!(timed, vec![Phase::Prep, Phase::Presenting]);
    }

    #[test]
    fn round_mean_of_votes() {
        let mut team = Team::new(TeamId::generate(), "Team 1", "ctx");
        assert_eq!(team.round_mean(), None);
        team.votes_current_round = vec![3, 5, 7];
        assert_eq!(team.round_mean(), Some(5.0));
        team.reset_round();
        assert!(team.votes_current_round.is_empty());
    }

    #[test]
    fn eligible_voters_exclude_presenters_and_disconnected() {
        let mut state = SessionState::default();
        for u in [user("a", true), user("b", true), user("c", false), user("d", true)] {
            state.users.insert(u.id.clone(), u);
        }
        let mut team = Team::new(TeamId::generate(), "Team 1", "ctx");
        team.members.insert(UserId::new("a"));
        state.presenting_team_id = Some(team.id.clone());
        state.teams.insert(team.id.clone(), team);

        let eligible: Vec<&str> = state.eligible_voters().iter().map(|u| u.as_str()).collect();
        assert_eq!(eligible, vec!["b", "d"]);
        assert_eq!(state.connected_count(), 3);
    }

    #[test]
    fn restart_policy_from_yaml() {
        let policy: RestartPolicy = serde_yaml::from_str("clear_roster").unwrap();
        assert_eq!(policy, RestartPolicy::ClearRoster);
        assert_eq!(RestartPolicy::default(), RestartPolicy::KeepRoster);
    }
}
