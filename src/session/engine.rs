//! Session engine
//!
//! `SessionEngine` owns a [`SessionState`] and exposes every transition of
//! the workshop state machine. Each operation validates first and mutates
//! second, so a rejected call leaves the state exactly as it was.
//!
//! The engine is synchronous and single-owner: the runtime actor holds it
//! and feeds it one command at a time.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use tracing::{debug, info};

use crate::error::{SessionError, VoteRejection};

use super::clock::Clock;
use super::contexts::ContextPool;
use super::model::{Phase, RestartPolicy, SessionState, Team, TeamId, User, UserId};
use super::snapshot::{self, SessionSnapshot, Standing};
use super::timer::Timer;

/// Rules the engine is configured with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Prep countdown used when the host does not supply one
    pub prep_duration: Duration,
    /// Prep countdown restored by a timer reset
    pub prep_reset_duration: Duration,
    /// Countdown for each presentation
    pub presentation_duration: Duration,
    /// Lowest accepted vote
    pub min_score: u32,
    /// Highest accepted vote
    pub max_score: u32,
    /// What a restart does with the roster
    pub restart_policy: RestartPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            prep_duration: Duration::from_secs(300),
            prep_reset_duration: Duration::from_secs(1200),
            presentation_duration: Duration::from_secs(180),
            min_score: 1,
            max_score: 10,
            restart_policy: RestartPolicy::KeepRoster,
        }
    }
}

/// Result of the phase-aware `next_step` dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// PRESENTING moved to VOTING
    VotingStarted,
    /// A team was tallied (if it had votes) and the next team took the stage
    Advanced {
        /// Mean added to the scored team, if any votes were cast
        tallied: Option<f64>,
    },
    /// No teams were left; the session is on the leaderboard
    Finished {
        /// Mean added to the scored team, if any votes were cast
        tallied: Option<f64>,
    },
}

/// The workshop state machine.
pub struct SessionEngine {
    state: SessionState,
    settings: SessionSettings,
    pool: ContextPool,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    /// Incremented every time a team takes the stage.
    round: u64,
}

impl SessionEngine {
    /// Creates an engine in LOBBY with an OS-seeded RNG.
    #[must_use]
    pub fn new(settings: SessionSettings, pool: ContextPool, clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(settings, pool, clock, StdRng::from_os_rng())
    }

    /// Creates an engine with a caller-supplied RNG, for reproducible runs.
    #[must_use]
    pub fn with_rng(
        settings: SessionSettings,
        pool: ContextPool,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        Self {
            state: SessionState::default(),
            settings,
            pool,
            clock,
            rng,
            round: 0,
        }
    }

    /// Read access to the session state.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// The configured rules.
    #[must_use]
    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// The context catalog.
    #[must_use]
    pub const fn pool(&self) -> &ContextPool {
        &self.pool
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Presentation round counter; bumps whenever a team takes the stage.
    #[must_use]
    pub const fn round(&self) -> u64 {
        self.round
    }

    // ------------------------------------------------------------------
    // Roster
    // ------------------------------------------------------------------

    /// Registers a participant or re-attaches a returning one.
    ///
    /// A returning id keeps its original name and team and is marked
    /// connected; no duplicate is created.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidJoin`] for a blank id or name.
    pub fn join(&mut self, user_id: &UserId, name: &str) -> Result<User, SessionError> {
        if user_id.as_str().trim().is_empty() {
            return Err(SessionError::InvalidJoin("user id is required".into()));
        }
        if let Some(existing) = self.state.users.get_mut(user_id) {
            existing.connected = true;
            debug!(user_id = %user_id, "participant re-attached");
            return Ok(existing.clone());
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::InvalidJoin("name is required".into()));
        }
        let user = User {
            id: user_id.clone(),
            name: name.to_string(),
            team_id: None,
            connected: true,
        };
        self.state.users.insert(user_id.clone(), user.clone());
        info!(user_id = %user_id, name, "participant joined");
        Ok(user)
    }

    /// Marks a known user connected. Returns `false` for unknown ids or no change.
    pub fn connect(&mut self, user_id: &UserId) -> bool {
        self.set_connected(user_id, true)
    }

    /// Marks a known user disconnected. Returns `false` for unknown ids or no change.
    pub fn disconnect(&mut self, user_id: &UserId) -> bool {
        self.set_connected(user_id, false)
    }

    fn set_connected(&mut self, user_id: &UserId, connected: bool) -> bool {
        match self.state.users.get_mut(user_id) {
            Some(user) if user.connected != connected => {
                user.connected = connected;
                debug!(user_id = %user_id, connected, "connection state changed");
                true
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Phase transitions
    // ------------------------------------------------------------------

    /// Deals connected participants round-robin into `count` new teams.
    ///
    /// Replaces any existing teams and clears the presented set. Every
    /// user's assignment is cleared first, so disconnected users end up
    /// without a team.
    ///
    /// # Errors
    ///
    /// - [`SessionError::WrongPhase`] outside LOBBY
    /// - [`SessionError::InvalidTeamCount`] for zero teams
    /// - [`SessionError::InsufficientParticipants`] when `count` exceeds
    ///   the connected participants
    pub fn create_teams(&mut self, count: usize) -> Result<(), SessionError> {
        self.require_phase("create_teams", &[Phase::Lobby])?;
        if count == 0 {
            return Err(SessionError::InvalidTeamCount);
        }
        let connected = self.state.connected_count();
        if count > connected {
            return Err(SessionError::InsufficientParticipants {
                requested: count,
                connected,
            });
        }

        let mut participants: Vec<UserId> = self
            .state
            .users
            .values()
            .filter(|u| u.connected)
            .map(|u| u.id.clone())
            .collect();
        participants.shuffle(&mut self.rng);
        let contexts = self.pool.sample(count, &mut self.rng);

        let mut teams: Vec<Team> = contexts
            .into_iter()
            .enumerate()
            .map(|(i, context)| Team::new(TeamId::generate(), format!("Team {}", i + 1), context))
            .collect();

        for user in self.state.users.values_mut() {
            user.team_id = None;
        }
        for (i, user_id) in participants.into_iter().enumerate() {
            let team = &mut teams[i % count];
            if let Some(user) = self.state.users.get_mut(&user_id) {
                user.team_id = Some(team.id.clone());
            }
            team.members.insert(user_id);
        }

        self.state.teams = teams.into_iter().map(|t| (t.id.clone(), t)).collect();
        self.state.presented_teams.clear();
        self.state.presenting_team_id = None;
        info!(count, participants = connected, "teams created");
        Ok(())
    }

    /// Enters PREP with a countdown of `duration` (configured default when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WrongPhase`] outside LOBBY.
    pub fn start_prep(&mut self, duration: Option<Duration>) -> Result<(), SessionError> {
        self.require_phase("start_prep", &[Phase::Lobby])?;
        let duration = duration.unwrap_or(self.settings.prep_duration);
        self.state.phase = Phase::Prep;
        let now = self.clock.now();
        self.state.timer = Timer::start(now, duration);
        info!(seconds = self.state.timer.remaining_secs(now), "prep started");
        Ok(())
    }

    /// Puts the next team on stage, chosen uniformly among those that have
    /// not presented.
    ///
    /// Returns `false` when every team has presented; the session is then
    /// on the LEADERBOARD with no timer and no presenting team.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WrongPhase`] unless in LOBBY, PREP or VOTING.
    pub fn advance_presentation(&mut self) -> Result<bool, SessionError> {
        self.require_phase(
            "advance_presentation",
            &[Phase::Lobby, Phase::Prep, Phase::Voting],
        )?;

        // The outgoing team's round ends here, scored or not.
        if let Some(team) = self.state.presenting_team_mut() {
            team.reset_round();
        }

        let remaining = self.state.remaining_teams();
        let Some(next) = remaining.choose(&mut self.rng).cloned() else {
            self.state.phase = Phase::Leaderboard;
            self.state.presenting_team_id = None;
            self.state.timer.clear();
            info!("all teams have presented; showing leaderboard");
            return Ok(false);
        };

        self.state.presented_teams.insert(next.clone());
        if let Some(team) = self.state.teams.get_mut(&next) {
            team.reset_round();
        }
        self.state.presenting_team_id = Some(next.clone());
        self.state.phase = Phase::Presenting;
        self.state.timer = Timer::start(self.clock.now(), self.settings.presentation_duration);
        self.round += 1;
        info!(team_id = %next, round = self.round, "team presenting");
        Ok(true)
    }

    /// Closes the presentation and opens voting. Voting has no countdown.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WrongPhase`] outside PRESENTING.
    pub fn start_voting(&mut self) -> Result<(), SessionError> {
        self.require_phase("start_voting", &[Phase::Presenting])?;
        self.state.phase = Phase::Voting;
        self.state.timer.clear();
        if let Some(team) = self.state.presenting_team_mut() {
            team.voters_this_round.clear();
        }
        info!(round = self.round, "voting opened");
        Ok(())
    }

    /// Records a vote for the presenting team.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidVote`] with the reason when voting is
    /// closed, nobody is presenting, the voter is unknown, on the presenting
    /// team, has already voted, or the score is out of range. Nothing is
    /// recorded in that case.
    pub fn cast_vote(&mut self, user_id: &UserId, score: u32) -> Result<(), SessionError> {
        if self.state.phase != Phase::Voting {
            return Err(VoteRejection::WrongPhase.into());
        }
        if !self.state.users.contains_key(user_id) {
            return Err(VoteRejection::UnknownVoter.into());
        }
        let (min, max) = (self.settings.min_score, self.settings.max_score);
        let team = self
            .state
            .presenting_team_mut()
            .ok_or(VoteRejection::NoPresentingTeam)?;
        if team.members.contains(user_id) {
            return Err(VoteRejection::OwnTeam.into());
        }
        if team.voters_this_round.contains(user_id) {
            return Err(VoteRejection::AlreadyVoted.into());
        }
        if !(min..=max).contains(&score) {
            return Err(VoteRejection::OutOfRange { score, min, max }.into());
        }
        team.votes_current_round.push(score);
        team.voters_this_round.insert(user_id.clone());
        debug!(user_id = %user_id, score, team_id = %team.id, "vote recorded");
        Ok(())
    }

    /// Whether every eligible voter has voted this round.
    ///
    /// Eligible voters are connected users outside the presenting team.
    /// Returns `false` when nobody is eligible.
    #[must_use]
    pub fn check_quorum(&self) -> bool {
        let Some(team) = self.state.presenting_team() else {
            return false;
        };
        let eligible = self.state.eligible_voters();
        !eligible.is_empty() && eligible.iter().all(|id| team.voters_this_round.contains(*id))
    }

    /// Adds the mean of the current round's votes to the presenting team.
    ///
    /// Clears the round ledger either way. Idempotent: a second call finds
    /// an empty ledger and changes nothing. Returns the mean that was added.
    pub fn tally_scores(&mut self) -> Option<f64> {
        if self.state.phase != Phase::Voting {
            return None;
        }
        let team = self.state.presenting_team_mut()?;
        let mean = team.round_mean();
        if let Some(mean) = mean {
            team.score += mean;
            info!(team_id = %team.id, mean, total = team.score, "scores tallied");
        }
        team.reset_round();
        mean
    }

    /// Phase-aware "next" button.
    ///
    /// - PRESENTING: open voting
    /// - VOTING: tally, then put the next team on stage
    /// - PREP: put the first team on stage
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::WrongPhase`] in LOBBY and LEADERBOARD.
    pub fn next_step(&mut self) -> Result<StepOutcome, SessionError> {
        match self.state.phase {
            Phase::Presenting => {
                self.start_voting()?;
                Ok(StepOutcome::VotingStarted)
            }
            Phase::Voting | Phase::Prep => {
                let tallied = self.tally_scores();
                if self.advance_presentation()? {
                    Ok(StepOutcome::Advanced { tallied })
                } else {
                    Ok(StepOutcome::Finished { tallied })
                }
            }
            phase @ (Phase::Lobby | Phase::Leaderboard) => Err(SessionError::WrongPhase {
                action: "next_step",
                phase,
            }),
        }
    }

    /// Returns to LOBBY, discarding teams, votes and the timer.
    ///
    /// The roster is kept or cleared according to the configured
    /// [`RestartPolicy`].
    pub fn restart(&mut self) {
        self.state.phase = Phase::Lobby;
        self.state.timer.clear();
        self.state.presenting_team_id = None;
        self.state.presented_teams.clear();
        self.state.teams.clear();
        match self.settings.restart_policy {
            RestartPolicy::KeepRoster => {
                for user in self.state.users.values_mut() {
                    user.team_id = None;
                }
            }
            RestartPolicy::ClearRoster => self.state.users.clear(),
        }
        info!(policy = ?self.settings.restart_policy, "session restarted");
    }

    // ------------------------------------------------------------------
    // Timer controller
    // ------------------------------------------------------------------

    /// Pauses a running countdown. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TimerInactive`] outside PREP and PRESENTING.
    pub fn pause_timer(&mut self) -> Result<bool, SessionError> {
        self.require_timed()?;
        let now = self.clock.now();
        Ok(self.state.timer.pause(now))
    }

    /// Resumes a paused countdown. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TimerInactive`] outside PREP and PRESENTING.
    pub fn resume_timer(&mut self) -> Result<bool, SessionError> {
        self.require_timed()?;
        let now = self.clock.now();
        Ok(self.state.timer.resume(now))
    }

    /// Shifts the countdown by `delta_secs`, flooring at zero.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TimerInactive`] outside PREP and PRESENTING.
    pub fn adjust_timer(&mut self, delta_secs: i64) -> Result<bool, SessionError> {
        self.require_timed()?;
        let now = self.clock.now();
        Ok(self.state.timer.adjust(now, delta_secs))
    }

    /// Restarts the countdown at the phase's canonical duration, unpaused.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TimerInactive`] outside PREP and PRESENTING.
    pub fn reset_timer(&mut self) -> Result<bool, SessionError> {
        let phase = self.require_timed()?;
        let duration = match phase {
            Phase::Prep => self.settings.prep_reset_duration,
            _ => self.settings.presentation_duration,
        };
        self.state.timer = Timer::start(self.clock.now(), duration);
        Ok(true)
    }

    /// Time left on the countdown, floored at zero.
    #[must_use]
    pub fn remaining_time(&self) -> Duration {
        self.state.timer.remaining(self.clock.now())
    }

    /// Whether a running countdown has reached zero.
    #[must_use]
    pub fn timer_expired(&self) -> bool {
        self.state.timer.is_expired(self.clock.now())
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Serializable view of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(&self.state, self.remaining_time().as_secs())
    }

    /// Teams ranked by cumulative score.
    #[must_use]
    pub fn leaderboard(&self) -> Vec<Standing> {
        snapshot::standings(&self.state)
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    fn require_phase(&self, action: &'static str, allowed: &[Phase]) -> Result<(), SessionError> {
        let phase = self.state.phase;
        if allowed.contains(&phase) {
            Ok(())
        } else {
            debug!(action, %phase, "action rejected in current phase");
            Err(SessionError::WrongPhase { action, phase })
        }
    }

    fn require_timed(&self) -> Result<Phase, SessionError> {
        let phase = self.state.phase;
        if phase.is_timed() {
            Ok(phase)
        } else {
            Err(SessionError::TimerInactive { phase })
        }
    }
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("phase", &self.state.phase)
            .field("users", &self.state.users.len())
            .field("teams", &self.state.teams.len())
            .field("round", &self.round)
            .finish_non_exhaustive()
    }
}
