//! Session actor.
//!
//! The only task that mutates the [`SessionEngine`]. Inbound events, stream
//! attach/detach notices, monitor ticks and debounced quorum checks all
//! arrive on one mpsc queue and are applied in order. Every state change
//! is followed by a snapshot on the outbound broadcast channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::command::{Command, EventReply, InboundEvent, Outbound};
use super::monitor::{MonitorHandle, TickOutcome, evaluate_tick, spawn_monitor};
use crate::error::{SessionError, TransportError};
use crate::observability::metrics;
use crate::observability::{Event, EventEmitter};
use crate::session::{
    Phase, RestartPolicy, SessionEngine, SessionSnapshot, Standing, StepOutcome, TeamId, UserId,
};

/// Default depth of the actor's command queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default number of outbound messages buffered per subscriber.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Runtime knobs that sit around the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Tally and advance once every eligible voter has voted
    pub auto_advance_on_quorum: bool,
    /// Delay between reaching quorum and acting on it
    pub quorum_grace: Duration,
    /// Monitor tick period
    pub tick_interval: Duration,
    /// Command queue depth
    pub queue_capacity: usize,
    /// Outbound buffer per subscriber
    pub broadcast_capacity: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            auto_advance_on_quorum: true,
            quorum_grace: Duration::from_millis(750),
            tick_interval: Duration::from_secs(1),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable front to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
    outbound: broadcast::Sender<Outbound>,
}

impl SessionHandle {
    /// Applies an inbound event and waits for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SessionClosed`] if the actor has stopped.
    pub async fn dispatch(&self, event: InboundEvent) -> Result<EventReply, TransportError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Event { event, reply }).await?;
        rx.await.map_err(|_| TransportError::SessionClosed)
    }

    /// Current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SessionClosed`] if the actor has stopped.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, TransportError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| TransportError::SessionClosed)
    }

    /// Current leaderboard.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SessionClosed`] if the actor has stopped.
    pub async fn leaderboard(&self) -> Result<Vec<Standing>, TransportError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Leaderboard { reply }).await?;
        rx.await.map_err(|_| TransportError::SessionClosed)
    }

    /// Marks a participant connected because a live stream opened.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SessionClosed`] if the actor has stopped.
    pub async fn attach(&self, user_id: UserId) -> Result<(), TransportError> {
        self.send(Command::Attach { user_id }).await
    }

    /// Marks a participant disconnected because their last stream closed.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SessionClosed`] if the actor has stopped.
    pub async fn detach(&self, user_id: UserId) -> Result<(), TransportError> {
        self.send(Command::Detach { user_id }).await
    }

    /// Subscribes to outbound messages.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.outbound.subscribe()
    }

    /// Whether the actor is still accepting commands.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn send(&self, command: Command) -> Result<(), TransportError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| TransportError::SessionClosed)
    }
}

// ============================================================================
// Actor
// ============================================================================

/// Spawns the session actor.
///
/// The actor runs until `cancel` fires or every [`SessionHandle`] is
/// dropped.
pub fn spawn_session(
    engine: SessionEngine,
    options: RuntimeOptions,
    emitter: Arc<EventEmitter>,
    cancel: CancellationToken,
) -> (SessionHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(options.queue_capacity);
    let (outbound, _) = broadcast::channel(options.broadcast_capacity);

    let actor = SessionActor {
        engine,
        options,
        rx,
        weak_tx: tx.downgrade(),
        outbound: outbound.clone(),
        emitter,
        cancel,
        monitor: None,
        next_generation: 0,
        quorum_pending: None,
    };
    let task = tokio::spawn(actor.run());
    (SessionHandle { tx, outbound }, task)
}

struct SessionActor {
    engine: SessionEngine,
    options: RuntimeOptions,
    rx: mpsc::Receiver<Command>,
    weak_tx: mpsc::WeakSender<Command>,
    outbound: broadcast::Sender<Outbound>,
    emitter: Arc<EventEmitter>,
    cancel: CancellationToken,
    monitor: Option<MonitorHandle>,
    next_generation: u64,
    /// Round for which a quorum check is already scheduled.
    quorum_pending: Option<u64>,
}

impl SessionActor {
    async fn run(mut self) {
        metrics::set_current_phase(self.engine.phase());
        metrics::set_participants_connected(self.engine.state().connected_count());
        info!("session actor started");
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                command = self.rx.recv() => {
                    let Some(command) = command else { break };
                    self.handle(command);
                }
            }
        }
        self.stop_monitor();
        info!("session actor stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Event { event, reply } => {
                let response = self.handle_event(event);
                let _ = reply.send(response);
            }
            Command::Attach { user_id } => {
                if self.engine.connect(&user_id) {
                    self.broadcast();
                }
            }
            Command::Detach { user_id } => {
                if self.engine.disconnect(&user_id) {
                    self.after_disconnect();
                }
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.engine.snapshot());
            }
            Command::Leaderboard { reply } => {
                let _ = reply.send(self.engine.leaderboard());
            }
            Command::Tick { generation } => self.handle_tick(generation),
            Command::QuorumCheck { round } => self.handle_quorum_check(round),
        }
    }

    // ------------------------------------------------------------------
    // Inbound events
    // ------------------------------------------------------------------

    fn handle_event(&mut self, event: InboundEvent) -> EventReply {
        let action = event.action();
        metrics::record_event(action);
        let before = self.engine.phase();

        let result = match event {
            InboundEvent::Join { user_id, name } => self.join(&user_id, &name),
            InboundEvent::CreateTeams { count } => self.create_teams(count),
            InboundEvent::StartPrep { seconds } => self
                .engine
                .start_prep(seconds.map(Duration::from_secs))
                .map(|()| {
                    self.restart_monitor();
                    EventReply::accepted()
                }),
            InboundEvent::AdvancePresentation => self.advance_presentation(),
            InboundEvent::NextStep => self.next_step(),
            InboundEvent::CastVote { user_id, score } => return self.cast_vote(&user_id, score),
            InboundEvent::PauseTimer => Self::timer_reply(self.engine.pause_timer()),
            InboundEvent::ResumeTimer => Self::timer_reply(self.engine.resume_timer()),
            InboundEvent::AdjustTimer { delta_seconds } => {
                Self::timer_reply(self.engine.adjust_timer(delta_seconds))
            }
            InboundEvent::ResetTimer => Self::timer_reply(self.engine.reset_timer()),
            InboundEvent::RestartSession => Ok(self.restart()),
            InboundEvent::Disconnect { user_id } => {
                let changed = self.engine.disconnect(&user_id);
                if changed {
                    self.after_disconnect();
                }
                return if changed {
                    EventReply::accepted()
                } else {
                    EventReply::rejected(format!("{user_id} is not connected"))
                };
            }
        };

        match result {
            Ok(reply) => {
                self.record_transition(before);
                if reply.accepted {
                    self.broadcast();
                }
                reply
            }
            Err(e) => {
                debug!(action, error = %e, "event rejected");
                EventReply::rejected(e.to_string())
            }
        }
    }

    fn join(&mut self, user_id: &UserId, name: &str) -> Result<EventReply, SessionError> {
        let user = self.engine.join(user_id, name)?;
        metrics::set_participants_connected(self.engine.state().connected_count());
        self.emitter.emit(Event::ParticipantJoined {
            timestamp: Utc::now(),
            user_id: user.id.clone(),
            name: user.name.clone(),
        });
        Ok(EventReply {
            user: Some(user),
            ..EventReply::accepted()
        })
    }

    fn create_teams(&mut self, count: usize) -> Result<EventReply, SessionError> {
        self.engine.create_teams(count)?;
        let participants = self
            .engine
            .state()
            .teams
            .values()
            .map(|t| t.members.len())
            .sum();
        self.emitter.emit(Event::TeamsCreated {
            timestamp: Utc::now(),
            count,
            participants,
        });
        Ok(EventReply::accepted().with_message(format!("Created {count} teams")))
    }

    fn advance_presentation(&mut self) -> Result<EventReply, SessionError> {
        let more = self.engine.advance_presentation()?;
        self.restart_monitor();
        Ok(EventReply {
            more_teams: Some(more),
            ..EventReply::accepted()
        })
    }

    fn next_step(&mut self) -> Result<EventReply, SessionError> {
        let scored = self.engine.state().presenting_team_id.clone();
        let outcome = self.engine.next_step()?;
        let more_teams = match outcome {
            StepOutcome::VotingStarted => None,
            StepOutcome::Advanced { tallied } | StepOutcome::Finished { tallied } => {
                self.emit_tally(scored, tallied);
                self.restart_monitor();
                Some(matches!(outcome, StepOutcome::Advanced { .. }))
            }
        };
        Ok(EventReply {
            more_teams,
            ..EventReply::accepted()
        })
    }

    fn cast_vote(&mut self, user_id: &UserId, score: u32) -> EventReply {
        match self.engine.cast_vote(user_id, score) {
            Ok(()) => {
                metrics::record_vote(Ok(()));
                if let Some(team_id) = self.engine.state().presenting_team_id.clone() {
                    self.emitter.emit(Event::VoteCast {
                        timestamp: Utc::now(),
                        user_id: user_id.clone(),
                        team_id,
                        score,
                    });
                }
                self.broadcast();
                self.schedule_quorum_check();
                EventReply::accepted()
            }
            Err(e) => {
                if let SessionError::InvalidVote(reason) = &e {
                    metrics::record_vote(Err(*reason));
                }
                debug!(user_id = %user_id, error = %e, "vote rejected");
                EventReply::rejected(e.to_string())
            }
        }
    }

    fn timer_reply(result: Result<bool, SessionError>) -> Result<EventReply, SessionError> {
        result.map(|changed| {
            if changed {
                EventReply::accepted()
            } else {
                EventReply::rejected("timer unchanged")
            }
        })
    }

    fn restart(&mut self) -> EventReply {
        self.stop_monitor();
        self.quorum_pending = None;
        self.engine.restart();
        let policy = self.engine.settings().restart_policy;
        self.emitter.emit(Event::SessionRestarted {
            timestamp: Utc::now(),
            policy,
        });
        metrics::set_participants_connected(self.engine.state().connected_count());
        if policy == RestartPolicy::ClearRoster {
            let _ = self.outbound.send(Outbound::SessionRestart);
        }
        EventReply::accepted()
    }

    fn after_disconnect(&mut self) {
        metrics::set_participants_connected(self.engine.state().connected_count());
        self.broadcast();
        // A departing voter can complete the quorum.
        self.schedule_quorum_check();
    }

    // ------------------------------------------------------------------
    // Monitor
    // ------------------------------------------------------------------

    fn restart_monitor(&mut self) {
        self.stop_monitor();
        if !self.engine.phase().is_timed() {
            return;
        }
        self.next_generation += 1;
        self.monitor = Some(spawn_monitor(
            self.weak_tx.clone(),
            self.next_generation,
            self.options.tick_interval,
            &self.cancel,
        ));
    }

    fn stop_monitor(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop();
        }
    }

    fn handle_tick(&mut self, generation: u64) {
        if self.monitor.as_ref().map(MonitorHandle::generation) != Some(generation) {
            debug!(generation, "stale tick ignored");
            return;
        }
        match evaluate_tick(&mut self.engine) {
            TickOutcome::Stop => self.stop_monitor(),
            TickOutcome::Broadcast => self.broadcast(),
            TickOutcome::Advanced { from, .. } => {
                self.record_transition(from);
                self.broadcast();
            }
        }
    }

    // ------------------------------------------------------------------
    // Quorum
    // ------------------------------------------------------------------

    fn schedule_quorum_check(&mut self) {
        if !self.options.auto_advance_on_quorum
            || self.engine.phase() != Phase::Voting
            || !self.engine.check_quorum()
        {
            return;
        }
        let round = self.engine.round();
        if self.quorum_pending == Some(round) {
            return;
        }
        self.quorum_pending = Some(round);

        let tx = self.weak_tx.clone();
        let grace = self.options.quorum_grace;
        let cancel = self.cancel.clone();
        debug!(round, ?grace, "quorum reached; check scheduled");
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(grace) => {
                    if let Some(tx) = tx.upgrade() {
                        let _ = tx.send(Command::QuorumCheck { round }).await;
                    }
                }
            }
        });
    }

    fn handle_quorum_check(&mut self, round: u64) {
        if self.quorum_pending == Some(round) {
            self.quorum_pending = None;
        }
        if self.engine.phase() != Phase::Voting
            || self.engine.round() != round
            || !self.engine.check_quorum()
        {
            debug!(round, "quorum check no longer applies");
            return;
        }
        info!(round, "quorum reached; advancing");
        let before = self.engine.phase();
        match self.next_step() {
            Ok(_) => {
                self.record_transition(before);
                self.broadcast();
            }
            Err(e) => debug!(error = %e, "quorum advance rejected"),
        }
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    fn emit_tally(&self, team_id: Option<TeamId>, tallied: Option<f64>) {
        let (Some(team_id), Some(mean)) = (team_id, tallied) else {
            return;
        };
        let total = self
            .engine
            .state()
            .teams
            .get(&team_id)
            .map_or(mean, |t| t.score);
        self.emitter.emit(Event::ScoresTallied {
            timestamp: Utc::now(),
            team_id,
            mean,
            total,
        });
    }

    fn record_transition(&self, before: Phase) {
        let after = self.engine.phase();
        if before == after {
            return;
        }
        metrics::record_phase_transition(before, after);
        self.emitter.emit(Event::PhaseEntered {
            timestamp: Utc::now(),
            from: before,
            to: after,
            presenting_team_id: self.engine.state().presenting_team_id.clone(),
        });
    }

    fn broadcast(&self) {
        // No subscribers is fine; the next subscriber reads a fresh snapshot.
        let _ = self
            .outbound
            .send(Outbound::StateUpdate(Box::new(self.engine.snapshot())));
    }
}
