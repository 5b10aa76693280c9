//! Timer monitor.
//!
//! A background task that delivers a [`Command::Tick`] into the actor queue
//! once per interval. The monitor never touches session state itself; the
//! actor evaluates each tick with [`evaluate_tick`].

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::command::Command;
use crate::session::{Phase, SessionEngine};

/// What the actor should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing left to monitor; cancel the monitor.
    Stop,
    /// Push a fresh snapshot and keep ticking.
    Broadcast,
    /// The countdown lapsed and the session moved on; push and keep ticking.
    Advanced {
        /// Phase before the tick
        from: Phase,
        /// Phase after the tick
        to: Phase,
    },
}

/// Evaluates one monitor tick against the engine.
///
/// 1. LOBBY or LEADERBOARD: stop.
/// 2. Paused countdown: broadcast.
/// 3. No deadline in VOTING: broadcast.
/// 4. No deadline otherwise: stop.
/// 5. Deadline not reached: broadcast.
/// 6. Deadline reached: PREP advances to the first presentation,
///    PRESENTING opens voting.
pub fn evaluate_tick(engine: &mut SessionEngine) -> TickOutcome {
    let from = engine.phase();
    if matches!(from, Phase::Lobby | Phase::Leaderboard) {
        return TickOutcome::Stop;
    }

    let timer = engine.state().timer;
    if timer.is_paused() {
        return TickOutcome::Broadcast;
    }
    if !timer.has_deadline() {
        return if from == Phase::Voting {
            TickOutcome::Broadcast
        } else {
            TickOutcome::Stop
        };
    }
    if !engine.timer_expired() {
        return TickOutcome::Broadcast;
    }

    let result = match from {
        Phase::Prep => engine.advance_presentation().map(|_| ()),
        Phase::Presenting => engine.start_voting(),
        _ => Ok(()),
    };
    if let Err(e) = result {
        warn!(error = %e, %from, "countdown expiry could not advance the session");
        return TickOutcome::Broadcast;
    }
    debug!(%from, to = %engine.phase(), "countdown expired");
    TickOutcome::Advanced {
        from,
        to: engine.phase(),
    }
}

/// Handle to a running monitor task.
#[derive(Debug)]
pub struct MonitorHandle {
    generation: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Generation stamped on this monitor's ticks.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Stops the monitor. Ticks already queued are discarded by generation.
    pub fn stop(self) {
        self.cancel.cancel();
        drop(self.task);
    }
}

/// Spawns a monitor that ticks every `period`, starting one period from now.
///
/// The monitor holds only a weak sender, so it never keeps the actor alive.
/// It exits when cancelled (directly or through `parent`), or when the
/// actor's queue is gone.
pub fn spawn_monitor(
    tx: mpsc::WeakSender<Command>,
    generation: u64,
    period: Duration,
    parent: &CancellationToken,
) -> MonitorHandle {
    let cancel = parent.child_token();
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(generation, "timer monitor started");
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = interval.tick() => {
                    let Some(tx) = tx.upgrade() else { break };
                    if tx.send(Command::Tick { generation }).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!(generation, "timer monitor stopped");
    });
    MonitorHandle {
        generation,
        cancel,
        task,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::session::{ContextPool, ManualClock, SessionSettings, UserId};

    fn engine() -> (SessionEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let mut engine = SessionEngine::with_rng(
            SessionSettings::default(),
            ContextPool::default(),
            clock.clone(),
            StdRng::seed_from_u64(9),
        );
        for i in 0..4 {
            engine.join(&UserId::new(format!("u{i}")), "x").unwrap();
        }
        engine.create_teams(2).unwrap();
        (engine, clock)
    }

    #[test]
    fn lobby_stops() {
        let (mut engine, _) = engine();
        assert_eq!(evaluate_tick(&mut engine), TickOutcome::Stop);
    }

    #[test]
    fn prep_expiry_advances_to_presenting() {
        let (mut engine, clock) = engine();
        engine.start_prep(Some(Duration::from_secs(5))).unwrap();
        clock.advance(Duration::from_secs(4));
        assert_eq!(evaluate_tick(&mut engine), TickOutcome::Broadcast);
        clock.advance(Duration::from_secs(1));
        assert_eq!(
            evaluate_tick(&mut engine),
            TickOutcome::Advanced {
                from: Phase::Prep,
                to: Phase::Presenting
            }
        );
        assert!(engine.state().presenting_team_id.is_some());
    }

    #[test]
    fn presenting_expiry_opens_voting_and_voting_keeps_ticking() {
        let (mut engine, clock) = engine();
        engine.advance_presentation().unwrap();
        clock.advance(Duration::from_secs(181));
        assert_eq!(
            evaluate_tick(&mut engine),
            TickOutcome::Advanced {
                from: Phase::Presenting,
                to: Phase::Voting
            }
        );
        assert_eq!(evaluate_tick(&mut engine), TickOutcome::Broadcast);
    }

    #[test]
    fn paused_timer_never_expires() {
        let (mut engine, clock) = engine();
        engine.start_prep(Some(Duration::from_secs(2))).unwrap();
        engine.pause_timer().unwrap();
        clock.advance(Duration::from_secs(60));
        assert_eq!(evaluate_tick(&mut engine), TickOutcome::Broadcast);
        assert_eq!(engine.phase(), Phase::Prep);
    }

    #[test]
    fn leaderboard_stops() {
        let (mut engine, _) = engine();
        while engine.advance_presentation().unwrap() {
            engine.start_voting().unwrap();
        }
        assert_eq!(evaluate_tick(&mut engine), TickOutcome::Stop);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_ticks_until_stopped() {
        let (tx, mut rx) = mpsc::channel(8);
        let parent = CancellationToken::new();
        let handle = spawn_monitor(tx.downgrade(), 3, Duration::from_secs(1), &parent);
        assert_eq!(handle.generation(), 3);

        tokio::time::advance(Duration::from_millis(1001)).await;
        match rx.recv().await {
            Some(Command::Tick { generation }) => assert_eq!(generation, 3),
            other => panic!("expected tick, got {other:?}"),
        }

        handle.stop();
        tokio::time::advance(Duration::from_secs(5)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancel_stops_monitor() {
        let (tx, mut rx) = mpsc::channel(8);
        let parent = CancellationToken::new();
        let _handle = spawn_monitor(tx.downgrade(), 1, Duration::from_secs(1), &parent);
        parent.cancel();
        tokio::time::advance(Duration::from_secs(3)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(rx.try_recv().is_err());
    }
}
