//! Time-driven behavior of a running session: countdown expiry, monitor
//! replacement and the quorum grace period. All tests run on tokio's
//! paused clock.

mod common;

use std::time::Duration;

use common::TestSession;
use pitchroom::runtime::{InboundEvent, Outbound, RuntimeOptions};
use pitchroom::session::{Phase, SessionSettings, SessionSnapshot, UserId};

fn audience(snap: &SessionSnapshot) -> Vec<UserId> {
    snap.users
        .values()
        .filter(|u| u.connected && u.team_id != snap.presenting_team_id)
        .map(|u| u.id.clone())
        .collect()
}

async fn on_stage_voting(session: &TestSession, users: usize, teams: usize) -> SessionSnapshot {
    session.join_users(users).await;
    session.accept(InboundEvent::CreateTeams { count: teams }).await;
    session.accept(InboundEvent::AdvancePresentation).await;
    session.accept(InboundEvent::NextStep).await;
    let snap = session.handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Voting);
    snap
}

// ============================================================================
// Countdown expiry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn presentation_expiry_opens_voting_and_voting_waits() {
    let settings = SessionSettings {
        presentation_duration: Duration::from_secs(5),
        ..SessionSettings::default()
    };
    let session = TestSession::start_with(settings, RuntimeOptions::default());
    session.join_users(4).await;
    session.accept(InboundEvent::CreateTeams { count: 2 }).await;
    session.accept(InboundEvent::AdvancePresentation).await;

    tokio::time::sleep(Duration::from_millis(4500)).await;
    let snap = session.handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Presenting);
    assert_eq!(snap.timer_seconds_remaining, 0);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        session.handle.snapshot().await.unwrap().phase,
        Phase::Voting
    );

    // Voting has no countdown; only votes or the host end it.
    tokio::time::sleep(Duration::from_secs(600)).await;
    let snap = session.handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Voting);
    assert_eq!(snap.timer_seconds_remaining, 0);
}

#[tokio::test(start_paused = true)]
async fn paused_countdown_never_expires() {
    let session = TestSession::start(RuntimeOptions::default());
    session.join_users(2).await;
    session.accept(InboundEvent::CreateTeams { count: 1 }).await;
    session
        .accept(InboundEvent::StartPrep { seconds: Some(10) })
        .await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    session.accept(InboundEvent::PauseTimer).await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    let snap = session.handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Prep);
    assert!(snap.timer_paused);
    assert_eq!(snap.timer_seconds_remaining, 7);

    session.accept(InboundEvent::ResumeTimer).await;
    tokio::time::sleep(Duration::from_millis(7500)).await;
    assert_eq!(
        session.handle.snapshot().await.unwrap().phase,
        Phase::Presenting
    );
}

#[tokio::test(start_paused = true)]
async fn manual_advance_replaces_prep_monitor() {
    let session = TestSession::start(RuntimeOptions::default());
    session.join_users(4).await;
    session.accept(InboundEvent::CreateTeams { count: 2 }).await;
    session
        .accept(InboundEvent::StartPrep { seconds: Some(2) })
        .await;
    session.accept(InboundEvent::AdvancePresentation).await;

    // The prep deadline passes; the first presentation must not be cut short.
    tokio::time::sleep(Duration::from_millis(3500)).await;
    let snap = session.handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Presenting);
    assert_eq!(snap.presented_team_ids.len(), 1);
    assert_eq!(snap.timer_seconds_remaining, 176);
}

#[tokio::test(start_paused = true)]
async fn ticks_push_countdown_updates() {
    let session = TestSession::start(RuntimeOptions::default());
    session.join_users(2).await;
    session.accept(InboundEvent::CreateTeams { count: 1 }).await;
    let mut rx = session.handle.subscribe();
    session
        .accept(InboundEvent::StartPrep { seconds: Some(30) })
        .await;

    let mut seen = Vec::new();
    while seen.len() < 3 {
        if let Outbound::StateUpdate(snap) = rx.recv().await.unwrap() {
            seen.push(snap.timer_seconds_remaining);
        }
    }
    assert_eq!(seen, vec![30, 29, 28]);
}

// ============================================================================
// Quorum grace period
// ============================================================================

#[tokio::test(start_paused = true)]
async fn burst_of_final_votes_tallies_once() {
    let (session, captured) =
        TestSession::start_recording(SessionSettings::default(), RuntimeOptions::default());
    let snap = on_stage_voting(&session, 6, 2).await;
    let first = snap.presenting_team_id.clone().unwrap();
    let voters = audience(&snap);
    assert_eq!(voters.len(), 3);

    // Concurrent submissions interleave in the actor queue.
    let tasks: Vec<_> = voters
        .into_iter()
        .zip([2, 5, 8])
        .map(|(user_id, score)| {
            let handle = session.handle.clone();
            tokio::spawn(async move {
                handle
                    .dispatch(InboundEvent::CastVote { user_id, score })
                    .await
            })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().unwrap().accepted);
    }

    // Still inside the grace period.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        session.handle.snapshot().await.unwrap().phase,
        Phase::Voting
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
    let snap = session.handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Presenting);
    assert_ne!(snap.presenting_team_id.as_ref(), Some(&first));
    assert_eq!(snap.teams[&first].score, 5.0);
    assert!(snap.teams[&first].votes_current_round.is_empty());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(captured.count("scores_tallied"), 1);
    assert_eq!(captured.count("vote_cast"), 3);
}

#[tokio::test(start_paused = true)]
async fn host_advance_during_grace_wins() {
    let session = TestSession::start(RuntimeOptions::default());
    let snap = on_stage_voting(&session, 4, 2).await;
    for (id, score) in audience(&snap).into_iter().zip([6, 8]) {
        session
            .accept(InboundEvent::CastVote { user_id: id, score })
            .await;
    }

    let reply = session.accept(InboundEvent::NextStep).await;
    assert_eq!(reply.more_teams, Some(true));

    // The pending check finds a new round and does nothing.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let snap = session.handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Presenting);
    assert_eq!(snap.presented_team_ids.len(), 2);
    let scores: Vec<f64> = snap.teams.values().map(|t| t.score).collect();
    assert!(scores.contains(&7.0));
    assert!(scores.contains(&0.0));
}

#[tokio::test(start_paused = true)]
async fn disconnect_can_complete_quorum() {
    let session = TestSession::start(RuntimeOptions::default());
    let snap = on_stage_voting(&session, 4, 2).await;
    let voters = audience(&snap);
    session
        .accept(InboundEvent::CastVote {
            user_id: voters[0].clone(),
            score: 9,
        })
        .await;
    session
        .accept(InboundEvent::Disconnect {
            user_id: voters[1].clone(),
        })
        .await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    let snap = session.handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Presenting);
    assert_eq!(snap.presented_team_ids.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn auto_advance_can_be_disabled() {
    let options = RuntimeOptions {
        auto_advance_on_quorum: false,
        ..RuntimeOptions::default()
    };
    let session = TestSession::start(options);
    let snap = on_stage_voting(&session, 4, 2).await;
    for id in audience(&snap) {
        session
            .accept(InboundEvent::CastVote {
                user_id: id,
                score: 3,
            })
            .await;
    }

    tokio::time::sleep(Duration::from_secs(10)).await;
    let snap = session.handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Voting);
    let presenting = snap.presenting_team_id.unwrap();
    assert_eq!(snap.teams[&presenting].votes_current_round, vec![3, 3]);
}
