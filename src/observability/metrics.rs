//! Metrics collection.
//!
//! Prometheus-compatible metrics behind the `metrics` facade. Every label
//! value comes from a closed enum, so cardinality is bounded by
//! construction.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{PitchroomError, VoteRejection};
use crate::session::Phase;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `PitchroomError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), PitchroomError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| PitchroomError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "pitchroom_events_total",
        "Inbound session events processed, by action"
    );
    describe_counter!(
        "pitchroom_votes_total",
        "Votes submitted, by outcome"
    );
    describe_counter!(
        "pitchroom_phase_transitions_total",
        "Phase transitions, by source and target phase"
    );
    describe_gauge!(
        "pitchroom_participants_connected",
        "Participants with a live connection"
    );
    describe_gauge!(
        "pitchroom_current_phase",
        "Currently active phase (1 = active)"
    );
}

/// Records a processed inbound event.
pub fn record_event(action: &'static str) {
    counter!("pitchroom_events_total", "action" => action).increment(1);
}

/// Records a vote submission and how it was handled.
pub fn record_vote(outcome: Result<(), VoteRejection>) {
    counter!("pitchroom_votes_total", "outcome" => vote_outcome_label(outcome)).increment(1);
}

/// Label for a vote outcome.
#[must_use]
pub const fn vote_outcome_label(outcome: Result<(), VoteRejection>) -> &'static str {
    match outcome {
        Ok(()) => "accepted",
        Err(VoteRejection::WrongPhase) => "wrong_phase",
        Err(VoteRejection::NoPresentingTeam) => "no_presenting_team",
        Err(VoteRejection::UnknownVoter) => "unknown_voter",
        Err(VoteRejection::OwnTeam) => "own_team",
        Err(VoteRejection::AlreadyVoted) => "already_voted",
        Err(VoteRejection::OutOfRange { .. }) => "out_of_range",
    }
}

/// Records a phase transition and moves the current-phase gauge.
pub fn record_phase_transition(from: Phase, to: Phase) {
    counter!(
        "pitchroom_phase_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    set_current_phase(to);
}

/// Sets the current-phase gauge to 1 for `phase` and 0 for every other phase.
pub fn set_current_phase(phase: Phase) {
    for p in Phase::ALL {
        let value = if p == phase { 1.0 } else { 0.0 };
        gauge!("pitchroom_current_phase", "phase" => p.as_str()).set(value);
    }
}

/// Sets the number of connected participants.
#[allow(clippy::cast_precision_loss)]
pub fn set_participants_connected(count: usize) {
    gauge!("pitchroom_participants_connected").set(count as f64);
}
