//! Run plausibility checks
//!
//! Decides whether a claimed score could have been reached in the reported
//! run time with the reported input trace. The checks are a heuristic fraud
//! filter: they bound the shape of a believable run, they do not prove that
//! the run happened.
//!
//! Evaluation is a fixed sequence of gates and the first failing gate decides
//! the verdict:
//! 1. Run duration within bounds
//! 2. Trace present
//! 3. Trace length within bounds
//! 4. Every entry is a well-formed event and timestamps never decrease
//! 5. Move cadence below the human limit
//! 6. Claimed score within the capacity model (with slack)

use shared::{Diagnostics, TraceEntry, MOVE_EVENT};

/// Tunable constants of the plausibility model.
///
/// Durations are in milliseconds unless the field name says otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct PlausibilityConfig {
    /// Shortest accepted run (ms)
    pub min_run_ms: f64,
    /// Longest accepted run (ms)
    pub max_run_ms: f64,
    /// Longest accepted trace
    pub max_events: usize,
    /// Highest sustained move rate a human is assumed to reach
    pub max_moves_per_second: f64,
    /// Floor for the elapsed time used as a divisor (seconds)
    pub min_elapsed_secs: f64,
    /// At most one scorable entity appears per this many milliseconds
    pub ms_per_entity: f64,
    /// Points an entity is worth at most
    pub points_per_entity: f64,
    /// Multiplier applied to the modelled maximum before rejecting
    pub score_slack_factor: f64,
    /// Event type counted as a move
    pub move_event_type: String,
}

impl Default for PlausibilityConfig {
    fn default() -> Self {
        Self {
            min_run_ms: 500.0,
            max_run_ms: 3_600_000.0,
            max_events: 2000,
            max_moves_per_second: 12.0,
            min_elapsed_secs: 0.001,
            ms_per_entity: 200.0,
            points_per_entity: 5.0,
            score_slack_factor: 2.0,
            move_event_type: MOVE_EVENT.to_string(),
        }
    }
}

/// Why a run was judged implausible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlausibilityFailure {
    #[error("too short")]
    RunTooShort,
    #[error("too long")]
    RunTooLong,
    #[error("invalid events")]
    InvalidEvents,
    #[error("too many events")]
    TooManyEvents,
    #[error("bad event format")]
    BadEventFormat,
    #[error("events timestamps not monotonic")]
    NonMonotonicTimestamps,
    #[error("too many moves per second")]
    TooManyMovesPerSecond,
    #[error("score implausible")]
    ScoreImplausible,
}

impl PlausibilityFailure {
    /// Borrowed form of the message, for rejection details that outlive a
    /// formatter
    pub fn as_str(&self) -> &'static str {
        match self {
            PlausibilityFailure::RunTooShort => "too short",
            PlausibilityFailure::RunTooLong => "too long",
            PlausibilityFailure::InvalidEvents => "invalid events",
            PlausibilityFailure::TooManyEvents => "too many events",
            PlausibilityFailure::BadEventFormat => "bad event format",
            PlausibilityFailure::NonMonotonicTimestamps => "events timestamps not monotonic",
            PlausibilityFailure::TooManyMovesPerSecond => "too many moves per second",
            PlausibilityFailure::ScoreImplausible => "score implausible",
        }
    }
}

/// Outcome of evaluating one run. Diagnostics are informational only.
#[derive(Debug, Clone, PartialEq)]
pub struct PlausibilityVerdict {
    pub accepted: bool,
    pub reason: Option<PlausibilityFailure>,
    pub diagnostics: Option<Diagnostics>,
}

impl PlausibilityVerdict {
    fn accept(diagnostics: Diagnostics) -> Self {
        Self {
            accepted: true,
            reason: None,
            diagnostics: Some(diagnostics),
        }
    }

    fn reject(reason: PlausibilityFailure, diagnostics: Option<Diagnostics>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
            diagnostics,
        }
    }
}

/// Result of the trace walk in gate 4
struct TraceSummary {
    moves: usize,
}

/// Unrounded output of the capacity model. Only the reported diagnostics are
/// rounded, the score ceiling is not.
struct CapacityModel {
    moves_per_second: f64,
    max_entities: f64,
    max_possible_score: f64,
}

impl CapacityModel {
    fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            moves_per_second: self.moves_per_second,
            max_entities: self.max_entities as u64,
            max_possible_score: self.max_possible_score as u64,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlausibilityEngine {
    config: PlausibilityConfig,
}

impl PlausibilityEngine {
    pub fn new(config: PlausibilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlausibilityConfig {
        &self.config
    }

    /// Runs every gate in order and returns the verdict of the first failure,
    /// or an acceptance carrying the model's diagnostics.
    ///
    /// `events` is `None` when the client did not send a sequence at all.
    pub fn evaluate(
        &self,
        claimed_score: f64,
        run_ms: f64,
        events: Option<&[TraceEntry]>,
    ) -> PlausibilityVerdict {
        match self.check(claimed_score, run_ms, events) {
            Ok(diagnostics) => PlausibilityVerdict::accept(diagnostics),
            Err((reason, diagnostics)) => PlausibilityVerdict::reject(reason, diagnostics),
        }
    }

    fn check(
        &self,
        claimed_score: f64,
        run_ms: f64,
        events: Option<&[TraceEntry]>,
    ) -> Result<Diagnostics, (PlausibilityFailure, Option<Diagnostics>)> {
        self.check_duration(run_ms).map_err(|e| (e, None))?;

        let events = events.ok_or((PlausibilityFailure::InvalidEvents, None))?;
        if events.len() > self.config.max_events {
            return Err((PlausibilityFailure::TooManyEvents, None));
        }

        let summary = self.walk_trace(events).map_err(|e| (e, None))?;
        let model = self.model(run_ms, summary.moves);
        let diagnostics = model.diagnostics();

        if model.moves_per_second > self.config.max_moves_per_second {
            return Err((PlausibilityFailure::TooManyMovesPerSecond, Some(diagnostics)));
        }

        let ceiling = model.max_possible_score * self.config.score_slack_factor;
        if claimed_score.is_nan() || claimed_score < 0.0 || claimed_score > ceiling {
            return Err((PlausibilityFailure::ScoreImplausible, Some(diagnostics)));
        }

        Ok(diagnostics)
    }

    fn check_duration(&self, run_ms: f64) -> Result<(), PlausibilityFailure> {
        if run_ms.is_nan() || run_ms < self.config.min_run_ms {
            return Err(PlausibilityFailure::RunTooShort);
        }
        if run_ms > self.config.max_run_ms {
            return Err(PlausibilityFailure::RunTooLong);
        }
        Ok(())
    }

    /// Single pass over the trace checking shape and ordering, counting moves
    fn walk_trace(&self, events: &[TraceEntry]) -> Result<TraceSummary, PlausibilityFailure> {
        let mut last_seen = 0.0;
        let mut moves = 0;

        for entry in events {
            let event = match entry {
                TraceEntry::Event(event) => event,
                TraceEntry::Malformed => return Err(PlausibilityFailure::BadEventFormat),
            };

            let t = match event.t {
                Some(t) if t.is_finite() => t,
                _ => return Err(PlausibilityFailure::BadEventFormat),
            };

            if t < last_seen {
                return Err(PlausibilityFailure::NonMonotonicTimestamps);
            }
            last_seen = t;

            if event.is_move(&self.config.move_event_type) {
                moves += 1;
            }
        }

        Ok(TraceSummary { moves })
    }

    fn model(&self, run_ms: f64, moves: usize) -> CapacityModel {
        let elapsed_secs = (run_ms / 1000.0).max(self.config.min_elapsed_secs);
        let max_entities = (run_ms / self.config.ms_per_entity).ceil();

        CapacityModel {
            moves_per_second: moves as f64 / elapsed_secs,
            max_entities,
            max_possible_score: max_entities * self.config.points_per_entity,
        }
    }
}
