//! Submission admission pipeline
//!
//! Every submission passes the same ordered gates, cheapest first:
//! 1. Rate limiter (per client, counts every attempt)
//! 2. Display name syntax
//! 3. Numeric payload fields
//! 4. Plausibility of the run
//!
//! The first failing gate decides the outcome and nothing after it runs.
//! Only a submission that passes every gate reaches the leaderboard store.

use crate::leaderboard::{LeaderboardRecord, LeaderboardStore, RecordId, StoreError};
use crate::name::NameValidator;
use crate::plausibility::{PlausibilityConfig, PlausibilityEngine, PlausibilityFailure};
use crate::rate_limiter::{RateLimiter, DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW_MS};
use log::{debug, info, warn};
use shared::{Diagnostics, LeaderboardEntry, SubmissionAttempt};

pub const DEFAULT_TOP_LIMIT: u32 = 10;
pub const MIN_TOP_LIMIT: u32 = 5;
pub const MAX_TOP_LIMIT: u32 = 50;

/// Everything needed to build an [`AdmissionPipeline`]
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionConfig {
    pub rate_window_ms: u64,
    pub rate_max_attempts: usize,
    pub names: NameValidator,
    pub plausibility: PlausibilityConfig,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            rate_window_ms: DEFAULT_WINDOW_MS,
            rate_max_attempts: DEFAULT_MAX_ATTEMPTS,
            names: NameValidator::default(),
            plausibility: PlausibilityConfig::default(),
        }
    }
}

/// Expected, terminal outcomes for a submission that was not admitted
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("rate limited")]
    RateLimited,
    #[error("bad name")]
    BadName,
    #[error("bad payload")]
    BadPayload,
    #[error("plausibility failed: {reason}")]
    PlausibilityFailed {
        reason: PlausibilityFailure,
        diagnostics: Option<Diagnostics>,
    },
}

impl Rejection {
    /// Stable machine-readable reason code
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::RateLimited => "rate_limited",
            Rejection::BadName => "bad_name",
            Rejection::BadPayload => "bad_payload",
            Rejection::PlausibilityFailed { .. } => "plausibility_failed",
        }
    }

    pub fn detail(&self) -> Option<&'static str> {
        match self {
            Rejection::PlausibilityFailed { reason, .. } => Some(reason.as_str()),
            _ => None,
        }
    }

    pub fn diagnostics(&self) -> Option<Diagnostics> {
        match self {
            Rejection::PlausibilityFailed { diagnostics, .. } => *diagnostics,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmitError {
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl SubmitError {
    pub fn code(&self) -> &'static str {
        match self {
            SubmitError::Rejected(rejection) => rejection.code(),
            SubmitError::Storage(_) => "storage_error",
        }
    }

    /// Storage faults are infrastructure problems the caller may retry.
    /// Validation and policy rejections are final for this attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::Storage(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    pub id: RecordId,
    pub record: LeaderboardRecord,
    pub diagnostics: Diagnostics,
}

/// Runs `gates` in order and stops at the first failure
pub fn first_failure<'a, E, I>(gates: I) -> Result<(), E>
where
    I: IntoIterator<Item = Box<dyn FnOnce() -> Result<(), E> + 'a>>,
{
    for gate in gates {
        gate()?;
    }
    Ok(())
}

/// Clamps a requested leaderboard size into the supported range
pub fn clamp_top_limit(limit: Option<u32>) -> usize {
    limit
        .unwrap_or(DEFAULT_TOP_LIMIT)
        .clamp(MIN_TOP_LIMIT, MAX_TOP_LIMIT) as usize
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

pub struct AdmissionPipeline<S: LeaderboardStore> {
    limiter: RateLimiter,
    names: NameValidator,
    engine: PlausibilityEngine,
    store: S,
}

impl<S: LeaderboardStore> AdmissionPipeline<S> {
    pub fn new(config: AdmissionConfig, store: S) -> Self {
        Self {
            limiter: RateLimiter::new(config.rate_window_ms, config.rate_max_attempts),
            names: config.names,
            engine: PlausibilityEngine::new(config.plausibility),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Admits or rejects one submission from `client_id` at time `now` (ms)
    ///
    /// On success the normalized record has been handed to the store and the
    /// store's identifier is returned alongside it.
    pub fn submit(
        &mut self,
        client_id: &str,
        attempt: &SubmissionAttempt,
        now: u64,
    ) -> Result<Accepted, SubmitError> {
        let limiter = &mut self.limiter;
        let names = &self.names;
        let engine = &self.engine;
        let mut diagnostics = None;

        let outcome = first_failure([
            Box::new(|| {
                if limiter.check_and_record(client_id, now) {
                    Ok(())
                } else {
                    Err(Rejection::RateLimited)
                }
            }) as Box<dyn FnOnce() -> Result<(), Rejection> + '_>,
            Box::new(|| {
                if names.is_valid(attempt.name.as_deref()) {
                    Ok(())
                } else {
                    Err(Rejection::BadName)
                }
            }),
            Box::new(|| {
                let (Some(score), Some(run_ms)) =
                    (finite(attempt.claimed_score), finite(attempt.run_ms))
                else {
                    return Err(Rejection::BadPayload);
                };

                let verdict = engine.evaluate(score, run_ms, attempt.events.as_deref());
                match verdict.reason {
                    None => {
                        diagnostics = verdict.diagnostics;
                        Ok(())
                    }
                    Some(reason) => Err(Rejection::PlausibilityFailed {
                        reason,
                        diagnostics: verdict.diagnostics,
                    }),
                }
            }),
        ]);

        if let Err(rejection) = outcome {
            debug!(
                "Rejected submission from {}: {} {}",
                client_id,
                rejection.code(),
                rejection.detail().unwrap_or("")
            );
            return Err(rejection.into());
        }

        let record = self.normalize(client_id, attempt, now);
        let id = self.store.insert(record.clone()).map_err(|e| {
            warn!("Failed to store submission from {}: {}", client_id, e);
            SubmitError::Storage(e)
        })?;

        info!(
            "Accepted {} (score {}, {}ms) from {} as record {}",
            record.name, record.score, record.run_ms, client_id, id
        );

        Ok(Accepted {
            id,
            record,
            diagnostics: diagnostics.unwrap_or_default(),
        })
    }

    /// Ranked leaderboard, `limit` clamped to `[5, 50]` and defaulting to 10
    pub fn list_top(&self, limit: Option<u32>) -> Result<Vec<LeaderboardEntry>, StoreError> {
        self.store.query_top(clamp_top_limit(limit))
    }

    pub fn sweep_rate_limiter(&mut self, now: u64) -> usize {
        self.limiter.sweep(now)
    }

    fn normalize(&self, client_id: &str, attempt: &SubmissionAttempt, now: u64) -> LeaderboardRecord {
        LeaderboardRecord {
            name: NameValidator::normalize(attempt.name.as_deref().unwrap_or_default()),
            score: attempt.claimed_score.unwrap_or_default().trunc() as i64,
            run_ms: attempt.run_ms.unwrap_or_default().trunc() as i64,
            events_count: attempt.events_count(),
            client_id: client_id.to_string(),
            created_at: now,
        }
    }
}
