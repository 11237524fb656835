//! # Score Submission Server Library
//!
//! This library provides the authoritative admission server for game-run
//! submissions. Clients report a finished run (display name, claimed score,
//! run duration and the input event trace) and the server decides whether
//! the run is plausible before it reaches the ranked leaderboard.
//!
//! ## Core Responsibilities
//!
//! ### Abuse Prevention
//! Every client is limited to a fixed number of attempts inside a sliding
//! time window. Attempts are counted whether or not they are accepted, so
//! resubmitting a rejected run over and over is throttled too.
//!
//! ### Plausibility Checking
//! The claimed score is bounded by a model of what could have been reached
//! in the reported time. The input trace must be well formed, ordered in
//! time and human in cadence. This is a heuristic filter, not a proof: the
//! thresholds trade rejecting very fast legitimate players against admitting
//! carefully fabricated traces, and every threshold is configurable.
//!
//! ### Leaderboard Serving
//! Admitted runs are normalized and handed to a leaderboard store, which
//! answers ranked queries (highest score first, earlier submission first on
//! a tie).
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Admission Loop
//! The admission pipeline is owned by one event loop. Network tasks decode
//! and encode packets concurrently, but every rate limit check and every
//! store insert happens sequentially on the main loop. Two simultaneous
//! attempts from the same client can never both slip past a full window.
//!
//! ### Cheapest Gate First
//! Submissions pass the gates in order of cost: rate limit, name syntax,
//! payload shape, then the trace walk. The store is only touched once every
//! gate has passed.
//!
//! ### UDP-Based Communication
//! Requests and replies are single `bincode`-encoded datagrams, see
//! [`shared::Packet`].
//!
//! ## Module Organization
//!
//! ### Rate Limiter Module (`rate_limiter`)
//! Sliding-window attempt counting per client with periodic sweeping of
//! clients that went quiet.
//!
//! ### Name Module (`name`)
//! Display name syntax rules.
//!
//! ### Plausibility Module (`plausibility`)
//! Trace validation and the score capacity model, with all constants in
//! [`plausibility::PlausibilityConfig`].
//!
//! ### Admission Module (`admission`)
//! The ordered gate chain, rejection reasons and record normalization.
//!
//! ### Leaderboard Module (`leaderboard`)
//! The store abstraction and an in-memory implementation.
//!
//! ### Network Module (`network`)
//! UDP socket management, packet dispatch and the main loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::admission::AdmissionConfig;
//! use server::leaderboard::MemoryStore;
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         AdmissionConfig::default(),
//!         MemoryStore::new(),
//!         Duration::from_secs(30), // rate limiter sweep interval
//!     )
//!     .await?;
//!
//!     // Runs until a shutdown handle fires:
//!     // - Receives submissions, leaderboard queries and pings
//!     // - Admits or rejects each submission in arrival order
//!     // - Replies to the sender
//!     // - Sweeps stale rate limiter entries on a timer
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod leaderboard;
pub mod name;
pub mod network;
pub mod plausibility;
pub mod rate_limiter;
pub mod utils;
