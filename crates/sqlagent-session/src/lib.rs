//! sqlagent-session
//!
//! Client-side state for the query explorer: one cache of server records
//! and the three consumers that derive views from it.
//!
//! Public API:
//! - [`QueryCache`] — per-id details, history listing, invalidation, polling
//! - [`SubmissionController`] — one question at a time, thread continuity
//! - [`HistoryView`] — polled listing with loading/error/ready and selection
//! - [`ResultView`] — the active record, with stale-response protection
//! - [`Explorer`] — owns all of the above and wires them together
//!
//! All state lives behind `tokio` mutexes that are never held across a
//! network call, so the types are equally at home on a single-threaded
//! runtime.

pub mod cache;
pub mod error;
pub mod explorer;
pub mod history;
pub mod result;
pub mod submission;

pub use crate::cache::{HistorySnapshot, QueryCache, RefreshOutcome};
pub use crate::error::SubmitError;
pub use crate::explorer::Explorer;
pub use crate::history::{HISTORY_POLL_INTERVAL, HistoryState, HistoryView};
pub use crate::result::{FetchOutcome, ResultBody, ResultDisplay, ResultMeta, ResultView};
pub use crate::submission::{SubmissionController, SubmissionPhase};
