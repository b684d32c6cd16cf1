//! # Sheetstream Exclusive
//!
//! Exclusive control for cells that are being worked on.
//!
//! A worker claims a cell by writing a marker of the form
//! `prefix_YYYY-MM-DD_HH:MM:SS_workerId[_feature]` into it. Other workers
//! parse the marker back, compute its age and compare it against a
//! feature-aware timeout table to decide whether the claim is stale.

pub mod error;
pub mod guard;
pub mod marker;
pub mod timeout;

pub use error::ExclusiveError;
pub use guard::{ClaimState, ExclusiveGuard};
pub use marker::ExclusiveMarker;
pub use timeout::TimeoutTable;
