//! Domain core for cryoflow job orchestration.
//!
//! Pure, I/O-free building blocks shared by the submission pipeline, the
//! notification hub, and the API server:
//!
//! - [`params`] -- typed accessors over the loosely structured parameter bag.
//! - [`builders`] -- the per-kind command builder contract and registry.
//! - [`job_events`] -- job status events and WebSocket frame types.

pub mod builders;
pub mod error;
pub mod job_events;
pub mod params;
pub mod types;
