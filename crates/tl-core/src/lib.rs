//! tl-core: stable foundation for tlmflow.
//!
//! Contains:
//! - ids (compact arena indices for components and connections)
//! - error (shared error types)
//! - numeric (Real + tolerances + float helpers)
//! - limits (limiter functions and their derivatives for Newton Jacobians)
//! - units (uom-backed conversion of unit-suffixed parameter values)
//! - timing (wall-clock timers)

pub mod error;
pub mod ids;
pub mod limits;
pub mod numeric;
pub mod timing;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{TlError, TlResult};
pub use ids::*;
pub use numeric::*;
