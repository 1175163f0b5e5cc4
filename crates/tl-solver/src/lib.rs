//! Local numerical machinery used inside a single component's timestep.
//!
//! - [`EquationSystemSolver`]: weighted Newton-Raphson step with an LU solve
//! - [`jacobian`]: finite-difference Jacobians for checking analytic ones
//! - [`Delay`]: fixed-length history buffer seeded at initialize

pub mod delay;
pub mod equation_system;
pub mod error;
pub mod jacobian;

pub use delay::Delay;
pub use equation_system::{EquationSystemSolver, SolveStatus};
pub use error::{SolverError, SolverResult};
