//! Application service layer for tlmflow.
//!
//! Wraps a root `ComponentSystem` behind [`Simulation`]: model construction,
//! blocking and background runs, access to recorded series and to the
//! message queue. Shared by the CLI and any other front end.

pub mod config;
pub mod demos;
pub mod error;
pub mod query;
pub mod simulation;

pub use config::{load_sim_config, parse_sim_config};
pub use demos::{Demo, build_demo};
pub use error::{AppError, AppResult};
pub use query::{Column, RunSummary, list_ports, summarize, to_csv};
pub use simulation::{ParameterInput, RunHandle, Simulation};

pub use tl_kernel::{Message, Progress, RunReport, RunStatus, Severity, SimConfig};
