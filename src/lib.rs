//! Off-policy evaluation of linear action-value functions on Mountain Car.
//!
//! Trajectories are generated by a behavior policy and summarised into the linear statistics
//! `(A, b, M⁻¹)` of a target policy under Tree-Backup or Retrace eligibility traces.
//! The mean-squared Bellman projected error of any linear value function can then be computed
//! from those statistics without further simulation.
#![warn(clippy::cast_lossless)]
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)]
pub mod envs;
mod error;
pub mod estimation;
pub mod features;
pub mod logging;
pub mod policies;
pub mod simulation;
pub mod storage;
pub mod utils;

pub use envs::{Environment, MountainCar, MountainCarState, Successor, Throttle};
pub use error::OpeError;
pub use estimation::{LinearStatistics, ReturnType, StatisticsConfig, StatisticsEstimator};
pub use features::{Features, TileCoder};
pub use policies::{MomentumPolicy, Policy};
pub use simulation::{Episode, SimulationConfig, Step};

/// Pseudo-random number generator used for all sampling.
pub type Prng = rand_chacha::ChaCha8Rng;
