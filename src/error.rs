//! Error type
use crate::estimation::{ParseReturnTypeError, StatisticsError};
use crate::logging::LogError;
use crate::simulation::SimulationError;
use crate::storage::StorageError;
use crate::utils::save::SerdeSaveLoadError;
use thiserror::Error;

/// Error from the off-policy evaluation crate.
#[derive(Error, Debug)]
pub enum OpeError {
    #[error("simulation error")]
    Simulation(#[from] SimulationError),
    #[error("error computing statistics")]
    Statistics(#[from] StatisticsError),
    #[error(transparent)]
    ReturnType(#[from] ParseReturnTypeError),
    #[error("error saving or loading data")]
    SaveLoad(#[from] SerdeSaveLoadError),
    #[error("data directory error")]
    Storage(#[from] StorageError),
    #[error("logging error")]
    Log(#[from] LogError),
}
