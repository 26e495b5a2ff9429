//! Layout of generated data on disk.
//!
//! | File | Contents | Format |
//! |------|----------|--------|
//! | `dataset_{k}.cbor` | Episodes of batch `k` | CBOR |
//! | `test_points.json` | Probe set | JSON columns |
//! | `true_q.cbor` | Reference values, in probe order | CBOR |
//! | `statistics_{tb,retrace}_lambda{λ}_{settings}.cbor` | Cached [`LinearStatistics`] | CBOR |
//!
//! The `{settings}` part of a statistics file name identifies the [`EstimatorSettings`].
use crate::envs::{MountainCarConfig, MountainCarState, Throttle};
use crate::estimation::{LinearStatistics, StatisticsConfig, StatisticsEstimator};
use crate::features::{TileCoder, TileCoderConfig};
use crate::policies::MomentumPolicy;
use crate::simulation::{Episode, Probe, ProbeSet};
use crate::utils::save::{load_json, save_cbor, save_json, SaveLoad, SerdeSaveLoadError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    SaveLoad(#[from] SerdeSaveLoadError),
    #[error("failed to create data directory: {0}")]
    CreateDir(#[source] io::Error),
    #[error("test point columns have different lengths")]
    RaggedTestPoints,
    #[error("invalid action code {0}")]
    InvalidAction(i8),
}

/// Mountain Car probe set in the columnar form stored in `test_points.json`.
///
/// Actions are stored by their integer code (see [`Throttle::code`]).
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPoints {
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
    pub actions: Vec<i8>,
}

impl From<&[Probe<MountainCarState, Throttle>]> for TestPoints {
    fn from(probes: &[Probe<MountainCarState, Throttle>]) -> Self {
        Self {
            positions: probes.iter().map(|p| p.state.position).collect(),
            velocities: probes.iter().map(|p| p.state.velocity).collect(),
            actions: probes.iter().map(|p| p.action.code()).collect(),
        }
    }
}

impl TestPoints {
    /// Convert into a probe set.
    ///
    /// # Errors
    /// If the columns have different lengths or an action code is invalid.
    pub fn into_probes(self) -> Result<ProbeSet<MountainCarState, Throttle>, StorageError> {
        if self.positions.len() != self.velocities.len()
            || self.positions.len() != self.actions.len()
        {
            return Err(StorageError::RaggedTestPoints);
        }
        self.positions
            .into_iter()
            .zip(self.velocities)
            .zip(self.actions)
            .map(|((position, velocity), code)| {
                Ok(Probe {
                    state: MountainCarState::new(position, velocity),
                    action: Throttle::from_code(code).ok_or(StorageError::InvalidAction(code))?,
                })
            })
            .collect()
    }
}

pub type MountainCarEstimator = StatisticsEstimator<MomentumPolicy, MomentumPolicy, TileCoder>;

/// Settings of a Mountain Car [`StatisticsEstimator`].
///
/// Together with a [`StatisticsConfig`] and a dataset these determine the statistics.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorSettings {
    pub discount_factor: f64,
    pub behavior: MomentumPolicy,
    pub target: MomentumPolicy,
    pub features: TileCoderConfig,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            discount_factor: MountainCarConfig::default().discount_factor,
            behavior: MomentumPolicy::behavior(),
            target: MomentumPolicy::target(),
            features: TileCoderConfig::default(),
        }
    }
}

impl EstimatorSettings {
    pub const fn estimator(&self) -> MountainCarEstimator {
        StatisticsEstimator::new(
            self.behavior,
            self.target,
            TileCoder::new(self.features),
            self.discount_factor,
        )
    }

    /// File name component; distinct settings give distinct names.
    fn file_tag(&self) -> String {
        format!(
            "gamma{}_target{}_behavior{}_tiles{}x{}",
            self.discount_factor,
            self.target.exploration_rate,
            self.behavior.exploration_rate,
            self.features.num_tilings,
            self.features.tiles_per_dim
        )
    }
}

/// Directory holding generated datasets, probes, reference values and cached statistics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory (and parents) if it does not exist.
    pub fn create(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(StorageError::CreateDir)
    }

    pub fn dataset_path(&self, batch: usize) -> PathBuf {
        self.root.join(format!("dataset_{}.cbor", batch))
    }

    pub fn test_points_path(&self) -> PathBuf {
        self.root.join("test_points.json")
    }

    pub fn reference_values_path(&self) -> PathBuf {
        self.root.join("true_q.cbor")
    }

    pub fn statistics_path(
        &self,
        batch: usize,
        settings: &EstimatorSettings,
        config: &StatisticsConfig,
    ) -> PathBuf {
        let mut name = format!(
            "statistics_{}_lambda{}_{}",
            config.return_type.file_tag(),
            config.lambda,
            settings.file_tag()
        );
        if let Some(limit) = config.episode_limit {
            name.push_str(&format!("_episodes{}", limit));
        }
        if batch != 0 {
            name.push_str(&format!("_batch{}", batch));
        }
        name.push_str(".cbor");
        self.root.join(name)
    }

    pub fn save_dataset<S, A>(
        &self,
        batch: usize,
        episodes: &[Episode<S, A>],
    ) -> Result<(), StorageError>
    where
        S: Serialize,
        A: Serialize,
    {
        Ok(save_cbor(episodes, self.dataset_path(batch))?)
    }

    pub fn load_dataset(
        &self,
        batch: usize,
    ) -> Result<Vec<Episode<MountainCarState, Throttle>>, StorageError> {
        Ok(Vec::<Episode<MountainCarState, Throttle>>::load(
            self.dataset_path(batch),
        )?)
    }

    pub fn save_probes(
        &self,
        probes: &[Probe<MountainCarState, Throttle>],
    ) -> Result<(), StorageError> {
        Ok(save_json(&TestPoints::from(probes), self.test_points_path())?)
    }

    pub fn load_probes(&self) -> Result<ProbeSet<MountainCarState, Throttle>, StorageError> {
        let points: TestPoints = load_json(self.test_points_path())?;
        points.into_probes()
    }

    pub fn save_reference_values(&self, values: &[f64]) -> Result<(), StorageError> {
        Ok(save_cbor(values, self.reference_values_path())?)
    }

    pub fn load_reference_values(&self) -> Result<Vec<f64>, StorageError> {
        Ok(Vec::<f64>::load(self.reference_values_path())?)
    }

    pub fn save_statistics(
        &self,
        batch: usize,
        settings: &EstimatorSettings,
        config: &StatisticsConfig,
        stats: &LinearStatistics,
    ) -> Result<(), StorageError> {
        Ok(stats.save(self.statistics_path(batch, settings, config))?)
    }

    /// Load cached statistics, if present.
    pub fn load_statistics(
        &self,
        batch: usize,
        settings: &EstimatorSettings,
        config: &StatisticsConfig,
    ) -> Result<Option<LinearStatistics>, StorageError> {
        let path = self.statistics_path(batch, settings, config);
        if path.exists() {
            Ok(Some(LinearStatistics::load(path)?))
        } else {
            Ok(None)
        }
    }
}
