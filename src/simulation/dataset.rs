//! Generating behavior-policy datasets and held-out probe sets.
use super::{simulate, Episode, SimulationConfig, SimulationError};
use crate::envs::Environment;
use crate::logging::{LogError, LogValue, StatsLogger};
use crate::policies::Policy;
use crate::Prng;
use enum_map::EnumArray;
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Number of independently stored batches.
    pub num_batches: usize,
    /// Number of episodes in each batch.
    pub episodes_per_batch: usize,
    /// Number of probe state-action pairs to sample.
    pub num_probes: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            num_batches: 5,
            episodes_per_batch: 5000,
            num_probes: 100,
        }
    }
}

/// A state-action pair at which the action value is estimated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe<S, A> {
    pub state: S,
    pub action: A,
}

pub type ProbeSet<S, A> = Vec<Probe<S, A>>;

/// Generate batches of behavior-policy episodes and sample a probe set from the visited pairs.
///
/// Each completed batch is passed to `on_batch` along with its index.
/// The state-action pairs of every step in every batch are pooled in visitation order and the
/// probes are drawn from the later half of that pool (see [`sample_probes`]).
///
/// # Errors
/// Any simulation error, or the first error returned by `on_batch`.
#[allow(clippy::too_many_arguments)]
pub fn generate_dataset<E, P, F, L, BatchErr>(
    env: &E,
    behavior: &P,
    config: &DatasetConfig,
    sim_config: &SimulationConfig,
    rng: &mut Prng,
    mut on_batch: F,
    mut logger: L,
) -> Result<ProbeSet<E::State, E::Action>, BatchErr>
where
    E: Environment + ?Sized,
    E::Action: EnumArray<f64>,
    P: Policy<E::State, E::Action> + ?Sized,
    F: FnMut(usize, &[Episode<E::State, E::Action>]) -> Result<(), BatchErr>,
    L: StatsLogger,
    BatchErr: From<SimulationError>,
{
    let mut pool = Vec::new();
    for batch_index in 0..config.num_batches {
        let mut episodes = Vec::with_capacity(config.episodes_per_batch);
        for _ in 0..config.episodes_per_batch {
            let initial_state = env.initial_state(rng);
            let episode = simulate(
                env,
                initial_state,
                |state| behavior.sample(state, rng).map_err(SimulationError::from),
                sim_config,
            )?;
            log_episode(&mut logger, &episode).map_err(SimulationError::from)?;
            pool.extend(episode.steps().iter().map(|step| Probe {
                state: step.state.clone(),
                action: step.action,
            }));
            episodes.push(episode);
        }
        logger
            .log_counter_increment("batch", 1)
            .map_err(SimulationError::from)?;
        on_batch(batch_index, &episodes)?;
    }

    logger
        .log_counter_increment("pooled_steps", pool.len() as u64)
        .map_err(SimulationError::from)?;
    logger.flush();
    Ok(sample_probes(&pool, config.num_probes, rng)?)
}

fn log_episode<L, S, A>(logger: &mut L, episode: &Episode<S, A>) -> Result<(), LogError>
where
    L: StatsLogger + ?Sized,
    A: EnumArray<f64> + Copy,
{
    logger.group_start();
    let mut result = logger.group_log("episode_length".into(), (episode.len() as f64).into());
    result = result.and(logger.group_log("episode_reward".into(), episode.total_reward().into()));
    for step in episode.steps() {
        result = result.and(logger.group_log(
            "action".into(),
            LogValue::Index {
                value: step.action.into_usize(),
                size: A::LENGTH,
            },
        ));
    }
    logger.group_end();
    result
}

/// Sample `num_probes` items uniformly with replacement from the later half of `pool`.
///
/// The first `pool.len() / 2` items are treated as burn-in and never selected.
///
/// # Errors
/// [`SimulationError::EmptyProbePool`] if the later half of the pool is empty.
pub fn sample_probes<T: Clone>(
    pool: &[T],
    num_probes: usize,
    rng: &mut Prng,
) -> Result<Vec<T>, SimulationError> {
    let candidates = &pool[pool.len() / 2..];
    if candidates.is_empty() {
        return Err(SimulationError::EmptyProbePool);
    }
    let index_distribution = Uniform::new(0, candidates.len());
    Ok((0..num_probes)
        .map(|_| candidates[index_distribution.sample(rng)].clone())
        .collect())
}
