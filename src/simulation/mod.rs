//! Simulating episodes of environment-policy interaction.
pub mod dataset;
pub mod reference;

pub use dataset::{generate_dataset, sample_probes, DatasetConfig, Probe, ProbeSet};
pub use reference::estimate_action_values;

use crate::envs::{Environment, Successor};
use crate::logging::LogError;
use rand::distributions::WeightedError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A recorded environment transition source: the action taken in a state and the reward received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step<S, A> {
    pub state: S,
    pub action: A,
    pub reward: f64,
}

impl<S, A> Step<S, A> {
    pub const fn new(state: S, action: A, reward: f64) -> Self {
        Self {
            state,
            action,
            reward,
        }
    }
}

/// A complete episode.
///
/// The successor of each step is the state of the following step.
/// The last step transitions into a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode<S, A> {
    steps: Vec<Step<S, A>>,
}

impl<S, A> Episode<S, A> {
    /// Create an episode from its steps, the last of which must enter a terminal state.
    pub fn from_steps(steps: Vec<Step<S, A>>) -> Self {
        Self { steps }
    }

    /// Number of steps (transitions) in the episode.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Step<S, A>] {
        &self.steps
    }

    /// Iterate over each step along with its successor state, `None` if terminal.
    pub fn transitions(&self) -> impl Iterator<Item = (&Step<S, A>, Option<&S>)> {
        self.steps
            .iter()
            .enumerate()
            .map(move |(i, step)| (step, self.steps.get(i + 1).map(|next| &next.state)))
    }

    /// Sum of the (undiscounted) rewards.
    pub fn total_reward(&self) -> f64 {
        self.steps.iter().map(|step| step.reward).sum()
    }
}

/// Simulation configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Maximum number of steps in a single episode or rollout. `None` for no limit.
    pub max_steps_per_episode: Option<u64>,
}

impl SimulationConfig {
    /// Run every episode until it terminates, however long that takes.
    pub const fn unbounded() -> Self {
        Self {
            max_steps_per_episode: None,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_steps_per_episode: Some(1_000_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("episode did not terminate within {max_steps} steps")]
    DidNotTerminate { max_steps: u64 },
    #[error("invalid action distribution: {0}")]
    InvalidDistribution(#[from] WeightedError),
    #[error("no steps available to sample probes from")]
    EmptyProbePool,
    #[error("at least one rollout per probe is required")]
    NoRollouts,
    #[error(transparent)]
    Log(#[from] LogError),
}

/// Run one episode to termination, calling `on_step(state, action, reward)` for every step.
fn run_episode<E, F, G>(
    env: &E,
    initial_state: E::State,
    mut action_rule: F,
    config: &SimulationConfig,
    mut on_step: G,
) -> Result<(), SimulationError>
where
    E: Environment + ?Sized,
    F: FnMut(&E::State) -> Result<E::Action, SimulationError>,
    G: FnMut(E::State, E::Action, f64),
{
    let mut state = initial_state;
    let mut num_steps: u64 = 0;
    loop {
        if let Some(max_steps) = config.max_steps_per_episode {
            if num_steps >= max_steps {
                return Err(SimulationError::DidNotTerminate { max_steps });
            }
        }
        let action = action_rule(&state)?;
        let (successor, reward) = env.step(state.clone(), &action);
        on_step(state, action, reward);
        num_steps += 1;
        match successor {
            Successor::Continue(next) => state = next,
            Successor::Terminate => return Ok(()),
        }
    }
}

/// Simulate a single episode from `initial_state`, choosing actions with `action_rule`.
///
/// # Errors
/// * [`SimulationError::DidNotTerminate`] if the step limit is reached first.
/// * Any error returned by `action_rule`.
pub fn simulate<E, F>(
    env: &E,
    initial_state: E::State,
    action_rule: F,
    config: &SimulationConfig,
) -> Result<Episode<E::State, E::Action>, SimulationError>
where
    E: Environment + ?Sized,
    F: FnMut(&E::State) -> Result<E::Action, SimulationError>,
{
    let mut steps = Vec::new();
    run_episode(env, initial_state, action_rule, config, |state, action, reward| {
        steps.push(Step::new(state, action, reward))
    })?;
    Ok(Episode::from_steps(steps))
}

/// Discounted return of an episode that starts by taking `first_action` in `state`.
///
/// Actions after the first are chosen by `action_rule`. The steps are not stored.
///
/// # Errors
/// * [`SimulationError::DidNotTerminate`] if the step limit is reached first.
/// * Any error returned by `action_rule`.
pub fn discounted_return<E, F>(
    env: &E,
    state: E::State,
    first_action: E::Action,
    mut action_rule: F,
    config: &SimulationConfig,
) -> Result<f64, SimulationError>
where
    E: Environment + ?Sized,
    F: FnMut(&E::State) -> Result<E::Action, SimulationError>,
{
    let discount_factor = env.discount_factor();
    let mut first_action = Some(first_action);
    let mut total = 0.0;
    let mut discount = 1.0;
    run_episode(
        env,
        state,
        |s| match first_action.take() {
            Some(action) => Ok(action),
            None => action_rule(s),
        },
        config,
        |_, _, reward| {
            total += discount * reward;
            discount *= discount_factor;
        },
    )?;
    Ok(total)
}
