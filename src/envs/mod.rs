//! Reinforcement learning environments
mod mountain_car;
#[cfg(test)]
pub mod testing;

pub use mountain_car::{
    MountainCar, MountainCarConfig, MountainCarState, Throttle, POSITION_MAX, POSITION_MIN,
    VELOCITY_MAX, VELOCITY_MIN,
};

use crate::Prng;
use serde::{Deserialize, Serialize};

/// A reinforcement learning environment.
///
/// This defines the environment dynamics and structure.
/// It does not internally manage state.
/// The dynamics are deterministic; randomness only enters through the initial state.
pub trait Environment {
    /// Environment state.
    type State: Clone;
    /// Action selected by the agent.
    type Action: Copy;

    /// Sample a new initial state.
    fn initial_state(&self, rng: &mut Prng) -> Self::State;

    /// Apply an action to a state.
    ///
    /// # Returns
    /// * `successor`: How the episode progresses.
    ///     [`Successor::Terminate`] if the resulting state is terminal.
    ///     All trajectories from terminal states yield 0 reward on each step.
    /// * `reward`: The reward value for this transition.
    fn step(&self, state: Self::State, action: &Self::Action) -> (Successor<Self::State>, f64);

    /// A discount factor applied to future rewards.
    ///
    /// A value between `0` and `1`, inclusive.
    fn discount_factor(&self) -> f64;
}

impl<E: Environment + ?Sized> Environment for &E {
    type State = E::State;
    type Action = E::Action;

    fn initial_state(&self, rng: &mut Prng) -> Self::State {
        E::initial_state(self, rng)
    }
    fn step(&self, state: Self::State, action: &Self::Action) -> (Successor<Self::State>, f64) {
        E::step(self, state, action)
    }
    fn discount_factor(&self) -> f64 {
        E::discount_factor(self)
    }
}

/// The successor of an environment step; how the episode progresses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Successor<S> {
    /// The episode continues with the given state.
    Continue(S),
    /// The episode ends by entering a terminal state.
    Terminate,
}

impl<S> Successor<S> {
    /// Whether the successor is terminal.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminate)
    }

    /// Convert into the continuing state, if any.
    #[allow(clippy::missing_const_for_fn)] // not const with destructors
    pub fn into_continue(self) -> Option<S> {
        match self {
            Self::Continue(s) => Some(s),
            Self::Terminate => None,
        }
    }
}
