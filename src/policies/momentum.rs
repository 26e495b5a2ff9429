use super::Policy;
use crate::envs::{MountainCarState, Throttle};
use enum_map::{Enum, EnumMap};
use serde::{Deserialize, Serialize};

/// Epsilon-soft momentum policy for Mountain Car.
///
/// The greedy action accelerates in the direction the car is already moving,
/// which pumps energy into the oscillation until the car escapes the valley.
/// With probability `exploration_rate` an action is instead chosen uniformly at random.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumPolicy {
    /// Probability of taking a uniform random action.
    pub exploration_rate: f64,
}

impl MomentumPolicy {
    pub const fn new(exploration_rate: f64) -> Self {
        Self { exploration_rate }
    }

    /// Default target policy: mostly greedy.
    pub const fn target() -> Self {
        Self::new(0.1)
    }

    /// Default behavior policy: considerably more exploratory than [`MomentumPolicy::target`].
    pub const fn behavior() -> Self {
        Self::new(0.5)
    }

    /// The action taken when not exploring.
    pub fn greedy_action(state: &MountainCarState) -> Throttle {
        if state.velocity < 0.0 {
            Throttle::Reverse
        } else {
            Throttle::Forward
        }
    }
}

impl Policy<MountainCarState, Throttle> for MomentumPolicy {
    fn distribution(&self, state: &MountainCarState) -> EnumMap<Throttle, f64> {
        #[allow(clippy::cast_precision_loss)]
        let explore_prob = self.exploration_rate / Throttle::LENGTH as f64;
        let mut probs = EnumMap::from_fn(|_| explore_prob);
        probs[Self::greedy_action(state)] += 1.0 - self.exploration_rate;
        probs
    }
}
