use super::{Environment, Successor};
use crate::Prng;
use enum_map::Enum;
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Minimum car position. The car stops dead when it reaches the left wall.
pub const POSITION_MIN: f64 = -1.2;
/// Maximum car position. Reaching it ends the episode.
pub const POSITION_MAX: f64 = 0.5;
/// Minimum car velocity.
pub const VELOCITY_MIN: f64 = -0.07;
/// Maximum car velocity.
pub const VELOCITY_MAX: f64 = 0.07;

/// Configuration for the [`MountainCar`] environment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountainCarConfig {
    /// Velocity change per step caused by the throttle.
    pub throttle_force: f64,
    /// Scale of the gravitational term `-gravity * cos(3 * position)`.
    pub gravity: f64,
    /// Initial positions are sampled uniformly from this interval. The initial velocity is 0.
    pub initial_position_range: (f64, f64),
    /// Discount factor
    pub discount_factor: f64,
}

impl Default for MountainCarConfig {
    fn default() -> Self {
        Self {
            throttle_force: 0.001,
            gravity: 0.0025,
            initial_position_range: (-0.6, -0.4),
            discount_factor: 0.99,
        }
    }
}

/// Mountain Car environment
///
/// An under-powered car sits in a valley and must escape up the right hill.
/// The engine is too weak to drive straight up so the car has to build momentum by rocking
/// back and forth. Every step gives a reward of `-1` until the car reaches [`POSITION_MAX`].
///
/// The dynamics are those of [Sutton & Barto (2018)][sutton2018], Example 10.1.
///
/// [sutton2018]: http://incompleteideas.net/book/the-book-2nd.html
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountainCar {
    config: MountainCarConfig,
}

impl MountainCar {
    pub const fn new(config: MountainCarConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &MountainCarConfig {
        &self.config
    }
}

/// Mountain car throttle setting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum Throttle {
    Reverse,
    Neutral,
    Forward,
}

impl Throttle {
    /// Signed acceleration direction.
    pub const fn direction(self) -> f64 {
        match self {
            Self::Reverse => -1.0,
            Self::Neutral => 0.0,
            Self::Forward => 1.0,
        }
    }

    /// Integer code of the throttle setting: `-1`, `0` or `1`.
    pub const fn code(self) -> i8 {
        match self {
            Self::Reverse => -1,
            Self::Neutral => 0,
            Self::Forward => 1,
        }
    }

    /// Throttle setting with the given integer code, if valid.
    pub const fn from_code(code: i8) -> Option<Self> {
        match code {
            -1 => Some(Self::Reverse),
            0 => Some(Self::Neutral),
            1 => Some(Self::Forward),
            _ => None,
        }
    }
}

/// Physical state of the [`MountainCar`] environment.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountainCarState {
    /// Horizontal car position.
    pub position: f64,
    /// Horizontal car velocity.
    pub velocity: f64,
}

impl MountainCarState {
    pub const fn new(position: f64, velocity: f64) -> Self {
        Self { position, velocity }
    }
}

impl Environment for MountainCar {
    type State = MountainCarState;
    type Action = Throttle;

    fn initial_state(&self, rng: &mut Prng) -> Self::State {
        let (low, high) = self.config.initial_position_range;
        MountainCarState {
            position: Uniform::new_inclusive(low, high).sample(rng),
            velocity: 0.0,
        }
    }

    fn step(&self, state: Self::State, action: &Self::Action) -> (Successor<Self::State>, f64) {
        let mut velocity = state.velocity + self.config.throttle_force * action.direction()
            - self.config.gravity * (3.0 * state.position).cos();
        velocity = velocity.clamp(VELOCITY_MIN, VELOCITY_MAX);
        let position = (state.position + velocity).clamp(POSITION_MIN, POSITION_MAX);
        if position == POSITION_MIN {
            // Inelastic collision with the left wall
            velocity = 0.0;
        }

        let reward = -1.0;
        #[allow(clippy::float_cmp)] // clamping produces exactly POSITION_MAX
        let successor = if position == POSITION_MAX {
            Successor::Terminate
        } else {
            Successor::Continue(MountainCarState { position, velocity })
        };
        (successor, reward)
    }

    fn discount_factor(&self) -> f64 {
        self.config.discount_factor
    }
}
