//! Environment testing utilities
use super::{Environment, Successor};
use crate::Prng;
use enum_map::Enum;
use serde::{Deserialize, Serialize};

/// Action of the [`OneStateRoom`] environment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum Door {
    Reverse,
    Forward,
}

/// A single-state environment with two actions.
///
/// * `Forward` gives reward 1 and ends the episode.
/// * `Reverse` gives reward 0 and stays in the same state.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneStateRoom {
    pub discount_factor: f64,
}

impl Default for OneStateRoom {
    fn default() -> Self {
        Self {
            discount_factor: 0.9,
        }
    }
}

impl Environment for OneStateRoom {
    type State = ();
    type Action = Door;

    fn initial_state(&self, _: &mut Prng) -> Self::State {}

    fn step(&self, state: Self::State, action: &Self::Action) -> (Successor<Self::State>, f64) {
        match action {
            Door::Forward => (Successor::Terminate, 1.0),
            Door::Reverse => (Successor::Continue(state), 0.0),
        }
    }

    fn discount_factor(&self) -> f64 {
        self.discount_factor
    }
}

/// A corridor of integer positions `0..length` that always steps right with reward 1.
///
/// Ends on leaving the last position.
/// Every action has the same effect so any policy yields `length - start` unit rewards.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corridor {
    pub length: u32,
    pub discount_factor: f64,
}

impl Environment for Corridor {
    type State = u32;
    type Action = Door;

    fn initial_state(&self, _: &mut Prng) -> Self::State {
        0
    }

    fn step(&self, state: Self::State, _: &Self::Action) -> (Successor<Self::State>, f64) {
        let next = state + 1;
        if next >= self.length {
            (Successor::Terminate, 1.0)
        } else {
            (Successor::Continue(next), 1.0)
        }
    }

    fn discount_factor(&self) -> f64 {
        self.discount_factor
    }
}
