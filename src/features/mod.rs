//! State-action feature maps for linear value functions.
mod tiles;

pub use tiles::{TileCoder, TileCoderConfig};

use enum_map::Enum;
use ndarray::Array1;
use std::marker::PhantomData;

/// Feature representation of state-action pairs.
///
/// A linear action-value function with weights `w` has value `w · feature(s, a)`.
pub trait Features<S, A> {
    /// Length of every feature vector.
    fn dimension(&self) -> usize;

    /// Feature vector of a state-action pair. Has length [`Features::dimension`].
    fn feature(&self, state: &S, action: &A) -> Array1<f64>;
}

impl<S, A, F: Features<S, A> + ?Sized> Features<S, A> for &F {
    fn dimension(&self) -> usize {
        F::dimension(self)
    }
    fn feature(&self, state: &S, action: &A) -> Array1<f64> {
        F::feature(self, state, action)
    }
}

/// One-hot indicator of the action, ignoring the state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ActionIndicator<A>(PhantomData<fn() -> A>);

impl<A> ActionIndicator<A> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<S, A: Enum + Copy> Features<S, A> for ActionIndicator<A> {
    fn dimension(&self) -> usize {
        A::LENGTH
    }

    fn feature(&self, _: &S, action: &A) -> Array1<f64> {
        let mut phi = Array1::zeros(A::LENGTH);
        phi[action.into_usize()] = 1.0;
        phi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::testing::Door;
    use ndarray::arr1;

    #[test]
    fn action_indicator_one_hot() {
        let features = ActionIndicator::<Door>::new();
        assert_eq!(Features::<(), _>::dimension(&features), 2);
        assert_eq!(features.feature(&(), &Door::Reverse), arr1(&[1.0, 0.0]));
        assert_eq!(features.feature(&(), &Door::Forward), arr1(&[0.0, 1.0]));
    }
}
