//! Action-selection policies over finite action sets.
mod momentum;

pub use momentum::MomentumPolicy;

use crate::Prng;
use enum_map::{EnumArray, EnumMap};
use rand::distributions::{Distribution, WeightedError, WeightedIndex};

/// A stochastic policy: a distribution over a finite action set for each state.
pub trait Policy<S, A: EnumArray<f64>> {
    /// Action probabilities in the given state.
    fn distribution(&self, state: &S) -> EnumMap<A, f64>;

    /// Probability of taking `action` in `state`.
    fn prob(&self, state: &S, action: A) -> f64 {
        self.distribution(state)[action]
    }

    /// Sample an action.
    ///
    /// # Errors
    /// If the action distribution is not a valid set of weights.
    fn sample(&self, state: &S, rng: &mut Prng) -> Result<A, WeightedError> {
        let index = WeightedIndex::new(self.distribution(state).values())?.sample(rng);
        Ok(A::from_usize(index))
    }
}

impl<S, A, P> Policy<S, A> for &P
where
    A: EnumArray<f64>,
    P: Policy<S, A> + ?Sized,
{
    fn distribution(&self, state: &S) -> EnumMap<A, f64> {
        P::distribution(self, state)
    }
    fn prob(&self, state: &S, action: A) -> f64 {
        P::prob(self, state, action)
    }
    fn sample(&self, state: &S, rng: &mut Prng) -> Result<A, WeightedError> {
        P::sample(self, state, rng)
    }
}

/// A policy with the same action distribution in every state.
#[derive(Debug)]
pub struct FixedPolicy<A: EnumArray<f64>> {
    probs: EnumMap<A, f64>,
}

impl<A: EnumArray<f64>> Clone for FixedPolicy<A> {
    fn clone(&self) -> Self {
        Self::new(EnumMap::from_fn(|a| self.probs[a]))
    }
}

impl<A: EnumArray<f64>> FixedPolicy<A> {
    pub const fn new(probs: EnumMap<A, f64>) -> Self {
        Self { probs }
    }

    /// Uniform distribution over all actions.
    pub fn uniform() -> Self {
        #[allow(clippy::cast_precision_loss)]
        let p = (A::LENGTH as f64).recip();
        Self::new(EnumMap::from_fn(|_| p))
    }

    /// Always take `action`.
    pub fn deterministic(action: A) -> Self
    where
        A: PartialEq + Copy,
    {
        Self::new(EnumMap::from_fn(|a| if a == action { 1.0 } else { 0.0 }))
    }
}

impl<S, A> Policy<S, A> for FixedPolicy<A>
where
    A: EnumArray<f64> + Copy,
{
    fn distribution(&self, _: &S) -> EnumMap<A, f64> {
        EnumMap::from_fn(|a| self.probs[a])
    }

    fn prob(&self, _: &S, action: A) -> f64 {
        self.probs[action]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::testing::Door;
    use rand::SeedableRng;

    #[test]
    fn uniform_probs() {
        let policy = FixedPolicy::<Door>::uniform();
        assert_eq!(policy.prob(&(), Door::Reverse), 0.5);
        assert_eq!(policy.prob(&(), Door::Forward), 0.5);
    }

    #[test]
    fn deterministic_always_samples_action() {
        let policy = FixedPolicy::deterministic(Door::Forward);
        let mut rng = Prng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(policy.sample(&(), &mut rng).unwrap(), Door::Forward);
        }
        assert_eq!(policy.prob(&(), Door::Reverse), 0.0);
    }

    #[test]
    fn sample_frequencies_match_distribution() {
        let policy = FixedPolicy::<Door>::new(EnumMap::from_array([0.2, 0.8]));
        let mut rng = Prng::seed_from_u64(2);
        let num_samples = 10_000;
        let forward_count = (0..num_samples)
            .filter(|_| policy.sample(&(), &mut rng).unwrap() == Door::Forward)
            .count();
        #[allow(clippy::cast_precision_loss)]
        let freq = forward_count as f64 / num_samples as f64;
        assert!((freq - 0.8).abs() < 0.02, "{}", freq);
    }

    #[test]
    fn invalid_distribution_is_an_error() {
        let policy = FixedPolicy::<Door>::new(EnumMap::from_array([0.0, 0.0]));
        let mut rng = Prng::seed_from_u64(3);
        assert!(policy.sample(&(), &mut rng).is_err());
    }

    #[test]
    fn clone_keeps_distribution() {
        let policy = FixedPolicy::<Door>::new(EnumMap::from_array([0.3, 0.7]));
        let copy = policy.clone();
        assert_eq!(copy.prob(&(), Door::Reverse), 0.3);
        assert_eq!(copy.prob(&(), Door::Forward), 0.7);
    }
}
