//! Off-policy linear statistics for evaluating linear action-value functions.
//!
//! From a dataset of behavior-policy episodes, [`StatisticsEstimator`] computes per-transition
//! means of the matrices
//! * `A = E[e (γ φ̄' - φ)ᵀ]`
//! * `b = E[r e]`
//! * `M = E[φ φᵀ]`
//!
//! where `e` is an eligibility trace, `φ = feature(s, a)` and `φ̄'` is the target-policy
//! expected feature of the successor state (zero if the successor is terminal).
//! The trace decays by `γ λ κ` on each step, with the trace coefficient `κ` given by the
//! [`ReturnType`].
//!
//! For weights `w`, the mean-squared Bellman projected error is `(Aw + b)ᵀ M⁻¹ (Aw + b)`;
//! see [`msbpe`].
pub mod evaluation;

pub use evaluation::{msbpe, value_error};

use crate::features::Features;
use crate::logging::{LogError, StatsLogger};
use crate::policies::Policy;
use crate::simulation::Episode;
use crate::utils::linalg::{pseudo_inverse, LinalgError, PINV_RELATIVE_TOLERANCE};
use enum_map::EnumArray;
use ndarray::linalg::general_mat_mul;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;

/// Off-policy multi-step return; determines how eligibility traces are cut.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnType {
    /// Tree-Backup: traces are scaled by the target probability of the action taken.
    TreeBackup,
    /// Retrace: traces are scaled by the importance ratio truncated at 1.
    Retrace,
}

impl ReturnType {
    /// Trace coefficient `κ` for an action with the given target and behavior probabilities.
    ///
    /// Always in `[0, 1]` for valid probabilities.
    /// For Retrace, a zero behavior probability gives an infinite ratio that is truncated to 1.
    pub fn trace_coefficient(self, target_prob: f64, behavior_prob: f64) -> f64 {
        match self {
            Self::TreeBackup => target_prob,
            Self::Retrace => (target_prob / behavior_prob).min(1.0),
        }
    }

    /// Short lowercase name used in file names.
    pub const fn file_tag(self) -> &'static str {
        match self {
            Self::TreeBackup => "tb",
            Self::Retrace => "retrace",
        }
    }
}

impl Default for ReturnType {
    fn default() -> Self {
        Self::TreeBackup
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::TreeBackup => f.write_str("TB"),
            Self::Retrace => f.write_str("Retrace"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown return type {0:?}; expected \"TB\" or \"Retrace\"")]
pub struct ParseReturnTypeError(pub String);

impl FromStr for ReturnType {
    type Err = ParseReturnTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tb" | "tree-backup" | "treebackup" | "tree_backup" => Ok(Self::TreeBackup),
            "retrace" => Ok(Self::Retrace),
            _ => Err(ParseReturnTypeError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatisticsError {
    #[error("no transitions to estimate statistics from")]
    EmptyDataset,
    #[error("trace decay parameter {0} is not in [0, 1]")]
    InvalidLambda(f64),
    #[error("dimension mismatch; expected {expected} but got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    PseudoInverse(#[from] LinalgError),
    #[error(transparent)]
    Log(#[from] LogError),
}

/// Configuration of a single statistics computation.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// Trace decay parameter in `[0, 1]`.
    pub lambda: f64,
    pub return_type: ReturnType,
    /// Only use the first `episode_limit` episodes, if set.
    pub episode_limit: Option<usize>,
}

impl StatisticsConfig {
    /// Check that the configuration is usable.
    ///
    /// # Errors
    /// [`StatisticsError::InvalidLambda`] if `lambda` is not in `[0, 1]`.
    pub fn validate(&self) -> Result<(), StatisticsError> {
        if (0.0..=1.0).contains(&self.lambda) {
            Ok(())
        } else {
            Err(StatisticsError::InvalidLambda(self.lambda))
        }
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            lambda: 0.0,
            return_type: ReturnType::TreeBackup,
            episode_limit: None,
        }
    }
}

/// Per-transition mean statistics of a linear action-value function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearStatistics {
    /// `E[e (γ φ̄' - φ)ᵀ]`; `d × d`
    pub a: Array2<f64>,
    /// `E[r e]`; length `d`
    pub b: Array1<f64>,
    /// `E[φ φᵀ]`; `d × d`
    pub m: Array2<f64>,
    /// Moore-Penrose pseudo-inverse of `m`
    pub m_inv: Array2<f64>,
    /// Number of transitions the means were taken over.
    pub num_transitions: u64,
}

impl LinearStatistics {
    /// Feature dimension `d`.
    pub fn dimension(&self) -> usize {
        self.b.len()
    }
}

/// Computes [`LinearStatistics`] of a target policy from behavior-policy episodes.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsEstimator<B, T, F> {
    pub behavior: B,
    pub target: T,
    pub features: F,
    pub discount_factor: f64,
}

impl<B, T, F> StatisticsEstimator<B, T, F> {
    pub const fn new(behavior: B, target: T, features: F, discount_factor: f64) -> Self {
        Self {
            behavior,
            target,
            features,
            discount_factor,
        }
    }

    /// Compute the statistics over every transition of `episodes`.
    ///
    /// The terminal transition of each episode is included; its expected next feature is zero.
    ///
    /// # Errors
    /// * [`StatisticsError::InvalidLambda`] if `config.lambda` is not in `[0, 1]`.
    /// * [`StatisticsError::EmptyDataset`] if there are no transitions.
    /// * [`StatisticsError::DimensionMismatch`] if a feature vector has the wrong length.
    pub fn compute<S, A, L>(
        &self,
        episodes: &[Episode<S, A>],
        config: &StatisticsConfig,
        mut logger: L,
    ) -> Result<LinearStatistics, StatisticsError>
    where
        A: EnumArray<f64> + Copy,
        B: Policy<S, A>,
        T: Policy<S, A>,
        F: Features<S, A>,
        L: StatsLogger,
    {
        config.validate()?;
        let start = Instant::now();
        let episodes = match config.episode_limit {
            Some(limit) => &episodes[..limit.min(episodes.len())],
            None => episodes,
        };

        let dim = self.features.dimension();
        let mut a = Array2::<f64>::zeros((dim, dim));
        let mut b = Array1::<f64>::zeros(dim);
        let mut m = Array2::<f64>::zeros((dim, dim));
        let mut num_transitions: u64 = 0;
        let trace_decay = self.discount_factor * config.lambda;

        for episode in episodes {
            let mut trace = Array1::<f64>::zeros(dim);
            for (step, next_state) in episode.transitions() {
                num_transitions += 1;
                let phi = self.feature(&step.state, &step.action)?;
                let kappa = config.return_type.trace_coefficient(
                    self.target.prob(&step.state, step.action),
                    self.behavior.prob(&step.state, step.action),
                );
                trace *= trace_decay * kappa;
                trace += &phi;

                let mut td_direction = match next_state {
                    Some(next) => self.expected_feature(next)? * self.discount_factor,
                    None => Array1::zeros(dim),
                };
                td_direction -= &phi;

                add_outer(&mut a, &trace, &td_direction);
                b.scaled_add(step.reward, &trace);
                add_outer(&mut m, &phi, &phi);
            }
        }

        if num_transitions == 0 {
            return Err(StatisticsError::EmptyDataset);
        }
        #[allow(clippy::cast_precision_loss)]
        let n = num_transitions as f64;
        a /= n;
        b /= n;
        m /= n;
        let m_inv = pseudo_inverse(m.view(), PINV_RELATIVE_TOLERANCE)?;

        logger.group_start();
        let result = logger
            .group_log("time".into(), start.elapsed().into())
            .and(logger.group_log("episodes".into(), (episodes.len() as f64).into()))
            .and(logger.group_log("transitions".into(), n.into()));
        logger.group_end();
        result?;

        Ok(LinearStatistics {
            a,
            b,
            m,
            m_inv,
            num_transitions,
        })
    }

    /// Compute statistics for several configurations concurrently, one thread per configuration.
    ///
    /// The dataset is shared between threads. `logger` is given to the first thread only.
    /// Results are returned in the order of `configs`.
    pub fn compute_sweep<S, A, L>(
        &self,
        episodes: &[Episode<S, A>],
        configs: &[StatisticsConfig],
        logger: L,
    ) -> Vec<Result<LinearStatistics, StatisticsError>>
    where
        S: Sync,
        A: EnumArray<f64> + Copy + Sync,
        B: Policy<S, A> + Sync,
        T: Policy<S, A> + Sync,
        F: Features<S, A> + Sync,
        L: StatsLogger + Send,
    {
        let mut send_logger = Some(logger);
        crossbeam::scope(|scope| {
            let threads: Vec<_> = configs
                .iter()
                .map(|config| {
                    let thread_logger = send_logger.take();
                    scope.spawn(move |_| match thread_logger {
                        Some(logger) => self.compute(episodes, config, logger),
                        None => self.compute(episodes, config, ()),
                    })
                })
                .collect();
            threads
                .into_iter()
                .map(|t| t.join().unwrap_or_else(|e| panic::resume_unwind(e)))
                .collect()
        })
        .unwrap_or_else(|e| panic::resume_unwind(e))
    }

    /// Feature vector, checked against the declared dimension.
    fn feature<S, A>(&self, state: &S, action: &A) -> Result<Array1<f64>, StatisticsError>
    where
        F: Features<S, A>,
    {
        let phi = self.features.feature(state, action);
        let expected = self.features.dimension();
        if phi.len() == expected {
            Ok(phi)
        } else {
            Err(StatisticsError::DimensionMismatch {
                expected,
                actual: phi.len(),
            })
        }
    }

    /// Expected feature vector of `state` under the target policy.
    fn expected_feature<S, A>(&self, state: &S) -> Result<Array1<f64>, StatisticsError>
    where
        A: EnumArray<f64> + Copy,
        T: Policy<S, A>,
        F: Features<S, A>,
    {
        let mut expected = Array1::zeros(self.features.dimension());
        for (action, &prob) in self.target.distribution(state).iter() {
            if prob > 0.0 {
                expected.scaled_add(prob, &self.feature(state, &action)?);
            }
        }
        Ok(expected)
    }
}

/// `target += left ⊗ right`
fn add_outer(target: &mut Array2<f64>, left: &Array1<f64>, right: &Array1<f64>) {
    let column = left.view().insert_axis(Axis(1));
    let row = right.view().insert_axis(Axis(0));
    general_mat_mul(1.0, &column, &row, 1.0, target);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::testing::{Door, OneStateRoom};
    use crate::features::ActionIndicator;
    use crate::policies::FixedPolicy;
    use crate::simulation::{simulate, SimulationConfig, Step};
    use crate::Prng;
    use rand::SeedableRng;
    use rstest::{fixture, rstest};

    type ToyEstimator =
        StatisticsEstimator<FixedPolicy<Door>, FixedPolicy<Door>, ActionIndicator<Door>>;

    /// Uniform behavior, always-forward target, one-hot action features.
    #[fixture]
    fn estimator() -> ToyEstimator {
        StatisticsEstimator::new(
            FixedPolicy::uniform(),
            FixedPolicy::deterministic(Door::Forward),
            ActionIndicator::new(),
            OneStateRoom::default().discount_factor,
        )
    }

    /// Uniform-behavior episodes in the one-state room.
    #[fixture]
    fn episodes() -> Vec<Episode<(), Door>> {
        let env = OneStateRoom::default();
        let behavior = FixedPolicy::<Door>::uniform();
        let mut rng = Prng::seed_from_u64(0);
        (0..200)
            .map(|_| {
                simulate(
                    &env,
                    (),
                    |s| Ok(behavior.sample(s, &mut rng)?),
                    &SimulationConfig::default(),
                )
                .unwrap()
            })
            .collect()
    }

    fn assert_all_close<D: ndarray::Dimension>(
        a: &ndarray::Array<f64, D>,
        b: &ndarray::Array<f64, D>,
    ) {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-9, "{} != {}", x, y);
        }
    }

    #[rstest]
    #[case(ReturnType::TreeBackup)]
    #[case(ReturnType::Retrace)]
    fn trace_coefficient_in_unit_interval(#[case] return_type: ReturnType) {
        let probs = [0.0, 0.01, 0.1, 0.3, 0.5, 0.9, 1.0];
        for &target in &probs {
            for &behavior in &probs[1..] {
                let kappa = return_type.trace_coefficient(target, behavior);
                assert!((0.0..=1.0).contains(&kappa), "{}", kappa);
            }
        }
    }

    #[test]
    fn retrace_truncates_ratio() {
        assert_eq!(ReturnType::Retrace.trace_coefficient(0.9, 0.1), 1.0);
        assert!((ReturnType::Retrace.trace_coefficient(0.1, 0.5) - 0.2).abs() < 1e-12);
        assert_eq!(ReturnType::Retrace.trace_coefficient(0.5, 0.0), 1.0);
    }

    #[test]
    fn tree_backup_is_target_prob() {
        assert_eq!(ReturnType::TreeBackup.trace_coefficient(0.3, 0.9), 0.3);
    }

    #[rstest]
    #[case("TB", ReturnType::TreeBackup)]
    #[case("tb", ReturnType::TreeBackup)]
    #[case("Tree-Backup", ReturnType::TreeBackup)]
    #[case("treebackup", ReturnType::TreeBackup)]
    #[case("Retrace", ReturnType::Retrace)]
    #[case("RETRACE", ReturnType::Retrace)]
    fn parse_return_type(#[case] s: &str, #[case] expected: ReturnType) {
        assert_eq!(s.parse::<ReturnType>(), Ok(expected));
    }

    #[test]
    fn parse_invalid_return_type() {
        assert_eq!(
            "Q".parse::<ReturnType>(),
            Err(ParseReturnTypeError("Q".into()))
        );
    }

    #[rstest]
    fn forward_reward_dominates(estimator: ToyEstimator, episodes: Vec<Episode<(), Door>>) {
        for return_type in [ReturnType::TreeBackup, ReturnType::Retrace] {
            let config = StatisticsConfig {
                lambda: 0.8,
                return_type,
                episode_limit: None,
            };
            let stats = estimator.compute(&episodes, &config, ()).unwrap();
            assert!(
                stats.b[Door::Forward as usize] > stats.b[Door::Reverse as usize],
                "{}",
                stats.b
            );
        }
    }

    #[rstest]
    #[case(ReturnType::TreeBackup)]
    #[case(ReturnType::Retrace)]
    fn forward_reward_in_fixed_dataset(estimator: ToyEstimator, #[case] return_type: ReturnType) {
        let episodes = vec![
            Episode::from_steps(vec![Step::new((), Door::Forward, 1.0)]),
            Episode::from_steps(vec![
                Step::new((), Door::Reverse, 0.0),
                Step::new((), Door::Forward, 1.0),
            ]),
        ];
        let config = StatisticsConfig {
            lambda: 0.8,
            return_type,
            episode_limit: None,
        };
        let stats = estimator.compute(&episodes, &config, ()).unwrap();
        assert_eq!(stats.num_transitions, 3);
        // Reverse has kappa 0 and Forward kappa 1 under both return types.
        // The final Forward step carries e = 0.9 * 0.8 * [1, 0] + [0, 1] = [0.72, 1].
        assert_all_close(
            &stats.a,
            &(ndarray::arr2(&[[-1.0, 0.9 - 0.72], [0.0, -2.0]]) / 3.0),
        );
        assert_all_close(&stats.b, &(ndarray::arr1(&[0.72, 2.0]) / 3.0));
        assert_all_close(&stats.m, &(ndarray::arr2(&[[1.0, 0.0], [0.0, 2.0]]) / 3.0));
        assert_all_close(&stats.m_inv, &ndarray::arr2(&[[3.0, 0.0], [0.0, 1.5]]));
        assert!(stats.b[Door::Forward as usize] > stats.b[Door::Reverse as usize]);
    }

    #[rstest]
    #[case(-0.1)]
    #[case(1.5)]
    #[case(f64::NAN)]
    fn lambda_outside_unit_interval_is_an_error(
        estimator: ToyEstimator,
        episodes: Vec<Episode<(), Door>>,
        #[case] lambda: f64,
    ) {
        let config = StatisticsConfig {
            lambda,
            ..StatisticsConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StatisticsError::InvalidLambda(_))
        ));
        assert!(matches!(
            estimator.compute(&episodes, &config, ()),
            Err(StatisticsError::InvalidLambda(_))
        ));
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    fn lambda_bounds_are_valid(#[case] lambda: f64) {
        let config = StatisticsConfig {
            lambda,
            ..StatisticsConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[rstest]
    fn duplicated_dataset_has_same_statistics(
        estimator: ToyEstimator,
        episodes: Vec<Episode<(), Door>>,
    ) {
        let config = StatisticsConfig {
            lambda: 0.5,
            return_type: ReturnType::Retrace,
            episode_limit: None,
        };
        let single = estimator.compute(&episodes, &config, ()).unwrap();
        let doubled: Vec<_> = episodes.iter().chain(&episodes).cloned().collect();
        let double = estimator.compute(&doubled, &config, ()).unwrap();
        assert_eq!(double.num_transitions, 2 * single.num_transitions);
        assert_all_close(&single.a, &double.a);
        assert_all_close(&single.b, &double.b);
        assert_all_close(&single.m, &double.m);
        assert_all_close(&single.m_inv, &double.m_inv);
    }

    #[rstest]
    fn single_terminal_transition(estimator: ToyEstimator) {
        // One Forward step straight into the terminal state
        let episodes = vec![Episode::from_steps(vec![Step::new((), Door::Forward, 1.0)])];
        let stats = estimator
            .compute(&episodes, &StatisticsConfig::default(), ())
            .unwrap();
        assert_eq!(stats.num_transitions, 1);
        // e = φ = [0, 1]; φ̄' = 0 so A = -e φᵀ
        assert_all_close(&stats.a, &ndarray::arr2(&[[0.0, 0.0], [0.0, -1.0]]));
        assert_all_close(&stats.b, &ndarray::arr1(&[0.0, 1.0]));
        assert_all_close(&stats.m, &ndarray::arr2(&[[0.0, 0.0], [0.0, 1.0]]));
        assert_all_close(&stats.m_inv, &ndarray::arr2(&[[0.0, 0.0], [0.0, 1.0]]));
    }

    #[test]
    fn trace_carries_across_steps() {
        // Reverse then Forward under a uniform target with tree-backup traces
        let episodes = vec![Episode::from_steps(vec![
            Step::new((), Door::Reverse, 0.0),
            Step::new((), Door::Forward, 1.0),
        ])];
        let estimator = StatisticsEstimator::new(
            FixedPolicy::<Door>::uniform(),
            FixedPolicy::<Door>::uniform(),
            ActionIndicator::<Door>::new(),
            0.5,
        );
        let config = StatisticsConfig {
            lambda: 1.0,
            ..StatisticsConfig::default()
        };
        let stats = estimator.compute(&episodes, &config, ()).unwrap();
        // Step 1: e = [1, 0], φ̄' = [0.5, 0.5], γφ̄' - φ = [-0.75, 0.25], r = 0
        // Step 2: e = 0.5 * 0.5 * [1, 0] + [0, 1] = [0.25, 1], γφ̄' - φ = [0, -1], r = 1
        let a = ndarray::arr2(&[[-0.75, 0.25 - 0.25], [0.0, -1.0]]) / 2.0;
        assert_all_close(&stats.a, &a);
        assert_all_close(&stats.b, &(ndarray::arr1(&[0.25, 1.0]) / 2.0));
        assert_all_close(&stats.m, &(Array2::<f64>::eye(2) / 2.0));
    }

    #[rstest]
    fn episode_limit_truncates(estimator: ToyEstimator, episodes: Vec<Episode<(), Door>>) {
        let config = StatisticsConfig {
            episode_limit: Some(10),
            ..StatisticsConfig::default()
        };
        let limited = estimator.compute(&episodes, &config, ()).unwrap();
        let first_ten = estimator
            .compute(&episodes[..10], &StatisticsConfig::default(), ())
            .unwrap();
        assert_eq!(limited, first_ten);
    }

    #[rstest]
    fn empty_dataset_is_an_error(estimator: ToyEstimator) {
        let result = estimator.compute::<(), Door, _>(&[], &StatisticsConfig::default(), ());
        assert_eq!(result, Err(StatisticsError::EmptyDataset));
    }

    /// Features that declare the wrong dimension.
    struct Misdeclared;
    impl Features<(), Door> for Misdeclared {
        fn dimension(&self) -> usize {
            3
        }
        fn feature(&self, _: &(), _: &Door) -> Array1<f64> {
            Array1::zeros(2)
        }
    }

    #[rstest]
    fn feature_dimension_mismatch(episodes: Vec<Episode<(), Door>>) {
        let estimator = StatisticsEstimator::new(
            FixedPolicy::<Door>::uniform(),
            FixedPolicy::<Door>::uniform(),
            Misdeclared,
            0.9,
        );
        assert_eq!(
            estimator.compute(&episodes, &StatisticsConfig::default(), ()),
            Err(StatisticsError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );
    }

    #[rstest]
    fn sweep_matches_sequential(estimator: ToyEstimator, episodes: Vec<Episode<(), Door>>) {
        let configs: Vec<_> = [0.0, 0.5, 1.0]
            .iter()
            .flat_map(|&lambda| {
                [ReturnType::TreeBackup, ReturnType::Retrace]
                    .into_iter()
                    .map(move |return_type| StatisticsConfig {
                        lambda,
                        return_type,
                        episode_limit: None,
                    })
            })
            .collect();
        let swept = estimator.compute_sweep(&episodes, &configs, ());
        assert_eq!(swept.len(), configs.len());
        for (result, config) in swept.into_iter().zip(&configs) {
            assert_eq!(result, estimator.compute(&episodes, config, ()));
        }
    }
}
