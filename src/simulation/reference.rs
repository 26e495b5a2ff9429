//! Monte Carlo reference action values.
use super::{discounted_return, Probe, SimulationConfig, SimulationError};
use crate::envs::Environment;
use crate::logging::StatsLogger;
use crate::policies::Policy;
use crate::utils::stats::OnlineMeanVariance;
use crate::Prng;
use enum_map::EnumArray;

/// Estimate the target-policy action value of each probe by averaging independent rollouts.
///
/// Each rollout takes the probe action in the probe state then follows `target` until the
/// episode ends. The estimates are returned in probe order.
///
/// # Errors
/// * [`SimulationError::NoRollouts`] if `num_rollouts` is zero.
/// * Any error from simulating a rollout.
pub fn estimate_action_values<E, P, L>(
    env: &E,
    target: &P,
    probes: &[Probe<E::State, E::Action>],
    num_rollouts: usize,
    sim_config: &SimulationConfig,
    rng: &mut Prng,
    mut logger: L,
) -> Result<Vec<f64>, SimulationError>
where
    E: Environment + ?Sized,
    E::Action: EnumArray<f64>,
    P: Policy<E::State, E::Action> + ?Sized,
    L: StatsLogger,
{
    if num_rollouts == 0 {
        return Err(SimulationError::NoRollouts);
    }

    let mut values = Vec::with_capacity(probes.len());
    for probe in probes {
        let mut returns = OnlineMeanVariance::new();
        for _ in 0..num_rollouts {
            returns.push(discounted_return(
                env,
                probe.state.clone(),
                probe.action,
                |state| target.sample(state, rng).map_err(SimulationError::from),
                sim_config,
            )?);
        }
        let value = returns.mean().ok_or(SimulationError::NoRollouts)?;

        logger.group_start();
        let mut result = logger.group_log("value".into(), value.into());
        if let Some(stddev) = returns.stddev() {
            result = result.and(logger.group_log("rollout_stddev".into(), stddev.into()));
        }
        logger.group_end();
        result?;
        logger.log_counter_increment("probe", 1)?;

        values.push(value);
    }
    logger.flush();
    Ok(values)
}
