use clap::{Args, Parser, Subcommand};
use mountaincar_ope::envs::{MountainCar, MountainCarConfig, MountainCarState, Throttle};
use mountaincar_ope::estimation::{
    msbpe, value_error, LinearStatistics, ReturnType, StatisticsConfig,
};
use mountaincar_ope::features::{Features, TileCoderConfig};
use mountaincar_ope::logging::{DisplayLogger, StatsLogger};
use mountaincar_ope::policies::MomentumPolicy;
use mountaincar_ope::simulation::{
    estimate_action_values, generate_dataset, DatasetConfig, SimulationConfig,
};
use mountaincar_ope::storage::{DataDir, EstimatorSettings};
use mountaincar_ope::utils::save::load_json;
use mountaincar_ope::{OpeError, Prng};
use ndarray::Array1;
use rand::SeedableRng;
use std::path::PathBuf;
use yansi::Paint;

#[derive(Parser, Debug)]
#[clap(version, about)]
struct Options {
    #[clap(long, default_value = "data")]
    /// Directory for datasets, probes, reference values and cached statistics
    data_dir: PathBuf,

    #[clap(long, default_value_t = 0)]
    /// Random seed
    seed: u64,

    #[clap(long, help_heading = "SIMULATION OPTIONS")]
    /// Maximum number of steps per episode or rollout [default: 1000000]
    max_steps: Option<u64>,

    #[clap(long, conflicts_with = "max-steps", help_heading = "SIMULATION OPTIONS")]
    /// Simulate every episode until it terminates
    unbounded: bool,

    #[clap(long, help_heading = "ENVIRONMENT OPTIONS")]
    /// Environment discount factor [default: 0.99]
    discount_factor: Option<f64>,

    #[clap(long, default_value_t = 0.1, help_heading = "POLICY OPTIONS")]
    /// Exploration rate of the evaluated target policy
    target_exploration: f64,

    #[clap(long, default_value_t = 0.5, help_heading = "POLICY OPTIONS")]
    /// Exploration rate of the data-generating behavior policy
    behavior_exploration: f64,

    #[clap(long, help_heading = "FEATURE OPTIONS")]
    /// Number of tilings of the tile coder [default: 8]
    num_tilings: Option<usize>,

    #[clap(long, help_heading = "FEATURE OPTIONS")]
    /// Number of tiles per state dimension of each tiling [default: 8]
    tiles_per_dim: Option<usize>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate behavior-policy datasets and a probe set
    Generate(GenerateOptions),
    /// Estimate reference target-policy action values at the probes
    Reference(ReferenceOptions),
    /// Compute linear statistics and evaluate a weight vector
    Statistics(StatisticsOptions),
}

#[derive(Args, Debug)]
struct GenerateOptions {
    #[clap(long, default_value_t = 5)]
    /// Number of dataset batches
    num_batches: usize,

    #[clap(long, default_value_t = 5000)]
    /// Number of episodes per batch
    episodes_per_batch: usize,

    #[clap(long, default_value_t = 100)]
    /// Number of probe state-action pairs
    num_probes: usize,
}

#[derive(Args, Debug)]
struct ReferenceOptions {
    #[clap(long, default_value_t = 1000)]
    /// Number of rollouts per probe
    num_rollouts: usize,
}

#[derive(Args, Debug)]
struct StatisticsOptions {
    #[clap(long, default_value_t = 0)]
    /// Dataset batch to use
    batch: usize,

    #[clap(long, multiple_values = true)]
    /// Trace decay parameters; one set of statistics is computed for each [default: 0]
    lambda: Vec<f64>,

    #[clap(long, default_value = "TB")]
    /// Off-policy return type: TB (tree-backup) or Retrace
    return_type: ReturnType,

    #[clap(long)]
    /// Only use the first N episodes of the batch
    episode_limit: Option<usize>,

    #[clap(long)]
    /// JSON file containing a weight vector to evaluate [default: all zeros]
    weights: Option<PathBuf>,
}

impl From<&Options> for MountainCarConfig {
    fn from(opts: &Options) -> Self {
        let mut config = Self::default();
        if let Some(discount_factor) = opts.discount_factor {
            config.discount_factor = discount_factor;
        }
        config
    }
}

impl From<&Options> for SimulationConfig {
    fn from(opts: &Options) -> Self {
        if opts.unbounded {
            Self::unbounded()
        } else {
            Self {
                max_steps_per_episode: opts
                    .max_steps
                    .or_else(|| Self::default().max_steps_per_episode),
            }
        }
    }
}

impl From<&Options> for TileCoderConfig {
    fn from(opts: &Options) -> Self {
        let mut config = Self::default();
        if let Some(num_tilings) = opts.num_tilings {
            config.num_tilings = num_tilings;
        }
        if let Some(tiles_per_dim) = opts.tiles_per_dim {
            config.tiles_per_dim = tiles_per_dim;
        }
        config
    }
}

impl From<&Options> for EstimatorSettings {
    fn from(opts: &Options) -> Self {
        Self {
            discount_factor: MountainCarConfig::from(opts).discount_factor,
            behavior: MomentumPolicy::new(opts.behavior_exploration),
            target: MomentumPolicy::new(opts.target_exploration),
            features: opts.into(),
        }
    }
}

impl From<&GenerateOptions> for DatasetConfig {
    fn from(opts: &GenerateOptions) -> Self {
        Self {
            num_batches: opts.num_batches,
            episodes_per_batch: opts.episodes_per_batch,
            num_probes: opts.num_probes,
        }
    }
}

fn generate(
    opts: &Options,
    gen_opts: &GenerateOptions,
    logger: &mut DisplayLogger,
) -> Result<(), OpeError> {
    let env = MountainCar::new(opts.into());
    let behavior = MomentumPolicy::new(opts.behavior_exploration);
    let dataset_config = DatasetConfig::from(gen_opts);
    let sim_config = SimulationConfig::from(opts);
    println!("Environment:\n{:#?}", env);
    println!("Behavior policy:\n{:#?}", behavior);
    println!("Dataset:\n{:#?}", dataset_config);
    println!("Simulation:\n{:#?}", sim_config);

    let data_dir = DataDir::new(&opts.data_dir);
    data_dir.create()?;
    let mut rng = Prng::seed_from_u64(opts.seed);
    let probes = generate_dataset(
        &env,
        &behavior,
        &dataset_config,
        &sim_config,
        &mut rng,
        |batch, episodes| {
            data_dir.save_dataset(batch, episodes)?;
            println!(
                "Saved {} episodes to {}",
                episodes.len(),
                Paint::cyan(data_dir.dataset_path(batch).display())
            );
            Ok::<_, OpeError>(())
        },
        logger.with_scope("generate"),
    )?;
    data_dir.save_probes(&probes)?;
    println!(
        "Saved {} probes to {}",
        probes.len(),
        Paint::cyan(data_dir.test_points_path().display())
    );
    Ok(())
}

fn reference(
    opts: &Options,
    ref_opts: &ReferenceOptions,
    logger: &mut DisplayLogger,
) -> Result<(), OpeError> {
    let env = MountainCar::new(opts.into());
    let target = MomentumPolicy::new(opts.target_exploration);
    let sim_config = SimulationConfig::from(opts);
    println!("Environment:\n{:#?}", env);
    println!("Target policy:\n{:#?}", target);
    println!("Simulation:\n{:#?}", sim_config);

    let data_dir = DataDir::new(&opts.data_dir);
    let probes = data_dir.load_probes()?;
    // Separate stream from dataset generation with the same seed
    let mut rng = Prng::seed_from_u64(opts.seed.wrapping_add(1));
    let values = estimate_action_values(
        &env,
        &target,
        &probes,
        ref_opts.num_rollouts,
        &sim_config,
        &mut rng,
        logger.with_scope("reference"),
    )?;
    data_dir.save_reference_values(&values)?;
    println!(
        "Saved {} reference values to {}",
        values.len(),
        Paint::cyan(data_dir.reference_values_path().display())
    );
    Ok(())
}

fn statistics(
    opts: &Options,
    stat_opts: &StatisticsOptions,
    logger: &mut DisplayLogger,
) -> Result<(), OpeError> {
    let settings = EstimatorSettings::from(opts);
    let estimator = settings.estimator();
    println!("Estimator:\n{:#?}", estimator);

    let lambdas = if stat_opts.lambda.is_empty() {
        vec![0.0]
    } else {
        stat_opts.lambda.clone()
    };
    let configs: Vec<_> = lambdas
        .into_iter()
        .map(|lambda| StatisticsConfig {
            lambda,
            return_type: stat_opts.return_type,
            episode_limit: stat_opts.episode_limit,
        })
        .collect();
    for config in &configs {
        config.validate()?;
    }

    let data_dir = DataDir::new(&opts.data_dir);
    let mut all_stats = configs
        .iter()
        .map(|config| data_dir.load_statistics(stat_opts.batch, &settings, config))
        .collect::<Result<Vec<Option<LinearStatistics>>, _>>()?;
    let missing: Vec<usize> = all_stats
        .iter()
        .enumerate()
        .filter(|(_, stats)| stats.is_none())
        .map(|(i, _)| i)
        .collect();
    if !missing.is_empty() {
        let episodes = data_dir.load_dataset(stat_opts.batch)?;
        let missing_configs: Vec<_> = missing.iter().map(|&i| configs[i]).collect();
        println!("Computing statistics:\n{:#?}", missing_configs);
        let results =
            estimator.compute_sweep(&episodes, &missing_configs, logger.with_scope("statistics"));
        for (i, result) in missing.into_iter().zip(results) {
            let stats = result?;
            data_dir.save_statistics(stat_opts.batch, &settings, &configs[i], &stats)?;
            all_stats[i] = Some(stats);
        }
    }

    let weights = match &stat_opts.weights {
        Some(path) => Array1::from(load_json::<Vec<f64>, _>(path)?),
        None => Array1::zeros(Features::<MountainCarState, Throttle>::dimension(
            &estimator.features,
        )),
    };
    let reference = if data_dir.reference_values_path().exists() {
        Some((data_dir.load_probes()?, data_dir.load_reference_values()?))
    } else {
        None
    };

    println!();
    for (config, stats) in configs.iter().zip(&all_stats) {
        if let Some(stats) = stats {
            println!(
                "{:<8} λ = {:<6} MSBPE {}",
                config.return_type,
                config.lambda,
                Paint::green(format!("{:.6e}", msbpe(weights.view(), stats)?))
            );
        }
    }
    if let Some((probes, values)) = reference {
        let error = value_error(weights.view(), &estimator.features, &probes, &values)?;
        println!(
            "Value error at {} probes: {}",
            probes.len(),
            Paint::green(format!("{:.6e}", error))
        );
    }
    Ok(())
}

fn main() -> Result<(), OpeError> {
    let opts = Options::parse();
    println!("{:#?}", opts);

    let mut logger = DisplayLogger::default();
    match &opts.command {
        Command::Generate(gen_opts) => generate(&opts, gen_opts, &mut logger),
        Command::Reference(ref_opts) => reference(&opts, ref_opts, &mut logger),
        Command::Statistics(stat_opts) => statistics(&opts, stat_opts, &mut logger),
    }
}
