//! Commons CLI - Command-line interface for the Commons simulation
//!
//! This CLI lets researchers:
//! - Run a simulation from a TOML configuration, with flag overrides
//! - Export the per-turn log as JSON
//! - Print the default configuration as a starting point

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use commons_runtime::baseline::DEFAULT_AOA_RANKING;
use commons_runtime::{BaselineAgent, Environment};
use commons_types::{AgentId, SimulationConfig};
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Commons CLI application
#[derive(Parser, Debug)]
#[command(name = "commons")]
#[command(about = "Commons - governed common-pool resource simulation", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the simulation
    Run(RunArgs),

    /// Print the default configuration as TOML
    Config,
}

/// Overrides applied on top of the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Configuration file (TOML)
    #[arg(short, long, env = "COMMONS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of iterations
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Turns per iteration
    #[arg(long)]
    pub turns: Option<u32>,

    /// Number of agents
    #[arg(long)]
    pub agents: Option<usize>,

    /// RNG seed for a reproducible run
    #[arg(long, env = "COMMONS_SEED")]
    pub seed: Option<u64>,

    /// Write the turn log as JSON to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// State at the end of one iteration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IterationSummary {
    pub iteration: u32,
    pub alive: usize,
    pub agents: usize,
    pub teams: usize,
    pub total_pool: u64,
}

/// Run using the current process arguments.
pub fn run() -> Result<()> {
    run_with_args(std::env::args_os())
}

/// Run using the provided argument iterator.
pub fn run_with_args<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(args) => run_command(&args),
        Commands::Config => {
            print!("{}", SimulationConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    // Keeps the first subscriber when called again in the same process
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init();
}

fn run_command(args: &RunArgs) -> Result<()> {
    let config = load_config(args)?;
    info!(
        agents = config.agent_count,
        iterations = config.iterations,
        turns = config.turns_per_iteration,
        seed = ?config.seed,
        "Starting simulation"
    );

    let env = run_simulation(config)?;
    for summary in summarize(&env) {
        println!(
            "Iteration {}: {}/{} alive, {} teams, pool {}",
            summary.iteration, summary.alive, summary.agents, summary.teams, summary.total_pool
        );
    }

    if let Some(path) = &args.output {
        let json = env.turn_log().to_json()?;
        fs::write(path, json)
            .with_context(|| format!("failed to write turn log to {}", path.display()))?;
        info!(path = %path.display(), records = env.turn_log().len(), "Turn log written");
    }
    Ok(())
}

/// Load the configuration file, if any, and apply flag overrides
pub fn load_config(args: &RunArgs) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let input = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            SimulationConfig::from_toml_str(&input)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => SimulationConfig::default(),
    };

    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Some(turns) = args.turns {
        config.turns_per_iteration = turns;
    }
    if let Some(agents) = args.agents {
        config.agent_count = agents;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    config.validate()?;
    Ok(config)
}

/// Environment populated with baseline agents.
///
/// Agents' governance preferences rotate so that teams see a mix of ballots.
pub fn build_environment(config: SimulationConfig) -> Result<Environment> {
    let agent_count = config.agent_count;
    let income = config.agent_income;
    let mut env = Environment::new(config)?;

    for i in 0..agent_count {
        let mut ranking = DEFAULT_AOA_RANKING.to_vec();
        let len = ranking.len();
        ranking.rotate_left(i % len);
        let agent = BaselineAgent::new(AgentId::new(format!("agent-{i:03}")))
            .with_income(income)
            .with_aoa_ranking(ranking);
        env.add_agent(Box::new(agent));
    }
    Ok(env)
}

pub fn run_simulation(config: SimulationConfig) -> Result<Environment> {
    let mut env = build_environment(config)?;
    env.run()?;
    Ok(env)
}

/// Final turn of every iteration in the log
pub fn summarize(env: &Environment) -> Vec<IterationSummary> {
    (1..=env.iteration())
        .filter_map(|iteration| env.turn_log().iteration(iteration).last())
        .map(|record| IterationSummary {
            iteration: record.iteration,
            alive: record.alive_count(),
            agents: record.agents.len(),
            teams: record.teams.len(),
            total_pool: record.teams.iter().map(|t| t.common_pool).sum(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn small_run() -> RunArgs {
        RunArgs {
            iterations: Some(2),
            turns: Some(3),
            agents: Some(5),
            seed: Some(11),
            ..RunArgs::default()
        }
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "commons", "run", "--turns", "3", "--seed", "9", "-o", "log.json", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.turns, Some(3));
                assert_eq!(args.seed, Some(9));
                assert_eq!(args.output, Some(PathBuf::from("log.json")));
            }
            Commands::Config => panic!("expected run"),
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = load_config(&small_run()).unwrap();
        assert_eq!(config.iterations, 2);
        assert_eq!(config.turns_per_iteration, 3);
        assert_eq!(config.agent_count, 5);
        assert_eq!(config.seed, Some(11));
        assert_eq!(config.team_size, SimulationConfig::default().team_size);
    }

    #[test]
    fn test_config_file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "team_size = 2\niterations = 5\n\n[policy]\nfixed_withdrawal = 4").unwrap();

        let args = RunArgs {
            config: Some(file.path().to_path_buf()),
            iterations: Some(1),
            ..RunArgs::default()
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.team_size, 2);
        assert_eq!(config.iterations, 1);
        assert_eq!(config.policy.fixed_withdrawal, 4);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "team_size = 1").unwrap();
        let args = RunArgs {
            config: Some(file.path().to_path_buf()),
            ..RunArgs::default()
        };
        let err = load_config(&args).unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn test_missing_config_file() {
        let args = RunArgs {
            config: Some(PathBuf::from("/nonexistent/commons.toml")),
            ..RunArgs::default()
        };
        let err = load_config(&args).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn test_agents_get_rotated_rankings() {
        let config = load_config(&small_run()).unwrap();
        let env = build_environment(config).unwrap();
        assert_eq!(env.agents().len(), 5);
        let first = env.agent(&AgentId::new("agent-000")).unwrap();
        let second = env.agent(&AgentId::new("agent-001")).unwrap();
        assert_eq!(first.aoa_ranking(), DEFAULT_AOA_RANKING.to_vec());
        assert_eq!(second.aoa_ranking(), vec![2, 1, 0, 3]);
    }

    #[test]
    fn test_summary_per_iteration() {
        let config = load_config(&small_run()).unwrap();
        let env = run_simulation(config).unwrap();
        let summaries = summarize(&env);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].iteration, 1);
        assert_eq!(summaries[1].agents, 5);
        assert!(summaries.iter().all(|s| s.alive <= s.agents));
    }
}
