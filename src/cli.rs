use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use crate::advisory::{AdvisorConfig, AdvisoryClient, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::api::{AppState, run_http_server};
use crate::core::{SimulationResult, run_simulation};
use crate::scenario::{Scenario, ScenarioError, ScenarioLibrary};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error("scenario '{0}' not found in library")]
    UnknownScenario(String),
    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(
    name = "runway",
    about = "Deterministic retirement projection: growth, contributions, income streams and proportional drawdown"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API
    Serve(ServeArgs),
    /// Project a scenario and print the yearly trajectory
    Simulate(SimulateArgs),
    /// Project a scenario and ask the advisor for commentary
    Advise(AdviseArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AdvisorArgs {
    #[arg(long, env = "RUNWAY_ADVISOR_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub advisor_base_url: String,
    #[arg(long, env = "RUNWAY_ADVISOR_MODEL", default_value = DEFAULT_MODEL)]
    pub advisor_model: String,
    #[arg(long, env = "RUNWAY_ADVISOR_API_KEY", hide_env_values = true)]
    pub advisor_api_key: Option<String>,
    #[arg(
        long,
        default_value_t = 30,
        help = "Give up on the advisor after this many seconds"
    )]
    pub advisor_timeout_secs: u64,
}

impl From<AdvisorArgs> for AdvisorConfig {
    fn from(value: AdvisorArgs) -> Self {
        AdvisorConfig {
            base_url: value.advisor_base_url,
            model: value.advisor_model,
            api_key: value.advisor_api_key,
            timeout: Duration::from_secs(value.advisor_timeout_secs),
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "RUNWAY_PORT", default_value_t = 8080)]
    pub port: u16,
    #[arg(
        long,
        env = "RUNWAY_SCENARIO_FILE",
        help = "Scenario library backing the /api/scenarios endpoints"
    )]
    pub scenario_file: Option<PathBuf>,
    #[command(flatten)]
    pub advisor: AdvisorArgs,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[arg(long)]
    pub scenario_file: PathBuf,
    #[arg(long, help = "Scenario to run; defaults to the active one")]
    pub scenario_id: Option<String>,
    #[arg(long, help = "Print the full result as JSON instead of a table")]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AdviseArgs {
    #[arg(long)]
    pub scenario_file: PathBuf,
    #[arg(long)]
    pub scenario_id: Option<String>,
    #[arg(long)]
    pub question: Option<String>,
    #[command(flatten)]
    pub advisor: AdvisorArgs,
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Serve(args) => {
            let state = AppState {
                advisor: AdvisoryClient::new(args.advisor.into()),
                scenario_file: args.scenario_file,
            };
            run_http_server(args.port, state).await?;
        }
        Command::Simulate(args) => {
            let scenario = load_scenario(&args.scenario_file, args.scenario_id.as_deref()).await?;
            let result = run_simulation(
                &scenario.settings,
                &scenario.assets,
                &scenario.income_streams,
            );
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", render_report(&scenario, &result));
            }
        }
        Command::Advise(args) => {
            let scenario = load_scenario(&args.scenario_file, args.scenario_id.as_deref()).await?;
            let result = run_simulation(
                &scenario.settings,
                &scenario.assets,
                &scenario.income_streams,
            );
            let client = AdvisoryClient::new(args.advisor.into());
            let advice = client
                .narrate(&scenario.settings, &result, args.question.as_deref())
                .await;
            print!("{}", render_verdict(&scenario, &result));
            println!();
            println!("{advice}");
        }
    }
    Ok(())
}

async fn load_scenario(path: &Path, scenario_id: Option<&str>) -> Result<Scenario, CliError> {
    let library = ScenarioLibrary::load(path).await?;
    let id = scenario_id.unwrap_or(&library.active_scenario_id);
    let scenario = library
        .get(id)
        .cloned()
        .ok_or_else(|| CliError::UnknownScenario(id.to_string()))?;
    info!(id = %scenario.id, name = %scenario.name, "selected scenario");
    Ok(scenario)
}

pub fn render_verdict(scenario: &Scenario, result: &SimulationResult) -> String {
    match result.depletion_age {
        None => format!(
            "{}: savings last through age {} (final balance {:.0})\n",
            scenario.name, scenario.settings.planning_horizon, result.final_balance
        ),
        Some(age) => format!("{}: savings run out at age {age}\n", scenario.name),
    }
}

pub fn render_report(scenario: &Scenario, result: &SimulationResult) -> String {
    let mut out = format!(
        "{:>4} {:>6} {:>12} {:>12} {:>12} {:>12} {:>14}\n",
        "Age", "Year", "Expenses", "Income", "Withdrawals", "Shortfall", "Balance"
    );
    for year in &result.data {
        out.push_str(&format!(
            "{:>4} {:>6} {:>12.0} {:>12.0} {:>12.0} {:>12.0} {:>14.0}\n",
            year.age,
            year.year,
            year.expenses,
            year.income,
            year.withdrawals,
            year.shortfall,
            year.balance
        ));
    }
    out.push_str(&render_verdict(scenario, result));
    out
}
