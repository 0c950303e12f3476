use crate::{
    archive::ResultArchive,
    betting::BettingStrategy,
    codec::{self, ExpandedChart, RangeChart},
    config::Config,
    engine::process::ProcessEngine,
    jobs::{JobId, JobRecord, JobRunner, JobStatus},
    library::Library,
    run_config::RunRequest,
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "simdeck")]
#[command(about = "Blackjack simulation run orchestrator (engine jobs + strategy charts + result archive)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./simdeck.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the engine program can be found.
    Doctor {},
    /// Submit one run and wait for it.
    Run {
        #[arg(long)]
        player_name: Option<String>,
        #[arg(long)]
        bankroll: Option<u64>,
        #[arg(long)]
        num_hands: Option<u64>,
        #[arg(long)]
        casino: Option<String>,
        #[arg(long)]
        playing_strategy: Option<String>,
        #[arg(long)]
        betting_strategy: Option<String>,
    },
    /// Submit every run in a JSON array and wait for all of them.
    Batch {
        #[arg(long)]
        input: PathBuf,
    },
    #[command(subcommand)]
    History(HistoryCommand),
    #[command(subcommand)]
    Strategy(StrategyCommand),
    #[command(subcommand)]
    Betting(BettingCommand),
    #[command(subcommand)]
    Casino(CasinoCommand),
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    List {},
    Show { run_id: String },
    Delete { run_id: String },
    Clear {},
}

#[derive(Subcommand, Debug)]
pub enum StrategyCommand {
    List {},
    /// Print a playing strategy, expanded per dealer card unless --range.
    Show {
        name: String,
        #[arg(long)]
        range: bool,
    },
    /// Save an expanded chart (JSON) as a custom playing strategy.
    Save {
        name: String,
        #[arg(long)]
        input: PathBuf,
    },
    Delete { name: String },
    /// Print the maximal-run form of a range chart file.
    Canonicalize {
        #[arg(long)]
        input: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum BettingCommand {
    List {},
    Show { name: String },
    Save {
        name: String,
        #[arg(long)]
        input: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum CasinoCommand {
    List {},
    Show { name: String },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = if cfg_path.exists() {
        Config::load(&cfg_path)?
    } else {
        Config::default()
    };

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Run {
            player_name,
            bankroll,
            num_hands,
            casino,
            playing_strategy,
            betting_strategy,
        } => {
            let req = RunRequest {
                player_name,
                bankroll,
                num_hands,
                casino,
                playing_strategy,
                betting_strategy,
            };
            run_batch(&cfg, vec![req])
        }
        Command::Batch { input } => {
            let raw = std::fs::read(&input)
                .with_context(|| format!("reading batch file: {}", input.display()))?;
            let reqs: Vec<RunRequest> = serde_json::from_slice(&raw)
                .with_context(|| format!("parsing batch file: {}", input.display()))?;
            run_batch(&cfg, reqs)
        }
        Command::History(cmd) => history(&cfg, cmd),
        Command::Strategy(cmd) => strategy(&cfg, cmd),
        Command::Betting(cmd) => betting(&cfg, cmd),
        Command::Casino(cmd) => casino(&cfg, cmd),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        if !p.exists() {
            return Err(anyhow!("config file does not exist: {}", p.display()));
        }
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("simdeck.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("simdeck.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr.
    let console_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.paths.work_dir).join("simdeck.log"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    let engine = ProcessEngine::new(cfg);
    let diag = engine.doctor();
    print_json(&diag)?;
    if !diag.ok {
        return Err(anyhow!("engine check failed"));
    }
    Ok(())
}

fn run_batch(cfg: &Config, reqs: Vec<RunRequest>) -> Result<()> {
    if reqs.is_empty() {
        return Err(anyhow!("no runs to submit"));
    }
    let engine = Arc::new(ProcessEngine::new(cfg));
    let runner = JobRunner::new(cfg, engine).with_context(|| "starting job runner")?;

    let configs: Vec<_> = reqs
        .into_iter()
        .map(|req| req.into_config(&cfg.defaults))
        .collect();
    let players: Vec<String> = configs.iter().map(|c| c.player_name.clone()).collect();

    let mut ids = Vec::new();
    let mut summaries = Vec::new();
    let mut failed = 0;
    for (index, submitted) in runner.submit_batch(configs).into_iter().enumerate() {
        match submitted {
            Ok(id) => ids.push(id),
            Err(err) => {
                warn!("run {index} not submitted: {err}");
                failed += 1;
                summaries.push(serde_json::json!({
                    "index": index,
                    "status": "rejected",
                    "player_name": players[index],
                    "error": err.to_string(),
                }));
            }
        }
    }

    let poll = Duration::from_millis(cfg.global.poll_interval_ms.max(10));
    for id in ids {
        let record = wait_logged(&runner, id, poll)?;
        if record.status == JobStatus::Error {
            failed += 1;
        }
        summaries.push(job_summary(&record));
    }
    runner.shutdown();

    if cfg.global.print_summary {
        print_json(&summaries)?;
    }
    if failed > 0 {
        return Err(anyhow!("{failed} run(s) failed"));
    }
    Ok(())
}

fn wait_logged(runner: &JobRunner, id: JobId, poll: Duration) -> Result<JobRecord> {
    let mut last = None;
    let record = runner.wait(id, poll, |rec| {
        let now = (rec.status, rec.progress);
        if last != Some(now) {
            info!("job {} {:?} {}%", rec.id, rec.status, rec.progress);
            last = Some(now);
        }
    })?;
    Ok(record)
}

fn job_summary(record: &JobRecord) -> serde_json::Value {
    let result = record.result.as_ref();
    serde_json::json!({
        "job_id": record.id,
        "status": record.status,
        "player_name": record.config.player_name,
        "run_id": result.and_then(|r| r.run_id.clone()),
        "archive_error": result.and_then(|r| r.archive_error.clone()),
        "players": result.map(|r| &r.document.players),
        "error": record.error,
    })
}

fn history(cfg: &Config, cmd: HistoryCommand) -> Result<()> {
    let archive = ResultArchive::new(&cfg.paths.results_dir);
    match cmd {
        HistoryCommand::List {} => print_json(&archive.list()?),
        HistoryCommand::Show { run_id } => {
            let meta = archive.get(&run_id)?;
            let result = archive.load_result(&run_id)?;
            print_json(&serde_json::json!({ "run": meta, "result": result }))
        }
        HistoryCommand::Delete { run_id } => {
            archive.delete(&run_id)?;
            info!("run {run_id} deleted");
            Ok(())
        }
        HistoryCommand::Clear {} => {
            let n = archive.clear()?;
            info!("deleted {n} run(s)");
            Ok(())
        }
    }
}

fn strategy(cfg: &Config, cmd: StrategyCommand) -> Result<()> {
    let library = Library::new(cfg);
    match cmd {
        StrategyCommand::List {} => print_json(&library.list_playing()?),
        StrategyCommand::Show { name, range } => {
            if range {
                print_json(&library.load_playing_range(&name)?)
            } else {
                print_json(&library.load_playing_expanded(&name)?)
            }
        }
        StrategyCommand::Save { name, input } => {
            let raw = std::fs::read(&input)
                .with_context(|| format!("reading chart: {}", input.display()))?;
            let chart: ExpandedChart = serde_json::from_slice(&raw)
                .with_context(|| format!("parsing expanded chart: {}", input.display()))?;
            let incomplete = chart
                .iter()
                .filter(|(_, cells)| !cells.is_empty() && cells.len() < 10)
                .count();
            if incomplete > 0 {
                warn!("{incomplete} hand(s) do not cover every dealer card");
            }
            let path = library.save_playing(&name, &chart)?;
            println!("{}", path.display());
            Ok(())
        }
        StrategyCommand::Delete { name } => {
            library.delete_playing(&name)?;
            Ok(())
        }
        StrategyCommand::Canonicalize { input } => {
            let raw = std::fs::read(&input)
                .with_context(|| format!("reading chart: {}", input.display()))?;
            let chart: RangeChart = serde_json::from_slice(&raw)
                .with_context(|| format!("parsing range chart: {}", input.display()))?;
            print_json(&codec::canonicalize(&chart)?)
        }
    }
}

fn betting(cfg: &Config, cmd: BettingCommand) -> Result<()> {
    let library = Library::new(cfg);
    match cmd {
        BettingCommand::List {} => print_json(&library.list_betting()?),
        BettingCommand::Show { name } => {
            let strategy = library.load_betting(&name)?;
            let bets: Vec<_> = (-2..=6)
                .map(|tc| {
                    let tc = f64::from(tc);
                    serde_json::json!({ "true_count": tc, "bet": strategy.bet_for_true_count(tc) })
                })
                .collect();
            print_json(&serde_json::json!({ "strategy": strategy, "bets": bets }))
        }
        BettingCommand::Save { name, input } => {
            let raw = std::fs::read(&input)
                .with_context(|| format!("reading betting strategy: {}", input.display()))?;
            let strategy = BettingStrategy::from_json(&raw)?;
            let path = library.save_betting(&name, &strategy)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn casino(cfg: &Config, cmd: CasinoCommand) -> Result<()> {
    let library = Library::new(cfg);
    match cmd {
        CasinoCommand::List {} => print_json(&library.list_casinos()?),
        CasinoCommand::Show { name } => print_json(&library.load_casino(&name)?),
    }
}
