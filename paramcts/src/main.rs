//! CLI entry point: parses flags, loads or restores a scenario, and
//! dispatches to the master or executor role by `--rank` (spec.md §6,
//! SPEC_FULL.md §6 supplement). Grounded on `bench-harness/src/main.rs`'s
//! `Args` struct and subscriber setup.

mod config;
mod executor;
mod logging;
mod master;
mod stats;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use paramcts_bus::{rank_addr, ExecutorLink, MasterLink, TcpExecutorLink, TcpMasterLink};
use paramcts_exec::ProgramCaller;

/// `paramMCTS-{}-{}.save`-style configurator CLI. Flags and defaults match
/// spec.md §6 exactly; `--rank`/`--workers`/`--host`/`--base-port` are this
/// implementation's rank-addressed-bus launcher substitute for a real `mpirun`
/// (SPEC_FULL.md §6).
#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Print test-suite guidance and exit instead of running a search.
    #[arg(long)]
    test: bool,
    /// Start a fresh search from a HAL-JSON scenario file.
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,
    /// Resume a search from a checkpoint file.
    #[arg(long, value_name = "FILE")]
    load: Option<PathBuf>,
    /// Print a summary of a checkpoint file and exit.
    #[arg(long, value_name = "FILE")]
    stats: Option<PathBuf>,
    /// With `--stats`, also emit a Graphviz dot file alongside it.
    #[arg(long)]
    dot: bool,

    /// Root directories to recursively enumerate instance files from.
    #[arg(short, long = "instances", value_name = "PATH", default_values = ["instances/"])]
    instances: Vec<PathBuf>,
    /// Memory limit in MB, substituted into `{memory}` in the prefix command.
    #[arg(short, long, default_value_t = 2000)]
    memory: u64,
    /// Per-run wall-clock timeout in seconds, substituted into `{timeout}`.
    #[arg(short, long, default_value_t = 600)]
    timeout: u64,
    /// Prefix command template, with `{timeout}`/`{memory}` placeholders.
    #[arg(short, long, default_value = "bin/runsolver -W {timeout} -M {memory}")]
    prefix: String,
    /// Multiplier applied to the timeout for a penalised (timed-out) run.
    #[arg(long, default_value_t = master::DEFAULT_PENALTY)]
    penalty: f64,
    /// Total search wall-clock budget in minutes.
    #[arg(long, default_value_t = 60)]
    limit: u64,

    /// Run executor ranks as in-process threads instead of separate
    /// processes connected over TCP.
    #[arg(long, conflicts_with = "processes")]
    threads: bool,
    /// Run executor ranks as separate processes connected over TCP
    /// (default).
    #[arg(long)]
    processes: bool,
    /// Number of executor ranks (world size is this plus the master).
    #[arg(long, default_value_t = 1)]
    workers: usize,
    /// This process's rank: 0 (default) is the master, >=1 is an executor.
    #[arg(long, default_value_t = 0)]
    rank: usize,
    /// Host the executors' TCP listeners bind to / the master dials.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Base TCP port; rank R listens on `base_port + R`.
    #[arg(long, default_value_t = 9000)]
    base_port: u16,
}

/// Exactly one of `--test`/`--json`/`--load`/`--stats` selects the run mode.
fn validate_single_mode(args: &Args) -> anyhow::Result<()> {
    let mode_count =
        [args.test, args.json.is_some(), args.load.is_some(), args.stats.is_some()].iter().filter(|b| **b).count();
    anyhow::ensure!(mode_count == 1, "exactly one of --test, --json, --load, --stats must be given");
    Ok(())
}

/// The bus needs at least one executor alongside the master (spec.md §6's
/// `W >= 2` world-size guard, restated in terms of `--workers` — the
/// executor count — per SPEC_FULL.md §6).
fn validate_worker_count(workers: usize) -> anyhow::Result<()> {
    anyhow::ensure!(workers >= 1, "must be launched with at least one executor (W >= 1); got --workers 0");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    validate_single_mode(&args)?;

    if args.test {
        println!("run `cargo test --workspace` to exercise the test suite.");
        return Ok(());
    }

    if let Some(stats_path) = &args.stats {
        let dot_path = args.dot.then(|| stats_path.with_extension("dot"));
        return stats::run(stats_path, dot_path.as_deref());
    }

    validate_worker_count(args.workers)?;

    let component = if args.rank == 0 { "master".to_string() } else { format!("executor-{}", args.rank) };
    let _log_guard = logging::init(&component)?;

    if args.rank > 0 {
        return run_executor(&args);
    }
    run_master(&args)
}

/// Builds the `ProgramCaller` and instance-variable name a standalone
/// executor process needs, from either a fresh `--json` scenario or a
/// resumed `--load` checkpoint (spec.md §4.F: "no tree is needed on
/// executors", just the call contract).
fn build_executor_caller(args: &Args) -> anyhow::Result<(ProgramCaller, Option<String>)> {
    if let Some(json_path) = &args.json {
        let scenario = config::load_scenario(json_path, args.timeout, args.memory, &args.prefix)?;
        let caller = config::build_program_caller(&scenario)?;
        Ok((caller, Some(scenario.loaded.instance_variable.clone())))
    } else if let Some(load_path) = &args.load {
        let payload = paramcts_checkpoint::load(load_path)?;
        let fields = paramcts_checkpoint::apply_as_executor(payload);
        let caller = config::build_program_caller_from_checkpoint(&fields)?;
        Ok((caller, Some(fields.instance_variable)))
    } else {
        anyhow::bail!("executor ranks require --json or --load to build their program caller");
    }
}

fn run_executor(args: &Args) -> anyhow::Result<()> {
    anyhow::ensure!(
        !args.threads,
        "--threads mode spawns executors in-process; a standalone executor process is for --processes mode only"
    );
    let (caller, cat_variable) = build_executor_caller(args)?;

    let addr = rank_addr(&args.host, args.base_port, args.rank);
    tracing::info!(%addr, rank = args.rank, "executor listening");
    let link: Box<dyn MasterLink + Send> = Box::new(TcpMasterLink::listen(&addr)?);

    executor::run(caller, link, executor::ExecutorConfig { cat_variable })
}

fn run_master(args: &Args) -> anyhow::Result<()> {
    let (tree, instance_selector, caller_fields, state_name) = if let Some(json_path) = &args.json {
        let scenario = config::load_scenario(json_path, args.timeout, args.memory, &args.prefix)?;
        let instance_paths = args.instances.clone();
        let (tree, selector) = config::build_master_state(&scenario, &instance_paths)?;
        let fields = scenario.caller_fields(args.timeout as f64);
        (tree, selector, fields, paramcts_checkpoint::generate_state_name())
    } else if let Some(load_path) = &args.load {
        let payload = paramcts_checkpoint::load(load_path)?;
        let (tree, fields) = paramcts_checkpoint::apply_as_master(payload);
        let instance_paths = args.instances.clone();
        let selector = paramcts_config::InstanceSelector::new(&instance_paths, fields.instance_variable.clone(), true)
            .context("failed to enumerate instance files")?;
        (tree, selector, fields, load_path.to_string_lossy().to_string())
    } else {
        unreachable!("mode_count guard above ensures --json or --load is set here");
    };

    let links = connect_executors(args, &caller_fields)?;

    let config = master::MasterConfig {
        workers: args.workers,
        caller_fields,
        penalty: args.penalty,
        limit_minutes: args.limit,
        state_name,
    };
    master::run(tree, instance_selector, links, config)?;
    Ok(())
}

/// Builds one link per executor rank: in-process for `--threads`, TCP for
/// `--processes` (the default). `--threads` also spawns the executor loop
/// itself on a background thread, since there is no separate process to
/// bind the other half of the link.
///
/// `caller_fields` is the master's own (already-resolved, whether from
/// `--json` or `--load`) copy — `--threads` executors reuse it directly
/// rather than re-deriving one from the checkpoint, since calling the
/// registry-clearing `apply_as_executor` from one of these in-process
/// threads would wipe the master's own parameter registry out from under it.
fn connect_executors(
    args: &Args,
    caller_fields: &paramcts_checkpoint::CallerFields,
) -> anyhow::Result<Vec<Box<dyn ExecutorLink + Send>>> {
    if args.threads {
        let mut links: Vec<Box<dyn ExecutorLink + Send>> = Vec::with_capacity(args.workers);
        for rank in 1..=args.workers {
            let (exec_link, master_link) = paramcts_bus::local_link_pair();
            links.push(Box::new(exec_link));

            let fields = caller_fields.clone();
            std::thread::Builder::new().name(format!("executor-{rank}")).spawn(move || {
                let caller = match config::build_program_caller_from_checkpoint(&fields) {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::error!("executor {rank} failed to build program caller: {e:#}");
                        return;
                    }
                };
                let link: Box<dyn MasterLink + Send> = Box::new(master_link);
                let cat_variable = Some(fields.instance_variable.clone());
                if let Err(e) = executor::run(caller, link, executor::ExecutorConfig { cat_variable }) {
                    tracing::error!("executor {rank} exited with error: {e:#}");
                }
            })?;
        }
        Ok(links)
    } else {
        let mut links: Vec<Box<dyn ExecutorLink + Send>> = Vec::with_capacity(args.workers);
        for rank in 1..=args.workers {
            let addr = rank_addr(&args.host, args.base_port, rank);
            links.push(Box::new(TcpExecutorLink::connect(&addr)?));
        }
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_args() -> Args {
        Args::parse_from(["paramcts"])
    }

    #[test]
    fn rejects_zero_or_more_than_one_mode() {
        let args = bare_args();
        assert!(validate_single_mode(&args).is_err());

        let mut args = bare_args();
        args.test = true;
        args.json = Some(PathBuf::from("scenario.json"));
        assert!(validate_single_mode(&args).is_err());
    }

    #[test]
    fn accepts_exactly_one_mode() {
        let mut args = bare_args();
        args.test = true;
        assert!(validate_single_mode(&args).is_ok());
    }

    #[test]
    fn start_up_guard_rejects_zero_workers() {
        let err = validate_worker_count(0).unwrap_err();
        assert!(err.to_string().contains("W >= 1"));
    }

    #[test]
    fn start_up_guard_accepts_one_or_more_workers() {
        assert!(validate_worker_count(1).is_ok());
        assert!(validate_worker_count(4).is_ok());
    }
}
