//! Component G: the executor's protocol loop. Owns a `ProgramCaller` and
//! nothing else — no tree, no parameter registry — and answers `Run`,
//! `Prefix` and `Stop` tasks over its `MasterLink` until told to stop or
//! interrupted (spec.md §4.G, §5, `original_source/src/paramMCTS/runtime.py`'s
//! `Executor` class).

use std::sync::Arc;

use paramcts_bus::{MasterLink, Outcome, Task};
use paramcts_exec::ProgramCaller;

pub struct ExecutorConfig {
    pub cat_variable: Option<String>,
}

/// Runs until the master sends `Task::Stop` or the link is dropped.
/// Installs a SIGINT/SIGTERM handler that kills the in-flight target
/// before the process exits, mirroring the original's `signal.signal`
/// handler around the worker's subprocess.
pub fn run(caller: ProgramCaller, mut link: Box<dyn MasterLink + Send>, config: ExecutorConfig) -> anyhow::Result<()> {
    let caller = Arc::new(caller);
    {
        let caller = caller.clone();
        ctrlc::set_handler(move || {
            tracing::warn!("signal received, killing in-flight target");
            caller.kill(libc::SIGTERM);
            std::process::exit(130);
        })?;
    }

    loop {
        let task = link.recv_task()?;
        match task {
            Task::Stop => {
                tracing::info!("received stop, shutting down");
                break;
            }
            Task::Prefix(template) => {
                caller.set_prefix(Some(template));
            }
            Task::Run(leaf) => {
                let node = leaf.node;
                let assignment = leaf.assignment_map();
                let value = run_once(&caller, assignment, config.cat_variable.as_deref());
                link.send_outcome(Outcome { node, value })?;
            }
        }
    }
    Ok(())
}

/// Calls the target once and reduces its captured output to a measured
/// runtime, or `None` if the run was interrupted by the wall-clock deadline
/// or the call itself failed (spec.md §4.G).
fn run_once(caller: &ProgramCaller, assignment: std::collections::HashMap<String, String>, cat: Option<&str>) -> Option<f64> {
    match caller.call(assignment, cat) {
        Ok(result) if result.stdout.contains_key("interrupted") => None,
        Ok(result) => result.stdout.get("time").and_then(|s| s.parse::<f64>().ok()),
        Err(e) => {
            tracing::warn!("target call failed: {e:#}");
            None
        }
    }
}
