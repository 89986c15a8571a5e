//! Component H: owns the tree, feeds a bounded task queue via one worker
//! shim per executor rank, drains results on a high-/low-water schedule,
//! checkpoints periodically, and shuts down gracefully. Grounded on
//! `bench-harness::worker::WorkerPool` (shim pool shape) and
//! `original_source/src/paramMCTS/runtime.py`'s `Master`/`Worker` classes
//! (queue sizing, the select→enqueue→drain loop, the exact `_update`
//! back-propagation dispatch — spec.md §4.H, §5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use paramcts_bus::{ExecutorLink, Outcome, Task};
use paramcts_config::InstanceSelector;
use paramcts_tree::{Leaf, Tree};
use paramcts_types::ParameterStore;

pub const DEFAULT_PENALTY: f64 = 3.0;

#[derive(Debug, Clone)]
enum QueueItem {
    Run(Leaf),
    Stop,
}

struct PendingResult {
    leaf: Leaf,
    value: Option<f64>,
}

pub struct MasterConfig {
    pub workers: usize,
    pub caller_fields: paramcts_checkpoint::CallerFields,
    pub penalty: f64,
    pub limit_minutes: u64,
    pub state_name: String,
}

/// Runs the master loop to completion (wall-clock deadline), checkpoints
/// one last time, and returns the deterministic best-assignment string.
///
/// Reads the process-wide parameter registry rather than taking an owned
/// `ParameterStore`: by the time this is called, either `build_master_state`
/// or `apply_as_master` has already installed the real registry there
/// (spec.md §9's singleton convenience).
pub fn run(
    mut tree: Tree,
    instance_selector: InstanceSelector,
    links: Vec<Box<dyn ExecutorLink + Send>>,
    config: MasterConfig,
) -> anyhow::Result<String> {
    anyhow::ensure!(links.len() == config.workers, "link count must match worker count");
    let store = paramcts_types::global().lock().unwrap();

    let (task_tx, task_rx) = crossbeam_channel::bounded::<QueueItem>(2 * config.workers);
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<PendingResult>();
    let terminate = Arc::new(AtomicBool::new(false));
    let instance_selector = Arc::new(instance_selector);

    let mut shims = Vec::new();
    for (idx, link) in links.into_iter().enumerate() {
        let rank = idx + 1;
        let task_rx = task_rx.clone();
        let result_tx = result_tx.clone();
        let instances = instance_selector.clone();
        let handle = std::thread::Builder::new()
            .name(format!("shim-{rank}"))
            .spawn(move || shim_loop(rank, link, task_rx, result_tx, instances))?;
        shims.push(handle);
    }
    drop(task_rx);
    drop(result_tx);

    start_deadline_timer(terminate.clone(), config.limit_minutes);

    let mut rng = rand::thread_rng();
    let low_water = (config.workers + 1) / 2;
    while !terminate.load(Ordering::SeqCst) {
        let leaf = tree.select_leaf(&store, &mut rng)?;
        tracing::debug!(node = leaf.node.index(), "leaf selected");
        if task_tx.send(QueueItem::Run(leaf)).is_err() {
            break;
        }

        if task_tx.len() < config.workers {
            continue;
        }

        while task_tx.len() > low_water && !terminate.load(Ordering::SeqCst) {
            match result_rx.recv_timeout(Duration::from_secs(5)) {
                Ok(pending) => {
                    let reward = resolve_reward(pending.value, config.penalty, config.caller_fields.timeout_seconds);
                    tree.backpropagate(&pending.leaf.assignment, reward);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        checkpoint(&tree, &store, &config)?;
    }

    for _ in 0..config.workers {
        let _ = task_tx.send(QueueItem::Stop);
    }
    drop(task_tx);
    for shim in shims {
        if let Err(e) = shim.join() {
            tracing::error!("shim thread panicked: {e:?}");
        }
    }

    while let Ok(pending) = result_rx.try_recv() {
        let reward = resolve_reward(pending.value, config.penalty, config.caller_fields.timeout_seconds);
        tree.backpropagate(&pending.leaf.assignment, reward);
    }

    checkpoint(&tree, &store, &config)?;
    let best = tree.best_assignment();
    println!("{best}");
    Ok(best)
}

/// A timed-out run reports `value=None`; its back-propagated reward is the
/// timeout penalised by `penalty` rather than the measured runtime (spec.md
/// §4.H, S4).
fn resolve_reward(value: Option<f64>, penalty: f64, timeout: f64) -> f64 {
    value.unwrap_or(penalty * timeout)
}

fn start_deadline_timer(terminate: Arc<AtomicBool>, limit_minutes: u64) {
    let seconds = limit_minutes * 60;
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_secs(seconds));
        terminate.store(true, Ordering::SeqCst);
        tracing::info!("wall-clock deadline reached, terminating");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use paramcts_bus::{local_link_pair, MasterLink};

    #[test]
    fn timeout_reward_is_penalty_times_timeout() {
        assert_eq!(resolve_reward(None, 3.0, 600.0), 1800.0);
    }

    #[test]
    fn measured_reward_passes_through_unpenalised() {
        assert_eq!(resolve_reward(Some(12.5), 3.0, 600.0), 12.5);
    }

    /// A timed-out outcome flows from the stub executor through the shim
    /// back to the result queue, paired with the original (pre-instance)
    /// leaf rather than the instance-augmented one sent over the wire.
    #[test]
    fn shim_loop_pairs_timeout_outcome_with_original_leaf() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.cnf"), b"x").unwrap();
        let selector =
            Arc::new(InstanceSelector::new(&[dir.path()], "instance", false).unwrap());

        let (exec_link, mut stub_executor) = local_link_pair();
        let stub = std::thread::spawn(move || loop {
            match stub_executor.recv_task().unwrap() {
                Task::Run(leaf) => {
                    stub_executor.send_outcome(Outcome { node: leaf.node, value: None }).unwrap();
                }
                Task::Stop => break,
                Task::Prefix(_) => {}
            }
        });

        let (task_tx, task_rx) = crossbeam_channel::unbounded::<QueueItem>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<PendingResult>();
        let leaf = Leaf { node: 0usize.into(), assignment: vec![] };
        task_tx.send(QueueItem::Run(leaf.clone())).unwrap();
        task_tx.send(QueueItem::Stop).unwrap();

        shim_loop(1, Box::new(exec_link), task_rx, result_tx, selector);
        stub.join().unwrap();

        let pending = result_rx.recv().unwrap();
        assert_eq!(pending.value, None);
        assert_eq!(pending.leaf.assignment, leaf.assignment);
    }
}

fn checkpoint(tree: &Tree, store: &ParameterStore, config: &MasterConfig) -> anyhow::Result<()> {
    let fields = &config.caller_fields;
    let payload = paramcts_checkpoint::CheckpointPayload {
        timeout_seconds: fields.timeout_seconds,
        instance_variable: fields.instance_variable.clone(),
        executable: fields.executable.clone(),
        callstring_template: fields.callstring_template.clone(),
        callstring_constants: fields.callstring_constants.clone(),
        prefix_cmd: fields.prefix_cmd.clone(),
        stdout_patterns: fields.stdout_patterns.clone(),
        stderr_patterns: fields.stderr_patterns.clone(),
        parameters: store.snapshot(),
        tree: tree.snapshot(),
    };
    paramcts_checkpoint::save(&config.state_name, &payload, paramcts_checkpoint::SaveCompression::Gzip)?;
    Ok(())
}

/// One shim per executor rank: pulls a task off the shared queue, appends
/// a freshly chosen instance, forwards it over the rank's link, and
/// hands the outcome (paired back with the pre-instance leaf) to the
/// result queue for the main loop to back-propagate.
fn shim_loop(
    rank: usize,
    mut link: Box<dyn ExecutorLink + Send>,
    task_rx: Receiver<QueueItem>,
    result_tx: Sender<PendingResult>,
    instance_selector: Arc<InstanceSelector>,
) {
    let span = tracing::info_span!("shim", rank);
    let _guard = span.enter();
    for item in task_rx {
        match item {
            QueueItem::Stop => {
                if let Err(e) = link.send_task(Task::Stop) {
                    tracing::error!("failed to send stop to rank {rank}: {e:#}");
                }
                break;
            }
            QueueItem::Run(leaf) => {
                let mut augmented = leaf.clone();
                if let Some(instance) = instance_selector.random_assignment() {
                    augmented.assignment.push(instance);
                }
                if let Err(e) = link.send_task(Task::Run(augmented)) {
                    tracing::error!("failed to send task to rank {rank}: {e:#}");
                    continue;
                }
                match link.recv_outcome() {
                    Ok(Outcome { value, .. }) => {
                        let _ = result_tx.send(PendingResult { leaf, value });
                    }
                    Err(e) => tracing::error!("failed to receive outcome from rank {rank}: {e:#}"),
                }
            }
        }
    }
}
