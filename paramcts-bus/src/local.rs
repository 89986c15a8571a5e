use crossbeam_channel::{Receiver, Sender};

use crate::link::{ExecutorLink, MasterLink};
use crate::wire::{Outcome, Task};

/// Master-side half of an in-process rank link: a bounded `Task` channel
/// out and an `Outcome` channel back. Grounded on
/// `bench-harness::worker::WorkerPool`'s bounded channel, generalized to a
/// duplex pair since here (unlike the fire-and-forget worker pool) every
/// task gets exactly one reply.
pub struct LocalExecutorLink {
    task_tx: Sender<Task>,
    outcome_rx: Receiver<Outcome>,
}

/// Executor-side half of the same pair.
pub struct LocalMasterLink {
    task_rx: Receiver<Task>,
    outcome_tx: Sender<Outcome>,
}

/// Builds one rank's worth of in-process link, used by `--threads` mode
/// and by tests that want to exercise the master/executor protocol
/// without binding a socket.
pub fn local_link_pair() -> (LocalExecutorLink, LocalMasterLink) {
    let (task_tx, task_rx) = crossbeam_channel::bounded(1);
    let (outcome_tx, outcome_rx) = crossbeam_channel::bounded(1);
    (LocalExecutorLink { task_tx, outcome_rx }, LocalMasterLink { task_rx, outcome_tx })
}

impl ExecutorLink for LocalExecutorLink {
    fn send_task(&mut self, task: Task) -> anyhow::Result<()> {
        self.task_tx.send(task).map_err(|_| anyhow::anyhow!("executor link closed"))
    }

    fn recv_outcome(&mut self) -> anyhow::Result<Outcome> {
        self.outcome_rx.recv().map_err(|_| anyhow::anyhow!("executor link closed"))
    }
}

impl MasterLink for LocalMasterLink {
    fn recv_task(&mut self) -> anyhow::Result<Task> {
        self.task_rx.recv().map_err(|_| anyhow::anyhow!("master link closed"))
    }

    fn send_outcome(&mut self, outcome: Outcome) -> anyhow::Result<()> {
        self.outcome_tx.send(outcome).map_err(|_| anyhow::anyhow!("master link closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paramcts_tree::Leaf;

    #[test]
    fn round_trips_a_task_and_an_outcome() {
        let (mut exec_side, mut master_side) = local_link_pair();
        let leaf = Leaf { node: 0usize.into(), assignment: vec![] };
        exec_side.send_task(Task::Run(leaf)).unwrap();
        match master_side.recv_task().unwrap() {
            Task::Run(_) => {}
            other => panic!("unexpected task: {other:?}"),
        }
        master_side.send_outcome(Outcome { node: 0usize.into(), value: Some(1.5) }).unwrap();
        let outcome = exec_side.recv_outcome().unwrap();
        assert_eq!(outcome.value, Some(1.5));
    }
}
