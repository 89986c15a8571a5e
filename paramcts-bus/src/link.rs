use crate::wire::{Outcome, Task};

/// Master-side handle to one executor rank: send it a task, block for its
/// reply. One instance per rank, never shared between shims (spec.md §5).
pub trait ExecutorLink: Send {
    fn send_task(&mut self, task: Task) -> anyhow::Result<()>;
    fn recv_outcome(&mut self) -> anyhow::Result<Outcome>;
}

/// Executor-side handle to the master: block for the next task, send back
/// the outcome.
pub trait MasterLink: Send {
    fn recv_task(&mut self) -> anyhow::Result<Task>;
    fn send_outcome(&mut self, outcome: Outcome) -> anyhow::Result<()>;
}
