//! Rank-addressed message bus between the master and its executors
//! (spec.md §5's "MPI-style world with point-to-point send/recv tagged by
//! rank"): shared wire types plus two transports, a TCP one for separate
//! processes and an in-process one for `--threads` mode and tests.

mod link;
mod local;
mod tcp;
mod wire;

pub use link::{ExecutorLink, MasterLink};
pub use local::{local_link_pair, LocalExecutorLink, LocalMasterLink};
pub use tcp::{rank_addr, TcpExecutorLink, TcpMasterLink};
pub use wire::{Outcome, Task};
