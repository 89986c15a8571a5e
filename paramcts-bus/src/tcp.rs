use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use anyhow::Context;

use crate::link::{ExecutorLink, MasterLink};
use crate::wire::{Outcome, Task};

const CONNECT_RETRIES: usize = 10;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Newline-delimited JSON over a `TcpStream`, the same framing
/// `agent-interface::client::RpcAgent` uses for its `IpcWrapper<T>`
/// messages, minus the request-id matching (the task/outcome protocol is
/// strictly one-in-flight-per-rank, so no id is needed to disambiguate
/// replies).
struct FramedStream {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    buf: Vec<u8>,
}

impl FramedStream {
    fn new(stream: TcpStream) -> anyhow::Result<Self> {
        stream.set_nodelay(true).context("failed to set TCP_NODELAY")?;
        let writer = stream.try_clone().context("failed to clone stream")?;
        Ok(Self { reader: BufReader::new(stream), writer, buf: Vec::new() })
    }

    fn write_json<T: serde::Serialize>(&mut self, value: &T) -> anyhow::Result<()> {
        self.buf.clear();
        serde_json::to_writer(&mut self.buf, value)?;
        self.buf.push(b'\n');
        self.writer.write_all(&self.buf).context("failed to send message")
    }

    fn read_json<T: serde::de::DeserializeOwned>(&mut self) -> anyhow::Result<T> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf).context("failed to read message")?;
        if n == 0 {
            anyhow::bail!("peer closed the connection");
        }
        serde_json::from_slice(&self.buf).context("invalid message on the bus")
    }
}

/// Master-side TCP link to one executor rank. The executor listens; the
/// master dials out, retrying like `agent_interface::client::retry` does
/// for its VM/container agents, since the executor process may not have
/// bound its listener yet.
pub struct TcpExecutorLink {
    stream: FramedStream,
}

impl TcpExecutorLink {
    pub fn connect(addr: &str) -> anyhow::Result<Self> {
        let mut retries = 0;
        loop {
            match TcpStream::connect(addr) {
                Ok(stream) => return Ok(Self { stream: FramedStream::new(stream)? }),
                Err(e) if retries < CONNECT_RETRIES => {
                    tracing::warn!("error connecting to executor at {addr}: {e}");
                    retries += 1;
                    std::thread::sleep(CONNECT_RETRY_DELAY);
                }
                Err(e) => return Err(e).with_context(|| format!("failed to connect to executor at {addr}")),
            }
        }
    }
}

impl ExecutorLink for TcpExecutorLink {
    fn send_task(&mut self, task: Task) -> anyhow::Result<()> {
        self.stream.write_json(&task)
    }

    fn recv_outcome(&mut self) -> anyhow::Result<Outcome> {
        self.stream.read_json()
    }
}

/// Executor-side TCP link: binds `bind_addr`, accepts exactly one
/// connection (the master), and then behaves like a simple req/reply
/// socket for the rest of the process's life.
pub struct TcpMasterLink {
    stream: FramedStream,
}

impl TcpMasterLink {
    pub fn listen(bind_addr: &str) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .with_context(|| format!("failed to bind executor listener on {bind_addr}"))?;
        let (stream, peer) = listener.accept().context("failed to accept master connection")?;
        tracing::info!(%peer, "master connected");
        Ok(Self { stream: FramedStream::new(stream)? })
    }
}

impl MasterLink for TcpMasterLink {
    fn recv_task(&mut self) -> anyhow::Result<Task> {
        self.stream.read_json()
    }

    fn send_outcome(&mut self, outcome: Outcome) -> anyhow::Result<()> {
        self.stream.write_json(&outcome)
    }
}

/// The executor listener address for `rank` relative to a base port,
/// mirroring the rank-addressed topology spec.md §5 asks for without a
/// real MPI runtime (see DESIGN.md).
pub fn rank_addr(host: &str, base_port: u16, rank: usize) -> String {
    format!("{host}:{}", base_port + rank as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paramcts_tree::Leaf;

    /// Port 0 picks a free ephemeral port; the listener is dropped before
    /// `TcpMasterLink::listen` re-binds the same address, and the client
    /// side's built-in connect retry absorbs the gap between the two binds.
    fn free_addr() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    }

    #[test]
    fn round_trips_a_task_and_an_outcome_over_tcp() {
        let addr = free_addr();
        let server_addr = addr.clone();

        let server = std::thread::spawn(move || {
            let mut master_side = TcpMasterLink::listen(&server_addr).unwrap();
            match master_side.recv_task().unwrap() {
                Task::Run(_) => {}
                other => panic!("unexpected task: {other:?}"),
            }
            master_side.send_outcome(Outcome { node: 0usize.into(), value: Some(2.5) }).unwrap();
        });

        let mut exec_side = TcpExecutorLink::connect(&addr).unwrap();
        let leaf = Leaf { node: 0usize.into(), assignment: vec![] };
        exec_side.send_task(Task::Run(leaf)).unwrap();
        let outcome = exec_side.recv_outcome().unwrap();
        assert_eq!(outcome.value, Some(2.5));

        server.join().unwrap();
    }
}
