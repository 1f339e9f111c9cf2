//! The process group and its collective operations.
//!
//! Every collective must be entered by all workers in the same order. The
//! underlying links are FIFO per ordered pair of ranks, so no message tags are
//! needed as long as that discipline holds.

pub use local::{run_local, run_local_each, LocalEndpoint};
pub use tcp::{default_peers, TcpEndpoint};
pub use topology::Topology;

use crate::error::{Error, Result};
use crate::memory_manager::MemoryManager;

mod local;
mod tcp;
mod topology;

/// A point-to-point link to every worker of the group, including itself.
pub trait Endpoint {
    fn topology(&self) -> Topology;

    /// Queues `payload` for `dest`. Never waits for `dest` to receive it.
    fn send(&mut self, dest: usize, payload: Vec<u8>) -> Result<()>;

    /// Blocks until the next message from `src` arrives.
    fn recv(&mut self, src: usize) -> Result<Vec<u8>>;
}

/// Collective operations over an [`Endpoint`].
pub struct Communicator<E: Endpoint> {
    endpoint: E,
    topology: Topology,
}

impl<E: Endpoint> Communicator<E> {
    pub const ROOT: usize = 0;

    pub fn new(endpoint: E) -> Self {
        let topology = endpoint.topology();
        Self { endpoint, topology }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn rank(&self) -> usize {
        self.topology.rank
    }

    pub fn size(&self) -> usize {
        self.topology.size
    }

    pub fn is_root(&self) -> bool {
        self.rank() == Self::ROOT
    }

    /// Sends `chunks[r]` from the root to rank `r`. Only the root's `chunks` is read.
    pub fn scatter(&mut self, chunks: Option<Vec<Vec<u8>>>) -> Result<Vec<u8>> {
        if !self.is_root() {
            return self.endpoint.recv(Self::ROOT);
        }
        let chunks = chunks.unwrap_or_else(|| vec![vec![]; self.size()]);
        if chunks.len() != self.size() {
            return Err(Error::Protocol(format!(
                "scatter of {} chunks over {} workers",
                chunks.len(),
                self.size()
            )));
        }
        let mut chunks = chunks.into_iter();
        let own = chunks.next().unwrap_or_default();
        for (dest, chunk) in chunks.enumerate() {
            self.endpoint.send(dest + 1, chunk)?;
        }
        Ok(own)
    }

    /// Collects every worker's `payload` on the root, ordered by rank.
    pub fn gather(&mut self, payload: Vec<u8>) -> Result<Option<Vec<Vec<u8>>>> {
        if !self.is_root() {
            self.endpoint.send(Self::ROOT, payload)?;
            return Ok(None);
        }
        let mut gathered = Vec::with_capacity(self.size());
        gathered.push(payload);
        for src in 1..self.size() {
            gathered.push(self.endpoint.recv(src)?);
        }
        Ok(Some(gathered))
    }

    /// Replicates the root's `payload` on every worker.
    pub fn broadcast(&mut self, payload: Option<Vec<u8>>) -> Result<Vec<u8>> {
        if !self.is_root() {
            return self.endpoint.recv(Self::ROOT);
        }
        let payload = payload.unwrap_or_default();
        for dest in 1..self.size() {
            self.endpoint.send(dest, payload.clone())?;
        }
        Ok(payload)
    }

    /// Sends `counts[d]` to rank `d` and returns the count every rank sent here.
    pub fn all_to_all_counts(&mut self, counts: &[u64]) -> Result<Vec<u64>> {
        self.check_len("send counts", counts.len())?;
        for (dest, count) in counts.iter().enumerate() {
            self.endpoint.send(dest, count.to_le_bytes().to_vec())?;
        }
        (0..self.size())
            .map(|src| {
                let bytes = self.endpoint.recv(src)?;
                let mut array = [0; 8];
                if bytes.len() != array.len() {
                    return Err(Error::Protocol(format!(
                        "size message of {} bytes from rank {}",
                        bytes.len(),
                        src
                    )));
                }
                array.copy_from_slice(&bytes);
                Ok(u64::from_le_bytes(array))
            })
            .collect()
    }

    /// Variable-length all-to-all: `send_buckets[d]` goes to rank `d` and the
    /// bucket rank `s` sent here lands at `recv_buf[recv_displs[s]..][..recv_counts[s]]`.
    ///
    /// The buckets are handed to the links without copying; each received byte
    /// is copied once, into `recv_buf`.
    pub fn all_to_allv(
        &mut self,
        send_buckets: Vec<Vec<u8>>,
        recv_buf: &mut MemoryManager,
        recv_counts: &[usize],
        recv_displs: &[usize],
    ) -> Result<()> {
        self.check_len("send buckets", send_buckets.len())?;
        self.check_len("receive counts", recv_counts.len())?;
        self.check_len("receive displacements", recv_displs.len())?;
        for (dest, bucket) in send_buckets.into_iter().enumerate() {
            self.endpoint.send(dest, bucket)?;
        }
        for src in 0..self.size() {
            let payload = self.endpoint.recv(src)?;
            let (pos, len) = (recv_displs[src], recv_counts[src]);
            if payload.len() != len || pos + len > recv_buf.len() {
                return Err(Error::Protocol(format!(
                    "rank {} announced {} bytes but delivered {}",
                    src,
                    len,
                    payload.len()
                )));
            }
            recv_buf.copy_from_slice(pos, &payload)?;
        }
        Ok(())
    }

    fn check_len(&self, what: &str, len: usize) -> Result<()> {
        if len == self.size() {
            Ok(())
        } else {
            Err(Error::Protocol(format!(
                "{} has {} entries for {} workers",
                what,
                len,
                self.size()
            )))
        }
    }
}
