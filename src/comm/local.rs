use super::{Communicator, Endpoint, Topology};
use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Mutex;

/// An in-process worker whose links are channels to the other workers.
pub struct LocalEndpoint {
    topology: Topology,
    senders: Vec<Sender<Vec<u8>>>,
    receivers: Vec<Receiver<Vec<u8>>>,
}

impl LocalEndpoint {
    /// Creates a fully connected group of `size` endpoints, indexed by rank.
    pub fn group(size: usize) -> Vec<LocalEndpoint> {
        let mut senders: Vec<Vec<Sender<Vec<u8>>>> = (0..size).map(|_| vec![]).collect();
        let mut receivers: Vec<Vec<Receiver<Vec<u8>>>> = (0..size).map(|_| vec![]).collect();
        for src in 0..size {
            for dest in 0..size {
                let (sender, receiver) = unbounded();
                senders[src].push(sender);
                receivers[dest].push(receiver);
            }
        }
        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| LocalEndpoint {
                topology: Topology { rank, size },
                senders,
                receivers,
            })
            .collect()
    }
}

impl Endpoint for LocalEndpoint {
    fn topology(&self) -> Topology {
        self.topology
    }

    fn send(&mut self, dest: usize, payload: Vec<u8>) -> Result<()> {
        self.senders[dest]
            .send(payload)
            .map_err(|_| Error::disconnected(dest))
    }

    fn recv(&mut self, src: usize) -> Result<Vec<u8>> {
        self.receivers[src]
            .recv()
            .map_err(|_| Error::disconnected(src))
    }
}

/// Runs `worker` on `size` in-process workers and returns each worker's result
/// by rank.
///
/// A worker that fails drops its links, so its peers observe a transport
/// error instead of waiting forever.
pub fn run_local_each<T, F>(size: usize, worker: F) -> Result<Vec<Result<T>>>
where
    T: Send,
    F: Fn(Communicator<LocalEndpoint>) -> Result<T> + Sync,
{
    let endpoints: Vec<_> = LocalEndpoint::group(size)
        .into_iter()
        .map(|endpoint| Mutex::new(Some(endpoint)))
        .collect();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(size)
        .thread_name(|index| format!("worker-{}", index))
        .build()
        .map_err(|e| {
            Error::Transport(std::io::Error::new(
                std::io::ErrorKind::Other,
                e.to_string(),
            ))
        })?;
    Ok(pool.broadcast(|ctx| {
        let endpoint = endpoints[ctx.index()]
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or_else(|| Error::Protocol(format!("worker {} started twice", ctx.index())))?;
        worker(Communicator::new(endpoint))
    }))
}

/// Like [`run_local_each`], but fails with the error that started an abort.
///
/// Transport errors are the echo of a peer leaving the group, so any other
/// error is preferred over them.
pub fn run_local<T, F>(size: usize, worker: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(Communicator<LocalEndpoint>) -> Result<T> + Sync,
{
    let mut results = Vec::with_capacity(size);
    let mut echo = None;
    for result in run_local_each(size, worker)? {
        match result {
            Ok(value) => results.push(value),
            Err(Error::Transport(e)) => {
                echo.get_or_insert(Error::Transport(e));
            }
            Err(e) => return Err(e),
        }
    }
    match echo {
        Some(e) => Err(e),
        None => Ok(results),
    }
}
