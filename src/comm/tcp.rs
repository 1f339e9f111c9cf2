use super::{Endpoint, Topology};
use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Sender};
use log::{debug, warn};
use std::collections::VecDeque;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const CONNECT_ATTEMPTS: usize = 600;
const CONNECT_BACKOFF: Duration = Duration::from_millis(100);
const FRAME_PREALLOC: u64 = 1 << 20;

/// `127.0.0.1:base_port + rank` for every rank of a group of `size`.
pub fn default_peers(base_port: u16, size: usize) -> Vec<String> {
    (0..size)
        .map(|rank| format!("127.0.0.1:{}", base_port as usize + rank))
        .collect()
}

/// A worker process linked to every other worker by one TCP connection.
///
/// Each frame on the wire is a little endian `u64` length followed by the
/// payload. Outgoing frames are written by one thread per peer, so `send`
/// never blocks on a slow receiver.
pub struct TcpEndpoint {
    topology: Topology,
    writers: Vec<Option<Sender<Vec<u8>>>>,
    readers: Vec<Option<BufReader<TcpStream>>>,
    handles: Vec<JoinHandle<()>>,
    loopback: VecDeque<Vec<u8>>,
}

impl TcpEndpoint {
    /// Joins the group: connects to every lower rank and accepts every higher
    /// rank on `listener`, which must already be bound to `peers[rank]`.
    pub fn connect(topology: Topology, listener: TcpListener, peers: &[String]) -> Result<Self> {
        let Topology { rank, size } = topology;
        if peers.len() != size {
            return Err(Error::Usage(format!(
                "{} peer addresses for {} workers",
                peers.len(),
                size
            )));
        }
        let mut streams: Vec<Option<TcpStream>> = (0..size).map(|_| None).collect();
        for (peer, addr) in peers.iter().enumerate().take(rank) {
            let mut stream = connect_with_retry(addr)?;
            stream
                .write_all(&(rank as u32).to_le_bytes())
                .map_err(Error::Transport)?;
            debug!("connected to rank {} at {}", peer, addr);
            streams[peer] = Some(stream);
        }
        for _ in rank + 1..size {
            let (mut stream, addr) = listener.accept().map_err(Error::Transport)?;
            let mut handshake = [0; 4];
            stream
                .read_exact(&mut handshake)
                .map_err(Error::Transport)?;
            let peer = u32::from_le_bytes(handshake) as usize;
            if peer <= rank || peer >= size || streams[peer].is_some() {
                return Err(Error::Protocol(format!(
                    "unexpected handshake from rank {} at {}",
                    peer, addr
                )));
            }
            debug!("accepted rank {} from {}", peer, addr);
            streams[peer] = Some(stream);
        }

        let mut endpoint = Self {
            topology,
            writers: Vec::with_capacity(size),
            readers: Vec::with_capacity(size),
            handles: Vec::with_capacity(size),
            loopback: VecDeque::new(),
        };
        for (peer, stream) in streams.into_iter().enumerate() {
            match stream {
                Some(stream) => {
                    stream.set_nodelay(true).map_err(Error::Transport)?;
                    let writer = stream.try_clone().map_err(Error::Transport)?;
                    let (sender, receiver) = unbounded::<Vec<u8>>();
                    endpoint.handles.push(
                        thread::Builder::new()
                            .name(format!("link-{}-{}", rank, peer))
                            .spawn(move || {
                                let mut writer = BufWriter::new(writer);
                                for payload in receiver {
                                    if let Err(e) = write_frame(&mut writer, &payload) {
                                        warn!("link to rank {} failed: {}", peer, e);
                                        return;
                                    }
                                }
                                if let Ok(stream) = writer.into_inner() {
                                    let _ = stream.shutdown(Shutdown::Write);
                                }
                            })
                            .map_err(Error::Transport)?,
                    );
                    endpoint.writers.push(Some(sender));
                    endpoint.readers.push(Some(BufReader::new(stream)));
                }
                None => {
                    endpoint.writers.push(None);
                    endpoint.readers.push(None);
                }
            }
        }
        Ok(endpoint)
    }
}

fn connect_with_retry(addr: &str) -> Result<TcpStream> {
    let mut attempt = 0;
    loop {
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(e) if attempt + 1 < CONNECT_ATTEMPTS => {
                attempt += 1;
                if attempt % 50 == 0 {
                    debug!("waiting for {}: {}", addr, e);
                }
                thread::sleep(CONNECT_BACKOFF);
            }
            Err(e) => return Err(Error::Transport(e)),
        }
    }
}

fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> std::io::Result<()> {
    writer.write_all(&(payload.len() as u64).to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Reads one frame. The buffer grows with the bytes that actually arrive, so a
/// bogus length ends in an EOF instead of a huge allocation.
fn read_frame<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut len = [0; 8];
    reader.read_exact(&mut len)?;
    let len = u64::from_le_bytes(len);
    let mut payload = Vec::with_capacity(len.min(FRAME_PREALLOC) as usize);
    reader.by_ref().take(len).read_to_end(&mut payload)?;
    if payload.len() as u64 != len {
        return Err(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            format!("frame of {} bytes cut after {}", len, payload.len()),
        ));
    }
    Ok(payload)
}

impl Endpoint for TcpEndpoint {
    fn topology(&self) -> Topology {
        self.topology
    }

    fn send(&mut self, dest: usize, payload: Vec<u8>) -> Result<()> {
        if dest == self.topology.rank {
            self.loopback.push_back(payload);
            return Ok(());
        }
        match &self.writers[dest] {
            Some(writer) => writer
                .send(payload)
                .map_err(|_| Error::disconnected(dest)),
            None => Err(Error::disconnected(dest)),
        }
    }

    fn recv(&mut self, src: usize) -> Result<Vec<u8>> {
        if src == self.topology.rank {
            return self.loopback.pop_front().ok_or_else(|| {
                Error::Protocol(String::from("receive from self with nothing sent"))
            });
        }
        let reader = match &mut self.readers[src] {
            Some(reader) => reader,
            None => return Err(Error::disconnected(src)),
        };
        read_frame(reader).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset => Error::disconnected(src),
            _ => Error::Transport(e),
        })
    }
}

impl Drop for TcpEndpoint {
    fn drop(&mut self) {
        // Closing the queues lets every writer drain and shut its link down.
        self.writers.clear();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
