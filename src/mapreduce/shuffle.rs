//! The two-phase shuffle.
//!
//! ```text
//! phase 1:  counts[d] = |bucket d|        --all-to-all-->  recv_counts[s]
//! phase 2:  recv_displs = prefix sums of recv_counts
//!           bucket d                    --all-to-allv-->  recv_buf window s
//! ```
//!
//! After phase 1 every worker knows exactly how many bytes each peer will
//! deliver, so the receive buffer is allocated once with no padding. Buckets
//! are moved onto the links as they are and copied once, into that buffer.

use crate::{
    comm::{Communicator, Endpoint},
    error::{Error, Result},
    memory_manager::MemoryManager,
};
use log::debug;
use std::convert::TryFrom;

/// The buckets every worker addressed to this one, laid out by source rank.
pub struct Received {
    buf: MemoryManager,
    counts: Vec<usize>,
    displs: Vec<usize>,
}

impl Received {
    /// The bytes rank `src` sent here. Empty if `src` had nothing for us.
    pub fn window(&self, src: usize) -> &[u8] {
        self.buf.as_slice(self.displs[src], self.counts[src])
    }

    /// Every window in ascending source rank.
    pub fn windows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.counts.len()).map(move |src| self.window(src))
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Exclusive prefix sums: where each window starts.
pub fn displacements(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0, |pos, &count| {
            let start = *pos;
            *pos += count;
            Some(start)
        })
        .collect()
}

/// Moves `buckets[d]` to rank `d` for every `d` and returns what arrived here.
pub fn shuffle<E: Endpoint>(
    comm: &mut Communicator<E>,
    buckets: Vec<Vec<u8>>,
) -> Result<Received> {
    if buckets.len() != comm.size() {
        return Err(Error::Protocol(format!(
            "{} buckets for {} workers",
            buckets.len(),
            comm.size()
        )));
    }
    let send_counts: Vec<usize> = buckets.iter().map(Vec::len).collect();
    let recv_counts = comm
        .all_to_all_counts(
            &send_counts
                .iter()
                .map(|&count| count as u64)
                .collect::<Vec<_>>(),
        )?
        .into_iter()
        .map(|count| {
            usize::try_from(count)
                .map_err(|_| Error::Protocol(format!("announced size {} overflows", count)))
        })
        .collect::<Result<Vec<_>>>()?;
    let recv_displs = displacements(&recv_counts);
    let mut recv_buf = MemoryManager::new_mem(recv_counts.iter().sum());
    debug!(
        "shuffle: sending {} bytes, receiving {} bytes",
        send_counts.iter().sum::<usize>(),
        recv_buf.len()
    );
    comm.all_to_allv(buckets, &mut recv_buf, &recv_counts, &recv_displs)?;
    Ok(Received {
        buf: recv_buf,
        counts: recv_counts,
        displs: recv_displs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::run_local;

    #[test]
    fn test_displacements() {
        assert_eq!(displacements(&[]), vec![]);
        assert_eq!(displacements(&[3, 0, 2, 0, 0, 4]), vec![0, 3, 3, 5, 5, 5]);
        assert_eq!(displacements(&[0, 0]), vec![0, 0]);
    }

    #[test]
    fn test_shuffle_zero_length() {
        // Rank r sends r + 1 copies of byte r to every even rank only.
        let received = run_local(4, |mut comm| {
            let rank = comm.rank();
            let buckets = (0..4)
                .map(|dest| {
                    if dest % 2 == 0 {
                        vec![rank as u8; rank + 1]
                    } else {
                        vec![]
                    }
                })
                .collect();
            let received = shuffle(&mut comm, buckets)?;
            Ok(received.windows().map(<[u8]>::to_vec).collect::<Vec<_>>())
        })
        .unwrap();
        for (rank, windows) in received.into_iter().enumerate() {
            for (src, window) in windows.into_iter().enumerate() {
                if rank % 2 == 0 {
                    assert_eq!(window, vec![src as u8; src + 1]);
                } else {
                    assert!(window.is_empty());
                }
            }
        }
    }

    #[test]
    fn test_shuffle_single_worker() {
        let received = run_local(1, |mut comm| {
            let received = shuffle(&mut comm, vec![b"abc".to_vec()])?;
            Ok((received.len(), received.window(0).to_vec()))
        })
        .unwrap();
        assert_eq!(received, vec![(3, b"abc".to_vec())]);
    }
}
