use super::{partition_encoded, shuffle, Job, JobContext};
use crate::{
    codec::{decode_all, Codec},
    comm::{Communicator, Endpoint},
    error::Result,
};
use log::{debug, info};
use std::{collections::BTreeMap, time::Instant};

/// Runs jobs over a process group.
///
/// `run_job` is collective: every worker must call it for the same jobs in the
/// same order.
pub struct MapReduce<'c, E: Endpoint> {
    comm: &'c mut Communicator<E>,
}

impl<'c, E: Endpoint> MapReduce<'c, E> {
    pub fn new(comm: &'c mut Communicator<E>) -> Self {
        Self { comm }
    }

    pub fn comm(&mut self) -> &mut Communicator<E> {
        self.comm
    }

    /// Scatter, map, partition, shuffle, group, reduce and gather.
    ///
    /// Only the root's `data` is read. The root returns every worker's reduce
    /// output concatenated by ascending rank; the other workers return `None`.
    pub fn run_job<J: Job>(
        &mut self,
        job: &J,
        data: Option<Vec<J::Input>>,
    ) -> Result<Option<Vec<(J::OutputKey, J::OutputValue)>>> {
        let start_time = Instant::now();
        let ctx = JobContext::new(self.comm.topology());
        let size = ctx.size();

        let time_now = Instant::now();
        let chunks = if self.comm.is_root() {
            let mut chunks = vec![Vec::new(); size];
            for (i, item) in data.unwrap_or_default().iter().enumerate() {
                item.encode(&mut chunks[i % size]);
            }
            Some(chunks)
        } else {
            None
        };
        let local: Vec<J::Input> = decode_all(&self.comm.scatter(chunks)?)?;
        debug!(
            "{}: scattered {} items in {} ms",
            job.name(),
            local.len(),
            time_now.elapsed().as_millis()
        );

        let time_now = Instant::now();
        let mut buckets = vec![Vec::new(); size];
        let mut key_buf = Vec::new();
        let mut num_mapped = 0;
        for item in local {
            for (key, value) in job.map(&ctx, item)? {
                key_buf.clear();
                key.encode(&mut key_buf);
                let bucket = &mut buckets[partition_encoded(&key_buf, size)];
                bucket.extend_from_slice(&key_buf);
                value.encode(bucket);
                num_mapped += 1;
            }
        }
        debug!(
            "{}: mapped {} records in {} ms",
            job.name(),
            num_mapped,
            time_now.elapsed().as_millis()
        );

        let time_now = Instant::now();
        let received = shuffle(self.comm, buckets)?;
        debug!(
            "{}: shuffled {} bytes in {} ms",
            job.name(),
            received.len(),
            time_now.elapsed().as_millis()
        );

        let time_now = Instant::now();
        let mut groups: BTreeMap<J::Key, Vec<J::Value>> = BTreeMap::new();
        for window in received.windows() {
            let mut cursor = window;
            while !cursor.is_empty() {
                let key = J::Key::decode(&mut cursor)?;
                let value = J::Value::decode(&mut cursor)?;
                groups.entry(key).or_insert_with(Vec::new).push(value);
            }
        }
        drop(received);
        let num_keys = groups.len();
        let mut output = Vec::new();
        let mut num_reduced = 0;
        for (key, values) in groups {
            for (key, value) in job.reduce(&ctx, key, values) {
                key.encode(&mut output);
                value.encode(&mut output);
                num_reduced += 1;
            }
        }
        debug!(
            "{}: reduced {} keys into {} records in {} ms",
            job.name(),
            num_keys,
            num_reduced,
            time_now.elapsed().as_millis()
        );

        let results = match self.comm.gather(output)? {
            Some(outputs) => {
                let mut results = Vec::new();
                for output in outputs {
                    results.extend(decode_all::<(J::OutputKey, J::OutputValue)>(&output)?);
                }
                info!(
                    "{}: {} results in {} ms",
                    job.name(),
                    results.len(),
                    start_time.elapsed().as_millis()
                );
                Some(results)
            }
            None => None,
        };
        Ok(results)
    }
}
