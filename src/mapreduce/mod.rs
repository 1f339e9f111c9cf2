//! A collective MapReduce engine.

pub use engine::MapReduce;
pub use partition::{partition, partition_encoded, stable_hash};
pub use shuffle::{displacements, shuffle, Received};

use crate::{codec::Codec, comm::Topology, error::Result};

mod engine;
mod partition;
mod shuffle;

/// The per-process context handed to every map and reduce call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobContext {
    pub topology: Topology,
}

impl JobContext {
    pub fn new(topology: Topology) -> Self {
        Self { topology }
    }

    pub fn rank(&self) -> usize {
        self.topology.rank
    }

    pub fn size(&self) -> usize {
        self.topology.size
    }
}

pub type Records<'a, K, V> = Box<dyn Iterator<Item = (K, V)> + 'a>;

/// A map/reduce pair.
pub trait Job {
    type Input: Codec + 'static;
    type Key: Codec + Ord + 'static;
    type Value: Codec + 'static;
    type OutputKey: Codec + 'static;
    type OutputValue: Codec + 'static;

    fn name(&self) -> &'static str;

    /// Emits the records of one input item.
    ///
    /// An item that cannot be interpreted fails the whole job.
    fn map<'a>(
        &'a self,
        ctx: &JobContext,
        item: Self::Input,
    ) -> Result<Records<'a, Self::Key, Self::Value>>;

    /// Called once per distinct key with every value emitted for it.
    fn reduce<'a>(
        &'a self,
        ctx: &JobContext,
        key: Self::Key,
        values: Vec<Self::Value>,
    ) -> Records<'a, Self::OutputKey, Self::OutputValue>;
}
