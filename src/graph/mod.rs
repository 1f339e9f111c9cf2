//! The graph side of triangle counting: edge lists, degrees and markers.

pub use jobs::{AdjListBuilder, CountAggregator, DegreeCounter, TriangleCounter, WedgeAndEdgeEmitter};
pub use parser::{edge_lines, parse_edge};

use crate::{
    codec::{decode_all, encode_all, Codec},
    error::{Error, Result},
    types::{Count, VId},
};
use std::collections::HashMap;
use std::iter::FromIterator;

mod jobs;
mod parser;

/// The degree of every vertex of the input, replicated on every worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DegreeTable {
    degrees: HashMap<VId, Count>,
}

impl DegreeTable {
    pub fn degree(&self, vid: VId) -> Count {
        self.degrees.get(&vid).copied().unwrap_or(0)
    }

    /// Whether `vid` occurs in the input, possibly with degree 0.
    pub fn contains(&self, vid: VId) -> bool {
        self.degrees.contains_key(&vid)
    }

    /// Orients the edge `{u, v}` from the endpoint with the lower degree to the
    /// one with the higher degree. Ties go from the lower id to the higher id.
    pub fn orient(&self, u: VId, v: VId) -> (VId, VId) {
        if (self.degree(u), u) < (self.degree(v), v) {
            (u, v)
        } else {
            (v, u)
        }
    }

    pub fn len(&self) -> usize {
        self.degrees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.degrees.is_empty()
    }

    /// Every vertex in ascending order.
    pub fn vertices(&self) -> Vec<VId> {
        let mut vertices: Vec<_> = self.degrees.keys().copied().collect();
        vertices.sort_unstable();
        vertices
    }

    /// Encodes the table in ascending vertex order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut entries: Vec<(VId, Count)> =
            self.degrees.iter().map(|(&vid, &deg)| (vid, deg)).collect();
        entries.sort_unstable();
        encode_all(&entries)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(decode_all::<(VId, Count)>(bytes)?.into_iter().collect())
    }
}

impl FromIterator<(VId, Count)> for DegreeTable {
    fn from_iter<I: IntoIterator<Item = (VId, Count)>>(iter: I) -> Self {
        Self {
            degrees: iter.into_iter().collect(),
        }
    }
}

/// What a worker knows about a candidate closing edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Marker {
    /// The closing edge exists in the graph.
    Edge,
    /// `center` is adjacent to both endpoints of the closing edge.
    Wedge { center: VId },
}

const MARKER_EDGE: u8 = 0;
const MARKER_WEDGE: u8 = 1;

impl Codec for Marker {
    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Marker::Edge => MARKER_EDGE.encode(buf),
            Marker::Wedge { center } => {
                MARKER_WEDGE.encode(buf);
                center.encode(buf);
            }
        }
    }

    fn decode(buf: &mut &[u8]) -> Result<Self> {
        match u8::decode(buf)? {
            MARKER_EDGE => Ok(Marker::Edge),
            MARKER_WEDGE => Ok(Marker::Wedge {
                center: VId::decode(buf)?,
            }),
            tag => Err(Error::Codec(format!("unknown marker tag {}", tag))),
        }
    }
}
