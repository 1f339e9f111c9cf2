//! The five jobs of the orient-by-degree triangle count.
//!
//! ```text
//! edge lines --DegreeCounter--> degrees --(broadcast)--+
//! edge lines --AdjListBuilder(degrees)--> u -> [v | u->v]
//!            --WedgeAndEdgeEmitter--> (v, w) -> [Edge | Wedge{u}]
//!            --TriangleCounter--> u -> 1, v -> 1, w -> 1 per triangle
//!            --CountAggregator--> u -> triangles through u
//! ```
//!
//! A triangle `{a, b, c}` with `a` first in the degree order is only seen as
//! the wedge centred at `a` closed by the edge `(b, c)`, so each triangle is
//! found once and contributes three increments.

use super::{parse_edge, DegreeTable, Marker};
use crate::{
    error::Result,
    mapreduce::{Job, JobContext, Records},
    types::{pair_key, Count, Edge, PairKey, VId},
};
use itertools::Itertools;
use log::warn;
use std::iter;

/// Parses an edge line for the jobs that only see edges. Blank lines and
/// self-loops carry no edge.
fn edge_of(line: &str) -> Result<Option<Edge>> {
    match parse_edge(line)? {
        Some((u, v)) if u == v => {
            warn!("skipping self-loop on vertex {}", u);
            Ok(None)
        }
        edge => Ok(edge),
    }
}

/// Job 1: the degree of every vertex.
pub struct DegreeCounter;

impl Job for DegreeCounter {
    type Input = String;
    type Key = VId;
    type Value = Count;
    type OutputKey = VId;
    type OutputValue = Count;

    fn name(&self) -> &'static str {
        "degree-counter"
    }

    fn map<'a>(&'a self, _ctx: &JobContext, line: String) -> Result<Records<'a, VId, Count>> {
        let records: Records<'a, VId, Count> = match parse_edge(&line)? {
            // A self-loop is no edge, but its vertex is still part of the graph.
            Some((u, v)) if u == v => Box::new(iter::once((u, 0))),
            Some((u, v)) => Box::new(iter::once((u, 1)).chain(iter::once((v, 1)))),
            None => Box::new(iter::empty()),
        };
        Ok(records)
    }

    fn reduce<'a>(
        &'a self,
        _ctx: &JobContext,
        vid: VId,
        values: Vec<Count>,
    ) -> Records<'a, VId, Count> {
        Box::new(iter::once((vid, values.into_iter().sum())))
    }
}

/// Job 2: the oriented out-neighbours of every vertex, ascending.
pub struct AdjListBuilder<'d> {
    degrees: &'d DegreeTable,
}

impl<'d> AdjListBuilder<'d> {
    pub fn new(degrees: &'d DegreeTable) -> Self {
        Self { degrees }
    }
}

impl<'d> Job for AdjListBuilder<'d> {
    type Input = String;
    type Key = VId;
    type Value = VId;
    type OutputKey = VId;
    type OutputValue = Vec<VId>;

    fn name(&self) -> &'static str {
        "adj-list-builder"
    }

    fn map<'a>(&'a self, _ctx: &JobContext, line: String) -> Result<Records<'a, VId, VId>> {
        let records: Records<'a, VId, VId> = match edge_of(&line)? {
            Some((u, v)) => Box::new(iter::once(self.degrees.orient(u, v))),
            None => Box::new(iter::empty()),
        };
        Ok(records)
    }

    fn reduce<'a>(
        &'a self,
        _ctx: &JobContext,
        vid: VId,
        mut neighbors: Vec<VId>,
    ) -> Records<'a, VId, Vec<VId>> {
        // A repeated input edge orients the same way every time.
        neighbors.sort_unstable();
        neighbors.dedup();
        Box::new(iter::once((vid, neighbors)))
    }
}

/// Job 3: an `Edge` marker per oriented edge and a `Wedge` marker per pair of
/// out-neighbours, keyed by the edge that would close it.
pub struct WedgeAndEdgeEmitter;

impl Job for WedgeAndEdgeEmitter {
    type Input = (VId, Vec<VId>);
    type Key = PairKey;
    type Value = Marker;
    type OutputKey = PairKey;
    type OutputValue = Marker;

    fn name(&self) -> &'static str {
        "wedge-and-edge-emitter"
    }

    fn map<'a>(
        &'a self,
        _ctx: &JobContext,
        (u, neighbors): (VId, Vec<VId>),
    ) -> Result<Records<'a, PairKey, Marker>> {
        let edges = neighbors
            .clone()
            .into_iter()
            .map(move |v| (pair_key(u, v), Marker::Edge));
        let wedges = neighbors
            .into_iter()
            .tuple_combinations::<(VId, VId)>()
            .map(move |(v, w)| (pair_key(v, w), Marker::Wedge { center: u }));
        Ok(Box::new(edges.chain(wedges)))
    }

    fn reduce<'a>(
        &'a self,
        _ctx: &JobContext,
        key: PairKey,
        markers: Vec<Marker>,
    ) -> Records<'a, PairKey, Marker> {
        Box::new(markers.into_iter().map(move |marker| (key, marker)))
    }
}

/// Job 4: one increment per vertex of every wedge whose closing edge exists.
pub struct TriangleCounter;

impl Job for TriangleCounter {
    type Input = (PairKey, Marker);
    type Key = PairKey;
    type Value = Marker;
    type OutputKey = VId;
    type OutputValue = Count;

    fn name(&self) -> &'static str {
        "triangle-counter"
    }

    fn map<'a>(
        &'a self,
        _ctx: &JobContext,
        item: (PairKey, Marker),
    ) -> Result<Records<'a, PairKey, Marker>> {
        Ok(Box::new(iter::once(item)))
    }

    fn reduce<'a>(
        &'a self,
        _ctx: &JobContext,
        (v, w): PairKey,
        markers: Vec<Marker>,
    ) -> Records<'a, VId, Count> {
        if !markers.contains(&Marker::Edge) {
            return Box::new(iter::empty());
        }
        Box::new(
            markers
                .into_iter()
                .filter_map(|marker| match marker {
                    Marker::Wedge { center } => Some(center),
                    Marker::Edge => None,
                })
                .flat_map(move |center| vec![(center, 1), (v, 1), (w, 1)]),
        )
    }
}

/// Job 5: the number of triangles through every vertex that has one.
pub struct CountAggregator;

impl Job for CountAggregator {
    type Input = (VId, Count);
    type Key = VId;
    type Value = Count;
    type OutputKey = VId;
    type OutputValue = Count;

    fn name(&self) -> &'static str {
        "count-aggregator"
    }

    fn map<'a>(&'a self, _ctx: &JobContext, item: (VId, Count)) -> Result<Records<'a, VId, Count>> {
        Ok(Box::new(iter::once(item)))
    }

    fn reduce<'a>(
        &'a self,
        _ctx: &JobContext,
        vid: VId,
        increments: Vec<Count>,
    ) -> Records<'a, VId, Count> {
        Box::new(iter::once((vid, increments.into_iter().sum())))
    }
}
