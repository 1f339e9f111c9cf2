//! The triangle counting pipeline.

use crate::{
    comm::{Communicator, Endpoint},
    error::{Error, Result},
    graph::{
        edge_lines, AdjListBuilder, CountAggregator, DegreeCounter, DegreeTable, TriangleCounter,
        WedgeAndEdgeEmitter,
    },
    mapreduce::MapReduce,
    memory_manager::MemoryManager,
    types::{Count, VId},
};
use log::info;
use rayon::slice::ParallelSliceMut;
use std::{
    collections::HashMap,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

pub const GLOBAL_COUNTS_FILE: &str = "global_counts.txt";
pub const PER_VERTEX_COUNTS_FILE: &str = "per_vertex_counts.txt";

const SIGNAL_DATA: u8 = 0;
const SIGNAL_ABORT: u8 = 1;

pub struct Config {
    pub input: PathBuf,
    pub output_dir: PathBuf,
}

/// The result of a run, only held by the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriangleCounts {
    pub total: Count,
    /// Every vertex of the input in ascending order, including those on no
    /// triangle.
    pub per_vertex: Vec<(VId, Count)>,
}

impl TriangleCounts {
    fn new(degrees: &DegreeTable, counts: Vec<(VId, Count)>) -> Result<Self> {
        let counts: HashMap<VId, Count> = counts.into_iter().collect();
        let mut per_vertex: Vec<_> = degrees
            .vertices()
            .into_iter()
            .map(|vid| (vid, counts.get(&vid).copied().unwrap_or(0)))
            .collect();
        if let Some(vid) = counts.keys().find(|&&vid| !degrees.contains(vid)) {
            return Err(Error::Protocol(format!(
                "vertex {} has triangles but no degree",
                vid
            )));
        }
        per_vertex.par_sort_unstable();
        let sum: Count = per_vertex.iter().map(|&(_, count)| count).sum();
        if sum % 3 != 0 {
            return Err(Error::Protocol(format!(
                "per-vertex counts sum to {}, not a multiple of 3",
                sum
            )));
        }
        Ok(Self {
            total: sum / 3,
            per_vertex,
        })
    }

    /// Writes `global_counts.txt` and `per_vertex_counts.txt` into `dir`.
    pub fn write_to<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        let mut global = File::create(dir.join(GLOBAL_COUNTS_FILE)).map_err(Error::Output)?;
        writeln!(global, "total_triangles\t{}", self.total).map_err(Error::Output)?;
        let mut per_vertex = BufWriter::new(
            File::create(dir.join(PER_VERTEX_COUNTS_FILE)).map_err(Error::Output)?,
        );
        for (vid, count) in &self.per_vertex {
            writeln!(per_vertex, "{}\t{}", vid, count).map_err(Error::Output)?;
        }
        per_vertex.flush().map_err(Error::Output)
    }
}

/// Replicates the edge list read by the root, or the reason it could not be
/// read, on every worker.
fn broadcast_input<E: Endpoint>(
    comm: &mut Communicator<E>,
    input: Option<&Path>,
) -> Result<Vec<u8>> {
    if !comm.is_root() {
        let mut signal = comm.broadcast(None)?;
        return match signal.first() {
            Some(&SIGNAL_DATA) => {
                signal.remove(0);
                Ok(signal)
            }
            Some(&SIGNAL_ABORT) => Err(Error::Aborted(
                String::from_utf8_lossy(&signal[1..]).into_owned(),
            )),
            _ => Err(Error::Protocol(String::from("malformed input broadcast"))),
        };
    }
    let read = match input {
        Some(path) => MemoryManager::new_mmap(path).map_err(|e| Error::Input {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
        None => Err(Error::Usage(String::from("no input file"))),
    };
    match read {
        Ok(mm) => {
            let mut signal = Vec::with_capacity(mm.len() + 1);
            signal.push(SIGNAL_DATA);
            signal.extend_from_slice(mm.as_bytes());
            let mut signal = comm.broadcast(Some(signal))?;
            signal.remove(0);
            Ok(signal)
        }
        Err(e) => {
            let mut signal = vec![SIGNAL_ABORT];
            signal.extend_from_slice(e.to_string().as_bytes());
            comm.broadcast(Some(signal))?;
            Err(e)
        }
    }
}

/// Counts the triangles of the graph in `input`, which only the root reads.
///
/// Collective: every worker of the group must call it. The root returns the
/// counts, the other workers `None`.
pub fn count_triangles<E: Endpoint>(
    comm: &mut Communicator<E>,
    input: Option<&Path>,
) -> Result<Option<TriangleCounts>> {
    let time_now = Instant::now();
    let lines = edge_lines(&broadcast_input(comm, input)?)?;
    info!(
        "edge list: {} lines in {} ms",
        lines.len(),
        time_now.elapsed().as_millis()
    );
    let is_root = comm.is_root();
    let root_lines = || if is_root { Some(lines.clone()) } else { None };

    let mut engine = MapReduce::new(comm);
    let degrees = engine.run_job(&DegreeCounter, root_lines())?;
    let degrees = engine
        .comm()
        .broadcast(degrees.map(|degrees| degrees.into_iter().collect::<DegreeTable>().to_bytes()))?;
    let degrees = DegreeTable::from_bytes(&degrees)?;
    info!("degree table: {} vertices", degrees.len());

    let adj_lists = engine.run_job(&AdjListBuilder::new(&degrees), root_lines())?;
    let markers = engine.run_job(&WedgeAndEdgeEmitter, adj_lists)?;
    let increments = engine.run_job(&TriangleCounter, markers)?;
    let counts = engine.run_job(&CountAggregator, increments)?;

    counts
        .map(|counts| TriangleCounts::new(&degrees, counts))
        .transpose()
}

/// Counts the triangles of `config.input` and, on the root, writes both
/// output files.
pub fn run<E: Endpoint>(
    comm: &mut Communicator<E>,
    config: &Config,
) -> Result<Option<TriangleCounts>> {
    let start_time = Instant::now();
    if comm.is_root() {
        println!(
            "--- Starting triangle counting with {} workers ---",
            comm.size()
        );
    }
    let counts = count_triangles(comm, Some(&config.input))?;
    if let Some(counts) = &counts {
        counts.write_to(&config.output_dir)?;
        println!("Total triangles found: {}", counts.total);
        println!(
            "Total execution time: {:.4} seconds.",
            start_time.elapsed().as_secs_f64()
        );
    }
    Ok(counts)
}
