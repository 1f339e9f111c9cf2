use crate::error::{Error, Result};
use derive_more::Display;
use std::env;

/// Rank and size pairs exported by the usual process-group launchers.
const LAUNCHER_VARS: &[(&str, &str)] = &[
    ("TRIMR_RANK", "TRIMR_SIZE"),
    ("OMPI_COMM_WORLD_RANK", "OMPI_COMM_WORLD_SIZE"),
    ("PMI_RANK", "PMI_SIZE"),
    ("SLURM_PROCID", "SLURM_NTASKS"),
];

/// The immutable identity of one worker within the fixed process group.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[display(fmt = "{}/{}", rank, size)]
pub struct Topology {
    pub rank: usize,
    pub size: usize,
}

impl Topology {
    pub fn new(rank: usize, size: usize) -> Result<Self> {
        if size == 0 || rank >= size {
            return Err(Error::Usage(format!(
                "rank {} is outside a group of {} workers",
                rank, size
            )));
        }
        Ok(Self { rank, size })
    }

    /// A group of one.
    pub fn single() -> Self {
        Self { rank: 0, size: 1 }
    }

    /// Reads the topology exported by the launcher, or a group of one if the
    /// process was started by hand.
    pub fn detect() -> Result<Self> {
        Self::detect_with(|name| env::var(name).ok())
    }

    fn detect_with<F: Fn(&str) -> Option<String>>(var: F) -> Result<Self> {
        for &(rank_var, size_var) in LAUNCHER_VARS {
            if let (Some(rank), Some(size)) = (var(rank_var), var(size_var)) {
                let parse = |name: &str, value: &str| {
                    value.trim().parse::<usize>().map_err(|e| {
                        Error::Usage(format!("{}='{}': {}", name, value, e))
                    })
                };
                return Self::new(parse(rank_var, &rank)?, parse(size_var, &size)?);
            }
        }
        Ok(Self::single())
    }
}
