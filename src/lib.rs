//! Distributed MapReduce triangle counting.

pub mod codec;
pub mod comm;
pub mod error;
pub mod graph;
pub mod mapreduce;
pub mod memory_manager;
pub mod pipeline;
pub mod types;
