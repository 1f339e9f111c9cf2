use crate::error::{Error, Result};
use memmap::Mmap;
use std::fs::File;
use std::path::Path;

/// A memory manager to hide the underlying type of a byte buffer.
///
/// The input edge list is mapped read-only on the coordinating worker and the
/// shuffle receive windows live in an exact-fit memory buffer.
pub enum MemoryManager {
    /// A memory buffer.
    Mem(Vec<u8>),
    /// A read-only memory mapped file.
    Mmap(Mmap),
}

impl MemoryManager {
    pub fn new_mem(size: usize) -> Self {
        MemoryManager::Mem(vec![0; size])
    }

    pub fn new_mmap<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(path)?;
        // Mapping an empty file fails on most platforms.
        if file.metadata()?.len() == 0 {
            return Ok(MemoryManager::Mem(vec![]));
        }
        Ok(MemoryManager::Mmap(unsafe { Mmap::map(&file)? }))
    }

    pub fn len(&self) -> usize {
        match self {
            MemoryManager::Mem(vec) => vec.len(),
            MemoryManager::Mmap(mmap) => mmap.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self, pos: usize, count: usize) -> &[u8] {
        match self {
            MemoryManager::Mem(vec) => &vec[pos..pos + count],
            MemoryManager::Mmap(mmap) => &mmap[pos..pos + count],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.as_slice(0, self.len())
    }

    /// Copies `src` to `pos`. A mapped file is read-only.
    pub fn copy_from_slice(&mut self, pos: usize, src: &[u8]) -> Result<()> {
        match self {
            MemoryManager::Mem(vec) if pos + src.len() <= vec.len() => {
                vec[pos..pos + src.len()].copy_from_slice(src);
                Ok(())
            }
            MemoryManager::Mem(vec) => Err(Error::Protocol(format!(
                "write of {} bytes at {} past a {} byte buffer",
                src.len(),
                pos,
                vec.len()
            ))),
            MemoryManager::Mmap(_) => Err(Error::Protocol(String::from(
                "write into a read-only mapping",
            ))),
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        match self {
            MemoryManager::Mem(vec) => vec,
            MemoryManager::Mmap(mmap) => mmap.to_vec(),
        }
    }
}
