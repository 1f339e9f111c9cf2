//! Various types shared by the jobs.

/// The vertex id type.
pub type VId = i64;

/// The degree and triangle count type.
pub type Count = u64;

/// An undirected edge as written in the input.
pub type Edge = (VId, VId);

/// A canonical closing-edge key, always `(min, max)`.
pub type PairKey = (VId, VId);

/// Returns the canonical key of the pair `{u, v}`.
pub fn pair_key(u: VId, v: VId) -> PairKey {
    if u <= v {
        (u, v)
    } else {
        (v, u)
    }
}
