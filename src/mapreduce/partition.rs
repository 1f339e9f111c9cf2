use crate::codec::Codec;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a.
pub fn stable_hash(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
    })
}

/// The rank that reduces `key`: the stable hash of its encoding modulo `size`.
///
/// The result only depends on the key's bytes, so every worker of every run
/// agrees on it.
pub fn partition<K: Codec>(key: &K, size: usize) -> usize {
    let mut buf = Vec::with_capacity(16);
    key.encode(&mut buf);
    partition_encoded(&buf, size)
}

/// [`partition`] for a key that is already encoded.
pub fn partition_encoded(key: &[u8], size: usize) -> usize {
    (stable_hash(key) % size as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_hash() {
        assert_eq!(stable_hash(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(stable_hash(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(stable_hash(b"foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn test_partition() {
        for size in 1..8 {
            for vid in -20i64..20 {
                let rank = partition(&vid, size);
                assert!(rank < size);
                assert_eq!(rank, partition(&vid, size));
            }
        }
        assert_eq!(partition(&(1i64, 2i64), 1), 0);
        let mut buf = vec![];
        (3i64, 9i64).encode(&mut buf);
        assert_eq!(partition(&(3i64, 9i64), 5), (stable_hash(&buf) % 5) as usize);
    }
}
