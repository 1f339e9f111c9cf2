use rand::{rngs::StdRng, Rng, SeedableRng};
use trimr::{
    codec::{decode_all, Codec},
    comm::run_local,
    mapreduce::{partition, shuffle},
};

/// Every rank sends `(key, source rank)` records for random keys. A rank with
/// `skip` set sends nothing at all.
fn shuffle_records(size: usize, num_records: usize, skip: Option<usize>) {
    let results = run_local(size, |mut comm| {
        let rank = comm.rank();
        let mut rng = StdRng::seed_from_u64(rank as u64);
        let mut sent = vec![];
        let mut buckets = vec![vec![]; size];
        if skip != Some(rank) {
            for _ in 0..num_records {
                let record = (rng.gen_range(0..50i64), rank as u64);
                record.encode(&mut buckets[partition(&record.0, size)]);
                sent.push(record);
            }
        }
        let received = shuffle(&mut comm, buckets)?;
        let mut records = vec![];
        for (src, window) in received.windows().enumerate() {
            let from_src = decode_all::<(i64, u64)>(window)?;
            assert!(from_src.iter().all(|&(_, from)| from as usize == src));
            records.extend(from_src);
        }
        Ok((sent, records))
    })
    .unwrap();
    let mut sent: Vec<(i64, u64)> = vec![];
    let mut received: Vec<(i64, u64)> = vec![];
    for (rank, (s, r)) in results.into_iter().enumerate() {
        assert!(r.iter().all(|(key, _)| partition(key, size) == rank));
        sent.extend(s);
        received.extend(r);
    }
    sent.sort_unstable();
    received.sort_unstable();
    assert_eq!(sent, received);
}

#[test]
fn test_records_reach_their_owner() {
    for size in 1..6 {
        shuffle_records(size, 200, None);
    }
}

#[test]
fn test_zero_byte_pairs() {
    // Few records on many ranks leave most pairs empty.
    shuffle_records(6, 2, None);
    shuffle_records(4, 30, Some(2));
    shuffle_records(3, 0, None);
}
