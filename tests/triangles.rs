use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{collections::HashSet, fs, path::Path};
use tempfile::TempDir;
use trimr::{
    comm::run_local,
    error::Error,
    graph::{AdjListBuilder, DegreeCounter, DegreeTable},
    mapreduce::MapReduce,
    pipeline::{
        count_triangles, run, Config, TriangleCounts, GLOBAL_COUNTS_FILE, PER_VERTEX_COUNTS_FILE,
    },
    types::{Count, VId},
};

fn write_edges(dir: &TempDir, edges: &[(VId, VId)]) -> std::path::PathBuf {
    let path = dir.path().join("edges.txt");
    let text: String = edges
        .iter()
        .map(|(u, v)| format!("{} {}\n", u, v))
        .collect();
    fs::write(&path, text).unwrap();
    path
}

fn count(path: &Path, size: usize) -> TriangleCounts {
    let results = run_local(size, |mut comm| {
        let input = if comm.is_root() { Some(path) } else { None };
        count_triangles(&mut comm, input)
    })
    .unwrap();
    assert!(results[1..].iter().all(Option::is_none));
    results.into_iter().next().unwrap().unwrap()
}

fn brute_force(edges: &[(VId, VId)]) -> TriangleCounts {
    let adjacent: HashSet<(VId, VId)> = edges
        .iter()
        .flat_map(|&(u, v)| vec![(u, v), (v, u)])
        .filter(|(u, v)| u != v)
        .collect();
    let mut vertices: Vec<VId> = adjacent.iter().map(|&(u, _)| u).collect();
    vertices.sort_unstable();
    vertices.dedup();
    let mut per_vertex: Vec<(VId, Count)> = vertices.iter().map(|&u| (u, 0)).collect();
    let mut total = 0;
    for (i, &a) in vertices.iter().enumerate() {
        for (j, &b) in vertices.iter().enumerate().skip(i + 1) {
            for (k, &c) in vertices.iter().enumerate().skip(j + 1) {
                if adjacent.contains(&(a, b))
                    && adjacent.contains(&(b, c))
                    && adjacent.contains(&(a, c))
                {
                    total += 1;
                    per_vertex[i].1 += 1;
                    per_vertex[j].1 += 1;
                    per_vertex[k].1 += 1;
                }
            }
        }
    }
    TriangleCounts { total, per_vertex }
}

fn random_edges(rng: &mut StdRng, num_vertices: VId, num_edges: usize) -> Vec<(VId, VId)> {
    (0..num_edges)
        .map(|_| {
            let u = rng.gen_range(0..num_vertices);
            let mut v = rng.gen_range(0..num_vertices);
            while v == u {
                v = rng.gen_range(0..num_vertices);
            }
            (u, v)
        })
        .collect()
}

#[test]
fn test_single_triangle() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_edges(&dir, &[(1, 2), (2, 3), (1, 3)]);
    for size in 1..5 {
        let counts = count(&path, size);
        assert_eq!(counts.total, 1);
        assert_eq!(counts.per_vertex, vec![(1, 1), (2, 1), (3, 1)]);
    }
}

#[test]
fn test_path_has_no_triangle() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_edges(&dir, &[(1, 2), (2, 3)]);
    for size in 1..5 {
        let counts = count(&path, size);
        assert_eq!(counts.total, 0);
        assert_eq!(counts.per_vertex, vec![(1, 0), (2, 0), (3, 0)]);
    }
}

#[test]
fn test_complete_graph() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_edges(&dir, &[(1, 2), (1, 3), (1, 4), (2, 3), (2, 4), (3, 4)]);
    for size in 1..5 {
        let counts = count(&path, size);
        assert_eq!(counts.total, 4);
        assert_eq!(counts.per_vertex, vec![(1, 3), (2, 3), (3, 3), (4, 3)]);
    }
}

#[test]
fn test_random_graphs() {
    let mut rng = StdRng::seed_from_u64(0x7269);
    for round in 0..20 {
        let num_vertices = rng.gen_range(3..13);
        let num_edges = rng.gen_range(1..40);
        let edges = random_edges(&mut rng, num_vertices, num_edges);
        let dir = tempfile::tempdir().unwrap();
        let path = write_edges(&dir, &edges);
        let expected = brute_force(&edges);
        let size = round % 4 + 1;
        let counts = count(&path, size);
        let sum: Count = counts.per_vertex.iter().map(|&(_, count)| count).sum();
        assert_eq!(sum, 3 * counts.total);
        assert_eq!(counts, expected, "edges {:?} on {} workers", edges, size);
    }
}

#[test]
fn test_blank_lines_self_loops_and_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edges.txt");
    fs::write(&path, "1 2\n\n2 3\n  \n3 1\n3 3\n2 1\n").unwrap();
    for size in 1..4 {
        let counts = count(&path, size);
        assert_eq!(counts.total, 1);
        assert_eq!(counts.per_vertex, vec![(1, 1), (2, 1), (3, 1)]);
    }
}

#[test]
fn test_vertex_only_on_self_loop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edges.txt");
    fs::write(&path, "1 2\n2 3\n1 3\n5 5\n").unwrap();
    for size in 1..4 {
        let counts = count(&path, size);
        assert_eq!(counts.total, 1);
        assert_eq!(counts.per_vertex, vec![(1, 1), (2, 1), (3, 1), (5, 0)]);
    }
}

#[test]
fn test_empty_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edges.txt");
    fs::write(&path, "").unwrap();
    let counts = count(&path, 3);
    assert_eq!(counts.total, 0);
    assert!(counts.per_vertex.is_empty());
}

#[test]
fn test_outputs_are_identical_across_runs() {
    let mut rng = StdRng::seed_from_u64(42);
    let edges = random_edges(&mut rng, 30, 150);
    let dir = tempfile::tempdir().unwrap();
    let path = write_edges(&dir, &edges);
    let mut outputs = vec![];
    for size in &[1, 3, 3, 4] {
        let output_dir = tempfile::tempdir().unwrap();
        let config = Config {
            input: path.clone(),
            output_dir: output_dir.path().to_path_buf(),
        };
        run_local(*size, |mut comm| run(&mut comm, &config)).unwrap();
        outputs.push((
            fs::read(output_dir.path().join(GLOBAL_COUNTS_FILE)).unwrap(),
            fs::read(output_dir.path().join(PER_VERTEX_COUNTS_FILE)).unwrap(),
        ));
    }
    assert!(outputs.windows(2).all(|w| w[0] == w[1]));
    let expected = brute_force(&edges);
    assert_eq!(
        String::from_utf8(outputs[0].0.clone()).unwrap(),
        format!("total_triangles\t{}\n", expected.total)
    );
}

#[test]
fn test_each_edge_oriented_once() {
    let mut rng = StdRng::seed_from_u64(7);
    let edges = random_edges(&mut rng, 20, 80);
    let lines: Vec<String> = edges.iter().map(|(u, v)| format!("{} {}", u, v)).collect();
    let results = run_local(3, |mut comm| {
        let data = if comm.is_root() { Some(lines.clone()) } else { None };
        let mut engine = MapReduce::new(&mut comm);
        let degrees = engine.run_job(&DegreeCounter, data.clone())?;
        let degrees = engine.comm().broadcast(
            degrees.map(|degrees| degrees.into_iter().collect::<DegreeTable>().to_bytes()),
        )?;
        let degrees = DegreeTable::from_bytes(&degrees)?;
        let adj_lists = engine.run_job(&AdjListBuilder::new(&degrees), data)?;
        Ok(adj_lists.map(|adj_lists| (degrees, adj_lists)))
    })
    .unwrap();
    let (degrees, adj_lists) = results.into_iter().next().unwrap().unwrap();
    let oriented: Vec<(VId, VId)> = adj_lists
        .iter()
        .flat_map(|(u, neighbors)| neighbors.iter().map(move |&v| (*u, v)))
        .collect();
    let undirected: HashSet<(VId, VId)> = edges
        .iter()
        .map(|&(u, v)| (u.min(v), u.max(v)))
        .collect();
    assert_eq!(oriented.len(), undirected.len());
    for &(u, v) in &oriented {
        assert!((degrees.degree(u), u) < (degrees.degree(v), v));
        assert!(undirected.contains(&(u.min(v), u.max(v))));
    }
}

#[test]
fn test_parse_error_aborts_group() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edges.txt");
    fs::write(&path, "1 2\n2 x\n3 1\n").unwrap();
    let result = run_local(3, |mut comm| count_triangles(&mut comm, Some(path.as_path())));
    assert!(matches!(result, Err(Error::Parse { .. })));
}

#[test]
fn test_missing_input_aborts_group() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        input: dir.path().join("missing.txt"),
        output_dir: dir.path().to_path_buf(),
    };
    let result = run_local(2, |mut comm| run(&mut comm, &config));
    assert!(matches!(result, Err(Error::Input { .. })));
    assert!(!dir.path().join(GLOBAL_COUNTS_FILE).exists());
}
