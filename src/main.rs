use clap::{App, Arg, ArgMatches};
use log::{error, info};
use std::{io::Write, net::TcpListener, path::PathBuf};
use trimr::{
    comm::{default_peers, run_local, Communicator, LocalEndpoint, TcpEndpoint, Topology},
    error::{Error, Result},
    pipeline::{run, Config},
};

const DEFAULT_BASE_PORT: &str = "47000";

fn init_logger(rank: Option<usize>) {
    let tag = rank.map_or_else(|| String::from("local"), |rank| format!("rank {}", rank));
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(move |buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                tag,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn log_host(topology: Topology) {
    info!(
        "worker {} on {} with {} cpus",
        topology,
        sys_info::hostname().unwrap_or_else(|_| String::from("unknown")),
        sys_info::cpu_num().unwrap_or(0)
    );
}

fn parse_usize(matches: &ArgMatches, name: &str) -> Result<usize> {
    let value = matches.value_of(name).unwrap_or_default();
    value
        .parse()
        .map_err(|e| Error::Usage(format!("--{} '{}': {}", name, value, e)))
}

fn handle_local(config: &Config, size: usize) -> Result<()> {
    init_logger(None);
    if size == 0 {
        return Err(Error::Usage(String::from("--local needs at least one worker")));
    }
    run_local(size, |mut comm| {
        log_host(comm.topology());
        run(&mut comm, config)
    })?;
    Ok(())
}

fn handle_group(config: &Config, matches: &ArgMatches) -> Result<()> {
    let topology = Topology::detect()?;
    init_logger(Some(topology.rank));
    log_host(topology);
    let peers: Vec<String> = match matches.value_of("peers") {
        Some(peers) => peers.split(',').map(|peer| peer.trim().to_string()).collect(),
        None => {
            let base_port = parse_usize(matches, "base-port")?;
            if base_port + topology.size > u16::MAX as usize {
                return Err(Error::Usage(format!("--base-port {} too high", base_port)));
            }
            default_peers(base_port as u16, topology.size)
        }
    };
    run_group(config, topology, &peers)
}

/// Runs this process's share of the group. A group of one needs no links, so
/// it never binds its peer address.
fn run_group(config: &Config, topology: Topology, peers: &[String]) -> Result<()> {
    if topology.size == 1 {
        let endpoint = LocalEndpoint::group(1)
            .pop()
            .ok_or_else(|| Error::Protocol(String::from("empty local group")))?;
        run(&mut Communicator::new(endpoint), config)?;
        return Ok(());
    }
    let addr = peers.get(topology.rank).ok_or_else(|| {
        Error::Usage(format!(
            "{} peer addresses for {} workers",
            peers.len(),
            topology.size
        ))
    })?;
    let listener = TcpListener::bind(addr).map_err(Error::Transport)?;
    let mut comm = Communicator::new(TcpEndpoint::connect(topology, listener, peers)?);
    run(&mut comm, config)?;
    Ok(())
}

fn main() {
    let matches = App::new("trimr")
        .about("Counts the triangles of an undirected graph with a distributed MapReduce")
        .arg(
            Arg::with_name("INPUT")
                .help("Edge list, one `u v` pair per line")
                .required(true),
        )
        .arg(
            Arg::with_name("output-dir")
                .long("output-dir")
                .takes_value(true)
                .default_value(".")
                .help("Directory receiving global_counts.txt and per_vertex_counts.txt"),
        )
        .arg(
            Arg::with_name("local")
                .long("local")
                .takes_value(true)
                .value_name("N")
                .conflicts_with("peers")
                .help("Runs N workers as threads of this process"),
        )
        .arg(
            Arg::with_name("peers")
                .long("peers")
                .takes_value(true)
                .value_name("HOST:PORT,...")
                .help("Address of every rank, in rank order"),
        )
        .arg(
            Arg::with_name("base-port")
                .long("base-port")
                .takes_value(true)
                .default_value(DEFAULT_BASE_PORT)
                .help("Rank r listens on 127.0.0.1:<base-port + r> unless --peers is given"),
        )
        .get_matches();
    let config = Config {
        input: PathBuf::from(matches.value_of("INPUT").unwrap_or_default()),
        output_dir: PathBuf::from(matches.value_of("output-dir").unwrap_or(".")),
    };
    let result = if matches.is_present("local") {
        parse_usize(&matches, "local").and_then(|size| handle_local(&config, size))
    } else {
        handle_group(&config, &matches)
    };
    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
