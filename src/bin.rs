use std::time::Instant;

use clap::{value_t, App, Arg, SubCommand};
#[cfg(feature = "cpu-profile")]
use gperftools::profiler::PROFILER;

use ghd::{parse_graph, Graph, GraphSpec, LogKDecomp, LogKHybrid, SwitchPredicate};

/// Start profiling and dump the file in the current directory. It can
/// later be analyzed with `pprof`, e.g.,
/// ```text
/// cargo run --release --features cpu-profile -- solve graph.hg -k 3
/// pprof --lines target/release/ghdsolve solve.profile
/// ```
#[cfg(feature = "cpu-profile")]
#[inline(always)]
fn start_profile(stage: &str) {
    PROFILER
        .lock()
        .unwrap()
        .start(format!("./{}.profile", stage))
        .unwrap();
}
#[cfg(feature = "cpu-profile")]
#[inline(always)]
fn stop_profile() {
    PROFILER.lock().unwrap().stop().unwrap();
}
#[cfg(not(feature = "cpu-profile"))]
#[inline(always)]
fn start_profile(_stage: &str) {}
#[cfg(not(feature = "cpu-profile"))]
#[inline(always)]
fn stop_profile() {}

fn run(graph: &Graph, k: usize, bal_factor: usize, hybrid: Option<SwitchPredicate>, json: bool) {
    start_profile("solve");
    let start = Instant::now();
    let (name, result) = match hybrid {
        Some(predicate) => {
            let alg = LogKHybrid::new(graph.clone(), k, bal_factor, predicate);
            (alg.name(), alg.find_decomp())
        }
        None => {
            let alg = LogKDecomp::new(graph.clone(), k, bal_factor);
            (alg.name(), alg.find_decomp())
        }
    };
    let duration = start.elapsed();
    stop_profile();

    match result {
        Some(decomp) => {
            assert!(
                decomp.check(graph, k),
                "{} produced an invalid decomposition",
                name
            );
            println!("{} found a decomposition of width <= {}:", name, k);
            if json {
                let out =
                    serde_json::to_string_pretty(&decomp).expect("can't serialize to json");
                println!("{}", out);
            } else {
                print!("{}", decomp);
            }
        }
        None => println!("{} found no decomposition of width <= {}", name, k),
    }
    println!("\t-> time elapsed: {:?}", duration);
}

fn main() {
    pretty_env_logger::init_timed();

    let matches = App::new("GHD Solver")
        .version("1.0")
        .arg(
            Arg::with_name("width")
                .short("k")
                .long("width")
                .help("Maximum number of cover edges per bag")
                .default_value("2")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("balance-factor")
                .short("b")
                .long("balance-factor")
                .help("Divisor controlling the component size limit")
                .default_value("2")
                .takes_value(true),
        )
        .subcommand(
            SubCommand::with_name("solve")
                .about("Decompose a hypergraph read from a file")
                .arg(Arg::with_name("file").required(true).help("hypergraph file"))
                .arg(
                    Arg::with_name("hybrid")
                        .long("hybrid")
                        .takes_value(true)
                        .possible_values(&["never", "always", "edge-count", "edge-sum", "weighted"])
                        .help("switch to the linear-depth solver according to this predicate"),
                )
                .arg(
                    Arg::with_name("size")
                        .long("size")
                        .default_value("20")
                        .takes_value(true)
                        .help("threshold for the size-based switching predicates"),
                )
                .arg(
                    Arg::with_name("json")
                        .long("json")
                        .help("emit the decomposition as JSON"),
                ),
        )
        .subcommand(
            SubCommand::with_name("random")
                .about("Decompose a seeded random hypergraph")
                .arg(
                    Arg::with_name("edges")
                        .short("e")
                        .default_value("10")
                        .takes_value(true)
                        .help("number of edges"),
                )
                .arg(
                    Arg::with_name("vertices")
                        .short("v")
                        .default_value("10")
                        .takes_value(true)
                        .help("number of vertices to draw from"),
                )
                .arg(
                    Arg::with_name("arity")
                        .short("a")
                        .default_value("3")
                        .takes_value(true)
                        .help("maximum edge arity"),
                )
                .arg(
                    Arg::with_name("seed")
                        .short("s")
                        .default_value("0")
                        .takes_value(true)
                        .help("generator seed"),
                ),
        )
        .get_matches();

    let k = value_t!(matches, "width", usize).unwrap();
    let bal_factor = value_t!(matches, "balance-factor", usize).unwrap();
    assert!(k >= 1, "width must be positive");
    assert!(bal_factor >= 2, "balance factor must be at least 2");

    if let Some(matches) = matches.subcommand_matches("solve") {
        let path = matches.value_of("file").unwrap();
        let input = std::fs::read_to_string(path).unwrap_or_else(|err| {
            eprintln!("can't read {}: {}", path, err);
            std::process::exit(1);
        });
        let parsed = parse_graph(&input).unwrap_or_else(|err| {
            eprintln!("can't parse {}: {}", path, err);
            std::process::exit(1);
        });
        println!(
            "graph: {} edges over {} vertices",
            parsed.graph.edges.len(),
            parsed.graph.len()
        );
        let hybrid = matches.value_of("hybrid").map(|name| {
            let size = value_t!(matches, "size", usize).unwrap();
            SwitchPredicate::from_name(name, size).unwrap()
        });
        run(&parsed.graph, k, bal_factor, hybrid, matches.is_present("json"));
    } else if let Some(matches) = matches.subcommand_matches("random") {
        let seed = value_t!(matches, "seed", u8).unwrap();
        let spec = GraphSpec {
            edges: value_t!(matches, "edges", usize).unwrap(),
            vertices: value_t!(matches, "vertices", usize).unwrap(),
            max_arity: value_t!(matches, "arity", usize).unwrap(),
            seed: [seed; 32],
        };
        let graph = Graph::random(spec);
        println!(
            "graph: {} edges over {} vertices (seed {})",
            graph.edges.len(),
            graph.len(),
            seed
        );
        run(&graph, k, bal_factor, None, false);
    } else {
        eprintln!("No subcommand entered, decomposing a default random graph");
        let graph = Graph::random(GraphSpec {
            edges: 10,
            vertices: 10,
            max_arity: 3,
            seed: [0u8; 32],
        });
        run(&graph, k, bal_factor, None, false);
    }
}
