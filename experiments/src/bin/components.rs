use rand::{Rng, SeedableRng, rngs::StdRng};

use reachability::Config;
use reachability::algorithms::reachability::{connected_components, Labels};

type Node = u32;

fn main() {

    env_logger::init();

    let (config, free) = match Config::from_args(std::env::args().skip(1)) {
        Ok(parsed) => parsed,
        Err(error) => {
            eprintln!("{}", error);
            eprintln!("usage: components [-w WORKERS] [-i ITERATIONS] [--strict] <nodes> <edges>");
            std::process::exit(1);
        }
    };

    let nodes: Node = free.first().and_then(|arg| arg.parse().ok()).unwrap_or(1_000);
    let edges: usize = free.get(1).and_then(|arg| arg.parse().ok()).unwrap_or(2_000);

    let timer = std::time::Instant::now();

    let mut rng = StdRng::seed_from_u64(0);
    let graph = (0 .. edges).map(|_| (rng.gen_range(0 .. nodes), rng.gen_range(0 .. nodes))).collect::<Vec<_>>();
    println!("{:?}\tgenerated {} edges over {} nodes", timer.elapsed(), edges, nodes);

    match connected_components(&config, graph) {
        Ok(labels) => report(&labels, timer.elapsed()),
        Err(error) => {
            log::error!("connected components failed: {}", error);
            std::process::exit(2);
        }
    }
}

fn report(labels: &Labels<Node>, elapsed: std::time::Duration) {
    println!(
        "{:?}\t{} vertices in {} components after {} rounds (converged: {})",
        elapsed,
        labels.len(),
        labels.components(),
        labels.iterations,
        labels.converged,
    );
}
