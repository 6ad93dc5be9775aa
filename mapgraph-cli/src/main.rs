//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    mapgraph_cli::init_logging();
    if let Err(err) = mapgraph_cli::run() {
        eprintln!("mapgraph: {err}");
        std::process::exit(1);
    }
}
