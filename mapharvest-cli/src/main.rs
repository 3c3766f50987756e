//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = mapharvest_cli::run() {
        eprintln!("mapharvest: {err}");
        std::process::exit(1);
    }
}
