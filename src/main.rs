//! vdm CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. Errors have already
//! been written to stdout as JSON; they are repeated on stderr and the
//! process exits non-zero.

use vdm::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
