//! fetchcoord.
//!
//! A command line client for the sample REST API, built on the fetch coordinator. Every command
//! goes through the same cache and request coalescing that an interactive client would use, and
//! `browse` walks through the screens of the example app the way a user would.

#![warn(
    missing_docs,
    missing_debug_implementations,
    unused_crate_dependencies,
    clippy::all
)]

mod cli;
mod logging;
mod navigation;
mod screens;

fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
