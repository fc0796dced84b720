mod cmd;
mod repl;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::cmd::App;

#[cfg(not(miri))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<ExitCode> {
    human_panic::setup_panic!();
    init_tracing();
    App::parse().run()
}

/// Logs go to stderr, and only when `RUST_LOG` asks for them.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}
