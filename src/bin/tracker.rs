use std::net::TcpListener;

use anyhow::Context;
use clap::Parser;

use filemesh::config::TrackerCli;
use filemesh::tracker;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = TrackerCli::parse();

    let listener = TcpListener::bind(cli.bind).with_context(|| format!("failed to bind {}", cli.bind))?;

    tracker::serve(listener, cli.name).context("tracker accept loop failed")
}
