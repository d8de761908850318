use anyhow::Context;
use clap::Parser;

use filemesh::config::{NodeCli, Protocol};
use filemesh::node::NodeRuntime;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = NodeCli::parse();

    let (runtime, tracker_reader) = NodeRuntime::connect(
        cli.files_folder,
        &cli.tracker_host,
        cli.tracker_port,
        cli.node_port,
        Protocol::default(),
    )
    .with_context(|| format!("failed to connect to tracker at {}:{}", cli.tracker_host, cli.tracker_port))?;

    log::info!("{} online, datagram port {}", runtime.name(), cli.node_port);
    runtime.run(tracker_reader);

    Ok(())
}
