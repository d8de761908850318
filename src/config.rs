//! Shared constants and process configuration.
//!
//! The wire protocol (`crate::wire`) and the block engine (`crate::block`) are
//! parameterized by a handful of values that every peer in the network must
//! agree on: the block size, the datagram MTU, and the shared datagram port.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Maximum payload size of a single block, in bytes, before base64 encoding.
pub const DEFAULT_BLOCK_SIZE: usize = 32;

/// Upper bound on the encoded length of a single outbound datagram.
pub const DEFAULT_MTU: usize = 1024;

/// UDP port every node binds its datagram endpoint to.
pub const DEFAULT_NODE_PORT: u16 = 9090;

/// Framing terminator shared by the stream and datagram channels.
pub const TERMINATOR: u8 = b'<';

/// Tunables shared by both the tracker and node runtimes.
#[derive(Debug, Clone, Copy)]
pub struct Protocol {
    pub block_size: usize,
    pub mtu: usize,
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol {
            block_size: DEFAULT_BLOCK_SIZE,
            mtu: DEFAULT_MTU,
        }
    }
}

/// Command-line surface for `filemesh-node`.
///
/// Mirrors the original source's positional arguments (files folder, tracker
/// domain, tracker port) rather than introducing a designed CLI shell.
#[derive(Parser, Debug)]
#[command(name = "filemesh-node")]
pub struct NodeCli {
    /// Directory holding the files this node serves.
    pub files_folder: PathBuf,

    /// Hostname or IP address of the tracker.
    pub tracker_host: String,

    /// Port the tracker's stream listener is bound to.
    pub tracker_port: u16,

    /// Shared datagram port every peer listens on.
    #[arg(long, default_value_t = DEFAULT_NODE_PORT)]
    pub node_port: u16,
}

/// Command-line surface for `filemesh-tracker`.
#[derive(Parser, Debug)]
#[command(name = "filemesh-tracker")]
pub struct TrackerCli {
    /// Address to bind the stream listener to, e.g. `0.0.0.0:9090`.
    pub bind: SocketAddr,

    /// Name reported in REGISTERED acknowledgements.
    #[arg(long, default_value = "tracker")]
    pub name: String,
}
