//! The node runtime: registers with a tracker over a stream connection,
//! then runs three independent activities concurrently (spec §4, §5) —
//! reading tracker replies, reading peer datagrams, and reading operator
//! commands from stdin — sharing state through [`NodeRuntime`].

mod workers;

use std::collections::HashMap;
use std::io::{self, BufRead, Read, Write};
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::block::{self, BlockOutcome, PendingBlocks, SendCache};
use crate::config::Protocol;
use crate::framer::{self, Framer};
use crate::netname;
use crate::probe::{self, ResponseTimes};
use crate::storage::Storage;
use crate::wire::{Datagram, NodeToTracker, TrackerToNode};

use workers::WorkerPool;

/// How long a [`probe::fastest`] round waits for PRESPONSE before giving up
/// on the slowest peers (spec §4.3).
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Number of worker threads datagrams are dispatched to; see
/// [`workers::WorkerPool`].
const DATAGRAM_WORKERS: usize = 4;

type LedgerKey = (String, String);

/// Shared state for one running node. Held behind an `Arc` so the three
/// activities and the per-message workers they spawn can all reach it.
pub struct NodeRuntime {
    name: String,
    storage: Storage,
    protocol: Protocol,
    tracker_writer: Mutex<TcpStream>,
    udp_socket: UdpSocket,
    node_port: u16,
    name_resolution: Mutex<HashMap<String, SocketAddr>>,
    response_times: ResponseTimes,
    send_cache: SendCache,
    pending_blocks: PendingBlocks,
    /// Mirrors the tracker's block ledger for files this node has queried,
    /// populated from `B_FOUND` replies (spec §4.6).
    block_ledger_view: Mutex<HashMap<LedgerKey, Vec<u64>>>,
    workers: WorkerPool,
}

impl NodeRuntime {
    /// Connects to the tracker, registers this node's current file list, and
    /// binds the shared datagram port. Returns the runtime plus a dedicated
    /// reader half of the tracker stream for the stream-dispatch activity.
    pub fn connect(files_folder: PathBuf, tracker_host: &str, tracker_port: u16, node_port: u16, protocol: Protocol) -> io::Result<(Arc<Self>, TcpStream)> {
        let storage = Storage::new(files_folder)?;
        let name = netname::local_hostname()?;

        let tracker_writer = TcpStream::connect((tracker_host, tracker_port))?;
        let tracker_reader = tracker_writer.try_clone()?;

        let udp_socket = UdpSocket::bind(("0.0.0.0", node_port))?;

        let runtime = Arc::new(NodeRuntime {
            name,
            storage,
            protocol,
            tracker_writer: Mutex::new(tracker_writer),
            udp_socket,
            node_port,
            name_resolution: Mutex::new(HashMap::new()),
            response_times: ResponseTimes::new(),
            send_cache: SendCache::new(),
            pending_blocks: PendingBlocks::new(),
            block_ledger_view: Mutex::new(HashMap::new()),
            workers: WorkerPool::new(DATAGRAM_WORKERS),
        });

        let files = runtime.storage.list_files()?;
        log::info!("{} registering with files: {}", runtime.name, files.join(";"));
        runtime.send_tracker(NodeToTracker::Register(files));

        Ok((runtime, tracker_reader))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the datagram-dispatch and tracker-stream-dispatch activities on
    /// background threads, then runs the command-reading activity on the
    /// calling thread until stdin closes or `EXIT` is entered.
    pub fn run(self: Arc<Self>, tracker_reader: TcpStream) {
        let stream_runtime = Arc::clone(&self);
        thread::spawn(move || stream_runtime.run_tracker_stream(tracker_reader));

        let datagram_runtime = Arc::clone(&self);
        thread::spawn(move || datagram_runtime.run_datagram_loop());

        self.run_command_loop();
    }

    fn run_tracker_stream(self: Arc<Self>, mut reader: TcpStream) {
        let mut framer = Framer::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => {
                    log::error!("tracker connection closed; exiting");
                    std::process::exit(1);
                }
                Ok(n) => n,
                Err(err) => {
                    log::error!("tracker connection lost: {err}; exiting");
                    std::process::exit(1);
                }
            };

            for message in framer.push(&buf[..n]) {
                match TrackerToNode::parse(&message) {
                    Ok(msg) => {
                        let runtime = Arc::clone(&self);
                        thread::spawn(move || runtime.handle_tracker_message(msg));
                    }
                    Err(err) => log::warn!("protocol violation from tracker: {err}"),
                }
            }
        }
    }

    fn handle_tracker_message(self: Arc<Self>, msg: TrackerToNode) {
        match msg {
            TrackerToNode::FileFound { filename, peers } => {
                log::info!("{filename} found at {peers:?}; probing for fastest source");
                let source = probe::fastest(
                    &peers,
                    &self.response_times,
                    |peer, t0| self.send_datagram(peer, Datagram::Ping(t0)),
                    PROBE_TIMEOUT,
                );
                log::info!("downloading {filename} from {source}");
                self.send_datagram(&source, Datagram::DownloadRequest(filename));
            }
            TrackerToNode::FileNotFound(filename) => {
                println!("File '{filename}' was not found in the network.");
            }
            TrackerToNode::BFound { filename, holders } => {
                let mut view = self.block_ledger_view.lock().unwrap();
                for (peer, index) in holders {
                    view.entry((peer, filename.clone())).or_default().push(index);
                }
            }
            TrackerToNode::BNotFound(filename) => {
                log::debug!("no individual blocks of {filename} found in the network");
            }
            TrackerToNode::AlreadyFile(filename) => {
                println!("File '{filename}' already exists locally.");
            }
            TrackerToNode::Registered(tracker_name) => {
                log::info!("registered with tracker {tracker_name}");
            }
        }
    }

    fn run_datagram_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; self.protocol.mtu];
        loop {
            let (n, sender_addr) = match self.udp_socket.recv_from(&mut buf) {
                Ok(pair) => pair,
                Err(err) => {
                    log::warn!("datagram recv failed: {err}");
                    continue;
                }
            };

            let sender_name = match netname::resolve_peer_name(sender_addr.ip()) {
                Ok(name) => name,
                Err(err) => {
                    log::warn!("could not resolve {sender_addr}: {err}");
                    sender_addr.ip().to_string()
                }
            };

            // Each datagram is one already-terminated message (spec §4.1);
            // a fresh framer per packet needs no cross-packet carry state.
            let mut framer = Framer::new();
            for message in framer.push(&buf[..n]) {
                match Datagram::parse(&message) {
                    Ok(msg) => {
                        let runtime = Arc::clone(&self);
                        let sender_name = sender_name.clone();
                        self.workers.dispatch(move || runtime.handle_node_datagram(msg, sender_name));
                    }
                    Err(err) => log::warn!("protocol violation from {sender_name}: {err}"),
                }
            }
        }
    }

    fn handle_node_datagram(self: Arc<Self>, msg: Datagram, sender: String) {
        match msg {
            Datagram::DownloadRequest(filename) => match self.storage.read_file(&filename) {
                Ok(bytes) => {
                    block::send_blocks(&filename, &bytes, self.protocol.block_size, &self.send_cache, |dg| {
                        self.send_datagram(&sender, dg)
                    });
                    log::info!("sent all blocks of {filename} to {sender}");
                }
                Err(err) => log::warn!("cannot serve {filename} requested by {sender}: {err}"),
            },
            Datagram::Block { filename, index, total, digest, payload } => {
                match block::receive_block(&filename, index, total, &digest, &payload, &self.pending_blocks) {
                    BlockOutcome::Corrupted => {
                        log::warn!("block {index}/{total} of {filename} from {sender} failed its checksum");
                        self.send_datagram(&sender, Datagram::CorruptedBlock { filename, index, total });
                    }
                    BlockOutcome::Stored => {
                        self.send_tracker(NodeToTracker::GotBlock { filename, index });
                    }
                    BlockOutcome::LastBlockArrived => {
                        self.send_tracker(NodeToTracker::GotBlock { filename: filename.clone(), index });
                        let bytes = block::await_reassembly(&filename, total, &self.pending_blocks, Duration::from_millis(50));
                        match self.storage.write_file(&filename, &bytes) {
                            Ok(()) => {
                                self.send_tracker(NodeToTracker::Done(filename.clone()));
                                self.send_cache.release(&filename);
                                println!("File '{filename}' downloaded from {sender}.");
                            }
                            Err(err) => log::error!("failed to write {filename}: {err}"),
                        }
                    }
                }
            }
            Datagram::CorruptedBlock { filename, index, total } => {
                if let Err(err) = block::resend_block(&filename, index, total, &self.send_cache, |dg| self.send_datagram(&sender, dg)) {
                    log::error!("cannot resend {filename} block {index} to {sender}: {err}");
                }
            }
            Datagram::Ping(t0) => {
                self.send_datagram(&sender, Datagram::PResponse(t0));
            }
            Datagram::PResponse(t0) => {
                self.response_times.record(&sender, t0);
            }
        }
    }

    fn run_command_loop(self: Arc<Self>) {
        println!("Enter command ('GET <filename>' or 'EXIT' to quit):");
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(filename) = line.strip_prefix("GET ") {
                self.send_tracker(NodeToTracker::Get(filename.to_string()));
            } else if line.eq_ignore_ascii_case("EXIT") {
                self.send_tracker(NodeToTracker::Exit);
                break;
            } else {
                println!("unrecognized command {line:?}; use 'GET <filename>' or 'EXIT'");
            }
        }
    }

    fn send_tracker(&self, msg: NodeToTracker) {
        let bytes = framer::encode(&msg.to_wire());
        let mut stream = self.tracker_writer.lock().unwrap();
        if let Err(err) = stream.write_all(&bytes) {
            log::error!("tracker connection lost while sending: {err}; exiting");
            std::process::exit(1);
        }
    }

    fn send_datagram(&self, peer: &str, msg: Datagram) {
        let addr = match self.resolve_addr(peer) {
            Ok(addr) => addr,
            Err(err) => {
                log::warn!("cannot resolve peer {peer}: {err}");
                return;
            }
        };

        let bytes = framer::encode(&msg.to_wire());
        if bytes.len() > self.protocol.mtu {
            log::error!("encoded datagram to {peer} is {} bytes, exceeding the {}-byte MTU", bytes.len(), self.protocol.mtu);
            return;
        }

        if let Err(err) = self.udp_socket.send_to(&bytes, addr) {
            log::warn!("failed to send datagram to {peer}: {err}");
        }
    }

    fn resolve_addr(&self, peer: &str) -> io::Result<SocketAddr> {
        if let Some(addr) = self.name_resolution.lock().unwrap().get(peer) {
            return Ok(*addr);
        }
        let addr = netname::resolve_peer_addr(peer, self.node_port)?;
        self.name_resolution.lock().unwrap().insert(peer.to_string(), addr);
        Ok(addr)
    }
}
