//! Per-peer connection handler: reads framed `NodeToTracker` commands off
//! one stream connection and replies with `TrackerToNode` messages.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use crate::framer::{self, Framer};
use crate::tracker::state::TrackerState;
use crate::wire::{NodeToTracker, TrackerToNode};

fn send_reply(stream: &mut TcpStream, reply: &TrackerToNode) -> io::Result<()> {
    stream.write_all(&framer::encode(&reply.to_wire()))
}

/// Handles one peer's GET: the ownership reply and the block-ledger reply
/// are sent independently (spec §9, "tracker's dual reply") except when the
/// requester already owns the file, per §4.7 point 3 ("Stop").
fn handle_get(stream: &mut TcpStream, state: &TrackerState, peer: &str, filename: String) -> io::Result<()> {
    let lookup = state.lookup(peer, &filename);

    if lookup.already_owned {
        send_reply(stream, &TrackerToNode::AlreadyFile(filename))?;
        return Ok(());
    }

    if !lookup.owners.is_empty() {
        send_reply(
            stream,
            &TrackerToNode::FileFound {
                filename: filename.clone(),
                peers: lookup.owners,
            },
        )?;
    } else {
        send_reply(stream, &TrackerToNode::FileNotFound(filename.clone()))?;
    }

    if !lookup.holders.is_empty() {
        send_reply(
            stream,
            &TrackerToNode::BFound {
                filename: filename.clone(),
                holders: lookup.holders,
            },
        )?;
    } else {
        send_reply(stream, &TrackerToNode::BNotFound(filename))?;
    }

    Ok(())
}

/// Runs one peer's handler to completion: reads until EXIT, stream close,
/// or an I/O error, leaving `state` fully cleaned up for `peer` either way.
pub fn run(mut stream: TcpStream, peer: String, state: Arc<TrackerState>, tracker_name: &str) -> io::Result<()> {
    let mut framer = Framer::new();
    let mut buf = [0u8; 1024];

    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            if let Err(detail) = framer.finish() {
                log::warn!("{peer} disconnected mid-message: {detail}");
            }
            state.exit(&peer);
            log::info!("{peer} connection dropped");
            return Ok(());
        }

        for message in framer.push(&buf[..n]) {
            log::debug!("{peer} -> tracker: {message}");
            match NodeToTracker::parse(&message) {
                Ok(NodeToTracker::Register(files)) => {
                    log::info!("{peer} registered files: {}", files.join(";"));
                    state.register(&peer, files);
                    send_reply(&mut stream, &TrackerToNode::Registered(tracker_name.to_string()))?;
                }
                Ok(NodeToTracker::Get(filename)) => {
                    handle_get(&mut stream, &state, &peer, filename)?;
                }
                Ok(NodeToTracker::GotBlock { filename, index }) => {
                    state.got_block(&peer, &filename, index);
                }
                Ok(NodeToTracker::Done(filename)) => {
                    log::info!("{peer} completed {filename}");
                    state.done(&peer, &filename);
                }
                Ok(NodeToTracker::Exit) => {
                    state.exit(&peer);
                    log::info!("{peer} exited");
                    return Ok(());
                }
                Err(err) => {
                    log::warn!("protocol violation from {peer}: {err}");
                }
            }
        }
    }
}
