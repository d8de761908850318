pub mod handler;
pub mod state;

use std::io;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use crate::netname::resolve_peer_name;
use state::TrackerState;

/// Accepts connections on `listener` forever, spawning one handler thread
/// per peer (spec §4.7, §5: "the tracker runs one handler per connected
/// peer; handlers run concurrently with each other and with the accept
/// loop").
pub fn serve(listener: TcpListener, tracker_name: String) -> io::Result<()> {
    let state = Arc::new(TrackerState::new());
    log::info!("tracker listening on {}", listener.local_addr()?);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                log::warn!("failed to accept connection: {err}");
                continue;
            }
        };

        let state = Arc::clone(&state);
        let tracker_name = tracker_name.clone();

        thread::spawn(move || {
            let peer_addr = match stream.peer_addr() {
                Ok(addr) => addr,
                Err(err) => {
                    log::warn!("could not read peer address: {err}");
                    return;
                }
            };
            let peer_name = match resolve_peer_name(peer_addr.ip()) {
                Ok(name) => name,
                Err(err) => {
                    log::warn!("could not resolve {peer_addr}: {err}, using address as name");
                    peer_addr.ip().to_string()
                }
            };

            log::info!("{peer_name} connected from {peer_addr}");
            if let Err(err) = handler::run(stream, peer_name.clone(), state, &tracker_name) {
                log::warn!("handler for {peer_name} terminated: {err}");
            }
        });
    }

    Ok(())
}
