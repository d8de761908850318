//! Resolving peer identities.
//!
//! Peers are named by stable hostname (spec §3), but the transport only
//! hands back numeric addresses. Both the tracker (resolving an accepted
//! TCP connection) and the node (resolving a UDP datagram's sender) reduce
//! to the same single reverse-lookup call; this is deliberately that one
//! call and nothing more elaborate (spec §1 non-goals).

use std::io;
use std::net::IpAddr;

/// Reverse-resolves `ip` to the hostname the rest of the system keys its
/// tables by.
pub fn resolve_peer_name(ip: IpAddr) -> io::Result<String> {
    dns_lookup::lookup_addr(&ip)
}

/// Forward-resolves a peer name to the address node-to-node datagrams are
/// sent to. Used to populate the node's `NameResolution` send cache.
pub fn resolve_peer_addr(name: &str, port: u16) -> io::Result<std::net::SocketAddr> {
    use std::net::ToSocketAddrs;
    (name, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no address for {name}")))
}

/// This node's own stable name, used as the REGISTER identity and the name
/// peers resolve back to it by.
pub fn local_hostname() -> io::Result<String> {
    dns_lookup::get_hostname()
}
