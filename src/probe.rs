//! Peer latency probing and fastest-peer selection.
//!
//! The tracker measures nothing; round-trip time is measured end-to-end by
//! the requester (`fastest`) and is only valid within a single selection
//! round, hence the table is cleared before `fastest` returns.

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Single-writer-per-round table of peer name → measured RTT in seconds.
#[derive(Default)]
pub struct ResponseTimes {
    inner: Mutex<HashMap<String, f64>>,
}

impl ResponseTimes {
    pub fn new() -> Self {
        ResponseTimes::default()
    }

    /// Records `now() - t0` for `peer`. Called from the PRESPONSE handler.
    pub fn record(&self, peer: &str, t0: f64) {
        let rtt = now_seconds() - t0;
        self.inner.lock().unwrap().insert(peer.to_string(), rtt);
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    fn has_all(&self, peers: &[String]) -> bool {
        let table = self.inner.lock().unwrap();
        peers.iter().all(|p| table.contains_key(p))
    }

    fn get(&self, peer: &str) -> Option<f64> {
        self.inner.lock().unwrap().get(peer).copied()
    }
}

/// Wall-clock seconds since the epoch, as used for PING's `t0` field.
pub fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs_f64()
}

/// Selects the fastest peer out of `peers` by sending a PING to each (via
/// `send_ping`) and waiting for `response_times` to fill in. Non-responders
/// after `timeout` are scored as infinite RTT, per spec §4.3.
///
/// Returns the first element without probing if there is only one candidate.
pub fn fastest<F>(peers: &[String], response_times: &ResponseTimes, mut send_ping: F, timeout: Duration) -> String
where
    F: FnMut(&str, f64),
{
    assert!(!peers.is_empty(), "fastest() requires a non-empty peer list");
    if peers.len() == 1 {
        return peers[0].clone();
    }

    let t0 = now_seconds();
    for peer in peers {
        send_ping(peer, t0);
    }

    let deadline = Instant::now() + timeout;
    while !response_times.has_all(peers) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(50));
    }

    let mut winner = peers[0].clone();
    let mut best_rtt = response_times.get(&winner).unwrap_or(f64::INFINITY);
    for peer in &peers[1..] {
        let rtt = response_times.get(peer).unwrap_or(f64::INFINITY);
        if rtt < best_rtt {
            best_rtt = rtt;
            winner = peer.clone();
        }
    }

    response_times.clear();
    winner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_peer_returned_without_probing() {
        let response_times = ResponseTimes::new();
        let mut pings_sent = 0;
        let winner = fastest(
            &["only".to_string()],
            &response_times,
            |_, _| pings_sent += 1,
            Duration::from_millis(10),
        );
        assert_eq!(winner, "only");
        assert_eq!(pings_sent, 0);
    }

    #[test]
    fn selects_peer_with_minimum_rtt() {
        let response_times = ResponseTimes::new();
        // Pretend the PRESPONSE round already completed before fastest() polls.
        response_times.record("A", now_seconds() - 0.040);
        response_times.record("B", now_seconds() - 0.010);
        response_times.record("C", now_seconds() - 0.025);

        let peers = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let winner = fastest(&peers, &response_times, |_, _| {}, Duration::from_millis(10));
        assert_eq!(winner, "B");
    }

    #[test]
    fn clears_table_before_returning() {
        let response_times = ResponseTimes::new();
        response_times.record("A", now_seconds());
        response_times.record("B", now_seconds());
        let peers = vec!["A".to_string(), "B".to_string()];
        fastest(&peers, &response_times, |_, _| {}, Duration::from_millis(10));
        assert!(!response_times.has_all(&peers));
    }

    #[test]
    fn ties_broken_by_input_order() {
        let response_times = ResponseTimes::new();
        let t = now_seconds();
        response_times.record("A", t);
        response_times.record("B", t);
        let peers = vec!["A".to_string(), "B".to_string()];
        let winner = fastest(&peers, &response_times, |_, _| {}, Duration::from_millis(10));
        assert_eq!(winner, "A");
    }

    #[test]
    fn non_responders_score_as_infinite_rtt() {
        let response_times = ResponseTimes::new();
        response_times.record("B", now_seconds() - 0.010);
        // "A" never responds; timeout should be short so the test stays fast.
        let peers = vec!["A".to_string(), "B".to_string()];
        let winner = fastest(&peers, &response_times, |_, _| {}, Duration::from_millis(60));
        assert_eq!(winner, "B");
    }
}
