//! Splits a byte stream into terminator-delimited textual messages.
//!
//! Used on both channels: the reliable stream between node and tracker, and
//! the unreliable datagram channel between nodes. Each inbound chunk is
//! appended to a running buffer; every `<` (see `config::TERMINATOR`) closes
//! off one complete message. The tail after the last terminator is retained
//! as residue until more bytes arrive.

use crate::config::TERMINATOR;

#[derive(Debug, Default)]
pub struct Framer {
    residue: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Framer::default()
    }

    /// Feeds newly-read bytes into the framer and returns every complete
    /// message they closed off, in order. Empty segments (two terminators
    /// back to back) are discarded.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.residue.extend_from_slice(chunk);

        let mut messages = Vec::new();
        loop {
            let Some(pos) = self.residue.iter().position(|&b| b == TERMINATOR) else {
                break;
            };
            let message: Vec<u8> = self.residue.drain(..=pos).collect();
            // drop the terminator itself
            let message = &message[..message.len() - 1];
            if !message.is_empty() {
                messages.push(String::from_utf8_lossy(message).into_owned());
            }
        }
        messages
    }

    /// True if bytes remain buffered with no terminator seen yet.
    pub fn has_residue(&self) -> bool {
        !self.residue.is_empty()
    }

    /// Call when the underlying connection has closed. A non-empty residue
    /// at that point is a framing error: the peer wrote a partial message
    /// and never terminated it.
    pub fn finish(&self) -> Result<(), String> {
        if self.has_residue() {
            Err(format!(
                "stream closed with {} unterminated byte(s) buffered",
                self.residue.len()
            ))
        } else {
            Ok(())
        }
    }
}

/// Appends the framing terminator to a message, ready for a single write call.
pub fn encode(message: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(message.len() + 1);
    bytes.extend_from_slice(message.as_bytes());
    bytes.push(TERMINATOR);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_message_single_chunk() {
        let mut framer = Framer::new();
        let msgs = framer.push(b"REGISTER,a.txt<");
        assert_eq!(msgs, vec!["REGISTER,a.txt".to_string()]);
        assert!(!framer.has_residue());
    }

    #[test]
    fn multiple_messages_one_chunk() {
        let mut framer = Framer::new();
        let msgs = framer.push(b"GET,a.txt<GET,b.txt<");
        assert_eq!(msgs, vec!["GET,a.txt".to_string(), "GET,b.txt".to_string()]);
    }

    #[test]
    fn message_split_across_chunks() {
        let mut framer = Framer::new();
        assert!(framer.push(b"GET,a.t").is_empty());
        assert!(framer.has_residue());
        let msgs = framer.push(b"xt<");
        assert_eq!(msgs, vec!["GET,a.txt".to_string()]);
        assert!(!framer.has_residue());
    }

    #[test]
    fn chunking_is_irrelevant_to_output() {
        let whole = b"ONE<TWO<THREE<";
        for split in 1..whole.len() {
            let (a, b) = whole.split_at(split);
            let mut framer = Framer::new();
            let mut msgs = framer.push(a);
            msgs.extend(framer.push(b));
            assert_eq!(msgs, vec!["ONE", "TWO", "THREE"], "split at {split}");
        }
    }

    #[test]
    fn empty_segments_are_discarded() {
        let mut framer = Framer::new();
        let msgs = framer.push(b"<<A<<B<");
        assert_eq!(msgs, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn finish_errors_on_dangling_residue() {
        let mut framer = Framer::new();
        framer.push(b"partial");
        assert!(framer.finish().is_err());
    }

    #[test]
    fn finish_ok_when_drained() {
        let mut framer = Framer::new();
        framer.push(b"done<");
        assert!(framer.finish().is_ok());
    }

    #[test]
    fn encode_appends_terminator() {
        assert_eq!(encode("EXIT"), b"EXIT<".to_vec());
    }
}
