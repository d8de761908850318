//! Parses and constructs the textual messages defined by the protocol.
//!
//! Three message families share the `<`-terminated framing from
//! [`crate::framer`] but differ in shape: node→tracker commands are
//! `VERB,field,field`, tracker→node replies are `VERB field~field` (space
//! before the tail, `~` inside it), and node↔node datagrams mix both.
//! [`crate::framer::Framer`] strips the terminator before any of this runs.

use base64::Engine as _;

use crate::error::WireError;

/// Node → tracker, over the stream connection.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeToTracker {
    Register(Vec<String>),
    Get(String),
    GotBlock { filename: String, index: u64 },
    Done(String),
    Exit,
}

impl NodeToTracker {
    pub fn parse(line: &str) -> Result<Self, WireError> {
        if line == "EXIT" {
            return Ok(NodeToTracker::Exit);
        }
        if let Some(rest) = line.strip_prefix("REGISTER,") {
            let files = if rest.is_empty() {
                Vec::new()
            } else {
                rest.split(';').map(String::from).collect()
            };
            return Ok(NodeToTracker::Register(files));
        }
        if let Some(filename) = line.strip_prefix("GET,") {
            return Ok(NodeToTracker::Get(filename.to_string()));
        }
        if let Some(rest) = line.strip_prefix("GOT_BLOCK,") {
            let mut parts = rest.splitn(2, ',');
            let filename = parts.next().ok_or_else(|| WireError::MalformedFields {
                verb: "GOT_BLOCK",
                detail: "missing filename".to_string(),
            })?;
            let index = parts.next().ok_or_else(|| WireError::MalformedFields {
                verb: "GOT_BLOCK",
                detail: "missing index".to_string(),
            })?;
            return Ok(NodeToTracker::GotBlock {
                filename: filename.to_string(),
                index: index.parse()?,
            });
        }
        if let Some(filename) = line.strip_prefix("DONE,") {
            return Ok(NodeToTracker::Done(filename.to_string()));
        }
        Err(WireError::UnknownVerb(line.to_string()))
    }

    pub fn to_wire(&self) -> String {
        match self {
            NodeToTracker::Register(files) => format!("REGISTER,{}", files.join(";")),
            NodeToTracker::Get(filename) => format!("GET,{filename}"),
            NodeToTracker::GotBlock { filename, index } => {
                format!("GOT_BLOCK,{filename},{index}")
            }
            NodeToTracker::Done(filename) => format!("DONE,{filename}"),
            NodeToTracker::Exit => "EXIT".to_string(),
        }
    }
}

/// Tracker → node, over the stream connection.
///
/// Every reply here uses a space before its tail, `~` inside it — except
/// `Registered`, which keeps the comma-separated shape the original source
/// used for its REGISTER acknowledgement (spec.md §9(e)).
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerToNode {
    FileFound { filename: String, peers: Vec<String> },
    FileNotFound(String),
    BFound { filename: String, holders: Vec<(String, u64)> },
    BNotFound(String),
    AlreadyFile(String),
    Registered(String),
}

fn split_tail<'a>(rest: &'a str, verb: &'static str) -> Result<(&'a str, &'a str), WireError> {
    rest.split_once('~').ok_or_else(|| WireError::MalformedFields {
        verb,
        detail: format!("missing '~' separator in {rest:?}"),
    })
}

impl TrackerToNode {
    pub fn parse(line: &str) -> Result<Self, WireError> {
        if let Some(rest) = line.strip_prefix("FILE_FOUND ") {
            let (filename, peers) = split_tail(rest, "FILE_FOUND")?;
            let peers = peers.split(';').filter(|s| !s.is_empty()).map(String::from).collect();
            return Ok(TrackerToNode::FileFound {
                filename: filename.to_string(),
                peers,
            });
        }
        if let Some(filename) = line.strip_prefix("FILE_NOT_FOUND ") {
            return Ok(TrackerToNode::FileNotFound(filename.to_string()));
        }
        if let Some(rest) = line.strip_prefix("B_FOUND ") {
            let (filename, holders_str) = split_tail(rest, "B_FOUND")?;
            let mut holders = Vec::new();
            for item in holders_str.split(';').filter(|s| !s.is_empty()) {
                let mut parts = item.splitn(2, ',');
                let peer = parts.next().ok_or_else(|| WireError::MalformedFields {
                    verb: "B_FOUND",
                    detail: format!("missing peer in holder item {item:?}"),
                })?;
                let index = parts.next().ok_or_else(|| WireError::MalformedFields {
                    verb: "B_FOUND",
                    detail: format!("missing index in holder item {item:?}"),
                })?;
                holders.push((peer.to_string(), index.parse()?));
            }
            return Ok(TrackerToNode::BFound {
                filename: filename.to_string(),
                holders,
            });
        }
        if let Some(filename) = line.strip_prefix("B_NOT_FOUND ") {
            return Ok(TrackerToNode::BNotFound(filename.to_string()));
        }
        if let Some(filename) = line.strip_prefix("ALREADY_FILE ") {
            return Ok(TrackerToNode::AlreadyFile(filename.to_string()));
        }
        if let Some(name) = line.strip_prefix("REGISTERED,") {
            return Ok(TrackerToNode::Registered(name.to_string()));
        }
        Err(WireError::UnknownVerb(line.to_string()))
    }

    pub fn to_wire(&self) -> String {
        match self {
            TrackerToNode::FileFound { filename, peers } => {
                format!("FILE_FOUND {filename}~{}", peers.join(";"))
            }
            TrackerToNode::FileNotFound(filename) => format!("FILE_NOT_FOUND {filename}"),
            TrackerToNode::BFound { filename, holders } => {
                let items: Vec<String> = holders.iter().map(|(peer, idx)| format!("{peer},{idx}")).collect();
                format!("B_FOUND {filename}~{}", items.join(";"))
            }
            TrackerToNode::BNotFound(filename) => format!("B_NOT_FOUND {filename}"),
            TrackerToNode::AlreadyFile(filename) => format!("ALREADY_FILE {filename}"),
            TrackerToNode::Registered(name) => format!("REGISTERED,{name}"),
        }
    }
}

/// Node ↔ node, over the datagram channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Datagram {
    DownloadRequest(String),
    Block {
        filename: String,
        index: u64,
        total: u64,
        digest: String,
        payload: Vec<u8>,
    },
    CorruptedBlock { filename: String, index: u64, total: u64 },
    Ping(f64),
    PResponse(f64),
}

impl Datagram {
    pub fn parse(line: &str) -> Result<Self, WireError> {
        if let Some(filename) = line.strip_prefix("DOWNLOAD_REQUEST,") {
            return Ok(Datagram::DownloadRequest(filename.to_string()));
        }
        if let Some(rest) = line.strip_prefix("BLOCK~") {
            let parts: Vec<&str> = rest.split('~').collect();
            if parts.len() != 5 {
                return Err(WireError::MalformedFields {
                    verb: "BLOCK",
                    detail: format!("expected 5 fields, got {}", parts.len()),
                });
            }
            let payload = base64::engine::general_purpose::STANDARD.decode(parts[4])?;
            return Ok(Datagram::Block {
                filename: parts[0].to_string(),
                index: parts[1].parse()?,
                total: parts[2].parse()?,
                digest: parts[3].to_string(),
                payload,
            });
        }
        if let Some(rest) = line.strip_prefix("CORRUPTED_BLOCK,") {
            let parts: Vec<&str> = rest.split(',').collect();
            if parts.len() != 3 {
                return Err(WireError::MalformedFields {
                    verb: "CORRUPTED_BLOCK",
                    detail: format!("expected 3 fields, got {}", parts.len()),
                });
            }
            return Ok(Datagram::CorruptedBlock {
                filename: parts[0].to_string(),
                index: parts[1].parse()?,
                total: parts[2].parse()?,
            });
        }
        if let Some(t0) = line.strip_prefix("PING;") {
            return Ok(Datagram::Ping(t0.parse()?));
        }
        if let Some(t0) = line.strip_prefix("PRESPONSE;") {
            return Ok(Datagram::PResponse(t0.parse()?));
        }
        Err(WireError::UnknownVerb(line.to_string()))
    }

    pub fn to_wire(&self) -> String {
        match self {
            Datagram::DownloadRequest(filename) => format!("DOWNLOAD_REQUEST,{filename}"),
            Datagram::Block {
                filename,
                index,
                total,
                digest,
                payload,
            } => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(payload);
                format!("BLOCK~{filename}~{index}~{total}~{digest}~{encoded}")
            }
            Datagram::CorruptedBlock { filename, index, total } => {
                format!("CORRUPTED_BLOCK,{filename},{index},{total}")
            }
            Datagram::Ping(t0) => format!("PING;{t0}"),
            Datagram::PResponse(t0) => format!("PRESPONSE;{t0}"),
        }
    }
}
