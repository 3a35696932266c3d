#![warn(missing_docs)]

//! Text wire codec for Spora node-to-node messages
//!
//! Every frame is one line of ordered `;`-separated fields: a direction,
//! a message kind, then kind-specific fields. The five node-to-node kinds
//! decode into the [`NodeMessage`] enum, matched exhaustively by the
//! worker. The supervisor's `start_round` trigger shares the framing but
//! bypasses the protocol entirely.
//!
//! ```text
//! node_to_node;spread;<subject>;<timestamp>;<sourceId>;<originId>;<payload>
//! node_to_node;request;<subject>;<timestamp>;<sourceId>;<originId>
//! node_to_node;initial_request;<originId>
//! node_to_node;request_and_spread;<subject>;<timestamp>;<sourceId>;<originId>;<payload>
//! node_to_node;feedback;<subject>;<timestamp>;<sourceId>
//! supervisor_to_node;start_round
//! ```
//!
//! The payload is always the final field and is taken greedily, so
//! payloads containing `;` survive a round trip.

use spora_types::{MessageId, NodeId, SpreadMessage, Topic};
use thiserror::Error;

/// Direction label for node-to-node frames.
pub const NODE_TO_NODE: &str = "node_to_node";
/// Direction label for supervisor control frames.
pub const SUPERVISOR_TO_NODE: &str = "supervisor_to_node";
/// The complete round-trigger control frame.
pub const START_ROUND_FRAME: &str = "supervisor_to_node;start_round";

const SEP: char = ';';

/// Errors produced while decoding a frame.
///
/// A `WireError` always means the offending frame is discarded; it is
/// never fatal to the pipeline that encountered it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// The frame was empty or contained no direction field
    #[error("empty frame")]
    EmptyFrame,

    /// The direction field is not one this codec knows
    #[error("unknown direction: {0}")]
    UnknownDirection(String),

    /// The direction/kind pair is not one this codec knows
    #[error("unknown message kind: {0}")]
    UnknownKind(String),

    /// A frame of a known kind carried the wrong number of fields
    #[error("{kind} frame has {got} fields, expected {expected}")]
    FieldCount {
        /// Kind label of the offending frame
        kind: &'static str,
        /// Fields the kind requires
        expected: usize,
        /// Fields actually present
        got: usize,
    },

    /// A numeric field did not parse
    #[error("invalid {field}: {value:?}")]
    InvalidNumber {
        /// Name of the offending field
        field: &'static str,
        /// Raw text that failed to parse
        value: String,
    },
}

/// The five node-to-node message kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Carries data
    Spread,
    /// "Send me anything newer than this version"
    Request,
    /// "I have nothing for this subscription; send everything you have"
    InitialRequest,
    /// Push-pull hybrid: offer own version and request anything newer
    RequestAndSpread,
    /// "I already have a version at least this fresh"
    Feedback,
}

impl MessageKind {
    /// Wire label of this kind.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Spread => "spread",
            Self::Request => "request",
            Self::InitialRequest => "initial_request",
            Self::RequestAndSpread => "request_and_spread",
            Self::Feedback => "feedback",
        }
    }

    /// Parse a wire label.
    ///
    /// Returns `None` for labels this codec does not know.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "spread" => Some(Self::Spread),
            "request" => Some(Self::Request),
            "initial_request" => Some(Self::InitialRequest),
            "request_and_spread" => Some(Self::RequestAndSpread),
            "feedback" => Some(Self::Feedback),
            _ => None,
        }
    }
}

/// Classification of a raw frame by direction and kind alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameClass {
    /// A node-to-node protocol message of the given kind
    Node(MessageKind),
    /// The supervisor's round trigger
    StartRound,
}

/// A fully decoded node-to-node message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeMessage {
    /// Carries data
    Spread(SpreadMessage),
    /// Request for anything newer than the declared version
    Request {
        /// Topic and declared version of the requester
        id: MessageId,
        /// Requesting node
        origin: NodeId,
    },
    /// Request for everything the receiver holds
    InitialRequest {
        /// Requesting node
        origin: NodeId,
    },
    /// Simultaneous offer of the sender's version and request for newer
    RequestAndSpread(SpreadMessage),
    /// Confirmation that the sender already holds this exact version
    Feedback {
        /// The version being confirmed
        id: MessageId,
    },
}

impl NodeMessage {
    /// Wire kind of this message.
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Spread(_) => MessageKind::Spread,
            Self::Request { .. } => MessageKind::Request,
            Self::InitialRequest { .. } => MessageKind::InitialRequest,
            Self::RequestAndSpread(_) => MessageKind::RequestAndSpread,
            Self::Feedback { .. } => MessageKind::Feedback,
        }
    }
}

/// Classify a raw frame by its direction and kind fields without decoding
/// the rest.
pub fn classify(frame: &str) -> Result<FrameClass, WireError> {
    let mut parts = frame.splitn(3, SEP);
    let direction = parts.next().filter(|d| !d.is_empty()).ok_or(WireError::EmptyFrame)?;
    let kind = parts.next().unwrap_or("");

    match direction {
        NODE_TO_NODE => MessageKind::from_label(kind)
            .map(FrameClass::Node)
            .ok_or_else(|| WireError::UnknownKind(kind.to_string())),
        SUPERVISOR_TO_NODE if kind == "start_round" => Ok(FrameClass::StartRound),
        SUPERVISOR_TO_NODE => Err(WireError::UnknownKind(kind.to_string())),
        other => Err(WireError::UnknownDirection(other.to_string())),
    }
}

/// Encode a node-to-node message into its wire frame.
pub fn encode(msg: &NodeMessage) -> String {
    let kind = msg.kind().label();
    match msg {
        NodeMessage::Spread(m) | NodeMessage::RequestAndSpread(m) => format!(
            "{NODE_TO_NODE};{kind};{};{};{};{};{}",
            m.id.topic.subject, m.id.timestamp, m.id.topic.source, m.origin, m.payload
        ),
        NodeMessage::Request { id, origin } => format!(
            "{NODE_TO_NODE};{kind};{};{};{};{}",
            id.topic.subject, id.timestamp, id.topic.source, origin
        ),
        NodeMessage::InitialRequest { origin } => {
            format!("{NODE_TO_NODE};{kind};{origin}")
        }
        NodeMessage::Feedback { id } => format!(
            "{NODE_TO_NODE};{kind};{};{};{}",
            id.topic.subject, id.timestamp, id.topic.source
        ),
    }
}

/// Decode a node-to-node wire frame.
///
/// Control frames (`supervisor_to_node;...`) are rejected here; they are
/// recognized by [`classify`] and never reach the protocol decoder.
pub fn decode(frame: &str) -> Result<NodeMessage, WireError> {
    let class = classify(frame)?;
    let kind = match class {
        FrameClass::Node(kind) => kind,
        FrameClass::StartRound => return Err(WireError::UnknownDirection(SUPERVISOR_TO_NODE.to_string())),
    };

    match kind {
        MessageKind::Spread | MessageKind::RequestAndSpread => {
            // dir;kind;subject;ts;src;origin;payload — payload taken greedily
            let fields: Vec<&str> = frame.splitn(7, SEP).collect();
            if fields.len() != 7 {
                return Err(WireError::FieldCount {
                    kind: kind.label(),
                    expected: 7,
                    got: fields.len(),
                });
            }
            let msg = SpreadMessage::new(
                decode_id(fields[2], fields[3], fields[4])?,
                parse_node_id("originId", fields[5])?,
                fields[6],
            );
            Ok(match kind {
                MessageKind::Spread => NodeMessage::Spread(msg),
                _ => NodeMessage::RequestAndSpread(msg),
            })
        }
        MessageKind::Request => {
            let fields: Vec<&str> = frame.split(SEP).collect();
            if fields.len() != 6 {
                return Err(WireError::FieldCount {
                    kind: kind.label(),
                    expected: 6,
                    got: fields.len(),
                });
            }
            Ok(NodeMessage::Request {
                id: decode_id(fields[2], fields[3], fields[4])?,
                origin: parse_node_id("originId", fields[5])?,
            })
        }
        MessageKind::InitialRequest => {
            let fields: Vec<&str> = frame.split(SEP).collect();
            if fields.len() != 3 {
                return Err(WireError::FieldCount {
                    kind: kind.label(),
                    expected: 3,
                    got: fields.len(),
                });
            }
            Ok(NodeMessage::InitialRequest {
                origin: parse_node_id("originId", fields[2])?,
            })
        }
        MessageKind::Feedback => {
            let fields: Vec<&str> = frame.split(SEP).collect();
            if fields.len() != 5 {
                return Err(WireError::FieldCount {
                    kind: kind.label(),
                    expected: 5,
                    got: fields.len(),
                });
            }
            Ok(NodeMessage::Feedback {
                id: decode_id(fields[2], fields[3], fields[4])?,
            })
        }
    }
}

/// Rewrite a raw `request_and_spread` frame into its embedded `spread`
/// half, leaving every other field untouched.
///
/// The two kinds carry identical fields, so only the kind label changes.
pub fn spread_half(frame: &str) -> Result<String, WireError> {
    match classify(frame)? {
        FrameClass::Node(MessageKind::RequestAndSpread) => {}
        FrameClass::Node(kind) => return Err(WireError::UnknownKind(kind.label().to_string())),
        FrameClass::StartRound => {
            return Err(WireError::UnknownKind("start_round".to_string()))
        }
    }
    let rest = frame
        .splitn(3, SEP)
        .nth(2)
        .ok_or(WireError::FieldCount {
            kind: MessageKind::RequestAndSpread.label(),
            expected: 7,
            got: 2,
        })?;
    Ok(format!(
        "{NODE_TO_NODE};{};{rest}",
        MessageKind::Spread.label()
    ))
}

fn decode_id(subject: &str, timestamp: &str, source: &str) -> Result<MessageId, WireError> {
    let timestamp = timestamp
        .parse::<u64>()
        .map_err(|_| WireError::InvalidNumber {
            field: "timestamp",
            value: timestamp.to_string(),
        })?;
    let source = parse_node_id("sourceId", source)?;
    Ok(MessageId::new(Topic::new(subject, source), timestamp))
}

fn parse_node_id(field: &'static str, value: &str) -> Result<NodeId, WireError> {
    value.parse::<NodeId>().map_err(|_| WireError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn spread(origin: NodeId, payload: &str) -> SpreadMessage {
        SpreadMessage::new(MessageId::new(Topic::new("temp", 1), 4), origin, payload)
    }

    #[test]
    fn test_spread_frame_layout() {
        let frame = encode(&NodeMessage::Spread(spread(7, "21.5")));
        assert_eq!(frame, "node_to_node;spread;temp;4;1;7;21.5");
    }

    #[test]
    fn test_request_frame_layout() {
        let frame = encode(&NodeMessage::Request {
            id: MessageId::new(Topic::new("temp", 1), 4),
            origin: 7,
        });
        assert_eq!(frame, "node_to_node;request;temp;4;1;7");
    }

    #[test]
    fn test_feedback_frame_has_no_origin() {
        let frame = encode(&NodeMessage::Feedback {
            id: MessageId::new(Topic::new("temp", 1), 4),
        });
        assert_eq!(frame, "node_to_node;feedback;temp;4;1");
        let decoded = decode(&frame).expect("decode feedback");
        assert_eq!(
            decoded,
            NodeMessage::Feedback {
                id: MessageId::new(Topic::new("temp", 1), 4)
            }
        );
    }

    #[test]
    fn test_payload_with_separator_survives() {
        let msg = NodeMessage::Spread(spread(2, "a;b;c"));
        let decoded = decode(&encode(&msg)).expect("decode spread");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_request_and_spread_round_trip() {
        let msg = NodeMessage::RequestAndSpread(spread(3, "x"));
        assert_eq!(decode(&encode(&msg)).expect("decode"), msg);
    }

    #[test]
    fn test_initial_request_round_trip() {
        let msg = NodeMessage::InitialRequest { origin: 9 };
        assert_eq!(encode(&msg), "node_to_node;initial_request;9");
        assert_eq!(decode(&encode(&msg)).expect("decode"), msg);
    }

    #[test]
    fn test_field_count_rejected() {
        let err = decode("node_to_node;request;temp;4;1").expect_err("too few fields");
        assert_eq!(
            err,
            WireError::FieldCount {
                kind: "request",
                expected: 6,
                got: 5
            }
        );
    }

    #[test]
    fn test_non_numeric_timestamp_rejected() {
        let err = decode("node_to_node;feedback;temp;soon;1").expect_err("bad timestamp");
        assert!(matches!(
            err,
            WireError::InvalidNumber {
                field: "timestamp",
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = classify("node_to_node;gossip_about;x").expect_err("unknown kind");
        assert_eq!(err, WireError::UnknownKind("gossip_about".to_string()));
    }

    #[test]
    fn test_unknown_direction_rejected() {
        let err = classify("node_to_supervisor;spread;a;1;2;3;x").expect_err("unknown direction");
        assert_eq!(
            err,
            WireError::UnknownDirection("node_to_supervisor".to_string())
        );
    }

    #[test]
    fn test_empty_frame_rejected() {
        assert_eq!(classify("").expect_err("empty"), WireError::EmptyFrame);
    }

    #[test]
    fn test_start_round_classification() {
        assert_eq!(
            classify(START_ROUND_FRAME).expect("classify trigger"),
            FrameClass::StartRound
        );
        assert!(decode(START_ROUND_FRAME).is_err(), "trigger is not a protocol message");
    }

    #[test]
    fn test_spread_half_rewrites_kind_only() {
        let frame = encode(&NodeMessage::RequestAndSpread(spread(3, "a;b")));
        let half = spread_half(&frame).expect("synthesize spread half");
        assert_eq!(half, "node_to_node;spread;temp;4;1;3;a;b");
        assert_eq!(decode(&half).expect("decode half"), NodeMessage::Spread(spread(3, "a;b")));
    }

    #[test]
    fn test_spread_half_rejects_other_kinds() {
        let frame = encode(&NodeMessage::InitialRequest { origin: 1 });
        assert!(spread_half(&frame).is_err());
    }
}
