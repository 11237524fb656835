use serde::{Deserialize, Serialize};

/// Event type counted by the move-cadence check.
pub const MOVE_EVENT: &str = "move";

/// Largest datagram either side will read.
pub const MAX_PACKET_SIZE: usize = 65_507;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Submit(SubmissionAttempt),
    ListTop {
        limit: Option<u32>,
    },
    Ping,

    Accepted {
        id: u64,
    },
    Rejected {
        reason: String,
        detail: Option<String>,
        diagnostics: Option<Diagnostics>,
        retryable: bool,
    },
    Leaderboard {
        entries: Vec<LeaderboardEntry>,
    },
    Pong,
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// A game run as claimed by the client.
///
/// Every field is optional on the wire: a missing or non-numeric value is
/// something the server has to reject with a reason, not a decode failure.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SubmissionAttempt {
    pub name: Option<String>,
    pub claimed_score: Option<f64>,
    pub run_ms: Option<f64>,
    pub events: Option<Vec<TraceEntry>>,
}

impl SubmissionAttempt {
    pub fn new(name: &str, claimed_score: f64, run_ms: f64, events: Vec<Event>) -> Self {
        Self {
            name: Some(name.to_string()),
            claimed_score: Some(claimed_score),
            run_ms: Some(run_ms),
            events: Some(events.into_iter().map(TraceEntry::Event).collect()),
        }
    }

    /// Number of entries in the trace, 0 when no trace was sent.
    pub fn events_count(&self) -> usize {
        self.events.as_ref().map_or(0, Vec::len)
    }
}

/// One slot of a trace. Clients that send something other than a structured
/// event in a slot are represented by `Malformed`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum TraceEntry {
    Event(Event),
    Malformed,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    /// Milliseconds since the start of the run.
    pub t: Option<f64>,
    pub kind: String,
}

impl Event {
    pub fn new(t: f64, kind: &str) -> Self {
        Self {
            t: Some(t),
            kind: kind.to_string(),
        }
    }

    pub fn movement(t: f64) -> Self {
        Self::new(t, MOVE_EVENT)
    }

    pub fn is_move(&self, move_kind: &str) -> bool {
        self.kind == move_kind
    }
}

/// Numbers describing the plausibility model for one run.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct Diagnostics {
    pub moves_per_second: f64,
    pub max_entities: u64,
    pub max_possible_score: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: i64,
    pub run_ms: i64,
    /// Admission time in milliseconds since the Unix epoch.
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_submission_creation() {
        let attempt = SubmissionAttempt::new("Al", 10.0, 5000.0, vec![Event::movement(0.0)]);

        assert_eq!(attempt.name.as_deref(), Some("Al"));
        assert_eq!(attempt.claimed_score, Some(10.0));
        assert_eq!(attempt.run_ms, Some(5000.0));
        assert_eq!(attempt.events_count(), 1);
    }

    #[test]
    fn test_events_count_without_trace() {
        let attempt = SubmissionAttempt::default();
        assert_eq!(attempt.events_count(), 0);
    }

    #[test]
    fn test_event_is_move() {
        assert!(Event::movement(5.0).is_move(MOVE_EVENT));
        assert!(!Event::new(5.0, "jump").is_move(MOVE_EVENT));
        assert!(!Event::new(5.0, "Move").is_move(MOVE_EVENT));
    }

    #[test]
    fn test_packet_serialization_submit() {
        let mut attempt = SubmissionAttempt::new(
            "runner",
            42.0,
            1500.0,
            vec![Event::movement(10.0), Event::new(20.0, "jump")],
        );
        if let Some(events) = attempt.events.as_mut() {
            events.push(TraceEntry::Malformed);
        }

        let packet = Packet::Submit(attempt.clone());
        let deserialized = Packet::decode(&packet.encode().unwrap()).unwrap();

        match deserialized {
            Packet::Submit(decoded) => {
                assert_eq!(decoded, attempt);
                assert_eq!(decoded.events_count(), 3);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_partial_submit() {
        let attempt = SubmissionAttempt {
            name: None,
            claimed_score: Some(f64::NAN),
            run_ms: None,
            events: None,
        };

        let packet = Packet::Submit(attempt);
        let deserialized = Packet::decode(&packet.encode().unwrap()).unwrap();

        match deserialized {
            Packet::Submit(decoded) => {
                assert!(decoded.name.is_none());
                assert!(decoded.claimed_score.unwrap().is_nan());
                assert!(decoded.run_ms.is_none());
                assert!(decoded.events.is_none());
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_rejected() {
        let packet = Packet::Rejected {
            reason: "plausibility_failed".to_string(),
            detail: Some("score implausible".to_string()),
            diagnostics: Some(Diagnostics {
                moves_per_second: 0.2,
                max_entities: 25,
                max_possible_score: 125,
            }),
            retryable: false,
        };

        let deserialized = Packet::decode(&packet.encode().unwrap()).unwrap();

        match deserialized {
            Packet::Rejected {
                reason,
                detail,
                diagnostics,
                retryable,
            } => {
                assert_eq!(reason, "plausibility_failed");
                assert_eq!(detail.as_deref(), Some("score implausible"));
                let diagnostics = diagnostics.unwrap();
                assert_approx_eq!(diagnostics.moves_per_second, 0.2, 1e-9);
                assert_eq!(diagnostics.max_possible_score, 125);
                assert!(!retryable);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(Packet::decode(&[0xff, 0xff, 0xff, 0xff, 0x01]).is_err());
        assert!(Packet::decode(&[]).is_err());
    }
}
