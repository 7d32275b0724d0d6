//! Append-only notifications for off-chain indexers
use serde::Serialize;

use crate::{clock::Timestamp, ledger::VoteId, oracle::RequestId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    VoteSubmitted {
        vote_id: VoteId,
        timestamp: Timestamp,
    },
    DecryptionRequested {
        vote_id: VoteId,
        request_id: RequestId,
    },
    VoteDecrypted {
        vote_id: VoteId,
    },
    TallyDecryptionRequested {
        candidate: String,
        request_id: RequestId,
    },
    TallyDecrypted {
        candidate: String,
        count: u64,
    },
    RequestExpired {
        request_id: RequestId,
    },
}

#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        return Self::default();
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn all(&self) -> &[Event] {
        return &self.events;
    }

    /// Events appended after the first `cursor` events. An indexer keeps `len()` as its next
    /// cursor.
    pub fn since(&self, cursor: usize) -> &[Event] {
        return self.events.get(cursor..).unwrap_or(&[]);
    }

    pub fn len(&self) -> usize {
        return self.events.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.events.is_empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since_cursor() {
        let mut log = EventLog::new();
        log.emit(Event::VoteSubmitted {
            vote_id: 1,
            timestamp: 5,
        });
        let cursor = log.len();
        log.emit(Event::VoteDecrypted { vote_id: 1 });

        assert_eq!(log.since(cursor), [Event::VoteDecrypted { vote_id: 1 }]);
        assert!(log.since(2).is_empty());
        assert!(log.since(10).is_empty());
        assert_eq!(log.all().len(), 2);
    }

    #[test]
    fn test_json_shape() {
        let event = Event::DecryptionRequested {
            vote_id: 3,
            request_id: RequestId::new(77),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"event":"decryption_requested","vote_id":3,"request_id":77}"#
        );
    }
}
