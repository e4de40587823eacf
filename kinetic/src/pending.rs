//! Sequence-number to completion-sink correlation table.

use std::collections::HashMap;
use std::sync::mpsc;

use parking_lot::Mutex;

use crate::error::KineticError;
use kinetic_proto as wire;

/// One half of a one-shot channel: whatever a completed request's sink
/// resolves to. Boxed because each operation kind carries a different
/// success payload (see the callback-flattening design note).
pub type Completion = Box<dyn FnOnce(CompletionResult) + Send>;

#[derive(Debug)]
pub enum CompletionResult {
    Response {
        status: crate::status::Status,
        body: kinetic_proto::Body,
        value: Vec<u8>,
    },
    Fatal(KineticError),
}

/// A single-use slot a waiter can poll or block on.
pub struct Sink<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> Sink<T> {
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }
}

pub fn one_shot<T>() -> (mpsc::Sender<T>, Sink<T>) {
    let (tx, rx) = mpsc::channel();
    (tx, Sink { rx })
}

/// Maps in-flight sequence numbers to the completion callback awaiting
/// that sequence's response. Insertion happens before the frame carrying
/// that sequence is written to the wire, since a response can race the
/// write's return.
#[derive(Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<i64, (wire::MessageType, Completion)>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a completion for `sequence`, tagged with the wire response
    /// type the request that owns it expects back. Returns an internal
    /// error if the sequence was already pending — sequences are never
    /// reused within a session, so this indicates a bug in sequence
    /// assignment.
    pub fn insert(
        &self,
        sequence: i64,
        expected: wire::MessageType,
        sink: Completion,
    ) -> Result<(), KineticError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&sequence) {
            return Err(KineticError::Internal(format!(
                "sequence {sequence} is already pending"
            )));
        }
        entries.insert(sequence, (expected, sink));
        Ok(())
    }

    pub fn take(&self, sequence: i64) -> Option<(wire::MessageType, Completion)> {
        self.entries.lock().remove(&sequence)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Removes every pending entry and completes each with `err`. Used
    /// when the session transitions to the fatal/poisoned state.
    pub fn drain_all(&self, err: &KineticError) {
        let drained: Vec<Completion> = {
            let mut entries = self.entries.lock();
            entries.drain().map(|(_, (_, sink))| sink).collect()
        };
        for sink in drained {
            sink(CompletionResult::Fatal(err.cheap_clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_take_round_trips() {
        let table = PendingTable::new();
        let (tx, sink) = one_shot::<i32>();
        table
            .insert(
                1,
                wire::MessageType::NoopResponse,
                Box::new(move |_| {
                    tx.send(42).ok();
                }),
            )
            .unwrap();
        assert_eq!(table.len(), 1);
        let (expected, completion) = table.take(1).unwrap();
        assert_eq!(expected, wire::MessageType::NoopResponse);
        completion(CompletionResult::Fatal(KineticError::Poisoned));
        assert_eq!(sink.recv(), Some(42));
        assert!(table.is_empty());
    }

    #[test]
    fn duplicate_sequence_is_rejected() {
        let table = PendingTable::new();
        table
            .insert(1, wire::MessageType::NoopResponse, Box::new(|_| {}))
            .unwrap();
        let err = table
            .insert(1, wire::MessageType::NoopResponse, Box::new(|_| {}))
            .unwrap_err();
        assert!(matches!(err, KineticError::Internal(_)));
    }

    #[test]
    fn drain_all_completes_every_waiter_with_the_given_error() {
        let table = PendingTable::new();
        let (tx1, sink1) = one_shot::<bool>();
        let (tx2, sink2) = one_shot::<bool>();
        table
            .insert(1, wire::MessageType::NoopResponse, Box::new(move |_| { tx1.send(true).ok(); }))
            .unwrap();
        table
            .insert(2, wire::MessageType::NoopResponse, Box::new(move |_| { tx2.send(true).ok(); }))
            .unwrap();

        table.drain_all(&KineticError::Poisoned);

        assert_eq!(sink1.recv(), Some(true));
        assert_eq!(sink2.recv(), Some(true));
        assert!(table.is_empty());
    }
}
