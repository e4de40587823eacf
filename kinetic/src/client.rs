//! The nonblocking client: one method per wire operation, each building a
//! `Command` and handing it to [`Session::submit`]. None of these block —
//! each returns a [`Handle`] the caller polls (directly, or through
//! [`crate::blocking::BlockingClient`], which drives `Session::listen` on
//! its behalf).
//!
//! Grounded on `nonblockconnection.go`'s per-operation methods, each of
//! which builds a `Message`+`Command` and calls `service.submit`. Where
//! the original used a distinct callback type per operation, this crate
//! uses one generic completion (see [`Handle`]) parameterized by the
//! success payload, selected per call site by a small parse closure.

use std::sync::Arc;

use kinetic_proto as wire;

use crate::error::Result;
use crate::pending::{self, CompletionResult};
use crate::session::{AuthKind, Outbound, Session};
use crate::status::Status;
use crate::types::{
    Acl, Algorithm, Capacity, GetLogResult, Identity, KeyRange, LogType, MessageType,
    P2POperationItem, P2PPush, P2PStatus, PinOpType, PowerLevel, Priority, Record, Scope,
    Statistics, Synchronization, Temperature, Utilization,
};

/// What a submitted operation eventually resolves to: the typed success
/// payload, a remote failure status, or the session's fatal cause if it
/// was poisoned before (or while) this operation was outstanding.
pub enum Outcome<T> {
    Success(T),
    Failure(Status),
    Fatal(crate::error::KineticError),
}

/// A single-use handle to an operation's eventual outcome. Polling it
/// never itself touches the network — pair it with `Session::listen`
/// (directly, or via [`crate::blocking::BlockingClient`]).
pub struct Handle<T> {
    sink: pending::Sink<Outcome<T>>,
}

impl<T> Handle<T> {
    pub fn try_recv(&self) -> Option<Outcome<T>> {
        self.sink.try_recv()
    }

    pub fn recv(&self) -> Option<Outcome<T>> {
        self.sink.recv()
    }
}

fn make_sink<T, F>(parse: F) -> (pending::Completion, Handle<T>)
where
    T: Send + 'static,
    F: FnOnce(wire::Body, Vec<u8>) -> T + Send + 'static,
{
    let (tx, sink) = pending::one_shot::<Outcome<T>>();
    let completion: pending::Completion = Box::new(move |result| {
        let outcome = match result {
            CompletionResult::Response { status, body, value } => {
                if status.is_ok() {
                    Outcome::Success(parse(body, value))
                } else {
                    Outcome::Failure(status)
                }
            }
            CompletionResult::Fatal(err) => Outcome::Fatal(err),
        };
        let _ = tx.send(outcome);
    });
    (completion, Handle { sink })
}

#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub done_sequences: Vec<i64>,
    pub first_failed_sequence: i64,
}

fn key_value_to_proto(record: &Record) -> wire::KeyValue {
    wire::KeyValue {
        key: record.key.clone(),
        new_version: record.new_version.clone(),
        db_version: record.version.clone(),
        tag: record.tag.clone(),
        algorithm: record
            .algorithm
            .map(Algorithm::to_proto)
            .unwrap_or(wire::Algorithm::InvalidAlgorithm) as i32,
        synchronization: record.synchronization.to_proto() as i32,
        force: record.force,
        metadata_only: record.metadata_only,
    }
}

fn record_from_proto(body: wire::Body, value: Vec<u8>) -> Record {
    let kv = body.key_value.unwrap_or_default();
    Record {
        key: kv.key,
        value,
        version: kv.db_version,
        new_version: kv.new_version,
        tag: kv.tag,
        algorithm: Algorithm::from_proto(
            wire::Algorithm::try_from(kv.algorithm).unwrap_or(wire::Algorithm::InvalidAlgorithm),
        ),
        synchronization: Synchronization::from_proto(
            wire::Synchronization::try_from(kv.synchronization)
                .unwrap_or(wire::Synchronization::InvalidSynchronization),
        )
        .unwrap_or_default(),
        force: kv.force,
        metadata_only: kv.metadata_only,
    }
}

fn range_to_proto(range: &KeyRange) -> wire::Range {
    wire::Range {
        start_key: range.start_key.clone(),
        end_key: range.end_key.clone(),
        start_key_inclusive: range.start_key_inclusive,
        end_key_inclusive: range.end_key_inclusive,
        max_returned: range.max_returned,
        reverse: range.reverse,
        keys: Vec::new(),
    }
}

fn p2p_item_to_proto(item: &P2POperationItem) -> wire::P2POperationItem {
    wire::P2POperationItem {
        key: item.key.clone(),
        version: item.version.clone(),
        new_key: item.new_key.clone(),
        force: item.force,
        p2p_operation: item.nested_push.as_deref().map(|p| Box::new(p2p_push_to_proto(p))),
    }
}

fn p2p_push_to_proto(push: &P2PPush) -> wire::P2POperation {
    wire::P2POperation {
        peer_host: push.peer_host.clone(),
        peer_port: push.peer_port,
        peer_tls: push.peer_tls,
        operation: push.operations.iter().map(p2p_item_to_proto).collect(),
        status: Vec::new(),
        all_operations_succeeded: false,
    }
}

fn p2p_status_from_proto(op: wire::P2POperation) -> P2PStatus {
    P2PStatus {
        all_operations_succeeded: op.all_operations_succeeded,
        per_operation: op.status.iter().map(Status::from_proto).collect(),
    }
}

fn acl_to_proto(acl: &Acl) -> wire::ACL {
    wire::ACL {
        identities: acl.identities.iter().map(identity_to_proto).collect(),
    }
}

fn identity_to_proto(identity: &Identity) -> wire::Identity {
    wire::Identity {
        identity: identity.identity,
        key: identity.key.clone(),
        hmac_algorithm: identity
            .hmac_algorithm
            .map(crate::types::AclAlgorithm::to_proto)
            .unwrap_or(wire::HmacAlgorithm::InvalidHmacAlgorithm) as i32,
        scope: identity.scopes.iter().map(scope_to_proto).collect(),
        max_priority: identity.max_priority.unwrap_or_default().to_proto() as i32,
    }
}

fn scope_to_proto(scope: &Scope) -> wire::Scope {
    wire::Scope {
        offset: scope.offset,
        value: scope.value.clone(),
        permission: scope
            .permissions
            .iter()
            .map(|p| p.to_proto() as i32)
            .collect(),
        tls_required: scope.tls_required,
    }
}

/// Wraps a shared [`Session`] with one method per wire operation.
#[derive(Clone)]
pub struct NonblockingClient {
    session: Arc<Session>,
}

impl NonblockingClient {
    pub fn new(session: Arc<Session>) -> Self {
        NonblockingClient { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn no_op(&self) -> Result<Handle<()>> {
        let (completion, handle) = make_sink(|_, _| ());
        self.submit(MessageType::NoOp, wire::Body::default(), Vec::new(), None, Some(completion))?;
        Ok(handle)
    }

    pub fn get(&self, key: Vec<u8>) -> Result<Handle<Record>> {
        self.get_kind(key, MessageType::Get)
    }

    pub fn get_next(&self, key: Vec<u8>) -> Result<Handle<Record>> {
        self.get_kind(key, MessageType::GetNext)
    }

    pub fn get_previous(&self, key: Vec<u8>) -> Result<Handle<Record>> {
        self.get_kind(key, MessageType::GetPrevious)
    }

    fn get_kind(&self, key: Vec<u8>, message_type: MessageType) -> Result<Handle<Record>> {
        let (completion, handle) = make_sink(record_from_proto);
        let body = wire::Body {
            key_value: Some(wire::KeyValue {
                key,
                ..Default::default()
            }),
            ..Default::default()
        };
        self.submit(message_type, body, Vec::new(), None, Some(completion))?;
        Ok(handle)
    }

    pub fn get_version(&self, key: Vec<u8>) -> Result<Handle<Vec<u8>>> {
        let (completion, handle) = make_sink(|body, _| {
            body.key_value.map(|kv| kv.db_version).unwrap_or_default()
        });
        let body = wire::Body {
            key_value: Some(wire::KeyValue {
                key,
                ..Default::default()
            }),
            ..Default::default()
        };
        self.submit(MessageType::GetVersion, body, Vec::new(), None, Some(completion))?;
        Ok(handle)
    }

    pub fn get_key_range(&self, range: &KeyRange) -> Result<Handle<Vec<Vec<u8>>>> {
        let (completion, handle) = make_sink(|body, _| body.range.map(|r| r.keys).unwrap_or_default());
        let body = wire::Body {
            range: Some(range_to_proto(range)),
            ..Default::default()
        };
        self.submit(MessageType::GetKeyRange, body, Vec::new(), None, Some(completion))?;
        Ok(handle)
    }

    pub fn put(&self, record: &Record) -> Result<Handle<()>> {
        let (completion, handle) = make_sink(|_, _| ());
        let body = wire::Body {
            key_value: Some(key_value_to_proto(record)),
            ..Default::default()
        };
        self.submit(MessageType::Put, body, record.value.clone(), None, Some(completion))?;
        Ok(handle)
    }

    pub fn delete(&self, record: &Record) -> Result<Handle<()>> {
        let (completion, handle) = make_sink(|_, _| ());
        let body = wire::Body {
            key_value: Some(key_value_to_proto(record)),
            ..Default::default()
        };
        self.submit(MessageType::Delete, body, Vec::new(), None, Some(completion))?;
        Ok(handle)
    }

    pub fn flush(&self) -> Result<Handle<()>> {
        let (completion, handle) = make_sink(|_, _| ());
        self.submit(MessageType::FlushAllData, wire::Body::default(), Vec::new(), None, Some(completion))?;
        Ok(handle)
    }

    /// Opens a new batch and returns its id alongside a handle for the
    /// `START_BATCH` acknowledgement. Fails without touching the network
    /// if a batch is already open on this session.
    pub fn batch_start(&self) -> Result<(u32, Handle<()>)> {
        let batch_id = self.session.batch_start()?;
        let (completion, handle) = make_sink(|_, _| ());
        match self.submit(MessageType::StartBatch, wire::Body::default(), Vec::new(), Some(batch_id), Some(completion)) {
            Ok(()) => Ok((batch_id, handle)),
            Err(e) => {
                self.session.batch_close();
                Err(e)
            }
        }
    }

    /// Adds a put to the open batch. There is no per-operation waiter —
    /// the batch is acknowledged as a whole by `batch_end`.
    pub fn batch_put(&self, record: &Record) -> Result<()> {
        let batch_id = self.session.batch_increment()?;
        let body = wire::Body {
            key_value: Some(key_value_to_proto(record)),
            ..Default::default()
        };
        self.submit(MessageType::Put, body, record.value.clone(), Some(batch_id), None)
    }

    /// Adds a delete to the open batch; see [`Self::batch_put`].
    pub fn batch_delete(&self, record: &Record) -> Result<()> {
        let batch_id = self.session.batch_increment()?;
        let body = wire::Body {
            key_value: Some(key_value_to_proto(record)),
            ..Default::default()
        };
        self.submit(MessageType::Delete, body, Vec::new(), Some(batch_id), None)
    }

    /// Closes the open batch and returns the sequences the drive
    /// committed, plus the first sequence that failed (if any). The
    /// session's batch slot is freed whether or not the submit itself
    /// succeeds.
    pub fn batch_end(&self) -> Result<Handle<BatchResult>> {
        let (batch_id, count) = self.session.batch_current()?;
        let (completion, handle) = make_sink(|body, _| {
            let batch = body.batch.unwrap_or_default();
            BatchResult {
                done_sequences: batch.done_sequence,
                first_failed_sequence: batch.first_failed_sequence,
            }
        });
        let body = wire::Body {
            batch: Some(wire::Batch {
                batch_id,
                count,
                done_sequence: Vec::new(),
                first_failed_sequence: 0,
            }),
            ..Default::default()
        };
        let result = self.submit(MessageType::EndBatch, body, Vec::new(), Some(batch_id), Some(completion));
        self.session.batch_close();
        result?;
        Ok(handle)
    }

    /// Aborts the open batch; any puts/deletes already sent against it
    /// become no-ops on the drive.
    pub fn batch_abort(&self) -> Result<Handle<()>> {
        let (batch_id, _count) = self.session.batch_current()?;
        let (completion, handle) = make_sink(|_, _| ());
        let result = self.submit(MessageType::AbortBatch, wire::Body::default(), Vec::new(), Some(batch_id), Some(completion));
        self.session.batch_close();
        result?;
        Ok(handle)
    }

    pub fn p2p_push(&self, push: &P2PPush) -> Result<Handle<P2PStatus>> {
        let (completion, handle) = make_sink(|body, _| {
            p2p_status_from_proto(body.p2p_operation.unwrap_or_default())
        });
        let body = wire::Body {
            p2p_operation: Some(p2p_push_to_proto(push)),
            ..Default::default()
        };
        self.submit(MessageType::Peer2PeerPush, body, Vec::new(), None, Some(completion))?;
        Ok(handle)
    }

    pub fn get_log(&self, types: &[LogType]) -> Result<Handle<GetLogResult>> {
        let (completion, handle) = make_sink(|body, _| {
            let log = body.get_log.unwrap_or_default();
            GetLogResult {
                utilizations: log
                    .utilizations
                    .into_iter()
                    .map(|u| Utilization { name: u.name, value: u.value })
                    .collect(),
                temperatures: log
                    .temperatures
                    .into_iter()
                    .map(|t| Temperature {
                        name: t.name,
                        current: t.current,
                        minimum: t.minimum,
                        maximum: t.maximum,
                        target: t.target,
                    })
                    .collect(),
                capacity: log.capacity.map(|c| Capacity {
                    nominal_capacity_in_bytes: c.nominal_capacity_in_bytes,
                    portion_full: c.portion_full,
                }),
                configuration: log.configuration.map(Into::into),
                statistics: log
                    .statistics
                    .into_iter()
                    .map(|s| Statistics {
                        message_type: wire::MessageType::try_from(s.message_type)
                            .ok()
                            .and_then(MessageType::from_proto),
                        count: s.count,
                        bytes: s.bytes,
                    })
                    .collect(),
                messages: log.messages,
                limits: log.limits.map(Into::into),
                device: log.device,
            }
        });
        let body = wire::Body {
            get_log: Some(wire::GetLog {
                types: types.iter().map(|t| t.to_proto() as i32).collect(),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.submit(MessageType::GetLog, body, Vec::new(), None, Some(completion))?;
        Ok(handle)
    }

    pub fn secure_erase(&self, pin: Vec<u8>) -> Result<Handle<()>> {
        self.pin_op(pin, PinOpType::SecureErase)
    }

    pub fn instant_erase(&self, pin: Vec<u8>) -> Result<Handle<()>> {
        self.pin_op(pin, PinOpType::Erase)
    }

    pub fn lock_device(&self, pin: Vec<u8>) -> Result<Handle<()>> {
        self.pin_op(pin, PinOpType::Lock)
    }

    pub fn unlock_device(&self, pin: Vec<u8>) -> Result<Handle<()>> {
        self.pin_op(pin, PinOpType::Unlock)
    }

    fn pin_op(&self, pin: Vec<u8>, op: PinOpType) -> Result<Handle<()>> {
        let (completion, handle) = make_sink(|_, _| ());
        let body = wire::Body {
            pin_op: Some(wire::PinOperation {
                pin_op_type: op.to_proto() as i32,
            }),
            ..Default::default()
        };
        self.submit_with_auth(MessageType::PinOp, body, Vec::new(), None, Some(completion), AuthKind::Pin(pin))?;
        Ok(handle)
    }

    pub fn download_firmware(&self, image: Vec<u8>) -> Result<Handle<()>> {
        let (completion, handle) = make_sink(|_, _| ());
        let body = wire::Body {
            setup: Some(wire::Setup {
                firmware_download: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        self.submit(MessageType::Setup, body, image, None, Some(completion))?;
        Ok(handle)
    }

    pub fn set_cluster_version(&self, new_version: i64) -> Result<Handle<()>> {
        let (completion, handle) = make_sink(|_, _| ());
        let body = wire::Body {
            setup: Some(wire::Setup {
                new_cluster_version: new_version,
                ..Default::default()
            }),
            ..Default::default()
        };
        self.submit(MessageType::Setup, body, Vec::new(), None, Some(completion))?;
        Ok(handle)
    }

    /// Overrides the cluster version this client stamps on its own
    /// outbound headers from now on, without contacting the drive.
    pub fn set_client_cluster_version(&self, version: i64) {
        self.session.set_client_cluster_version(version);
    }

    pub fn set_acl(&self, acl: &Acl) -> Result<Handle<()>> {
        let (completion, handle) = make_sink(|_, _| ());
        let body = wire::Body {
            security: Some(wire::Security {
                acl: Some(acl_to_proto(acl)),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.submit(MessageType::Security, body, Vec::new(), None, Some(completion))?;
        Ok(handle)
    }

    pub fn set_lock_pin(&self, old_pin: Vec<u8>, new_pin: Vec<u8>) -> Result<Handle<()>> {
        let (completion, handle) = make_sink(|_, _| ());
        let body = wire::Body {
            security: Some(wire::Security {
                old_lock_pin: old_pin,
                new_lock_pin: new_pin,
                ..Default::default()
            }),
            ..Default::default()
        };
        self.submit(MessageType::Security, body, Vec::new(), None, Some(completion))?;
        Ok(handle)
    }

    pub fn set_erase_pin(&self, old_pin: Vec<u8>, new_pin: Vec<u8>) -> Result<Handle<()>> {
        let (completion, handle) = make_sink(|_, _| ());
        let body = wire::Body {
            security: Some(wire::Security {
                old_erase_pin: old_pin,
                new_erase_pin: new_pin,
                ..Default::default()
            }),
            ..Default::default()
        };
        self.submit(MessageType::Security, body, Vec::new(), None, Some(completion))?;
        Ok(handle)
    }

    pub fn media_scan(&self, range: &KeyRange, priority: Priority) -> Result<Handle<()>> {
        self.media_op(range, priority, MessageType::MediaScan)
    }

    pub fn media_optimize(&self, range: &KeyRange, priority: Priority) -> Result<Handle<()>> {
        self.media_op(range, priority, MessageType::MediaOptimize)
    }

    fn media_op(&self, range: &KeyRange, priority: Priority, message_type: MessageType) -> Result<Handle<()>> {
        let (completion, handle) = make_sink(|_, _| ());
        let body = wire::Body {
            range: Some(range_to_proto(range)),
            ..Default::default()
        };
        let outbound = Outbound {
            message_type,
            body,
            value: Vec::new(),
            batch_id: None,
            priority: Some(priority),
            timeout_ms: None,
            auth: AuthKind::Hmac,
        };
        self.session.submit(outbound, Some(completion))?;
        Ok(handle)
    }

    pub fn set_power_level(&self, level: PowerLevel) -> Result<Handle<()>> {
        let (completion, handle) = make_sink(|_, _| ());
        let body = wire::Body {
            power_level: level.to_proto() as i32,
            ..Default::default()
        };
        self.submit(MessageType::SetPowerLevel, body, Vec::new(), None, Some(completion))?;
        Ok(handle)
    }

    fn submit(
        &self,
        message_type: MessageType,
        body: wire::Body,
        value: Vec<u8>,
        batch_id: Option<u32>,
        completion: Option<pending::Completion>,
    ) -> Result<()> {
        self.submit_with_auth(message_type, body, value, batch_id, completion, AuthKind::Hmac)
    }

    fn submit_with_auth(
        &self,
        message_type: MessageType,
        body: wire::Body,
        value: Vec<u8>,
        batch_id: Option<u32>,
        completion: Option<pending::Completion>,
        auth: AuthKind,
    ) -> Result<()> {
        let outbound = Outbound {
            message_type,
            body,
            value,
            batch_id,
            priority: None,
            timeout_ms: None,
            auth,
        };
        self.session.submit(outbound, completion)?;
        Ok(())
    }
}
