//! The network service: one TCP (or TLS) connection to a drive, its
//! sequence/connection-id bookkeeping, and the pending-response table.
//!
//! Grounded on `service.go`'s `networkService` — `newNetworkService` dials
//! and performs one handshake receive, `submit` stamps a header and writes
//! a frame, `listen` reads one frame and dispatches it by ack-sequence.
//! Two deliberate departures from that source, both required by the
//! contract this crate exposes:
//!
//! - `submit` inserts the pending entry *before* writing to the socket,
//!   not after, so a response can never race the insert.
//! - there is no background reader goroutine. `listen` is driven by the
//!   caller (see [`crate::blocking`]), exactly as `nonblockconnection.go`'s
//!   `Run` and `blockconnection.go`'s drive loop do it.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use prost::Message as _;

use crate::codec;
use crate::error::{KineticError, Result};
use crate::pending::{Completion, PendingTable};
use crate::status::Status;
use crate::tls::{Transport, TlsMode};
use crate::types::{Configuration, DeviceCapabilities, Limits, MessageType, Priority};

use kinetic_proto as wire;

/// Everything needed to dial and authenticate a session.
#[derive(Clone)]
pub struct SessionOptions {
    pub host: String,
    pub port: u16,
    pub identity: i64,
    pub key: Vec<u8>,
    pub tls: TlsMode,
    pub timeout: Duration,
    pub logger: Option<slog::Logger>,
}

impl SessionOptions {
    pub fn new(host: impl Into<String>, port: u16, identity: i64, key: impl Into<Vec<u8>>) -> Self {
        SessionOptions {
            host: host.into(),
            port,
            identity,
            key: key.into(),
            tls: TlsMode::Disabled,
            timeout: Duration::from_secs(20),
            logger: None,
        }
    }

    pub fn with_tls(mut self, mode: TlsMode) -> Self {
        self.tls = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_logger(mut self, logger: slog::Logger) -> Self {
        self.logger = Some(logger);
        self
    }
}

/// Header fields that move per-session, behind one logical lock.
struct StampState {
    connection_id: i64,
    cluster_version: i64,
    next_sequence: i64,
}

/// The lifetime of a single open batch. `next_id` keeps incrementing even
/// after a batch closes — batch ids are never reused within a session.
#[derive(Default)]
struct BatchSlot {
    next_id: u32,
    open: Option<OpenBatch>,
}

struct OpenBatch {
    batch_id: u32,
    count: i32,
}

/// How a caller addresses a command: HMAC covers the ordinary case, PIN
/// auth is reserved for the pin-gated operations (secure erase, erase,
/// lock, unlock).
pub enum AuthKind {
    Hmac,
    Pin(Vec<u8>),
}

/// A fully-formed outbound command, minus the header fields `submit`
/// derives itself (cluster version, connection id, sequence).
pub struct Outbound {
    pub message_type: MessageType,
    pub body: wire::Body,
    pub value: Vec<u8>,
    pub batch_id: Option<u32>,
    pub priority: Option<Priority>,
    pub timeout_ms: Option<i32>,
    pub auth: AuthKind,
}

/// One authenticated connection to a drive.
///
/// Three logical locks guard disjoint state — [`StampState`], the pending
/// table, and the batch slot — but every actual socket read or write goes
/// through `transport`, a fourth lock, because a `rustls::StreamOwned`
/// can't be split into independent read/write halves. Both `submit` and
/// `listen` hold it only for the duration of one frame's I/O.
pub struct Session {
    transport: Mutex<Transport>,
    stamp: Mutex<StampState>,
    batch: Mutex<BatchSlot>,
    pending: PendingTable,
    fatal: Mutex<Option<KineticError>>,
    identity: i64,
    key: Vec<u8>,
    capabilities: DeviceCapabilities,
    logger: slog::Logger,
}

impl Session {
    /// Dials the drive, performs the one handshake receive, and adopts the
    /// connection id, cluster version, and device capabilities it reports.
    /// Those capabilities are a snapshot: this crate does not re-adopt a
    /// mid-session capabilities update.
    pub fn connect(options: SessionOptions) -> Result<Session> {
        let logger = options
            .logger
            .clone()
            .unwrap_or_else(|| slog::Logger::root(slog::Discard, slog::o!()));

        let mut transport = crate::tls::connect(&options.host, options.port, &options.tls)?;
        transport.set_timeouts(options.timeout)?;

        let (envelope, _value) = codec::decode_frame(&mut transport).map_err(classify)?;
        let command = wire::Command::decode(envelope.command_bytes.as_slice())
            .map_err(|e| KineticError::Protocol(format!("malformed handshake command: {e}")))?;

        let header = command
            .header
            .ok_or_else(|| KineticError::Protocol("handshake frame missing header".into()))?;

        let capabilities = command
            .body
            .and_then(|b| b.get_log)
            .map(|log| DeviceCapabilities {
                configuration: log.configuration.map(Configuration::from).unwrap_or_default(),
                limits: log.limits.map(Limits::from).unwrap_or_default(),
            })
            .unwrap_or_default();

        slog::info!(logger, "kinetic handshake complete";
            "connection_id" => header.connection_id,
            "cluster_version" => header.cluster_version,
        );

        Ok(Session {
            transport: Mutex::new(transport),
            stamp: Mutex::new(StampState {
                connection_id: header.connection_id,
                cluster_version: header.cluster_version,
                next_sequence: 0,
            }),
            batch: Mutex::new(BatchSlot::default()),
            pending: PendingTable::new(),
            fatal: Mutex::new(None),
            identity: options.identity,
            key: options.key,
            capabilities,
            logger,
        })
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    pub fn logger(&self) -> &slog::Logger {
        &self.logger
    }

    /// Overrides the cluster version this session stamps onto future
    /// outbound headers, without talking to the drive. Exists so a caller
    /// can deliberately desynchronize from the drive's cluster version —
    /// see `SetClusterVersion`/local-override handling.
    pub fn set_client_cluster_version(&self, version: i64) {
        self.stamp.lock().cluster_version = version;
    }

    pub fn batch_start(&self) -> Result<u32> {
        let mut slot = self.batch.lock();
        if slot.open.is_some() {
            return Err(KineticError::Internal(
                "a batch is already open on this session; end or abort it first".into(),
            ));
        }
        let batch_id = slot.next_id;
        slot.next_id += 1;
        slot.open = Some(OpenBatch { batch_id, count: 0 });
        Ok(batch_id)
    }

    pub fn batch_increment(&self) -> Result<u32> {
        let mut slot = self.batch.lock();
        let open = slot
            .open
            .as_mut()
            .ok_or_else(|| KineticError::Internal("no batch is open on this session".into()))?;
        open.count += 1;
        Ok(open.batch_id)
    }

    pub fn batch_current(&self) -> Result<(u32, i32)> {
        let slot = self.batch.lock();
        let open = slot
            .open
            .as_ref()
            .ok_or_else(|| KineticError::Internal("no batch is open on this session".into()))?;
        Ok((open.batch_id, open.count))
    }

    pub fn batch_close(&self) {
        self.batch.lock().open = None;
    }

    /// Stamps a header onto `outbound`, signs it, registers `sink` (if
    /// any) before the frame is written, and writes the frame. Returns the
    /// sequence assigned, which the caller has no other use for (the sink
    /// alone carries the eventual result) but which integration tests
    /// find convenient for assertions.
    pub fn submit(&self, outbound: Outbound, sink: Option<Completion>) -> Result<i64> {
        if let Some(err) = self.fatal.lock().as_ref() {
            return Err(err.cheap_clone());
        }

        let (connection_id, cluster_version, sequence) = {
            let mut stamp = self.stamp.lock();
            let sequence = stamp.next_sequence;
            stamp.next_sequence += 1;
            (stamp.connection_id, stamp.cluster_version, sequence)
        };

        let header = wire::Header {
            cluster_version,
            connection_id,
            sequence,
            ack_sequence: None,
            message_type: outbound.message_type.request_proto() as i32,
            batch_id: outbound.batch_id,
            timeout: outbound.timeout_ms,
            priority: outbound.priority.unwrap_or_default().to_proto() as i32,
        };

        let command = wire::Command {
            header: Some(header),
            body: Some(outbound.body),
            status: None,
        };
        let command_bytes = command.encode_to_vec();

        let mut envelope = wire::Message {
            command_bytes,
            ..Default::default()
        };
        match &outbound.auth {
            AuthKind::Hmac => {
                envelope.set_auth_type(wire::message::AuthType::Hmacauth);
                let mac = codec::sign(&envelope.command_bytes, &self.key);
                envelope.hmac_auth = Some(wire::HmacAuth {
                    identity: self.identity,
                    hmac: mac,
                });
            }
            AuthKind::Pin(pin) => {
                envelope.set_auth_type(wire::message::AuthType::Pinauth);
                envelope.pin_auth = Some(wire::PinAuth { pin: pin.clone() });
            }
        }

        if let Some(sink) = sink {
            self.pending
                .insert(sequence, outbound.message_type.response_proto(), sink)?;
        }

        let write_result = {
            let mut transport = self.transport.lock();
            codec::encode_frame(&mut *transport, &envelope, &outbound.value)
        };

        if let Err(e) = write_result {
            return Err(self.trip_fatal(classify(e)));
        }

        Ok(sequence)
    }

    /// Delivers at most one response to its waiter. Returns immediately,
    /// without touching the socket, if nothing is outstanding. Frames
    /// that arrive unsolicited, or whose ack-sequence has no waiter
    /// (already delivered, or a stray from a previous fatal drain), are
    /// logged and skipped — `listen` keeps reading until it can deliver
    /// something or the read itself fails.
    pub fn listen(&self) -> Result<()> {
        if let Some(err) = self.fatal.lock().as_ref() {
            return Err(err.cheap_clone());
        }
        if self.pending.is_empty() {
            return Ok(());
        }

        loop {
            let frame = {
                let mut transport = self.transport.lock();
                codec::decode_frame(&mut *transport)
            };
            let (envelope, value) = match frame {
                Ok(pair) => pair,
                Err(e) => return Err(self.trip_fatal(classify(e))),
            };

            let auth_type = wire::message::AuthType::try_from(envelope.auth_type)
                .unwrap_or(wire::message::AuthType::InvalidAuthType);
            if auth_type == wire::message::AuthType::Hmacauth {
                let mac = envelope
                    .hmac_auth
                    .as_ref()
                    .map(|h| h.hmac.as_slice())
                    .unwrap_or(&[]);
                if !codec::verify(&envelope.command_bytes, &self.key, mac) {
                    return Err(self.trip_fatal(KineticError::HmacVerification));
                }
            }

            let command = match wire::Command::decode(envelope.command_bytes.as_slice()) {
                Ok(c) => c,
                Err(e) => {
                    let err = KineticError::Protocol(format!("malformed command: {e}"));
                    return Err(self.trip_fatal(err));
                }
            };

            let header = command.header.unwrap_or_default();
            let ack_sequence = match header.ack_sequence {
                Some(seq) => seq,
                None => {
                    slog::warn!(self.logger, "dropping unsolicited kinetic frame");
                    continue;
                }
            };

            let (expected_type, sink) = match self.pending.take(ack_sequence) {
                Some(pair) => pair,
                None => {
                    slog::debug!(self.logger, "no waiter for ack sequence"; "ack_sequence" => ack_sequence);
                    continue;
                }
            };

            let message_type = wire::MessageType::try_from(header.message_type)
                .unwrap_or(wire::MessageType::InvalidMessageType);
            if message_type != expected_type {
                slog::warn!(self.logger, "response message_type did not match the request";
                    "expected" => format!("{expected_type:?}"),
                    "got" => format!("{message_type:?}"),
                );
            }

            let status = command
                .status
                .as_ref()
                .map(Status::from_proto)
                .unwrap_or_else(Status::ok);
            let body = command.body.unwrap_or_default();
            sink(crate::pending::CompletionResult::Response { status, body, value });
            return Ok(());
        }
    }

    /// Idempotent. The first call tears down the transport and drains the
    /// pending table with [`KineticError::Shutdown`]; later calls observe
    /// the latch already set and just re-attempt the (harmless) socket
    /// shutdown.
    pub fn close(&self) {
        {
            let mut fatal = self.fatal.lock();
            if fatal.is_none() {
                *fatal = Some(KineticError::Shutdown);
                self.pending.drain_all(&KineticError::Shutdown);
                slog::info!(self.logger, "kinetic session closed");
            }
        }
        let transport = self.transport.lock();
        let _ = transport.shutdown();
    }

    fn trip_fatal(&self, err: KineticError) -> KineticError {
        let mut fatal = self.fatal.lock();
        if fatal.is_none() {
            slog::error!(self.logger, "kinetic session poisoned"; "cause" => %err);
            self.pending.drain_all(&err);
            *fatal = Some(err);
        }
        fatal.as_ref().unwrap().cheap_clone()
    }
}

/// Reclassifies a read/write timeout as [`KineticError::Timeout`] rather
/// than a generic i/o error.
fn classify(err: KineticError) -> KineticError {
    if let KineticError::Io(io_err) = &err {
        if matches!(io_err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) {
            return KineticError::Timeout;
        }
    }
    err
}

/// Shared by `Session` and anything else that wants an `Arc<Session>`.
pub type SharedSession = Arc<Session>;
