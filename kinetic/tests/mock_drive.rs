//! End-to-end tests against an in-process mock drive: a loopback
//! `TcpListener` thread speaking just enough of the wire protocol to
//! answer a handshake, NoOp, Put/Get/Delete, a ranged read, a batch
//! commit, and a mid-flight close. Exercises the real codec and session
//! code — no mocked transport trait, the same `TcpStream` path
//! production traffic takes. Implements the six seed scenarios.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use prost::Message as _;

use kinetic::blocking::BlockingClient;
use kinetic::codec;
use kinetic::session::{Session, SessionOptions};
use kinetic::status::StatusCode;
use kinetic::types::{KeyRange, Record, Synchronization};

use kinetic_proto as wire;

const TEST_IDENTITY: i64 = 1;
const TEST_KEY: &[u8] = b"asdfasdf";

/// Starts the mock drive on a loopback socket and returns its address.
/// `close_after` makes the drive stop responding (and close the socket)
/// after that many requests have been read, for the fatal-teardown test.
fn spawn_mock_drive(close_after: Option<usize>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
    let addr = listener.local_addr().expect("local addr");
    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            run_mock_drive(stream, close_after);
        }
    });
    addr
}

fn send_response(
    stream: &mut TcpStream,
    connection_id: i64,
    cluster_version: i64,
    ack_sequence: i64,
    message_type: wire::MessageType,
    status_code: wire::StatusCode,
    expected_cluster_version: i64,
    body: Option<wire::Body>,
    value: Vec<u8>,
) -> std::io::Result<()> {
    let command = wire::Command {
        header: Some(wire::Header {
            cluster_version,
            connection_id,
            sequence: 0,
            ack_sequence: Some(ack_sequence),
            message_type: message_type as i32,
            batch_id: None,
            timeout: None,
            priority: wire::Priority::Normal as i32,
        }),
        body,
        status: Some(wire::Status {
            code: status_code as i32,
            status_message: String::new(),
            expected_cluster_version,
        }),
    };
    let command_bytes = command.encode_to_vec();
    let mut envelope = wire::Message {
        command_bytes,
        ..Default::default()
    };
    envelope.set_auth_type(wire::message::AuthType::Hmacauth);
    let mac = codec::sign(&envelope.command_bytes, TEST_KEY);
    envelope.hmac_auth = Some(wire::HmacAuth {
        identity: TEST_IDENTITY,
        hmac: mac,
    });
    codec::encode_frame(stream, &envelope, &value).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::Other, "failed to encode mock response")
    })
}

fn run_mock_drive(mut stream: TcpStream, close_after: Option<usize>) {
    const CONNECTION_ID: i64 = 42;

    let mut cluster_version: i64 = 0;
    let mut store: HashMap<Vec<u8>, (Vec<u8>, Vec<u8>)> = HashMap::new();
    let mut batch_sequences: HashMap<u32, Vec<i64>> = HashMap::new();

    // Handshake: an unsolicited status frame carrying the connection id
    // and a best-effort device-capabilities snapshot.
    let handshake = wire::Command {
        header: Some(wire::Header {
            cluster_version,
            connection_id: CONNECTION_ID,
            sequence: 0,
            ack_sequence: None,
            message_type: wire::MessageType::InvalidMessageType as i32,
            batch_id: None,
            timeout: None,
            priority: wire::Priority::Normal as i32,
        }),
        body: Some(wire::Body {
            get_log: Some(wire::GetLog {
                limits: Some(wire::Limits {
                    max_key_size: 128,
                    max_value_size: 1 << 20,
                    ..Default::default()
                }),
                configuration: Some(wire::Configuration {
                    vendor: "mock".into(),
                    model: "mock-drive".into(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: Some(wire::Status {
            code: wire::StatusCode::Success as i32,
            status_message: String::new(),
            expected_cluster_version: 0,
        }),
    };
    let mut handshake_envelope = wire::Message {
        command_bytes: handshake.encode_to_vec(),
        ..Default::default()
    };
    handshake_envelope.set_auth_type(wire::message::AuthType::Unsolicitedstatus);
    if codec::encode_frame(&mut stream, &handshake_envelope, &[]).is_err() {
        return;
    }

    let mut requests_seen = 0usize;

    loop {
        let (envelope, value) = match codec::decode_frame(&mut stream) {
            Ok(pair) => pair,
            Err(_) => return,
        };
        requests_seen += 1;
        if let Some(limit) = close_after {
            if requests_seen > limit {
                return;
            }
        }

        let command = match wire::Command::decode(envelope.command_bytes.as_slice()) {
            Ok(c) => c,
            Err(_) => return,
        };
        let header = command.header.clone().unwrap_or_default();
        let message_type = wire::MessageType::try_from(header.message_type)
            .unwrap_or(wire::MessageType::InvalidMessageType);

        let needs_version_check = matches!(
            message_type,
            wire::MessageType::Get
                | wire::MessageType::Getnext
                | wire::MessageType::Getprevious
                | wire::MessageType::Getkeyrange
                | wire::MessageType::Getversion
                | wire::MessageType::Put
                | wire::MessageType::Delete
        );
        if needs_version_check && header.cluster_version != cluster_version {
            let resp_type = match message_type {
                wire::MessageType::Get => wire::MessageType::GetResponse,
                wire::MessageType::Getnext => wire::MessageType::GetnextResponse,
                wire::MessageType::Getprevious => wire::MessageType::GetpreviousResponse,
                wire::MessageType::Getkeyrange => wire::MessageType::GetkeyrangeResponse,
                wire::MessageType::Getversion => wire::MessageType::GetversionResponse,
                wire::MessageType::Put => wire::MessageType::PutResponse,
                wire::MessageType::Delete => wire::MessageType::DeleteResponse,
                _ => unreachable!(),
            };
            if send_response(
                &mut stream,
                CONNECTION_ID,
                cluster_version,
                header.sequence,
                resp_type,
                wire::StatusCode::ClusterVersionFailure,
                cluster_version,
                None,
                Vec::new(),
            )
            .is_err()
            {
                return;
            }
            continue;
        }

        // Batched puts/deletes carry no per-operation response; the drive
        // only tallies them for the eventual END_BATCH reply.
        if header.batch_id.is_some()
            && matches!(message_type, wire::MessageType::Put | wire::MessageType::Delete)
        {
            if message_type == wire::MessageType::Put {
                let kv = command.body.and_then(|b| b.key_value).unwrap_or_default();
                store.insert(kv.key, (value, kv.new_version));
            } else {
                let kv = command.body.and_then(|b| b.key_value).unwrap_or_default();
                store.remove(&kv.key);
            }
            batch_sequences
                .entry(header.batch_id.unwrap())
                .or_default()
                .push(header.sequence);
            continue;
        }

        let result = match message_type {
            wire::MessageType::Noop => send_response(
                &mut stream,
                CONNECTION_ID,
                cluster_version,
                header.sequence,
                wire::MessageType::NoopResponse,
                wire::StatusCode::Success,
                0,
                None,
                Vec::new(),
            ),
            wire::MessageType::Put => {
                let kv = command.body.and_then(|b| b.key_value).unwrap_or_default();
                store.insert(kv.key, (value, kv.new_version));
                send_response(
                    &mut stream,
                    CONNECTION_ID,
                    cluster_version,
                    header.sequence,
                    wire::MessageType::PutResponse,
                    wire::StatusCode::Success,
                    0,
                    None,
                    Vec::new(),
                )
            }
            wire::MessageType::Get => {
                let kv = command.body.and_then(|b| b.key_value).unwrap_or_default();
                match store.get(&kv.key) {
                    Some((val, ver)) => {
                        let body = wire::Body {
                            key_value: Some(wire::KeyValue {
                                key: kv.key.clone(),
                                db_version: ver.clone(),
                                ..Default::default()
                            }),
                            ..Default::default()
                        };
                        send_response(
                            &mut stream,
                            CONNECTION_ID,
                            cluster_version,
                            header.sequence,
                            wire::MessageType::GetResponse,
                            wire::StatusCode::Success,
                            0,
                            Some(body),
                            val.clone(),
                        )
                    }
                    None => send_response(
                        &mut stream,
                        CONNECTION_ID,
                        cluster_version,
                        header.sequence,
                        wire::MessageType::GetResponse,
                        wire::StatusCode::NotFound,
                        0,
                        None,
                        Vec::new(),
                    ),
                }
            }
            wire::MessageType::Delete => {
                let kv = command.body.and_then(|b| b.key_value).unwrap_or_default();
                store.remove(&kv.key);
                send_response(
                    &mut stream,
                    CONNECTION_ID,
                    cluster_version,
                    header.sequence,
                    wire::MessageType::DeleteResponse,
                    wire::StatusCode::Success,
                    0,
                    None,
                    Vec::new(),
                )
            }
            wire::MessageType::Getkeyrange => {
                let range = command.body.and_then(|b| b.range).unwrap_or_default();
                let mut keys: Vec<Vec<u8>> = store
                    .keys()
                    .filter(|k| {
                        k.as_slice() >= range.start_key.as_slice()
                            && k.as_slice() <= range.end_key.as_slice()
                    })
                    .cloned()
                    .collect();
                keys.sort();
                if range.max_returned > 0 {
                    keys.truncate(range.max_returned as usize);
                }
                let body = wire::Body {
                    range: Some(wire::Range {
                        keys,
                        ..Default::default()
                    }),
                    ..Default::default()
                };
                send_response(
                    &mut stream,
                    CONNECTION_ID,
                    cluster_version,
                    header.sequence,
                    wire::MessageType::GetkeyrangeResponse,
                    wire::StatusCode::Success,
                    0,
                    Some(body),
                    Vec::new(),
                )
            }
            wire::MessageType::StartBatch => {
                if let Some(batch_id) = header.batch_id {
                    batch_sequences.entry(batch_id).or_default();
                }
                send_response(
                    &mut stream,
                    CONNECTION_ID,
                    cluster_version,
                    header.sequence,
                    wire::MessageType::StartBatchResponse,
                    wire::StatusCode::Success,
                    0,
                    None,
                    Vec::new(),
                )
            }
            wire::MessageType::EndBatch => {
                let batch_id = header.batch_id.unwrap_or_default();
                let done = batch_sequences.remove(&batch_id).unwrap_or_default();
                let body = wire::Body {
                    batch: Some(wire::Batch {
                        batch_id,
                        count: done.len() as i32,
                        done_sequence: done,
                        first_failed_sequence: 0,
                    }),
                    ..Default::default()
                };
                send_response(
                    &mut stream,
                    CONNECTION_ID,
                    cluster_version,
                    header.sequence,
                    wire::MessageType::EndBatchResponse,
                    wire::StatusCode::Success,
                    0,
                    Some(body),
                    Vec::new(),
                )
            }
            wire::MessageType::Setup => {
                if let Some(setup) = command.body.and_then(|b| b.setup) {
                    if setup.new_cluster_version != 0 {
                        cluster_version = setup.new_cluster_version;
                    }
                }
                send_response(
                    &mut stream,
                    CONNECTION_ID,
                    cluster_version,
                    header.sequence,
                    wire::MessageType::SetupResponse,
                    wire::StatusCode::Success,
                    0,
                    None,
                    Vec::new(),
                )
            }
            _ => send_response(
                &mut stream,
                CONNECTION_ID,
                cluster_version,
                header.sequence,
                wire::MessageType::InvalidMessageType,
                wire::StatusCode::InvalidRequest,
                0,
                None,
                Vec::new(),
            ),
        };

        if result.is_err() {
            return;
        }
    }
}

fn connect(addr: SocketAddr) -> BlockingClient {
    let options = SessionOptions::new("127.0.0.1", addr.port(), TEST_IDENTITY, TEST_KEY.to_vec())
        .with_timeout(Duration::from_secs(5));
    let session = Session::connect(options).expect("connect to mock drive");
    BlockingClient::new(std::sync::Arc::new(session))
}

fn test_logger() -> slog::Logger {
    use sloggers::terminal::{Destination, TerminalLoggerBuilder};
    use sloggers::Build;

    let mut builder = TerminalLoggerBuilder::new();
    builder.destination(Destination::Stderr);
    builder.level(sloggers::types::Severity::Debug);
    builder.build().expect("build terminal logger")
}

#[test]
fn no_op_round_trip() {
    let addr = spawn_mock_drive(None);
    let options = SessionOptions::new("127.0.0.1", addr.port(), TEST_IDENTITY, TEST_KEY.to_vec())
        .with_timeout(Duration::from_secs(5))
        .with_logger(test_logger());
    let session = Session::connect(options).expect("connect to mock drive");

    let capabilities = session.capabilities();
    assert_eq!(capabilities.configuration.vendor, "mock");
    assert_eq!(capabilities.configuration.model, "mock-drive");
    assert_eq!(capabilities.limits.max_key_size, 128);
    assert_eq!(capabilities.limits.max_value_size, 1 << 20);

    let client = BlockingClient::new(std::sync::Arc::new(session));

    let (status, err) = client.no_op();
    assert!(err.is_none());
    assert_eq!(status.code, StatusCode::Ok);
}

#[test]
fn put_get_delete_round_trip() {
    let addr = spawn_mock_drive(None);
    let client = connect(addr);

    let record = Record {
        key: b"object000".to_vec(),
        value: b"ABCDEFG".to_vec(),
        synchronization: Synchronization::WriteThrough,
        algorithm: Some(kinetic::types::Algorithm::Sha1),
        force: true,
        ..Default::default()
    };

    let (status, err) = client.put(&record);
    assert!(err.is_none());
    assert_eq!(status.code, StatusCode::Ok);

    let (got, status, err) = client.get(b"object000".to_vec());
    assert!(err.is_none());
    assert_eq!(status.code, StatusCode::Ok);
    assert_eq!(got.key, record.key);
    assert_eq!(got.value, record.value);

    let delete_record = Record {
        key: b"object000".to_vec(),
        synchronization: Synchronization::WriteThrough,
        force: true,
        ..Default::default()
    };
    let (status, err) = client.delete(&delete_record);
    assert!(err.is_none());
    assert_eq!(status.code, StatusCode::Ok);
}

#[test]
fn cluster_version_mismatch_is_surfaced() {
    let addr = spawn_mock_drive(None);
    let client = connect(addr);

    let (status, err) = client.set_cluster_version(1);
    assert!(err.is_none());
    assert_eq!(status.code, StatusCode::Ok);

    client.set_client_cluster_version(2);

    let (_, status, err) = client.get(b"anything".to_vec());
    assert!(err.is_none());
    assert_eq!(status.code, StatusCode::RemoteClusterVersionMismatch);
    assert_eq!(status.expected_cluster_version, Some(1));
}

#[test]
fn key_range_returns_exactly_the_requested_count_in_order() {
    let addr = spawn_mock_drive(None);
    let client = connect(addr);

    for i in 0..10u32 {
        let key = format!("object{i:03}").into_bytes();
        let record = Record {
            key,
            value: b"v".to_vec(),
            synchronization: Synchronization::WriteThrough,
            force: true,
            ..Default::default()
        };
        let (status, err) = client.put(&record);
        assert!(err.is_none());
        assert_eq!(status.code, StatusCode::Ok);
    }

    let range = KeyRange {
        start_key: b"object000".to_vec(),
        end_key: b"object999".to_vec(),
        start_key_inclusive: true,
        end_key_inclusive: true,
        max_returned: 5,
        reverse: false,
    };
    let (keys, status, err) = client.get_key_range(&range);
    assert!(err.is_none());
    assert_eq!(status.code, StatusCode::Ok);
    assert_eq!(keys.len(), 5);
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn batch_commit_delivers_every_sequence_and_the_values_land() {
    let addr = spawn_mock_drive(None);
    let client = connect(addr);

    let (_batch_id, status, err) = client.batch_start();
    assert!(err.is_none());
    assert_eq!(status.code, StatusCode::Ok);

    use rand::RngCore;
    let mut rng = rand::thread_rng();
    let records: Vec<(Vec<u8>, Vec<u8>)> = (0..3u32)
        .map(|i| {
            let key = format!("batch{i:03}").into_bytes();
            let mut value = vec![0u8; 16];
            rng.fill_bytes(&mut value);
            (key, value)
        })
        .collect();
    for (key, value) in &records {
        let record = Record {
            key: key.clone(),
            value: value.clone(),
            synchronization: Synchronization::WriteBack,
            ..Default::default()
        };
        let (status, err) = client.batch_put(&record);
        assert!(err.is_none());
        assert_eq!(status.code, StatusCode::Ok);
    }

    let (result, status, err) = client.batch_end();
    assert!(err.is_none());
    assert_eq!(status.code, StatusCode::Ok);
    assert_eq!(result.done_sequences.len(), 3);
    assert_eq!(result.first_failed_sequence, 0);

    for (key, value) in &records {
        let (got, status, err) = client.get(key.clone());
        assert!(err.is_none());
        assert_eq!(status.code, StatusCode::Ok);
        assert_eq!(&got.value, value);
    }
}

#[test]
fn fatal_teardown_completes_every_waiter_and_poisons_the_session() {
    let addr = spawn_mock_drive(Some(0));
    let options = SessionOptions::new("127.0.0.1", addr.port(), TEST_IDENTITY, TEST_KEY.to_vec())
        .with_timeout(Duration::from_secs(5));
    let session = std::sync::Arc::new(Session::connect(options).expect("connect to mock drive"));
    let client = BlockingClient::new(session.clone());

    let nonblocking = kinetic::client::NonblockingClient::new(session.clone());
    let handle_one = nonblocking.no_op().expect("submit first no-op");
    let handle_two = nonblocking.no_op().expect("submit second no-op");

    // The mock drive closes the socket after the handshake without ever
    // answering these, so draining them must come from session.listen
    // hitting a read error.
    loop {
        if session.listen().is_err() {
            break;
        }
    }

    let outcome_one = handle_one.recv().expect("first handle resolves");
    let outcome_two = handle_two.recv().expect("second handle resolves");
    assert!(matches!(outcome_one, kinetic::client::Outcome::Fatal(_)));
    assert!(matches!(outcome_two, kinetic::client::Outcome::Fatal(_)));

    let (status, err) = client.no_op();
    assert!(err.is_some());
    assert_eq!(status.code, StatusCode::ClientIoError);
}
