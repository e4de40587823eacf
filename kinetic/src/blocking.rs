//! The blocking facade: submits through [`NonblockingClient`], then drives
//! [`Session::listen`] until that operation's handle resolves.
//!
//! Grounded on `blockconnection.go`'s `BlockConnection`, whose methods all
//! follow the same shape: build a callback, call the matching nonblocking
//! method, then `for !callback.Done() { conn.nbc.Run() }` before reading
//! the callback's result back out.

use std::sync::Arc;

use crate::client::{BatchResult, Handle, NonblockingClient, Outcome};
use crate::error::KineticError;
use crate::session::Session;
use crate::status::Status;
use crate::types::{Acl, GetLogResult, KeyRange, LogType, P2PPush, P2PStatus, PowerLevel, Priority, Record};

/// A synchronous, single call-in-call-out API over a [`Session`]. Safe to
/// share across threads (every method it calls down to is), but a single
/// `BlockingClient` driving `listen` on behalf of many concurrently
/// outstanding calls simply means those calls take turns delivering each
/// other's responses — see the session's concurrency note.
#[derive(Clone)]
pub struct BlockingClient {
    client: NonblockingClient,
    session: Arc<Session>,
}

impl BlockingClient {
    pub fn new(session: Arc<Session>) -> Self {
        BlockingClient {
            client: NonblockingClient::new(session.clone()),
            session,
        }
    }

    pub fn close(&self) {
        self.session.close();
    }

    /// Submits, then alternates between polling the handle and calling
    /// `listen` until it resolves. `listen` itself blocks on the socket
    /// (bounded by the session's configured timeout), so this isn't a
    /// busy loop.
    fn drive<T>(&self, handle: Handle<T>) -> (Option<T>, Status, Option<KineticError>) {
        loop {
            if let Some(outcome) = handle.try_recv() {
                return match outcome {
                    Outcome::Success(v) => (Some(v), Status::ok(), None),
                    Outcome::Failure(status) => (None, status, None),
                    Outcome::Fatal(err) => {
                        let status = Status::from_client_error(&err);
                        (None, status, Some(err))
                    }
                };
            }
            if let Err(err) = self.session.listen() {
                let status = Status::from_client_error(&err);
                return (None, status, Some(err));
            }
        }
    }

    fn run<T: Default>(
        &self,
        submitted: crate::error::Result<Handle<T>>,
    ) -> (T, Status, Option<KineticError>) {
        match submitted {
            Ok(handle) => {
                let (value, status, err) = self.drive(handle);
                (value.unwrap_or_default(), status, err)
            }
            Err(e) => {
                let status = Status::from_client_error(&e);
                (T::default(), status, Some(e))
            }
        }
    }

    pub fn no_op(&self) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.no_op());
        (status, err)
    }

    pub fn get(&self, key: Vec<u8>) -> (Record, Status, Option<KineticError>) {
        self.run(self.client.get(key))
    }

    pub fn get_next(&self, key: Vec<u8>) -> (Record, Status, Option<KineticError>) {
        self.run(self.client.get_next(key))
    }

    pub fn get_previous(&self, key: Vec<u8>) -> (Record, Status, Option<KineticError>) {
        self.run(self.client.get_previous(key))
    }

    pub fn get_version(&self, key: Vec<u8>) -> (Vec<u8>, Status, Option<KineticError>) {
        self.run(self.client.get_version(key))
    }

    pub fn get_key_range(&self, range: &KeyRange) -> (Vec<Vec<u8>>, Status, Option<KineticError>) {
        self.run(self.client.get_key_range(range))
    }

    pub fn put(&self, record: &Record) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.put(record));
        (status, err)
    }

    pub fn delete(&self, record: &Record) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.delete(record));
        (status, err)
    }

    pub fn flush(&self) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.flush());
        (status, err)
    }

    pub fn batch_start(&self) -> (u32, Status, Option<KineticError>) {
        match self.client.batch_start() {
            Ok((batch_id, handle)) => {
                let (_, status, err) = self.drive(handle);
                (batch_id, status, err)
            }
            Err(e) => {
                let status = Status::from_client_error(&e);
                (0, status, Some(e))
            }
        }
    }

    pub fn batch_put(&self, record: &Record) -> (Status, Option<KineticError>) {
        match self.client.batch_put(record) {
            Ok(()) => (Status::ok(), None),
            Err(e) => {
                let status = Status::from_client_error(&e);
                (status, Some(e))
            }
        }
    }

    pub fn batch_delete(&self, record: &Record) -> (Status, Option<KineticError>) {
        match self.client.batch_delete(record) {
            Ok(()) => (Status::ok(), None),
            Err(e) => {
                let status = Status::from_client_error(&e);
                (status, Some(e))
            }
        }
    }

    pub fn batch_end(&self) -> (BatchResult, Status, Option<KineticError>) {
        self.run(self.client.batch_end())
    }

    pub fn batch_abort(&self) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.batch_abort());
        (status, err)
    }

    pub fn p2p_push(&self, push: &P2PPush) -> (P2PStatus, Status, Option<KineticError>) {
        self.run(self.client.p2p_push(push))
    }

    pub fn get_log(&self, types: &[LogType]) -> (GetLogResult, Status, Option<KineticError>) {
        self.run(self.client.get_log(types))
    }

    pub fn secure_erase(&self, pin: Vec<u8>) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.secure_erase(pin));
        (status, err)
    }

    pub fn instant_erase(&self, pin: Vec<u8>) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.instant_erase(pin));
        (status, err)
    }

    pub fn lock_device(&self, pin: Vec<u8>) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.lock_device(pin));
        (status, err)
    }

    pub fn unlock_device(&self, pin: Vec<u8>) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.unlock_device(pin));
        (status, err)
    }

    pub fn download_firmware(&self, image: Vec<u8>) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.download_firmware(image));
        (status, err)
    }

    pub fn set_cluster_version(&self, new_version: i64) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.set_cluster_version(new_version));
        (status, err)
    }

    pub fn set_client_cluster_version(&self, version: i64) {
        self.client.set_client_cluster_version(version);
    }

    pub fn set_acl(&self, acl: &Acl) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.set_acl(acl));
        (status, err)
    }

    pub fn set_lock_pin(&self, old_pin: Vec<u8>, new_pin: Vec<u8>) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.set_lock_pin(old_pin, new_pin));
        (status, err)
    }

    pub fn set_erase_pin(&self, old_pin: Vec<u8>, new_pin: Vec<u8>) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.set_erase_pin(old_pin, new_pin));
        (status, err)
    }

    pub fn media_scan(&self, range: &KeyRange, priority: Priority) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.media_scan(range, priority));
        (status, err)
    }

    pub fn media_optimize(&self, range: &KeyRange, priority: Priority) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.media_optimize(range, priority));
        (status, err)
    }

    pub fn set_power_level(&self, level: PowerLevel) -> (Status, Option<KineticError>) {
        let (_, status, err) = self.run(self.client.set_power_level(level));
        (status, err)
    }
}
