//! Client library for the Kinetic key-value disk drive wire protocol: a
//! length-prefixed, HMAC-authenticated, request/response protocol spoken
//! over TCP (optionally TLS) to "kinetic" drives.
//!
//! The core is three tightly-coupled pieces — [`codec`] (wire framing and
//! the HMAC contract), [`session`] (the connection, its sequence counter,
//! and the pending-response table), and [`client`] (one typed method per
//! operation on top of a session). [`blocking`] wraps the nonblocking
//! client for callers that would rather not drive `listen` themselves.

pub mod blocking;
pub mod client;
pub mod codec;
pub mod error;
pub mod pending;
pub mod session;
pub mod status;
pub mod tls;
pub mod types;
pub mod util;

pub use blocking::BlockingClient;
pub use client::{Handle, NonblockingClient, Outcome};
pub use error::{KineticError, Result};
pub use session::{Session, SessionOptions};
pub use status::{Status, StatusCode};
pub use tls::TlsMode;
