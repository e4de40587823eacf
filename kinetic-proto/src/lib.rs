//! Generated protobuf types for the Kinetic wire protocol.
//!
//! The `Message`/`Command` shapes are authored once in `proto/kinetic.proto`
//! and compiled by `prost-build`. Nothing in this crate hand-rolls the wire
//! structs; downstream crates consume them as an external contract.

include!(concat!(env!("OUT_DIR"), "/kinetic.rs"));
