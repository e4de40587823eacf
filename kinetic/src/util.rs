//! Thin utilities built on top of [`crate::blocking::BlockingClient`]:
//! chunked file upload (pure byte-slicing over repeated `Put`) and a
//! firmware update wrapper. Neither performs any protocol logic of its
//! own — grounded on `utility.go`'s `UpdateFirmware`, which does nothing
//! but stat, read, and call through.

use std::fs;
use std::path::Path;

use crate::blocking::BlockingClient;
use crate::error::{KineticError, Result};
use crate::status::Status;
use crate::types::{Record, Synchronization};

/// Splits `data` into `chunk_size`-sized records keyed `key_prefix` plus a
/// big-endian 4-byte chunk index, and puts each one in turn. Stops at the
/// first failure; returns the status of whichever put failed, or of the
/// last one issued if every put succeeded.
pub fn put_chunked(
    client: &BlockingClient,
    key_prefix: &[u8],
    data: &[u8],
    chunk_size: usize,
) -> (Status, Option<KineticError>) {
    if chunk_size == 0 {
        return (
            Status::client_local(
                crate::status::StatusCode::ClientInternalError,
                "chunk_size must be greater than zero",
            ),
            None,
        );
    }

    let mut last = (Status::ok(), None);
    for (index, chunk) in data.chunks(chunk_size).enumerate() {
        let mut key = key_prefix.to_vec();
        key.extend_from_slice(&(index as u32).to_be_bytes());

        let record = Record {
            key,
            value: chunk.to_vec(),
            synchronization: Synchronization::WriteBack,
            ..Default::default()
        };

        let (status, err) = client.put(&record);
        let failed = !status.is_ok() || err.is_some();
        last = (status, err);
        if failed {
            break;
        }
    }
    last
}

/// Reads `path` off disk and sends it to the drive as a firmware image.
/// Mirrors `utility.go`'s `UpdateFirmware`: no chunking, no retry, just a
/// single `Setup` with `firmware_download` set and the whole image as the
/// value blob.
pub fn update_firmware(client: &BlockingClient, path: &Path) -> Result<(Status, Option<KineticError>)> {
    let image = fs::read(path).map_err(KineticError::Io)?;
    Ok(client.download_firmware(image))
}
