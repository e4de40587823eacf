//! Wire framing: the 9-byte magic+length preamble, the envelope protobuf,
//! the optional raw value blob, and the HMAC-SHA1 contract that binds an
//! envelope to the command bytes it carries.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use hmac::{Hmac, Mac};
use kinetic_proto::Message;
use prost::Message as _;
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::error::{KineticError, Result};

const MAGIC: u8 = b'F';

type HmacSha1 = Hmac<Sha1>;

/// Computes the HMAC over `len_be32(command_bytes) || command_bytes`.
/// When `command_bytes` is empty, the mac is computed over the empty
/// input with no length prefix mixed in.
pub fn sign(command_bytes: &[u8], key: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha1::new_from_slice(key).expect("hmac accepts any key length");
    if !command_bytes.is_empty() {
        let mut len_prefix = [0u8; 4];
        (&mut len_prefix[..])
            .write_u32::<BigEndian>(command_bytes.len() as u32)
            .expect("writing into a fixed 4-byte buffer cannot fail");
        mac.update(&len_prefix);
        mac.update(command_bytes);
    }
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time comparison against a freshly computed mac.
pub fn verify(command_bytes: &[u8], key: &[u8], mac: &[u8]) -> bool {
    let expected = sign(command_bytes, key);
    bool::from(expected.as_slice().ct_eq(mac))
}

/// Encodes an already-populated `Message` envelope plus an optional raw
/// value blob into the 9-byte-preamble wire frame and writes it in one
/// shot.
pub fn encode_frame<W: Write>(writer: &mut W, envelope: &Message, value: &[u8]) -> Result<()> {
    let envelope_bytes = envelope.encode_to_vec();
    let mut header = [0u8; 9];
    header[0] = MAGIC;
    (&mut header[1..5]).write_u32::<BigEndian>(envelope_bytes.len() as u32)?;
    (&mut header[5..9]).write_u32::<BigEndian>(value.len() as u32)?;

    writer.write_all(&header)?;
    writer.write_all(&envelope_bytes)?;
    if !value.is_empty() {
        writer.write_all(value)?;
    }
    Ok(())
}

/// Reads exactly one frame off `reader`, returning the decoded envelope
/// and the raw value blob (empty if the frame carried none).
pub fn decode_frame<R: Read>(reader: &mut R) -> Result<(Message, Vec<u8>)> {
    let mut header = [0u8; 9];
    read_exact_classified(reader, &mut header)?;

    if header[0] != MAGIC {
        return Err(KineticError::Protocol(format!(
            "bad magic byte: expected {:#x}, got {:#x}",
            MAGIC, header[0]
        )));
    }

    let envelope_len = (&header[1..5]).read_u32::<BigEndian>()? as usize;
    let value_len = (&header[5..9]).read_u32::<BigEndian>()? as usize;

    let mut envelope_bytes = vec![0u8; envelope_len];
    read_exact_classified(reader, &mut envelope_bytes)?;
    let envelope = Message::decode(envelope_bytes.as_slice())
        .map_err(|e| KineticError::Protocol(format!("malformed envelope: {e}")))?;

    let mut value = vec![0u8; value_len];
    if value_len > 0 {
        read_exact_classified(reader, &mut value)?;
    }

    Ok((envelope, value))
}

/// Fills `buf` exactly like `Read::read_exact`, but distinguishes *how* a
/// short read failed: a clean EOF before any byte of `buf` was read means
/// the peer closed the connection (a transport failure), while an EOF
/// after some bytes already landed means a frame began and was cut short
/// (a protocol failure — the peer is still there, but the frame is
/// garbage).
fn read_exact_classified<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => {
                return Err(if read == 0 {
                    KineticError::Io(io::Error::from(io::ErrorKind::UnexpectedEof))
                } else {
                    KineticError::Protocol("connection closed mid-frame".to_string())
                });
            }
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(KineticError::Io(e)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetic_proto::message::AuthType;

    #[test]
    fn empty_command_bytes_sign_over_empty_input() {
        let mac_empty = sign(&[], b"key");
        let mac_from_scratch = {
            let mac = HmacSha1::new_from_slice(b"key").unwrap();
            mac.finalize().into_bytes().to_vec()
        };
        assert_eq!(mac_empty, mac_from_scratch);
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let cmd = b"some command bytes";
        let key = b"asdfasdf";
        let mac = sign(cmd, key);
        assert!(verify(cmd, key, &mac));
        assert!(!verify(cmd, b"different key", &mac));
        assert!(!verify(b"tampered", key, &mac));
    }

    #[test]
    fn frame_round_trips_through_encode_decode() {
        let mut envelope = Message::default();
        envelope.set_auth_type(AuthType::Hmacauth);
        envelope.command_bytes = b"command-payload".to_vec();

        let value = b"a value blob".to_vec();

        let mut buf = Vec::new();
        encode_frame(&mut buf, &envelope, &value).unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let (decoded_envelope, decoded_value) = decode_frame(&mut cursor).unwrap();

        assert_eq!(decoded_envelope.command_bytes, envelope.command_bytes);
        assert_eq!(decoded_value, value);
    }

    #[test]
    fn frame_without_value_round_trips() {
        let mut envelope = Message::default();
        envelope.set_auth_type(AuthType::Unsolicitedstatus);

        let mut buf = Vec::new();
        encode_frame(&mut buf, &envelope, &[]).unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let (_decoded, decoded_value) = decode_frame(&mut cursor).unwrap();
        assert!(decoded_value.is_empty());
    }

    #[test]
    fn bad_magic_byte_is_rejected() {
        let mut buf = vec![0u8; 9];
        buf[0] = b'X';
        let mut cursor = std::io::Cursor::new(buf);
        let err = decode_frame(&mut cursor).unwrap_err();
        assert!(matches!(err, KineticError::Protocol(_)));
    }
}
