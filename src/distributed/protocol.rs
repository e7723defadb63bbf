//! Network wire protocol
//!
//! Framing used between the coordinator and a network peer. One connection
//! carries exactly one request and one reply.
//!
//! # Message Flow
//!
//! ```text
//! Coordinator                       Peer
//!     |                              |
//!     |<--------- connect -----------|
//!     |-- LENGTH(8) + PAYLOAD(n) --->|
//!     |-- shutdown(write) ---------->|
//!     |                              |  scan
//!     |<-------- COUNT(8) -----------|
//!     |                              |  close
//! ```
//!
//! # Field Format
//!
//! Both the payload length and the reply count travel as an 8-byte field
//! holding an ASCII decimal number, left-justified and NUL-padded:
//!
//! ```text
//! [ '4' '5' 00 00 00 00 00 00 ]  = 45
//! ```
//!
//! Decoders also accept space padding. Values that need more than 8 digits
//! cannot be framed.

use crate::error::{Result, ScanError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Width of the length and count fields
pub const FIELD_LEN: usize = 8;

/// Largest value an 8-digit decimal field can carry
pub const MAX_FIELD_VALUE: u64 = 99_999_999;

/// Encode `value` as a NUL-padded ASCII decimal field.
pub fn encode_field(value: u64) -> Result<[u8; FIELD_LEN]> {
    if value > MAX_FIELD_VALUE {
        return Err(ScanError::InvalidArgument(format!(
            "{} does not fit in an {}-digit field",
            value, FIELD_LEN
        )));
    }

    let digits = value.to_string();
    let mut field = [0u8; FIELD_LEN];
    field[..digits.len()].copy_from_slice(digits.as_bytes());
    Ok(field)
}

/// Parse a decimal field, ignoring NUL and space padding on either side.
///
/// Returns `None` when the field holds no digits or anything besides digits
/// and padding.
pub fn decode_field(field: &[u8]) -> Option<u64> {
    let is_pad = |b: &u8| *b == 0 || b.is_ascii_whitespace();
    let start = field.iter().position(|b| !is_pad(b))?;
    let end = field.iter().rposition(|b| !is_pad(b))? + 1;
    let digits = &field[start..end];

    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }

    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Decode the payload length field of a request frame.
pub fn decode_length(field: &[u8]) -> Result<usize> {
    decode_field(field)
        .map(|len| len as usize)
        .ok_or_else(|| ScanError::protocol(format!("malformed length field {:?}", field)))
}

/// Decode a peer's reply field into its partial count.
pub fn parse_reply(field: &[u8]) -> Result<u64> {
    decode_field(field).ok_or_else(|| {
        ScanError::Aggregation(format!(
            "unparsable partial result {:?}",
            String::from_utf8_lossy(field)
        ))
    })
}

/// Frame `payload` as `LENGTH(8) + PAYLOAD`.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let field = encode_field(payload.len() as u64)?;
    let mut framed = Vec::with_capacity(FIELD_LEN + payload.len());
    framed.extend_from_slice(&field);
    framed.extend_from_slice(payload);
    Ok(framed)
}

/// Decode one request frame from the start of `buf`.
///
/// Returns `(payload, bytes_consumed)`.
pub fn decode_frame(buf: &[u8]) -> Result<(&[u8], usize)> {
    if buf.len() < FIELD_LEN {
        return Err(ScanError::protocol(format!(
            "incomplete frame: need {} bytes for the length field, got {}",
            FIELD_LEN,
            buf.len()
        )));
    }

    let len = decode_length(&buf[..FIELD_LEN])?;
    if buf.len() < FIELD_LEN + len {
        return Err(ScanError::protocol(format!(
            "incomplete frame: need {} bytes, got {}",
            FIELD_LEN + len,
            buf.len()
        )));
    }

    Ok((&buf[FIELD_LEN..FIELD_LEN + len], FIELD_LEN + len))
}

/// Read exactly `n` bytes, accumulating short reads.
///
/// A close before `n` bytes arrive is a `TransportError` naming how many bytes
/// were received.
pub async fn read_exactly<R>(reader: &mut R, n: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; n];
    let mut filled = 0;

    while filled < n {
        let read = reader
            .read(&mut buf[filled..])
            .await
            .map_err(|e| ScanError::transport(format!("read failed after {} of {} bytes", filled, n), e))?;
        if read == 0 {
            return Err(ScanError::protocol(format!(
                "connection closed after {} of {} bytes",
                filled, n
            )));
        }
        filled += read;
    }

    Ok(buf)
}

/// Send a request frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let field = encode_field(payload.len() as u64)?;

    writer
        .write_all(&field)
        .await
        .map_err(|e| ScanError::transport("failed to write length field", e))?;
    writer
        .write_all(payload)
        .await
        .map_err(|e| ScanError::transport(format!("failed to write {} byte payload", payload.len()), e))?;
    writer
        .flush()
        .await
        .map_err(|e| ScanError::transport("failed to flush payload", e))?;

    Ok(())
}

/// Receive a request frame and return its payload.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let field = read_exactly(reader, FIELD_LEN).await?;
    let len = decode_length(&field)?;
    read_exactly(reader, len).await
}

/// Send a partial count as the reply field.
pub async fn write_reply<W>(writer: &mut W, count: u64) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let field = encode_field(count)?;
    writer
        .write_all(&field)
        .await
        .map_err(|e| ScanError::transport("failed to write reply", e))?;
    writer
        .flush()
        .await
        .map_err(|e| ScanError::transport("failed to flush reply", e))?;
    Ok(())
}

/// Receive a peer's reply field and parse the partial count.
pub async fn read_reply<R>(reader: &mut R) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let field = read_exactly(reader, FIELD_LEN).await?;
    parse_reply(&field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn payload(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_field_format() {
        assert_eq!(&encode_field(45).unwrap(), b"45\0\0\0\0\0\0");
        assert_eq!(&encode_field(0).unwrap(), b"0\0\0\0\0\0\0\0");
        assert_eq!(&encode_field(MAX_FIELD_VALUE).unwrap(), b"99999999");
    }

    #[test]
    fn test_field_too_large() {
        let err = encode_field(MAX_FIELD_VALUE + 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_decode_field_padding() {
        assert_eq!(decode_field(b"1234\0\0\0\0"), Some(1234));
        assert_eq!(decode_field(b"1234    "), Some(1234));
        assert_eq!(decode_field(b"  77\0   "), Some(77));
        assert_eq!(decode_field(b"\0\0\0\0\0\0\0\0"), None);
        assert_eq!(decode_field(b"12a4\0\0\0\0"), None);
        assert_eq!(decode_field(b"12 34\0\0\0"), None);
    }

    #[test]
    fn test_parse_reply_malformed() {
        let err = parse_reply(b"oops\0\0\0\0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Aggregation);
    }

    #[test]
    fn test_frame_round_trip() {
        for n in [0usize, 3, 300, 1_000_000] {
            let original = payload(n);
            let framed = encode_frame(&original).unwrap();
            assert_eq!(framed.len(), FIELD_LEN + n);

            let (decoded, consumed) = decode_frame(&framed).unwrap();
            assert_eq!(consumed, framed.len());
            assert_eq!(decoded, &original[..]);
        }
    }

    #[test]
    fn test_decode_incomplete_frame() {
        let framed = encode_frame(&payload(30)).unwrap();
        let err = decode_frame(&framed[..20]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);

        let err = decode_frame(&framed[..4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_stream_round_trip() {
        for n in [0usize, 3, 300, 1_000_000] {
            let original = payload(n);
            // Small duplex buffer forces many short reads and writes
            let (mut client, mut server) = tokio::io::duplex(4096);

            let sent = original.clone();
            let writer = tokio::spawn(async move {
                write_frame(&mut server, &sent).await.unwrap();
                server.shutdown().await.unwrap();
            });

            let received = read_frame(&mut client).await.unwrap();
            writer.await.unwrap();
            assert_eq!(received, original);
        }
    }

    #[tokio::test]
    async fn test_reply_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_reply(&mut server, 4_242_424).await.unwrap();
        assert_eq!(read_reply(&mut client).await.unwrap(), 4_242_424);
    }

    #[tokio::test]
    async fn test_truncated_reply_is_transport_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        server.write_all(b"1234").await.unwrap();
        drop(server);

        let err = read_reply(&mut client).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("4 of 8"));
    }
}
