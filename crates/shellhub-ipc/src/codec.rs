//! Length-prefixed framing.
//!
//! Every frame is a 4-byte little-endian length followed by a MessagePack
//! body. Request bodies may also be JSON, which is handy with nc/socat.

use crate::{IpcError, Request};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum request size (1MB)
pub const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Maximum response size (64MB); pages and content can be large
pub const MAX_RESPONSE_SIZE: usize = 64 * 1024 * 1024;

/// Write one frame and flush.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = rmp_serde::to_vec_named(message)?;
    let len_bytes = (body.len() as u32).to_le_bytes();

    writer.write_all(&len_bytes).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame body. `None` if the peer closed before a new frame.
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> Result<Option<Vec<u8>>, IpcError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > max_size {
        return Err(IpcError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Decode a MessagePack body.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, IpcError> {
    Ok(rmp_serde::from_slice(body)?)
}

/// Decode a request body, falling back to JSON.
pub fn decode_request(body: &[u8]) -> Result<Request, IpcError> {
    match rmp_serde::from_slice(body) {
        Ok(request) => Ok(request),
        Err(e) => serde_json::from_slice(body).map_err(|_| IpcError::Deserialize(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut bytes = (body.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(body);
        bytes
    }

    #[tokio::test]
    async fn test_write_then_read_frame() {
        let mut buf: Vec<u8> = Vec::new();
        write_frame(&mut buf, &Request::Ping).await.unwrap();

        let mut reader = Builder::new().read(&buf).build();
        let body = read_frame(&mut reader, MAX_REQUEST_SIZE)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(decode_request(&body).unwrap(), Request::Ping));
    }

    #[tokio::test]
    async fn test_json_request_fallback() {
        let body = br#"{"action":"get_endpoint","name":"A"}"#;
        let mut reader = Builder::new().read(&frame(body)).build();

        let body = read_frame(&mut reader, MAX_REQUEST_SIZE)
            .await
            .unwrap()
            .unwrap();
        match decode_request(&body).unwrap() {
            Request::GetEndpoint { name } => assert_eq!(name, "A"),
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_is_rejected() {
        assert!(matches!(
            decode_request(b"\xc1\xc1 not a request"),
            Err(IpcError::Deserialize(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let len = ((MAX_REQUEST_SIZE + 1) as u32).to_le_bytes();
        let mut reader = Builder::new().read(&len).build();
        assert!(matches!(
            read_frame(&mut reader, MAX_REQUEST_SIZE).await,
            Err(IpcError::FrameTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn test_clean_eof() {
        let mut reader = Builder::new().build();
        assert!(read_frame(&mut reader, MAX_REQUEST_SIZE)
            .await
            .unwrap()
            .is_none());
    }
}
