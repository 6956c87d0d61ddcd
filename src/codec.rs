//! Framing and message types for every socket exchange.
//!
//! A frame is a 4-byte big-endian length header followed by exactly that
//! many bytes of JSON. Receivers read the header, then the exact payload;
//! nothing inside the payload is ever interpreted as a terminator.

use std::fmt;
use std::io;

use anyhow::{anyhow, bail, Context, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::OperationName;
use crate::shuffle::LetterGroup;
use crate::{Dataset, Role, WorkerId};

/// Size of the length header in bytes.
pub const HEADER_LEN: usize = 4;

/// Largest payload a receiver will accept.
pub const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

/// Status string carried by a completion ACK.
pub const DONE: &str = "DONE";

/////////////////////////////////////////////////////////////////////////////
// Frames
/////////////////////////////////////////////////////////////////////////////

/// Serializes `msg` and prepends its length header.
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Bytes> {
    let payload = serde_json::to_vec(msg)?;
    if payload.len() > MAX_FRAME_LEN {
        bail!("frame of {} bytes exceeds the {MAX_FRAME_LEN} byte limit", payload.len());
    }
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(&payload);
    Ok(buf.freeze())
}

/// Takes one complete frame off the front of `buf`.
///
/// Returns `Ok(None)` while the buffer holds less than a full frame; the
/// buffer is left untouched in that case so more bytes can be appended.
pub fn decode_frame<T: DeserializeOwned>(buf: &mut BytesMut) -> Result<Option<T>> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len > MAX_FRAME_LEN {
        bail!("frame header announces {len} bytes, limit is {MAX_FRAME_LEN}");
    }
    if buf.len() < HEADER_LEN + len {
        return Ok(None);
    }
    buf.advance(HEADER_LEN);
    let payload = buf.split_to(len);
    Ok(Some(serde_json::from_slice(&payload)?))
}

/// Writes `msg` as one frame and flushes.
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(msg)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the raw payload of one frame.
///
/// Blocks until the whole payload has arrived or the peer goes away.
pub async fn read_payload<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Bytes> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame header announces {len} bytes, limit is {MAX_FRAME_LEN}"),
        ));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Bytes::from(payload))
}

/// Reads one frame and deserializes it.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let payload = read_payload(reader).await.context("reading frame")?;
    serde_json::from_slice(&payload).context("decoding frame payload")
}

/////////////////////////////////////////////////////////////////////////////
// KV store requests
/////////////////////////////////////////////////////////////////////////////

/// A KV store command, tagged on the wire as `command` + `category`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Request {
    Set(SetRequest),
    Get(GetRequest),
    Combine(CombineRequest),
    Cleanup(CleanupRequest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum SetRequest {
    /// Partition `dataset` into `mapper_count` shards and stage them.
    Input { dataset: Dataset, mapper_count: usize },
    MapperOutput { mapper_id: WorkerId, output: Value },
    ReducerOutput { reducer_id: WorkerId, output: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum GetRequest {
    Input { mapper_id: WorkerId },
    /// The shuffled reducer input for `group`.
    MapperOutput { group: LetterGroup, reducer_id: WorkerId },
    FinalOutput { operation: OperationName },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum CombineRequest {
    FinalOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum CleanupRequest {
    All,
}

impl Request {
    pub fn command(&self) -> &'static str {
        match self {
            Request::Set(_) => "set",
            Request::Get(_) => "get",
            Request::Combine(_) => "combine",
            Request::Cleanup(_) => "cleanup",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Request::Set(SetRequest::Input { .. }) | Request::Get(GetRequest::Input { .. }) => {
                "input"
            }
            Request::Set(SetRequest::MapperOutput { .. })
            | Request::Get(GetRequest::MapperOutput { .. }) => "mapper-output",
            Request::Set(SetRequest::ReducerOutput { .. }) => "reducer-output",
            Request::Get(GetRequest::FinalOutput { .. }) | Request::Combine(_) => "final-output",
            Request::Cleanup(_) => "all",
        }
    }
}

/////////////////////////////////////////////////////////////////////////////
// KV store responses
/////////////////////////////////////////////////////////////////////////////

/// In-band failure markers. Store failures never surface as transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorToken {
    InvalidMapperId,
    InvalidMapperFileParameters,
    ReducerOutputReadError,
    FinalOutputNotFound,
    ClientError,
}

impl fmt::Display for ErrorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            ErrorToken::InvalidMapperId => "INVALID_MAPPER_ID",
            ErrorToken::InvalidMapperFileParameters => "INVALID_MAPPER_FILE_PARAMETERS",
            ErrorToken::ReducerOutputReadError => "REDUCER_OUTPUT_READ_ERROR",
            ErrorToken::FinalOutputNotFound => "FINAL_OUTPUT_NOT_FOUND",
            ErrorToken::ClientError => "CLIENT_ERROR",
        };
        f.write_str(token)
    }
}

impl std::error::Error for ErrorToken {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "body", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Stored,
    NotStored,
    Done,
    Value(Value),
    Error(ErrorToken),
}

impl Response {
    /// Unwraps a `Value` response; error tokens become [`anyhow::Error`]s
    /// that downcast to [`ErrorToken`].
    pub fn into_value(self) -> Result<Value> {
        match self {
            Response::Value(value) => Ok(value),
            Response::Error(token) => Err(anyhow!(token)),
            other => bail!("expected a value, got {other:?}"),
        }
    }

    /// Succeeds only on `STORED`.
    pub fn expect_stored(self) -> Result<()> {
        match self {
            Response::Stored => Ok(()),
            Response::Error(token) => Err(anyhow!(token)),
            other => bail!("store rejected the write: {other:?}"),
        }
    }
}

/////////////////////////////////////////////////////////////////////////////
// Completion ACKs
/////////////////////////////////////////////////////////////////////////////

/// A worker's completion signal to the master.
///
/// Kept stringly typed so the master can see (and ignore) malformed ACKs
/// instead of failing to decode them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub worker_id: String,
    pub status: String,
}

impl Ack {
    pub fn done(worker_id: WorkerId) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            status: DONE.to_string(),
        }
    }

    /// True for `(<role prefix>..., "DONE")`.
    pub fn is_done_from(&self, role: Role) -> bool {
        self.status == DONE && self.worker_id.starts_with(role.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_containing_the_old_sentinel_survives() {
        let msg = json!({ "text": "ENDOFDATA in the middle ENDOFDATA", "n": 3 });
        let mut buf = BytesMut::from(&encode_frame(&msg).unwrap()[..]);
        let decoded: Value = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, msg);
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frames_wait_for_more_bytes() {
        let frame = encode_frame(&json!(["a", "b", "c"])).unwrap();
        let mut buf = BytesMut::new();
        buf.put_slice(&frame[..2]);
        assert!(decode_frame::<Value>(&mut buf).unwrap().is_none());
        buf.put_slice(&frame[2..frame.len() - 1]);
        assert!(decode_frame::<Value>(&mut buf).unwrap().is_none());
        buf.put_slice(&frame[frame.len() - 1..]);
        let decoded: Value = decode_frame(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, json!(["a", "b", "c"]));
    }

    #[test]
    fn back_to_back_frames_decode_in_order() {
        let mut buf = BytesMut::new();
        buf.put_slice(&encode_frame(&1u32).unwrap());
        buf.put_slice(&encode_frame(&2u32).unwrap());
        assert_eq!(decode_frame::<u32>(&mut buf).unwrap(), Some(1));
        assert_eq!(decode_frame::<u32>(&mut buf).unwrap(), Some(2));
        assert_eq!(decode_frame::<u32>(&mut buf).unwrap(), None);
    }

    #[test]
    fn oversized_header_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(u32::MAX);
        buf.put_slice(b"{}");
        assert!(decode_frame::<Value>(&mut buf).is_err());
    }

    #[test]
    fn requests_carry_command_and_category_tags() {
        let request = Request::Set(SetRequest::MapperOutput {
            mapper_id: WorkerId::mapper(2),
            output: json!({ "the": [1] }),
        });
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["command"], "set");
        assert_eq!(wire["category"], "mapper-output");
        assert_eq!(wire["mapper_id"], "mapper2");
        assert_eq!(request.command(), "set");
        assert_eq!(request.category(), "mapper-output");

        let cleanup = serde_json::to_value(Request::Cleanup(CleanupRequest::All)).unwrap();
        assert_eq!(cleanup, json!({ "command": "cleanup", "category": "all" }));
        let back: Request = serde_json::from_value(cleanup).unwrap();
        assert_eq!(back, Request::Cleanup(CleanupRequest::All));
    }

    #[test]
    fn error_tokens_keep_their_wire_names() {
        let wire = serde_json::to_value(Response::Error(ErrorToken::InvalidMapperId)).unwrap();
        assert_eq!(wire, json!({ "status": "ERROR", "body": "INVALID_MAPPER_ID" }));
        assert_eq!(ErrorToken::ReducerOutputReadError.to_string(), "REDUCER_OUTPUT_READ_ERROR");

        let err = Response::Error(ErrorToken::InvalidMapperId).into_value().unwrap_err();
        assert_eq!(err.downcast_ref::<ErrorToken>(), Some(&ErrorToken::InvalidMapperId));
    }

    #[test]
    fn acks_match_on_prefix_and_status() {
        assert!(Ack::done(WorkerId::mapper(1)).is_done_from(Role::Mapper));
        assert!(!Ack::done(WorkerId::mapper(1)).is_done_from(Role::Reducer));
        let pending = Ack { worker_id: "reducer1".into(), status: "WORKING".into() };
        assert!(!pending.is_done_from(Role::Reducer));
    }

    #[tokio::test]
    async fn frames_cross_an_async_stream() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let sent = Request::Get(GetRequest::Input { mapper_id: WorkerId::mapper(1) });
        let expected = sent.clone();
        let writer = tokio::spawn(async move { write_frame(&mut client, &sent).await });
        let received: Request = read_frame(&mut server).await.unwrap();
        writer.await.unwrap().unwrap();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn peer_closing_mid_frame_is_an_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let frame = encode_frame(&json!({ "k": "v" })).unwrap();
        client.write_all(&frame[..frame.len() - 2]).await.unwrap();
        drop(client);
        assert!(read_frame::<_, Value>(&mut server).await.is_err());
    }
}
