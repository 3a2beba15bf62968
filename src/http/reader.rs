use tokio::io::{AsyncRead, AsyncReadExt};

use super::message::{
    content_length, find_head_end, is_chunked, parse_head_bytes, MessageKind, RawMessage,
    StartLine,
};
use crate::error::{HarnessError, Result};

/// Upper bound on the size of a message head.
pub const MAX_HEAD_BYTES: usize = 64 * 1024;

/// Upper bound on the size of a message body, framing included.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFraming {
    Empty,
    Length(usize),
    Chunked,
    UntilEof,
}

/// Reads exactly one request, eagerly including its body.
pub async fn read_request<R>(reader: &mut R) -> Result<RawMessage>
where
    R: AsyncRead + Unpin,
{
    let (head, leftover) = read_head(reader).await?;
    let (start, headers) = parse_head_bytes(&head, MessageKind::Request)?;

    let framing = if is_chunked(&headers) {
        BodyFraming::Chunked
    } else {
        match content_length(&headers)? {
            Some(len) => BodyFraming::Length(len),
            None => BodyFraming::Empty,
        }
    };

    let body = read_body(reader, leftover, framing).await?;
    Ok(RawMessage::new(start, headers, body))
}

/// Reads exactly one response, eagerly including its body.
///
/// `request_method` is the method of the request this response answers; a
/// response to `HEAD` never has a body.
pub async fn read_response<R>(reader: &mut R, request_method: Option<&str>) -> Result<RawMessage>
where
    R: AsyncRead + Unpin,
{
    let (head, leftover) = read_head(reader).await?;
    let (start, headers) = parse_head_bytes(&head, MessageKind::Response)?;

    let bodiless_status = match &start {
        StartLine::Status { code, .. } => (100..200).contains(code) || *code == 204 || *code == 304,
        StartLine::Request { .. } => false,
    };
    let is_head = request_method.is_some_and(|m| m.eq_ignore_ascii_case("HEAD"));

    let framing = if bodiless_status || is_head {
        BodyFraming::Empty
    } else if is_chunked(&headers) {
        BodyFraming::Chunked
    } else {
        match content_length(&headers)? {
            Some(len) => BodyFraming::Length(len),
            None => BodyFraming::UntilEof,
        }
    };

    let body = read_body(reader, leftover, framing).await?;
    Ok(RawMessage::new(start, headers, body))
}

/// Reads up to and including the blank line ending the head.
///
/// Returns the head without its terminator and any bytes read past it.
async fn read_head<R>(reader: &mut R) -> Result<(Vec<u8>, Vec<u8>)>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    let mut searched = 0;

    loop {
        let n = reader
            .read(&mut chunk)
            .await
            .map_err(|e| HarnessError::io_error("reading HTTP message head", e))?;
        if n == 0 {
            return Err(if buf.is_empty() {
                HarnessError::malformed("connection closed before any data was received")
            } else {
                HarnessError::malformed("connection closed in the middle of the message head")
            });
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = find_head_end(&buf[searched..]) {
            let end = searched + end;
            let leftover = buf.split_off(end + 4);
            buf.truncate(end);
            return Ok((buf, leftover));
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Err(HarnessError::malformed(format!(
                "message head exceeds {MAX_HEAD_BYTES} bytes"
            )));
        }
        searched = buf.len().saturating_sub(3);
    }
}

async fn read_body<R>(reader: &mut R, mut buf: Vec<u8>, framing: BodyFraming) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    match framing {
        BodyFraming::Empty => Ok(Vec::new()),
        BodyFraming::Length(len) => {
            if len > MAX_BODY_BYTES {
                return Err(body_too_large());
            }
            fill_to(reader, &mut buf, len).await?;
            buf.truncate(len);
            Ok(buf)
        }
        BodyFraming::UntilEof => {
            let remaining = MAX_BODY_BYTES.saturating_sub(buf.len()) as u64;
            (&mut *reader)
                .take(remaining + 1)
                .read_to_end(&mut buf)
                .await
                .map_err(|e| HarnessError::io_error("reading HTTP message body", e))?;
            if buf.len() > MAX_BODY_BYTES {
                return Err(body_too_large());
            }
            Ok(buf)
        }
        BodyFraming::Chunked => {
            let end = read_chunked(reader, &mut buf).await?;
            buf.truncate(end);
            Ok(buf)
        }
    }
}

/// Walks chunked framing, keeping the bytes verbatim. Returns the offset just
/// past the final empty line.
async fn read_chunked<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut pos = 0;
    loop {
        let size_end = line_end(reader, buf, pos).await?;
        let size_line = std::str::from_utf8(&buf[pos..size_end])
            .map_err(|_| HarnessError::malformed("chunk size line is not valid UTF-8"))?;
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| HarnessError::malformed(format!("invalid chunk size: {size_hex:?}")))?;
        pos = size_end + 2;

        if size == 0 {
            // trailer section, terminated by an empty line
            loop {
                let end = line_end(reader, buf, pos).await?;
                let empty = end == pos;
                pos = end + 2;
                if empty {
                    return Ok(pos);
                }
                if pos > MAX_BODY_BYTES {
                    return Err(body_too_large());
                }
            }
        }

        let data_end = pos
            .checked_add(size)
            .filter(|end| end.saturating_add(2) <= MAX_BODY_BYTES)
            .ok_or_else(body_too_large)?;
        fill_to(reader, buf, data_end + 2).await?;
        if &buf[data_end..data_end + 2] != b"\r\n" {
            return Err(HarnessError::malformed("chunk data is not followed by CRLF"));
        }
        pos = data_end + 2;
    }
}

fn body_too_large() -> HarnessError {
    HarnessError::malformed(format!("message body exceeds {MAX_BODY_BYTES} bytes"))
}

/// Index of the next CRLF at or after `from`, reading more as needed.
async fn line_end<R>(reader: &mut R, buf: &mut Vec<u8>, from: usize) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(i) = buf[from..].windows(2).position(|w| w == b"\r\n") {
            return Ok(from + i);
        }
        if read_more(reader, buf).await? == 0 {
            return Err(HarnessError::malformed(
                "connection closed in the middle of a chunked body",
            ));
        }
    }
}

async fn fill_to<R>(reader: &mut R, buf: &mut Vec<u8>, len: usize) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    while buf.len() < len {
        if read_more(reader, buf).await? == 0 {
            return Err(HarnessError::malformed(format!(
                "body ended after {} of {} bytes",
                buf.len(),
                len
            )));
        }
    }
    Ok(())
}

async fn read_more<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    let n = reader
        .read(&mut chunk)
        .await
        .map_err(|e| HarnessError::io_error("reading HTTP message body", e))?;
    buf.extend_from_slice(&chunk[..n]);
    Ok(n)
}
