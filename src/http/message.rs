use std::fmt;
use url::Url;

use crate::error::{HarnessError, Result};

/// A single header line, name case preserved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLine {
    pub name: String,
    pub value: String,
}

impl HeaderLine {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request {
        method: String,
        target: String,
        version: String,
    },
    Status {
        version: String,
        code: u16,
        reason: String,
    },
}

impl fmt::Display for StartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request {
                method,
                target,
                version,
            } => write!(f, "{method} {target} {version}"),
            Self::Status {
                version,
                code,
                reason,
            } => write!(f, "{version} {code} {reason}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageKind {
    Request,
    Response,
}

/// An HTTP message kept byte-exact: start line, ordered headers, raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    start: StartLine,
    headers: Vec<HeaderLine>,
    body: Vec<u8>,
}

impl RawMessage {
    pub fn new(start: StartLine, headers: Vec<HeaderLine>, body: Vec<u8>) -> Self {
        Self {
            start,
            headers,
            body,
        }
    }

    /// Parses hand-written request text.
    ///
    /// Accepts LF or CRLF line endings and a missing blank line after the
    /// headers. A request line without a version gets `HTTP/1.1`. When the
    /// target is in absolute form and no `Host` header is present, one is
    /// added from the target's authority.
    pub fn parse_request_text(text: &str) -> Result<Self> {
        let (lines, body) = split_lenient(text);
        let (start, mut headers) = parse_head_lines(&lines, MessageKind::Request, true)?;

        if header_value(&headers, "Host").is_none() {
            if let StartLine::Request { target, .. } = &start {
                if let Some(authority) = absolute_authority(target) {
                    headers.insert(0, HeaderLine::new("Host", authority));
                }
            }
        }

        Ok(Self::new(start, headers, body.as_bytes().to_vec()))
    }

    /// Parses hand-written response text with the same leniency as requests.
    pub fn parse_response_text(text: &str) -> Result<Self> {
        let (lines, body) = split_lenient(text);
        let (start, headers) = parse_head_lines(&lines, MessageKind::Response, true)?;
        Ok(Self::new(start, headers, body.as_bytes().to_vec()))
    }

    /// Parses a complete message in wire format (CRLF line endings).
    ///
    /// The head is normalized while parsing: header values lose surrounding
    /// whitespace and [`to_bytes`](Self::to_bytes) writes every header as
    /// `name: value` and every status line with a reason, even an empty one.
    /// `HTTP/1.1 204` therefore comes back as `HTTP/1.1 204 ` and `Name:value`
    /// as `Name: value`. Only messages already in that canonical form
    /// survive `from_bytes` then `to_bytes` byte for byte. The body is kept
    /// verbatim.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let end = find_head_end(bytes)
            .ok_or_else(|| HarnessError::malformed("message head is not terminated by CRLF CRLF"))?;
        let kind = if bytes.starts_with(b"HTTP/") {
            MessageKind::Response
        } else {
            MessageKind::Request
        };
        let (start, headers) = parse_head_bytes(&bytes[..end], kind)?;
        Ok(Self::new(start, headers, bytes[end + 4..].to_vec()))
    }

    /// Serializes to wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.body.len());
        out.extend_from_slice(self.start.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        for header in &self.headers {
            out.extend_from_slice(header.name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(header.value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }

    pub fn start_line(&self) -> &StartLine {
        &self.start
    }

    pub fn headers(&self) -> &[HeaderLine] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start, StartLine::Request { .. })
    }

    pub fn method(&self) -> Option<&str> {
        match &self.start {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Status { .. } => None,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match &self.start {
            StartLine::Request { target, .. } => Some(target),
            StartLine::Status { .. } => None,
        }
    }

    /// Path component of the request target, without query or fragment.
    pub fn path(&self) -> Option<String> {
        let target = self.target()?;
        if let Ok(url) = Url::parse(target) {
            if url.has_host() {
                return Some(url.path().to_string());
            }
        }
        let end = target.find(['?', '#']).unwrap_or(target.len());
        Some(target[..end].to_string())
    }

    pub fn status_code(&self) -> Option<u16> {
        match &self.start {
            StartLine::Status { code, .. } => Some(*code),
            StartLine::Request { .. } => None,
        }
    }

    pub fn version(&self) -> &str {
        match &self.start {
            StartLine::Request { version, .. } | StartLine::Status { version, .. } => version,
        }
    }

    /// First header with the given name, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    pub fn content_length(&self) -> Result<Option<usize>> {
        content_length(&self.headers)
    }

    pub fn is_chunked(&self) -> bool {
        is_chunked(&self.headers)
    }

    /// `host:port` this request should be sent to, port 80 by default.
    pub fn target_address(&self) -> Result<String> {
        let authority = self
            .header("Host")
            .map(str::to_string)
            .or_else(|| self.target().and_then(absolute_authority))
            .ok_or_else(|| {
                HarnessError::malformed("request has no Host header and no absolute target")
            })?;
        Ok(with_default_port(&authority, 80))
    }
}

impl fmt::Display for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

pub(crate) fn find_head_end(bytes: &[u8]) -> Option<usize> {
    bytes.windows(4).position(|w| w == b"\r\n\r\n")
}

pub(crate) fn parse_head_bytes(
    head: &[u8],
    kind: MessageKind,
) -> Result<(StartLine, Vec<HeaderLine>)> {
    let head = std::str::from_utf8(head)
        .map_err(|_| HarnessError::malformed("message head is not valid UTF-8"))?;
    let lines: Vec<&str> = head.split("\r\n").collect();
    parse_head_lines(&lines, kind, false)
}

pub(crate) fn parse_head_lines(
    lines: &[&str],
    kind: MessageKind,
    lenient: bool,
) -> Result<(StartLine, Vec<HeaderLine>)> {
    let (first, rest) = lines
        .split_first()
        .ok_or_else(|| HarnessError::malformed("empty message"))?;

    let start = match kind {
        MessageKind::Request => parse_request_line(first, lenient)?,
        MessageKind::Response => parse_status_line(first)?,
    };

    let headers = rest
        .iter()
        .map(|line| parse_header_line(line))
        .collect::<Result<Vec<_>>>()?;

    Ok((start, headers))
}

fn parse_request_line(line: &str, lenient: bool) -> Result<StartLine> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let (method, target, version) = match parts.as_slice() {
        [method, target, version] => (*method, *target, *version),
        [method, target] if lenient => (*method, *target, "HTTP/1.1"),
        _ => {
            return Err(HarnessError::malformed(format!(
                "invalid request line: {line:?}"
            )))
        }
    };

    if !method.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(HarnessError::malformed(format!("invalid method: {method:?}")));
    }
    if !version.starts_with("HTTP/") {
        return Err(HarnessError::malformed(format!(
            "invalid HTTP version: {version:?}"
        )));
    }

    Ok(StartLine::Request {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
    })
}

fn parse_status_line(line: &str) -> Result<StartLine> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    let code = parts.next().unwrap_or_default();
    let reason = parts.next().unwrap_or_default();

    if !version.starts_with("HTTP/") {
        return Err(HarnessError::malformed(format!(
            "invalid status line: {line:?}"
        )));
    }
    let code = match code.parse::<u16>() {
        Ok(code) if code.to_string().len() == 3 => code,
        _ => {
            return Err(HarnessError::malformed(format!(
                "invalid status code in: {line:?}"
            )))
        }
    };

    Ok(StartLine::Status {
        version: version.to_string(),
        code,
        reason: reason.to_string(),
    })
}

fn parse_header_line(line: &str) -> Result<HeaderLine> {
    if line.starts_with([' ', '\t']) {
        return Err(HarnessError::malformed(format!(
            "folded header lines are not supported: {line:?}"
        )));
    }
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| HarnessError::malformed(format!("invalid header line: {line:?}")))?;
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(HarnessError::malformed(format!(
            "invalid header name: {name:?}"
        )));
    }
    Ok(HeaderLine::new(name, value.trim()))
}

/// Splits text into head lines and the body, tolerating LF line endings.
fn split_lenient(text: &str) -> (Vec<&str>, &str) {
    let mut lines = Vec::new();
    let mut rest = text;
    loop {
        if rest.is_empty() {
            return (lines, "");
        }
        let (line, next) = match rest.find('\n') {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            if lines.is_empty() {
                rest = next;
                continue;
            }
            return (lines, next);
        }
        lines.push(line);
        rest = next;
    }
}

pub(crate) fn header_value<'a>(headers: &'a [HeaderLine], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

pub(crate) fn content_length(headers: &[HeaderLine]) -> Result<Option<usize>> {
    match header_value(headers, "Content-Length") {
        None => Ok(None),
        Some(value) => value.parse::<usize>().map(Some).map_err(|_| {
            HarnessError::malformed(format!("invalid Content-Length: {value:?}"))
        }),
    }
}

pub(crate) fn is_chunked(headers: &[HeaderLine]) -> bool {
    header_value(headers, "Transfer-Encoding")
        .map(|v| {
            v.rsplit(',')
                .next()
                .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"))
        })
        .unwrap_or(false)
}

fn absolute_authority(target: &str) -> Option<String> {
    let url = Url::parse(target).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn with_default_port(authority: &str, port: u16) -> String {
    let has_port = if authority.starts_with('[') {
        authority.contains("]:")
    } else {
        authority.contains(':')
    };
    if has_port {
        authority.to_string()
    } else {
        format!("{authority}:{port}")
    }
}
