//! Cache Entry Module
//!
//! One stored response and its byte form. Entries are written as a small
//! metadata block followed by an HTTP/1.1 response dump:
//!
//! ```text
//! stored-at: 2026-10-18T12:00:00.000000000Z
//! varied-accept: application/json
//!
//! HTTP/1.1 200 OK
//! cache-control: max-age=300
//!
//! <body>
//! ```
//!
//! The metadata block carries the store instant and the request values of
//! `Vary`-listed headers. It is parsed on its own, so origin headers of any
//! name pass through the response dump untouched.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, SecondsFormat, Utc};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Response, StatusCode};

use crate::error::{CacheError, Result};
use crate::freshness::format_http_date;

/// Metadata field carrying the instant the entry was stored.
pub const STORED_AT_FIELD: &str = "stored-at";

/// Prefix of the metadata fields carrying varied request header values.
pub const VARIED_PREFIX: &str = "varied-";

// Slot count of the first parse attempt, doubled while httparse runs out.
const INITIAL_HEADER_SLOTS: usize = 64;

// Never copied from a 304 onto the stored response.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

// == Cache Entry ==
/// A stored response.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// When the response was stored or last revalidated
    pub stored_at: DateTime<Utc>,
    /// Request values of the headers named by the response's `Vary`, an
    /// empty value standing for an absent header
    pub varied: Vec<(HeaderName, HeaderValue)>,
}

impl CacheEntry {
    // == Constructor ==
    /// Captures a response received at `stored_at`.
    ///
    /// `request_headers` are the headers of the request that produced the
    /// response; they are consulted only for the names listed in `Vary`.
    pub fn from_response(
        response: &Response<Bytes>,
        request_headers: &HeaderMap,
        stored_at: DateTime<Utc>,
    ) -> Self {
        let varied = vary_names(response.headers())
            .into_iter()
            .map(|name| {
                let value = request_headers
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| HeaderValue::from_static(""));
                (name, value)
            })
            .collect();

        Self {
            status: response.status(),
            headers: response.headers().clone(),
            body: response.body().clone(),
            stored_at,
            varied,
        }
    }

    // == Response ==
    /// Rebuilds a response from the stored parts.
    pub fn to_response(&self) -> Response<Bytes> {
        let mut response = Response::new(self.body.clone());
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }

    // == Vary ==
    /// True if the request carries the same values for every varied header.
    pub fn matches_vary(&self, request_headers: &HeaderMap) -> bool {
        self.varied.iter().all(|(name, stored)| {
            let current = request_headers
                .get(name)
                .map(HeaderValue::as_bytes)
                .unwrap_or_default();
            current == stored.as_bytes()
        })
    }

    // == Refresh ==
    /// Applies a `304 Not Modified` to the entry.
    ///
    /// End-to-end headers of the 304 replace the stored ones of the same
    /// name and the store instant moves to `now`. The body is kept. Without a
    /// `Date` on the 304 the stored one is moved to `now`, otherwise the entry
    /// would still count its age from the original response.
    pub fn refresh(&mut self, not_modified: &HeaderMap, now: DateTime<Utc>) {
        for name in not_modified.keys() {
            if HOP_BY_HOP.contains(&name.as_str()) {
                continue;
            }
            self.headers.remove(name);
            for value in not_modified.get_all(name) {
                self.headers.append(name.clone(), value.clone());
            }
        }
        if !not_modified.contains_key(header::DATE) {
            if let Ok(date) = HeaderValue::from_str(&format_http_date(now)) {
                self.headers.insert(header::DATE, date);
            }
        }
        self.stored_at = now;
    }

    // == Encode ==
    /// Serializes the entry into its stored byte form.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.body.len() + 256);

        let stored_at = self.stored_at.to_rfc3339_opts(SecondsFormat::Nanos, true);
        put_header(&mut buf, STORED_AT_FIELD.as_bytes(), stored_at.as_bytes());
        for (name, value) in &self.varied {
            let mut field = Vec::with_capacity(VARIED_PREFIX.len() + name.as_str().len());
            field.extend_from_slice(VARIED_PREFIX.as_bytes());
            field.extend_from_slice(name.as_str().as_bytes());
            put_header(&mut buf, &field, value.as_bytes());
        }
        buf.put_slice(b"\r\n");

        buf.put_slice(b"HTTP/1.1 ");
        buf.put_slice(self.status.as_str().as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(self.status.canonical_reason().unwrap_or("").as_bytes());
        buf.put_slice(b"\r\n");
        for (name, value) in &self.headers {
            put_header(&mut buf, name.as_str().as_bytes(), value.as_bytes());
        }
        buf.put_slice(b"\r\n");

        buf.put_slice(&self.body);
        buf.freeze()
    }

    // == Decode ==
    /// Parses the stored byte form back into an entry.
    ///
    /// # Errors
    /// [`CacheError::MalformedEntry`] if either block is incomplete or
    /// invalid, or the store instant is missing.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let (meta_len, meta) = parse_metadata(raw)?;

        let mut stored_at = None;
        let mut varied = Vec::new();
        for (field, value) in meta {
            if field == STORED_AT_FIELD {
                let text = value.to_str().map_err(malformed)?;
                let instant = DateTime::parse_from_rfc3339(text).map_err(malformed)?;
                stored_at = Some(instant.with_timezone(&Utc));
            } else if let Some(varied_name) = field.strip_prefix(VARIED_PREFIX) {
                let name = HeaderName::from_bytes(varied_name.as_bytes()).map_err(malformed)?;
                varied.push((name, value));
            }
        }
        let stored_at = stored_at.ok_or_else(|| malformed("missing store instant"))?;

        let raw = &raw[meta_len..];
        let (head_len, status, headers) = parse_response_head(raw)?;

        Ok(Self {
            status,
            headers,
            body: Bytes::copy_from_slice(&raw[head_len..]),
            stored_at,
            varied,
        })
    }
}

/// Parses the metadata block into lower-cased field names and values.
fn parse_metadata(raw: &[u8]) -> Result<(usize, Vec<(String, HeaderValue)>)> {
    let mut slots = INITIAL_HEADER_SLOTS;
    loop {
        let mut parsed = vec![httparse::EMPTY_HEADER; slots];
        match httparse::parse_headers(raw, &mut parsed) {
            Ok(httparse::Status::Complete((len, fields))) => {
                let fields = fields
                    .iter()
                    .map(|f| {
                        let value = HeaderValue::from_bytes(f.value).map_err(malformed)?;
                        Ok((f.name.to_ascii_lowercase(), value))
                    })
                    .collect::<Result<Vec<_>>>()?;
                return Ok((len, fields));
            }
            Ok(httparse::Status::Partial) => return Err(malformed("truncated metadata")),
            Err(httparse::Error::TooManyHeaders) => slots *= 2,
            Err(e) => return Err(malformed(e)),
        }
    }
}

/// Parses the status line and headers of the response dump.
fn parse_response_head(raw: &[u8]) -> Result<(usize, StatusCode, HeaderMap)> {
    let mut slots = INITIAL_HEADER_SLOTS;
    loop {
        let mut parsed_headers = vec![httparse::EMPTY_HEADER; slots];
        let mut parsed = httparse::Response::new(&mut parsed_headers);
        match parsed.parse(raw) {
            Ok(httparse::Status::Complete(len)) => {
                let code = parsed.code.ok_or_else(|| malformed("missing status code"))?;
                let status = StatusCode::from_u16(code).map_err(malformed)?;

                let mut headers = HeaderMap::with_capacity(parsed.headers.len());
                for h in parsed.headers.iter() {
                    let name = HeaderName::from_bytes(h.name.as_bytes()).map_err(malformed)?;
                    let value = HeaderValue::from_bytes(h.value).map_err(malformed)?;
                    headers.append(name, value);
                }
                return Ok((len, status, headers));
            }
            Ok(httparse::Status::Partial) => return Err(malformed("truncated response head")),
            Err(httparse::Error::TooManyHeaders) => slots *= 2,
            Err(e) => return Err(malformed(e)),
        }
    }
}

/// Header names listed by a response's `Vary`, lower-cased and deduplicated.
///
/// `*` is skipped here; such responses are never stored.
pub fn vary_names(headers: &HeaderMap) -> Vec<HeaderName> {
    let mut names: Vec<HeaderName> = Vec::new();
    for value in headers.get_all(header::VARY) {
        let Ok(text) = value.to_str() else { continue };
        for token in text.split(',') {
            let token = token.trim();
            if token.is_empty() || token == "*" {
                continue;
            }
            if let Ok(name) = HeaderName::from_bytes(token.to_ascii_lowercase().as_bytes()) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
    }
    names
}

fn put_header(buf: &mut BytesMut, name: &[u8], value: &[u8]) {
    buf.put_slice(name);
    buf.put_slice(b": ");
    buf.put_slice(value);
    buf.put_slice(b"\r\n");
}

fn malformed(reason: impl ToString) -> CacheError {
    CacheError::MalformedEntry(reason.to_string())
}
