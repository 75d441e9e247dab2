//! Freshness Module
//!
//! Parses `Cache-Control` and decides whether a response may be stored and,
//! once stored, whether it can still be served without asking the origin.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use http::header::{self, HeaderMap};
use http::StatusCode;

/// Classification of a response with respect to caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Servable from the store as is
    Fresh,
    /// Retained, but must be revalidated before reuse
    Stale,
    /// Must not be stored at all
    NotCacheable,
}

// == Cache-Control ==
/// Directives of a `Cache-Control` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub max_age: Option<u64>,
    pub no_cache: bool,
    pub no_store: bool,
    pub public: bool,
    pub private: bool,
}

impl CacheControl {
    /// Collects the directives of every `Cache-Control` header in `headers`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cc = Self::default();
        for value in headers.get_all(header::CACHE_CONTROL) {
            if let Ok(text) = value.to_str() {
                cc.merge(text);
            }
        }
        cc
    }

    /// Parses a single header value.
    pub fn parse(value: &str) -> Self {
        let mut cc = Self::default();
        cc.merge(value);
        cc
    }

    fn merge(&mut self, value: &str) {
        for directive in value.split(',') {
            let directive = directive.trim().to_ascii_lowercase();
            let (name, arg) = match directive.split_once('=') {
                Some((name, arg)) => (name.trim(), Some(arg.trim().trim_matches('"'))),
                None => (directive.as_str(), None),
            };

            match name {
                "no-store" => self.no_store = true,
                "no-cache" => self.no_cache = true,
                "public" => self.public = true,
                "private" => self.private = true,
                // An unparsable max-age counts as already expired
                "max-age" => self.max_age = Some(arg.and_then(|a| a.parse().ok()).unwrap_or(0)),
                _ => {}
            }
        }
    }
}

// == HTTP dates ==
/// Parses an HTTP-date in IMF-fixdate, RFC 850 or asctime form.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Formats an instant as an IMF-fixdate.
pub fn format_http_date(instant: DateTime<Utc>) -> String {
    instant.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn header_date(headers: &HeaderMap, name: header::HeaderName) -> Option<DateTime<Utc>> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date)
}

// == Lifetime ==
/// How long a response stays fresh after its origination.
///
/// `max-age` wins over `Expires`; `None` when neither is present. An
/// `Expires` that cannot be parsed yields a zero lifetime.
pub fn freshness_lifetime(headers: &HeaderMap, stored_at: DateTime<Utc>) -> Option<Duration> {
    let cc = CacheControl::from_headers(headers);
    if let Some(max_age) = cc.max_age {
        let secs = i64::try_from(max_age).unwrap_or(i64::MAX / 1000);
        return Some(Duration::seconds(secs.min(i64::MAX / 1000)));
    }

    let expires = headers.get(header::EXPIRES)?;
    let Some(expires) = expires.to_str().ok().and_then(parse_http_date) else {
        return Some(Duration::zero());
    };
    let origin = header_date(headers, header::DATE).unwrap_or(stored_at);
    Some((expires - origin).max(Duration::zero()))
}

// == Evaluate ==
/// Classifies a stored response at instant `now`.
///
/// Origination is the response's `Date` header, falling back to the store
/// instant. `no-cache` keeps the entry but always reports it stale.
pub fn evaluate(headers: &HeaderMap, stored_at: DateTime<Utc>, now: DateTime<Utc>) -> Freshness {
    let cc = CacheControl::from_headers(headers);
    if cc.no_store {
        return Freshness::NotCacheable;
    }

    let Some(lifetime) = freshness_lifetime(headers, stored_at) else {
        return Freshness::NotCacheable;
    };

    if cc.no_cache {
        return Freshness::Stale;
    }

    let origin = header_date(headers, header::DATE).unwrap_or(stored_at);
    if now - origin < lifetime {
        Freshness::Fresh
    } else {
        Freshness::Stale
    }
}

/// Statuses whose responses may be stored: 2xx and 3xx, except partial
/// content and `304 Not Modified`.
pub fn is_cacheable_status(status: StatusCode) -> bool {
    (status.is_success() || status.is_redirection())
        && status != StatusCode::PARTIAL_CONTENT
        && status != StatusCode::NOT_MODIFIED
}

/// Decides at receipt time whether a response may be stored.
pub fn is_storable(status: StatusCode, headers: &HeaderMap, now: DateTime<Utc>) -> bool {
    if !is_cacheable_status(status) {
        return false;
    }

    let vary_all = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.split(',').any(|token| token.trim() == "*"));
    if vary_all {
        return false;
    }

    evaluate(headers, now, now) != Freshness::NotCacheable
}
