//! DAV client collaborator: the trait the tool layer calls, the records it
//! returns, and the `libdav`-backed implementation.

pub mod http;
pub mod ical;
#[cfg(test)]
pub mod mock;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use self::ical::{ContactFields, EventFields};

pub use self::http::HttpDavClient;

/// The three DAV protocol families a provider may speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Calendar,
    Contact,
    File,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::Calendar, Protocol::Contact, Protocol::File];

    pub fn name(self) -> &'static str {
        match self {
            Protocol::Calendar => "CalDAV",
            Protocol::Contact => "CardDAV",
            Protocol::File => "WebDAV",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Errors raised while talking to a DAV server.
#[derive(Debug, thiserror::Error)]
pub enum DavError {
    /// A DAV request failed: transport, authentication, HTTP status or an
    /// unparseable response, as reported by `libdav`.
    #[error("{operation} failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },

    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("'{url}' cannot be used as a request URI: {source}")]
    InvalidUri {
        url: String,
        #[source]
        source: ::http::uri::InvalidUri,
    },

    #[error("invalid time range value '{0}', expected an ISO 8601 date or date-time")]
    InvalidTimeRange(String),

    #[error("{0} client used before authenticating")]
    NotAuthenticated(Protocol),
}

impl DavError {
    pub fn request(operation: &'static str, err: impl fmt::Display) -> Self {
        DavError::Request {
            operation,
            message: err.to_string(),
        }
    }
}

/// A calendar collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    /// Absolute URL; the identifier callers pass back to list events.
    pub url: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

/// An address book collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBook {
    pub url: String,
    pub display_name: Option<String>,
}

/// One calendar resource with its raw iCalendar payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarObject {
    pub url: String,
    pub etag: Option<String>,
    pub data: String,
    #[serde(flatten)]
    pub fields: EventFields,
}

impl CalendarObject {
    pub fn new(url: impl Into<String>, etag: Option<String>, data: impl Into<String>) -> Self {
        let data = data.into();
        Self {
            url: url.into(),
            etag,
            fields: EventFields::extract(&data),
            data,
        }
    }
}

/// One contact resource with its raw vCard payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VCard {
    pub url: String,
    pub etag: Option<String>,
    pub data: String,
    #[serde(flatten)]
    pub fields: ContactFields,
}

impl VCard {
    pub fn new(url: impl Into<String>, etag: Option<String>, data: impl Into<String>) -> Self {
        let data = data.into();
        Self {
            url: url.into(),
            etag,
            fields: ContactFields::extract(&data),
            data,
        }
    }
}

/// A file or folder reported by a WebDAV listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DavEntry {
    pub url: String,
    pub is_collection: bool,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// Half-open time window `[start, end)` for event listing, as ISO 8601 strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Both bounds in the CalDAV UTC form, e.g. `20260301T000000Z`.
    pub fn to_caldav(&self) -> Result<(String, String), DavError> {
        Ok((caldav_timestamp(&self.start)?, caldav_timestamp(&self.end)?))
    }
}

/// Convert an ISO 8601 date or date-time to `YYYYMMDDTHHMMSSZ`.
/// Values without an offset are taken as UTC.
fn caldav_timestamp(value: &str) -> Result<String, DavError> {
    const CALDAV_FORMAT: &str = "%Y%m%dT%H%M%SZ";
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc).format(CALDAV_FORMAT).to_string());
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, pattern) {
            return Ok(naive.and_utc().format(CALDAV_FORMAT).to_string());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| DavError::InvalidTimeRange(value.to_string()))?;
        return Ok(midnight.and_utc().format(CALDAV_FORMAT).to_string());
    }

    Err(DavError::InvalidTimeRange(value.to_string()))
}

/// Operations the tool layer needs from a DAV server. One implementation
/// instance is bound to one base address and one set of credentials.
#[async_trait]
pub trait DavClient: Send + Sync {
    /// Verify credentials and discover the account's home collection.
    /// Safe to call repeatedly.
    async fn authenticate(&self) -> Result<(), DavError>;

    async fn list_calendars(&self) -> Result<Vec<Calendar>, DavError>;

    /// Fetch events of `calendar`, restricted to `range` when one is given.
    async fn list_calendar_objects(
        &self,
        calendar: &Calendar,
        range: Option<TimeRange>,
    ) -> Result<Vec<CalendarObject>, DavError>;

    async fn list_address_books(&self) -> Result<Vec<AddressBook>, DavError>;

    async fn list_vcards(&self, address_book: &AddressBook) -> Result<Vec<VCard>, DavError>;

    /// List the entries of the collection at `container_url`.
    async fn list_objects(&self, container_url: &str) -> Result<Vec<DavEntry>, DavError>;
}
