//! In-memory `DavClient` for tool-layer tests.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    AddressBook, Calendar, CalendarObject, DavClient, DavEntry, DavError, TimeRange, VCard,
};

/// One recorded call against the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Authenticate,
    ListCalendars,
    ListCalendarObjects {
        calendar_url: String,
        range: Option<TimeRange>,
    },
    ListAddressBooks,
    ListVCards {
        address_book_url: String,
    },
    ListObjects {
        container_url: String,
    },
}

#[derive(Default)]
pub struct MockDavClient {
    pub calendars: Vec<Calendar>,
    pub events: Vec<CalendarObject>,
    pub address_books: Vec<AddressBook>,
    pub vcards: Vec<VCard>,
    pub entries: Vec<DavEntry>,
    /// Name of an operation that fails, e.g. `"list_calendars"`.
    pub fail: Option<&'static str>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockDavClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(operation: &'static str) -> Self {
        Self {
            fail: Some(operation),
            ..Self::default()
        }
    }

    pub fn with_calendars(mut self, calendars: Vec<Calendar>) -> Self {
        self.calendars = calendars;
        self
    }

    pub fn with_events(mut self, events: Vec<CalendarObject>) -> Self {
        self.events = events;
        self
    }

    pub fn with_address_books(mut self, address_books: Vec<AddressBook>) -> Self {
        self.address_books = address_books;
        self
    }

    pub fn with_vcards(mut self, vcards: Vec<VCard>) -> Self {
        self.vcards = vcards;
        self
    }

    pub fn with_entries(mut self, entries: Vec<DavEntry>) -> Self {
        self.entries = entries;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str, call: MockCall) -> Result<(), DavError> {
        self.calls.lock().unwrap().push(call);
        if self.fail == Some(operation) {
            return Err(DavError::request(operation, "HTTP 500"));
        }
        Ok(())
    }
}

pub fn calendar(url: &str, name: &str) -> Calendar {
    Calendar {
        url: url.to_string(),
        display_name: Some(name.to_string()),
        description: None,
        color: None,
    }
}

pub fn address_book(url: &str, name: &str) -> AddressBook {
    AddressBook {
        url: url.to_string(),
        display_name: Some(name.to_string()),
    }
}

#[async_trait]
impl DavClient for MockDavClient {
    async fn authenticate(&self) -> Result<(), DavError> {
        self.record("authenticate", MockCall::Authenticate)
    }

    async fn list_calendars(&self) -> Result<Vec<Calendar>, DavError> {
        self.record("list_calendars", MockCall::ListCalendars)?;
        Ok(self.calendars.clone())
    }

    async fn list_calendar_objects(
        &self,
        calendar: &Calendar,
        range: Option<TimeRange>,
    ) -> Result<Vec<CalendarObject>, DavError> {
        self.record(
            "list_calendar_objects",
            MockCall::ListCalendarObjects {
                calendar_url: calendar.url.clone(),
                range,
            },
        )?;
        Ok(self.events.clone())
    }

    async fn list_address_books(&self) -> Result<Vec<AddressBook>, DavError> {
        self.record("list_address_books", MockCall::ListAddressBooks)?;
        Ok(self.address_books.clone())
    }

    async fn list_vcards(&self, address_book: &AddressBook) -> Result<Vec<VCard>, DavError> {
        self.record(
            "list_vcards",
            MockCall::ListVCards {
                address_book_url: address_book.url.clone(),
            },
        )?;
        Ok(self.vcards.clone())
    }

    async fn list_objects(&self, container_url: &str) -> Result<Vec<DavEntry>, DavError> {
        self.record(
            "list_objects",
            MockCall::ListObjects {
                container_url: container_url.to_string(),
            },
        )?;
        Ok(self.entries.clone())
    }
}
