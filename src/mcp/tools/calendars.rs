use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::schema::InputSchema;
use super::{ToolDescriptor, ToolHandler, find_by_url, parse_args};
use crate::client::ClientHandle;
use crate::dav::{Protocol, TimeRange};
use crate::error::{ToolError, ToolResult};

pub fn tool_defs() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "list_calendars",
            description: "List all calendars in the account, with their URLs, display names, descriptions and colors",
            failure: "Failed to list calendars",
            input_schema: InputSchema::new(),
            requires: Protocol::Calendar,
            handler: Arc::new(ListCalendars),
        },
        ToolDescriptor {
            name: "list_calendar_events",
            description: "List events in a calendar. Pass both timeRangeStart and timeRangeEnd to limit the listing to that window; otherwise every event is returned",
            failure: "Failed to list calendar events",
            input_schema: InputSchema::new()
                .required("calendarUrl", "URL of the calendar, exactly as returned by list_calendars")
                .optional("timeRangeStart", "Start of the window (ISO 8601, inclusive)")
                .optional("timeRangeEnd", "End of the window (ISO 8601, exclusive)"),
            requires: Protocol::Calendar,
            handler: Arc::new(ListCalendarEvents),
        },
    ]
}

struct ListCalendars;

#[async_trait]
impl ToolHandler for ListCalendars {
    async fn run(&self, client: &ClientHandle, _args: Value) -> ToolResult<Value> {
        let calendars = client.dav().list_calendars().await?;
        Ok(serde_json::to_value(calendars)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEventsArgs {
    calendar_url: String,
    time_range_start: Option<String>,
    time_range_end: Option<String>,
}

impl ListEventsArgs {
    /// A range only when both bounds are non-empty. A single bound is
    /// ignored and the whole calendar is fetched.
    fn time_range(&self) -> Option<TimeRange> {
        fn bound(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|s| !s.is_empty())
        }

        match (bound(&self.time_range_start), bound(&self.time_range_end)) {
            (Some(start), Some(end)) => Some(TimeRange::new(start, end)),
            (None, None) => None,
            _ => {
                tracing::debug!(
                    calendar = %self.calendar_url,
                    "only one time bound given, fetching all events"
                );
                None
            }
        }
    }
}

struct ListCalendarEvents;

#[async_trait]
impl ToolHandler for ListCalendarEvents {
    async fn run(&self, client: &ClientHandle, args: Value) -> ToolResult<Value> {
        let args: ListEventsArgs = parse_args(args)?;
        let calendars = client.dav().list_calendars().await?;
        let calendar = find_by_url(&calendars, &args.calendar_url, |c| c.url.as_str())
            .ok_or_else(|| ToolError::NotFound {
                kind: "Calendar",
                url: args.calendar_url.clone(),
            })?;

        let events = client
            .dav()
            .list_calendar_objects(calendar, args.time_range())
            .await?;
        Ok(serde_json::to_value(events)?)
    }
}
