//! Line-based field extraction from iCalendar and vCard payloads.
//!
//! The raw payload is always returned to the caller untouched; these fields
//! are a convenience summary next to it.

use serde::{Deserialize, Serialize};

/// Summary fields of the first VEVENT in an iCalendar payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFields {
    pub uid: Option<String>,
    pub summary: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub location: Option<String>,
}

impl EventFields {
    pub fn extract(ical_data: &str) -> Self {
        let mut fields = Self::default();
        let mut in_event = false;
        let mut seen_event = false;

        for line in unfold_lines(ical_data) {
            let line = line.trim();

            if line.eq_ignore_ascii_case("BEGIN:VEVENT") {
                in_event = !seen_event;
                continue;
            }
            if line.eq_ignore_ascii_case("END:VEVENT") {
                if in_event {
                    seen_event = true;
                }
                in_event = false;
                continue;
            }

            // UID may sit at VCALENDAR level in some implementations
            if !in_event && !line.starts_with("UID") {
                continue;
            }

            if let Some(value) = extract_property(line, "UID") {
                fields.uid.get_or_insert(value);
            } else if let Some(value) = extract_property(line, "SUMMARY") {
                fields.summary = Some(unescape_text(&value));
            } else if let Some(value) = extract_property(line, "DTSTART") {
                fields.start = Some(value);
            } else if let Some(value) = extract_property(line, "DTEND") {
                fields.end = Some(value);
            } else if let Some(value) = extract_property(line, "LOCATION") {
                fields.location = Some(unescape_text(&value));
            }
        }

        fields
    }

    /// Whether the event overlaps the half-open window `[start, end)`, both
    /// bounds in CalDAV UTC form (`20260301T000000Z`). Events without a
    /// DTSTART never match; one without DTEND is an instant.
    pub fn overlaps(&self, start: &str, end: &str) -> bool {
        let Some(event_start) = self.start.as_deref().map(utc_stamp) else {
            return false;
        };
        match self.end.as_deref().map(utc_stamp) {
            Some(event_end) => event_start.as_str() < end && event_end.as_str() > start,
            None => event_start.as_str() < end && event_start.as_str() >= start,
        }
    }
}

/// Normalize a DATE or DATE-TIME value to `YYYYMMDDTHHMMSSZ` so values
/// compare as strings. Floating and TZID-qualified times are taken as UTC.
fn utc_stamp(value: &str) -> String {
    let value = value.trim();
    match value.len() {
        8 => format!("{value}T000000Z"),
        15 => format!("{value}Z"),
        _ => value.to_string(),
    }
}

/// Summary fields of a vCard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFields {
    pub uid: Option<String>,
    pub full_name: Option<String>,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub organization: Option<String>,
}

impl ContactFields {
    pub fn extract(vcard_data: &str) -> Self {
        let mut fields = Self::default();

        for line in unfold_lines(vcard_data) {
            // Grouped properties look like "item1.EMAIL;TYPE=INTERNET:..."
            let line = line.trim();
            let line = match line.split_once('.') {
                Some((group, rest)) if !group.contains([':', ';']) => rest,
                _ => line,
            };

            if let Some(value) = extract_property(line, "UID") {
                fields.uid = Some(value);
            } else if let Some(value) = extract_property(line, "FN") {
                fields.full_name = Some(unescape_text(&value));
            } else if let Some(value) = extract_property(line, "EMAIL") {
                fields.emails.push(value);
            } else if let Some(value) = extract_property(line, "TEL") {
                fields.phones.push(value);
            } else if let Some(value) = extract_property(line, "ORG") {
                let org = value.replace(';', " ").trim().to_string();
                fields.organization = Some(unescape_text(&org));
            }
        }

        fields
    }
}

/// Extract a property value, handling parameters (e.g. `DTSTART;TZID=...:20260301T090000`).
fn extract_property(line: &str, name: &str) -> Option<String> {
    let head = line.get(..name.len())?;
    if !head.eq_ignore_ascii_case(name) {
        return None;
    }
    let rest = &line[name.len()..];
    if let Some(stripped) = rest.strip_prefix(':') {
        return Some(stripped.to_string());
    }
    if rest.starts_with(';') {
        // Has parameters; the value starts after the first colon
        let colon_pos = rest.find(':')?;
        return Some(rest[colon_pos + 1..].to_string());
    }
    None
}

/// Undo RFC 5545/6350 TEXT escaping.
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Unfold content line continuations (lines starting with space or tab).
fn unfold_lines(data: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();

    for raw_line in data.lines() {
        let line = raw_line.trim_end_matches('\r');

        if line.starts_with(' ') || line.starts_with('\t') {
            current.push_str(&line[1..]);
        } else {
            if !current.is_empty() {
                result.push(current);
            }
            current = line.to_string();
        }
    }
    if !current.is_empty() {
        result.push(current);
    }

    result
}
