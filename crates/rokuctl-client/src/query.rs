//! Parsers for the device's XML query responses.
//!
//! The device answers `query/apps` and the root path with small XML
//! documents. These are parsed incrementally from the event stream --
//! open-tag, text, end -- with no schema validation. Tag and attribute
//! names are matched case-insensitively; firmware versions disagree on
//! casing.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use rokuctl_core::prelude::*;

/// One installed channel, as reported by the app-listing query.
///
/// Transient -- rebuilt on every query, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRecord {
    pub id: u32,
    pub version: String,
    pub name: String,
}

/// Flat map of device-info leaf tags to their trimmed text content.
pub type DeviceInfo = BTreeMap<String, String>;

/// Parse a `query/apps` response.
///
/// Each `<app ID=.. VERSION=..>` element contributes one record; the text
/// node following the attributes is the channel name. Elements without a
/// name (self-closing, or whitespace-only text) are dropped, matching the
/// device's own contract that every listed channel has a display name.
pub fn parse_apps(xml: &str) -> Result<Vec<AppRecord>> {
    let mut reader = Reader::from_str(xml);

    let mut result = Vec::new();
    let mut pending: Option<(u32, String)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref().eq_ignore_ascii_case(b"app") => {
                pending = parse_app_attributes(&e)?;
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::protocol(format!("bad text node: {e}")))?;
                let text = text.trim();
                if !text.is_empty() {
                    if let Some((id, version)) = pending.take() {
                        result.push(AppRecord {
                            id,
                            version,
                            name: text.to_string(),
                        });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(result)
}

/// Pull ID and VERSION off an `<app>` open tag.
fn parse_app_attributes(tag: &BytesStart<'_>) -> Result<Option<(u32, String)>> {
    let mut id = None;
    let mut version = None;

    for attr in tag.attributes() {
        let attr = attr.map_err(|e| Error::protocol(format!("bad attribute: {e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| Error::protocol(format!("bad attribute value: {e}")))?;
        if attr.key.as_ref().eq_ignore_ascii_case(b"id") {
            let parsed = value
                .trim()
                .parse::<u32>()
                .map_err(|_| Error::protocol(format!("non-numeric app id '{}'", value)))?;
            id = Some(parsed);
        } else if attr.key.as_ref().eq_ignore_ascii_case(b"version") {
            version = Some(value.into_owned());
        }
    }

    Ok(id.map(|id| (id, version.unwrap_or_default())))
}

/// Parse the device-info document at the root path.
///
/// Builds a flat mapping from each leaf element's tag name to its trimmed
/// text content; a repeated tag is last-write-wins. Container elements
/// contribute nothing (their direct text is whitespace).
pub fn parse_device_info(xml: &str) -> Result<DeviceInfo> {
    let mut reader = Reader::from_str(xml);

    let mut info = DeviceInfo::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                current = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Event::End(_) => {
                current = None;
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::protocol(format!("bad text node: {e}")))?;
                let text = text.trim();
                if !text.is_empty() {
                    if let Some(tag) = &current {
                        info.insert(tag.clone(), text.to_string());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(info)
}
