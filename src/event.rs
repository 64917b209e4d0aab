//! Events and their wire-ready bundle form.
//!
//! An [`Event`] carries typed attribute lists for its meta, correlation, and
//! payload sections. [`EventBundle::from_events`] flattens one or more events
//! into per-type attribute columns stamped with a session id. A bundle is
//! built per publish attempt and never reused once the session rotates.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::PublisherError;
use crate::transport::{SessionToken, StreamId};

/// Typed attribute value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Single event addressed to a registered stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub stream_id: StreamId,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    #[serde(default)]
    pub meta_data: Vec<AttributeValue>,
    #[serde(default)]
    pub correlation_data: Vec<AttributeValue>,
    #[serde(default)]
    pub payload_data: Vec<AttributeValue>,
    #[serde(default)]
    pub arbitrary_data: BTreeMap<String, String>,
}

impl Event {
    /// Creates an empty event for `stream_id` timestamped now.
    pub fn new(stream_id: impl Into<StreamId>) -> Self {
        Self {
            stream_id: stream_id.into(),
            timestamp_ms: now_ms(),
            meta_data: Vec::new(),
            correlation_data: Vec::new(),
            payload_data: Vec::new(),
            arbitrary_data: BTreeMap::new(),
        }
    }

    pub fn with_timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn with_meta(mut self, value: impl Into<AttributeValue>) -> Self {
        self.meta_data.push(value.into());
        self
    }

    pub fn with_correlation(mut self, value: impl Into<AttributeValue>) -> Self {
        self.correlation_data.push(value.into());
        self
    }

    pub fn with_payload(mut self, value: impl Into<AttributeValue>) -> Self {
        self.payload_data.push(value.into());
        self
    }

    pub fn with_arbitrary(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arbitrary_data.insert(key.into(), value.into());
        self
    }

    fn attributes(&self) -> impl Iterator<Item = &AttributeValue> {
        self.meta_data
            .iter()
            .chain(self.correlation_data.iter())
            .chain(self.payload_data.iter())
    }
}

/// Wire-ready batch of events stamped with a session id.
///
/// Per event, the stream id is appended to the string column and the
/// timestamp to the long column, followed by meta, correlation, and payload
/// attributes in order, each routed to the column of its type.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EventBundle {
    session_id: SessionToken,
    event_count: u32,
    bool_attributes: Vec<bool>,
    int_attributes: Vec<i32>,
    long_attributes: Vec<i64>,
    float_attributes: Vec<f32>,
    double_attributes: Vec<f64>,
    string_attributes: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    arbitrary_data: BTreeMap<u32, BTreeMap<String, String>>,
}

impl EventBundle {
    /// Converts `events` into a bundle stamped with `session_id`.
    pub fn from_events(session_id: SessionToken, events: &[Event]) -> Result<Self, PublisherError> {
        validate_events(events)?;
        let event_count = u32::try_from(events.len())
            .map_err(|_| PublisherError::publish("too many events for one bundle", None))?;

        let mut bundle = Self {
            session_id,
            event_count,
            ..Self::default()
        };

        for (index, event) in (0u32..).zip(events) {
            bundle.string_attributes.push(event.stream_id.to_string());
            bundle.long_attributes.push(event.timestamp_ms);
            for attribute in event.attributes() {
                bundle.push(attribute);
            }
            if !event.arbitrary_data.is_empty() {
                bundle
                    .arbitrary_data
                    .insert(index, event.arbitrary_data.clone());
            }
        }

        Ok(bundle)
    }

    pub fn session_id(&self) -> &SessionToken {
        &self.session_id
    }

    pub fn event_count(&self) -> u32 {
        self.event_count
    }

    pub fn bool_attributes(&self) -> &[bool] {
        &self.bool_attributes
    }

    pub fn int_attributes(&self) -> &[i32] {
        &self.int_attributes
    }

    pub fn long_attributes(&self) -> &[i64] {
        &self.long_attributes
    }

    pub fn float_attributes(&self) -> &[f32] {
        &self.float_attributes
    }

    pub fn double_attributes(&self) -> &[f64] {
        &self.double_attributes
    }

    pub fn string_attributes(&self) -> &[String] {
        &self.string_attributes
    }

    /// Arbitrary key/value data keyed by event index within the bundle.
    pub fn arbitrary_data(&self) -> &BTreeMap<u32, BTreeMap<String, String>> {
        &self.arbitrary_data
    }

    fn push(&mut self, attribute: &AttributeValue) {
        match attribute {
            AttributeValue::Bool(value) => self.bool_attributes.push(*value),
            AttributeValue::Int(value) => self.int_attributes.push(*value),
            AttributeValue::Long(value) => self.long_attributes.push(*value),
            AttributeValue::Float(value) => self.float_attributes.push(*value),
            AttributeValue::Double(value) => self.double_attributes.push(*value),
            AttributeValue::String(value) => self.string_attributes.push(value.clone()),
        }
    }
}

/// Rejects empty batches and events that name no stream.
pub fn validate_events(events: &[Event]) -> Result<(), PublisherError> {
    if events.is_empty() {
        return Err(PublisherError::publish("no events to publish", None));
    }
    if let Some(position) = events.iter().position(|event| event.stream_id.is_empty()) {
        return Err(PublisherError::publish(
            format!("event {position} has no stream id"),
            None,
        ));
    }
    Ok(())
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
