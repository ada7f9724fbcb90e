// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned wire envelope for build events.
//!
//! Readers accept any minor version of a known major (unknown fields are
//! ignored) and reject unknown event types and unknown majors.

use super::Event;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Current major.minor version of every event type this crate writes.
const EVENT_VERSIONS: &[(&str, EventVersion)] = &[
    ("initialize-task", EventVersion::new(4, 0)),
    ("start-task", EventVersion::new(4, 0)),
    ("finish-task", EventVersion::new(4, 0)),
    ("initialize-get", EventVersion::new(2, 0)),
    ("finish-get", EventVersion::new(5, 1)),
    ("initialize-put", EventVersion::new(2, 0)),
    ("finish-put", EventVersion::new(5, 1)),
    ("status", EventVersion::new(1, 0)),
    ("error", EventVersion::new(4, 1)),
    ("log", EventVersion::new(5, 1)),
];

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("unknown event type: {0}")]
    UnknownType(String),
    #[error("unsupported version {version} for event {event} (supported: {supported})")]
    UnsupportedVersion {
        event: String,
        version: EventVersion,
        supported: EventVersion,
    },
    #[error("malformed version: {0}")]
    MalformedVersion(String),
    #[error("malformed event data: {0}")]
    Data(#[from] serde_json::Error),
}

/// `major.minor` version of an event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventVersion {
    pub major: u32,
    pub minor: u32,
}

impl EventVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Version currently written for the named event type.
    pub fn current(event: &str) -> Option<EventVersion> {
        EVENT_VERSIONS.iter().find(|(name, _)| *name == event).map(|(_, v)| *v)
    }

    /// Whether a reader at `self` can decode a payload written at `other`.
    pub fn reads(&self, other: EventVersion) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for EventVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for EventVersion {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || EnvelopeError::MalformedVersion(s.to_string());
        let (major, minor) = s.split_once('.').ok_or_else(malformed)?;
        Ok(EventVersion {
            major: major.parse().map_err(|_| malformed())?,
            minor: minor.parse().map_err(|_| malformed())?,
        })
    }
}

impl Serialize for EventVersion {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventVersion {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// `{ "event": "<type>", "version": "<major>.<minor>", "data": {...} }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub version: EventVersion,
    pub data: serde_json::Value,
}

impl EventEnvelope {
    pub fn encode(event: &Event) -> Result<Self, EnvelopeError> {
        let data = match serde_json::to_value(event)? {
            serde_json::Value::Object(mut map) => {
                map.remove("data").unwrap_or(serde_json::Value::Null)
            }
            other => other,
        };
        Ok(Self { event: event.name().to_string(), version: event.version(), data })
    }

    pub fn decode(&self) -> Result<Event, EnvelopeError> {
        let supported = EventVersion::current(&self.event)
            .ok_or_else(|| EnvelopeError::UnknownType(self.event.clone()))?;
        if !supported.reads(self.version) {
            return Err(EnvelopeError::UnsupportedVersion {
                event: self.event.clone(),
                version: self.version,
                supported,
            });
        }
        let tagged = serde_json::json!({ "event": self.event, "data": self.data });
        Ok(serde_json::from_value(tagged)?)
    }
}
