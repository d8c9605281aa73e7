use std::fmt;

use serde::Serialize;

/// Every frame on the signaling socket, and every broadcast on a data
/// channel, is one of these. `data` carries the JSON encoded payload as a
/// string.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Envelope {
    pub event: String,
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Id,
    Candidate,
    Answer,
    Offer,
    Panning,
    Drawing,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Id => "id",
            Event::Candidate => "candidate",
            Event::Answer => "answer",
            Event::Offer => "offer",
            Event::Panning => "panning",
            Event::Drawing => "drawing",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        let event = match tag {
            "id" => Event::Id,
            "candidate" => Event::Candidate,
            "answer" => Event::Answer,
            "offer" => Event::Offer,
            "panning" => Event::Panning,
            "drawing" => Event::Drawing,
            _ => return None,
        };
        Some(event)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Envelope {
    pub fn new<S: Into<String>>(event: Event, data: S) -> Self {
        Self {
            event: event.as_str().to_string(),
            data: data.into(),
        }
    }

    /// Serializes `payload` into the `data` field.
    pub fn with_payload<T: Serialize>(event: Event, payload: &T) -> serde_json::Result<Self> {
        Ok(Self::new(event, serde_json::to_string(payload)?))
    }

    pub fn kind(&self) -> Option<Event> {
        Event::parse(&self.event)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
