use serde::Deserialize;
use serde::Serialize;

/// An event delivered to the client while a run is in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireEvent", from = "WireEvent")]
pub enum OutboundEvent {
    /// A chunk of terminal output, or a planning diagnostic.
    Output(String),
    /// The run has fully ended; always the last event of a run.
    Finished,
}

impl OutboundEvent {
    pub fn to_json(&self) -> String {
        match self {
            Self::Output(text) => serde_json::json!({ "output": text }).to_string(),
            Self::Finished => serde_json::json!({ "event": "finished" }).to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireEvent {
    Output { output: String },
    Lifecycle { event: LifecycleEvent },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum LifecycleEvent {
    Finished,
}

impl From<OutboundEvent> for WireEvent {
    fn from(event: OutboundEvent) -> Self {
        match event {
            OutboundEvent::Output(output) => Self::Output { output },
            OutboundEvent::Finished => Self::Lifecycle {
                event: LifecycleEvent::Finished,
            },
        }
    }
}

impl From<WireEvent> for OutboundEvent {
    fn from(event: WireEvent) -> Self {
        match event {
            WireEvent::Output { output } => Self::Output(output),
            WireEvent::Lifecycle {
                event: LifecycleEvent::Finished,
            } => Self::Finished,
        }
    }
}
