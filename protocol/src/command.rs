use serde::Deserialize;
use serde::Serialize;

/// A request sent by the client over an execution connection.
///
/// `language` stays a free-form string here: an unrecognized tag is a planning
/// failure reported back to the client, not a malformed frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    Run {
        #[serde(default)]
        language: String,
        #[serde(default)]
        code: String,
    },
    Input {
        data: String,
    },
    Stop,
}

impl ClientCommand {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Short label used in logs; never includes user code or input.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Run { .. } => "run",
            Self::Input { .. } => "input",
            Self::Stop => "stop",
        }
    }
}
