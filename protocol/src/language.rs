use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;
use strum_macros::EnumIter;
use strum_macros::EnumString;

/// Source languages the engine knows how to plan.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Language {
    Python,
    Java,
    C,
    Cpp,
}

impl Language {
    /// Parses the tag sent by the client. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::from_str(tag).ok()
    }

    /// File extension the toolchain expects for source files.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
        }
    }

    /// Infers the language of a buffer from its file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "py" => Some(Self::Python),
            "java" => Some(Self::Java),
            "c" => Some(Self::C),
            "cpp" | "cc" | "cxx" => Some(Self::Cpp),
            _ => None,
        }
    }
}
