//! Engine configuration, loaded from an optional `coderun.toml`.
//!
//! Every field has a default so an empty (or absent) file yields a working
//! engine that writes scratch files under the OS temp directory and invokes
//! the usual toolchain binaries from `PATH`.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_TOML_FILE: &str = "coderun.toml";

const DEFAULT_TERMINATE_GRACE_MS: u64 = 2_000;
const DEFAULT_READ_CHUNK_BYTES: usize = 1024;
const DEFAULT_OUTBOUND_BUFFER: usize = 256;
const MAX_READ_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub scratch: ScratchConfig,
    pub session: SessionConfig,
    pub toolchains: ToolchainConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScratchConfig {
    /// Directory under which per-run source files and build outputs are
    /// created. Falls back to the OS temp directory.
    pub root: Option<PathBuf>,
}

impl ScratchConfig {
    pub fn resolved_root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// How long `terminate` waits after SIGTERM before force-killing.
    pub terminate_grace_ms: u64,
    /// Size of each blocking read from the pty master.
    pub read_chunk_bytes: usize,
    /// Capacity of the per-session outbound event channel.
    pub outbound_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            terminate_grace_ms: DEFAULT_TERMINATE_GRACE_MS,
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

impl SessionConfig {
    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig {
    pub python: String,
    pub c_compiler: String,
    pub cpp_compiler: String,
    pub java_compiler: String,
    pub java_runtime: String,
    /// JVM heap flags passed to the runtime, and to `javac` with a `-J` prefix.
    pub java_heap_flags: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            c_compiler: "gcc".to_string(),
            cpp_compiler: "g++".to_string(),
            java_compiler: "javac".to_string(),
            java_runtime: "java".to_string(),
            java_heap_flags: vec!["-Xms32m".to_string(), "-Xmx128m".to_string()],
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents, path)
    }

    /// Loads `explicit` when given. Otherwise picks up `coderun.toml` from the
    /// working directory if present, and falls back to defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let local = Path::new(CONFIG_TOML_FILE);
        if local.is_file() {
            return Self::load(local);
        }
        Ok(Self::default())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let chunk = self.session.read_chunk_bytes;
        if chunk == 0 || chunk > MAX_READ_CHUNK_BYTES {
            return Err(ConfigError::Invalid(format!(
                "session.read_chunk_bytes must be between 1 and {MAX_READ_CHUNK_BYTES}, got {chunk}"
            )));
        }
        if self.session.outbound_buffer == 0 {
            return Err(ConfigError::Invalid(
                "session.outbound_buffer must be positive".to_string(),
            ));
        }
        let toolchains = &self.toolchains;
        for (field, value) in [
            ("python", &toolchains.python),
            ("c_compiler", &toolchains.c_compiler),
            ("cpp_compiler", &toolchains.cpp_compiler),
            ("java_compiler", &toolchains.java_compiler),
            ("java_runtime", &toolchains.java_runtime),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "toolchains.{field} must not be empty"
                )));
            }
        }
        Ok(())
    }
}
