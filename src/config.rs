use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::error::{CompileError, CompileResult, ErrorKind};

/// Knobs for one compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileOptions {
    #[serde(default)]
    pub root_text: RootTextPolicy,

    #[serde(default = "default_false")]
    pub allow_empty_messages: bool,

    /// `x = 1` on an undeclared `x` declares it instead of failing.
    #[serde(default = "default_false")]
    pub implicit_declarations: bool,

    #[serde(default = "default_timeout", with = "duration_ms")]
    pub timeout: Option<Duration>,

    /// Name under which the current UNIX time (ms) is pre-bound.
    #[serde(default)]
    pub current_time_binding: Option<String>,
}

/// What happens to text written outside of any message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootTextPolicy {
    /// Grouped into a system message.
    #[default]
    System,
    Discard,
    /// Fails with `StrayTextOutsideMessage`.
    Reject,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            root_text: RootTextPolicy::default(),
            allow_empty_messages: default_false(),
            implicit_declarations: default_false(),
            timeout: default_timeout(),
            current_time_binding: None,
        }
    }
}

impl CompileOptions {
    pub fn from_file<P: AsRef<Path>>(path: P) -> CompileResult<Self> {
        from_file(path)
    }

    pub fn from_str(s: &str) -> CompileResult<Self> {
        from_str(s)
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> CompileResult<T> {
    let file = File::open(path).map_err(|e| config_error(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| config_error(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> CompileResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| config_error(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

fn config_error(message: String) -> CompileError {
    CompileError::from(ErrorKind::InvalidConfig(message))
}

fn default_false() -> bool {
    false
}

fn default_timeout() -> Option<Duration> {
    None
}

// Option<Duration> as milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
