use std::fmt;
use std::io;

use linkbus_frame::FrameError;
use linkbus_node::ConfigError;

// Exit code constants aligned with sysexits-style semantics.
pub const SUCCESS: i32 = 0;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const CONFIG_INVALID: i32 = 78;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::InvalidAddress(_) => CliError::new(USAGE, format!("{context}: {err}")),
        FrameError::BufferTooSmall { .. } => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn config_error(context: &str, err: ConfigError) -> CliError {
    CliError::new(CONFIG_INVALID, format!("{context}: {err}"))
}

pub fn json_error(context: &str, err: serde_json::Error) -> CliError {
    CliError::new(CONFIG_INVALID, format!("{context}: {err}"))
}
