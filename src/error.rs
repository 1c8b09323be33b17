use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read {archive}:{file_id}.{extension}: {message}")]
    ArchiveRead {
        archive: String,
        file_id: u32,
        extension: String,
        message: String,
    },

    #[error("Conversion failed for {entry}: {message}")]
    Conversion { entry: String, message: String },

    #[error("Encoder '{program}' failed: {message}")]
    Encoder {
        program: String,
        message: String,
        diagnostics: String,
    },

    #[error("Encoder '{program}' timed out after {seconds} seconds")]
    EncoderTimeout { program: String, seconds: u64 },

    #[error("Metadata producer '{producer}' failed: {message}")]
    Aggregation { producer: String, message: String },

    #[error("Operation was cancelled by user")]
    Cancelled,

    #[error("Path validation failed: {path}")]
    InvalidPath { path: String },
}

impl MediaError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        MediaError::Config {
            message: message.into(),
        }
    }

    pub fn conversion<E: Into<String>, M: Into<String>>(entry: E, message: M) -> Self {
        MediaError::Conversion {
            entry: entry.into(),
            message: message.into(),
        }
    }

    /// Errors that stop the whole batch. Everything else is scoped to a
    /// single entry or metadata producer.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MediaError::Config { .. } | MediaError::Cancelled)
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for MediaError {
    fn user_message(&self) -> String {
        match self {
            MediaError::Config { message } => format!("Configuration error: {}", message),
            MediaError::ArchiveRead {
                archive,
                file_id,
                extension,
                message,
            } => format!(
                "Could not read {}/{}.{}: {}",
                archive, file_id, extension, message
            ),
            MediaError::Encoder {
                program,
                message,
                diagnostics,
            } => {
                let first_line = diagnostics.lines().find(|l| !l.trim().is_empty());
                match first_line {
                    Some(line) => format!("Encoder {} failed: {} ({})", program, message, line.trim()),
                    None => format!("Encoder {} failed: {}", program, message),
                }
            }
            MediaError::EncoderTimeout { program, seconds } => {
                format!("Encoder {} did not finish within {} seconds", program, seconds)
            }
            MediaError::Cancelled => "Operation was cancelled by user".to_string(),
            MediaError::InvalidPath { path } => format!("Invalid file path: {}", path),
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            MediaError::Config { .. } => Some(
                "Check your configuration file and --extract rules. Rules have the form archive:fileid.ext, e.g. graphics:*.slp or *:*.*".to_string()
            ),
            MediaError::Encoder { .. } => Some(
                "Install opus-tools (opusenc) or point --encoder at a compatible program. Use --no-opus to keep the uncompressed wave files.".to_string()
            ),
            MediaError::EncoderTimeout { .. } => Some(
                "Increase the limit with --encoder-timeout or skip re-encoding with --no-opus.".to_string()
            ),
            MediaError::InvalidPath { .. } => Some(
                "Archive and file names must not contain path separators or parent directory references.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for MediaError {
    fn from(error: toml::de::Error) -> Self {
        MediaError::Config {
            message: error.to_string(),
        }
    }
}

impl From<image::ImageError> for MediaError {
    fn from(error: image::ImageError) -> Self {
        match error {
            image::ImageError::IoError(e) => MediaError::Io(e),
            other => MediaError::Conversion {
                entry: "image".to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for MediaError {
    fn from(error: serde_json::Error) -> Self {
        MediaError::Conversion {
            entry: "json".to_string(),
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
