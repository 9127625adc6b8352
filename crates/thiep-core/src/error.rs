use thiserror::Error;

/// Failures reported by the document store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The ordered recipient query needs an index the store does not have.
    #[error("required index is missing: {0}")]
    IndexMissing(String),

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("username already taken")]
    UsernameTaken,

    #[error("invalid registration: {0}")]
    InvalidRegistration(&'static str),

    #[error("identity backend failure: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("relay rejected the message with status {0}")]
    Rejected(u16),
}

/// Everything an explicit user action can fail with. Notification failures
/// are not among them; they are logged where the send task runs.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("sign-in failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("directory lookup failed: {0}")]
    Lookup(#[source] StoreError),

    #[error("write failed: {0}")]
    Persistence(#[source] StoreError),

    #[error("recipient index missing, results sorted locally")]
    IndexMissing,

    #[error("{0} not found")]
    NotFound(String),

    #[error("cannot {action} while in {mode} mode")]
    InvalidTransition { action: &'static str, mode: &'static str },
}

impl AppError {
    /// The user-facing notice for this failure.
    pub fn notice(&self) -> Notice {
        match self {
            Self::Validation(text) => Notice::blocking(text.clone()),
            Self::Identity(_) => Notice::blocking("Đăng nhập thất bại, vui lòng thử lại."),
            Self::Persistence(_) => Notice::blocking("Không thể lưu, vui lòng thử lại."),
            Self::IndexMissing => Notice::info(
                "Danh sách thiệp được sắp xếp tạm thời, có thể chưa đầy đủ.",
            ),
            Self::NotFound(what) => Notice::blocking(format!("Không tìm thấy {what}.")),
            Self::Lookup(_) | Self::InvalidTransition { .. } => {
                Notice::warning(self.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    /// Must be acknowledged before the user continues.
    Blocking,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, text: text.into() }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, text: text.into() }
    }

    pub fn blocking(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Blocking, text: text.into() }
    }
}
