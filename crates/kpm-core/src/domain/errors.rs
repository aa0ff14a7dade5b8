use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ResponseResult<T> = Result<T, ResponseError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseErrorCategory {
    Success,
    NotRequested,
    IncompleteData,
    DimensionError,
    ConfigurationError,
    UnsupportedCase,
    IoSystemError,
}

impl ResponseErrorCategory {
    pub const fn exit_placeholder(self) -> ExitPlaceholder {
        match self {
            Self::Success => ExitPlaceholder {
                exit_code: 0,
                rust_category: "Success",
            },
            Self::NotRequested => ExitPlaceholder {
                exit_code: 0,
                rust_category: "NotRequested",
            },
            Self::IncompleteData => ExitPlaceholder {
                exit_code: 2,
                rust_category: "IncompleteData",
            },
            Self::DimensionError => ExitPlaceholder {
                exit_code: 3,
                rust_category: "DimensionError",
            },
            Self::ConfigurationError => ExitPlaceholder {
                exit_code: 4,
                rust_category: "ConfigurationError",
            },
            Self::UnsupportedCase => ExitPlaceholder {
                exit_code: 5,
                rust_category: "UnsupportedCase",
            },
            Self::IoSystemError => ExitPlaceholder {
                exit_code: 6,
                rust_category: "IoSystemError",
            },
        }
    }

    pub const fn exit_code(self) -> i32 {
        self.exit_placeholder().exit_code
    }

    pub const fn rust_category(self) -> &'static str {
        self.exit_placeholder().rust_category
    }

    /// A quantity that was never requested upstream disables its pipeline
    /// without failing the run.
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success | Self::NotRequested)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitPlaceholder {
    pub exit_code: i32,
    pub rust_category: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseError {
    category: ResponseErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl ResponseError {
    pub fn new(
        category: ResponseErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn not_requested(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ResponseErrorCategory::NotRequested, placeholder, message)
    }

    pub fn incomplete_data(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ResponseErrorCategory::IncompleteData, placeholder, message)
    }

    pub fn dimension(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ResponseErrorCategory::DimensionError, placeholder, message)
    }

    pub fn configuration(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            ResponseErrorCategory::ConfigurationError,
            placeholder,
            message,
        )
    }

    pub fn unsupported_case(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ResponseErrorCategory::UnsupportedCase, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ResponseErrorCategory::IoSystemError, placeholder, message)
    }

    pub const fn category(&self) -> ResponseErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        format!("{}: [{}] {}", severity, self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for ResponseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.rust_category(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for ResponseError {}
