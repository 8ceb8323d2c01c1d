// SPDX-License-Identifier: MIT OR Apache-2.0

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server returned error status: {0}")]
    HttpStatus(u16),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("failed to parse json document: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

macro_rules! error_ctor {
    ($($name:ident => $variant:ident),* $(,)?) => {
        $(
            pub fn $name(msg: impl Into<String>) -> Self {
                Self::$variant(msg.into())
            }
        )*
    };
}

impl Error {
    error_ctor!(
        invalid_url => InvalidUrl,
        malformed => MalformedDocument,
        invalid_version => InvalidVersion,
        invalid_date => InvalidDate,
        config => Config,
        other => Other,
    );

    /// returns true for failures raised before any feed data was parsed.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::HttpStatus(_) | Self::Io(_))
    }
}
