use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not find config file {}", path.display())]
    ConfigMissing { path: PathBuf },

    #[error("could not parse config file: {0}")]
    ConfigParse(#[from] ::config::ConfigError),

    #[error("config is missing required key `{key}`")]
    ConfigIncomplete { key: &'static str },

    #[error("could not serialize config: {0}")]
    ConfigSerialize(#[from] serde_yaml::Error),

    #[error("could not write config file {}: {source}", path.display())]
    ConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("could not connect to {server}: {reason}")]
    Connection { server: String, reason: String },

    #[error("login rejected by mail server: {0}")]
    Authentication(String),

    #[error("invalid email address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("mailing list has no valid recipient")]
    NoRecipients,

    #[error("mail server refused all {count} recipient(s)")]
    RecipientsRefused { count: usize },

    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("could not send message: {0}")]
    Transport(String),

    #[error("unknown event `{0}`")]
    UnknownEvent(String),
}

pub type Result<T> = std::result::Result<T, Error>;
