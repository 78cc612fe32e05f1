use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("interface {name} not found")]
    InterfaceNotFound { name: String },

    #[error("socket creation failed: {0}")]
    Socket(io::Error),

    #[error("ring setup failed: {0}")]
    RingSetup(io::Error),

    #[error("mmap failed: {0}")]
    Mmap(io::Error),

    #[error("bind failed: {0}")]
    Bind(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
