use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the globe, its data loaders and the event sources
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(Box<ureq::Error>),

    #[error("GeoIP database error: {0}")]
    GeoIp(#[from] maxminddb::MaxMindDBError),

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("no land polygons found in {}", .0.display())]
    EmptyAtlas(PathBuf),
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        Error::Http(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
