
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Opening the transport failed, or the instrument never answered the
    /// identification query.
    #[error("unable to connect to instrument: {0}")]
    Connection(String),

    /// The sample array can't be encoded for upload (wrong length).
    #[error("unable to encode sample array: {0}")]
    Encoding(String),

    #[error(transparent)]
    Serial(#[from] serialport::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
