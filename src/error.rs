use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot open mailbox {identifier}")]
    Open {
        identifier: String,
        #[source]
        source: io::Error,
    },

    #[error("{identifier} is not {expected} mailbox")]
    Format {
        identifier: String,
        expected: &'static str,
    },

    #[error("cannot write mailbox {identifier}")]
    Write {
        identifier: String,
        #[source]
        source: io::Error,
    },

    #[error("mailbox {0} is opened read-only")]
    ReadOnly(String),

    #[error("{format} mailbox {identifier} cannot receive archived messages")]
    Unsupported {
        identifier: String,
        format: &'static str,
    },

    #[error("archive {0} is also a mailbox being archived")]
    ArchiveIsSource(String),

    #[error("mailbox {identifier} is locked by another process")]
    Locked {
        identifier: String,
        #[source]
        source: io::Error,
    },

    #[error("mailbox {0} was changed by another process during the run")]
    Changed(String),

    #[error("cannot preserve timestamps of {path:?}")]
    Timestamps {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
