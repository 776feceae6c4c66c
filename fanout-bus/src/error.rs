//! Error taxonomy shared by the input, the outputs and the fan-out loop.

use std::fmt::Display;
use std::io;

use thiserror::Error;

use crate::sink::SinkState;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad command-line or configuration input, raised before any I/O.
    #[error("usage: {0}")]
    Usage(String),

    #[error("failed to open input {url}: {reason}")]
    Open { url: String, reason: String },

    #[error("failed to probe input {url}: {reason}")]
    Probe { url: String, reason: String },

    /// Transient demuxer failure; the next read may succeed.
    #[error("read error: {0}")]
    Read(String),

    #[error("failed to create output {url}: {reason}")]
    SinkCreate { url: String, reason: String },

    #[error("failed to bind streams on output {url}: {reason}")]
    SinkBind { url: String, reason: String },

    /// The transport could not be opened, or the peer went away while writing.
    #[error("transport error on output {url}: {reason}")]
    Transport { url: String, reason: String },

    /// A time-boxed open elapsed before any peer attached.
    #[error("no peer attached to output {url} yet")]
    PeerPending { url: String },

    #[error("failed to write header on output {url}: {reason}")]
    SinkHeader { url: String, reason: String },

    /// Sink-local write failure that leaves the transport usable.
    #[error("write error on output {url}: {reason}")]
    Write { url: String, reason: String },

    #[error("output {url} cannot {op} while {state:?}")]
    InvalidState {
        url: String,
        op: &'static str,
        state: SinkState,
    },
}

impl Error {
    pub fn open(url: impl Into<String>, reason: impl Display) -> Self {
        Self::Open {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn probe(url: impl Into<String>, reason: impl Display) -> Self {
        Self::Probe {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn sink_create(url: impl Into<String>, reason: impl Display) -> Self {
        Self::SinkCreate {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn sink_bind(url: impl Into<String>, reason: impl Display) -> Self {
        Self::SinkBind {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn transport(url: impl Into<String>, reason: impl Display) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn peer_pending(url: impl Into<String>) -> Self {
        Self::PeerPending { url: url.into() }
    }

    pub fn sink_header(url: impl Into<String>, reason: impl Display) -> Self {
        Self::SinkHeader {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write(url: impl Into<String>, reason: impl Display) -> Self {
        Self::Write {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// True when the peer on the other end of an output went away.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Maps an FFmpeg error to the `io::ErrorKind` of its errno, if it carries one.
pub(crate) fn errno_kind(err: &ffmpeg_next::Error) -> Option<io::ErrorKind> {
    match *err {
        ffmpeg_next::Error::Other { errno } => Some(io::Error::from_raw_os_error(errno).kind()),
        _ => None,
    }
}

/// Broken pipe, reset, abort: the listening peer detached.
pub(crate) fn is_peer_gone(err: &ffmpeg_next::Error) -> bool {
    matches!(
        errno_kind(err),
        Some(
            io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::NotConnected
        )
    )
}

pub type Result<T> = std::result::Result<T, Error>;
