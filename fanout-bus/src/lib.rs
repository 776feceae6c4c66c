//! Copy one demuxed media stream, packet by packet, into any number of
//! listening outputs without decoding it.

/// Registers FFmpeg components (formats, protocols, devices). Call once at
/// startup before opening any input or output.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

pub mod error;
pub mod fanout;
pub mod input;
pub mod output;
pub mod packet;
pub mod reconnect;
pub mod registry;
pub mod sink;
pub mod stream;

#[cfg(test)]
mod mock;

pub use error::{Error, Result};
