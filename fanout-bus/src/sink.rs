use ffmpeg_next::Rational;

use crate::{
    error::{Error, Result},
    output::{Muxer, MuxerFactory, OutputOptions},
    packet::Packet,
    stream::AvStream,
};

/// Lifecycle of an output.
///
/// `Uninitialized -> StreamsBound -> TransportOpen -> HeaderWritten`, with
/// `Failed` as the terminal state for outputs whose one-time setup broke.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkState {
    Uninitialized,
    StreamsBound,
    TransportOpen,
    HeaderWritten,
    Failed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub written: u64,
    pub write_errors: u64,
    pub reconnects: u64,
    /// Packets this output never got: lost on disconnect or while waiting for a peer.
    pub dropped: u64,
}

pub struct OutputSink<M> {
    url: String,
    muxer: M,
    state: SinkState,
    streams: Vec<AvStream>,
    connected: bool,
    stats: SinkStats,
}

impl<M: Muxer> OutputSink<M> {
    pub fn create<F>(factory: &F, url: &str, options: &OutputOptions) -> Result<Self>
    where
        F: MuxerFactory<Muxer = M>,
    {
        Ok(Self::new(factory.create(url, options)?))
    }

    pub fn new(muxer: M) -> Self {
        Self {
            url: muxer.url().to_string(),
            muxer,
            state: SinkState::Uninitialized,
            streams: Vec::new(),
            connected: false,
            stats: SinkStats::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    /// Output streams, index-aligned with the source streams.
    pub fn streams(&self) -> &[AvStream] {
        &self.streams
    }

    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    pub fn muxer(&self) -> &M {
        &self.muxer
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Header written and a peer on the other end.
    pub fn is_ready(&self) -> bool {
        self.state == SinkState::HeaderWritten && self.connected
    }

    fn invalid(&self, op: &'static str) -> Error {
        Error::InvalidState {
            url: self.url.clone(),
            op,
            state: self.state,
        }
    }

    pub fn bind_streams(&mut self, source_streams: &[AvStream]) -> Result<()> {
        if self.state != SinkState::Uninitialized {
            return Err(self.invalid("bind streams"));
        }

        let mut streams = Vec::with_capacity(source_streams.len());
        for stream in source_streams {
            self.muxer.add_stream(stream)?;
            log::info!(
                "added stream {} ({}) to output {}",
                stream.index(),
                stream.codec_name(),
                self.url
            );
            streams.push(stream.mirror());
        }
        self.streams = streams;
        self.state = SinkState::StreamsBound;
        Ok(())
    }

    /// Acquire the transport. On a sink that already wrote its header this
    /// only replaces the transport; streams and header are left alone.
    pub fn open_transport(&mut self) -> Result<()> {
        match self.state {
            SinkState::StreamsBound | SinkState::HeaderWritten if !self.connected => {}
            _ => return Err(self.invalid("open transport")),
        }

        log::debug!("output {}: waiting for peer", self.url);
        self.muxer.open_transport()?;
        self.connected = true;
        if self.state == SinkState::StreamsBound {
            self.state = SinkState::TransportOpen;
        }
        Ok(())
    }

    pub fn write_header(&mut self) -> Result<()> {
        if self.state != SinkState::TransportOpen {
            return Err(self.invalid("write header"));
        }

        self.muxer.write_header()?;
        // containers may pick their own time base while writing the header
        for stream in self.streams.iter_mut() {
            if let Some(time_base) = self.muxer.time_base(stream.index()) {
                stream.set_time_base(time_base);
            }
        }
        self.state = SinkState::HeaderWritten;
        Ok(())
    }

    /// Run whatever one-time setup steps are still missing.
    pub fn initialize(&mut self, source_streams: &[AvStream]) -> Result<()> {
        if self.state == SinkState::Uninitialized {
            self.bind_streams(source_streams)?;
        }
        if self.state == SinkState::StreamsBound {
            self.open_transport()?;
        }
        if self.state == SinkState::TransportOpen {
            self.write_header()?;
        }
        if self.state != SinkState::HeaderWritten {
            return Err(self.invalid("initialize"));
        }
        Ok(())
    }

    pub fn write(&mut self, packet: Packet) -> Result<()> {
        if !self.is_ready() {
            return Err(self.invalid("write"));
        }

        match self.muxer.write_packet(packet) {
            Ok(()) => {
                self.stats.written += 1;
                Ok(())
            }
            Err(e) => {
                if !e.is_disconnect() {
                    self.stats.write_errors += 1;
                }
                Err(e)
            }
        }
    }

    /// Copy `packet` into this output's time base and write it.
    pub fn forward(&mut self, packet: &Packet, source_time_base: Rational) -> Result<()> {
        let time_base = match self.streams.get(packet.index()) {
            Some(stream) => stream.time_base(),
            None => {
                self.stats.write_errors += 1;
                return Err(Error::write(
                    &self.url,
                    format!("no output stream for index {}", packet.index()),
                ));
            }
        };
        self.write(packet.remux_copy(source_time_base, time_base))
    }

    pub fn close_transport(&mut self) {
        if self.connected {
            self.muxer.close_transport();
            self.connected = false;
            log::debug!("output {}: transport closed", self.url);
        }
    }

    pub fn mark_failed(&mut self) {
        self.close_transport();
        self.state = SinkState::Failed;
    }

    pub fn finish(&mut self) -> Result<()> {
        if self.is_ready() {
            self.muxer.finish()?;
        }
        Ok(())
    }

    pub(crate) fn record_drop(&mut self) {
        self.stats.dropped += 1;
    }

    pub(crate) fn record_reconnect(&mut self) {
        self.stats.reconnects += 1;
    }
}

#[cfg(test)]
#[path = "sink_test.rs"]
mod sink_test;
