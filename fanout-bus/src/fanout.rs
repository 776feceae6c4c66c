//! The fan-out loop: one input, many outputs.
//!
//! ```text
//!                              ┌─► [sink 0] lazy init ─► clone ─► rescale ─► write
//!                              │
//! InputSource ──► Packet ──────┼─► [sink 1] lazy init ─► clone ─► rescale ─► write
//!                              │                                              │
//!                              └─► ...                         disconnect ─► reconnect
//! ```
//!
//! Everything runs on the caller's thread. Sinks are visited in registry
//! order for every packet, so an output blocked while waiting for its peer
//! holds back the outputs registered after it until that peer attaches. An
//! accept timeout on the outputs turns that wait into a per-tick poll.

use ffmpeg_next::Rational;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    input::{Demuxer, InputSource},
    output::Muxer,
    packet::Packet,
    reconnect::ReconnectPolicy,
    registry::OutputRegistry,
    sink::{OutputSink, SinkState, SinkStats},
    stream::AvStream,
};

/// What happens when an output's one-time setup fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InitFailurePolicy {
    /// End the whole session.
    #[default]
    Abort,
    /// Mark only that output `Failed` and keep serving the others.
    Isolate,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub reconnect: ReconnectPolicy,
    pub init_failure: InitFailurePolicy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    EndOfStream,
    /// The stop token was cancelled.
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkSummary {
    pub url: String,
    pub state: SinkState,
    pub stats: SinkStats,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FanoutSummary {
    pub termination: Termination,
    pub packets_read: u64,
    pub read_errors: u64,
    pub sinks: Vec<SinkSummary>,
}

/// One input, its outputs and the policies tying them together.
pub struct Session<D, M> {
    source: InputSource<D>,
    registry: OutputRegistry<M>,
    options: SessionOptions,
    cancel: CancellationToken,
    packets_read: u64,
    read_errors: u64,
}

impl<D: Demuxer, M: Muxer> Session<D, M> {
    pub fn new(
        source: InputSource<D>,
        registry: OutputRegistry<M>,
        options: SessionOptions,
    ) -> Self {
        Self {
            source,
            registry,
            options,
            cancel: CancellationToken::new(),
            packets_read: 0,
            read_errors: 0,
        }
    }

    /// Use an externally owned stop token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn source(&self) -> &InputSource<D> {
        &self.source
    }

    pub fn registry(&self) -> &OutputRegistry<M> {
        &self.registry
    }

    /// Drain the input into every output until the end of the stream, a stop
    /// request, or a fatal error. The stop token is checked between packets.
    pub fn run(&mut self) -> Result<FanoutSummary> {
        log::info!(
            "fan-out started: input {}, {} output(s)",
            self.source.url(),
            self.registry.len()
        );

        let termination = loop {
            if self.cancel.is_cancelled() {
                log::info!("fan-out stopped on request");
                break Termination::Stopped;
            }

            let packet = match self.source.read_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => break Termination::EndOfStream,
                Err(e) => {
                    self.read_errors += 1;
                    log::warn!("{}, retrying", e);
                    continue;
                }
            };
            self.packets_read += 1;
            self.dispatch(&packet)?;
        };

        if termination == Termination::EndOfStream {
            for sink in self.registry.iter_mut() {
                if let Err(e) = sink.finish() {
                    log::warn!("{}", e);
                }
            }
        }

        let summary = self.summary(termination);
        log::info!(
            "fan-out finished ({:?}): {} packets read, {} read errors",
            summary.termination,
            summary.packets_read,
            summary.read_errors
        );
        Ok(summary)
    }

    /// Deliver one packet to every output, in registry order.
    pub fn dispatch(&mut self, packet: &Packet) -> Result<()> {
        let streams = self.source.streams();
        let time_base = match streams.get(packet.index()) {
            Some(stream) => stream.time_base(),
            None => {
                log::warn!("dropping packet for unknown stream {}", packet.index());
                return Ok(());
            }
        };

        for sink in self.registry.iter_mut() {
            deliver(sink, packet, time_base, streams, &self.options)?;
        }
        Ok(())
    }

    pub fn summary(&self, termination: Termination) -> FanoutSummary {
        FanoutSummary {
            termination,
            packets_read: self.packets_read,
            read_errors: self.read_errors,
            sinks: self
                .registry
                .iter()
                .map(|sink| SinkSummary {
                    url: sink.url().to_string(),
                    state: sink.state(),
                    stats: sink.stats(),
                })
                .collect(),
        }
    }
}

fn deliver<M: Muxer>(
    sink: &mut OutputSink<M>,
    packet: &Packet,
    time_base: Rational,
    source_streams: &[AvStream],
    options: &SessionOptions,
) -> Result<()> {
    match sink.state() {
        SinkState::Failed => return Ok(()),
        SinkState::HeaderWritten => {}
        _ => match sink.initialize(source_streams) {
            Ok(()) => log::info!("output {} ready", sink.url()),
            Err(Error::PeerPending { .. }) => {
                log::debug!("output {}: no peer yet, packet dropped", sink.url());
                sink.record_drop();
                return Ok(());
            }
            Err(e) => match options.init_failure {
                InitFailurePolicy::Abort => return Err(e),
                InitFailurePolicy::Isolate => {
                    log::error!("{}, output disabled", e);
                    sink.mark_failed();
                    return Ok(());
                }
            },
        },
    }

    if !sink.is_connected() && !options.reconnect.resume(sink) {
        sink.record_drop();
        return Ok(());
    }

    match sink.forward(packet, time_base) {
        Ok(()) => {}
        Err(e) if ReconnectPolicy::is_disconnect(&e) => {
            log::warn!("{}, reopening transport", e);
            sink.record_drop();
            options.reconnect.recover(sink);
        }
        Err(e) => log::error!("{}", e),
    }
    Ok(())
}

#[cfg(test)]
#[path = "fanout_test.rs"]
mod fanout_test;
