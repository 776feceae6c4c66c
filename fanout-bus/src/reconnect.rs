use std::time::Duration;

use crate::{
    error::Error,
    output::Muxer,
    sink::{OutputSink, SinkState},
};

/// How an output gets its transport back after the peer went away.
///
/// Recovery only ever reopens the transport. Stream bindings and the header
/// written during initialization stay valid and are never redone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Open attempts made right after a disconnect, inside the same tick.
    pub attempts: u32,
    /// Pause between two failed attempts.
    pub backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    pub fn is_disconnect(err: &Error) -> bool {
        err.is_disconnect()
    }

    /// Close the dead transport and try to reopen it. Returns whether the
    /// output is connected again.
    pub fn recover<M: Muxer>(&self, sink: &mut OutputSink<M>) -> bool {
        sink.close_transport();

        for attempt in 1..=self.attempts {
            if Self::try_open(sink, attempt, self.attempts) {
                return true;
            }
            if attempt < self.attempts && !self.backoff.is_zero() {
                std::thread::sleep(self.backoff);
            }
        }

        log::warn!(
            "output {} still disconnected, retrying before its next packet",
            sink.url()
        );
        false
    }

    /// Single reopen attempt for an output left disconnected by an earlier tick.
    pub fn resume<M: Muxer>(&self, sink: &mut OutputSink<M>) -> bool {
        if sink.is_connected() || sink.state() != SinkState::HeaderWritten {
            return sink.is_connected();
        }
        Self::try_open(sink, 1, 1)
    }

    fn try_open<M: Muxer>(sink: &mut OutputSink<M>, attempt: u32, of: u32) -> bool {
        match sink.open_transport() {
            Ok(()) => {
                sink.record_reconnect();
                log::info!("output {} reconnected", sink.url());
                true
            }
            Err(Error::PeerPending { .. }) => {
                log::debug!("output {}: no peer yet ({}/{})", sink.url(), attempt, of);
                false
            }
            Err(e) => {
                log::warn!("reconnect attempt {}/{} failed: {}", attempt, of, e);
                false
            }
        }
    }
}
