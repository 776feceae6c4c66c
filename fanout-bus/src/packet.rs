use bytes::Bytes;
use ffmpeg_next::Rational;
use ffmpeg_next::util::mathematics::{Rescale, Rounding};

/// One demuxed unit of data, tagged with the index of the stream it belongs to.
///
/// Timestamps and duration are expressed in the time base of the producing
/// stream. The payload is reference counted, so cloning a packet for every
/// output does not copy the data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    stream_index: usize,
    pts: Option<i64>,
    dts: Option<i64>,
    duration: i64,
    is_key: bool,
    data: Bytes,
    position: Option<i64>,
}

impl Packet {
    pub fn new(stream_index: usize, pts: Option<i64>, dts: Option<i64>, data: Bytes) -> Self {
        Self {
            stream_index,
            pts,
            dts,
            duration: 0,
            is_key: false,
            data,
            position: None,
        }
    }

    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    pub fn with_position(mut self, position: Option<i64>) -> Self {
        self.position = position;
        self
    }

    pub fn index(&self) -> usize {
        self.stream_index
    }

    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    pub fn dts(&self) -> Option<i64> {
        self.dts
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Byte offset in the source, if the demuxer knows it.
    pub fn position(&self) -> Option<i64> {
        self.position
    }

    /// Independent copy for one output: timestamps moved from `from` to `to`,
    /// position reset since it only means something to the source.
    pub fn remux_copy(&self, from: Rational, to: Rational) -> Packet {
        Packet {
            stream_index: self.stream_index,
            pts: self.pts.map(|ts| rescale_ts(ts, from, to)),
            dts: self.dts.map(|ts| rescale_ts(ts, from, to)),
            duration: rescale_ts(self.duration, from, to),
            is_key: self.is_key,
            data: self.data.clone(),
            position: None,
        }
    }
}

/// Rescale a timestamp to the nearest tick of `to`, halfway cases away from zero.
pub fn rescale_ts(ts: i64, from: Rational, to: Rational) -> i64 {
    if from == to {
        return ts;
    }
    ts.rescale_with(from, to, Rounding::NearestInfinity)
}

impl From<&ffmpeg_next::Packet> for Packet {
    fn from(packet: &ffmpeg_next::Packet) -> Self {
        let data = packet
            .data()
            .map(Bytes::copy_from_slice)
            .unwrap_or_default();
        let position = match packet.position() {
            p if p < 0 => None,
            p => Some(p as i64),
        };
        Packet::new(packet.stream(), packet.pts(), packet.dts(), data)
            .with_duration(packet.duration())
            .with_key(packet.is_key())
            .with_position(position)
    }
}

#[cfg(test)]
#[path = "packet_test.rs"]
mod packet_test;
