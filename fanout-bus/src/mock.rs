//! Scripted in-memory demuxer and muxer for exercising the fan-out without FFmpeg I/O.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use bytes::Bytes;
use ffmpeg_next::{Rational, codec::Parameters, ffi};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    input::Demuxer,
    output::{Muxer, MuxerFactory, OutputOptions},
    packet::Packet,
    stream::AvStream,
};

pub fn stream(index: usize, time_base: Rational) -> AvStream {
    stream_with_tag(index, time_base, 0)
}

pub fn stream_with_tag(index: usize, time_base: Rational, codec_tag: u32) -> AvStream {
    let mut parameters = Parameters::new();
    unsafe {
        let ptr = parameters.as_mut_ptr();
        (*ptr).codec_type = ffi::AVMediaType::AVMEDIA_TYPE_VIDEO;
        (*ptr).codec_id = ffi::AVCodecID::AV_CODEC_ID_MJPEG;
        (*ptr).codec_tag = codec_tag;
    }
    AvStream::new(index, parameters, time_base, Rational::new(25, 1))
}

pub fn packet(index: usize, pts: i64) -> Packet {
    Packet::new(index, Some(pts), Some(pts), Bytes::from(vec![index as u8; 4]))
        .with_duration(1)
        .with_position(Some(pts * 188))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    AddStream(String, usize),
    Open(String, bool),
    Header(String),
    Write(String, usize, Option<i64>),
    WriteFailed(String, usize),
    Close(String),
    Trailer(String),
}

/// Ordered record of every muxer call, shared by all outputs of a test.
#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Event>>>);

impl Journal {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn opens(&self, url: &str) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Open(u, _) if u == url))
            .count()
    }

    /// Successful writes to `url` as `(stream index, pts)`.
    pub fn writes(&self, url: &str) -> Vec<(usize, Option<i64>)> {
        self.0
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Write(u, index, pts) if u == url => Some((*index, *pts)),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.0.borrow().iter().position(|e| e == event)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenOutcome {
    Ok,
    /// Time-boxed open elapsed with nobody attached.
    Pending,
    Refused,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteFailure {
    Disconnect,
    Other,
}

pub struct MockMuxer {
    url: String,
    journal: Journal,
    time_bases: Vec<Rational>,
    header_time_base: Option<Rational>,
    opens: VecDeque<OpenOutcome>,
    always_pending: bool,
    write_failures: HashMap<usize, WriteFailure>,
    writes_attempted: usize,
    fail_bind: bool,
    fail_header: bool,
    connected: bool,
}

impl MockMuxer {
    pub fn new(url: &str, journal: &Journal) -> Self {
        Self {
            url: url.to_string(),
            journal: journal.clone(),
            time_bases: Vec::new(),
            header_time_base: None,
            opens: VecDeque::new(),
            always_pending: false,
            write_failures: HashMap::new(),
            writes_attempted: 0,
            fail_bind: false,
            fail_header: false,
            connected: false,
        }
    }

    /// Outcomes of the next open calls; once used up every open succeeds.
    pub fn script_opens(mut self, outcomes: impl IntoIterator<Item = OpenOutcome>) -> Self {
        self.opens.extend(outcomes);
        self
    }

    /// No peer ever attaches.
    pub fn never_attached(mut self) -> Self {
        self.always_pending = true;
        self
    }

    /// Make write attempt number `nth` (1-based) fail.
    pub fn fail_write(mut self, nth: usize, failure: WriteFailure) -> Self {
        self.write_failures.insert(nth, failure);
        self
    }

    /// Every stream gets this time base once the header is written.
    pub fn header_time_base(mut self, time_base: Rational) -> Self {
        self.header_time_base = Some(time_base);
        self
    }

    pub fn fail_bind(mut self) -> Self {
        self.fail_bind = true;
        self
    }

    pub fn fail_header(mut self) -> Self {
        self.fail_header = true;
        self
    }

    pub fn writes_attempted(&self) -> usize {
        self.writes_attempted
    }
}

impl Muxer for MockMuxer {
    fn url(&self) -> &str {
        &self.url
    }

    fn add_stream(&mut self, stream: &AvStream) -> Result<()> {
        if self.fail_bind {
            return Err(Error::sink_bind(&self.url, "codec not supported by container"));
        }
        self.journal
            .push(Event::AddStream(self.url.clone(), stream.index()));
        self.time_bases.push(stream.time_base());
        Ok(())
    }

    fn time_base(&self, index: usize) -> Option<Rational> {
        self.time_bases.get(index).copied()
    }

    fn open_transport(&mut self) -> Result<()> {
        let outcome = if self.always_pending {
            OpenOutcome::Pending
        } else {
            self.opens.pop_front().unwrap_or(OpenOutcome::Ok)
        };
        self.journal
            .push(Event::Open(self.url.clone(), outcome == OpenOutcome::Ok));
        match outcome {
            OpenOutcome::Ok => {
                self.connected = true;
                Ok(())
            }
            OpenOutcome::Pending => Err(Error::peer_pending(&self.url)),
            OpenOutcome::Refused => Err(Error::transport(&self.url, "Address already in use")),
        }
    }

    fn write_header(&mut self) -> Result<()> {
        if self.fail_header {
            return Err(Error::sink_header(&self.url, "Invalid argument"));
        }
        if let Some(time_base) = self.header_time_base {
            for tb in self.time_bases.iter_mut() {
                *tb = time_base;
            }
        }
        self.journal.push(Event::Header(self.url.clone()));
        Ok(())
    }

    fn write_packet(&mut self, packet: Packet) -> Result<()> {
        assert!(self.connected, "write on {} without a transport", self.url);
        assert_eq!(packet.position(), None, "source position leaked into {}", self.url);

        self.writes_attempted += 1;
        match self.write_failures.get(&self.writes_attempted) {
            Some(WriteFailure::Disconnect) => {
                self.journal
                    .push(Event::WriteFailed(self.url.clone(), packet.index()));
                Err(Error::transport(&self.url, "Broken pipe"))
            }
            Some(WriteFailure::Other) => {
                self.journal
                    .push(Event::WriteFailed(self.url.clone(), packet.index()));
                Err(Error::write(&self.url, "Invalid data found when processing input"))
            }
            None => {
                self.journal
                    .push(Event::Write(self.url.clone(), packet.index(), packet.pts()));
                Ok(())
            }
        }
    }

    fn close_transport(&mut self) {
        self.connected = false;
        self.journal.push(Event::Close(self.url.clone()));
    }

    fn finish(&mut self) -> Result<()> {
        self.journal.push(Event::Trailer(self.url.clone()));
        Ok(())
    }
}

/// Hands out plain mock outputs recording into one journal.
pub struct MockFactory {
    pub journal: Journal,
    pub refuse: Vec<String>,
}

impl MuxerFactory for MockFactory {
    type Muxer = MockMuxer;

    fn create(&self, url: &str, options: &OutputOptions) -> Result<MockMuxer> {
        if self.refuse.iter().any(|u| u == url) {
            return Err(Error::sink_create(
                url,
                format!("Requested output format '{}' is not known", options.format),
            ));
        }
        Ok(MockMuxer::new(url, &self.journal))
    }
}

pub enum Step {
    Packet(Packet),
    Fail(&'static str),
    /// Cancel the token, then deliver the packet.
    CancelThen(CancellationToken, Packet),
}

pub struct ScriptedDemuxer {
    url: String,
    streams: Vec<AvStream>,
    steps: VecDeque<Step>,
    pub reads_after_end: usize,
}

impl ScriptedDemuxer {
    pub fn new(streams: Vec<AvStream>, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            url: "udp://239.0.0.1:1234".to_string(),
            streams,
            steps: steps.into_iter().collect(),
            reads_after_end: 0,
        }
    }

    pub fn packets(streams: Vec<AvStream>, packets: impl IntoIterator<Item = Packet>) -> Self {
        Self::new(streams, packets.into_iter().map(Step::Packet))
    }
}

impl Demuxer for ScriptedDemuxer {
    fn url(&self) -> &str {
        &self.url
    }

    fn streams(&self) -> &[AvStream] {
        &self.streams
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        match self.steps.pop_front() {
            Some(Step::Packet(packet)) => Ok(Some(packet)),
            Some(Step::Fail(reason)) => Err(Error::Read(reason.to_string())),
            Some(Step::CancelThen(token, packet)) => {
                token.cancel();
                Ok(Some(packet))
            }
            None => {
                self.reads_after_end += 1;
                Ok(None)
            }
        }
    }
}
