use std::ffi::CString;
use std::ptr;

use ffmpeg_next::{Dictionary, ffi, format::context};

use crate::{
    error::{Error, Result},
    packet::Packet,
    stream::AvStream,
};

/// Demuxing side of a session: stream metadata plus a lazy packet sequence.
pub trait Demuxer {
    fn url(&self) -> &str;

    fn streams(&self) -> &[AvStream];

    /// `Ok(None)` marks the end of the stream.
    fn read_packet(&mut self) -> Result<Option<Packet>>;
}

pub struct AvInput {
    url: String,
    inner: context::Input,
    streams: Vec<AvStream>,
}

impl AvInput {
    /// Resolve input format by name (e.g. "x11grab", "v4l2") via FFmpeg's av_find_input_format.
    fn find_input_format(url: &str, name: &str) -> Result<ffmpeg_next::format::format::Input> {
        let cname = CString::new(name)
            .map_err(|e| Error::open(url, format!("invalid format name {:?}: {}", name, e)))?;
        let ptr = unsafe { ffi::av_find_input_format(cname.as_ptr()) };
        if ptr.is_null() {
            return Err(Error::open(url, format!("input format not found: {}", name)));
        }
        Ok(unsafe { ffmpeg_next::format::format::Input::wrap(ptr as *mut _) })
    }

    /// Acquire the source without reading stream information yet.
    pub fn open(url: &str, format: Option<&str>, options: Option<Dictionary>) -> Result<Self> {
        let c_url = CString::new(url).map_err(|e| Error::open(url, e))?;
        let format_ptr = match format {
            Some(name) => unsafe { Self::find_input_format(url, name)?.as_ptr() },
            None => ptr::null(),
        };

        unsafe {
            let mut ps = ptr::null_mut();
            let mut opts = options.unwrap_or_else(Dictionary::new).disown();
            let ret = ffi::avformat_open_input(&mut ps, c_url.as_ptr(), format_ptr as _, &mut opts);
            Dictionary::own(opts);
            if ret < 0 {
                return Err(Error::open(url, ffmpeg_next::Error::from(ret)));
            }

            log::info!("input opened: {}", url);
            Ok(Self {
                url: url.to_string(),
                inner: context::Input::wrap(ps),
                streams: Vec::new(),
            })
        }
    }

    /// Read stream information and populate the stream list.
    pub fn probe(&mut self) -> Result<&[AvStream]> {
        let ret =
            unsafe { ffi::avformat_find_stream_info(self.inner.as_mut_ptr(), ptr::null_mut()) };
        if ret < 0 {
            return Err(Error::probe(&self.url, ffmpeg_next::Error::from(ret)));
        }

        self.streams = self.inner.streams().map(AvStream::from).collect();
        for stream in self.streams.iter() {
            log::info!(
                "input stream index: {}, codec: {}, time_base: {:?}, rate: {:?}",
                stream.index(),
                stream.codec_name(),
                stream.time_base(),
                stream.rate()
            );
        }
        Ok(&self.streams)
    }
}

impl Demuxer for AvInput {
    fn url(&self) -> &str {
        &self.url
    }

    fn streams(&self) -> &[AvStream] {
        &self.streams
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        let mut packet = ffmpeg_next::Packet::empty();
        match packet.read(&mut self.inner) {
            Ok(()) => Ok(Some(Packet::from(&packet))),
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(e) => Err(Error::Read(e.to_string())),
        }
    }
}

/// The single input of a session.
///
/// Once the end of the stream has been seen the source stays finished; a live
/// source can only be restarted by opening it again.
pub struct InputSource<D> {
    demuxer: D,
    finished: bool,
}

impl InputSource<AvInput> {
    pub fn open(url: &str, format: Option<&str>, options: Option<Dictionary>) -> Result<Self> {
        let mut input = AvInput::open(url, format, options)?;
        input.probe()?;
        Ok(Self::new(input))
    }
}

impl<D: Demuxer> InputSource<D> {
    pub fn new(demuxer: D) -> Self {
        Self {
            demuxer,
            finished: false,
        }
    }

    pub fn url(&self) -> &str {
        self.demuxer.url()
    }

    pub fn streams(&self) -> &[AvStream] {
        self.demuxer.streams()
    }

    pub fn stream(&self, index: usize) -> Option<&AvStream> {
        self.demuxer.streams().get(index)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        if self.finished {
            return Ok(None);
        }
        match self.demuxer.read_packet()? {
            Some(packet) if packet.index() >= self.streams().len() => Err(Error::Read(format!(
                "packet for unknown stream {} ({} streams probed)",
                packet.index(),
                self.streams().len()
            ))),
            Some(packet) => Ok(Some(packet)),
            None => {
                log::info!("end of input stream: {}", self.url());
                self.finished = true;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;
