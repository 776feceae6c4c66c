use std::ffi::CString;
use std::io;
use std::os::raw::c_int;
use std::ptr;
use std::time::Duration;

use ffmpeg_next::{Dictionary, Rational, ffi, format::context};

use crate::{
    error::{Error, Result, errno_kind, is_peer_gone},
    packet::Packet,
    stream::AvStream,
};

/// Container used for every output when nothing else is configured.
pub const DEFAULT_OUTPUT_FORMAT: &str = "mjpeg";

/// How outputs are created and how their transports are opened.
///
/// The container format is one policy for the whole session, independent of
/// whatever the input happens to be.
#[derive(Clone, Debug)]
pub struct OutputOptions {
    /// Muxer short name, e.g. "mjpeg", "mpegts", "matroska".
    pub format: String,
    /// Open the transport as a passive listener accepting one peer.
    pub listen: bool,
    /// `None` blocks in open until a peer attaches.
    pub accept_timeout: Option<Duration>,
    /// Passed to the muxer when the header is written.
    pub header_options: Vec<(String, String)>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format: DEFAULT_OUTPUT_FORMAT.to_string(),
            listen: true,
            accept_timeout: None,
            header_options: Vec::new(),
        }
    }
}

/// Container-writing side of one output.
pub trait Muxer {
    fn url(&self) -> &str;

    /// Append an output stream copying `stream`'s codec parameters.
    fn add_stream(&mut self, stream: &AvStream) -> Result<()>;

    /// Time base of output stream `index` as the muxer currently sees it.
    fn time_base(&self, index: usize) -> Option<Rational>;

    fn open_transport(&mut self) -> Result<()>;

    fn write_header(&mut self) -> Result<()>;

    fn write_packet(&mut self, packet: Packet) -> Result<()>;

    fn close_transport(&mut self);

    /// Write the trailer, if the container has one.
    fn finish(&mut self) -> Result<()>;
}

pub trait MuxerFactory {
    type Muxer: Muxer;

    fn create(&self, url: &str, options: &OutputOptions) -> Result<Self::Muxer>;
}

pub struct AvOutput {
    url: String,
    inner: context::Output,
    options: OutputOptions,
    transport_open: bool,
    have_written_header: bool,
    have_written_trailer: bool,
}

impl AvOutput {
    pub fn new(url: &str, options: &OutputOptions) -> Result<Self> {
        let c_url = CString::new(url).map_err(|e| Error::sink_create(url, e))?;
        let c_format =
            CString::new(options.format.as_str()).map_err(|e| Error::sink_create(url, e))?;

        unsafe {
            let mut ps = ptr::null_mut();
            let ret = ffi::avformat_alloc_output_context2(
                &mut ps,
                ptr::null(),
                c_format.as_ptr(),
                c_url.as_ptr(),
            );
            if ret < 0 || ps.is_null() {
                return Err(Error::sink_create(url, ffmpeg_next::Error::from(ret)));
            }

            log::info!("output {} created with format {}", url, options.format);
            Ok(Self {
                url: url.to_string(),
                inner: context::Output::wrap(ps),
                options: options.clone(),
                transport_open: false,
                have_written_header: false,
                have_written_trailer: false,
            })
        }
    }

    fn needs_file(&self) -> bool {
        unsafe {
            let ctx = self.inner.as_ptr();
            ((*(*ctx).oformat).flags & ffi::AVFMT_NOFILE as c_int) == 0
        }
    }

    fn transport_dictionary(&self) -> Dictionary<'static> {
        let mut opts = Dictionary::new();
        if self.options.listen {
            opts.set("listen", "1");
        }
        if let Some(timeout) = self.options.accept_timeout {
            opts.set("listen_timeout", &timeout.as_millis().to_string());
        }
        opts
    }
}

impl Muxer for AvOutput {
    fn url(&self) -> &str {
        &self.url
    }

    fn add_stream(&mut self, stream: &AvStream) -> Result<()> {
        let mirror = stream.mirror();
        let codec_parameters = mirror.parameters();
        let mut writer_stream = self
            .inner
            .add_stream(ffmpeg_next::encoder::find(codec_parameters.id()))
            .map_err(|e| Error::sink_bind(&self.url, e))?;
        writer_stream.set_parameters(codec_parameters.clone());
        writer_stream.set_time_base(mirror.time_base());
        Ok(())
    }

    fn time_base(&self, index: usize) -> Option<Rational> {
        self.inner.stream(index).map(|s| s.time_base())
    }

    fn open_transport(&mut self) -> Result<()> {
        if self.transport_open {
            return Ok(());
        }
        if !self.needs_file() {
            self.transport_open = true;
            return Ok(());
        }

        let c_url = CString::new(self.url.as_str()).map_err(|e| Error::transport(&self.url, e))?;
        let ret = unsafe {
            let mut opts = self.transport_dictionary().disown();
            let ctx = self.inner.as_mut_ptr();
            let ret = ffi::avio_open2(
                &mut (*ctx).pb,
                c_url.as_ptr(),
                ffi::AVIO_FLAG_WRITE as c_int,
                ptr::null(),
                &mut opts,
            );
            Dictionary::own(opts);
            ret
        };

        if ret < 0 {
            let err = ffmpeg_next::Error::from(ret);
            if errno_kind(&err) == Some(io::ErrorKind::TimedOut) {
                log::debug!("output {}: accept timed out", self.url);
                return Err(Error::peer_pending(&self.url));
            }
            return Err(Error::transport(&self.url, err));
        }

        log::info!("output {}: peer attached", self.url);
        self.transport_open = true;
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        let mut opts = Dictionary::new();
        for (key, value) in self.options.header_options.iter() {
            opts.set(key, value);
        }
        self.inner
            .write_header_with(opts)
            .map_err(|e| Error::sink_header(&self.url, e))?;
        self.have_written_header = true;
        Ok(())
    }

    fn write_packet(&mut self, packet: Packet) -> Result<()> {
        to_av_packet(&packet)
            .write_interleaved(&mut self.inner)
            .map_err(|e| {
                if is_peer_gone(&e) {
                    Error::transport(&self.url, e)
                } else {
                    Error::write(&self.url, e)
                }
            })
    }

    fn close_transport(&mut self) {
        if self.transport_open && self.needs_file() {
            unsafe {
                ffi::avio_closep(&mut (*self.inner.as_mut_ptr()).pb);
            }
        }
        self.transport_open = false;
    }

    fn finish(&mut self) -> Result<()> {
        if self.have_written_header && !self.have_written_trailer && self.transport_open {
            self.have_written_trailer = true;
            self.inner
                .write_trailer()
                .map_err(|e| Error::write(&self.url, e))?;
        }
        Ok(())
    }
}

/// FFmpeg packet carrying the same payload, timestamps and flags. A missing
/// position becomes FFmpeg's `-1`.
fn to_av_packet(packet: &Packet) -> ffmpeg_next::Packet {
    let mut p = ffmpeg_next::Packet::copy(packet.data());
    p.set_stream(packet.index());
    p.set_pts(packet.pts());
    p.set_dts(packet.dts());
    p.set_duration(packet.duration());
    p.set_position(packet.position().map_or(-1, |pos| pos as isize));
    if packet.is_key() {
        p.set_flags(ffmpeg_next::packet::Flags::KEY);
    }
    p
}

/// Creates FFmpeg-backed outputs.
#[derive(Clone, Copy, Debug, Default)]
pub struct AvOutputFactory;

impl MuxerFactory for AvOutputFactory {
    type Muxer = AvOutput;

    fn create(&self, url: &str, options: &OutputOptions) -> Result<AvOutput> {
        AvOutput::new(url, options)
    }
}

#[cfg(test)]
#[path = "output_test.rs"]
mod output_test;
