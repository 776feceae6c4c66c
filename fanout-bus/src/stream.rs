use ffmpeg_next::{Rational, codec::Parameters, format::stream};

pub struct AvStream {
    index: usize,
    parameters: Parameters,
    time_base: Rational,
    rate: Rational,
}

impl AvStream {
    pub fn new(index: usize, parameters: Parameters, time_base: Rational, rate: Rational) -> Self {
        Self {
            index,
            parameters,
            time_base,
            rate,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
    pub fn time_base(&self) -> Rational {
        self.time_base
    }
    pub fn rate(&self) -> Rational {
        self.rate
    }

    pub fn set_time_base(&mut self, time_base: Rational) {
        self.time_base = time_base;
    }

    pub fn codec_name(&self) -> &'static str {
        self.parameters.id().name()
    }

    pub fn codec_tag(&self) -> u32 {
        unsafe { (*self.parameters.as_ptr()).codec_tag }
    }

    /// Output-side twin of this stream: same index, time base and codec
    /// parameters, but with the container-specific codec tag cleared so the
    /// destination muxer picks its own.
    pub fn mirror(&self) -> Self {
        let mut parameters = self.parameters.clone();
        unsafe {
            (*parameters.as_mut_ptr()).codec_tag = 0;
        }
        Self {
            index: self.index,
            parameters,
            time_base: self.time_base,
            rate: self.rate,
        }
    }
}

impl From<stream::Stream<'_>> for AvStream {
    fn from(stream: stream::Stream<'_>) -> Self {
        Self {
            index: stream.index(),
            parameters: stream.parameters().clone(),
            time_base: stream.time_base(),
            rate: stream.avg_frame_rate(),
        }
    }
}

impl Clone for AvStream {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            parameters: self.parameters.clone(),
            time_base: self.time_base,
            rate: self.rate,
        }
    }
}

impl std::fmt::Debug for AvStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvStream")
            .field("index", &self.index)
            .field("codec", &self.parameters.id())
            .field("time_base", &self.time_base)
            .finish_non_exhaustive()
    }
}
