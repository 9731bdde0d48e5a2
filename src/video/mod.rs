//! Video Layer
//!
//! Container access sits behind [`VideoBackend`]; [`VideoPipeline`] drives
//! decode, annotation and encode for one file.

pub mod frame;
pub mod pipeline;
pub mod report;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use frame::VideoFrame;
pub use pipeline::{PipelineOutput, Progress, VideoPipeline};
pub use report::TextReport;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Rational frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Frames per second as a float, 0.0 for a zero denominator
    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }

    /// Closest rate whose numerator and denominator are both at most `max`.
    ///
    /// Rates already within range are returned unchanged.
    pub fn limited(self, max: u32) -> FrameRate {
        if self.num == 0 || self.den == 0 || max == 0 || (self.num <= max && self.den <= max) {
            return self;
        }
        // Approximate the fraction below one, whose denominator is the larger term
        if self.num >= self.den {
            let (den, num) = best_rational(self.den as u64, self.num as u64, max as u64);
            FrameRate::new(num as u32, den as u32)
        } else {
            let (num, den) = best_rational(self.num as u64, self.den as u64, max as u64);
            FrameRate::new(num as u32, den as u32)
        }
    }
}

/// Best approximation of `num / den` (`num < den`) with a denominator of at
/// most `max_den`, from the continued-fraction convergents. Never returns a
/// zero numerator.
fn best_rational(num: u64, den: u64, max_den: u64) -> (u64, u64) {
    let (mut p0, mut q0, mut p1, mut q1) = (0u64, 1u64, 1u64, 0u64);
    let (mut n, mut d) = (num, den);
    while d != 0 {
        let a = n / d;
        let q2 = q0 + a * q1;
        if q2 > max_den {
            break;
        }
        (p0, q0, p1, q1) = (p1, q1, p0 + a * p1, q2);
        (n, d) = (d, n - a * d);
    }

    let target = num as f64 / den as f64;
    let error = |(p, q): (u64, u64)| (p as f64 / q as f64 - target).abs();
    let k = (max_den - q0) / q1.max(1);
    let semiconvergent = (p0 + k * p1, q0 + k * q1);
    let (p, q) = if error((p1, q1)) <= error(semiconvergent) {
        (p1, q1)
    } else {
        semiconvergent
    };
    if p == 0 {
        (1, max_den)
    } else {
        (p, q)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} fps", self.as_f64())
    }
}

/// Stream properties shared by input and output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoProperties {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    /// Container's frame count, when it reports one
    pub frame_count: Option<u64>,
}

/// Four-character codec identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCc([u8; 4]);

impl FourCc {
    pub const XVID: FourCc = FourCc(*b"XVID");

    /// Parse exactly four printable ASCII characters
    pub fn parse(code: &str) -> Result<Self, VideoError> {
        let bytes: [u8; 4] = code
            .as_bytes()
            .try_into()
            .map_err(|_| VideoError::InvalidFourCc(code.to_string()))?;
        if !bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            return Err(VideoError::InvalidFourCc(code.to_string()));
        }
        Ok(Self(bytes))
    }

    /// Little-endian tag as stored in AVI headers
    pub fn tag(&self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub fn as_str(&self) -> &str {
        // parse only admits ASCII
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl Default for FourCc {
    fn default() -> Self {
        Self::XVID
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoder options for the output container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
    pub fourcc: FourCc,
    pub bitrate_kbps: u32,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            fourcc: FourCc::XVID,
            bitrate_kbps: 4000,
        }
    }
}

/// Backend-level video errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("{0}")]
    Open(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("invalid fourcc '{0}': expected four ASCII characters")]
    InvalidFourCc(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decoded frames of one input, in order
pub trait FrameSource {
    fn properties(&self) -> &VideoProperties;

    /// Next frame, `None` once the stream is exhausted
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, VideoError>;
}

/// Encoder for one output file
pub trait FrameSink {
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<(), VideoError>;

    /// Flush and close the container, returning the number of frames written
    fn finish(self: Box<Self>) -> Result<u64, VideoError>;
}

/// Opens inputs and creates outputs
pub trait VideoBackend: Send + Sync {
    fn open_input(&self, path: &Path) -> Result<Box<dyn FrameSource>, VideoError>;

    fn create_output(
        &self,
        path: &Path,
        properties: &VideoProperties,
        options: &OutputOptions,
    ) -> Result<Box<dyn FrameSink>, VideoError>;
}

/// Backend compiled into this build
pub fn default_backend() -> Arc<dyn VideoBackend> {
    #[cfg(feature = "ffmpeg")]
    {
        Arc::new(ffmpeg::FfmpegBackend)
    }
    #[cfg(not(feature = "ffmpeg"))]
    {
        Arc::new(UnavailableBackend)
    }
}

/// Stand-in when no codec library is linked
#[cfg(not(feature = "ffmpeg"))]
struct UnavailableBackend;

#[cfg(not(feature = "ffmpeg"))]
const UNAVAILABLE: &str = "video backend unavailable: built without the `ffmpeg` feature";

#[cfg(not(feature = "ffmpeg"))]
impl VideoBackend for UnavailableBackend {
    fn open_input(&self, _path: &Path) -> Result<Box<dyn FrameSource>, VideoError> {
        Err(VideoError::Open(UNAVAILABLE.to_string()))
    }

    fn create_output(
        &self,
        _path: &Path,
        _properties: &VideoProperties,
        _options: &OutputOptions,
    ) -> Result<Box<dyn FrameSink>, VideoError> {
        Err(VideoError::Encode(UNAVAILABLE.to_string()))
    }
}
