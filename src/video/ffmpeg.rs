//! FFmpeg-backed video input and output.
//!
//! Inputs are decoded from their best video stream and scaled to RGB24.
//! Outputs are MPEG-4 Part 2 in whatever container the path's extension
//! selects, tagged with the configured fourcc.

use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling;
use ffmpeg::{codec, encoder, format, frame, media, Packet, Rational};
use std::path::Path;
use tracing::{debug, info, warn};

use super::{
    FrameRate, FrameSink, FrameSource, OutputOptions, VideoBackend, VideoError, VideoFrame,
    VideoProperties,
};

fn decode_err(e: ffmpeg::Error) -> VideoError {
    VideoError::Decode(e.to_string())
}

fn encode_err(e: ffmpeg::Error) -> VideoError {
    VideoError::Encode(e.to_string())
}

/// Largest time-base term the MPEG-4 Part 2 encoder accepts
const MAX_TIME_BASE_TERM: u32 = 65535;

/// Whether a send/receive call merely needs more input or output drained
fn is_again(e: &ffmpeg::Error) -> bool {
    matches!(e, ffmpeg::Error::Other { errno } if *errno == ffmpeg::util::error::EAGAIN)
}

/// Backend using the system FFmpeg libraries
pub struct FfmpegBackend;

impl VideoBackend for FfmpegBackend {
    fn open_input(&self, path: &Path) -> Result<Box<dyn FrameSource>, VideoError> {
        Ok(Box::new(FfmpegSource::open(path)?))
    }

    fn create_output(
        &self,
        path: &Path,
        properties: &VideoProperties,
        options: &OutputOptions,
    ) -> Result<Box<dyn FrameSink>, VideoError> {
        Ok(Box::new(FfmpegSink::create(path, properties, options)?))
    }
}

struct FfmpegSource {
    input: format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::decoder::Video,
    scaler: scaling::Context,
    properties: VideoProperties,
    next_index: u64,
    eof_sent: bool,
}

impl FfmpegSource {
    fn open(path: &Path) -> Result<Self, VideoError> {
        ffmpeg::init().map_err(|e| VideoError::Open(format!("initialize ffmpeg: {e}")))?;
        let input = format::input(&path).map_err(|e| VideoError::Open(e.to_string()))?;

        let (stream_index, rate, frames, parameters) = {
            let stream = input
                .streams()
                .best(media::Type::Video)
                .ok_or_else(|| VideoError::Open("file has no video track".to_string()))?;
            let avg = stream.avg_frame_rate();
            let rate = if avg.numerator() > 0 && avg.denominator() > 0 {
                avg
            } else {
                stream.rate()
            };
            (stream.index(), rate, stream.frames(), stream.parameters())
        };

        let decoder = codec::context::Context::from_parameters(parameters)
            .and_then(|context| context.decoder().video())
            .map_err(|e| VideoError::Open(format!("open video decoder: {e}")))?;

        let (width, height) = (decoder.width(), decoder.height());
        if width == 0 || height == 0 {
            return Err(VideoError::Open("video stream has no dimensions".to_string()));
        }

        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .map_err(|e| VideoError::Open(format!("create scaler: {e}")))?;

        let properties = VideoProperties {
            width,
            height,
            frame_rate: FrameRate::new(rate.numerator().max(0) as u32, rate.denominator().max(0) as u32),
            frame_count: (frames > 0).then_some(frames as u64),
        };
        info!(
            "FfmpegSource: {:?} {}x{} {} ({:?})",
            path,
            width,
            height,
            properties.frame_rate,
            decoder.format()
        );

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            properties,
            next_index: 0,
            eof_sent: false,
        })
    }

    /// Next packet of the selected stream, `None` at end of file
    fn next_packet(&mut self) -> Option<Packet> {
        let stream_index = self.stream_index;
        self.input
            .packets()
            .find(|(stream, _)| stream.index() == stream_index)
            .map(|(_, packet)| packet)
    }

    fn convert(&mut self, decoded: &frame::Video) -> Result<VideoFrame, VideoError> {
        let mut rgb = frame::Video::empty();
        self.scaler.run(decoded, &mut rgb).map_err(decode_err)?;

        let data = packed_rgb(&rgb)?;
        let frame = VideoFrame::new(data, rgb.width(), rgb.height(), self.next_index);
        self.next_index += 1;
        Ok(frame)
    }
}

impl FrameSource for FfmpegSource {
    fn properties(&self) -> &VideoProperties {
        &self.properties
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>, VideoError> {
        let mut decoded = frame::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => return self.convert(&decoded).map(Some),
                Err(ffmpeg::Error::Eof) => {
                    debug!("FfmpegSource: decoded {} frames", self.next_index);
                    return Ok(None);
                }
                Err(e) if is_again(&e) => {}
                Err(e) => return Err(decode_err(e)),
            }
            if self.eof_sent {
                debug!("FfmpegSource: decoded {} frames", self.next_index);
                return Ok(None);
            }
            match self.next_packet() {
                Some(packet) => self.decoder.send_packet(&packet).map_err(decode_err)?,
                None => {
                    // Flush frames the decoder is still holding
                    self.decoder.send_eof().map_err(decode_err)?;
                    self.eof_sent = true;
                }
            }
        }
    }
}

/// Copy plane 0 of an RGB24 frame, dropping row padding
fn packed_rgb(frame: &frame::Video) -> Result<Vec<u8>, VideoError> {
    let row_bytes = frame.width() as usize * 3;
    let height = frame.height() as usize;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return data
            .get(..row_bytes * height)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| VideoError::Decode("RGB plane is shorter than expected".to_string()));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        let line = data
            .get(start..start + row_bytes)
            .ok_or_else(|| VideoError::Decode("RGB frame row is out of bounds".to_string()))?;
        pixels.extend_from_slice(line);
    }
    Ok(pixels)
}

struct FfmpegSink {
    output: format::context::Output,
    encoder: encoder::video::Encoder,
    scaler: scaling::Context,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl FfmpegSink {
    fn create(
        path: &Path,
        properties: &VideoProperties,
        options: &OutputOptions,
    ) -> Result<Self, VideoError> {
        ffmpeg::init().map_err(encode_err)?;

        let FrameRate { num, den } = properties.frame_rate;
        if num == 0 || den == 0 {
            return Err(VideoError::Encode(format!("invalid frame rate {num}/{den}")));
        }
        let FrameRate { num, den } = properties.frame_rate.limited(MAX_TIME_BASE_TERM);
        if (num, den) != (properties.frame_rate.num, properties.frame_rate.den) {
            warn!(
                "FfmpegSink: frame rate {}/{} approximated as {}/{} for the encoder",
                properties.frame_rate.num, properties.frame_rate.den, num, den
            );
        }
        let rate = Rational::new(num as i32, den as i32);
        let time_base = rate.invert();

        let mut output = format::output(&path).map_err(encode_err)?;
        let codec = encoder::find(codec::Id::MPEG4)
            .ok_or_else(|| VideoError::Encode("MPEG-4 encoder not available".to_string()))?;
        let global_header = output
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER);

        let mut video = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(encode_err)?;
        video.set_width(properties.width);
        video.set_height(properties.height);
        video.set_format(Pixel::YUV420P);
        video.set_frame_rate(Some(rate));
        video.set_time_base(time_base);
        video.set_bit_rate(options.bitrate_kbps as usize * 1000);
        if global_header {
            video.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        // SAFETY: the context is owned by `video` and not yet opened; the tag
        // is copied into the stream parameters below
        unsafe {
            (*video.as_mut_ptr()).codec_tag = options.fourcc.tag();
        }
        let encoder = video.open_as(codec).map_err(encode_err)?;

        let stream_index = {
            let mut stream = output.add_stream(codec).map_err(encode_err)?;
            stream.set_parameters(&encoder);
            stream.set_time_base(time_base);
            stream.index()
        };

        output.write_header().map_err(encode_err)?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|s| s.time_base())
            .unwrap_or(time_base);

        let scaler = scaling::Context::get(
            Pixel::RGB24,
            properties.width,
            properties.height,
            Pixel::YUV420P,
            properties.width,
            properties.height,
            scaling::Flags::BILINEAR,
        )
        .map_err(encode_err)?;

        info!(
            "FfmpegSink: {:?} {}x{} {} fourcc {}",
            path, properties.width, properties.height, properties.frame_rate, options.fourcc
        );

        Ok(Self {
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base: time_base,
            stream_time_base,
            width: properties.width,
            height: properties.height,
            frames_written: 0,
        })
    }

    fn write_pending_packets(&mut self) -> Result<(), VideoError> {
        let mut packet = Packet::empty();
        loop {
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => {
                    packet.set_stream(self.stream_index);
                    packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
                    packet
                        .write_interleaved(&mut self.output)
                        .map_err(encode_err)?;
                }
                Err(ffmpeg::Error::Eof) => return Ok(()),
                Err(e) if is_again(&e) => return Ok(()),
                Err(e) => return Err(encode_err(e)),
            }
        }
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<(), VideoError> {
        if frame.dimensions() != (self.width, self.height) || frame.data.len() != frame.expected_len() {
            return Err(VideoError::Encode(format!(
                "frame {} is {}x{} ({} bytes), output is {}x{}",
                frame.index,
                frame.width,
                frame.height,
                frame.data.len(),
                self.width,
                self.height
            )));
        }

        let mut rgb = frame::Video::new(Pixel::RGB24, self.width, self.height);
        let row_bytes = self.width as usize * 3;
        let stride = rgb.stride(0);
        let plane = rgb.data_mut(0);
        for (row, line) in frame.data.chunks_exact(row_bytes).enumerate() {
            plane[row * stride..row * stride + row_bytes].copy_from_slice(line);
        }

        let mut yuv = frame::Video::empty();
        self.scaler.run(&rgb, &mut yuv).map_err(encode_err)?;
        yuv.set_pts(Some(self.frames_written as i64));

        self.encoder.send_frame(&yuv).map_err(encode_err)?;
        self.write_pending_packets()?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<u64, VideoError> {
        self.encoder.send_eof().map_err(encode_err)?;
        self.write_pending_packets()?;
        self.output.write_trailer().map_err(encode_err)?;
        debug!("FfmpegSink: finalized after {} frames", self.frames_written);
        Ok(self.frames_written)
    }
}
