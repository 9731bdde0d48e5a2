//! Test doubles for the OCR and video seams

use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use crate::vision::{ChannelOrder, Detection, OcrCapability, OcrError, Quad};
use crate::video::{
    FrameRate, FrameSink, FrameSource, OutputOptions, VideoBackend, VideoError, VideoFrame,
    VideoProperties,
};

/// OCR that replays queued responses, then reports nothing
pub struct ScriptedOcr {
    order: ChannelOrder,
    responses: Mutex<VecDeque<Result<Vec<Detection>, OcrError>>>,
    /// Every image `read_text` was called with
    pub seen: Mutex<Vec<RgbImage>>,
}

impl ScriptedOcr {
    pub fn new(order: ChannelOrder) -> Self {
        Self {
            order,
            responses: Mutex::new(VecDeque::new()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, response: Result<Vec<Detection>, OcrError>) -> Self {
        self.responses.lock().push_back(response);
        self
    }
}

impl OcrCapability for ScriptedOcr {
    fn channel_order(&self) -> ChannelOrder {
        self.order
    }

    fn read_text(&self, image: &RgbImage) -> Result<Vec<Detection>, OcrError> {
        self.seen.lock().push(image.clone());
        self.responses.lock().pop_front().unwrap_or(Ok(Vec::new()))
    }
}

/// OCR that "reads" `word` wherever pixels of `marker` colour appear
pub struct MarkerOcr {
    pub marker: Rgb<u8>,
    pub word: String,
}

impl OcrCapability for MarkerOcr {
    fn read_text(&self, image: &RgbImage) -> Result<Vec<Detection>, OcrError> {
        let hits: Vec<(u32, u32)> = image
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == self.marker)
            .map(|(x, y, _)| (x, y))
            .collect();
        let Some(&(first_x, first_y)) = hits.first() else {
            return Ok(Vec::new());
        };

        let (x0, y0, x1, y1) = hits.iter().fold(
            (first_x, first_y, first_x, first_y),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        );

        Ok(vec![Detection {
            quad: Quad::from_rect(x0 as f32, y0 as f32, (x1 - x0) as f32, (y1 - y0) as f32),
            text: self.word.clone(),
            confidence: 0.99,
        }])
    }
}

pub fn detection(x: f32, y: f32, w: f32, h: f32, text: &str, confidence: f32) -> Detection {
    Detection {
        quad: Quad::from_rect(x, y, w, h),
        text: text.to_string(),
        confidence,
    }
}

/// Solid frames, each a different shade so order is observable
pub fn shaded_frames(count: u64, width: u32, height: u32) -> Vec<VideoFrame> {
    (0..count)
        .map(|i| {
            let shade = (i * 10 % 200) as u8;
            VideoFrame::from_image(RgbImage::from_pixel(width, height, Rgb([shade, shade, shade])), i)
        })
        .collect()
}

/// In-memory backend: inputs must exist on disk but their frames come from memory
pub struct MemoryBackend {
    pub properties: VideoProperties,
    pub frames: Vec<VideoFrame>,
    /// Fail decoding after this many frames
    pub decode_error_after: Option<usize>,
    /// Frames handed to the most recent sink
    pub written: Arc<Mutex<Vec<VideoFrame>>>,
    /// Properties the most recent sink was created with
    pub output_properties: Arc<Mutex<Option<VideoProperties>>>,
}

impl MemoryBackend {
    pub fn new(frames: Vec<VideoFrame>) -> Self {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((8, 8));
        Self {
            properties: VideoProperties {
                width,
                height,
                frame_rate: FrameRate::new(25, 1),
                frame_count: Some(frames.len() as u64),
            },
            frames,
            decode_error_after: None,
            written: Arc::new(Mutex::new(Vec::new())),
            output_properties: Arc::new(Mutex::new(None)),
        }
    }
}

struct MemorySource {
    properties: VideoProperties,
    frames: VecDeque<VideoFrame>,
    remaining_before_error: Option<usize>,
}

impl FrameSource for MemorySource {
    fn properties(&self) -> &VideoProperties {
        &self.properties
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>, VideoError> {
        if let Some(remaining) = self.remaining_before_error.as_mut() {
            if *remaining == 0 {
                return Err(VideoError::Decode("corrupt packet".to_string()));
            }
            *remaining -= 1;
        }
        Ok(self.frames.pop_front())
    }
}

struct MemorySink {
    file: std::fs::File,
    written: Arc<Mutex<Vec<VideoFrame>>>,
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<(), VideoError> {
        use std::io::Write;
        self.file.write_all(&frame.index.to_le_bytes())?;
        self.written.lock().push(frame.clone());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<u64, VideoError> {
        self.file.sync_all()?;
        Ok(self.written.lock().len() as u64)
    }
}

impl VideoBackend for MemoryBackend {
    fn open_input(&self, path: &Path) -> Result<Box<dyn FrameSource>, VideoError> {
        if !path.exists() {
            return Err(VideoError::Open(format!("no such file: {}", path.display())));
        }
        Ok(Box::new(MemorySource {
            properties: self.properties,
            frames: self.frames.iter().cloned().collect(),
            remaining_before_error: self.decode_error_after,
        }))
    }

    fn create_output(
        &self,
        path: &Path,
        properties: &VideoProperties,
        _options: &OutputOptions,
    ) -> Result<Box<dyn FrameSink>, VideoError> {
        self.written.lock().clear();
        *self.output_properties.lock() = Some(*properties);
        Ok(Box::new(MemorySink {
            file: std::fs::File::create(path)?,
            written: Arc::clone(&self.written),
        }))
    }
}
