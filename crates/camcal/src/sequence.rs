//! Image-sequence frame source and PNG-sequence sink.
//!
//! A directory of still images stands in for a video stream: frames are
//! read in file-name order at a nominal frame rate. The sink writes
//! `frame_00000.png, ...` plus a `labels.csv` with the view mode of every
//! frame.

use crate::error::SourceError;
use crate::io::{FrameSink, FrameSource, SinkProvider, SourceProvider, StreamInfo};
use crate::rectifier::ViewMode;
use ::image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use camcal_core::{Frame, GrayImageView};
use log::debug;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Borrow an `image::GrayImage` as a core gray view.
pub fn gray_view(img: &GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Convert a decoded image into a frame: gray stays 1 channel, images with
/// alpha become RGBA, everything else RGB.
pub fn frame_from_image(img: DynamicImage) -> Result<Frame, SourceError> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let color = img.color();
    let frame = if !color.has_color() && !color.has_alpha() {
        Frame::from_raw(w, h, 1, img.into_luma8().into_raw())?
    } else if color.has_alpha() {
        Frame::from_raw(w, h, 4, img.into_rgba8().into_raw())?
    } else {
        Frame::from_raw(w, h, 3, img.into_rgb8().into_raw())?
    };
    Ok(frame)
}

pub fn frame_to_image(frame: &Frame) -> Result<DynamicImage, SourceError> {
    let (w, h) = (frame.width() as u32, frame.height() as u32);
    let data = frame.data().to_vec();
    let img = match frame.channels() {
        1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
        _ => None,
    };
    img.ok_or(SourceError::Unencodable {
        channels: frame.channels(),
    })
}

/// Sorted image files of `dir`.
fn list_images(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let entries = fs::read_dir(dir).map_err(|e| SourceError::open(dir.display().to_string(), e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let known = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if known && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Opens a directory of images as a frame stream.
#[derive(Clone, Debug)]
pub struct ImageSequenceProvider {
    pub dir: PathBuf,
    pub fps: f64,
}

impl ImageSequenceProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fps: 30.0,
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }
}

impl SourceProvider for ImageSequenceProvider {
    type Source = ImageSequence;

    fn open(&mut self) -> Result<ImageSequence, SourceError> {
        let paths = list_images(&self.dir)?;
        let (width, height) = match paths.first() {
            Some(first) => {
                let (w, h) = ::image::image_dimensions(first)
                    .map_err(|e| SourceError::open(first.display().to_string(), e))?;
                (w as usize, h as usize)
            }
            None => (0, 0),
        };
        debug!("{} images in {}", paths.len(), self.dir.display());
        Ok(ImageSequence {
            info: StreamInfo::new(width, height, self.fps),
            paths: paths.into(),
        })
    }
}

#[derive(Debug)]
pub struct ImageSequence {
    info: StreamInfo,
    paths: VecDeque<PathBuf>,
}

impl FrameSource for ImageSequence {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        let img = ::image::open(&path)?;
        frame_from_image(img).map(Some)
    }

    fn close(&mut self) {
        self.paths.clear();
    }
}

/// Writes frames as numbered PNG files into a directory.
#[derive(Clone, Debug)]
pub struct PngSequenceProvider {
    pub dir: PathBuf,
}

impl PngSequenceProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SinkProvider for PngSequenceProvider {
    type Sink = PngSequenceSink;

    fn open(&mut self, info: &StreamInfo) -> Result<PngSequenceSink, SourceError> {
        let what = self.dir.display().to_string();
        fs::create_dir_all(&self.dir).map_err(|e| SourceError::open(what.clone(), e))?;
        let file = File::create(self.dir.join("labels.csv"))
            .map_err(|e| SourceError::open(what, e))?;
        let mut labels = BufWriter::new(file);
        writeln!(labels, "index,file,mode")?;
        debug!(
            "writing {}x{} frames to {}",
            info.width,
            info.height,
            self.dir.display()
        );
        Ok(PngSequenceSink {
            dir: self.dir.clone(),
            labels,
            next: 0,
        })
    }
}

#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    labels: BufWriter<File>,
    next: usize,
}

impl FrameSink for PngSequenceSink {
    fn write(&mut self, frame: &Frame, mode: ViewMode) -> Result<(), SourceError> {
        let name = format!("frame_{:05}.png", self.next);
        frame_to_image(frame)?.save_with_format(self.dir.join(&name), ImageFormat::Png)?;
        writeln!(self.labels, "{},{},{}", self.next, name, mode.label())?;
        self.next += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.labels.flush()?;
        Ok(())
    }
}
