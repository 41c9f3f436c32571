//! Frame source and sink abstractions.
//!
//! Opening is a separate step ([`SourceProvider::open`],
//! [`SinkProvider::open`]) so that open failures can be told apart from
//! failures while streaming. Opened endpoints are wrapped in guards that
//! release them on every exit path.

use crate::error::SourceError;
use crate::rectifier::ViewMode;
use camcal_core::Frame;
use log::warn;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Geometry and rate of a frame stream.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub width: usize,
    pub height: usize,
    pub fps: f64,
}

impl StreamInfo {
    pub fn new(width: usize, height: usize, fps: f64) -> Self {
        Self { width, height, fps }
    }
}

/// An opened stream of frames.
pub trait FrameSource {
    fn info(&self) -> StreamInfo;

    /// Next frame, or `Ok(None)` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    fn close(&mut self) {}
}

pub trait SourceProvider {
    type Source: FrameSource;

    fn open(&mut self) -> Result<Self::Source, SourceError>;
}

/// An opened output stream.
pub trait FrameSink {
    /// Append one frame; `mode` names the content of its right half.
    fn write(&mut self, frame: &Frame, mode: ViewMode) -> Result<(), SourceError>;

    fn close(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

pub trait SinkProvider {
    type Sink: FrameSink;

    /// Open a sink for frames of the dimensions in `info`.
    fn open(&mut self, info: &StreamInfo) -> Result<Self::Sink, SourceError>;
}

/// Closes the wrapped source when dropped.
pub struct SourceGuard<S: FrameSource>(S);

impl<S: FrameSource> SourceGuard<S> {
    pub fn new(source: S) -> Self {
        Self(source)
    }

    pub fn info(&self) -> StreamInfo {
        self.0.info()
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        self.0.next_frame()
    }
}

impl<S: FrameSource> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Closes the wrapped sink when dropped unless [`SinkGuard::finish`] ran.
pub struct SinkGuard<S: FrameSink>(Option<S>);

impl<S: FrameSink> SinkGuard<S> {
    pub fn new(sink: S) -> Self {
        Self(Some(sink))
    }

    pub fn write(&mut self, frame: &Frame, mode: ViewMode) -> Result<(), SourceError> {
        match self.0.as_mut() {
            Some(sink) => sink.write(frame, mode),
            None => Ok(()),
        }
    }

    /// Close the sink and report the result.
    pub fn finish(mut self) -> Result<(), SourceError> {
        match self.0.take() {
            Some(mut sink) => sink.close(),
            None => Ok(()),
        }
    }
}

impl<S: FrameSink> Drop for SinkGuard<S> {
    fn drop(&mut self) {
        if let Some(mut sink) = self.0.take() {
            if let Err(err) = sink.close() {
                warn!("closing frame sink failed: {err}");
            }
        }
    }
}

/// In-memory frame source.
#[derive(Clone, Debug)]
pub struct VecSource {
    info: StreamInfo,
    frames: VecDeque<Frame>,
}

impl VecSource {
    /// Stream over `frames`; the stream size is taken from the first frame.
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        let (width, height) = frames.first().map(Frame::size).unwrap_or((0, 0));
        Self {
            info: StreamInfo::new(width, height, fps),
            frames: frames.into(),
        }
    }

    /// Frames not yet pulled.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for VecSource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        Ok(self.frames.pop_front())
    }
}

/// Hands out a copy of a fixed frame list on every open.
#[derive(Clone, Debug)]
pub struct VecSourceProvider {
    pub frames: Vec<Frame>,
    pub fps: f64,
}

impl VecSourceProvider {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames, fps: 30.0 }
    }
}

impl SourceProvider for VecSourceProvider {
    type Source = VecSource;

    fn open(&mut self) -> Result<VecSource, SourceError> {
        Ok(VecSource::new(self.frames.clone(), self.fps))
    }
}

/// Everything written to a [`MemorySink`].
#[derive(Clone, Debug, Default)]
pub struct Recording {
    /// Dimensions the sink was opened with.
    pub info: Option<StreamInfo>,
    pub frames: Vec<(Frame, ViewMode)>,
    pub closed: bool,
}

/// Sink provider that records frames in memory, shared with the caller
/// through [`MemorySinkProvider::recording`].
#[derive(Clone, Debug, Default)]
pub struct MemorySinkProvider {
    recording: Rc<RefCell<Recording>>,
}

impl MemorySinkProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of what has been written so far.
    pub fn recording(&self) -> Recording {
        self.recording.borrow().clone()
    }
}

impl SinkProvider for MemorySinkProvider {
    type Sink = MemorySink;

    fn open(&mut self, info: &StreamInfo) -> Result<MemorySink, SourceError> {
        let mut rec = self.recording.borrow_mut();
        rec.info = Some(*info);
        rec.closed = false;
        Ok(MemorySink {
            recording: Rc::clone(&self.recording),
        })
    }
}

#[derive(Debug)]
pub struct MemorySink {
    recording: Rc<RefCell<Recording>>,
}

impl FrameSink for MemorySink {
    fn write(&mut self, frame: &Frame, mode: ViewMode) -> Result<(), SourceError> {
        self.recording.borrow_mut().frames.push((frame.clone(), mode));
        Ok(())
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.recording.borrow_mut().closed = true;
        Ok(())
    }
}
