use crate::display::{Display, Signal, View, Wait};
use crate::error::PipelineError;
use crate::io::{SinkGuard, SinkProvider, SourceGuard, SourceProvider, StreamInfo};
use camcal_core::{remap_bilinear, CameraMatrix, Distortion, Frame, FrameError, UndistortMap};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// What the right half of the rectifier output shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewMode {
    Original,
    #[default]
    Rectified,
}

impl ViewMode {
    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Original => "Original",
            ViewMode::Rectified => "Rectified",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Original => ViewMode::Rectified,
            ViewMode::Rectified => ViewMode::Original,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RectifyReport {
    pub frames_written: usize,
    pub final_mode: ViewMode,
}

/// Streams `[original | rectified-or-original]` frames from a source to a
/// sink, with the right half toggled by the operator.
#[derive(Clone, Debug)]
pub struct Rectifier {
    pub camera: CameraMatrix,
    pub distortion: Distortion,
    /// Bounded wait for a key per frame, in milliseconds.
    pub wait_ms: u64,
    mode: ViewMode,
    map: Option<UndistortMap>,
}

impl Rectifier {
    pub fn new(camera: CameraMatrix, distortion: Distortion) -> Self {
        Self {
            camera,
            distortion,
            wait_ms: 10,
            mode: ViewMode::Rectified,
            map: None,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Back to the start-of-run state: rectified view, no cached map.
    pub fn reset(&mut self) {
        self.mode = ViewMode::Rectified;
        self.map = None;
    }

    pub fn toggle(&mut self) -> ViewMode {
        self.mode = self.mode.toggled();
        debug!("view mode: {}", self.mode);
        self.mode
    }

    /// Undistortion map for `(width, height)`, built on first use.
    fn map_for(&mut self, width: usize, height: usize) -> &UndistortMap {
        if self.map.as_ref().is_some_and(|m| m.size() != (width, height)) {
            self.map = None;
        }
        let (camera, distortion) = (&self.camera, &self.distortion);
        self.map.get_or_insert_with(|| {
            debug!("building undistortion map for {width}x{height}");
            UndistortMap::new(camera, distortion, width, height)
        })
    }

    /// The image for the current mode: the remapped frame or the frame
    /// itself.
    pub fn current_view<'a>(&mut self, frame: &'a Frame) -> Cow<'a, Frame> {
        match self.mode {
            ViewMode::Original => Cow::Borrowed(frame),
            ViewMode::Rectified => {
                let map = self.map_for(frame.width(), frame.height());
                Cow::Owned(remap_bilinear(frame, map))
            }
        }
    }

    /// Side-by-side output for one frame; the input is left untouched.
    pub fn process(&mut self, frame: &Frame) -> Result<Frame, FrameError> {
        let right = self.current_view(frame);
        frame.hconcat(&right)
    }

    /// Run over a freshly opened source until it is exhausted or the
    /// operator exits. Source and sink are closed on every path.
    ///
    /// Every run starts in [`ViewMode::Rectified`] with a fresh map. The
    /// sink receives the side-by-side frame; the display shows the image of
    /// the current mode.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub fn run<P, K, D>(
        &mut self,
        source: &mut P,
        sink: &mut K,
        display: &mut D,
    ) -> Result<RectifyReport, PipelineError>
    where
        P: SourceProvider,
        K: SinkProvider,
        D: Display + ?Sized,
    {
        let mut source =
            SourceGuard::new(source.open().map_err(PipelineError::SourceUnavailable)?);
        let info = source.info();
        let out_info = StreamInfo::new(2 * info.width, info.height, info.fps);
        let mut sink = SinkGuard::new(sink.open(&out_info).map_err(PipelineError::SinkUnavailable)?);
        info!(
            "rectifying {}x{} stream, output {}x{}",
            info.width, info.height, out_info.width, out_info.height
        );

        self.reset();
        let mut written = 0;
        while let Some(frame) = source.next_frame()? {
            let right = self.current_view(&frame);
            let combined = frame.hconcat(&right)?;
            sink.write(&combined, self.mode)?;
            written += 1;
            display.show(&View::new(&right, self.mode.label()));

            let mut signal = display.wait_for_signal(Wait::millis(self.wait_ms));
            if signal == Signal::Pause {
                signal = display.wait_for_signal(Wait::Indefinite);
            }
            match signal {
                Signal::Exit => break,
                Signal::Toggle => {
                    self.toggle();
                }
                _ => {}
            }
        }

        sink.finish()?;
        info!("wrote {written} frames");
        Ok(RectifyReport {
            frames_written: written,
            final_mode: self.mode,
        })
    }
}

/// Rectify the stream from `source` into `sink` with the given intrinsics.
pub fn run<P, K, D>(
    source: &mut P,
    camera: &CameraMatrix,
    distortion: &Distortion,
    sink: &mut K,
    display: &mut D,
) -> Result<RectifyReport, PipelineError>
where
    P: SourceProvider,
    K: SinkProvider,
    D: Display + ?Sized,
{
    Rectifier::new(*camera, *distortion).run(source, sink, display)
}
