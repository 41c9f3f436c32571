use crate::display::{Display, Signal, View, Wait};
use crate::error::PipelineError;
use crate::io::{SourceGuard, SourceProvider};
use camcal_chessboard::ChessboardDetector;
use camcal_core::{BoardPattern, Frame};
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectOptions {
    /// Take every frame without operator interaction.
    pub select_all: bool,
    /// Bounded wait for a key while streaming, in milliseconds.
    pub wait_ms: u64,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            select_all: false,
            wait_ms: 10,
        }
    }
}

#[derive(Debug)]
enum State {
    Streaming,
    /// Frozen on a frame with its corners shown.
    Paused(Frame),
    Done,
}

/// Picks calibration frames from a stream.
///
/// Interactively, the operator pauses on a frame, sees the detected corners
/// and confirms or discards it. In batch mode every frame is taken.
#[derive(Clone, Debug)]
pub struct FrameSelector {
    pub pattern: BoardPattern,
    pub options: SelectOptions,
    pub detector: ChessboardDetector,
}

impl FrameSelector {
    pub fn new(pattern: BoardPattern, options: SelectOptions) -> Self {
        Self {
            pattern,
            options,
            detector: ChessboardDetector::default(),
        }
    }

    pub fn with_detector(mut self, detector: ChessboardDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Run the selection over a freshly opened source.
    ///
    /// Returns the confirmed frames in stream order, unmodified. An empty
    /// selection is not an error here.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(pattern = %self.pattern, select_all = self.options.select_all))
    )]
    pub fn select<P, D>(&self, provider: &mut P, display: &mut D) -> Result<Vec<Frame>, PipelineError>
    where
        P: SourceProvider,
        D: Display + ?Sized,
    {
        let source = provider.open().map_err(PipelineError::SourceUnavailable)?;
        let mut source = SourceGuard::new(source);
        let info = source.info();
        debug!("source opened: {}x{} @ {:.1} fps", info.width, info.height, info.fps);

        let selected = if self.options.select_all {
            let mut frames = Vec::new();
            while let Some(frame) = source.next_frame()? {
                frames.push(frame);
            }
            frames
        } else {
            self.interactive(&mut source, display)?
        };

        info!("selected {} frames", selected.len());
        Ok(selected)
    }

    fn interactive<S, D>(
        &self,
        source: &mut SourceGuard<S>,
        display: &mut D,
    ) -> Result<Vec<Frame>, PipelineError>
    where
        S: crate::io::FrameSource,
        D: Display + ?Sized,
    {
        let mut selected = Vec::new();
        let mut state = State::Streaming;

        loop {
            state = match state {
                State::Streaming => match source.next_frame()? {
                    None => State::Done,
                    Some(frame) => {
                        let caption = caption(selected.len());
                        display.show(&View::new(&frame, &caption));
                        match display.wait_for_signal(Wait::millis(self.options.wait_ms)) {
                            Signal::Exit => State::Done,
                            Signal::Pause => State::Paused(frame),
                            _ => State::Streaming,
                        }
                    }
                },
                State::Paused(frame) => {
                    let corners = self.detector.detect_frame(&frame, self.pattern);
                    let mut caption = caption(selected.len());
                    if corners.is_none() {
                        caption.push_str(" (board not found)");
                    }
                    display.show(&View::new(&frame, &caption).with_corners(corners.as_deref()));
                    match display.wait_for_signal(Wait::Indefinite) {
                        Signal::Confirm => {
                            selected.push(frame);
                            debug!("frame confirmed ({} selected)", selected.len());
                            State::Streaming
                        }
                        Signal::Exit => State::Done,
                        _ => State::Streaming,
                    }
                }
                State::Done => break,
            };
        }
        Ok(selected)
    }
}

fn caption(selected: usize) -> String {
    format!("NSelect: {selected}")
}

/// Select frames showing `pattern` from the source opened by `provider`.
pub fn select<P, D>(
    provider: &mut P,
    pattern: BoardPattern,
    select_all: bool,
    display: &mut D,
) -> Result<Vec<Frame>, PipelineError>
where
    P: SourceProvider,
    D: Display + ?Sized,
{
    let options = SelectOptions {
        select_all,
        ..SelectOptions::default()
    };
    FrameSelector::new(pattern, options).select(provider, display)
}
