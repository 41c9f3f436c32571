//! Operator display and keyboard signals.
//!
//! The selector and the rectifier only talk to a [`Display`]; a windowing
//! backend, a headless batch run and a scripted test run are all just
//! implementations of this trait.

use camcal_core::Frame;
use nalgebra::Point2;
use std::collections::VecDeque;
use std::str::FromStr;
use std::time::Duration;

/// Abstract operator input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    /// No input within the wait.
    None,
    Pause,
    Confirm,
    Exit,
    Toggle,
    /// Any other key.
    Other,
}

impl Signal {
    /// Map a key code to a signal: space pauses, Enter confirms, ESC exits
    /// and Tab toggles.
    pub fn from_key(key: u32) -> Self {
        match key {
            0x20 => Signal::Pause,
            0x0d | 0x0a => Signal::Confirm,
            0x1b => Signal::Exit,
            0x09 => Signal::Toggle,
            _ => Signal::Other,
        }
    }

    fn from_script_char(c: char) -> Option<Self> {
        Some(match c {
            'n' | '.' => Signal::None,
            'p' => Signal::Pause,
            'c' => Signal::Confirm,
            'x' => Signal::Exit,
            't' => Signal::Toggle,
            'o' => Signal::Other,
            _ => return None,
        })
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown signal '{0}' in script (expected one of n . p c x t o)")]
pub struct ScriptError(pub char);

/// A sequence of signals written as one character each, whitespace ignored:
/// `n`/`.` none, `p` pause, `c` confirm, `x` exit, `t` toggle, `o` other.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignalScript(pub Vec<Signal>);

impl FromStr for SignalScript {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| Signal::from_script_char(c.to_ascii_lowercase()).ok_or(ScriptError(c)))
            .collect::<Result<Vec<_>, _>>()
            .map(SignalScript)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    Timeout(Duration),
    Indefinite,
}

impl Wait {
    pub fn millis(ms: u64) -> Self {
        Wait::Timeout(Duration::from_millis(ms))
    }
}

/// What the operator is shown.
#[derive(Clone, Copy, Debug)]
pub struct View<'a> {
    pub frame: &'a Frame,
    pub caption: &'a str,
    /// Detected corners to overlay, in frame pixels.
    pub corners: Option<&'a [Point2<f32>]>,
}

impl<'a> View<'a> {
    pub fn new(frame: &'a Frame, caption: &'a str) -> Self {
        Self {
            frame,
            caption,
            corners: None,
        }
    }

    pub fn with_corners(mut self, corners: Option<&'a [Point2<f32>]>) -> Self {
        self.corners = corners;
        self
    }
}

pub trait Display {
    fn show(&mut self, view: &View<'_>);

    fn wait_for_signal(&mut self, wait: Wait) -> Signal;
}

/// Shows nothing and never produces input.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeadlessDisplay;

impl Display for HeadlessDisplay {
    fn show(&mut self, _view: &View<'_>) {}

    fn wait_for_signal(&mut self, _wait: Wait) -> Signal {
        Signal::None
    }
}

/// One [`Display::show`] call as seen by a [`ScriptedDisplay`].
#[derive(Clone, Debug, PartialEq)]
pub struct ShownView {
    pub caption: String,
    pub corners: Option<usize>,
    pub size: (usize, usize),
}

/// Replays a fixed list of signals, one per wait, then answers
/// [`Signal::None`]. Everything shown and every wait is recorded.
#[derive(Clone, Debug, Default)]
pub struct ScriptedDisplay {
    script: VecDeque<Signal>,
    pub shown: Vec<ShownView>,
    pub waits: Vec<Wait>,
}

impl ScriptedDisplay {
    pub fn new(signals: impl IntoIterator<Item = Signal>) -> Self {
        Self {
            script: signals.into_iter().collect(),
            shown: Vec::new(),
            waits: Vec::new(),
        }
    }

    pub fn from_script(script: SignalScript) -> Self {
        Self::new(script.0)
    }

    /// Signals not yet consumed.
    pub fn pending(&self) -> usize {
        self.script.len()
    }
}

impl Display for ScriptedDisplay {
    fn show(&mut self, view: &View<'_>) {
        self.shown.push(ShownView {
            caption: view.caption.to_owned(),
            corners: view.corners.map(<[_]>::len),
            size: view.frame.size(),
        });
    }

    fn wait_for_signal(&mut self, wait: Wait) -> Signal {
        self.waits.push(wait);
        self.script.pop_front().unwrap_or(Signal::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_signals() {
        assert_eq!(Signal::from_key(b' ' as u32), Signal::Pause);
        assert_eq!(Signal::from_key(13), Signal::Confirm);
        assert_eq!(Signal::from_key(27), Signal::Exit);
        assert_eq!(Signal::from_key(9), Signal::Toggle);
        assert_eq!(Signal::from_key(b'q' as u32), Signal::Other);
    }

    #[test]
    fn parses_scripts() {
        let s: SignalScript = "n.p c\nX t o".parse().unwrap();
        assert_eq!(
            s.0,
            vec![
                Signal::None,
                Signal::None,
                Signal::Pause,
                Signal::Confirm,
                Signal::Exit,
                Signal::Toggle,
                Signal::Other
            ]
        );
        assert_eq!("pq".parse::<SignalScript>(), Err(ScriptError('q')));
    }

    #[test]
    fn scripted_display_runs_dry() {
        let mut d = ScriptedDisplay::new([Signal::Pause]);
        let frame = Frame::filled(3, 2, 1, 0).unwrap();
        d.show(&View::new(&frame, "hello"));
        assert_eq!(d.wait_for_signal(Wait::millis(10)), Signal::Pause);
        assert_eq!(d.wait_for_signal(Wait::Indefinite), Signal::None);
        assert_eq!(d.shown[0].caption, "hello");
        assert_eq!(d.shown[0].size, (3, 2));
        assert_eq!(d.waits, vec![Wait::millis(10), Wait::Indefinite]);
    }
}
