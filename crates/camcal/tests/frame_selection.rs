use camcal::core::synthetic::SyntheticRig;
use camcal::display::{ScriptedDisplay, Signal, Wait};
use camcal::io::{SourceProvider, VecSource, VecSourceProvider};
use camcal::{select, BoardPattern, Frame, FrameSelector, PipelineError, SelectOptions, SourceError};

fn frames(count: usize) -> (BoardPattern, Vec<Frame>) {
    let rig = SyntheticRig::new(BoardPattern::new(9, 6).unwrap(), 320, 240);
    let frames = rig
        .orbit_poses(count)
        .iter()
        .map(|pose| rig.render_frame(pose))
        .collect();
    (rig.pattern, frames)
}

fn interactive(pattern: BoardPattern) -> FrameSelector {
    FrameSelector::new(pattern, SelectOptions::default())
}

#[test]
fn batch_mode_takes_every_frame_without_display() {
    let (pattern, frames) = frames(4);
    let mut display = ScriptedDisplay::new([Signal::Exit]);
    let selected = select(
        &mut VecSourceProvider::new(frames.clone()),
        pattern,
        true,
        &mut display,
    )
    .unwrap();
    assert_eq!(selected, frames);
    assert!(display.shown.is_empty());
    assert_eq!(display.pending(), 1);
}

#[test]
fn pause_then_confirm_appends_the_original_frame() {
    use Signal::*;
    let (pattern, frames) = frames(6);
    let mut display = ScriptedDisplay::new([None, Pause, Confirm, None, Pause, Other, Pause, Confirm]);
    let selected = interactive(pattern)
        .select(&mut VecSourceProvider::new(frames.clone()), &mut display)
        .unwrap();

    assert_eq!(selected, vec![frames[1].clone(), frames[4].clone()]);

    let captions: Vec<&str> = display.shown.iter().map(|v| v.caption.as_str()).collect();
    assert_eq!(
        captions,
        vec![
            "NSelect: 0",
            "NSelect: 0",
            "NSelect: 0",
            "NSelect: 1",
            "NSelect: 1",
            "NSelect: 1",
            "NSelect: 1",
            "NSelect: 1",
            "NSelect: 2",
        ]
    );
    // Paused views carry the detected corners.
    assert_eq!(display.shown[2].corners, Some(54));
    assert_eq!(display.shown[0].corners, Option::None);

    let indefinite = display
        .waits
        .iter()
        .filter(|w| **w == Wait::Indefinite)
        .count();
    assert_eq!(indefinite, 3);
    assert_eq!(display.waits[0], Wait::millis(10));
}

#[test]
fn exit_stops_immediately_in_any_state() {
    use Signal::*;
    let (pattern, frames) = frames(5);

    let mut display = ScriptedDisplay::new([Pause, Exit, Confirm]);
    let selected = interactive(pattern)
        .select(&mut VecSourceProvider::new(frames.clone()), &mut display)
        .unwrap();
    assert!(selected.is_empty());
    assert_eq!(display.shown.len(), 2);
    assert_eq!(display.pending(), 1);

    let mut display = ScriptedDisplay::new([Pause, Confirm, Exit]);
    let selected = interactive(pattern)
        .select(&mut VecSourceProvider::new(frames.clone()), &mut display)
        .unwrap();
    assert_eq!(selected, vec![frames[0].clone()]);
    assert_eq!(display.shown.len(), 3);
}

#[test]
fn frame_without_board_can_still_be_confirmed() {
    use Signal::*;
    let (pattern, _) = frames(1);
    let blank = Frame::filled(320, 240, 3, 90).unwrap();
    let mut display = ScriptedDisplay::new([Pause, Confirm]);
    let selected = interactive(pattern)
        .select(&mut VecSourceProvider::new(vec![blank.clone()]), &mut display)
        .unwrap();
    assert_eq!(selected, vec![blank]);
    assert_eq!(display.shown[1].caption, "NSelect: 0 (board not found)");
    assert_eq!(display.shown[1].corners, Option::None);
}

#[test]
fn empty_source_gives_empty_selection() {
    let (pattern, _) = frames(1);
    for select_all in [false, true] {
        let mut display = ScriptedDisplay::default();
        let selected = select(
            &mut VecSourceProvider::new(Vec::new()),
            pattern,
            select_all,
            &mut display,
        )
        .unwrap();
        assert!(selected.is_empty());
        assert!(display.shown.is_empty());
    }
}

struct Unavailable;

impl SourceProvider for Unavailable {
    type Source = VecSource;

    fn open(&mut self) -> Result<VecSource, SourceError> {
        Err(SourceError::open("camera 0", "device busy"))
    }
}

#[test]
fn unavailable_source_is_fatal() {
    let (pattern, _) = frames(1);
    let err = select(&mut Unavailable, pattern, false, &mut ScriptedDisplay::default()).unwrap_err();
    assert!(matches!(err, PipelineError::SourceUnavailable(_)));
    assert!(err.to_string().contains("device busy"));
}
