use camcal::core::synthetic::SyntheticRig;
use camcal::display::{ScriptedDisplay, Signal, Wait};
use camcal::io::{
    FrameSource, MemorySinkProvider, SinkProvider, SourceProvider, StreamInfo, VecSourceProvider,
};
use camcal::rectifier::{self, Rectifier, ViewMode};
use camcal::{BoardPattern, Distortion, Frame, PipelineError, SourceError};
use std::cell::Cell;
use std::rc::Rc;

fn rig() -> SyntheticRig {
    SyntheticRig::new(BoardPattern::new(9, 6).unwrap(), 320, 240).with_distortion(Distortion {
        k1: -0.25,
        k2: 0.06,
        ..Distortion::zero()
    })
}

fn frames(rig: &SyntheticRig, count: usize) -> Vec<Frame> {
    rig.orbit_poses(count)
        .iter()
        .map(|pose| rig.render_frame(pose))
        .collect()
}

#[test]
fn toggle_mid_stream_switches_the_right_half() {
    let rig = rig();
    let input = frames(&rig, 4);
    let mut sink = MemorySinkProvider::new();
    let mut display = ScriptedDisplay::new([Signal::None, Signal::Toggle]);

    let report = rectifier::run(
        &mut VecSourceProvider::new(input.clone()),
        &rig.camera,
        &rig.distortion,
        &mut sink,
        &mut display,
    )
    .unwrap();
    assert_eq!(report.frames_written, 4);
    assert_eq!(report.final_mode, ViewMode::Original);

    let rec = sink.recording();
    assert!(rec.closed);
    assert_eq!(rec.info, Some(StreamInfo::new(640, 240, 30.0)));
    let modes: Vec<ViewMode> = rec.frames.iter().map(|(_, m)| *m).collect();
    assert_eq!(
        modes,
        vec![
            ViewMode::Rectified,
            ViewMode::Rectified,
            ViewMode::Original,
            ViewMode::Original
        ]
    );

    for ((out, mode), original) in rec.frames.iter().zip(&input) {
        assert_eq!(out.size(), (640, 240));
        assert_eq!(&out.crop_columns(0, 320), original);
        let right = out.crop_columns(320, 320);
        match mode {
            ViewMode::Original => assert_eq!(&right, original),
            ViewMode::Rectified => assert_ne!(&right, original),
        }
    }

    let captions: Vec<&str> = display.shown.iter().map(|v| v.caption.as_str()).collect();
    assert_eq!(captions, vec!["Rectified", "Rectified", "Original", "Original"]);
    // The display gets the current mode's image, not the side-by-side frame.
    assert!(display.shown.iter().all(|v| v.size == (320, 240)));
}

#[test]
fn every_run_starts_rectified_with_a_fresh_map() {
    let rig = rig();
    let input = frames(&rig, 3);
    let mut rectifier = Rectifier::new(rig.camera, rig.distortion);

    let mut first_sink = MemorySinkProvider::new();
    let first = rectifier
        .run(
            &mut VecSourceProvider::new(input.clone()),
            &mut first_sink,
            &mut ScriptedDisplay::new([Signal::Toggle]),
        )
        .unwrap();
    assert_eq!(first.final_mode, ViewMode::Original);
    assert_eq!(rectifier.mode(), ViewMode::Original);

    let small = SyntheticRig::new(BoardPattern::new(5, 4).unwrap(), 160, 120);
    let small_frames = frames(&small, 2);
    let mut second_sink = MemorySinkProvider::new();
    let second = rectifier
        .run(
            &mut VecSourceProvider::new(small_frames.clone()),
            &mut second_sink,
            &mut ScriptedDisplay::default(),
        )
        .unwrap();
    assert_eq!(second.final_mode, ViewMode::Rectified);

    let rec = second_sink.recording();
    assert_eq!(rec.frames[0].1, ViewMode::Rectified);
    assert_eq!(rec.frames[0].0.size(), (320, 120));
    assert_eq!(&rec.frames[0].0.crop_columns(0, 160), &small_frames[0]);
}

#[test]
fn rectified_half_straightens_the_board() {
    // Undistorting with the true model puts the board corners back on the
    // pinhole projection.
    let rig = rig();
    let pose = rig.orbit_poses(3)[0];
    let frame = rig.render_frame(&pose);
    let mut r = Rectifier::new(rig.camera, rig.distortion);
    let right = r.process(&frame).unwrap().crop_columns(320, 320);

    let pinhole = SyntheticRig {
        distortion: Distortion::zero(),
        ..rig.clone()
    };
    let ideal = pinhole.render_frame(&pose);
    let diff: f64 = right
        .data()
        .iter()
        .zip(ideal.data())
        .map(|(a, b)| (*a as f64 - *b as f64).abs())
        .sum::<f64>()
        / ideal.data().len() as f64;
    let raw: f64 = frame
        .data()
        .iter()
        .zip(ideal.data())
        .map(|(a, b)| (*a as f64 - *b as f64).abs())
        .sum::<f64>()
        / ideal.data().len() as f64;
    assert!(diff < raw, "rectified {diff} vs raw {raw}");
}

#[test]
fn pause_waits_for_the_next_signal_and_processes_it() {
    let rig = rig();
    let mut sink = MemorySinkProvider::new();
    let mut display = ScriptedDisplay::new([Signal::Pause, Signal::Toggle, Signal::Pause, Signal::Exit]);
    let report = rectifier::run(
        &mut VecSourceProvider::new(frames(&rig, 5)),
        &rig.camera,
        &rig.distortion,
        &mut sink,
        &mut display,
    )
    .unwrap();

    assert_eq!(report.frames_written, 2);
    assert_eq!(
        display.waits,
        vec![
            Wait::millis(10),
            Wait::Indefinite,
            Wait::millis(10),
            Wait::Indefinite
        ]
    );
    let rec = sink.recording();
    assert_eq!(rec.frames[0].1, ViewMode::Rectified);
    assert_eq!(rec.frames[1].1, ViewMode::Original);
    assert!(rec.closed);
}

#[test]
fn empty_source_writes_nothing() {
    let mut sink = MemorySinkProvider::new();
    let report = rectifier::run(
        &mut VecSourceProvider::new(Vec::new()),
        &rig().camera,
        &Distortion::zero(),
        &mut sink,
        &mut ScriptedDisplay::default(),
    )
    .unwrap();
    assert_eq!(report.frames_written, 0);
    assert_eq!(report.final_mode, ViewMode::Rectified);
    assert!(sink.recording().closed);
}

struct TrackedSource {
    inner: camcal::io::VecSource,
    closed: Rc<Cell<bool>>,
}

impl FrameSource for TrackedSource {
    fn info(&self) -> StreamInfo {
        self.inner.info()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        self.inner.next_frame()
    }

    fn close(&mut self) {
        self.closed.set(true);
    }
}

struct Tracked {
    frames: Vec<Frame>,
    closed: Rc<Cell<bool>>,
}

impl SourceProvider for Tracked {
    type Source = TrackedSource;

    fn open(&mut self) -> Result<TrackedSource, SourceError> {
        Ok(TrackedSource {
            inner: VecSourceProvider::new(self.frames.clone()).open()?,
            closed: Rc::clone(&self.closed),
        })
    }
}

struct BrokenSink;

impl SinkProvider for BrokenSink {
    type Sink = camcal::io::MemorySink;

    fn open(&mut self, _info: &StreamInfo) -> Result<Self::Sink, SourceError> {
        Err(SourceError::open("out.avi", "codec missing"))
    }
}

#[test]
fn unavailable_sink_is_fatal_and_releases_the_source() {
    let rig = rig();
    let closed = Rc::new(Cell::new(false));
    let mut source = Tracked {
        frames: frames(&rig, 2),
        closed: Rc::clone(&closed),
    };
    let err = Rectifier::new(rig.camera, rig.distortion)
        .run(&mut source, &mut BrokenSink, &mut ScriptedDisplay::default())
        .unwrap_err();
    assert!(matches!(err, PipelineError::SinkUnavailable(_)));
    assert!(closed.get());
}
