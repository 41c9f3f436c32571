use camcal_chessboard::corners::detect_candidates;
use camcal_chessboard::{ChessParams, ChessboardDetector};
use camcal_core::synthetic::SyntheticRig;
use camcal_core::BoardPattern;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_detect(c: &mut Criterion) {
    let pattern = BoardPattern::new(10, 7).unwrap();
    let rig = SyntheticRig::new(pattern, 640, 480);
    let img = rig.render(&rig.orbit_poses(8)[3]);
    let detector = ChessboardDetector::default();

    let chess = ChessParams::default();

    c.bench_function("chess_candidates_640x480", |b| {
        b.iter(|| detect_candidates(black_box(&img.view()), &chess))
    });
    c.bench_function("detect_10x7_640x480", |b| {
        b.iter(|| detector.detect(black_box(&img.view()), pattern))
    });
}

criterion_group!(detect_timing, bench_detect);
criterion_main!(detect_timing);
