//! Calibrate and rectify a rendered chessboard sequence end to end.
//!
//! Usage: `cargo run -p camcal --example synthetic_session [OUT_DIR]`
//! Without `OUT_DIR` the rectified frames are kept in memory.

use camcal::core::synthetic::SyntheticRig;
use camcal::io::{MemorySinkProvider, VecSourceProvider};
use camcal::sequence::PngSequenceProvider;
use camcal::{BoardPattern, CellSize, Distortion, HeadlessDisplay, Pipeline, PipelineConfig};
use log::{info, LevelFilter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    camcal::core::init_with_level(LevelFilter::Info)?;

    let pattern = BoardPattern::new(10, 7)?;
    let mut rig = SyntheticRig::new(pattern, 640, 480).with_distortion(Distortion {
        k1: -0.2,
        k2: 0.05,
        p1: 0.001,
        ..Distortion::zero()
    });
    rig.cell_size = CellSize::new(0.025)?;

    let frames: Vec<_> = rig
        .orbit_poses(12)
        .iter()
        .map(|pose| rig.render_frame(pose))
        .collect();
    info!("rendered {} frames", frames.len());

    let mut config = PipelineConfig::new(pattern);
    config.cell_size = rig.cell_size;
    config.select.select_all = true;
    let pipeline = Pipeline::new(config);
    let mut source = VecSourceProvider::new(frames);

    let outcome = match std::env::args().nth(1) {
        Some(dir) => pipeline.run(&mut source, &mut PngSequenceProvider::new(dir), &mut HeadlessDisplay)?,
        None => pipeline.run(&mut source, &mut MemorySinkProvider::new(), &mut HeadlessDisplay)?,
    };

    print!("{}", outcome.calibration.summary());
    println!(
        "* Ground truth fx = {:.2}, fy = {:.2}, k1 = {:.3}",
        rig.camera.fx, rig.camera.fy, rig.distortion.k1
    );
    Ok(())
}
