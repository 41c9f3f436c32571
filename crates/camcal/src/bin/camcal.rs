use std::{error::Error, path::PathBuf};

use camcal::core::{BoardPattern, CellSize};
use camcal::sequence::{ImageSequenceProvider, PngSequenceProvider};
use camcal::{
    write_result_json, Display, HeadlessDisplay, Pipeline, PipelineConfig, ScriptedDisplay,
    SignalScript,
};
use clap::Parser;
use log::{info, warn};

/// Calibrate a camera from a chessboard image sequence and write the
/// side-by-side rectified sequence.
#[derive(Debug, Parser)]
#[command(author, version, about = "Chessboard camera calibration and rectification")]
struct Args {
    /// Directory of frames (png, jpg, bmp), read in file-name order.
    #[arg(long)]
    frames: PathBuf,

    /// Inner-corner grid as COLSxROWS, e.g. 10x7.
    #[arg(long)]
    board: Option<BoardPattern>,

    /// Edge length of one board square.
    #[arg(long)]
    cell_size: Option<f64>,

    /// Use every frame instead of operator-selected ones.
    #[arg(long)]
    select_all: bool,

    /// Operator signals to replay, one character each:
    /// n none, p pause, c confirm, x exit, t toggle, o other.
    #[arg(long)]
    signals: Option<SignalScript>,

    /// Nominal frame rate of the sequence.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Write the rectified side-by-side frames here.
    #[arg(long)]
    output: Option<PathBuf>,

    /// JSON PipelineConfig; command-line flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the calibration result as JSON.
    #[arg(long)]
    report: Option<PathBuf>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Structured JSON logs (requires the `tracing` feature).
    #[arg(long)]
    json_log: bool,
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(args: &Args) -> Result<(), Box<dyn Error>> {
    #[cfg(feature = "tracing")]
    {
        let _ = args.verbose;
        camcal::init_tracing(args.json_log);
        Ok(())
    }
    #[cfg(not(feature = "tracing"))]
    {
        let level = match args.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        camcal::core::init_with_level(level)?;
        if args.json_log {
            warn!("--json-log needs the `tracing` feature; using plain logs");
        }
        Ok(())
    }
}

fn build_config(args: &Args) -> Result<PipelineConfig, Box<dyn Error>> {
    let mut config = match (&args.config, args.board) {
        (Some(path), _) => PipelineConfig::load_json(path)?,
        (None, Some(pattern)) => PipelineConfig::new(pattern),
        (None, None) => return Err("either --board or --config is required".into()),
    };
    if let Some(pattern) = args.board {
        config.pattern = pattern;
    }
    if let Some(size) = args.cell_size {
        config.cell_size = CellSize::new(size)?;
    }
    if args.select_all {
        config.select.select_all = true;
    }
    Ok(config)
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(&args)?;

    let mut config = build_config(&args)?;
    let mut display: Box<dyn Display> = match args.signals.clone() {
        Some(script) => Box::new(ScriptedDisplay::from_script(script)),
        None => {
            if !config.select.select_all {
                warn!("no interactive display and no --signals; selecting every frame");
                config.select.select_all = true;
            }
            Box::new(HeadlessDisplay)
        }
    };

    let mut frames = ImageSequenceProvider::new(&args.frames).with_fps(args.fps);
    let pipeline = Pipeline::new(config);
    let result = match &args.output {
        Some(dir) => {
            let mut sink = PngSequenceProvider::new(dir);
            let outcome = pipeline.run(&mut frames, &mut sink, display.as_mut())?;
            info!(
                "{} rectified frames written to {}",
                outcome.rectify.frames_written,
                dir.display()
            );
            outcome.calibration
        }
        None => pipeline.calibrate_from_source(&mut frames, display.as_mut())?,
    };

    print!("{}", result.summary());
    if let Some(path) = &args.report {
        write_result_json(&result, path)?;
    }
    Ok(())
}
