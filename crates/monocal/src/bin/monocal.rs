//! monocal CLI: calibrate a camera from chessboard images and undistort images.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};
use monocal::detect::ChessCornerDetector;
use monocal::imaging::FsImageLoader;
use monocal::io::{CalibrateConfig, CalibrationReport, UndistortJob};
use monocal::solver::ZhangSolver;
use monocal::{CalibrationSession, Calibrator, CollectEvent, ImageSize, UndistortionCache};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "monocal")]
#[command(about = "Monocular camera calibration from chessboard images")]
#[command(version)]
struct Cli {
    /// Shorthand for `--log-level debug`.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace); falls back to `MONOCAL_LOG`.
    #[arg(long, global = true)]
    log_level: Option<LevelFilter>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calibrate from a set of chessboard images.
    Calibrate(CalibrateArgs),

    /// Undistort one image with a saved calibration report.
    Undistort(UndistortArgs),
}

#[derive(Debug, Clone, Args)]
struct CalibrateArgs {
    /// JSON run configuration; flags override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Calibration images.
    images: Vec<PathBuf>,

    /// Inner corners per chessboard column.
    #[arg(long)]
    rows: Option<u32>,

    /// Inner corners per chessboard row.
    #[arg(long)]
    cols: Option<u32>,

    /// Square edge length in object units.
    #[arg(long)]
    square_size: Option<f32>,

    /// Estimate the rational radial model (k4 k5 k6).
    #[arg(long)]
    rational: bool,

    /// Fix the tangential terms p1 p2 at zero.
    #[arg(long)]
    no_tangential: bool,

    /// Fewest accepted views required to solve.
    #[arg(long)]
    min_views: Option<usize>,

    /// Path to write the calibration report (JSON).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Undistort this image with the new calibration.
    #[arg(long, requires = "undistorted_out")]
    undistort: Option<PathBuf>,

    /// Where to write the undistorted image.
    #[arg(long, requires = "undistort")]
    undistorted_out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct UndistortArgs {
    /// Calibration report written by `monocal calibrate`.
    #[arg(long)]
    report: PathBuf,

    /// Input image.
    #[arg(long)]
    input: PathBuf,

    /// Output image.
    #[arg(long)]
    output: PathBuf,

    /// Output width; defaults to the calibrated width.
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Output height; defaults to the calibrated height.
    #[arg(long, requires = "width")]
    height: Option<u32>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match cli.command {
        Commands::Calibrate(args) => run_calibrate(args),
        Commands::Undistort(args) => run_undistort(args),
    };
    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_cli: &Cli) {
    monocal::core::init_tracing(false);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) {
    let level = match (cli.log_level, cli.verbose) {
        (Some(level), _) => level,
        (None, true) => LevelFilter::Debug,
        (None, false) => monocal::core::level_from_env().unwrap_or(LevelFilter::Info),
    };
    if let Err(err) = monocal::core::init_with_level(level) {
        eprintln!("warning: logger already installed: {err}");
    }
}

fn merge_config(args: &CalibrateArgs) -> CliResult<CalibrateConfig> {
    let mut cfg = match &args.config {
        Some(path) => CalibrateConfig::load_json(path)?,
        None => {
            let (Some(rows), Some(cols)) = (args.rows, args.cols) else {
                return Err("--rows and --cols are required without --config".into());
            };
            CalibrateConfig::new(rows, cols)
        }
    };

    if let Some(rows) = args.rows {
        cfg.rows = rows;
    }
    if let Some(cols) = args.cols {
        cfg.cols = cols;
    }
    if let Some(square_size) = args.square_size {
        cfg.square_size = square_size;
    }
    if let Some(min_views) = args.min_views {
        cfg.min_views = min_views;
    }
    if args.rational {
        cfg.options.extended_radial_model = true;
    }
    if args.no_tangential {
        cfg.options.tangential_distortion = false;
    }
    if !args.images.is_empty() {
        cfg.images = args
            .images
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
    }
    if let Some(output) = &args.output {
        cfg.output_path = Some(output.to_string_lossy().into_owned());
    }
    if let (Some(input), Some(output)) = (&args.undistort, &args.undistorted_out) {
        cfg.undistort = Some(UndistortJob {
            input: input.to_string_lossy().into_owned(),
            output: output.to_string_lossy().into_owned(),
        });
    }
    Ok(cfg)
}

fn run_calibrate(args: CalibrateArgs) -> CliResult<()> {
    let cfg = merge_config(&args)?;
    if cfg.images.is_empty() {
        return Err("no calibration images given".into());
    }

    let detector = ChessCornerDetector::new(cfg.chessboard.clone().unwrap_or_default());
    let solver = ZhangSolver::new(cfg.solver.clone().unwrap_or_default());
    let mut calibrator =
        Calibrator::with_params(detector, solver, FsImageLoader, cfg.calibrator_params());
    calibrator.set_options(cfg.options);
    let mut session = CalibrationSession::new(calibrator);

    let mut accepted = Vec::new();
    let added = session.collect_from_images_with(&cfg.images, cfg.pattern(), |event| {
        match &event {
            CollectEvent::Accepted { path, .. } => {
                accepted.push(path.to_string_lossy().into_owned())
            }
            CollectEvent::NotFound { path } => info!("{}: no chessboard", path.display()),
            CollectEvent::WrongCount { path, got, expected } => {
                info!("{}: {got} of {expected} corners", path.display())
            }
            CollectEvent::LoadFailed { .. } => {}
        }
    });
    info!("{added} of {} images usable", cfg.images.len());

    let image_size = session
        .calibrator
        .observed_image_size()
        .ok_or("none of the images could be loaded")?;
    let rms = session.solve(image_size)?;

    let Some(result) = session.calibrator.result() else {
        return Err("solve reported success without a result".into());
    };
    let k = &result.model.camera_matrix;
    println!("rms reprojection error: {rms:.6} px");
    println!(
        "camera matrix:\n  [{:.4}, {:.4}, {:.4}]\n  [{:.4}, {:.4}, {:.4}]\n  [{:.4}, {:.4}, {:.4}]",
        k[(0, 0)],
        k[(0, 1)],
        k[(0, 2)],
        k[(1, 0)],
        k[(1, 1)],
        k[(1, 2)],
        k[(2, 0)],
        k[(2, 1)],
        k[(2, 2)]
    );
    println!("distortion: {:?}", result.model.distortion.coefficients());

    let report = CalibrationReport::new(
        result,
        cfg.options,
        cfg.pattern(),
        cfg.square_size,
        accepted,
    );
    let out_path = cfg.output_path();
    report.write_json(&out_path)?;
    info!("report written to {}", out_path.display());

    if let Some(job) = &cfg.undistort {
        let img = FsImageLoader.load_color(Path::new(&job.input))?;
        let undistorted = session.undistort(&img, None)?;
        undistorted.save(&job.output)?;
        info!("undistorted image written to {}", job.output);
    }
    Ok(())
}

fn run_undistort(args: UndistortArgs) -> CliResult<()> {
    let report = CalibrationReport::load_json(&args.report)?;
    let model = report.versioned_model();
    let output_size = args.width.zip(args.height).map(|(w, h)| ImageSize::new(w, h));

    let img = FsImageLoader.load_color(&args.input)?;
    let mut cache = UndistortionCache::default();
    let undistorted = cache.undistort(Some(&model), &img, output_size)?;
    undistorted.save(&args.output)?;
    info!("undistorted image written to {}", args.output.display());
    Ok(())
}
