use monocal_core::StoreError;

/// Errors of the calibration state machine.
#[derive(thiserror::Error, Debug)]
pub enum CalibrateError {
    #[error(transparent)]
    InvalidDetection(#[from] StoreError),

    #[error("invalid pattern shape {rows}x{cols}; both dimensions must be at least 2")]
    InvalidPattern { rows: u32, cols: u32 },

    #[error("need at least {needed} views to calibrate, got {got}")]
    NotEnoughViews { needed: usize, got: usize },

    #[error("calibration solve failed: {0}")]
    SolveFailure(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A solver reported success but its output cannot become a model.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SolverOutputError {
    #[error("reprojection error {0} is not a finite non-negative number")]
    InvalidRms(f64),

    #[error("camera matrix or distortion contains non-finite values")]
    NonFiniteModel,

    #[error("solver returned {got} poses for {expected} views")]
    PoseCountMismatch { expected: usize, got: usize },
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndistortError {
    #[error("no calibration available; solve before undistorting")]
    NoCalibration,
}
