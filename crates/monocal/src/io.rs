//! JSON run configuration and calibration reports.

use std::fs;
use std::path::{Path, PathBuf};

use monocal_chessboard::ChessboardParams;
use monocal_core::{CalibrationOptions, IntrinsicModel, PatternShape, VersionedModel, ViewPose};
use monocal_solver::ZhangSolverParams;
use serde::{Deserialize, Serialize};

use crate::calibrator::{CalibrationResult, CalibratorParams};

#[derive(thiserror::Error, Debug)]
pub enum CalibIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_square_size() -> f32 {
    1.0
}

fn default_min_views() -> usize {
    3
}

/// Undistort one image after calibrating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndistortJob {
    pub input: String,
    pub output: String,
}

/// Configuration of a calibration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrateConfig {
    #[serde(default)]
    pub images: Vec<String>,
    pub rows: u32,
    pub cols: u32,
    #[serde(default = "default_square_size")]
    pub square_size: f32,
    #[serde(default)]
    pub options: CalibrationOptions,
    #[serde(default = "default_min_views")]
    pub min_views: usize,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub undistort: Option<UndistortJob>,
    #[serde(default)]
    pub chessboard: Option<ChessboardParams>,
    #[serde(default)]
    pub solver: Option<ZhangSolverParams>,
}

impl CalibrateConfig {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            images: Vec::new(),
            rows,
            cols,
            square_size: default_square_size(),
            options: CalibrationOptions::default(),
            min_views: default_min_views(),
            output_path: None,
            undistort: None,
            chessboard: None,
            solver: None,
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn pattern(&self) -> PatternShape {
        PatternShape::new(self.rows, self.cols)
    }

    pub fn calibrator_params(&self) -> CalibratorParams {
        CalibratorParams {
            min_views: self.min_views,
            square_size: self.square_size,
        }
    }

    /// Resolve the report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("calibration_report.json"))
    }
}

/// Persisted outcome of a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub model: IntrinsicModel,
    pub options: CalibrationOptions,
    pub pattern: PatternShape,
    pub square_size: f32,
    pub rms_error: f64,
    #[serde(default)]
    pub per_view_rms: Option<Vec<f64>>,
    #[serde(default)]
    pub poses: Vec<ViewPose>,
    /// Images accepted as views, in store order.
    #[serde(default)]
    pub image_paths: Vec<String>,
}

impl CalibrationReport {
    pub fn new(
        result: &CalibrationResult,
        options: CalibrationOptions,
        pattern: PatternShape,
        square_size: f32,
        image_paths: Vec<String>,
    ) -> Self {
        Self {
            model: result.model.clone(),
            options,
            pattern,
            square_size,
            rms_error: result.rms_error,
            per_view_rms: result.per_view_rms.clone(),
            poses: result.poses.clone(),
            image_paths,
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// The stored model as version 1, for a fresh [`crate::UndistortionCache`].
    pub fn versioned_model(&self) -> VersionedModel {
        VersionedModel {
            version: 1,
            model: self.model.clone(),
        }
    }
}
