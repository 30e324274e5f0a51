//! Correspondence collection and the solve step.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info, warn};
use monocal_core::{
    object_grid, CalibrationOptions, CorrespondenceStore, Detector, GrayImage, ImageLoadError,
    ImageLoader, ImagePoint, ImageSize, IntrinsicModel, ObjectPoint, PatternShape, Solver,
    SolverOutput, VersionedModel, ViewPose,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::{CalibrateError, SolverOutputError};

/// Calibrator settings that are not part of the camera model.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CalibratorParams {
    /// Fewest stored views accepted by [`Calibrator::solve`]; values below 1
    /// act as 1.
    pub min_views: usize,
    /// Edge length of one target square, in object units.
    pub square_size: f32,
}

impl Default for CalibratorParams {
    fn default() -> Self {
        Self {
            min_views: 3,
            square_size: 1.0,
        }
    }
}

/// Everything a successful solve produced.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CalibrationResult {
    pub model: IntrinsicModel,
    /// One pose per stored view, in store order.
    pub poses: Vec<ViewPose>,
    pub rms_error: f64,
    #[serde(default)]
    pub per_view_rms: Option<Vec<f64>>,
}

/// Outcome of one image during collection.
#[derive(Debug)]
pub enum CollectEvent<'a> {
    Accepted {
        path: &'a Path,
        view_index: usize,
        image: &'a GrayImage,
        points: &'a [ImagePoint],
    },
    NotFound {
        path: &'a Path,
    },
    WrongCount {
        path: &'a Path,
        expected: usize,
        got: usize,
    },
    LoadFailed {
        path: &'a Path,
        error: &'a ImageLoadError,
    },
}

impl CollectEvent<'_> {
    pub fn path(&self) -> &Path {
        match self {
            CollectEvent::Accepted { path, .. }
            | CollectEvent::NotFound { path }
            | CollectEvent::WrongCount { path, .. }
            | CollectEvent::LoadFailed { path, .. } => path,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, CollectEvent::Accepted { .. })
    }
}

/// Owns the correspondence store and the current camera model.
///
/// `D` finds pattern corners, `S` solves the camera model and `L` reads
/// images from disk.
pub struct Calibrator<D, S, L> {
    detector: D,
    solver: S,
    loader: L,
    params: CalibratorParams,
    options: CalibrationOptions,
    store: CorrespondenceStore,
    grids: HashMap<PatternShape, Vec<ObjectPoint>>,
    image_size: Option<ImageSize>,
    model: Option<VersionedModel>,
    model_version: u64,
    result: Option<CalibrationResult>,
}

impl<D, S, L> Calibrator<D, S, L> {
    pub fn new(detector: D, solver: S, loader: L) -> Self {
        Self::with_params(detector, solver, loader, CalibratorParams::default())
    }

    pub fn with_params(detector: D, solver: S, loader: L, params: CalibratorParams) -> Self {
        Self {
            detector,
            solver,
            loader,
            params,
            options: CalibrationOptions::default(),
            store: CorrespondenceStore::new(),
            grids: HashMap::new(),
            image_size: None,
            model: None,
            model_version: 0,
            result: None,
        }
    }

    pub fn params(&self) -> &CalibratorParams {
        &self.params
    }

    /// Replace the parameters; cached object grids are rebuilt on demand.
    pub fn set_params(&mut self, params: CalibratorParams) {
        if params.square_size != self.params.square_size {
            self.grids.clear();
        }
        self.params = params;
    }

    pub fn options(&self) -> CalibrationOptions {
        self.options
    }

    /// Takes effect at the next [`Calibrator::solve`].
    pub fn set_options(&mut self, options: CalibrationOptions) {
        self.options = options;
    }

    pub fn store(&self) -> &CorrespondenceStore {
        &self.store
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Size of the first image loaded during collection.
    pub fn observed_image_size(&self) -> Option<ImageSize> {
        self.image_size
    }

    pub fn current_model(&self) -> Option<&IntrinsicModel> {
        self.model.as_ref().map(|m| &m.model)
    }

    pub fn versioned_model(&self) -> Option<&VersionedModel> {
        self.model.as_ref()
    }

    /// Version of the current model; `0` before the first successful solve.
    pub fn model_version(&self) -> u64 {
        self.model.as_ref().map_or(0, |m| m.version)
    }

    pub fn result(&self) -> Option<&CalibrationResult> {
        self.result.as_ref()
    }

    /// Drop all stored views. The current model stays valid.
    pub fn reset(&mut self) {
        self.store.clear();
        self.image_size = None;
    }

    fn object_points(&mut self, shape: PatternShape) -> Vec<ObjectPoint> {
        let square_size = self.params.square_size;
        self.grids
            .entry(shape)
            .or_insert_with(|| object_grid(shape, square_size))
            .clone()
    }

    /// Append one externally detected view; returns its index in the store.
    pub fn add_view(
        &mut self,
        image_points: Vec<ImagePoint>,
        shape: PatternShape,
    ) -> Result<usize, CalibrateError> {
        if !shape.is_valid() {
            return Err(CalibrateError::InvalidPattern {
                rows: shape.rows,
                cols: shape.cols,
            });
        }
        let object_points = self.object_points(shape);
        self.store.append(image_points, object_points)?;
        Ok(self.store.count() - 1)
    }
}

impl<D: Detector, S, L: ImageLoader> Calibrator<D, S, L> {
    /// Load, detect and store every image in order; returns the number of
    /// views added.
    pub fn collect_from_images<P, I>(&mut self, paths: I, shape: PatternShape) -> usize
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = P>,
    {
        self.collect_from_images_with(paths, shape, |_| {})
    }

    /// [`Calibrator::collect_from_images`] reporting each image's outcome to
    /// `observer`.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(rows = shape.rows, cols = shape.cols))
    )]
    pub fn collect_from_images_with<P, I, F>(
        &mut self,
        paths: I,
        shape: PatternShape,
        mut observer: F,
    ) -> usize
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = P>,
        F: FnMut(CollectEvent<'_>),
    {
        if !shape.is_valid() {
            warn!(
                "pattern {}x{} is not a valid inner-corner grid",
                shape.rows, shape.cols
            );
            return 0;
        }

        let expected = shape.point_count();
        let mut added = 0;
        let mut seen = 0;

        for path in paths {
            let path = path.as_ref();
            seen += 1;

            let image = match self.loader.load_gray(path) {
                Ok(image) => image,
                Err(error) => {
                    warn!("{error}");
                    observer(CollectEvent::LoadFailed {
                        path,
                        error: &error,
                    });
                    continue;
                }
            };

            let size = ImageSize::new(image.width as u32, image.height as u32);
            if let Some(first) = self.image_size {
                if first != size {
                    warn!(
                        "{} is {}x{}, earlier images were {}x{}",
                        path.display(),
                        size.width,
                        size.height,
                        first.width,
                        first.height
                    );
                }
            } else {
                self.image_size = Some(size);
            }

            let Some(points) = self.detector.detect(&image.view(), shape) else {
                debug!("{}: pattern not found", path.display());
                observer(CollectEvent::NotFound { path });
                continue;
            };
            if points.len() != expected {
                debug!(
                    "{}: found {} corners, expected {}",
                    path.display(),
                    points.len(),
                    expected
                );
                observer(CollectEvent::WrongCount {
                    path,
                    expected,
                    got: points.len(),
                });
                continue;
            }

            let object_points = self.object_points(shape);
            if let Err(err) = self.store.append(points, object_points) {
                debug!("{}: {err}", path.display());
                continue;
            }
            added += 1;

            let view_index = self.store.count() - 1;
            debug!("{}: accepted as view {view_index}", path.display());
            observer(CollectEvent::Accepted {
                path,
                view_index,
                image: &image,
                points: self.store.views_snapshot()[view_index].image_points(),
            });
        }

        info!(
            "accepted {added} of {seen} images, {} views stored",
            self.store.count()
        );
        added
    }
}

impl<D, S: Solver, L> Calibrator<D, S, L> {
    /// Solve for the camera model over all stored views.
    ///
    /// On success the model is replaced, its version bumped and the RMS
    /// reprojection error returned. On failure nothing changes.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self),
            fields(views = self.store.count(), width = image_size.width, height = image_size.height)
        )
    )]
    pub fn solve(&mut self, image_size: ImageSize) -> Result<f64, CalibrateError> {
        let needed = self.params.min_views.max(1);
        let got = self.store.count();
        if got < needed {
            return Err(CalibrateError::NotEnoughViews { needed, got });
        }

        let flags = self.options.solver_flags();
        let out = self
            .solver
            .solve(self.store.views_snapshot(), image_size, flags)
            .map_err(|e| CalibrateError::SolveFailure(Box::new(e)))?;
        validate_output(&out, got).map_err(|e| CalibrateError::SolveFailure(Box::new(e)))?;

        let SolverOutput {
            camera_matrix,
            distortion,
            rotations,
            translations,
            rms_error,
            per_view_rms,
        } = out;

        let model = IntrinsicModel::new(camera_matrix, distortion, image_size);
        let poses = rotations
            .into_iter()
            .zip(translations)
            .map(|(rotation, translation)| ViewPose {
                rotation,
                translation,
            })
            .collect();

        self.model_version += 1;
        self.model = Some(VersionedModel {
            version: self.model_version,
            model: model.clone(),
        });
        self.result = Some(CalibrationResult {
            model,
            poses,
            rms_error,
            per_view_rms,
        });

        info!(
            "calibrated {got} views: rms {rms_error:.4}px, model version {}",
            self.model_version
        );
        Ok(rms_error)
    }
}

fn validate_output(out: &SolverOutput, views: usize) -> Result<(), SolverOutputError> {
    if !(out.rms_error.is_finite() && out.rms_error >= 0.0) {
        return Err(SolverOutputError::InvalidRms(out.rms_error));
    }
    if !out.camera_matrix.iter().all(|v| v.is_finite()) || !out.distortion.is_finite() {
        return Err(SolverOutputError::NonFiniteModel);
    }
    if out.rotations.len() != views || out.translations.len() != views {
        return Err(SolverOutputError::PoseCountMismatch {
            expected: views,
            got: out.rotations.len().min(out.translations.len()),
        });
    }
    Ok(())
}
