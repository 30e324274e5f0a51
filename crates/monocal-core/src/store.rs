//! Per-view 3D/2D correspondence accumulation.

use crate::{ImagePoint, ObjectPoint};

/// Errors returned by [`CorrespondenceStore::append`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("invalid detection: {image_points} image points vs {object_points} object points")]
    InvalidDetection {
        image_points: usize,
        object_points: usize,
    },
}

/// One calibration image's contribution: image points paired index-for-index
/// with the target's object points.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewCorrespondence {
    image_points: Vec<ImagePoint>,
    object_points: Vec<ObjectPoint>,
}

impl ViewCorrespondence {
    pub fn new(
        image_points: Vec<ImagePoint>,
        object_points: Vec<ObjectPoint>,
    ) -> Result<Self, StoreError> {
        if image_points.len() != object_points.len() {
            return Err(StoreError::InvalidDetection {
                image_points: image_points.len(),
                object_points: object_points.len(),
            });
        }
        Ok(Self {
            image_points,
            object_points,
        })
    }

    #[inline]
    pub fn image_points(&self) -> &[ImagePoint] {
        &self.image_points
    }

    #[inline]
    pub fn object_points(&self) -> &[ObjectPoint] {
        &self.object_points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }
}

/// Append-only sequence of views, in the order they were accepted.
#[derive(Clone, Debug, Default)]
pub struct CorrespondenceStore {
    views: Vec<ViewCorrespondence>,
}

impl CorrespondenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one view. Fails without touching the store when the two
    /// sequences differ in length.
    pub fn append(
        &mut self,
        image_points: Vec<ImagePoint>,
        object_points: Vec<ObjectPoint>,
    ) -> Result<(), StoreError> {
        let view = ViewCorrespondence::new(image_points, object_points)?;
        self.views.push(view);
        Ok(())
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Every stored view, in append order.
    #[inline]
    pub fn views_snapshot(&self) -> &[ViewCorrespondence] {
        &self.views
    }

    /// Total number of correspondences over all views.
    pub fn total_points(&self) -> usize {
        self.views.iter().map(ViewCorrespondence::len).sum()
    }

    pub fn clear(&mut self) {
        self.views.clear();
    }
}
