use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip, s};
use std::fmt;
use thiserror::Error;

/// Coarse classification of bounds failures, independent of the detailed variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    AlreadyInitialized,
    NotInitialized,
}

/// Which of the two bound vectors a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Lower,
    Upper,
}

impl fmt::Display for BoundSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundSide::Lower => f.write_str("lower"),
            BoundSide::Upper => f.write_str("upper"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Dimension count must be positive, but was 0.")]
    InvalidDimension,

    #[error(
        "The {side} bounds hold {provided} values but {required} dimensions were requested."
    )]
    InsufficientValues {
        side: BoundSide,
        required: usize,
        provided: usize,
    },

    #[error("The {side} bound of dimension {dim} is not finite ({value}).")]
    NonFiniteBound {
        side: BoundSide,
        dim: usize,
        value: f64,
    },

    #[error(
        "Bounds are inverted in dimension {dim}: lower ({lower}) must be less than or equal to upper ({upper})."
    )]
    InvertedBounds { dim: usize, lower: f64, upper: f64 },

    #[error("Bounds store is already populated with {0} dimensions; setup may only run once.")]
    AlreadyInitialized(usize),

    #[error("Bounds store is empty; setup has not been called.")]
    NotInitialized,

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}

impl BoundsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BoundsError::AlreadyInitialized(_) => ErrorKind::AlreadyInitialized,
            BoundsError::NotInitialized => ErrorKind::NotInitialized,
            BoundsError::InvalidDimension
            | BoundsError::InsufficientValues { .. }
            | BoundsError::NonFiniteBound { .. }
            | BoundsError::InvertedBounds { .. }
            | BoundsError::DimensionMismatch(_) => ErrorKind::InvalidArgument,
        }
    }
}

/// Lifecycle of a [`BoundsStore`]. There is no transition back to `Empty`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BoundsState {
    #[default]
    Empty,
    Populated {
        lower: Array1<f64>,
        upper: Array1<f64>,
    },
}

/// Owned per-dimension domain limits of a surrogate model.
///
/// The store starts empty and is populated exactly once by [`BoundsStore::setup`],
/// which copies the caller's values into storage owned by the store. Storage is
/// released when the store is dropped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundsStore {
    state: BoundsState,
}

impl BoundsStore {
    pub fn new() -> Self {
        Self {
            state: BoundsState::Empty,
        }
    }

    /// Builds a populated store from an `nx × 2` array of `[lower, upper]` rows.
    pub fn from_limits(xlimits: ArrayView2<'_, f64>) -> Result<Self, BoundsError> {
        if xlimits.ncols() != 2 {
            return Err(BoundsError::DimensionMismatch(format!(
                "limits must have 2 columns (lower, upper), got {}",
                xlimits.ncols()
            )));
        }
        let mut store = Self::new();
        store.setup(xlimits.nrows(), xlimits.column(0), xlimits.column(1))?;
        Ok(store)
    }

    /// Builds a populated store from two equally long bound vectors.
    pub fn from_bounds(
        lower: ArrayView1<'_, f64>,
        upper: ArrayView1<'_, f64>,
    ) -> Result<Self, BoundsError> {
        if lower.len() != upper.len() {
            return Err(BoundsError::DimensionMismatch(format!(
                "lower bounds have {} values, upper bounds have {}",
                lower.len(),
                upper.len()
            )));
        }
        let mut store = Self::new();
        store.setup(lower.len(), lower, upper)?;
        Ok(store)
    }

    /// Copies the first `dimension_count` values of `lower` and `upper` into the store.
    ///
    /// Fails without touching the store if it is already populated, if
    /// `dimension_count` is zero, if either view is shorter than
    /// `dimension_count`, or if any pair is non-finite or inverted.
    /// Zero-width dimensions (`lower == upper`) are accepted.
    pub fn setup(
        &mut self,
        dimension_count: usize,
        lower: ArrayView1<'_, f64>,
        upper: ArrayView1<'_, f64>,
    ) -> Result<(), BoundsError> {
        if let BoundsState::Populated { lower, .. } = &self.state {
            return Err(BoundsError::AlreadyInitialized(lower.len()));
        }
        if dimension_count == 0 {
            return Err(BoundsError::InvalidDimension);
        }
        for (side, provided) in [
            (BoundSide::Lower, lower.len()),
            (BoundSide::Upper, upper.len()),
        ] {
            if provided < dimension_count {
                return Err(BoundsError::InsufficientValues {
                    side,
                    required: dimension_count,
                    provided,
                });
            }
        }

        let lower = lower.slice(s![..dimension_count]).to_owned();
        let upper = upper.slice(s![..dimension_count]).to_owned();
        validate_pairs(lower.view(), upper.view())?;

        let degenerate = Zip::from(&lower)
            .and(&upper)
            .fold(0usize, |acc, &lo, &hi| acc + usize::from(lo == hi));
        if degenerate > 0 {
            log::warn!(
                "{} of {} dimensions have zero-width bounds",
                degenerate,
                dimension_count
            );
        }
        log::debug!("bounds store populated with {} dimensions", dimension_count);

        self.state = BoundsState::Populated { lower, upper };
        Ok(())
    }

    pub fn state(&self) -> &BoundsState {
        &self.state
    }

    pub fn is_populated(&self) -> bool {
        matches!(self.state, BoundsState::Populated { .. })
    }

    pub fn dimension_count(&self) -> Option<usize> {
        match &self.state {
            BoundsState::Empty => None,
            BoundsState::Populated { lower, .. } => Some(lower.len()),
        }
    }

    pub fn lower(&self) -> Option<ArrayView1<'_, f64>> {
        match &self.state {
            BoundsState::Empty => None,
            BoundsState::Populated { lower, .. } => Some(lower.view()),
        }
    }

    pub fn upper(&self) -> Option<ArrayView1<'_, f64>> {
        match &self.state {
            BoundsState::Empty => None,
            BoundsState::Populated { upper, .. } => Some(upper.view()),
        }
    }

    /// Per-dimension width `upper - lower`.
    pub fn widths(&self) -> Option<Array1<f64>> {
        match &self.state {
            BoundsState::Empty => None,
            BoundsState::Populated { lower, upper } => Some(upper - lower),
        }
    }

    /// Inclusive membership test for a single point.
    pub fn contains(&self, point: ArrayView1<'_, f64>) -> Result<bool, BoundsError> {
        let (lower, upper) = self.populated()?;
        check_point_dimension(point.len(), lower.len())?;
        Ok(Zip::from(&point)
            .and(&lower)
            .and(&upper)
            .all(|&x, &lo, &hi| x >= lo && x <= hi))
    }

    /// Projects a point onto the bounding box.
    pub fn clamp(&self, point: ArrayView1<'_, f64>) -> Result<Array1<f64>, BoundsError> {
        let (lower, upper) = self.populated()?;
        check_point_dimension(point.len(), lower.len())?;
        Ok(Zip::from(&point)
            .and(&lower)
            .and(&upper)
            .map_collect(|&x, &lo, &hi| x.clamp(lo, hi)))
    }

    /// Maps an `n × nx` matrix of points affinely onto `[0, 1]^nx`.
    ///
    /// Zero-width dimensions map to 0.
    pub fn normalize(&self, points: ArrayView2<'_, f64>) -> Result<Array2<f64>, BoundsError> {
        let (lower, upper) = self.populated()?;
        check_point_dimension(points.ncols(), lower.len())?;
        let mut out = points.to_owned();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let width = upper[j] - lower[j];
            if width > 0.0 {
                col.mapv_inplace(|x| (x - lower[j]) / width);
            } else {
                col.fill(0.0);
            }
        }
        Ok(out)
    }

    /// Inverse of [`BoundsStore::normalize`]. Zero-width dimensions map back to the bound.
    pub fn denormalize(&self, points: ArrayView2<'_, f64>) -> Result<Array2<f64>, BoundsError> {
        let (lower, upper) = self.populated()?;
        check_point_dimension(points.ncols(), lower.len())?;
        let mut out = points.to_owned();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let width = upper[j] - lower[j];
            col.mapv_inplace(|u| lower[j] + u * width);
        }
        Ok(out)
    }

    /// Consumes the store, handing back the owned `(lower, upper)` arrays if populated.
    pub fn into_parts(self) -> Option<(Array1<f64>, Array1<f64>)> {
        match self.state {
            BoundsState::Empty => None,
            BoundsState::Populated { lower, upper } => Some((lower, upper)),
        }
    }

    fn populated(&self) -> Result<(ArrayView1<'_, f64>, ArrayView1<'_, f64>), BoundsError> {
        match &self.state {
            BoundsState::Empty => Err(BoundsError::NotInitialized),
            BoundsState::Populated { lower, upper } => Ok((lower.view(), upper.view())),
        }
    }
}

fn validate_pairs(
    lower: ArrayView1<'_, f64>,
    upper: ArrayView1<'_, f64>,
) -> Result<(), BoundsError> {
    for (dim, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
        if !lo.is_finite() {
            return Err(BoundsError::NonFiniteBound {
                side: BoundSide::Lower,
                dim,
                value: lo,
            });
        }
        if !hi.is_finite() {
            return Err(BoundsError::NonFiniteBound {
                side: BoundSide::Upper,
                dim,
                value: hi,
            });
        }
        if lo > hi {
            return Err(BoundsError::InvertedBounds {
                dim,
                lower: lo,
                upper: hi,
            });
        }
    }
    Ok(())
}

fn check_point_dimension(found: usize, expected: usize) -> Result<(), BoundsError> {
    if found != expected {
        return Err(BoundsError::DimensionMismatch(format!(
            "expected {expected} coordinates per point, got {found}"
        )));
    }
    Ok(())
}
