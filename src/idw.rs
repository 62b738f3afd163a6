//! Inverse-distance weighting.
//!
//! A query point `x` is mapped to a row of weights over the reference points
//! `xt`: `w_t ∝ |x - xt_t|^-p`, normalized to sum to one. A query that coincides
//! with a reference point receives a one-hot row on the first such point.

use crate::bounds::{BoundsError, BoundsStore};
use crate::surrogate::{Surrogate, SurrogateError};
use crate::types::{IdwConfig, Jacobian};
use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdwError {
    #[error("IDW power must be positive and finite, but was {0}.")]
    InvalidPower(f64),

    #[error("At least one reference point is required for inverse-distance weighting.")]
    EmptyReferenceSet,

    #[error("Query points have {query} columns but reference points have {reference}.")]
    ColumnMismatch { query: usize, reference: usize },

    #[error("Non-finite coordinate in {which} at row {row}, column {col}.")]
    NonFiniteInput {
        which: &'static str,
        row: usize,
        col: usize,
    },

    #[error("Training inputs have {inputs} rows but training outputs have {outputs}.")]
    TrainingRowMismatch { inputs: usize, outputs: usize },

    #[error("No training values have been set.")]
    MissingTrainingData,

    #[error("Surrogate must be trained before prediction.")]
    NotTrained,

    #[error("Query point {row} lies outside the surrogate bounds.")]
    OutOfBounds { row: usize },

    #[error(transparent)]
    Bounds(#[from] BoundsError),
}

/// Computes the `n × nt` inverse-distance weight matrix from `x` (`n × nx`) to
/// `xt` (`nt × nx`).
///
/// Every row sums to one. Rows are filled in parallel.
pub fn compute_idw_jacobian(
    x: ArrayView2<'_, f64>,
    xt: ArrayView2<'_, f64>,
    power: f64,
) -> Result<Jacobian, IdwError> {
    if !(power.is_finite() && power > 0.0) {
        return Err(IdwError::InvalidPower(power));
    }
    if xt.nrows() == 0 {
        return Err(IdwError::EmptyReferenceSet);
    }
    if x.ncols() != xt.ncols() {
        return Err(IdwError::ColumnMismatch {
            query: x.ncols(),
            reference: xt.ncols(),
        });
    }
    check_finite(x, "query points")?;
    check_finite(xt, "reference points")?;

    let n = x.nrows();
    let nt = xt.nrows();
    log::debug!(
        "computing IDW jacobian: {} queries, {} references, {} dims, p={}",
        n,
        nt,
        x.ncols(),
        power
    );

    let mut jac = Array2::<f64>::zeros((n, nt));
    jac.axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, row)| fill_idw_row(x.row(i), xt, power, row));
    Ok(Jacobian::new(jac))
}

fn fill_idw_row(
    query: ArrayView1<'_, f64>,
    xt: ArrayView2<'_, f64>,
    power: f64,
    mut row: ArrayViewMut1<'_, f64>,
) {
    let (mut min_r2, mut min_loc) = squared_distances(query, xt, 1.0, row.view_mut());
    if min_r2.is_infinite() {
        // Every squared distance overflowed; redo them in units of the largest coordinate.
        let scale = query
            .iter()
            .chain(xt.iter())
            .fold(0.0_f64, |m, &v| m.max(v.abs()));
        (min_r2, min_loc) = squared_distances(query, xt, scale, row.view_mut());
    }

    if min_r2 == 0.0 {
        row.fill(0.0);
        row[min_loc] = 1.0;
        return;
    }

    // Scaling by the nearest distance keeps the largest weight at 1 and the sum finite.
    let exponent = -0.5 * power;
    row.mapv_inplace(|r2| (r2 / min_r2).powf(exponent));
    let sum = row.sum();
    row.mapv_inplace(|w| w / sum);
}

/// Writes `|query - xt_t|² / scale²` into `row`, returning the minimum and its first location.
fn squared_distances(
    query: ArrayView1<'_, f64>,
    xt: ArrayView2<'_, f64>,
    scale: f64,
    mut row: ArrayViewMut1<'_, f64>,
) -> (f64, usize) {
    let mut min_r2 = f64::INFINITY;
    let mut min_loc = 0usize;
    for (it, reference) in xt.axis_iter(Axis(0)).enumerate() {
        let mut r2 = 0.0;
        for (a, b) in query.iter().zip(reference.iter()) {
            let delta = a / scale - b / scale;
            r2 += delta * delta;
        }
        if r2 < min_r2 {
            min_r2 = r2;
            min_loc = it;
        }
        row[it] = r2;
    }
    (min_r2, min_loc)
}

fn check_finite(points: ArrayView2<'_, f64>, which: &'static str) -> Result<(), IdwError> {
    for ((row, col), v) in points.indexed_iter() {
        if !v.is_finite() {
            return Err(IdwError::NonFiniteInput { which, row, col });
        }
    }
    Ok(())
}

/// Interpolating surrogate whose predictions are IDW-weighted averages of the
/// training outputs.
#[derive(Debug, Clone, Default)]
pub struct IdwSurrogate {
    config: IdwConfig,
    bounds: BoundsStore,
    xt: Option<Array2<f64>>,
    yt: Option<Array2<f64>>,
    trained: bool,
}

impl IdwSurrogate {
    pub fn new(config: IdwConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Attaches domain bounds. An empty store means "unbounded".
    pub fn with_bounds(mut self, bounds: BoundsStore) -> Self {
        self.bounds = bounds;
        self.trained = false;
        self
    }

    pub fn config(&self) -> &IdwConfig {
        &self.config
    }

    pub fn bounds(&self) -> &BoundsStore {
        &self.bounds
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn training_points(&self) -> Option<ArrayView2<'_, f64>> {
        self.xt.as_ref().map(|xt| xt.view())
    }

    /// Weights relating each query row to each training point.
    pub fn predict_jacobian(&self, x: ArrayView2<'_, f64>) -> Result<Jacobian, IdwError> {
        if !self.trained {
            return Err(IdwError::NotTrained);
        }
        let xt = self.xt.as_ref().ok_or(IdwError::MissingTrainingData)?;
        if self.config.check_bounds && self.bounds.is_populated() {
            for (row, point) in x.axis_iter(Axis(0)).enumerate() {
                if !self.bounds.contains(point)? {
                    return Err(IdwError::OutOfBounds { row });
                }
            }
        }
        compute_idw_jacobian(x, xt.view(), self.config.power)
    }
}

impl Surrogate for IdwSurrogate {
    fn name(&self) -> &str {
        "IDW"
    }

    fn set_training_values(
        &mut self,
        xt: ArrayView2<'_, f64>,
        yt: ArrayView2<'_, f64>,
    ) -> Result<(), SurrogateError> {
        if xt.nrows() != yt.nrows() {
            return Err(IdwError::TrainingRowMismatch {
                inputs: xt.nrows(),
                outputs: yt.nrows(),
            }
            .into());
        }
        self.xt = Some(xt.to_owned());
        self.yt = Some(yt.to_owned());
        self.trained = false;
        Ok(())
    }

    fn update_training_values(&mut self, yt: ArrayView2<'_, f64>) -> Result<(), SurrogateError> {
        let xt = self.xt.as_ref().ok_or(IdwError::MissingTrainingData)?;
        if xt.nrows() != yt.nrows() {
            return Err(IdwError::TrainingRowMismatch {
                inputs: xt.nrows(),
                outputs: yt.nrows(),
            }
            .into());
        }
        self.yt = Some(yt.to_owned());
        self.trained = false;
        Ok(())
    }

    fn train(&mut self) -> Result<(), SurrogateError> {
        let power = self.config.power;
        if !(power.is_finite() && power > 0.0) {
            return Err(IdwError::InvalidPower(power).into());
        }
        let xt = self.xt.as_ref().ok_or(IdwError::MissingTrainingData)?;
        if xt.nrows() == 0 {
            return Err(IdwError::EmptyReferenceSet.into());
        }
        check_finite(xt.view(), "training points")?;
        if let Some(nx) = self.bounds.dimension_count() {
            if nx != xt.ncols() {
                return Err(BoundsError::DimensionMismatch(format!(
                    "bounds have {nx} dimensions but training points have {}",
                    xt.ncols()
                ))
                .into());
            }
        }
        log::debug!("IDW surrogate trained on {} points", xt.nrows());
        self.trained = true;
        Ok(())
    }

    fn predict_values(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, SurrogateError> {
        let jac = self.predict_jacobian(x)?;
        let yt = self.yt.as_ref().ok_or(IdwError::MissingTrainingData)?;
        Ok(jac.dot(yt))
    }
}
