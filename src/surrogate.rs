use crate::bounds::BoundsError;
use crate::idw::IdwError;
use crate::mixed_integer::MixedIntegerError;
use ndarray::{Array2, ArrayView2};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurrogateError {
    #[error(transparent)]
    Idw(#[from] IdwError),

    #[error(transparent)]
    Bounds(#[from] BoundsError),

    #[error(transparent)]
    MixedInteger(#[from] MixedIntegerError),
}

/// Minimal train/predict seam shared by the surrogates in this crate.
///
/// Training inputs are `nt × nx`, training outputs `nt × ny`; predictions are
/// `n × ny` for `n × nx` query points.
pub trait Surrogate {
    fn name(&self) -> &str;

    fn set_training_values(
        &mut self,
        xt: ArrayView2<'_, f64>,
        yt: ArrayView2<'_, f64>,
    ) -> Result<(), SurrogateError>;

    /// Replaces the training outputs while keeping the training inputs.
    fn update_training_values(&mut self, yt: ArrayView2<'_, f64>) -> Result<(), SurrogateError>;

    fn train(&mut self) -> Result<(), SurrogateError>;

    fn predict_values(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, SurrogateError>;
}
