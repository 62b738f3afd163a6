use crate::bounds::{BoundsError, BoundsStore};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    #[error(transparent)]
    Bounds(#[from] BoundsError),
}

/// Design-of-experiments generator over a bounded input space.
pub trait SamplingMethod {
    fn bounds(&self) -> &BoundsStore;

    /// Draws `n` points as an `n × nx` matrix.
    fn sample(&mut self, n: usize) -> Result<Array2<f64>, SamplingError>;
}

/// Independent uniform draws inside the bounds, reproducible from a seed.
#[derive(Debug)]
pub struct RandomSampling {
    bounds: BoundsStore,
    rng: StdRng,
}

impl RandomSampling {
    pub fn new(bounds: BoundsStore, seed: u64) -> Result<Self, SamplingError> {
        if !bounds.is_populated() {
            return Err(BoundsError::NotInitialized.into());
        }
        Ok(Self {
            bounds,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl SamplingMethod for RandomSampling {
    fn bounds(&self) -> &BoundsStore {
        &self.bounds
    }

    fn sample(&mut self, n: usize) -> Result<Array2<f64>, SamplingError> {
        let nx = self
            .bounds
            .dimension_count()
            .ok_or(BoundsError::NotInitialized)?;
        let mut unit = Array2::<f64>::zeros((n, nx));
        for v in unit.iter_mut() {
            *v = self.rng.random_range(0.0..1.0);
        }
        let mut doe = self.bounds.denormalize(unit.view())?;
        // `lower + u * width` may round past `upper`.
        for mut row in doe.axis_iter_mut(Axis(0)) {
            let clamped = self.bounds.clamp(row.view())?;
            row.assign(&clamped);
        }
        Ok(doe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn samples_stay_inside_bounds() {
        let bounds =
            BoundsStore::from_bounds(array![-1.0, 10.0, 4.0].view(), array![1.0, 20.0, 4.0].view())
                .unwrap();
        let mut sampler = RandomSampling::new(bounds.clone(), 7).unwrap();
        let doe = sampler.sample(200).unwrap();
        assert_eq!(doe.dim(), (200, 3));
        for row in doe.rows() {
            assert!(bounds.contains(row).unwrap());
        }
        assert!(doe.column(2).iter().all(|&v| v == 4.0));
    }

    #[test]
    fn samples_stay_inside_bounds_with_inexact_widths() {
        let lower = array![0.1, -0.3, 1e-3, 123_456.789];
        let upper = array![0.3, 0.7, 0.1 + 0.2, 123_456.789 + 1e-9];
        let bounds = BoundsStore::from_bounds(lower.view(), upper.view()).unwrap();
        for seed in 0..8 {
            let mut sampler = RandomSampling::new(bounds.clone(), seed).unwrap();
            let doe = sampler.sample(500).unwrap();
            for row in doe.rows() {
                assert!(bounds.contains(row).unwrap());
            }
        }
    }

    #[test]
    fn same_seed_gives_same_design() {
        let bounds = BoundsStore::from_bounds(array![0.0].view(), array![1.0].view()).unwrap();
        let a = RandomSampling::new(bounds.clone(), 42)
            .unwrap()
            .sample(10)
            .unwrap();
        let b = RandomSampling::new(bounds, 42).unwrap().sample(10).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn successive_calls_continue_the_seeded_stream() {
        let bounds = BoundsStore::from_bounds(array![0.0, -5.0].view(), array![1.0, 5.0].view())
            .unwrap();
        let mut sampler = RandomSampling::new(bounds.clone(), 9).unwrap();
        let first = sampler.sample(4).unwrap();
        let second = sampler.sample(4).unwrap();
        assert_ne!(first, second);

        let whole = RandomSampling::new(bounds, 9).unwrap().sample(8).unwrap();
        assert_eq!(whole.slice(ndarray::s![..4, ..]), first);
        assert_eq!(whole.slice(ndarray::s![4.., ..]), second);
    }

    #[test]
    fn empty_bounds_are_rejected() {
        let err = RandomSampling::new(BoundsStore::new(), 0).unwrap_err();
        assert_eq!(err, SamplingError::Bounds(BoundsError::NotInitialized));
    }
}
