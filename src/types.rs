use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

pub fn default_idw_power() -> f64 {
    2.0
}

pub fn default_check_bounds() -> bool {
    false
}

/// Inverse-distance-weighting surrogate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdwConfig {
    /// Exponent applied to distances; weights are `r^-power`.
    #[serde(default = "default_idw_power")]
    pub power: f64,
    /// Reject prediction points that fall outside the surrogate's bounds.
    #[serde(default = "default_check_bounds")]
    pub check_bounds: bool,
}

impl Default for IdwConfig {
    fn default() -> Self {
        Self {
            power: default_idw_power(),
            check_bounds: default_check_bounds(),
        }
    }
}

impl IdwConfig {
    pub fn with_power(power: f64) -> Self {
        Self {
            power,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Row-stochastic `n × nt` matrix of interpolation weights from query points
/// to reference points.
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq)]
pub struct Jacobian(pub Array2<f64>);

impl Jacobian {
    pub fn new(values: Array2<f64>) -> Self {
        Self(values)
    }

    pub fn zeros(n: usize, nt: usize) -> Self {
        Self(Array2::zeros((n, nt)))
    }

    pub fn num_queries(&self) -> usize {
        self.0.nrows()
    }

    pub fn num_references(&self) -> usize {
        self.0.ncols()
    }

    pub fn row_sums(&self) -> Array1<f64> {
        self.0.rows().into_iter().map(|row| row.sum()).collect()
    }

    pub fn weights_for(&self, query: usize) -> ArrayView1<'_, f64> {
        self.0.row(query)
    }
}

impl Deref for Jacobian {
    type Target = Array2<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Jacobian {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl AsRef<Array2<f64>> for Jacobian {
    fn as_ref(&self) -> &Array2<f64> {
        &self.0
    }
}

impl From<Array2<f64>> for Jacobian {
    fn from(values: Array2<f64>) -> Self {
        Self(values)
    }
}

impl From<Jacobian> for Array2<f64> {
    fn from(values: Jacobian) -> Self {
        values.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn config_fills_missing_fields_with_defaults() {
        let cfg = IdwConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, IdwConfig::default());

        let cfg = IdwConfig::from_json_str(r#"{"power": 3.5}"#).unwrap();
        assert_eq!(cfg.power, 3.5);
        assert!(!cfg.check_bounds);
    }

    #[test]
    fn config_survives_json_serialization() {
        let cfg = IdwConfig {
            power: 1.0,
            check_bounds: true,
        };
        let json = cfg.to_json_string().unwrap();
        assert_eq!(IdwConfig::from_json_str(&json).unwrap(), cfg);
    }

    #[test]
    fn jacobian_reports_shape_and_row_sums() {
        let jac = Jacobian::new(array![[0.25, 0.75, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(jac.num_queries(), 2);
        assert_eq!(jac.num_references(), 3);
        assert_eq!(jac.row_sums(), array![1.0, 1.0]);
        assert_eq!(jac.weights_for(1), array![0.0, 0.0, 1.0].view());
    }
}
