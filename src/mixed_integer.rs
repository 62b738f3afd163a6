//! Mixed float / integer / categorical inputs.
//!
//! Two coordinate spaces are used. In the *folded* space every variable is one
//! column and a categorical variable holds the index of its level. In the
//! *unfolded* space each categorical variable with `k` levels becomes `k`
//! columns in `[0, 1]` (a one-hot mask once discretized) and integer variables
//! are relaxed to reals. Surrogates and samplers work in the unfolded space.

use crate::bounds::{BoundsError, BoundsStore};
use crate::sampling::{SamplingError, SamplingMethod};
use crate::surrogate::{Surrogate, SurrogateError};
use ndarray::{Array1, Array2, ArrayView2, Axis, s};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Type of a single input variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum XType {
    Float,
    Int,
    /// Categorical variable with the given number of levels.
    Enum(usize),
}

impl XType {
    /// Number of columns the variable occupies in the unfolded space.
    pub fn unfolded_width(&self) -> usize {
        match self {
            XType::Float | XType::Int => 1,
            XType::Enum(levels) => *levels,
        }
    }
}

/// Limits of a single input variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum XLimit {
    Range(f64, f64),
    Levels(Vec<String>),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixedIntegerError {
    #[error("Number of x limits ({limits}) does not match number of specified types ({types}).")]
    LimitsCountMismatch { limits: usize, types: usize },

    #[error("Bad x limits for variable type {xtype:?} (index={index}): expected a (lower, upper) range.")]
    ExpectedRange { index: usize, xtype: XType },

    #[error("Bad x limits for categorical variable (index={index}): expected a list of levels.")]
    ExpectedLevels { index: usize },

    #[error(
        "Categorical variable (index={index}) declares {declared} levels while its limits list {found}."
    )]
    LevelCountMismatch {
        index: usize,
        declared: usize,
        found: usize,
    },

    #[error("Categorical variable (index={index}) must have at least one level.")]
    EmptyEnum { index: usize },

    #[error("Input has {found} columns but {expected} were expected.")]
    ColumnMismatch { expected: usize, found: usize },

    #[error(
        "Level index {value} at row {row}, column {col} is outside the {levels} available levels."
    )]
    EnumIndexOutOfRange {
        row: usize,
        col: usize,
        value: f64,
        levels: usize,
    },

    #[error("Variable {col} is not categorical.")]
    NotAnEnum { col: usize },

    #[error(transparent)]
    Bounds(#[from] BoundsError),

    #[error(transparent)]
    Sampling(#[from] SamplingError),
}

/// Checks that types and limits describe the same variables consistently.
pub fn check_xspec_consistency(
    xtypes: &[XType],
    xlimits: &[XLimit],
) -> Result<(), MixedIntegerError> {
    if xtypes.len() != xlimits.len() {
        return Err(MixedIntegerError::LimitsCountMismatch {
            limits: xlimits.len(),
            types: xtypes.len(),
        });
    }
    for (index, (xtype, xlimit)) in xtypes.iter().zip(xlimits).enumerate() {
        match (xtype, xlimit) {
            (XType::Float | XType::Int, XLimit::Range(..)) => {}
            (XType::Float | XType::Int, XLimit::Levels(_)) => {
                return Err(MixedIntegerError::ExpectedRange {
                    index,
                    xtype: *xtype,
                });
            }
            (XType::Enum(0), _) => return Err(MixedIntegerError::EmptyEnum { index }),
            (XType::Enum(_), XLimit::Range(..)) => {
                return Err(MixedIntegerError::ExpectedLevels { index });
            }
            (XType::Enum(declared), XLimit::Levels(levels)) => {
                if levels.len() != *declared {
                    return Err(MixedIntegerError::LevelCountMismatch {
                        index,
                        declared: *declared,
                        found: levels.len(),
                    });
                }
            }
        }
    }
    Ok(())
}

pub fn compute_x_unfold_dimension(xtypes: &[XType]) -> usize {
    xtypes.iter().map(XType::unfolded_width).sum()
}

/// Bounds of the unfolded continuous space: ranges are kept, each categorical
/// level contributes a `[0, 1]` dimension.
pub fn unfold_with_continuous_limits(
    xtypes: &[XType],
    xlimits: &[XLimit],
) -> Result<BoundsStore, MixedIntegerError> {
    check_xspec_consistency(xtypes, xlimits)?;
    let dim = compute_x_unfold_dimension(xtypes);
    let mut lower = Vec::with_capacity(dim);
    let mut upper = Vec::with_capacity(dim);
    for xlimit in xlimits {
        match xlimit {
            XLimit::Range(lo, hi) => {
                lower.push(*lo);
                upper.push(*hi);
            }
            XLimit::Levels(levels) => {
                lower.extend(std::iter::repeat_n(0.0, levels.len()));
                upper.extend(std::iter::repeat_n(1.0, levels.len()));
            }
        }
    }
    let lower = Array1::from(lower);
    let upper = Array1::from(upper);
    Ok(BoundsStore::from_bounds(lower.view(), upper.view())?)
}

/// Projects relaxed unfolded values onto admissible ones.
///
/// Integer columns are rounded half-to-even. Within each categorical block the
/// maximal entries become 1 and the rest 0, so ties keep several ones.
pub fn cast_to_discrete_values(
    xtypes: &[XType],
    x: ArrayView2<'_, f64>,
) -> Result<Array2<f64>, MixedIntegerError> {
    check_columns(x.ncols(), compute_x_unfold_dimension(xtypes))?;
    let mut out = x.to_owned();
    let mut col = 0usize;
    for xtype in xtypes {
        match xtype {
            XType::Float => {}
            XType::Int => out.column_mut(col).mapv_inplace(f64::round_ties_even),
            XType::Enum(levels) => {
                let mut block = out.slice_mut(s![.., col..col + levels]);
                for mut row in block.axis_iter_mut(Axis(0)) {
                    let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
                    row.mapv_inplace(|v| if v < max { 0.0 } else { 1.0 });
                }
            }
        }
        col += xtype.unfolded_width();
    }
    Ok(out)
}

/// Collapses unfolded categorical blocks to the index of their first maximum.
pub fn fold_with_enum_index(
    xtypes: &[XType],
    x: ArrayView2<'_, f64>,
) -> Result<Array2<f64>, MixedIntegerError> {
    check_columns(x.ncols(), compute_x_unfold_dimension(xtypes))?;
    let mut out = Array2::<f64>::zeros((x.nrows(), xtypes.len()));
    let mut unfold_index = 0usize;
    for (i, xtype) in xtypes.iter().enumerate() {
        match xtype {
            XType::Float | XType::Int => {
                out.column_mut(i).assign(&x.column(unfold_index));
            }
            XType::Enum(levels) => {
                let block = x.slice(s![.., unfold_index..unfold_index + levels]);
                for (r, row) in block.axis_iter(Axis(0)).enumerate() {
                    out[[r, i]] = argmax(row.iter().copied()) as f64;
                }
            }
        }
        unfold_index += xtype.unfolded_width();
    }
    Ok(out)
}

/// Expands folded categorical level indices into one-hot blocks.
pub fn unfold_with_enum_mask(
    xtypes: &[XType],
    x: ArrayView2<'_, f64>,
) -> Result<Array2<f64>, MixedIntegerError> {
    check_columns(x.ncols(), xtypes.len())?;
    let mut out = Array2::<f64>::zeros((x.nrows(), compute_x_unfold_dimension(xtypes)));
    let mut unfold_index = 0usize;
    for (i, xtype) in xtypes.iter().enumerate() {
        match xtype {
            XType::Float | XType::Int => {
                out.column_mut(unfold_index).assign(&x.column(i));
            }
            XType::Enum(levels) => {
                for (r, &value) in x.column(i).iter().enumerate() {
                    if !(value.is_finite() && value >= 0.0 && value < *levels as f64) {
                        return Err(MixedIntegerError::EnumIndexOutOfRange {
                            row: r,
                            col: i,
                            value,
                            levels: *levels,
                        });
                    }
                    out[[r, unfold_index + value as usize]] = 1.0;
                }
            }
        }
        unfold_index += xtype.unfolded_width();
    }
    Ok(out)
}

/// Level labels of categorical variable `x_col` for the given indices.
pub fn cast_to_enum_value(
    xlimits: &[XLimit],
    x_col: usize,
    enum_indexes: &[usize],
) -> Result<Vec<String>, MixedIntegerError> {
    let Some(XLimit::Levels(levels)) = xlimits.get(x_col) else {
        return Err(MixedIntegerError::NotAnEnum { col: x_col });
    };
    enum_indexes
        .iter()
        .enumerate()
        .map(|(row, &index)| {
            levels
                .get(index)
                .cloned()
                .ok_or(MixedIntegerError::EnumIndexOutOfRange {
                    row,
                    col: x_col,
                    value: index as f64,
                    levels: levels.len(),
                })
        })
        .collect()
}

fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = 0usize;
    let mut best_val = f64::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best_val {
            best = i;
            best_val = v;
        }
    }
    best
}

fn check_columns(found: usize, expected: usize) -> Result<(), MixedIntegerError> {
    if found != expected {
        return Err(MixedIntegerError::ColumnMismatch { expected, found });
    }
    Ok(())
}

/// Wraps a sampling method so that it draws in the unfolded continuous space
/// and returns admissible mixed-integer points.
#[derive(Debug, Clone)]
pub struct MixedIntegerSamplingMethod<S> {
    xtypes: Vec<XType>,
    sampling_method: S,
    output_in_folded_space: bool,
}

impl<S: SamplingMethod> MixedIntegerSamplingMethod<S> {
    /// `build` receives the unfolded continuous bounds and constructs the inner sampler.
    pub fn new<F>(
        xtypes: &[XType],
        xlimits: &[XLimit],
        output_in_folded_space: bool,
        build: F,
    ) -> Result<Self, MixedIntegerError>
    where
        F: FnOnce(BoundsStore) -> Result<S, SamplingError>,
    {
        let bounds = unfold_with_continuous_limits(xtypes, xlimits)?;
        Ok(Self {
            xtypes: xtypes.to_vec(),
            sampling_method: build(bounds)?,
            output_in_folded_space,
        })
    }

    pub fn inner(&self) -> &S {
        &self.sampling_method
    }

    pub fn sample(&mut self, n: usize) -> Result<Array2<f64>, MixedIntegerError> {
        let doe = self.sampling_method.sample(n)?;
        let unfolded = cast_to_discrete_values(&self.xtypes, doe.view())?;
        if self.output_in_folded_space {
            fold_with_enum_index(&self.xtypes, unfolded.view())
        } else {
            Ok(unfolded)
        }
    }
}

/// Wraps a surrogate so that it accepts mixed-integer inputs.
///
/// Prediction points are cast to admissible values before reaching the inner
/// surrogate; training points are passed through as given (after unfolding).
#[derive(Debug, Clone)]
pub struct MixedIntegerSurrogate<M> {
    xtypes: Vec<XType>,
    surrogate: M,
    input_in_folded_space: bool,
    name: String,
}

impl<M: Surrogate> MixedIntegerSurrogate<M> {
    pub fn new(
        xtypes: &[XType],
        xlimits: &[XLimit],
        surrogate: M,
        input_in_folded_space: bool,
    ) -> Result<Self, MixedIntegerError> {
        check_xspec_consistency(xtypes, xlimits)?;
        let name = format!("MixedInteger{}", surrogate.name());
        Ok(Self {
            xtypes: xtypes.to_vec(),
            surrogate,
            input_in_folded_space,
            name,
        })
    }

    pub fn inner(&self) -> &M {
        &self.surrogate
    }

    fn to_unfolded(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, MixedIntegerError> {
        if self.input_in_folded_space {
            unfold_with_enum_mask(&self.xtypes, x)
        } else {
            check_columns(x.ncols(), compute_x_unfold_dimension(&self.xtypes))?;
            Ok(x.to_owned())
        }
    }
}

impl<M: Surrogate> Surrogate for MixedIntegerSurrogate<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_training_values(
        &mut self,
        xt: ArrayView2<'_, f64>,
        yt: ArrayView2<'_, f64>,
    ) -> Result<(), SurrogateError> {
        let xt = self.to_unfolded(xt)?;
        self.surrogate.set_training_values(xt.view(), yt)
    }

    fn update_training_values(&mut self, yt: ArrayView2<'_, f64>) -> Result<(), SurrogateError> {
        self.surrogate.update_training_values(yt)
    }

    fn train(&mut self) -> Result<(), SurrogateError> {
        self.surrogate.train()
    }

    fn predict_values(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, SurrogateError> {
        let x = self.to_unfolded(x)?;
        let x = cast_to_discrete_values(&self.xtypes, x.view())?;
        self.surrogate.predict_values(x.view())
    }
}

/// Variable specification shared by mixed-integer samplers and surrogates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixedIntegerContext {
    xtypes: Vec<XType>,
    xlimits: Vec<XLimit>,
    work_in_folded_space: bool,
}

impl MixedIntegerContext {
    pub fn new(
        xtypes: Vec<XType>,
        xlimits: Vec<XLimit>,
        work_in_folded_space: bool,
    ) -> Result<Self, MixedIntegerError> {
        check_xspec_consistency(&xtypes, &xlimits)?;
        Ok(Self {
            xtypes,
            xlimits,
            work_in_folded_space,
        })
    }

    pub fn xtypes(&self) -> &[XType] {
        &self.xtypes
    }

    pub fn xlimits(&self) -> &[XLimit] {
        &self.xlimits
    }

    pub fn build_sampling_method<S, F>(
        &self,
        build: F,
    ) -> Result<MixedIntegerSamplingMethod<S>, MixedIntegerError>
    where
        S: SamplingMethod,
        F: FnOnce(BoundsStore) -> Result<S, SamplingError>,
    {
        MixedIntegerSamplingMethod::new(
            &self.xtypes,
            &self.xlimits,
            self.work_in_folded_space,
            build,
        )
    }

    pub fn build_surrogate<M: Surrogate>(
        &self,
        surrogate: M,
    ) -> Result<MixedIntegerSurrogate<M>, MixedIntegerError> {
        MixedIntegerSurrogate::new(
            &self.xtypes,
            &self.xlimits,
            surrogate,
            self.work_in_folded_space,
        )
    }

    pub fn unfold_with_continuous_limits(&self) -> Result<BoundsStore, MixedIntegerError> {
        unfold_with_continuous_limits(&self.xtypes, &self.xlimits)
    }

    pub fn cast_to_discrete_values(
        &self,
        x: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>, MixedIntegerError> {
        cast_to_discrete_values(&self.xtypes, x)
    }

    pub fn fold_with_enum_index(
        &self,
        x: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>, MixedIntegerError> {
        fold_with_enum_index(&self.xtypes, x)
    }

    pub fn unfold_with_enum_mask(
        &self,
        x: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>, MixedIntegerError> {
        unfold_with_enum_mask(&self.xtypes, x)
    }

    pub fn cast_to_enum_value(
        &self,
        x_col: usize,
        enum_indexes: &[usize],
    ) -> Result<Vec<String>, MixedIntegerError> {
        cast_to_enum_value(&self.xlimits, x_col, enum_indexes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn colors() -> Vec<String> {
        vec!["blue".to_string(), "red".to_string(), "green".to_string()]
    }

    fn spec() -> (Vec<XType>, Vec<XLimit>) {
        (
            vec![XType::Float, XType::Enum(3), XType::Int],
            vec![
                XLimit::Range(-5.0, 5.0),
                XLimit::Levels(colors()),
                XLimit::Range(0.0, 10.0),
            ],
        )
    }

    #[test]
    fn consistency_check_reports_each_mismatch() {
        let (xtypes, xlimits) = spec();
        check_xspec_consistency(&xtypes, &xlimits).unwrap();

        let err = check_xspec_consistency(&xtypes, &xlimits[..2]).unwrap_err();
        assert_eq!(
            err,
            MixedIntegerError::LimitsCountMismatch {
                limits: 2,
                types: 3
            }
        );

        let err = check_xspec_consistency(&[XType::Int], &[XLimit::Levels(colors())])
            .unwrap_err();
        assert_eq!(
            err,
            MixedIntegerError::ExpectedRange {
                index: 0,
                xtype: XType::Int
            }
        );

        let err = check_xspec_consistency(&[XType::Enum(2)], &[XLimit::Levels(colors())])
            .unwrap_err();
        assert_eq!(
            err,
            MixedIntegerError::LevelCountMismatch {
                index: 0,
                declared: 2,
                found: 3
            }
        );

        let err =
            check_xspec_consistency(&[XType::Enum(2)], &[XLimit::Range(0.0, 1.0)]).unwrap_err();
        assert_eq!(err, MixedIntegerError::ExpectedLevels { index: 0 });
    }

    #[test]
    fn unfold_dimension_counts_levels() {
        let (xtypes, _) = spec();
        assert_eq!(compute_x_unfold_dimension(&xtypes), 5);
    }

    #[test]
    fn continuous_limits_expand_levels_to_unit_intervals() {
        let (xtypes, xlimits) = spec();
        let bounds = unfold_with_continuous_limits(&xtypes, &xlimits).unwrap();
        assert_eq!(
            bounds.lower().unwrap(),
            array![-5.0, 0.0, 0.0, 0.0, 0.0].view()
        );
        assert_eq!(
            bounds.upper().unwrap(),
            array![5.0, 1.0, 1.0, 1.0, 10.0].view()
        );
    }

    #[test]
    fn cast_rounds_integers_and_masks_enum_maxima() {
        let (xtypes, _) = spec();
        let x = array![
            [0.3, 0.2, 0.7, 0.1, 2.5],
            [-1.2, 0.9, 0.9, 0.0, 3.6],
        ];
        let cast = cast_to_discrete_values(&xtypes, x.view()).unwrap();
        assert_eq!(
            cast,
            array![
                [0.3, 0.0, 1.0, 0.0, 2.0],
                [-1.2, 1.0, 1.0, 0.0, 4.0],
            ]
        );
    }

    #[test]
    fn fold_takes_first_argmax_of_enum_block() {
        let (xtypes, _) = spec();
        let x = array![[0.3, 0.0, 0.0, 1.0, 2.0], [1.5, 1.0, 1.0, 0.0, 7.0]];
        let folded = fold_with_enum_index(&xtypes, x.view()).unwrap();
        assert_eq!(folded, array![[0.3, 2.0, 2.0], [1.5, 0.0, 7.0]]);
    }

    #[test]
    fn unfold_mask_places_one_hot_blocks_after_preceding_columns() {
        let xtypes = vec![XType::Enum(2), XType::Float, XType::Enum(3)];
        let x = array![[1.0, 0.5, 0.0], [0.0, -2.0, 2.0]];
        let unfolded = unfold_with_enum_mask(&xtypes, x.view()).unwrap();
        assert_eq!(
            unfolded,
            array![
                [0.0, 1.0, 0.5, 1.0, 0.0, 0.0],
                [1.0, 0.0, -2.0, 0.0, 0.0, 1.0],
            ]
        );
        let folded = fold_with_enum_index(&xtypes, unfolded.view()).unwrap();
        assert_eq!(folded, x);
    }

    #[test]
    fn unfold_mask_rejects_bad_level_indices() {
        let xtypes = vec![XType::Enum(2)];
        let err = unfold_with_enum_mask(&xtypes, array![[2.0]].view()).unwrap_err();
        assert!(matches!(
            err,
            MixedIntegerError::EnumIndexOutOfRange { levels: 2, .. }
        ));
        assert!(unfold_with_enum_mask(&xtypes, array![[-1.0]].view()).is_err());
    }

    #[test]
    fn enum_values_map_indices_to_labels() {
        let (_, xlimits) = spec();
        let labels = cast_to_enum_value(&xlimits, 1, &[2, 0]).unwrap();
        assert_eq!(labels, vec!["green".to_string(), "blue".to_string()]);
        assert_eq!(
            cast_to_enum_value(&xlimits, 0, &[0]).unwrap_err(),
            MixedIntegerError::NotAnEnum { col: 0 }
        );
        assert!(cast_to_enum_value(&xlimits, 1, &[3]).is_err());
    }

    #[test]
    fn column_count_is_checked() {
        let (xtypes, _) = spec();
        let err = cast_to_discrete_values(&xtypes, array![[0.0, 1.0]].view()).unwrap_err();
        assert_eq!(
            err,
            MixedIntegerError::ColumnMismatch {
                expected: 5,
                found: 2
            }
        );
    }
}
