#![deny(dead_code)]
#![deny(unused_imports)]

pub mod bounds;
pub mod idw;
pub mod mixed_integer;
pub mod sampling;
pub mod surrogate;
pub mod types;

pub use bounds::{BoundSide, BoundsError, BoundsState, BoundsStore, ErrorKind};
pub use idw::{IdwError, IdwSurrogate, compute_idw_jacobian};
pub use mixed_integer::{
    MixedIntegerContext, MixedIntegerError, MixedIntegerSamplingMethod, MixedIntegerSurrogate,
    XLimit, XType, cast_to_discrete_values, cast_to_enum_value, check_xspec_consistency,
    compute_x_unfold_dimension, fold_with_enum_index, unfold_with_continuous_limits,
    unfold_with_enum_mask,
};
pub use sampling::{RandomSampling, SamplingError, SamplingMethod};
pub use surrogate::{Surrogate, SurrogateError};
pub use types::{IdwConfig, Jacobian};
