//! Accelerated stochastic gradient descent for `ndarray` parameters.
//!
//! [`AccSgd`] implements the update rule from
//! <https://arxiv.org/pdf/1704.08227.pdf> over groups of shared [`Param`]
//! handles, keeping one momentum buffer per parameter.
//! [`FlatAccSgd`](optimise::flat::FlatAccSgd) runs the same recurrence over a
//! single flat weight buffer through the [`Optimiser`](optimise::Optimiser) trait.
//!
//! ```
//! use accsgd_rs::{AccSgd, Defaults, Param};
//! use ndarray::array;
//!
//! let w = Param::new(array![1.0_f64, -2.0]);
//! let mut optimiser = AccSgd::new([w.clone().into()], Defaults::with_lr(0.1))?;
//!
//! w.set_grad(Some(array![0.5, 0.25]));
//! optimiser.step()?;
//! assert!(optimiser.state(&w).is_some());
//! # Ok::<(), accsgd_rs::Error>(())
//! ```

use ndarray::LinalgScalar;
use num_traits::FromPrimitive;

pub(crate) mod array;
pub mod error;
pub mod optimise;
pub mod param;
pub mod state;

pub use error::{Error, Result};
pub use optimise::accsgd::{AccSgd, GroupSpec, ParamGroup, ParamSpec, ParamState};
pub use optimise::hyper::{Coefficients, Defaults, HyperParams, Overrides};
pub use param::{Param, ParamId};
pub use state::{GroupState, StateDict};

pub trait Scalar: LinalgScalar + FromPrimitive {}
impl<S> Scalar for S where S: LinalgScalar + FromPrimitive {}
