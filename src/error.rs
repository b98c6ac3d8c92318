use thiserror::Error;

use crate::param::ParamId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A gradient or momentum buffer does not match the shape of its parameter.
    /// Raised before the parameter is touched.
    #[error("{what} of parameter {param} has shape {got:?}, expected {expected:?}")]
    ShapeMismatch {
        param: ParamId,
        what: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("parameter {0} is borrowed elsewhere")]
    ParamInUse(ParamId),

    #[error("hyperparameter {name} = {value} is not representable in the parameter scalar type")]
    Unrepresentable { name: &'static str, value: f64 },

    #[error("state dict does not match optimiser: {0}")]
    StateMismatch(String),

    /// JSON has no encoding for NaN or infinity.
    #[error("cannot serialise non-finite {0}")]
    NonFinite(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
