use crate::{Error, ParamId, Result};

/// Fails with [`Error::ShapeMismatch`] unless `got` equals `expected`.
pub fn ensure_shape(
    param: ParamId,
    what: &'static str,
    expected: &[usize],
    got: &[usize],
) -> Result<()> {
    if expected == got {
        return Ok(());
    }
    Err(Error::ShapeMismatch {
        param,
        what,
        expected: expected.to_vec(),
        got: got.to_vec(),
    })
}
