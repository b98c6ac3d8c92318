use ndarray::{azip, ArrayBase, ArrayViewMut, Data, Dimension};

use super::hyper::Coefficients;
use crate::Scalar;

/// One accelerated step over a whole tensor, in place.
///
/// `buf` must already be seeded; all three arrays must share one shape.
///
/// ```text
/// g   = grad + weight_decay * value            (if weight_decay != 0)
/// buf = ((buf * (1/beta - 1)) - large_lr * g + value) * beta
/// val = (value - lr * g) * zeta + (1 - zeta) * buf
/// ```
pub fn accelerated_update<F, D>(
    value: ArrayViewMut<'_, F, D>,
    buf: ArrayViewMut<'_, F, D>,
    grad: &ArrayBase<impl Data<Elem = F>, D>,
    c: &Coefficients<F>,
) where
    F: Scalar,
    D: Dimension,
{
    let decay = !c.weight_decay.is_zero();

    azip!((v in value, b in buf, &g in grad) {
        let g = if decay { g + c.weight_decay * *v } else { g };

        let mut next = *b * c.buf_scale;
        next = next - c.large_lr * g;
        next = next + *v;
        next = next * c.beta;
        *b = next;

        let mut x = *v - c.lr * g;
        x = x * c.zeta;
        *v = x + c.mix * next;
    });
}
