use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{Array, ArrayD, Dimension};

use crate::{Error, Result};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a [`Param`]. Clones of a handle share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamId(u64);

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct ParamData<F> {
    pub(crate) value: ArrayD<F>,
    pub(crate) grad: Option<ArrayD<F>>,
}

/// Shared handle to a trainable tensor and its gradient.
///
/// The model and the optimiser each hold a clone; both see the same value.
pub struct Param<F> {
    id: ParamId,
    data: Rc<RefCell<ParamData<F>>>,
}

impl<F> Clone for Param<F> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            data: Rc::clone(&self.data),
        }
    }
}

impl<F> fmt::Debug for Param<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("id", &self.id)
            .field("shape", &self.shape())
            .finish()
    }
}

impl<F> Param<F> {
    pub fn new<D: Dimension>(value: Array<F, D>) -> Self {
        let id = ParamId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        Self {
            id,
            data: Rc::new(RefCell::new(ParamData {
                value: value.into_dyn(),
                grad: None,
            })),
        }
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn shape(&self) -> Vec<usize> {
        self.data.borrow().value.shape().to_vec()
    }

    pub fn value(&self) -> Ref<'_, ArrayD<F>> {
        Ref::map(self.data.borrow(), |d| &d.value)
    }

    pub fn value_mut(&self) -> RefMut<'_, ArrayD<F>> {
        RefMut::map(self.data.borrow_mut(), |d| &mut d.value)
    }

    pub fn grad(&self) -> Option<Ref<'_, ArrayD<F>>> {
        Ref::filter_map(self.data.borrow(), |d| d.grad.as_ref()).ok()
    }

    /// Attaches (or with `None`, detaches) the gradient for the next step.
    pub fn set_grad<D: Dimension>(&self, grad: Option<Array<F, D>>) {
        self.data.borrow_mut().grad = grad.map(Array::into_dyn);
    }

    pub(crate) fn try_borrow_mut(&self) -> Result<RefMut<'_, ParamData<F>>> {
        self.data
            .try_borrow_mut()
            .map_err(|_| Error::ParamInUse(self.id))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn clones_share_value_and_identity() {
        let p = Param::new(array![1.0_f32, 2.0]);
        let q = p.clone();
        q.value_mut()[0] = 5.0;

        assert_eq!(p.id(), q.id());
        assert_eq!(p.value()[0], 5.0);
    }

    #[test]
    fn ids_are_unique() {
        let p = Param::new(array![1.0_f64]);
        let q = Param::new(array![1.0_f64]);
        assert_ne!(p.id(), q.id());
    }

    #[test]
    fn grad_is_optional() {
        let p = Param::new(array![[1.0_f64, 2.0], [3.0, 4.0]]);
        assert!(p.grad().is_none());
        assert_eq!(p.shape(), vec![2, 2]);

        p.set_grad(Some(array![[0.1, 0.2], [0.3, 0.4]]));
        assert_eq!(p.grad().unwrap()[[1, 0]], 0.3);

        p.set_grad(None::<ArrayD<f64>>);
        assert!(p.grad().is_none());
    }

    #[test]
    fn borrowed_param_is_reported() {
        let p = Param::new(array![1.0_f64]);
        let _held = p.value();
        assert!(matches!(p.try_borrow_mut(), Err(Error::ParamInUse(id)) if id == p.id()));
    }
}
