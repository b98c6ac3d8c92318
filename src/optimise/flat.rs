use ndarray::{ArrayView1, ArrayViewMut1};

use super::hyper::{Coefficients, Defaults, HyperParams, Overrides};
use super::update::accelerated_update;
use super::Optimiser;
use crate::{Result, Scalar};

/// [`AccSgd`](super::accsgd::AccSgd) for a single contiguous parameter buffer.
#[derive(Debug, Clone)]
pub struct FlatAccSgd<F> {
    hyper: HyperParams,
    coefficients: Coefficients<F>,
    buffer: Vec<F>,
}

impl<F: Scalar> FlatAccSgd<F> {
    pub fn new(defaults: Defaults) -> Result<Self> {
        defaults.validate()?;
        let hyper = defaults.resolve(&Overrides::default())?;
        Ok(Self {
            hyper,
            coefficients: hyper.coefficients()?,
            buffer: vec![],
        })
    }

    pub fn hyper(&self) -> &HyperParams {
        &self.hyper
    }

    /// The momentum buffer, once the first step has seeded it.
    pub fn buffer(&self) -> Option<&[F]> {
        (!self.buffer.is_empty()).then_some(self.buffer.as_slice())
    }
}

impl<F: Scalar> Optimiser<F> for FlatAccSgd<F> {
    fn init(&mut self, size: usize) {
        self.buffer.clear();
        self.buffer.reserve(size);
    }

    /// # Panics
    /// If `graph`, `grads` and a seeded buffer differ in length.
    fn optimise(&mut self, graph: &mut [F], grads: &[F]) {
        if self.buffer.is_empty() {
            self.buffer.extend_from_slice(graph);
        }
        assert_eq!(
            graph.len(),
            grads.len(),
            "graph and gradients should have the same length"
        );

        accelerated_update(
            ArrayViewMut1::from(graph),
            ArrayViewMut1::from(self.buffer.as_mut_slice()),
            &ArrayView1::from(grads),
            &self.coefficients,
        );
    }
}
