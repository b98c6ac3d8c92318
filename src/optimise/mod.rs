use crate::Scalar;

pub mod accsgd;
pub mod flat;
pub mod hyper;
pub mod update;

/// Update rule for training loops that keep every weight in one flat buffer.
pub trait Optimiser<F: Scalar> {
    fn init(&mut self, size: usize);
    fn optimise(&mut self, graph: &mut [F], grads: &[F]);
}
