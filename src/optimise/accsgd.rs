use std::collections::{HashMap, HashSet};

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use super::hyper::{check_lr, Defaults, HyperParams, Overrides};
use super::update::accelerated_update;
use crate::array::ensure_shape;
use crate::{Error, Param, ParamId, Result, Scalar};

/// A labelled set of parameters with their own hyperparameter overrides.
#[derive(Debug, Clone)]
pub struct GroupSpec<F> {
    pub name: Option<String>,
    pub params: Vec<Param<F>>,
    pub overrides: Overrides,
}

impl<F> GroupSpec<F> {
    pub fn new(params: impl IntoIterator<Item = Param<F>>) -> Self {
        Self {
            name: None,
            params: params.into_iter().collect(),
            overrides: Overrides::default(),
        }
    }

    pub fn named(name: impl Into<String>, params: impl IntoIterator<Item = Param<F>>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(params)
        }
    }

    pub fn lr(mut self, lr: f64) -> Self {
        self.overrides.lr = Some(lr);
        self
    }

    pub fn kappa(mut self, kappa: f64) -> Self {
        self.overrides.kappa = Some(kappa);
        self
    }

    pub fn xi(mut self, xi: f64) -> Self {
        self.overrides.xi = Some(xi);
        self
    }

    pub fn small_const(mut self, small_const: f64) -> Self {
        self.overrides.small_const = Some(small_const);
        self
    }

    pub fn weight_decay(mut self, weight_decay: f64) -> Self {
        self.overrides.weight_decay = Some(weight_decay);
        self
    }
}

/// Construction input: a bare parameter or a whole group.
///
/// Runs of consecutive bare parameters are collected into one unnamed group
/// that uses the optimiser defaults.
#[derive(Debug, Clone)]
pub enum ParamSpec<F> {
    Param(Param<F>),
    Group(GroupSpec<F>),
}

impl<F> From<Param<F>> for ParamSpec<F> {
    fn from(p: Param<F>) -> Self {
        ParamSpec::Param(p)
    }
}

impl<F> From<GroupSpec<F>> for ParamSpec<F> {
    fn from(g: GroupSpec<F>) -> Self {
        ParamSpec::Group(g)
    }
}

#[derive(Debug, Clone)]
pub struct ParamGroup<F> {
    pub(crate) name: Option<String>,
    pub(crate) params: Vec<Param<F>>,
    pub(crate) hyper: HyperParams,
}

impl<F> ParamGroup<F> {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn params(&self) -> &[Param<F>] {
        &self.params
    }

    pub fn hyper(&self) -> &HyperParams {
        &self.hyper
    }

    /// Direct access for schedulers. Only `lr` is checked, and only by [`ParamGroup::set_lr`].
    pub fn hyper_mut(&mut self) -> &mut HyperParams {
        &mut self.hyper
    }

    pub fn set_lr(&mut self, lr: f64) -> Result<()> {
        check_lr(lr)?;
        self.hyper.lr = lr;
        Ok(())
    }
}

/// Per-parameter optimiser state. Plain data, never tracked for gradients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamState<F> {
    pub momentum_buffer: ArrayD<F>,
}

/// Accelerated SGD over groups of shared parameters.
///
/// Implements the algorithm proposed in <https://arxiv.org/pdf/1704.08227.pdf>,
/// a provably accelerated method for stochastic optimisation.
///
/// Every step, for each parameter with a gradient, a momentum buffer `v`
/// (seeded with the parameter's value on first use) takes a long step of
/// `lr * kappa / small_const`, while the parameter takes a short step of `lr`
/// and is then pulled towards `v`.
#[derive(Debug)]
pub struct AccSgd<F> {
    pub(crate) defaults: Defaults,
    pub(crate) groups: Vec<ParamGroup<F>>,
    pub(crate) state: HashMap<ParamId, ParamState<F>>,
}

impl<F: Scalar> AccSgd<F> {
    pub fn new(
        params: impl IntoIterator<Item = ParamSpec<F>>,
        defaults: Defaults,
    ) -> Result<Self> {
        defaults.validate()?;

        let mut optimiser = Self {
            defaults,
            groups: vec![],
            state: HashMap::new(),
        };

        let mut loose = vec![];
        for spec in params {
            match spec {
                ParamSpec::Param(p) => loose.push(p),
                ParamSpec::Group(g) => {
                    if !loose.is_empty() {
                        optimiser.add_param_group(GroupSpec::new(loose.drain(..)))?;
                    }
                    optimiser.add_param_group(g)?;
                }
            }
        }
        if !loose.is_empty() {
            optimiser.add_param_group(GroupSpec::new(loose))?;
        }

        if optimiser.groups.iter().all(|g| g.params.is_empty()) {
            return Err(Error::invalid("optimiser got an empty parameter list"));
        }

        log::debug!(
            "created AccSgd with {} group(s), {} parameter(s)",
            optimiser.groups.len(),
            optimiser.groups.iter().map(|g| g.params.len()).sum::<usize>()
        );
        Ok(optimiser)
    }

    pub fn add_param_group(&mut self, group: GroupSpec<F>) -> Result<()> {
        let GroupSpec {
            name,
            params,
            overrides,
        } = group;
        let hyper = self.defaults.resolve(&overrides)?;

        let mut seen: HashSet<ParamId> = self.params().map(Param::id).collect();
        for p in &params {
            if !seen.insert(p.id()) {
                return Err(Error::invalid(format!(
                    "parameter {} appears in more than one parameter group",
                    p.id()
                )));
            }
        }

        log::debug!(
            "adding parameter group {:?} with {} parameter(s): {hyper:?}",
            name,
            params.len()
        );
        self.groups.push(ParamGroup {
            name,
            params,
            hyper,
        });
        Ok(())
    }

    /// Performs a single optimisation step.
    pub fn step(&mut self) -> Result<()> {
        self.update()
    }

    /// Calls `closure` (which typically re-evaluates the model and attaches
    /// fresh gradients), performs a step, and returns the closure's loss.
    pub fn step_with<L>(&mut self, closure: impl FnOnce() -> L) -> Result<L> {
        let loss = closure();
        self.update()?;
        Ok(loss)
    }

    fn update(&mut self) -> Result<()> {
        for (i, group) in self.groups.iter().enumerate() {
            let c = group.hyper.coefficients::<F>()?;
            log::trace!("step group {i} ({:?}): {:?}", group.name, group.hyper);

            for param in &group.params {
                let mut data = param.try_borrow_mut()?;
                let data = &mut *data;
                let Some(grad) = data.grad.as_ref() else {
                    continue;
                };
                ensure_shape(param.id(), "gradient", data.value.shape(), grad.shape())?;

                let state = self.state.entry(param.id()).or_insert_with(|| {
                    log::trace!("initialising momentum buffer for parameter {}", param.id());
                    ParamState {
                        momentum_buffer: data.value.clone(),
                    }
                });
                ensure_shape(
                    param.id(),
                    "momentum buffer",
                    data.value.shape(),
                    state.momentum_buffer.shape(),
                )?;

                accelerated_update(
                    data.value.view_mut(),
                    state.momentum_buffer.view_mut(),
                    grad,
                    &c,
                );
            }
        }
        Ok(())
    }

    /// Drops every parameter's gradient.
    ///
    /// Fails like [`AccSgd::step`] on a parameter borrowed elsewhere; gradients
    /// cleared before it stay cleared.
    pub fn zero_grad(&self) -> Result<()> {
        for p in self.params() {
            p.try_borrow_mut()?.grad = None;
        }
        Ok(())
    }

    /// Forgets all momentum buffers; the next step reseeds them.
    pub fn reset_state(&mut self) {
        log::debug!("resetting state of {} parameter(s)", self.state.len());
        self.state.clear();
    }

    pub fn state(&self, param: &Param<F>) -> Option<&ParamState<F>> {
        self.state.get(&param.id())
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub fn param_groups(&self) -> &[ParamGroup<F>] {
        &self.groups
    }

    pub fn param_groups_mut(&mut self) -> &mut [ParamGroup<F>] {
        &mut self.groups
    }

    /// All parameters in group order.
    pub fn params(&self) -> impl Iterator<Item = &Param<F>> {
        self.groups.iter().flat_map(|g| &g.params)
    }
}
