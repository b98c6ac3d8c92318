//! Checkpointing of optimiser state.
//!
//! Parameters are keyed by their position across all groups in construction
//! order, so a dict saved in one process can be loaded into an optimiser built
//! over the same layout in another.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{AccSgd, Error, HyperParams, ParamState, Result, Scalar};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupState {
    pub name: Option<String>,
    pub hyper: HyperParams,
    /// Positions of this group's parameters.
    pub params: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDict<F> {
    pub param_groups: Vec<GroupState>,
    pub state: BTreeMap<usize, ParamState<F>>,
}

impl<F: Scalar + Serialize> StateDict<F> {
    /// Fails with [`Error::NonFinite`] rather than writing NaN or infinity,
    /// which JSON would turn into `null`.
    pub fn to_json(&self) -> Result<String> {
        self.ensure_finite()?;
        Ok(serde_json::to_string(self)?)
    }

    fn ensure_finite(&self) -> Result<()> {
        for (i, group) in self.param_groups.iter().enumerate() {
            let h = &group.hyper;
            let fields = [
                ("lr", h.lr),
                ("kappa", h.kappa),
                ("xi", h.xi),
                ("small_const", h.small_const),
                ("weight_decay", h.weight_decay),
            ];
            if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
                return Err(Error::NonFinite(format!("{name} = {value} in group {i}")));
            }
        }

        for (position, s) in &self.state {
            // x - x is zero exactly when x is finite
            if s.momentum_buffer.iter().any(|&x| !(x - x).is_zero()) {
                return Err(Error::NonFinite(format!(
                    "momentum buffer of parameter at position {position}"
                )));
            }
        }
        Ok(())
    }
}

impl<F: DeserializeOwned> StateDict<F> {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl<F: Scalar> AccSgd<F> {
    pub fn state_dict(&self) -> StateDict<F> {
        let mut position = 0;
        let mut state = BTreeMap::new();
        let param_groups = self
            .groups
            .iter()
            .map(|group| {
                let start = position;
                for p in &group.params {
                    if let Some(s) = self.state.get(&p.id()) {
                        state.insert(position, s.clone());
                    }
                    position += 1;
                }
                GroupState {
                    name: group.name.clone(),
                    hyper: group.hyper,
                    params: (start..position).collect(),
                }
            })
            .collect();

        StateDict {
            param_groups,
            state,
        }
    }

    /// Replaces group hyperparameters and momentum buffers with `dict`.
    ///
    /// Only the group layout is checked. Buffer shapes are not; a bad one
    /// fails the next step with [`Error::ShapeMismatch`].
    pub fn load_state_dict(&mut self, dict: StateDict<F>) -> Result<()> {
        if dict.param_groups.len() != self.groups.len() {
            return Err(Error::StateMismatch(format!(
                "expected {} parameter group(s), got {}",
                self.groups.len(),
                dict.param_groups.len()
            )));
        }
        for (i, (saved, group)) in dict.param_groups.iter().zip(&self.groups).enumerate() {
            if saved.params.len() != group.params.len() {
                return Err(Error::StateMismatch(format!(
                    "group {i} has {} parameter(s), state dict has {}",
                    group.params.len(),
                    saved.params.len()
                )));
            }
        }

        let ids: HashMap<usize, _> = dict
            .param_groups
            .iter()
            .zip(&self.groups)
            .flat_map(|(saved, group)| saved.params.iter().copied().zip(&group.params))
            .map(|(position, p)| (position, p.id()))
            .collect();

        let mut state = HashMap::with_capacity(dict.state.len());
        for (position, s) in dict.state {
            match ids.get(&position) {
                Some(&id) => {
                    state.insert(id, s);
                }
                None => log::warn!("dropping state for unknown parameter position {position}"),
            }
        }

        for (group, saved) in self.groups.iter_mut().zip(dict.param_groups) {
            group.name = saved.name;
            group.hyper = saved.hyper;
        }
        self.state = state;

        log::debug!(
            "loaded state for {} parameter(s) across {} group(s)",
            self.state.len(),
            self.groups.len()
        );
        Ok(())
    }
}
