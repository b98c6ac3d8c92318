use serde::{Deserialize, Serialize};

use crate::{Error, Result, Scalar};

/// Resolved hyperparameters of one parameter group.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParams {
    /// learning rate, the short step
    pub lr: f64,
    /// ratio of long to short step
    pub kappa: f64,
    /// statistical advantage parameter
    pub xi: f64,
    /// any value in `(0, 1]`
    pub small_const: f64,
    /// L2 penalty folded into the gradient
    pub weight_decay: f64,
}

/// Optimiser-wide defaults. `lr` has no default and must be given here or in
/// every group's [`Overrides`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Defaults {
    pub lr: Option<f64>,
    pub kappa: f64,
    pub xi: f64,
    pub small_const: f64,
    pub weight_decay: f64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            lr: None,
            kappa: 1000.0,
            xi: 10.0,
            small_const: 0.7,
            weight_decay: 0.0,
        }
    }
}

impl Defaults {
    pub fn with_lr(lr: f64) -> Self {
        Self {
            lr: Some(lr),
            ..Self::default()
        }
    }

    pub fn kappa(self, kappa: f64) -> Self {
        Self { kappa, ..self }
    }

    pub fn xi(self, xi: f64) -> Self {
        Self { xi, ..self }
    }

    pub fn small_const(self, small_const: f64) -> Self {
        Self {
            small_const,
            ..self
        }
    }

    pub fn weight_decay(self, weight_decay: f64) -> Self {
        Self {
            weight_decay,
            ..self
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self.lr {
            Some(lr) => check_lr(lr),
            None => Ok(()),
        }
    }

    /// Fills every unset field of `overrides` from `self`.
    pub fn resolve(&self, overrides: &Overrides) -> Result<HyperParams> {
        let lr = overrides
            .lr
            .or(self.lr)
            .ok_or_else(|| Error::invalid("lr is required"))?;
        check_lr(lr)?;

        Ok(HyperParams {
            lr,
            kappa: overrides.kappa.unwrap_or(self.kappa),
            xi: overrides.xi.unwrap_or(self.xi),
            small_const: overrides.small_const.unwrap_or(self.small_const),
            weight_decay: overrides.weight_decay.unwrap_or(self.weight_decay),
        })
    }
}

pub(crate) fn check_lr(lr: f64) -> Result<()> {
    // also rejects NaN
    if lr >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid(format!("invalid learning rate: {lr}")))
    }
}

/// Per-group values that take precedence over [`Defaults`].
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Overrides {
    pub lr: Option<f64>,
    pub kappa: Option<f64>,
    pub xi: Option<f64>,
    pub small_const: Option<f64>,
    pub weight_decay: Option<f64>,
}

/// Step constants derived from [`HyperParams`], cast to the parameter scalar.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Coefficients<F> {
    pub lr: F,
    pub large_lr: F,
    pub beta: F,
    /// `1 / beta - 1`
    pub buf_scale: F,
    pub zeta: F,
    /// `1 - zeta`
    pub mix: F,
    pub weight_decay: F,
}

impl HyperParams {
    /// Derives the step constants in `f64`, then casts them to `F`.
    ///
    /// `beta` close to zero blows up `buf_scale`; that is a configuration
    /// error and is only logged.
    pub fn coefficients<F: Scalar>(&self) -> Result<Coefficients<F>> {
        let sc = self.small_const;
        let large_lr = (self.lr * self.kappa) / sc;
        let alpha = 1.0 - ((sc * sc * self.xi) / self.kappa);
        let beta = 1.0 - alpha;
        let zeta = sc / (sc + beta);
        let buf_scale = (1.0 / beta) - 1.0;
        let mix = 1.0 - zeta;

        if ![large_lr, beta, buf_scale, zeta].iter().all(|c| c.is_finite()) {
            log::warn!(
                "non-finite step coefficients (large_lr={large_lr}, beta={beta}, zeta={zeta}) for {:?}",
                self
            );
        }

        Ok(Coefficients {
            lr: cast("lr", self.lr)?,
            large_lr: cast("large_lr", large_lr)?,
            beta: cast("beta", beta)?,
            buf_scale: cast("buf_scale", buf_scale)?,
            zeta: cast("zeta", zeta)?,
            mix: cast("mix", mix)?,
            weight_decay: cast("weight_decay", self.weight_decay)?,
        })
    }
}

fn cast<F: Scalar>(name: &'static str, value: f64) -> Result<F> {
    F::from_f64(value).ok_or(Error::Unrepresentable { name, value })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn defaults_match_paper_settings() {
        let d = Defaults::default();
        assert_eq!(d.lr, None);
        assert_eq!(d.kappa, 1000.0);
        assert_eq!(d.xi, 10.0);
        assert_eq!(d.small_const, 0.7);
        assert_eq!(d.weight_decay, 0.0);
    }

    #[test]
    fn lr_is_required() {
        let err = Defaults::default().resolve(&Overrides::default());
        assert!(matches!(err, Err(Error::InvalidArgument(_))));

        let hp = Defaults::default()
            .resolve(&Overrides {
                lr: Some(0.2),
                ..Overrides::default()
            })
            .unwrap();
        assert_eq!(hp.lr, 0.2);
    }

    #[test]
    fn negative_or_nan_lr_is_rejected() {
        assert!(matches!(
            Defaults::with_lr(-1.0).validate(),
            Err(Error::InvalidArgument(_))
        ));
        assert!(Defaults::with_lr(f64::NAN).validate().is_err());
        assert!(Defaults::with_lr(0.0).validate().is_ok());
        assert!(Defaults::default().validate().is_ok());

        let err = Defaults::with_lr(0.1).resolve(&Overrides {
            lr: Some(-0.5),
            ..Overrides::default()
        });
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn overrides_take_precedence() {
        let defaults = Defaults::with_lr(0.1).kappa(500.0).weight_decay(1e-4);
        let hp = defaults
            .resolve(&Overrides {
                xi: Some(5.0),
                weight_decay: Some(0.0),
                ..Overrides::default()
            })
            .unwrap();

        assert_eq!(
            hp,
            HyperParams {
                lr: 0.1,
                kappa: 500.0,
                xi: 5.0,
                small_const: 0.7,
                weight_decay: 0.0,
            }
        );
    }

    #[test]
    fn out_of_range_constants_are_accepted() {
        let hp = Defaults::with_lr(0.1)
            .kappa(0.5)
            .xi(-1.0)
            .small_const(3.0)
            .resolve(&Overrides::default());
        assert!(hp.is_ok());
    }

    #[test]
    fn coefficients_for_default_settings() {
        let hp = Defaults::with_lr(0.1).resolve(&Overrides::default()).unwrap();
        let c = hp.coefficients::<f64>().unwrap();

        assert_relative_eq!(c.lr, 0.1);
        assert_relative_eq!(c.large_lr, 100.0 / 0.7, max_relative = 1e-12);
        assert_relative_eq!(c.beta, 0.0049, max_relative = 1e-9);
        assert_relative_eq!(c.buf_scale, 1.0 / 0.0049 - 1.0, max_relative = 1e-9);
        assert_relative_eq!(c.zeta, 0.7 / 0.7049, max_relative = 1e-9);
        assert_relative_eq!(c.zeta + c.mix, 1.0, max_relative = 1e-12);
        assert_eq!(c.weight_decay, 0.0);
    }

    #[test]
    fn coefficients_cast_to_single_precision() {
        let hp = Defaults::with_lr(0.1).resolve(&Overrides::default()).unwrap();
        let c64 = hp.coefficients::<f64>().unwrap();
        let c32 = hp.coefficients::<f32>().unwrap();
        assert_eq!(c32.beta, c64.beta as f32);
        assert_eq!(c32.large_lr, c64.large_lr as f32);
    }

    #[test]
    fn degenerate_beta_is_not_rejected() {
        // kappa so large that beta underflows to zero
        let hp = Defaults::with_lr(0.1)
            .kappa(f64::INFINITY)
            .resolve(&Overrides::default())
            .unwrap();
        let c = hp.coefficients::<f64>().unwrap();
        assert_eq!(c.beta, 0.0);
        assert!(c.buf_scale.is_infinite());
    }
}
