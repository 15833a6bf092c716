use linfa::prelude::*;
use linfa_logistic::LogisticRegression as LbfgsLogistic;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::{config::TrainingConfig, error::PreferenceError};

/// How the parameters of a fit were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMethod {
    /// Penalized maximum likelihood solved with L-BFGS.
    Lbfgs,
    /// Only one label in the log: zero weights and a smoothed log-odds intercept.
    ClassPrior,
}

/// Binary logistic classifier over standardized features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Array1<f64>,
    intercept: f64,
}

/// Solver diagnostics for one fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    /// Which path produced the parameters.
    pub method: FitMethod,
    /// Whether the gradient norm ended within tolerance.
    pub converged: bool,
    /// L2 norm of the objective gradient at the returned parameters.
    pub gradient_norm: f64,
    /// Final value of `0.5·‖w‖² + C·Σ logloss`.
    pub objective: f64,
}

impl LogisticRegression {
    /// Fits by L2-penalized maximum likelihood.
    ///
    /// `liked[i]` is the label of row `i`. The intercept is not penalized.
    /// A log holding a single label has no finite optimum, so it gets zero
    /// weights and the Laplace-smoothed log-odds of the label counts.
    pub fn fit(
        x: &Array2<f64>,
        liked: &Array1<bool>,
        config: &TrainingConfig,
    ) -> Result<(Self, FitReport), PreferenceError> {
        let liked_count = liked.iter().filter(|&&label| label).count();
        let (model, method) = if liked_count == 0 || liked_count == liked.len() {
            let prior = Self::class_prior(x.ncols(), liked_count, liked.len() - liked_count);
            (prior, FitMethod::ClassPrior)
        } else {
            (Self::fit_lbfgs(x, liked, config)?, FitMethod::Lbfgs)
        };
        let targets = liked.mapv(|label| if label { 1.0 } else { 0.0 });
        let (objective, gradient_norm) = model.objective_and_gradient(x, &targets, config.c);
        let report = FitReport {
            method,
            converged: method == FitMethod::ClassPrior
                || gradient_norm <= config.tolerance * config.c,
            gradient_norm,
            objective,
        };
        Ok((model, report))
    }

    fn fit_lbfgs(
        x: &Array2<f64>,
        liked: &Array1<bool>,
        config: &TrainingConfig,
    ) -> Result<Self, PreferenceError> {
        let dataset = Dataset::new(x.clone(), liked.clone());
        let fitted = LbfgsLogistic::default()
            .alpha(1.0 / config.c)
            .with_intercept(true)
            .max_iterations(u64::try_from(config.max_iter).unwrap_or(u64::MAX))
            .gradient_tolerance(config.tolerance)
            .fit(&dataset)
            .map_err(|err| PreferenceError::Training(err.to_string()))?;

        // linfa picks its own positive class; orient the parameters towards `liked`.
        let sign = if fitted.labels().pos.class { 1.0 } else { -1.0 };
        Ok(Self {
            weights: fitted.params().mapv(|w| sign * w),
            intercept: sign * fitted.intercept(),
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn class_prior(features: usize, liked: usize, skipped: usize) -> Self {
        Self {
            weights: Array1::zeros(features),
            intercept: ((liked as f64 + 1.0) / (skipped as f64 + 1.0)).ln(),
        }
    }

    fn objective_and_gradient(&self, x: &Array2<f64>, targets: &Array1<f64>, c: f64) -> (f64, f64) {
        let margins = x.dot(&self.weights) + self.intercept;
        let log_loss: f64 = margins
            .iter()
            .zip(targets.iter())
            .map(|(&z, &target)| softplus(z) - target * z)
            .sum();
        let objective = 0.5 * self.weights.dot(&self.weights) + c * log_loss;

        let residuals = margins.mapv(sigmoid) - targets;
        let weight_gradient = x.t().dot(&residuals) * c + &self.weights;
        let intercept_gradient = c * residuals.sum();
        let norm = (weight_gradient.dot(&weight_gradient) + intercept_gradient.powi(2)).sqrt();
        (objective, norm)
    }

    /// Signed distance to the decision boundary.
    #[must_use]
    pub fn decision_function(&self, row: ArrayView1<'_, f64>) -> f64 {
        row.dot(&self.weights) + self.intercept
    }

    /// Probability of the positive (liked) class.
    ///
    /// A decision value of NaN (opposing infinite terms on extreme input)
    /// carries no preference and reads as `0.5`.
    #[must_use]
    pub fn predict_proba(&self, row: ArrayView1<'_, f64>) -> f64 {
        let decision = self.decision_function(row);
        if decision.is_nan() {
            return 0.5;
        }
        sigmoid(decision)
    }

    /// Fitted coefficients in standardized feature space.
    #[must_use]
    pub const fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    /// Fitted intercept.
    #[must_use]
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }
}

/// Numerically stable logistic function.
#[must_use]
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}
