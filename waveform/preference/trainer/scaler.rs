use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature mean/scale standardization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fits mean and population standard deviation column by column.
    ///
    /// A column whose deviation is zero, negligible relative to its mean, or
    /// not finite gets scale `1.0`, so it is only centered.
    #[must_use]
    pub fn fit(samples: &Array2<f64>) -> Self {
        let mean = samples
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(samples.ncols()));
        let std = if samples.nrows() == 0 {
            Array1::ones(mean.len())
        } else {
            samples.std_axis(Axis(0), 0.0)
        };
        let scale = std
            .iter()
            .zip(mean.iter())
            .map(|(&deviation, &center)| floor_scale(deviation, center))
            .collect();
        Self { mean, scale }
    }

    /// Standardizes a single row.
    #[must_use]
    pub fn transform_row(&self, row: ArrayView1<'_, f64>) -> Array1<f64> {
        (&row - &self.mean) / &self.scale
    }

    /// Standardizes every row of a matrix.
    #[must_use]
    pub fn transform(&self, samples: &Array2<f64>) -> Array2<f64> {
        (samples - &self.mean) / &self.scale
    }

    /// Fitted column means.
    #[must_use]
    pub const fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Fitted column scales (never zero).
    #[must_use]
    pub const fn scale(&self) -> &Array1<f64> {
        &self.scale
    }
}

fn floor_scale(deviation: f64, center: f64) -> f64 {
    let negligible = 10.0 * f64::EPSILON * center.abs().max(1.0);
    if deviation.is_finite() && deviation > negligible {
        deviation
    } else {
        1.0
    }
}
