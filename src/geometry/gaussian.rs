//! Gaussian basis expansion of interatomic distances
//!
//! A distance `d` becomes the vector `exp(-(d - c_i)^2 / var^2)` over evenly
//! spaced centers `c_i = dmin + i * step`, giving the model a smooth
//! encoding of bond length. Units are Angstroms.

use crate::error::{DataError, Result};

/// Slack when counting centers, so that (dmax - dmin) / step landing a hair
/// above an integer does not add a spurious center
const CENTER_COUNT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianDistance {
    centers: Vec<f64>,
    variance: f64,
}

impl GaussianDistance {
    /// Build the filter bank
    ///
    /// # Arguments
    /// * `dmin` - First center
    /// * `dmax` - Last center is the first one at or beyond `dmax`
    /// * `step` - Spacing between centers
    /// * `variance` - Gaussian width; `None` uses `step`
    pub fn new(dmin: f64, dmax: f64, step: f64, variance: Option<f64>) -> Result<Self> {
        if ![dmin, dmax, step].iter().all(|x| x.is_finite()) || step <= 0.0 {
            return Err(DataError::Config(format!(
                "Invalid Gaussian filter: dmin={}, dmax={}, step={}",
                dmin, dmax, step
            )));
        }
        if dmin >= dmax {
            return Err(DataError::Config(format!(
                "Gaussian filter needs dmin < dmax, got dmin={}, dmax={}",
                dmin, dmax
            )));
        }
        if dmax - dmin <= step {
            return Err(DataError::Config(format!(
                "Gaussian filter needs dmax - dmin > step, got {} <= {}",
                dmax - dmin,
                step
            )));
        }

        let variance = variance.unwrap_or(step);
        if !variance.is_finite() || variance <= 0.0 {
            return Err(DataError::Config(format!(
                "Gaussian variance must be positive, got {}",
                variance
            )));
        }

        let num_centers = ((dmax - dmin) / step - CENTER_COUNT_EPSILON).ceil() as usize + 1;
        let centers = (0..num_centers).map(|i| dmin + i as f64 * step).collect();

        Ok(Self { centers, variance })
    }

    /// Number of basis functions (length of each expanded vector)
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// Expand one distance
    pub fn expand(&self, distance: f64) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.centers.len());
        self.expand_into(distance, &mut out);
        out
    }

    /// Expand every distance of a flattened array of any shape
    ///
    /// The result is the same array with a basis axis of length `len()`
    /// appended: element `[i * len() + k]` is basis `k` of `distances[i]`.
    pub fn expand_all(&self, distances: &[f64]) -> Vec<f64> {
        let mut out = Vec::with_capacity(distances.len() * self.centers.len());
        for &d in distances {
            self.expand_into(d, &mut out);
        }
        out
    }

    #[inline]
    fn expand_into(&self, distance: f64, out: &mut Vec<f64>) {
        let var_sq = self.variance * self.variance;
        out.extend(self.centers.iter().map(|&center| {
            let diff = distance - center;
            (-diff * diff / var_sq).exp()
        }));
    }
}
