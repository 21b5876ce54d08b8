//! Frustum splitting
//!
//! Partitions the camera depth range into contiguous cascade intervals.

use crate::config::SplitScheme;
use crate::error::{Result, ShadowError};

/// Computes cascade split distances for a split scheme
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrustumSplitter {
    scheme: SplitScheme,
}

impl FrustumSplitter {
    pub fn new(scheme: SplitScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> &SplitScheme {
        &self.scheme
    }

    /// Split `[near, far]` into `count` intervals.
    ///
    /// Returns `count + 1` strictly increasing distances; the first is
    /// exactly `near` and the last exactly `far`.
    pub fn compute_splits(&self, near: f32, far: f32, count: usize) -> Result<Vec<f32>> {
        if count == 0 {
            return Err(ShadowError::InvalidConfiguration(
                "cascade count must be at least 1".into(),
            ));
        }
        if !near.is_finite() || !far.is_finite() || near >= far {
            return Err(ShadowError::InvalidConfiguration(format!(
                "split range [{near}, {far}] is empty"
            )));
        }

        let mut splits = Vec::with_capacity(count + 1);
        splits.push(near);

        match &self.scheme {
            SplitScheme::Manual { breakpoints } => {
                if breakpoints.len() + 1 != count {
                    return Err(ShadowError::InvalidConfiguration(format!(
                        "{} manual breakpoints cannot split {} cascades",
                        breakpoints.len(),
                        count
                    )));
                }
                splits.extend_from_slice(breakpoints);
            }
            SplitScheme::Uniform => {
                splits.extend((1..count).map(|i| uniform_split(near, far, i, count)));
            }
            SplitScheme::Logarithmic => {
                require_positive_near(near)?;
                splits.extend((1..count).map(|i| log_split(near, far, i, count)));
            }
            SplitScheme::Practical { lambda } => {
                require_positive_near(near)?;
                let lambda = lambda.clamp(0.0, 1.0);
                splits.extend((1..count).map(|i| {
                    lambda * log_split(near, far, i, count)
                        + (1.0 - lambda) * uniform_split(near, far, i, count)
                }));
            }
        }

        splits.push(far);

        if splits.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ShadowError::InvalidConfiguration(format!(
                "splits {splits:?} are not strictly increasing within [{near}, {far}]"
            )));
        }

        Ok(splits)
    }
}

fn uniform_split(near: f32, far: f32, i: usize, count: usize) -> f32 {
    let p = i as f32 / count as f32;
    near + (far - near) * p
}

fn log_split(near: f32, far: f32, i: usize, count: usize) -> f32 {
    let p = i as f32 / count as f32;
    near * (far / near).powf(p)
}

fn require_positive_near(near: f32) -> Result<()> {
    if near <= 0.0 {
        return Err(ShadowError::InvalidConfiguration(format!(
            "logarithmic splits need a positive near plane, got {near}"
        )));
    }
    Ok(())
}
