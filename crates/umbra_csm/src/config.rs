//! Cascade Configuration
//!
//! Tunable cascade settings with serde support for hot-reload. Validation is
//! strict: a configuration that fails here is a programming error and the
//! pipeline refuses to start.
//!
//! # Example Config File
//!
//! ```toml
//! cascade_count = 3
//! resolution = 4096
//! depth_margin = 100.0
//! blend_distance = 20.0
//! clamp_mode = "border"
//!
//! [split_scheme]
//! scheme = "manual"
//! breakpoints = [400.0, 1000.0]
//!
//! [polygon_offset]
//! factor = 1.125
//! units = 2
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShadowError};

/// Maximum supported cascade count
pub const MAX_CASCADES: usize = 4;

/// Smallest accepted shadow map resolution
pub const MIN_RESOLUTION: u32 = 16;

/// Largest accepted shadow map resolution
pub const MAX_RESOLUTION: u32 = 16384;

/// How the camera depth range is divided between cascades
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum SplitScheme {
    /// Fixed interior breakpoints in view-space distance
    Manual { breakpoints: Vec<f32> },
    /// Evenly spaced in view space
    Uniform,
    /// Geometric spacing (uniform in screen space)
    Logarithmic,
    /// Blend of logarithmic and uniform (0 = uniform, 1 = logarithmic)
    Practical { lambda: f32 },
}

impl Default for SplitScheme {
    fn default() -> Self {
        Self::Manual {
            breakpoints: vec![400.0, 1000.0],
        }
    }
}

/// Addressing for lookups that fall outside a cascade's shadow map
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowClampMode {
    /// Repeat the outermost texel
    Edge,
    /// Resolve to a constant lit (or shadowed) value
    #[default]
    Border,
}

/// Slope-scaled depth offset applied while rendering casters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolygonOffset {
    /// Slope scale
    pub factor: f32,
    /// Constant offset in depth-buffer units
    pub units: i32,
}

impl Default for PolygonOffset {
    fn default() -> Self {
        Self {
            factor: 1.125,
            units: 2,
        }
    }
}

/// Directional cascaded shadow configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Number of cascades (1-4)
    pub cascade_count: u32,

    /// Shadow map resolution per cascade layer
    pub resolution: u32,

    /// Light-space depth margin added on both ends of every cascade
    pub depth_margin: f32,

    /// Quantize cascade rectangles to the shadow-map texel grid
    pub texel_snap: bool,

    /// Width of the depth band blended across each cascade seam
    pub blend_distance: f32,

    /// Comparison epsilon used by the shading pass
    pub depth_epsilon: f32,

    /// Addressing outside a cascade's map
    pub clamp_mode: ShadowClampMode,

    /// Treat lookups outside the map as shadowed instead of lit
    pub border_shadowed: bool,

    /// Linear (hardware 2x2) comparison filtering instead of nearest
    pub hardware_pcf: bool,

    /// Split scheme
    pub split_scheme: SplitScheme,

    /// Depth bias for the caster pipeline (None disables it)
    pub polygon_offset: Option<PolygonOffset>,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            cascade_count: 3,
            resolution: 4096,
            depth_margin: 100.0,
            texel_snap: true,
            blend_distance: 20.0,
            depth_epsilon: 0.0005,
            clamp_mode: ShadowClampMode::Border,
            border_shadowed: false,
            hardware_pcf: false,
            split_scheme: SplitScheme::default(),
            polygon_offset: Some(PolygonOffset::default()),
        }
    }
}

impl CascadeConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        log::info!("Loaded cascade config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Number of cascades as an index bound
    pub fn count(&self) -> usize {
        self.cascade_count as usize
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let count = self.count();
        if count == 0 || count > MAX_CASCADES {
            return Err(invalid(format!(
                "cascade_count must be in 1..={MAX_CASCADES}, got {count}"
            )));
        }

        if !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&self.resolution) {
            return Err(invalid(format!(
                "resolution must be in {MIN_RESOLUTION}..={MAX_RESOLUTION}, got {}",
                self.resolution
            )));
        }

        if !self.depth_margin.is_finite() || self.depth_margin < 0.0 {
            return Err(invalid(format!(
                "depth_margin must be finite and non-negative, got {}",
                self.depth_margin
            )));
        }

        if !self.blend_distance.is_finite() || self.blend_distance < 0.0 {
            return Err(invalid(format!(
                "blend_distance must be finite and non-negative, got {}",
                self.blend_distance
            )));
        }

        if !self.depth_epsilon.is_finite() || self.depth_epsilon < 0.0 {
            return Err(invalid(format!(
                "depth_epsilon must be finite and non-negative, got {}",
                self.depth_epsilon
            )));
        }

        if let Some(offset) = &self.polygon_offset {
            if !offset.factor.is_finite() {
                return Err(invalid("polygon_offset.factor must be finite".into()));
            }
        }

        match &self.split_scheme {
            SplitScheme::Manual { breakpoints } => {
                if breakpoints.len() + 1 != count {
                    return Err(invalid(format!(
                        "{} manual breakpoints given for {} cascades (need {})",
                        breakpoints.len(),
                        count,
                        count - 1
                    )));
                }
                if breakpoints.iter().any(|b| !b.is_finite() || *b <= 0.0) {
                    return Err(invalid(
                        "manual breakpoints must be finite and positive".into(),
                    ));
                }
                if breakpoints.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(invalid(
                        "manual breakpoints must be strictly increasing".into(),
                    ));
                }
            }
            SplitScheme::Practical { lambda } => {
                if !(0.0..=1.0).contains(lambda) {
                    return Err(invalid(format!(
                        "practical split lambda must be in [0, 1], got {lambda}"
                    )));
                }
            }
            SplitScheme::Uniform | SplitScheme::Logarithmic => {}
        }

        Ok(())
    }
}

fn invalid(message: String) -> ShadowError {
    ShadowError::InvalidConfiguration(message)
}
