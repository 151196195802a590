//! Parameter metadata for pattern detectors
//!
//! Tunable detectors describe their thresholds here, enabling:
//! - Grid search over detector thresholds
//! - Parameter documentation
//! - Construction from a plain name/value map
//!
//! # Example
//!
//! ```rust
//! use gridpat::params::{ParamMeta, ParamType, ParameterizedDetector};
//! use gridpat::prelude::*;
//!
//! for param in FlagDetector::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use crate::{Error, Period, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Fraction in 0.0..=1.0
  Ratio,
  /// Positive multiplier, may exceed 1.0
  Factor,
  /// Positive integer
  Period,
}

/// Metadata for a single detector parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "min_symmetry")
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Range for optimization: (min, max, step)
  pub range: (f64, f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  pub const fn factor(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Factor, default, range, description }
  }

  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// Generate all values for grid search
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    if step <= 0.0 {
      return values;
    }
    let mut v = min;
    while v <= max + f64::EPSILON {
      values.push(v);
      v += step;
    }
    values
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value < min || value > max {
      return Err(Error::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio if value > 1.0 => Err(Error::InvalidValue("Ratio must be <= 1.0")),
      ParamType::Factor if value <= 0.0 => Err(Error::InvalidValue("Factor must be > 0")),
      ParamType::Period if value < 1.0 || value.fract() != 0.0 => {
        Err(Error::InvalidValue("Period must be a positive integer"))
      },
      _ => Ok(()),
    }
  }
}

// ============================================================
// PARAMETERIZED DETECTOR TRAIT
// ============================================================

/// Detectors whose thresholds can be enumerated and overridden
pub trait ParameterizedDetector: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a detector with parameters from a map.
  ///
  /// Missing parameters use their default values.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// Detector name as used for scan filtering
  fn pattern_id_str() -> &'static str;
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Get a positive finite multiplier from params with default fallback
pub fn get_factor(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<f64> {
  let value = params.get(key).copied().unwrap_or(default);
  if !value.is_finite() || value <= 0.0 {
    return Err(Error::InvalidValue("Factor must be finite and > 0"));
  }
  Ok(value)
}

/// Get a Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if value < 0.0 || value.fract() != 0.0 {
    return Err(Error::InvalidValue("Period must be a positive integer"));
  }
  Period::new(value as usize)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detectors::{FlagDetector, HammerDetector};

  #[test]
  fn test_param_meta_constructors() {
    let meta = ParamMeta::factor("head_factor", 1.1, (1.0, 1.5, 0.1), "Head extent");
    assert_eq!(meta.param_type, ParamType::Factor);
    assert_eq!(meta.default, 1.1);
    assert_eq!(ParamMeta::period("order", 3.0, (2.0, 5.0, 1.0), "").param_type, ParamType::Period);
  }

  #[test]
  fn test_generate_grid() {
    let meta = ParamMeta::ratio("test", 0.5, (0.3, 0.7, 0.2), "Test");

    let grid = meta.generate_grid();
    assert_eq!(grid.len(), 3);
    assert!((grid[0] - 0.3).abs() < f64::EPSILON);
    assert!((grid[2] - 0.7).abs() < 1e-12);
  }

  #[test]
  fn test_validate() {
    let ratio = ParamMeta::ratio("test", 0.5, (0.3, 0.7, 0.1), "Test");
    assert!(ratio.validate(0.5).is_ok());
    assert!(ratio.validate(0.2).is_err());

    let period = ParamMeta::period("test", 14.0, (10.0, 20.0, 2.0), "Test");
    assert!(period.validate(14.0).is_ok());
    assert!(period.validate(14.5).is_err());
    assert!(period.validate(22.0).is_err());
  }

  #[test]
  fn test_value_helpers() {
    let mut params = HashMap::new();
    params.insert("ratio", 0.8);
    params.insert("factor", 2.5);
    params.insert("period", 20.0);
    params.insert("bad_period", 2.5);

    assert!((get_ratio(&params, "ratio", 0.5).unwrap().get() - 0.8).abs() < f64::EPSILON);
    assert!((get_ratio(&params, "missing", 0.5).unwrap().get() - 0.5).abs() < f64::EPSILON);
    assert_eq!(get_factor(&params, "factor", 1.0).unwrap(), 2.5);
    assert!(get_factor(&params, "missing", -1.0).is_err());
    assert_eq!(get_period(&params, "period", 14).unwrap().get(), 20);
    assert!(get_period(&params, "bad_period", 14).is_err());
  }

  #[test]
  fn test_every_default_is_in_range() {
    for meta in FlagDetector::param_meta().iter().chain(HammerDetector::param_meta()) {
      assert!(meta.validate(meta.default).is_ok(), "{} default out of range", meta.name);
    }
  }

  #[test]
  fn test_with_params_rejects_bad_ratio() {
    let mut params = HashMap::new();
    params.insert("max_flag_ratio", 1.5);
    assert!(FlagDetector::with_params(&params).is_err());
  }
}
