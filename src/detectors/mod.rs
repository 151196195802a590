//! Pattern detectors
//!
//! # Detector Families
//!
//! - **Candlestick (4)**: Doji, Hammer, Shooting Star, Engulfing
//! - **Chart (5)**: Head and Shoulders (with inverse), Double Top, Double Bottom,
//!   Triangle, Flag
//! - **Template Grid (1)**: adapter over [`TemplateGridEngine`](crate::grid::TemplateGridEngine)

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod candlestick;
pub mod chart;
pub mod template;

// Re-export all detectors for convenience
pub use candlestick::*;
pub use chart::*;
pub use helpers::*;
pub use template::*;
