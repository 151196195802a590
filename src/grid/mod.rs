//! Template Grid pattern matching
//!
//! Price windows are discretised into Pattern Identification Codes and
//! compared against a library of historically profitable shapes. A match
//! carries a trading decision derived from the pattern's stored predicate
//! accuracies.

pub mod decision;
pub mod engine;
pub mod pattern;
pub mod pic;

pub use decision::{
    classify_trend, has_forecasting_power, make_trading_decision, passes_pip_filter,
    passes_price_band, trend_behavior, Prediction, TrendClass, FORECASTING_THRESHOLD,
    PREDICATE_COUNT,
};
pub use engine::{LibraryStats, PatternMatch, TemplateGridEngine, TimeframeStats, TopPerformer, MIN_SIMILARITY};
pub use pattern::TemplateGridPattern;
pub use pic::{pic_similarity, prices_to_pic, similarity, weight_similarity, weights_from_pic, Weights};
