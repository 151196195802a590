//! Library patterns
//!
//! Stored rows carry their list-valued columns as JSON text; decoding checks
//! that the PIC, grid and weight matrix agree before a pattern can be matched.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::decision::{has_forecasting_power, FORECASTING_THRESHOLD, PREDICATE_COUNT};
use super::pic::{weights_from_pic, Weights};
use crate::store::TemplateRecord;
use crate::timeframe::Timeframe;
use crate::{Error, Result};

/// A validated Template Grid library entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateGridPattern {
    pub id: i64,
    pub pic: Vec<usize>,
    /// `(rows, cols)`
    pub grid_size: (usize, usize),
    pub weights: Weights,
    pub timeframe: Timeframe,
    pub creation_method: String,
    pub prediction_accuracy: f64,
    pub has_forecasting_power: bool,
    /// Historical hit rates of the ten directional predicates
    pub predicate_accuracies: Vec<f64>,
    pub trades_taken: i64,
    pub successful_trades: i64,
    pub total_pnl: f64,
}

fn decode<T: DeserializeOwned>(id: i64, column: &str, text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| Error::MalformedLibraryEntry {
        id,
        reason: format!("{column}: {e}"),
    })
}

impl TemplateGridPattern {
    /// Decode and validate a stored row
    pub fn from_record(record: &TemplateRecord) -> Result<Self> {
        let id = record.id;
        let [rows, cols]: [usize; 2] = decode(id, "grid_size", &record.grid_size)?;
        let timeframe = record
            .timeframe
            .parse::<Timeframe>()
            .map_err(|e| Error::MalformedLibraryEntry { id, reason: e.to_string() })?;

        let pattern = Self {
            id,
            pic: decode(id, "pic", &record.pic)?,
            grid_size: (rows, cols),
            weights: decode(id, "weights", &record.weights)?,
            timeframe,
            creation_method: record.creation_method.clone(),
            prediction_accuracy: record.prediction_accuracy,
            has_forecasting_power: record.has_forecasting_power,
            predicate_accuracies: decode(id, "predicate_accuracies", &record.predicate_accuracies)?,
            trades_taken: record.trades_taken,
            successful_trades: record.successful_trades,
            total_pnl: record.total_pnl,
        };
        pattern.validate()?;
        Ok(pattern)
    }

    /// Build a pattern from a PIC, deriving its weight matrix.
    ///
    /// Trade history starts empty; forecasting power follows the predicates.
    pub fn from_pic(
        id: i64,
        pic: Vec<usize>,
        grid_size: (usize, usize),
        timeframe: Timeframe,
        predicate_accuracies: Vec<f64>,
        prediction_accuracy: f64,
    ) -> Result<Self> {
        let pattern = Self {
            id,
            weights: weights_from_pic(&pic),
            has_forecasting_power: has_forecasting_power(&predicate_accuracies, FORECASTING_THRESHOLD),
            pic,
            grid_size,
            timeframe,
            creation_method: "pic".to_string(),
            prediction_accuracy,
            predicate_accuracies,
            trades_taken: 0,
            successful_trades: 0,
            total_pnl: 0.0,
        };
        pattern.validate()?;
        Ok(pattern)
    }

    pub fn with_trades(mut self, taken: i64, successful: i64, pnl: f64) -> Self {
        self.trades_taken = taken;
        self.successful_trades = successful;
        self.total_pnl = pnl;
        self
    }

    /// Check that the PIC, grid, weights and predicates agree
    pub fn validate(&self) -> Result<()> {
        let malformed = |reason: String| Err(Error::MalformedLibraryEntry { id: self.id, reason });
        let (rows, cols) = self.grid_size;

        if rows == 0 || cols == 0 {
            return malformed(format!("empty grid {rows}x{cols}"));
        }
        if self.pic.len() != cols {
            return malformed(format!("pic has {} columns, grid has {cols}", self.pic.len()));
        }
        if let Some(&row) = self.pic.iter().find(|&&r| r >= rows) {
            return malformed(format!("pic row {row} outside grid of {rows} rows"));
        }
        let expected_rows = self.pic.iter().max().map_or(0, |&r| r + 1);
        if self.weights.len() != expected_rows {
            return malformed(format!(
                "weights have {} rows, pic needs {expected_rows}",
                self.weights.len()
            ));
        }
        if let Some(row) = self.weights.iter().find(|r| r.len() != cols) {
            return malformed(format!("weight row has {} columns, grid has {cols}", row.len()));
        }
        // one-hot: each column is 1 at its pic row and 0 elsewhere
        for (col, &pic_row) in self.pic.iter().enumerate() {
            let off = self
                .weights
                .iter()
                .enumerate()
                .find(|(row, w)| w[col] != if *row == pic_row { 1.0 } else { 0.0 });
            if let Some((row, _)) = off {
                return malformed(format!("weight at row {row} column {col} disagrees with pic"));
            }
        }
        if self.predicate_accuracies.len() != PREDICATE_COUNT {
            return malformed(format!(
                "expected {PREDICATE_COUNT} predicate accuracies, got {}",
                self.predicate_accuracies.len()
            ));
        }
        if !self.prediction_accuracy.is_finite() {
            return malformed("prediction_accuracy is not finite".to_string());
        }
        Ok(())
    }

    /// Loadable into an engine requiring `min_accuracy`
    pub fn is_eligible(&self, min_accuracy: f64) -> bool {
        self.has_forecasting_power && self.prediction_accuracy > min_accuracy
    }

    /// Window length this pattern needs
    pub fn window_len(&self) -> usize {
        self.grid_size.1
    }

    pub fn success_rate(&self) -> f64 {
        if self.trades_taken > 0 {
            self.successful_trades as f64 / self.trades_taken as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Encode back into the stored row shape
    pub fn to_record(&self) -> Result<TemplateRecord> {
        Ok(TemplateRecord {
            id: self.id,
            pic: serde_json::to_string(&self.pic)?,
            grid_size: serde_json::to_string(&[self.grid_size.0, self.grid_size.1])?,
            weights: serde_json::to_string(&self.weights)?,
            timeframe: self.timeframe.to_string(),
            creation_method: self.creation_method.clone(),
            prediction_accuracy: self.prediction_accuracy,
            has_forecasting_power: self.has_forecasting_power,
            predicate_accuracies: serde_json::to_string(&self.predicate_accuracies)?,
            trades_taken: self.trades_taken,
            successful_trades: self.successful_trades,
            total_pnl: self.total_pnl,
        })
    }
}
