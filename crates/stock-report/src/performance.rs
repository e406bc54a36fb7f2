//! Price-change statistics and the performance table

use crate::api::PriceSeries;
use crate::symbols::SymbolSet;
use comfy_table::presets::ASCII_MARKDOWN;
use comfy_table::{CellAlignment, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Change statistics for one symbol, in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub symbol: String,
    /// Change between the first two closes
    pub initial_change: f64,
    /// Sum of successive close-to-close changes over the window
    pub period_change: f64,
}

impl PerformanceRecord {
    /// `None` when fewer than two valid closes are given
    pub fn from_closes(symbol: impl Into<String>, closes: &[f64]) -> Option<Self> {
        let [first, second, ..] = closes else {
            return None;
        };

        let initial = (second - first) / first;
        let period: f64 = closes.windows(2).map(|w| (w[1] - w[0]) / w[0]).sum();

        Some(Self {
            symbol: symbol.into(),
            initial_change: round_percent(initial),
            period_change: round_percent(period),
        })
    }
}

fn round_percent(fraction: f64) -> f64 {
    (fraction * 100.0 * 100.0).round() / 100.0
}

/// One record per symbol with enough data, in symbol-set order
///
/// Symbols that are missing or have fewer than two valid closes are
/// dropped with a warning.
pub fn compute(symbols: &SymbolSet, series: &HashMap<String, PriceSeries>) -> Vec<PerformanceRecord> {
    symbols
        .distinct()
        .into_iter()
        .filter_map(|symbol| {
            let Some(s) = series.get(&symbol) else {
                warn!("No data found for {}", symbol);
                return None;
            };

            let record = PerformanceRecord::from_closes(&symbol, &s.valid_closes());
            match &record {
                Some(r) => debug!(
                    "Data processed for {}: {}% / {}%",
                    symbol, r.initial_change, r.period_change
                ),
                None => warn!("Insufficient data for {}", symbol),
            }
            record
        })
        .collect()
}

/// Markdown table of records; `window_label` names the period column
pub fn render_table(records: &[PerformanceRecord], window_label: &str) -> String {
    let mut table = Table::new();
    table.load_preset(ASCII_MARKDOWN).set_header(vec![
        "Symbol".to_string(),
        "Initial % Change".to_string(),
        format!("{window_label} % Change"),
    ]);

    for record in records {
        table.add_row(vec![
            record.symbol.clone(),
            format!("{:.2}", record.initial_change),
            format!("{:.2}", record.period_change),
        ]);
    }

    for index in 1..=2 {
        if let Some(column) = table.column_mut(index) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }

    table.to_string()
}
