// src/metrics.rs
//! Detection of canonical financial metrics in an extracted table.

use crate::similarity::TextSimilarityScorer;
use crate::table::UnifiedTable;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, error, info};

/// Default minimum score; a label must score strictly above it.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// The fixed vocabulary of financial-statement line items we recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalMetric {
    Revenue,
    Expenses,
    Profit,
    Assets,
    Liabilities,
    Equity,
    CashFlow,
}

impl CanonicalMetric {
    /// Enumeration order; earlier entries win score ties.
    pub const ALL: [Self; 7] = [
        Self::Revenue,
        Self::Expenses,
        Self::Profit,
        Self::Assets,
        Self::Liabilities,
        Self::Equity,
        Self::CashFlow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Revenue => "Revenue",
            Self::Expenses => "Expenses",
            Self::Profit => "Profit",
            Self::Assets => "Assets",
            Self::Liabilities => "Liabilities",
            Self::Equity => "Equity",
            Self::CashFlow => "Cash Flow",
        }
    }
}

impl fmt::Display for CanonicalMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A cell value: a number when the text parsed as one, else the cleaned text.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Number parsing
// ---------------------------------------------------------------------------

static CURRENCY_AND_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[$₹£€\s]").expect("static regex"));

/// Parse a formatted amount such as `$1,234.50` or `(500)`.
///
/// Commas are always thousands separators, so European formats like
/// `€1.000,00` come out wrong.
pub fn parse_number(text: &str) -> MetricValue {
    let mut cleaned = CURRENCY_AND_SPACE.replace_all(text.trim(), "").into_owned();

    let negative = cleaned.len() >= 2 && cleaned.starts_with('(') && cleaned.ends_with(')');
    if negative {
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }

    cleaned = cleaned.replace(',', "");
    if negative {
        cleaned.insert(0, '-');
    }

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => MetricValue::Number(v),
        _ => MetricValue::Text(cleaned),
    }
}

// ---------------------------------------------------------------------------
// Metric table
// ---------------------------------------------------------------------------

/// Period → value, in first-written order. Overwrites keep their position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodValues(Vec<(String, MetricValue)>);

impl PeriodValues {
    pub fn insert(&mut self, period: &str, value: MetricValue) {
        match self.0.iter_mut().find(|(p, _)| p == period) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((period.to_string(), value)),
        }
    }

    pub fn get(&self, period: &str) -> Option<&MetricValue> {
        self.0.iter().find(|(p, _)| p == period).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.0.iter().map(|(p, v)| (p.as_str(), v))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for PeriodValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (period, value) in &self.0 {
            map.serialize_entry(period, value)?;
        }
        map.end()
    }
}

/// Canonical metric → period values, in first-detected order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricTable {
    entries: Vec<(CanonicalMetric, PeriodValues)>,
}

impl MetricTable {
    /// Values for `metric`, created empty on first use.
    pub fn entry(&mut self, metric: CanonicalMetric) -> &mut PeriodValues {
        let idx = match self.entries.iter().position(|(m, _)| *m == metric) {
            Some(idx) => idx,
            None => {
                self.entries.push((metric, PeriodValues::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }

    #[cfg(test)]
    pub fn get(&self, metric: CanonicalMetric) -> Option<&PeriodValues> {
        self.entries
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, v)| v)
    }

    pub fn metrics(&self) -> Vec<CanonicalMetric> {
        self.entries.iter().map(|(m, _)| *m).collect()
    }

    /// Union of all periods, in first-seen order.
    pub fn periods(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for (_, values) in &self.entries {
            for (period, _) in values.iter() {
                if !out.contains(&period) {
                    out.push(period);
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One line per metric, used as language-model context.
    pub fn to_context(&self) -> String {
        if self.is_empty() {
            return "none".to_string();
        }
        self.entries
            .iter()
            .map(|(metric, values)| {
                let cells: Vec<String> = values.iter().map(|(p, v)| format!("{p} = {v}")).collect();
                format!("{metric}: {}", cells.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Serialize for MetricTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (metric, values) in &self.entries {
            map.serialize_entry(metric.name(), values)?;
        }
        map.end()
    }
}

/// Aligned text table: metric rows × period columns.
impl fmt::Display for MetricTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let periods = self.periods();
        let mut grid: Vec<Vec<String>> = Vec::with_capacity(self.entries.len() + 1);
        grid.push(
            std::iter::once("Metric".to_string())
                .chain(periods.iter().map(|p| p.to_string()))
                .collect(),
        );
        for (metric, values) in &self.entries {
            grid.push(
                std::iter::once(metric.name().to_string())
                    .chain(periods.iter().map(|p| {
                        values.get(p).map(ToString::to_string).unwrap_or_default()
                    }))
                    .collect(),
            );
        }

        let widths: Vec<usize> = (0..=periods.len())
            .map(|c| grid.iter().map(|r| r[c].chars().count()).max().unwrap_or(0))
            .collect();

        for (i, row) in grid.iter().enumerate() {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, w)| format!("{cell:<w$}"))
                .collect();
            writeln!(f, "{}", line.join(" | ").trim_end())?;
            if i == 0 {
                let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
                writeln!(f, "{}", rule.join("-+-"))?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Matching + summarizing
// ---------------------------------------------------------------------------

/// Best canonical metric for `text` and its score.
///
/// Ties keep the earlier metric. A scorer failure yields `(None, 0.0)`.
pub async fn match_metric(
    text: &str,
    scorer: &dyn TextSimilarityScorer,
) -> (Option<CanonicalMetric>, f64) {
    let text = text.to_lowercase();
    let mut best_match = None;
    let mut best_score = 0.0;

    for metric in CanonicalMetric::ALL {
        match scorer.similarity(&text, &metric.name().to_lowercase()).await {
            Ok(score) if score > best_score => {
                best_match = Some(metric);
                best_score = score;
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, label = %text, "Error matching metric");
                return (None, 0.0);
            }
        }
    }

    debug!(label = %text, matched = ?best_match, score = format!("{best_score:.2}"), "Matched metric");
    (best_match, best_score)
}

#[derive(Error, Debug)]
pub enum SummarizeError {
    #[error("row {row} has no cell for column {column}")]
    MissingCell { row: usize, column: usize },
}

/// Scan every row's first cell for a canonical metric and collect the rest of
/// the row under it, keyed by column name.
///
/// Later rows overwrite earlier values for the same metric and period. A row
/// that cannot be processed stops the scan; what was gathered so far is kept.
pub async fn summarize(
    table: &UnifiedTable,
    scorer: &dyn TextSimilarityScorer,
    threshold: f64,
) -> MetricTable {
    let mut acc = MetricTable::default();
    if table.is_empty() {
        return acc;
    }

    for (idx, row) in table.rows().iter().enumerate() {
        if let Err(e) = accumulate_row(&mut acc, table.columns(), idx, row, scorer, threshold).await
        {
            error!(error = %e, "Error summarizing financials; keeping partial result");
            break;
        }
    }

    info!(metrics = ?acc.metrics(), "Financial metrics summarized");
    acc
}

async fn accumulate_row(
    acc: &mut MetricTable,
    columns: &[String],
    idx: usize,
    row: &[String],
    scorer: &dyn TextSimilarityScorer,
    threshold: f64,
) -> Result<(), SummarizeError> {
    let label = row
        .first()
        .ok_or(SummarizeError::MissingCell { row: idx, column: 0 })?
        .trim();

    let (Some(metric), score) = match_metric(label, scorer).await else {
        return Ok(());
    };
    if score <= threshold {
        return Ok(());
    }

    let values = acc.entry(metric);
    for (col, period) in columns.iter().enumerate().skip(1) {
        let cell = row
            .get(col)
            .ok_or(SummarizeError::MissingCell { row: idx, column: col })?
            .trim();
        if !cell.is_empty() {
            values.insert(period, parse_number(cell));
        }
    }
    Ok(())
}
