//! Aggregate views over the emissions tables. Every function here is pure.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::dataset::{ContinentRecord, EmissionRecord};
use super::quarter::QuarterLabel;

/// Running arithmetic mean.
#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterlyTotal {
    pub quarter: QuarterLabel,
    pub mean_emissions: f64,
}

/// Mean emissions per quarter label, Q1 first. Labels with no values are omitted.
pub fn quarterly_totals(records: &[EmissionRecord]) -> Vec<QuarterlyTotal> {
    let mut groups: BTreeMap<QuarterLabel, Mean> = BTreeMap::new();
    for record in records {
        if let Some(value) = record.emissions {
            groups.entry(record.quarter.label).or_default().add(value);
        }
    }

    groups
        .into_iter()
        .filter_map(|(quarter, mean)| {
            mean.value().map(|mean_emissions| QuarterlyTotal {
                quarter,
                mean_emissions,
            })
        })
        .collect()
}

/// Year × quarter-label pivot of mean emissions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnualQuarterMatrix {
    pub years: Vec<i32>,
    pub quarters: Vec<QuarterLabel>,
    /// `cells[row][col]` for `years[row]`, `quarters[col]`; `None` where no row matched.
    pub cells: Vec<Vec<Option<f64>>>,
}

impl AnnualQuarterMatrix {
    pub fn cell(&self, year: i32, quarter: QuarterLabel) -> Option<f64> {
        let row = self.years.iter().position(|y| *y == year)?;
        let col = self.quarters.iter().position(|q| *q == quarter)?;
        self.cells[row][col]
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

pub fn annual_quarter_matrix(records: &[EmissionRecord]) -> AnnualQuarterMatrix {
    let mut groups: BTreeMap<(i32, QuarterLabel), Mean> = BTreeMap::new();
    for record in records {
        if let Some(value) = record.emissions {
            groups
                .entry((record.quarter.year, record.quarter.label))
                .or_default()
                .add(value);
        }
    }

    let years: Vec<i32> = groups.keys().map(|(y, _)| *y).collect::<BTreeSet<_>>().into_iter().collect();
    let quarters: Vec<QuarterLabel> = groups.keys().map(|(_, q)| *q).collect::<BTreeSet<_>>().into_iter().collect();

    let cells = years
        .iter()
        .map(|year| {
            quarters
                .iter()
                .map(|quarter| groups.get(&(*year, *quarter)).and_then(Mean::value))
                .collect()
        })
        .collect();

    AnnualQuarterMatrix {
        years,
        quarters,
        cells,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub period: NaiveDate,
    pub emissions: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GasSeries {
    pub gas_type: String,
    pub points: Vec<SeriesPoint>,
}

/// One series per gas type in first-seen order, each sorted by period.
/// Rows with equal periods keep their input order.
pub fn gas_type_series(records: &[EmissionRecord]) -> Vec<GasSeries> {
    let mut series: Vec<GasSeries> = Vec::new();
    for record in records {
        let Some(emissions) = record.emissions else {
            continue;
        };
        let point = SeriesPoint {
            period: record.quarter.date,
            emissions,
        };
        match series.iter_mut().find(|s| s.gas_type == record.gas_type) {
            Some(existing) => existing.points.push(point),
            None => series.push(GasSeries {
                gas_type: record.gas_type.clone(),
                points: vec![point],
            }),
        }
    }

    for s in &mut series {
        s.points.sort_by_key(|p| p.period);
    }
    series
}

/// Label/value payload consumed by the choropleth. A `None` value (serialized as
/// `null`) keeps its continent on the map as "no data".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoroplethPayload {
    pub labels: Vec<String>,
    pub data: Vec<Option<f64>>,
}

impl ChoroplethPayload {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Rows whose quarter equals `quarter` exactly, in input order.
pub fn continent_snapshot(records: &[ContinentRecord], quarter: &str) -> ChoroplethPayload {
    let mut payload = ChoroplethPayload::default();
    for record in records.iter().filter(|r| r.quarter == quarter) {
        payload.labels.push(record.continent.clone());
        payload.data.push(record.emission_rate);
    }
    payload
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContinentFrame {
    pub quarter: String,
    #[serde(flatten)]
    pub payload: ChoroplethPayload,
}

/// One snapshot per distinct quarter, in first-seen order, for animating the map.
pub fn continent_frames(records: &[ContinentRecord]) -> Vec<ContinentFrame> {
    let mut quarters: Vec<&str> = Vec::new();
    for record in records {
        if !quarters.contains(&record.quarter.as_str()) {
            quarters.push(&record.quarter);
        }
    }

    quarters
        .into_iter()
        .map(|quarter| ContinentFrame {
            quarter: quarter.to_string(),
            payload: continent_snapshot(records, quarter),
        })
        .collect()
}
