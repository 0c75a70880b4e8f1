//! Emissions aggregation - loads the emissions tables and derives chart views
pub mod aggregate;
pub mod artifacts;
pub mod dataset;
pub mod quarter;

pub use aggregate::{
    annual_quarter_matrix, continent_frames, continent_snapshot, gas_type_series, quarterly_totals,
    AnnualQuarterMatrix, ChoroplethPayload, ContinentFrame, GasSeries, QuarterlyTotal,
};
pub use artifacts::{write_artifacts, ArtifactSet, ChartRenderer, JsonChartRenderer};
pub use dataset::{ContinentRecord, DatasetError, EmissionRecord, EmissionsSource};
pub use quarter::{CalendarQuarter, QuarterLabel};

use serde::Serialize;
use std::time::Instant;
use tracing::info;

use crate::metrics;

/// Everything the dashboard page and its chart collaborators consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardData {
    pub quarterly_totals: Vec<QuarterlyTotal>,
    pub annual_matrix: AnnualQuarterMatrix,
    pub gas_series: Vec<GasSeries>,
    pub choropleth_quarter: String,
    pub choropleth: ChoroplethPayload,
    pub continent_frames: Vec<ContinentFrame>,
}

pub struct EmissionsAggregator {
    source: EmissionsSource,
}

impl EmissionsAggregator {
    pub fn new(source: EmissionsSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &EmissionsSource {
        &self.source
    }

    /// Loads both tables and computes every view. Any schema problem aborts the build.
    pub fn build(&self, choropleth_quarter: &str) -> Result<DashboardData, DatasetError> {
        let started = Instant::now();

        let records = self.source.load_emissions()?;
        let continents = self.source.load_continents()?;

        let data = DashboardData {
            quarterly_totals: quarterly_totals(&records),
            annual_matrix: annual_quarter_matrix(&records),
            gas_series: gas_type_series(&records),
            choropleth_quarter: choropleth_quarter.to_string(),
            choropleth: continent_snapshot(&continents, choropleth_quarter),
            continent_frames: continent_frames(&continents),
        };

        let elapsed = started.elapsed().as_secs_f64();
        metrics::observe_dashboard_build(elapsed);
        info!(
            "Built dashboard from {} emission rows and {} continent rows in {:.3}s",
            records.len(),
            continents.len(),
            elapsed
        );
        Ok(data)
    }
}
