//! Chart artifacts written to the static directory.
//!
//! Rasterising charts is left to whatever implements [`ChartRenderer`]; the
//! bundled renderer writes the chart spec as JSON for client-side drawing.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::aggregate::ChoroplethPayload;
use super::DashboardData;

pub const UNIT_LABEL: &str = "MtCO₂e";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Heatmap,
    Line,
    Choropleth,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: &'static str,
    pub x_label: &'static str,
    pub y_label: &'static str,
    #[serde(skip)]
    pub file_stem: &'static str,
    pub data: Value,
}

pub trait ChartRenderer: Send + Sync {
    /// Writes `chart` under `dir` and returns the file name it used.
    fn render(&self, chart: &ChartSpec, dir: &Path) -> anyhow::Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonChartRenderer;

impl ChartRenderer for JsonChartRenderer {
    fn render(&self, chart: &ChartSpec, dir: &Path) -> anyhow::Result<String> {
        let file_name = format!("{}.json", chart.file_stem);
        write_json(&dir.join(&file_name), chart)?;
        Ok(file_name)
    }
}

/// File names of everything written for one dashboard build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactSet {
    pub bar_chart: String,
    pub heatmap: String,
    pub line_chart: String,
    pub choropleth: String,
    pub choropleth_frames: String,
}

pub fn chart_specs(data: &DashboardData) -> anyhow::Result<Vec<ChartSpec>> {
    Ok(vec![
        ChartSpec {
            kind: ChartKind::Bar,
            title: "Quarterly Greenhouse Gas Emissions",
            x_label: "Quarter",
            y_label: "Emissions (MtCO₂e)",
            file_stem: "emissions_bar",
            data: serde_json::to_value(&data.quarterly_totals)?,
        },
        ChartSpec {
            kind: ChartKind::Heatmap,
            title: "Annual-Quarterly Emissions Patterns",
            x_label: "Quarter",
            y_label: "Year",
            file_stem: "emissions_heatmap",
            data: serde_json::to_value(&data.annual_matrix)?,
        },
        ChartSpec {
            kind: ChartKind::Line,
            title: "Quarterly GHG Emissions Trends",
            x_label: "Quarter",
            y_label: "Emissions (MtCO₂e)",
            file_stem: "quarterly_trends",
            data: serde_json::to_value(&data.gas_series)?,
        },
    ])
}

/// Writes the three chart specs, the single-quarter choropleth payload and the
/// per-quarter frames.
pub fn write_artifacts(
    data: &DashboardData,
    renderer: &dyn ChartRenderer,
    static_dir: &Path,
) -> anyhow::Result<ArtifactSet> {
    fs::create_dir_all(static_dir)
        .with_context(|| format!("Failed to create static dir {}", static_dir.display()))?;

    let mut rendered = Vec::with_capacity(3);
    for spec in chart_specs(data)? {
        rendered.push(renderer.render(&spec, static_dir)?);
    }
    let [bar_chart, heatmap, line_chart]: [String; 3] = rendered
        .try_into()
        .map_err(|_| anyhow::anyhow!("Renderer produced an unexpected number of charts"))?;

    let choropleth = choropleth_file_name(&data.choropleth_quarter);
    write_choropleth_payload(&static_dir.join(&choropleth), &data.choropleth)?;

    let choropleth_frames = "continent_frames.json".to_string();
    let frames = ChoroplethFrames {
        kind: ChartKind::Choropleth,
        title: "Quarterly CO₂ Emissions by Continent",
        unit: UNIT_LABEL,
        frames: &data.continent_frames,
    };
    write_json(&static_dir.join(&choropleth_frames), &frames)?;

    info!("Wrote dashboard artifacts to {}", static_dir.display());
    Ok(ArtifactSet {
        bar_chart,
        heatmap,
        line_chart,
        choropleth,
        choropleth_frames,
    })
}

#[derive(Serialize)]
struct ChoroplethFrames<'a> {
    kind: ChartKind,
    title: &'static str,
    unit: &'static str,
    frames: &'a [super::aggregate::ContinentFrame],
}

/// `emissions_<quarter>.json`, keeping only characters safe in a file name.
pub fn choropleth_file_name(quarter: &str) -> String {
    let safe: String = quarter
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    format!("emissions_{}.json", safe)
}

/// Plain `{"labels": [...], "data": [...]}` with two-space indentation.
pub fn write_choropleth_payload(path: &Path, payload: &ChoroplethPayload) -> anyhow::Result<()> {
    write_json(path, payload)
}

/// Writes through a temp file in the same directory and renames it into place,
/// so a concurrent reader sees either the old file or the new one.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let dir = path
        .parent()
        .with_context(|| format!("No parent directory for {}", path.display()))?;

    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to stage {}", path.display()))?;
    staged.write_all(&bytes)?;
    staged.flush()?;
    staged
        .persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emissions::aggregate::{AnnualQuarterMatrix, ContinentFrame, QuarterlyTotal};
    use crate::emissions::quarter::QuarterLabel;

    fn sample_data() -> DashboardData {
        let payload = ChoroplethPayload {
            labels: vec!["Asia".to_string(), "Europe".to_string()],
            data: vec![Some(20.0), Some(5.0)],
        };
        DashboardData {
            quarterly_totals: vec![QuarterlyTotal {
                quarter: QuarterLabel::Q1,
                mean_emissions: 3.0,
            }],
            annual_matrix: AnnualQuarterMatrix {
                years: vec![2023],
                quarters: vec![QuarterLabel::Q1],
                cells: vec![vec![Some(3.0)]],
            },
            gas_series: Vec::new(),
            choropleth_quarter: "2024Q2".to_string(),
            choropleth: payload.clone(),
            continent_frames: vec![ContinentFrame {
                quarter: "2024Q2".to_string(),
                payload,
            }],
        }
    }

    #[test]
    fn test_write_artifacts_lays_out_static_dir() {
        let dir = tempfile::tempdir().unwrap();
        let static_dir = dir.path().join("static");

        let set = write_artifacts(&sample_data(), &JsonChartRenderer, &static_dir).unwrap();
        assert_eq!(set.bar_chart, "emissions_bar.json");
        assert_eq!(set.heatmap, "emissions_heatmap.json");
        assert_eq!(set.line_chart, "quarterly_trends.json");
        assert_eq!(set.choropleth, "emissions_2024Q2.json");

        let bar: Value = serde_json::from_slice(&fs::read(static_dir.join(&set.bar_chart)).unwrap()).unwrap();
        assert_eq!(bar["kind"], "bar");
        assert_eq!(bar["title"], "Quarterly Greenhouse Gas Emissions");
        assert_eq!(bar["data"][0]["quarter"], "Q1");

        let raw = fs::read_to_string(static_dir.join(&set.choropleth)).unwrap();
        assert_eq!(
            raw,
            "{\n  \"labels\": [\n    \"Asia\",\n    \"Europe\"\n  ],\n  \"data\": [\n    20.0,\n    5.0\n  ]\n}"
        );
    }

    #[test]
    fn test_rewrite_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let static_dir = dir.path().join("static");
        let data = sample_data();

        write_artifacts(&data, &JsonChartRenderer, &static_dir).unwrap();
        fs::write(static_dir.join("emissions_2024Q2.json"), b"{\"labels\": [\"stale").unwrap();
        let set = write_artifacts(&data, &JsonChartRenderer, &static_dir).unwrap();

        let parsed: ChoroplethPayload =
            serde_json::from_slice(&fs::read(static_dir.join(&set.choropleth)).unwrap()).unwrap();
        assert_eq!(parsed, data.choropleth);

        let mut names: Vec<String> = fs::read_dir(&static_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "continent_frames.json",
                "emissions_2024Q2.json",
                "emissions_bar.json",
                "emissions_heatmap.json",
                "quarterly_trends.json",
            ]
        );
    }

    #[test]
    fn test_choropleth_file_name_strips_path_characters() {
        assert_eq!(choropleth_file_name("2024Q2"), "emissions_2024Q2.json");
        assert_eq!(choropleth_file_name("../../etc/passwd"), "emissions_etcpasswd.json");
    }

    #[test]
    fn test_empty_payload_still_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emissions_2030Q1.json");
        write_choropleth_payload(&path, &ChoroplethPayload::default()).unwrap();
        let parsed: ChoroplethPayload = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert!(parsed.is_empty());
    }
}
