//! HTML pages. Layout is deliberately plain; the charts themselves are drawn
//! client-side from the JSON embedded in the dashboard page.

use axum::{extract::State, response::Html};
use serde::Serialize;
use tracing::debug;

use super::error::ApiError;
use crate::emissions::{write_artifacts, ArtifactSet, DashboardData};
use crate::metrics;
use crate::shared_state::AppState;

const NAV: [(&str, &str); 4] = [
    ("/", "Home"),
    ("/Introduction", "Introduction"),
    ("/Access_data", "Access data"),
    ("/Contact", "Contact"),
];

pub async fn home() -> Html<String> {
    metrics::inc_request("home", "ok");
    Html(layout(
        "Greenhouse Gas Emissions Dashboard",
        "<p>Quarterly greenhouse gas emissions, broken down by gas type and continent.</p>\
         <p><a href=\"/Access_data\">Open the dashboard</a></p>",
    ))
}

pub async fn introduction() -> Html<String> {
    metrics::inc_request("introduction", "ok");
    Html(layout(
        "Introduction",
        "<p>The figures come from a cleaned quarterly emissions table measured in MtCO₂e. \
         Quarters are grouped by calendar quarter and averaged with an unweighted mean.</p>",
    ))
}

pub async fn contact() -> Html<String> {
    metrics::inc_request("contact", "ok");
    Html(layout(
        "Contact",
        "<p>Questions about the data or the dashboard can be raised with the maintainers.</p>",
    ))
}

#[derive(Serialize)]
struct EmbeddedDashboard<'a> {
    data: &'a DashboardData,
    artifacts: &'a ArtifactSet,
}

/// Aggregates the emissions tables, refreshes the static artifacts and renders
/// the dashboard. A schema problem in the source data fails the request.
pub async fn access_data(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let data = match state.aggregator.build(&state.config.choropleth_quarter) {
        Ok(data) => data,
        Err(e) => {
            metrics::inc_request("access_data", "error");
            return Err(e.into());
        }
    };
    let artifacts = write_artifacts(&data, state.renderer.as_ref(), &state.config.static_dir)?;
    debug!("Dashboard artifacts: {:?}", artifacts);

    let embedded = script_safe_json(&EmbeddedDashboard {
        data: &data,
        artifacts: &artifacts,
    })?;

    let mut body = String::new();
    body.push_str(&quarterly_table(&data));
    body.push_str(&heatmap_table(&data));
    if data.choropleth.is_empty() {
        body.push_str(&format!(
            "<p>No continent data for {}.</p>",
            escape_html(&data.choropleth_quarter)
        ));
    }
    body.push_str("<h2>Downloads</h2><ul>");
    for file in [
        &artifacts.bar_chart,
        &artifacts.heatmap,
        &artifacts.line_chart,
        &artifacts.choropleth,
        &artifacts.choropleth_frames,
    ] {
        let file = escape_html(file);
        body.push_str(&format!("<li><a href=\"/static/{0}\">{0}</a></li>", file));
    }
    body.push_str("</ul>");
    body.push_str(&format!(
        "<script type=\"application/json\" id=\"dashboard-data\">{}</script>",
        embedded
    ));

    metrics::inc_request("access_data", "ok");
    Ok(Html(layout("Emissions Dashboard", &body)))
}

fn quarterly_table(data: &DashboardData) -> String {
    let mut html = String::from(
        "<h2>Quarterly Greenhouse Gas Emissions</h2><table><tr><th>Quarter</th><th>Mean emissions (MtCO₂e)</th></tr>",
    );
    for total in &data.quarterly_totals {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{:.1}</td></tr>",
            total.quarter, total.mean_emissions
        ));
    }
    html.push_str("</table>");
    html
}

fn heatmap_table(data: &DashboardData) -> String {
    let matrix = &data.annual_matrix;
    let mut html = String::from("<h2>Annual-Quarterly Emissions Patterns</h2><table><tr><th>Year</th>");
    for quarter in &matrix.quarters {
        html.push_str(&format!("<th>{}</th>", quarter));
    }
    html.push_str("</tr>");
    for (year, row) in matrix.years.iter().zip(&matrix.cells) {
        html.push_str(&format!("<tr><th>{}</th>", year));
        for cell in row {
            match cell {
                Some(value) => html.push_str(&format!("<td>{:.1}</td>", value)),
                None => html.push_str("<td></td>"),
            }
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}

fn layout(title: &str, body: &str) -> String {
    let nav: String = NAV
        .iter()
        .map(|(href, label)| format!("<a href=\"{}\">{}</a>", href, label))
        .collect::<Vec<_>>()
        .join(" | ");
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><nav>{nav}</nav><h1>{title}</h1>{body}</body></html>",
        title = escape_html(title),
        nav = nav,
        body = body,
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON that cannot terminate the surrounding `<script>` element.
fn script_safe_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string(value)?.replace('<', "\\u003c"))
}
