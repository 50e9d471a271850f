//! Monitoring commands: metrics summary and service health

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::client::{ApiClient, HealthResponse, MetricsSummary, ReadinessResponse};
use crate::output::{
    color_confidence, color_status, print_info, print_json, print_rows, FieldRow, OutputFormat,
};

/// Row for the component health table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

#[derive(Serialize)]
struct HealthReport {
    health: HealthResponse,
    readiness: ReadinessResponse,
}

/// Show the prediction metrics summary
pub async fn show_metrics(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let summary: MetricsSummary = client.get("metrics").await?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            println!("{}", "Prediction Metrics".bold());

            let (Some(avg), Some(min), Some(low)) = (
                summary.avg_confidence,
                summary.min_confidence,
                summary.low_confidence_count,
            ) else {
                print_info("No predictions recorded yet");
                return Ok(());
            };

            print_rows(vec![
                FieldRow::new("Total predictions", summary.total_predictions.to_string()),
                FieldRow::new("Average confidence", color_confidence(avg)),
                FieldRow::new("Minimum confidence", color_confidence(min)),
                FieldRow::new("Low confidence count", low.to_string()),
            ]);
        }
    }

    Ok(())
}

/// Show service health and readiness; fails when the service is not serving
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health): (_, HealthResponse) = client.get_health_endpoint("healthz").await?;
    let (_, readiness): (_, ReadinessResponse) = client.get_health_endpoint("readyz").await?;

    let serving = health.status != "unhealthy" && readiness.ready;

    match format {
        OutputFormat::Json => print_json(&HealthReport {
            health: health.clone(),
            readiness: readiness.clone(),
        })?,
        OutputFormat::Table => {
            let ready = if readiness.ready { "ready" } else { "not ready" };
            println!("Status:    {}", color_status(&health.status));
            println!("Readiness: {}", color_status(ready));
            if let Some(reason) = &readiness.reason {
                println!("Reason:    {}", reason);
            }
            println!();

            let mut rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&component.status),
                    message: component.message.clone().unwrap_or_default(),
                    last_check: format_timestamp(component.last_check_timestamp),
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            print_rows(rows);
        }
    }

    if !serving {
        anyhow::bail!("Service is not serving requests");
    }

    Ok(())
}

/// Format a unix timestamp for display
fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}
