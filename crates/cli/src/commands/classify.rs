//! Classification commands

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, PredictRequest, PredictResponse, RetrainStatus};
use crate::output::{
    color_confidence, format_flag, print_json, print_rows, print_success, print_warning,
    FieldRow, OutputFormat,
};

/// Classify a piece of text
pub async fn predict(client: &ApiClient, text: String, format: OutputFormat) -> Result<()> {
    let result: PredictResponse = client.post("predict", &PredictRequest { text }).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_rows(vec![
                FieldRow::new("Prediction", result.prediction.to_string().bold().to_string()),
                FieldRow::new("Confidence", color_confidence(result.confidence)),
                FieldRow::new("Low confidence alert", format_flag(result.alert_triggered)),
                FieldRow::new("Retrain triggered", format_flag(result.retrain_triggered)),
            ]);

            if result.retrain_triggered {
                print_warning("Confidence fell below the retrain threshold; retraining was requested");
            } else if result.alert_triggered {
                print_warning("Low confidence prediction recorded in the alert log");
            }
        }
    }

    Ok(())
}

/// Request a manual retrain
pub async fn retrain(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: RetrainStatus = client.post_empty("trigger_retrain").await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_success(&result.status),
    }

    Ok(())
}
