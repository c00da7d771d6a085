//! Human-readable summaries of a probability row.
//!
//! A report turns one row of class probabilities into labelled
//! percentages, the dominant class, and optionally a bar chart rendered
//! to SVG and base64-encoded for embedding.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ndarray::ArrayView1;
use plotters::prelude::*;
use serde::Serialize;
use thiserror::Error;

/// Display label per class, indexed by dense class label.
pub const CLASS_LABELS: [&str; 4] = ["0 Days", "1-13 Days", "14+ Days", "Unsure"];

const CHART_SIZE: (u32, u32) = (640, 420);

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("expected {expected} probabilities, got {got}")]
    WrongWidth { expected: usize, got: usize },
    #[error("chart rendering failed: {0}")]
    Chart(String),
}

/// Summary of one scored item.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Percentage per class, formatted with two decimals, keyed by
    /// [`CLASS_LABELS`] order.
    pub percentages: Vec<(String, String)>,
    /// Label of the most probable class.
    pub dominant: String,
    /// Base64-encoded SVG bar chart, present when plotting was asked for.
    pub chart: Option<String>,
}

/// Build a report from one probability row.
pub fn build_report(probabilities: ArrayView1<f32>, plot: bool) -> Result<Report, ReportError> {
    if probabilities.len() != CLASS_LABELS.len() {
        return Err(ReportError::WrongWidth {
            expected: CLASS_LABELS.len(),
            got: probabilities.len(),
        });
    }

    let percentages: Vec<f64> = probabilities.iter().map(|&p| f64::from(p) * 100.0).collect();
    let dominant_idx = percentages
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);

    let chart = if plot {
        Some(render_chart(&percentages, dominant_idx)?)
    } else {
        None
    };

    Ok(Report {
        percentages: CLASS_LABELS
            .iter()
            .zip(&percentages)
            .map(|(label, pct)| (label.to_string(), format!("{pct:.2}")))
            .collect(),
        dominant: CLASS_LABELS[dominant_idx].to_string(),
        chart,
    })
}

/// Render the percentages as an SVG bar chart, dominant bar highlighted.
fn render_chart(percentages: &[f64], dominant_idx: usize) -> Result<String, ReportError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(|e| ReportError::Chart(e.to_string()))?;

        let y_max = percentages.iter().cloned().fold(0.0f64, f64::max).max(1.0) * 1.1;
        let mut chart = ChartBuilder::on(&root)
            .caption("Predicted days of poor mental health", ("sans-serif", 22))
            .margin(10)
            .x_label_area_size(36)
            .y_label_area_size(48)
            .build_cartesian_2d(0usize..CLASS_LABELS.len(), 0.0f64..y_max)
            .map_err(|e| ReportError::Chart(e.to_string()))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(CLASS_LABELS.len())
            .x_label_formatter(&|i| {
                CLASS_LABELS.get(*i).copied().unwrap_or_default().to_string()
            })
            .y_desc("probability (%)")
            .draw()
            .map_err(|e| ReportError::Chart(e.to_string()))?;

        chart
            .draw_series(percentages.iter().enumerate().map(|(i, &pct)| {
                let color = if i == dominant_idx {
                    RGBColor(220, 60, 60).filled()
                } else {
                    RGBColor(160, 160, 160).filled()
                };
                Rectangle::new([(i, 0.0), (i + 1, pct)], color)
            }))
            .map_err(|e| ReportError::Chart(e.to_string()))?;

        root.present().map_err(|e| ReportError::Chart(e.to_string()))?;
    }
    Ok(BASE64.encode(svg.as_bytes()))
}

// =============================================================================
// Tests
// =============================================================================
