//! SVG renderers for the dashboard plots
//!
//! Each plot is split into a pure layout step (testable data) and a render
//! step producing a standalone `<svg>` element.

use super::page::escape_html;
use crate::explain::FeatureImportance;
use crate::models::forest::sigmoid;
use std::fmt::Write;

const POSITIVE: &str = "#ff0d57";
const NEGATIVE: &str = "#1e88e5";
const WIDTH: f64 = 760.0;
const LABEL_WIDTH: f64 = 230.0;
const ROW_HEIGHT: f64 = 24.0;
const MARGIN: f64 = 30.0;

/// Linear map of `[lo, hi]` onto the plot area right of the labels.
struct Axis {
    lo: f64,
    hi: f64,
}

impl Axis {
    fn new(lo: f64, hi: f64) -> Self {
        if (hi - lo).abs() < f64::EPSILON {
            Self {
                lo: lo - 0.5,
                hi: hi + 0.5,
            }
        } else {
            Self { lo, hi }
        }
    }

    fn x(&self, value: f64) -> f64 {
        let span = WIDTH - LABEL_WIDTH - 2.0 * MARGIN;
        LABEL_WIDTH + MARGIN + (value - self.lo) / (self.hi - self.lo) * span
    }
}

fn svg_open(out: &mut String, class: &str, height: f64) {
    let _ = write!(
        out,
        r#"<svg class="{}" xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}" font-family="sans-serif" font-size="12">"#,
        class, WIDTH, height, WIDTH, height
    );
}

/// Ranked horizontal bar chart, one `rect.bar` per feature.
pub fn importance_bar_chart(ranked: &[FeatureImportance]) -> String {
    let height = ranked.len() as f64 * ROW_HEIGHT + 2.0 * MARGIN;
    let max = ranked.iter().map(|f| f.value).fold(0.0, f64::max);
    let axis = Axis::new(0.0, if max > 0.0 { max } else { 1.0 });

    let mut out = String::new();
    svg_open(&mut out, "importance", height);
    for (i, item) in ranked.iter().enumerate() {
        let y = MARGIN + i as f64 * ROW_HEIGHT;
        let x0 = axis.x(0.0);
        let _ = write!(
            out,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{}</text><rect class="bar" x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/><text x="{:.1}" y="{:.1}">{:.4}</text>"#,
            LABEL_WIDTH,
            y + ROW_HEIGHT * 0.65,
            escape_html(&item.feature),
            x0,
            y + 3.0,
            (axis.x(item.value) - x0).max(0.0),
            ROW_HEIGHT - 6.0,
            NEGATIVE,
            axis.x(item.value) + 4.0,
            y + ROW_HEIGHT * 0.65,
            item.value,
        );
    }
    let _ = write!(
        out,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">mean(|SHAP value|)</text></svg>"#,
        axis.x((axis.lo + axis.hi) / 2.0),
        height - 8.0
    );
    out
}

/// Feature attributions of one record, with what the record holds for each feature.
pub struct RecordAttribution<'a> {
    pub baseline: f64,
    pub phi: &'a [f64],
    pub names: &'a [String],
    pub display_values: &'a [String],
}

impl RecordAttribution<'_> {
    fn label(&self, i: usize) -> String {
        match self.display_values.get(i) {
            Some(v) => format!("{} = {}", self.names[i], v),
            None => self.names[i].clone(),
        }
    }

    pub fn output(&self) -> f64 {
        self.baseline + self.phi.iter().sum::<f64>()
    }
}

/// One step of the decision path: feature label and the margin after adding it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionStep {
    pub label: String,
    pub margin: f64,
}

/// Cumulative margins starting at the baseline, adding features by increasing |phi|.
pub fn decision_path(record: &RecordAttribution<'_>) -> Vec<DecisionStep> {
    let mut order: Vec<usize> = (0..record.phi.len()).collect();
    order.sort_by(|&a, &b| record.phi[a].abs().total_cmp(&record.phi[b].abs()));

    let mut margin = record.baseline;
    order
        .into_iter()
        .map(|i| {
            margin += record.phi[i];
            DecisionStep {
                label: record.label(i),
                margin,
            }
        })
        .collect()
}

/// Decision plot with a logit link: x is `sigmoid(margin)`, the last step on top.
pub fn decision_plot(record: &RecordAttribution<'_>) -> String {
    let steps = decision_path(record);
    let height = steps.len() as f64 * ROW_HEIGHT + 3.0 * MARGIN;
    let probs: Vec<f64> = std::iter::once(record.baseline)
        .chain(steps.iter().map(|s| s.margin))
        .map(sigmoid)
        .collect();
    let lo = probs.iter().copied().fold(f64::INFINITY, f64::min).min(0.5);
    let hi = probs.iter().copied().fold(f64::NEG_INFINITY, f64::max).max(0.5);
    let axis = Axis::new(lo, hi);
    let bottom = MARGIN + steps.len() as f64 * ROW_HEIGHT;

    let mut out = String::new();
    svg_open(&mut out, "decision", height);
    let base_x = axis.x(sigmoid(record.baseline));
    let _ = write!(
        out,
        r##"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="#999" stroke-dasharray="4 3"/>"##,
        base_x, MARGIN, base_x, bottom
    );

    let mut points = format!("{:.1},{:.1}", base_x, bottom);
    // Steps are drawn bottom-up so the final output sits at the top.
    for (i, step) in steps.iter().enumerate() {
        let y = bottom - (i as f64 + 1.0) * ROW_HEIGHT;
        let _ = write!(points, " {:.1},{:.1}", axis.x(probs[i + 1]), y);
        let _ = write!(
            out,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{}</text>"#,
            LABEL_WIDTH,
            y + 4.0,
            escape_html(&step.label)
        );
    }
    let final_color = if record.output() >= record.baseline {
        POSITIVE
    } else {
        NEGATIVE
    };
    let _ = write!(
        out,
        r#"<polyline class="path" points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
        points, final_color
    );
    for (value, anchor) in [(lo, "start"), (hi, "end")] {
        let _ = write!(
            out,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="{}">{:.3}</text>"#,
            axis.x(value),
            bottom + 16.0,
            anchor,
            value
        );
    }
    let _ = write!(
        out,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">Model output (probability), base {:.3}</text></svg>"#,
        axis.x((lo + hi) / 2.0),
        height - 8.0,
        sigmoid(record.baseline)
    );
    out
}

/// One row of the waterfall, in display order (largest |value| first).
#[derive(Debug, Clone, PartialEq)]
pub struct WaterfallRow {
    pub label: String,
    pub value: f64,
    pub start: f64,
    pub end: f64,
}

/// Waterfall layout with at most `max_display` rows.
///
/// When there are more features than rows, the smallest ones are folded into
/// a single "N other features" row at the bottom.
pub fn waterfall_rows(record: &RecordAttribution<'_>, max_display: usize) -> Vec<WaterfallRow> {
    let mut order: Vec<usize> = (0..record.phi.len()).collect();
    order.sort_by(|&a, &b| record.phi[b].abs().total_cmp(&record.phi[a].abs()));

    let max_display = max_display.max(1);
    let (shown, folded) = if order.len() > max_display {
        order.split_at(max_display - 1)
    } else {
        (&order[..], &[][..])
    };

    // Accumulate from the bottom row upwards.
    let mut rows = Vec::with_capacity(shown.len() + 1);
    let mut cursor = record.baseline;
    if !folded.is_empty() {
        let value: f64 = folded.iter().map(|&i| record.phi[i]).sum();
        rows.push(WaterfallRow {
            label: format!("{} other features", folded.len()),
            value,
            start: cursor,
            end: cursor + value,
        });
        cursor += value;
    }
    for &i in shown.iter().rev() {
        let value = record.phi[i];
        rows.push(WaterfallRow {
            label: record.label(i),
            value,
            start: cursor,
            end: cursor + value,
        });
        cursor += value;
    }
    rows.reverse();
    rows
}

/// Waterfall plot from `E[f(X)]` at the bottom to `f(x)` at the top.
pub fn waterfall_plot(record: &RecordAttribution<'_>, max_display: usize) -> String {
    let rows = waterfall_rows(record, max_display);
    let height = rows.len() as f64 * ROW_HEIGHT + 3.0 * MARGIN;
    let lo = rows
        .iter()
        .flat_map(|r| [r.start, r.end])
        .fold(record.baseline, f64::min);
    let hi = rows
        .iter()
        .flat_map(|r| [r.start, r.end])
        .fold(record.baseline, f64::max);
    let axis = Axis::new(lo, hi);

    let mut out = String::new();
    svg_open(&mut out, "waterfall", height);
    let _ = write!(
        out,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">f(x) = {:.3}</text>"#,
        axis.x(record.output()),
        MARGIN - 10.0,
        record.output()
    );
    for (i, row) in rows.iter().enumerate() {
        let y = MARGIN + i as f64 * ROW_HEIGHT;
        let (x0, x1) = (axis.x(row.start.min(row.end)), axis.x(row.start.max(row.end)));
        let color = if row.value >= 0.0 { POSITIVE } else { NEGATIVE };
        let _ = write!(
            out,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{}</text><rect class="step" x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/><text x="{:.1}" y="{:.1}">{:+.3}</text>"#,
            LABEL_WIDTH,
            y + ROW_HEIGHT * 0.65,
            escape_html(&row.label),
            x0,
            y + 3.0,
            (x1 - x0).max(1.0),
            ROW_HEIGHT - 6.0,
            color,
            x1 + 4.0,
            y + ROW_HEIGHT * 0.65,
            row.value
        );
    }
    let bottom = MARGIN + rows.len() as f64 * ROW_HEIGHT;
    let _ = write!(
        out,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle">E[f(X)] = {:.3}</text></svg>"#,
        axis.x(record.baseline),
        bottom + 16.0,
        record.baseline
    );
    out
}
