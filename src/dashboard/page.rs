//! HTML page rendering

use super::form::{upper_bound, FieldKind, FutureCustomerForm, FORM_FIELDS};
use super::{CustomerView, FutureView, ImportanceView, Page, View, ViewMode};
use crate::error::DashboardError;
use crate::models::loader::ReferenceStats;
use std::fmt::Write;

/// Escape text for HTML element content and quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 2em; background: #f5f5f5; color: #222; }
.card { background: white; border-radius: 8px; padding: 1.5em; margin: 1em 0; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
h1 { color: #333; } h2 { color: #555; margin-top: 0; }
.probability { font-size: 2em; font-weight: bold; color: #2563eb; }
.error { border-left: 4px solid #dc2626; }
form.fields { display: grid; grid-template-columns: 220px 260px; gap: 0.4em 1em; }
table.encoded td { padding: 2px 10px; border-bottom: 1px solid #eee; }
"#;

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="UTF-8"><title>{}</title>
<style>{}</style></head><body>
<h1>Telco Customer Churn Project</h1>
{}
</body></html>"#,
        escape_html(title),
        STYLE,
        body
    )
}

fn mode_selector(out: &mut String, current: ViewMode) {
    out.push_str(r#"<div class="card"><form method="get" action="/" class="modes"><h2>Make Your Choice:</h2>"#);
    for mode in ViewMode::ALL {
        let _ = write!(
            out,
            r#"<label><input type="radio" name="mode" value="{}"{} onchange="this.form.submit()"> {}</label><br>"#,
            mode.slug(),
            if mode == current { " checked" } else { "" },
            escape_html(mode.label())
        );
    }
    out.push_str(r#"<noscript><button type="submit">Show</button></noscript></form></div>"#);
}

/// Render a successfully built page.
pub fn render(page: &Page) -> String {
    let mut body = String::new();
    mode_selector(&mut body, page.mode);
    match &page.view {
        View::Importance(view) => importance(&mut body, view),
        View::Customer(view) => customer(&mut body, view, &page.customer_ids),
        View::Future(view) => future(&mut body, view),
    }
    layout(page.mode.label(), &body)
}

/// Render a failed render pass.
pub fn render_error(error: &DashboardError) -> String {
    let mut body = String::new();
    mode_selector(&mut body, ViewMode::default());
    let _ = write!(
        body,
        r#"<div class="card error"><h2>Error: {}</h2><p>{}</p></div>"#,
        error.kind(),
        escape_html(&error.to_string())
    );
    layout("Error", &body)
}

fn importance(out: &mut String, view: &ImportanceView) {
    let _ = write!(
        out,
        r#"<div class="card"><h2>Feature Importance</h2>{}</div>"#,
        view.chart
    );
}

fn customer(out: &mut String, view: &CustomerView, ids: &[String]) {
    out.push_str(r#"<div class="card"><form method="get" action="/"><input type="hidden" name="mode" value="customer">"#);
    out.push_str(r#"<label>Choose the Customer <select name="customer_id" onchange="this.form.submit()">"#);
    for id in ids {
        let _ = write!(
            out,
            r#"<option value="{0}"{1}>{0}</option>"#,
            escape_html(id),
            if *id == view.customer_id { " selected" } else { "" }
        );
    }
    out.push_str(r#"</select></label><noscript><button type="submit">Show</button></noscript></form></div>"#);

    let _ = write!(
        out,
        r#"<div class="card"><h2>Customer {}:</h2>
<p>Actual value for the Customer Churn : <span class="actual">{}</span></p>
<p>Prediction for the Customer Churn Probability : <span class="probability">{}</span></p>
<p>Prediction for the Customer Churn : <span class="predicted">{}</span></p></div>
<div class="card"><h2>Decision plot</h2>{}</div>
<div class="card"><h2>Waterfall plot</h2>{}</div>"#,
        escape_html(&view.customer_id),
        view.actual,
        view.prediction.percent(),
        view.prediction.label,
        view.decision_chart,
        view.waterfall_chart
    );
}

fn form_inputs(out: &mut String, form: &FutureCustomerForm, bounds: &ReferenceStats) {
    for f in &FORM_FIELDS {
        let current = form.value(f.name).unwrap_or_default();
        let _ = write!(out, r#"<label for="{0}">{1}</label>"#, f.name, escape_html(f.label));
        match f.kind {
            FieldKind::Choice(options) => {
                let _ = write!(out, r#"<select id="{0}" name="{0}">"#, f.name);
                for option in options {
                    let _ = write!(
                        out,
                        r#"<option{}>{}</option>"#,
                        if *option == current { " selected" } else { "" },
                        escape_html(option)
                    );
                }
                out.push_str("</select>");
            }
            FieldKind::Integer | FieldKind::Decimal => {
                let step = if f.kind == FieldKind::Integer { "1" } else { "0.01" };
                let max = upper_bound(bounds, f.column).unwrap_or(0.0);
                let _ = write!(
                    out,
                    r#"<input type="number" id="{0}" name="{0}" min="0" max="{1}" step="{2}" value="{3}">"#,
                    f.name,
                    max,
                    step,
                    escape_html(current)
                );
            }
        }
    }
}

fn future(out: &mut String, view: &FutureView) {
    out.push_str(r#"<div class="card"><h2>Future customer prediction</h2><form method="post" action="/predict" class="fields">"#);
    form_inputs(out, &view.form, &view.bounds);
    out.push_str(r#"<span></span><button type="submit" name="confirm" value="1">Confirm</button></form></div>"#);

    if let Some(scored) = &view.result {
        let _ = write!(
            out,
            r#"<div class="card"><h1>Churn Probability: <span class="probability">{}</span></h1><table class="encoded">"#,
            scored.prediction.percent()
        );
        for (column, value) in scored.encoded_pairs() {
            let _ = write!(
                out,
                "<tr><td>{}</td><td>{}</td></tr>",
                escape_html(&column),
                escape_html(&value)
            );
        }
        out.push_str("</table></div>");
    }
}
