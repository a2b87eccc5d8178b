//! Printable pay-stub rendering.
//!
//! Renders the submitted checks into a self-contained HTML document; the
//! conversion to PDF and its delivery belong to the external export
//! service.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tera::{Context, Tera};

use paydeck_core::domain::check::Check;
use paydeck_core::payroll::{compute_display, PayBreakdown};
use paydeck_core::week::{iso_week_label, WeekKey};

use crate::print::{CheckExporter, ExportError};

const STUB_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Check run {{ week_key }}</title></head>
<body>
<h1>Check run for the week of {{ week_key }} ({{ week_label }})</h1>
{% for row in rows %}
<section class="check">
  <h2>#{{ row.check_number }} {{ row.employee_name }} ({{ row.date }})</h2>
  <table>
    {% for line in row.breakdown.lines %}
    <tr>
      <td>{{ line.label }}</td>
      <td>{{ line.quantity }}</td>
      <td>{{ line.rate | money }}</td>
      <td>{{ line.subtotal | money }}</td>
    </tr>
    {% endfor %}
    <tr><td colspan="3">Computed</td><td>{{ row.breakdown.computed_total | money }}</td></tr>
    <tr><td colspan="3">Amount</td><td>{{ row.breakdown.stored_amount | money }}</td></tr>
  </table>
</section>
{% endfor %}
</body>
</html>
"#;

/// 2-decimal money formatting. Usage: `amount | money`.
fn money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let num = match value {
        tera::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        tera::Value::String(s) => s.parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(tera::Value::String(format!("{num:.2}")))
}

#[derive(Serialize)]
struct StubRow {
    check_number: i64,
    employee_name: String,
    date: NaiveDate,
    breakdown: PayBreakdown,
}

pub struct HtmlStubExporter {
    tera: Tera,
}

impl HtmlStubExporter {
    pub fn new() -> Result<Self, ExportError> {
        let mut tera = Tera::default();
        tera.register_filter("money", money_filter);
        tera.add_raw_template("check_run.html", STUB_TEMPLATE)
            .map_err(|error| ExportError::Template(error.to_string()))?;
        Ok(Self { tera })
    }
}

#[async_trait]
impl CheckExporter for HtmlStubExporter {
    async fn export(&self, checks: &[Check], week_key: WeekKey) -> Result<Vec<u8>, ExportError> {
        let rows: Vec<StubRow> = checks
            .iter()
            .map(|check| StubRow {
                check_number: check.check_number,
                employee_name: check.employee_name.clone(),
                date: check.date,
                breakdown: compute_display(check),
            })
            .collect();

        let mut context = Context::new();
        context.insert("week_key", &week_key);
        context.insert("week_label", &iso_week_label(week_key.sunday()));
        context.insert("rows", &rows);

        let html = self
            .tera
            .render("check_run.html", &context)
            .map_err(|error| ExportError::Render(error.to_string()))?;
        Ok(html.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use paydeck_db::fixtures::demo_dataset;

    use super::HtmlStubExporter;
    use crate::print::CheckExporter;

    #[tokio::test]
    async fn renders_every_submitted_check() {
        let dataset = demo_dataset().expect("dataset");
        let exporter = HtmlStubExporter::new().expect("exporter");
        let week = dataset.checks[0].week_key();

        let bytes = exporter
            .export(&dataset.checks[0..3], week)
            .await
            .expect("render");
        let html = String::from_utf8(bytes).expect("utf8");

        assert!(html.contains("Dana Reeve"));
        assert!(html.contains("Sam Okafor"));
        assert!(html.contains("Lee Tran"));
        assert!(html.contains("950.00"));
        assert!(html.contains("2026-08-02"));
        // ISO label appears as display text only
        assert!(html.contains("2026-W31"));
    }
}
