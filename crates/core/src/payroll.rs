//! Display-side pay computation.
//!
//! The stored check amount is settled once when the check is written and
//! stays authoritative. Everything here re-derives a line-item breakdown
//! for presentation; totals can disagree with the stored amount for
//! estimated per-diem splits, and that disagreement is surfaced rather
//! than hidden.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::domain::check::{Check, PayStructure, PayType, PerdiemBreakdown, RelationshipDetail};

/// One displayable pay line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PayLine {
    pub label: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub subtotal: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PayBreakdown {
    pub lines: Vec<PayLine>,
    /// Presentation-only recomputation of the lines.
    pub computed_total: Decimal,
    /// The settled amount from the check record; always shown alongside.
    pub stored_amount: Decimal,
}

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn ot_multiplier() -> Decimal {
    Decimal::new(15, 1)
}

fn line(label: impl Into<String>, quantity: Decimal, rate: Decimal) -> PayLine {
    PayLine { label: label.into(), quantity, rate, subtotal: round_money(quantity * rate) }
}

fn hourly_lines(
    prefix: Option<&str>,
    hours: Decimal,
    ot_hours: Decimal,
    holiday_hours: Decimal,
    rate: Decimal,
) -> Vec<PayLine> {
    let (regular, overtime, holiday) = match prefix {
        Some(prefix) => (
            format!("{prefix} regular"),
            format!("{prefix} overtime"),
            format!("{prefix} holiday"),
        ),
        None => ("Regular".to_string(), "Overtime".to_string(), "Holiday".to_string()),
    };

    let mut lines = Vec::new();
    if hours > Decimal::ZERO {
        lines.push(line(regular, hours, rate));
    }
    if ot_hours > Decimal::ZERO {
        lines.push(line(overtime, ot_hours, round_money(rate * ot_multiplier())));
    }
    if holiday_hours > Decimal::ZERO {
        lines.push(line(holiday, holiday_hours, round_money(rate * Decimal::TWO)));
    }
    lines
}

fn perdiem_line(label: impl Into<String>, amount: Decimal) -> PayLine {
    PayLine {
        label: label.into(),
        quantity: Decimal::ONE,
        rate: round_money(amount),
        subtotal: round_money(amount),
    }
}

fn simple_perdiem_total(breakdown: Option<&PerdiemBreakdown>, amount: Decimal) -> Decimal {
    match breakdown {
        Some(breakdown) => breakdown.total(),
        None => amount,
    }
}

/// Subtotal for one per-diem relationship when the check has no usable
/// per-diem inputs for it. The pro-rated share is an estimation; the stored
/// amount remains the total of record.
fn perdiem_fallback(check: &Check, perdiem_count: usize, relationship_total: usize) -> Decimal {
    if relationship_total == 1 {
        return check.amount;
    }
    if perdiem_count == 0 {
        return Decimal::ZERO;
    }
    check.amount / Decimal::from(perdiem_count as u64)
}

fn relationship_lines(check: &Check, relationships: &[RelationshipDetail]) -> Vec<PayLine> {
    let perdiem_count =
        relationships.iter().filter(|detail| detail.pay_type == PayType::Perdiem).count();

    let mut lines = Vec::new();
    for detail in relationships {
        let rate = detail
            .pay_rate
            .or(check.pay_rate)
            .unwrap_or(Decimal::ZERO);

        match detail.pay_type {
            PayType::Hourly => {
                let hours = check.hours_for_relationship(&detail.id);
                lines.extend(hourly_lines(
                    Some(&detail.client_name),
                    hours,
                    check.ot_hours.unwrap_or(Decimal::ZERO),
                    check.holiday_hours.unwrap_or(Decimal::ZERO),
                    rate,
                ));
            }
            PayType::Perdiem => {
                let amount = match (&check.perdiem_breakdown, check.perdiem_amount) {
                    (Some(breakdown), _) if !breakdown.is_empty() => breakdown.total(),
                    (_, Some(amount)) => amount,
                    _ => perdiem_fallback(check, perdiem_count, relationships.len()),
                };
                lines.push(perdiem_line(format!("{} per diem", detail.client_name), amount));
            }
        }
    }
    lines
}

/// Computes the displayable breakdown for a check.
pub fn compute_display(check: &Check) -> PayBreakdown {
    let lines = match check.pay_structure() {
        PayStructure::SimpleHourly { hours, ot_hours, holiday_hours, rate } => {
            hourly_lines(None, hours, ot_hours, holiday_hours, rate)
        }
        PayStructure::SimplePerdiem { breakdown, amount } => {
            vec![perdiem_line("Per diem", simple_perdiem_total(breakdown, amount))]
        }
        PayStructure::RelationshipBased { relationships } => {
            relationship_lines(check, relationships)
        }
    };

    let computed_total = round_money(lines.iter().map(|line| line.subtotal).sum());
    PayBreakdown { lines, computed_total, stored_amount: check.amount }
}
