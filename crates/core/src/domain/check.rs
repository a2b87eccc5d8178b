use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::company::{ClientId, CompanyId};
use crate::domain::user::UserId;
use crate::errors::DomainError;
use crate::week::WeekKey;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayType {
    Hourly,
    Perdiem,
}

/// A sub-contract tying the check to one client with its own pay terms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDetail {
    pub id: RelationshipId,
    pub client_id: ClientId,
    pub client_name: String,
    pub pay_type: PayType,
    /// Overrides the check-level rate when present.
    pub pay_rate: Option<Decimal>,
}

/// Per-weekday per-diem amounts, Sunday first. Absent days count as zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerdiemBreakdown {
    pub sunday: Option<Decimal>,
    pub monday: Option<Decimal>,
    pub tuesday: Option<Decimal>,
    pub wednesday: Option<Decimal>,
    pub thursday: Option<Decimal>,
    pub friday: Option<Decimal>,
    pub saturday: Option<Decimal>,
}

impl PerdiemBreakdown {
    pub fn total(&self) -> Decimal {
        [
            self.sunday,
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
            self.saturday,
        ]
        .into_iter()
        .flatten()
        .sum()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One payroll record for an employee for a given date.
///
/// `amount` is settled at creation time by the check writer and stays
/// authoritative; the calculator in [`crate::payroll`] only re-derives a
/// display breakdown and never writes it back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: CheckId,
    pub company_id: CompanyId,
    /// Legacy single-client linkage, superseded by `relationship_details`.
    pub client_id: Option<ClientId>,
    pub relationship_details: Vec<RelationshipDetail>,
    /// Hours per relationship; meaningful only when `relationship_details`
    /// is non-empty.
    pub relationship_hours: HashMap<RelationshipId, Decimal>,
    pub employee_name: String,
    pub date: NaiveDate,
    pub hours: Option<Decimal>,
    pub ot_hours: Option<Decimal>,
    pub holiday_hours: Option<Decimal>,
    pub pay_rate: Option<Decimal>,
    pub perdiem_amount: Option<Decimal>,
    pub perdiem_breakdown: Option<PerdiemBreakdown>,
    pub amount: Decimal,
    pub reviewed: bool,
    pub paid: bool,
    pub check_number: i64,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// How the pay fields of a check are to be interpreted, resolved once at
/// read time instead of re-inspecting optional fields at every consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum PayStructure<'a> {
    SimpleHourly {
        hours: Decimal,
        ot_hours: Decimal,
        holiday_hours: Decimal,
        rate: Decimal,
    },
    SimplePerdiem {
        breakdown: Option<&'a PerdiemBreakdown>,
        amount: Decimal,
    },
    RelationshipBased {
        relationships: &'a [RelationshipDetail],
    },
}

impl Check {
    /// The week bucket this check belongs to. Always derived from `date`,
    /// never stored independently of it.
    pub fn week_key(&self) -> WeekKey {
        WeekKey::for_date(self.date)
    }

    pub fn pay_structure(&self) -> PayStructure<'_> {
        if !self.relationship_details.is_empty() {
            return PayStructure::RelationshipBased { relationships: &self.relationship_details };
        }

        let has_perdiem = self.perdiem_amount.is_some()
            || self.perdiem_breakdown.as_ref().is_some_and(|b| !b.is_empty());
        if has_perdiem {
            return PayStructure::SimplePerdiem {
                breakdown: self.perdiem_breakdown.as_ref().filter(|b| !b.is_empty()),
                amount: self.perdiem_amount.unwrap_or(Decimal::ZERO),
            };
        }

        PayStructure::SimpleHourly {
            hours: self.hours.unwrap_or(Decimal::ZERO),
            ot_hours: self.ot_hours.unwrap_or(Decimal::ZERO),
            holiday_hours: self.holiday_hours.unwrap_or(Decimal::ZERO),
            rate: self.pay_rate.unwrap_or(Decimal::ZERO),
        }
    }

    /// Hours for one relationship: the per-relationship entry when present
    /// and positive, else the check-level hours field.
    pub fn hours_for_relationship(&self, relationship_id: &RelationshipId) -> Decimal {
        self.relationship_hours
            .get(relationship_id)
            .copied()
            .filter(|hours| *hours > Decimal::ZERO)
            .unwrap_or_else(|| self.hours.unwrap_or(Decimal::ZERO))
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.relationship_details.is_empty() && !self.relationship_hours.is_empty() {
            return Err(DomainError::InvariantViolation(format!(
                "check {} carries relationship hours without relationship details",
                self.id.0
            )));
        }

        let known: Vec<&RelationshipId> =
            self.relationship_details.iter().map(|detail| &detail.id).collect();
        for relationship_id in self.relationship_hours.keys() {
            if !known.contains(&relationship_id) {
                return Err(DomainError::InvariantViolation(format!(
                    "check {} has hours for unknown relationship {}",
                    self.id.0, relationship_id.0
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use super::{
        Check, CheckId, PayStructure, PayType, PerdiemBreakdown, RelationshipDetail,
        RelationshipId,
    };
    use crate::domain::company::{ClientId, CompanyId};
    use crate::domain::user::UserId;

    fn base_check() -> Check {
        Check {
            id: CheckId("chk-1".to_string()),
            company_id: CompanyId("c-1".to_string()),
            client_id: None,
            relationship_details: Vec::new(),
            relationship_hours: HashMap::new(),
            employee_name: "Dana Reeve".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 8, 4).expect("valid date"),
            hours: Some(Decimal::new(40, 0)),
            ot_hours: None,
            holiday_hours: None,
            pay_rate: Some(Decimal::new(2000, 2)),
            perdiem_amount: None,
            perdiem_breakdown: None,
            amount: Decimal::new(80000, 2),
            reviewed: false,
            paid: false,
            check_number: 1042,
            created_by: UserId("u-1".to_string()),
            created_at: Utc::now(),
        }
    }

    fn relationship(id: &str, pay_type: PayType) -> RelationshipDetail {
        RelationshipDetail {
            id: RelationshipId(id.to_string()),
            client_id: ClientId(format!("client-{id}")),
            client_name: format!("Client {id}"),
            pay_type,
            pay_rate: None,
        }
    }

    #[test]
    fn bare_hour_fields_resolve_to_simple_hourly() {
        let check = base_check();
        assert!(matches!(check.pay_structure(), PayStructure::SimpleHourly { .. }));
    }

    #[test]
    fn perdiem_amount_wins_over_hourly_fields() {
        let mut check = base_check();
        check.perdiem_amount = Some(Decimal::new(12500, 2));
        assert!(matches!(
            check.pay_structure(),
            PayStructure::SimplePerdiem { breakdown: None, .. }
        ));
    }

    #[test]
    fn empty_breakdown_does_not_force_the_perdiem_path() {
        let mut check = base_check();
        check.perdiem_breakdown = Some(PerdiemBreakdown::default());
        assert!(matches!(check.pay_structure(), PayStructure::SimpleHourly { .. }));
    }

    #[test]
    fn relationships_win_over_everything_else() {
        let mut check = base_check();
        check.perdiem_amount = Some(Decimal::new(100, 0));
        check.relationship_details = vec![relationship("r-1", PayType::Hourly)];
        assert!(matches!(check.pay_structure(), PayStructure::RelationshipBased { .. }));
    }

    #[test]
    fn relationship_hours_fall_back_to_check_hours() {
        let mut check = base_check();
        check.relationship_details = vec![relationship("r-1", PayType::Hourly)];
        check
            .relationship_hours
            .insert(RelationshipId("r-1".to_string()), Decimal::ZERO);

        // zero is treated as absent
        assert_eq!(
            check.hours_for_relationship(&RelationshipId("r-1".to_string())),
            Decimal::new(40, 0)
        );
    }

    #[test]
    fn orphan_relationship_hours_fail_validation() {
        let mut check = base_check();
        check
            .relationship_hours
            .insert(RelationshipId("r-9".to_string()), Decimal::new(8, 0));
        assert!(check.validate().is_err());
    }

    #[test]
    fn week_key_is_derived_from_the_date() {
        // 2026-08-04 is a Tuesday; its week's Sunday is 2026-08-02.
        assert_eq!(base_check().week_key().to_string(), "2026-08-02");
    }
}
