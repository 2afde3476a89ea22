use serde::Serialize;

use crate::error::{AppError, Result};

/// Days of plan validity from approval; shared by every monthly tier.
pub const PLAN_VALIDITY_DAYS: i64 = 30;

/// Monthly plan tiers. The stored text code is decoupled from the logic so a
/// display-name change never touches credit math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    OneDay,
    TwoDays,
    ThreeDays,
    FourDays,
    FiveDays,
}

impl PlanType {
    pub fn code(&self) -> &'static str {
        match self {
            PlanType::OneDay => "monthly_1d",
            PlanType::TwoDays => "monthly_2d",
            PlanType::ThreeDays => "monthly_3d",
            PlanType::FourDays => "monthly_4d",
            PlanType::FiveDays => "monthly_5d",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "monthly_1d" => Some(PlanType::OneDay),
            "monthly_2d" => Some(PlanType::TwoDays),
            "monthly_3d" => Some(PlanType::ThreeDays),
            "monthly_4d" => Some(PlanType::FourDays),
            "monthly_5d" => Some(PlanType::FiveDays),
            _ => None,
        }
    }

    /// Credits granted per weekly cycle.
    pub fn weekly_allotment(&self) -> i64 {
        match self {
            PlanType::OneDay => 1,
            PlanType::TwoDays => 2,
            PlanType::ThreeDays => 3,
            PlanType::FourDays => 4,
            PlanType::FiveDays => 5,
        }
    }
}

/// Allotment lookup by stored code, for callers that hold raw ledger text.
pub fn allotment_for(code: &str) -> Result<i64> {
    PlanType::from_code(code)
        .map(|plan| plan.weekly_allotment())
        .ok_or_else(|| AppError::UnknownPlanType(code.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for plan in [
            PlanType::OneDay,
            PlanType::TwoDays,
            PlanType::ThreeDays,
            PlanType::FourDays,
            PlanType::FiveDays,
        ] {
            assert_eq!(PlanType::from_code(plan.code()), Some(plan));
        }
    }

    #[test]
    fn allotments_match_tier() {
        assert_eq!(allotment_for("monthly_1d").unwrap(), 1);
        assert_eq!(allotment_for("monthly_5d").unwrap(), 5);
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(matches!(
            allotment_for("monthly_6d"),
            Err(AppError::UnknownPlanType(_))
        ));
    }
}
