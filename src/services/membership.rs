use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::models::payment::PaymentKind;
use crate::models::{Client, Payment, Reservation};
use crate::services::plan_catalog::{PlanType, PLAN_VALIDITY_DAYS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    NoPlan,
    Active,
    Expired,
    NoMembership,
}

/// A client's derived membership/credit state at one instant. Never
/// persisted; recomputed from payment and reservation history on every query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MembershipState {
    pub document: String,
    pub has_annual_membership: bool,
    pub annual_expiry: Option<NaiveDate>,
    pub active_plan: Option<PlanType>,
    pub weekly_allotment: i64,
    pub cycle_start: Option<NaiveDate>,
    pub cycle_end: Option<NaiveDate>,
    pub plan_expires_on: Option<NaiveDate>,
    pub credits_used_this_cycle: i64,
    pub credits_available: i64,
    pub status: MembershipStatus,
    pub can_book: bool,
}

/// What the approved-payment history grants a client as of one day.
struct Entitlements {
    has_annual: bool,
    annual_expiry: Option<NaiveDate>,
    active_plan: Option<(PlanType, NaiveDate)>,
    singles_purchased: i64,
}

async fn entitlements(
    pool: &SqlitePool,
    document: &str,
    today: NaiveDate,
) -> Result<Entitlements> {
    Client::find_by_document(pool, document)
        .await?
        .ok_or_else(|| AppError::ClientNotFound(document.to_string()))?;

    let payments = Payment::list_approved(pool, document).await?;

    let mut has_annual = false;
    let mut annual_expiry: Option<NaiveDate> = None;
    let mut active_plan: Option<(PlanType, NaiveDate)> = None;
    let mut latest_plan_approval: Option<DateTime<Utc>> = None;
    let mut singles_purchased: i64 = 0;

    for payment in &payments {
        let kind = payment
            .payment_kind()
            .ok_or_else(|| AppError::UnknownPlanType(payment.kind.clone()))?;
        // Invariant from the ledger: approved payments carry both timestamps.
        let (Some(approved_at), Some(expires_on)) = (payment.approved_at, payment.expires_on)
        else {
            continue;
        };

        match kind {
            PaymentKind::AnnualMembership => {
                if expires_on >= today {
                    has_annual = true;
                    annual_expiry = annual_expiry.max(Some(expires_on));
                }
            }
            PaymentKind::MonthlyPlan(plan) => {
                // Most recently approved plan supersedes earlier ones, even
                // if those have not expired yet.
                if latest_plan_approval.map_or(true, |prev| approved_at > prev) {
                    latest_plan_approval = Some(approved_at);
                    active_plan = Some((plan, approved_at.date_naive()));
                }
            }
            PaymentKind::SingleClass => {
                if expires_on >= today {
                    singles_purchased += 1;
                }
            }
        }
    }

    Ok(Entitlements {
        has_annual,
        annual_expiry,
        active_plan,
        singles_purchased,
    })
}

/// Active-reservation counts per 7-day window relative to the plan anchor,
/// attributed by session date. Sessions before the anchor land in negative
/// windows.
fn usage_windows(anchor: NaiveDate, dates: &[NaiveDate]) -> HashMap<i64, i64> {
    let mut windows = HashMap::new();
    for date in dates {
        let index = (*date - anchor).num_days().div_euclid(7);
        *windows.entry(index).or_insert(0) += 1;
    }
    windows
}

/// Singles consumed by every window other than `window_index`: sessions
/// predating the anchor entirely, other windows only beyond the plan
/// allotment.
fn singles_spent_outside(
    windows: &HashMap<i64, i64>,
    plan_allotment: i64,
    window_index: i64,
) -> i64 {
    windows
        .iter()
        .map(|(&index, &count)| {
            if index == window_index {
                0
            } else if index < 0 {
                count
            } else {
                (count - plan_allotment).max(0)
            }
        })
        .sum()
}

/// Derives the membership state for one client at time `now`.
///
/// Pure projection of the ledger: no side effects, and the same stored data
/// with the same `now` always yields the same state. `now` is explicit so
/// callers and tests control the clock.
pub async fn membership_state(
    pool: &SqlitePool,
    document: &str,
    now: DateTime<Utc>,
) -> Result<MembershipState> {
    let today = now.date_naive();
    let entitled = entitlements(pool, document, today).await?;
    let usage_dates = Reservation::active_session_dates(pool, document).await?;

    let state = match entitled.active_plan {
        Some((plan, anchor)) => {
            let plan_allotment = plan.weekly_allotment();
            // Clamped so a `now` before the anchor (clock skew) never yields
            // a negative cycle index.
            let week_index = ((today - anchor).num_days() / 7).max(0);
            let cycle_start = anchor + Duration::days(week_index * 7);
            let cycle_end = cycle_start + Duration::days(7);
            let plan_expires_on = anchor + Duration::days(PLAN_VALIDITY_DAYS);

            let windows = usage_windows(anchor, &usage_dates);
            let credits_used_this_cycle = windows.get(&week_index).copied().unwrap_or(0);
            let singles_remaining = (entitled.singles_purchased
                - singles_spent_outside(&windows, plan_allotment, week_index))
            .max(0);

            let weekly_allotment = plan_allotment + singles_remaining;
            let credits_available = (weekly_allotment - credits_used_this_cycle).max(0);

            let status = if today > plan_expires_on {
                MembershipStatus::Expired
            } else if !entitled.has_annual {
                // A monthly plan without an annual membership is not
                // bookable, credits or not.
                MembershipStatus::NoMembership
            } else {
                MembershipStatus::Active
            };

            MembershipState {
                document: document.to_string(),
                has_annual_membership: entitled.has_annual,
                annual_expiry: entitled.annual_expiry,
                active_plan: Some(plan),
                weekly_allotment,
                cycle_start: Some(cycle_start),
                cycle_end: Some(cycle_end),
                plan_expires_on: Some(plan_expires_on),
                credits_used_this_cycle,
                credits_available,
                status,
                can_book: false,
            }
        }
        None => {
            // No weekly boundary without a plan: single-class credits are a
            // one-time pool, each active reservation consumes one.
            let singles_remaining =
                (entitled.singles_purchased - usage_dates.len() as i64).max(0);
            let status = if singles_remaining == 0 {
                MembershipStatus::NoPlan
            } else {
                MembershipStatus::Active
            };

            MembershipState {
                document: document.to_string(),
                has_annual_membership: entitled.has_annual,
                annual_expiry: entitled.annual_expiry,
                active_plan: None,
                weekly_allotment: singles_remaining,
                cycle_start: None,
                cycle_end: None,
                plan_expires_on: None,
                credits_used_this_cycle: 0,
                credits_available: singles_remaining,
                status,
                can_book: false,
            }
        }
    };

    let can_book = state.status == MembershipStatus::Active && state.credits_available > 0;
    Ok(MembershipState { can_book, ..state })
}

/// Credits left for the cycle window containing `session_date`.
///
/// The booking gate draws on the target session's window, not the window
/// containing `now`: a batch of bookings for next week must fit next week's
/// allotment, otherwise usage there would exceed the plan once that week
/// arrives.
pub async fn credits_available_on(
    pool: &SqlitePool,
    document: &str,
    now: DateTime<Utc>,
    session_date: NaiveDate,
) -> Result<i64> {
    let today = now.date_naive();
    let entitled = entitlements(pool, document, today).await?;
    let usage_dates = Reservation::active_session_dates(pool, document).await?;

    match entitled.active_plan {
        Some((plan, anchor)) => {
            let plan_allotment = plan.weekly_allotment();
            let target_index = (session_date - anchor).num_days().div_euclid(7);
            // Sessions before the anchor have no plan coverage at all.
            let coverage = if target_index >= 0 { plan_allotment } else { 0 };

            let windows = usage_windows(anchor, &usage_dates);
            let used = windows.get(&target_index).copied().unwrap_or(0);
            let singles_remaining = (entitled.singles_purchased
                - singles_spent_outside(&windows, plan_allotment, target_index))
            .max(0);

            Ok((coverage + singles_remaining - used).max(0))
        }
        None => Ok((entitled.singles_purchased - usage_dates.len() as i64).max(0)),
    }
}
