//! Subscription models and status derivation rules

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::{client::ClientSummary, text_enum};

text_enum! {
    /// Subscription plan; fixes the duration and the price
    SubscriptionPlan("subscription type") {
        Monthly => "monthly",
        Quarterly => "quarterly",
        Yearly => "yearly",
    }
}

text_enum! {
    /// Lifecycle status of a subscription
    SubscriptionStatus("subscription status") {
        Active => "active",
        Expired => "expired",
        Cancelled => "cancelled",
    }
}

impl SubscriptionPlan {
    fn months(&self) -> u32 {
        match self {
            SubscriptionPlan::Monthly => 1,
            SubscriptionPlan::Quarterly => 3,
            SubscriptionPlan::Yearly => 12,
        }
    }

    pub fn price(&self) -> f64 {
        match self {
            SubscriptionPlan::Monthly => 2000.0,
            SubscriptionPlan::Quarterly => 5000.0,
            SubscriptionPlan::Yearly => 18000.0,
        }
    }

    /// Last day of coverage
    ///
    /// A day past the end of the target month rolls over into the next one,
    /// so 2024-01-31 plus one month is 2024-03-02.
    pub fn end_date(&self, start: NaiveDate) -> Option<NaiveDate> {
        start
            .with_day(1)?
            .checked_add_months(Months::new(self.months()))?
            .checked_add_days(Days::new(u64::from(start.day0())))
    }
}

impl SubscriptionStatus {
    /// Recompute the status against `now`.
    ///
    /// `cancelled` is sticky. Otherwise a subscription whose end date lies in
    /// the past is `expired`, and one that has started is `active`. A future
    /// subscription keeps its stored status.
    pub fn derive(self, start: NaiveDate, end: NaiveDate, now: DateTime<Utc>) -> Self {
        if self == SubscriptionStatus::Cancelled {
            return self;
        }
        if is_past(end, now) {
            SubscriptionStatus::Expired
        } else if day_start(start) <= now {
            SubscriptionStatus::Active
        } else {
            self
        }
    }
}

/// UTC midnight of `date`
pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Whether an end date no longer covers `now`
///
/// Queries that filter on live subscriptions bind `now` and compare
/// `(end_date + TIME '00:00') AT TIME ZONE 'UTC' >= now`, the same rule.
pub fn is_past(end: NaiveDate, now: DateTime<Utc>) -> bool {
    day_start(end) < now
}

/// Subscription entity
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: i32,
    pub client_id: i32,
    #[serde(rename = "type")]
    pub plan: SubscriptionPlan,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: f64,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientSummary>,
}

/// Request for subscription creation
///
/// Kept textual so that unknown plans and malformed dates become 400s with a
/// precise message.
#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    #[serde(default)]
    pub user_id: i32,
    #[serde(rename = "type", default)]
    pub plan: String,
    #[serde(default)]
    pub start_date: String,
}

/// Query parameters for subscription listing
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionQuery {
    pub client_id: Option<i32>,
    pub status: Option<SubscriptionStatus>,
}

/// Validated subscription ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubscription {
    pub client_id: i32,
    pub plan: SubscriptionPlan,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: f64,
    pub status: SubscriptionStatus,
}

impl NewSubscription {
    /// Compute end date, price and initial status for a plan starting on `start_date`
    pub fn for_plan(
        client_id: i32,
        plan: SubscriptionPlan,
        start_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        let end_date = plan.end_date(start_date)?;
        Some(Self {
            client_id,
            plan,
            start_date,
            end_date,
            price: plan.price(),
            status: SubscriptionStatus::Active.derive(start_date, end_date, now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_monthly_plan_terms() {
        let sub = NewSubscription::for_plan(
            3,
            SubscriptionPlan::Monthly,
            date(2024, 1, 1),
            at(2024, 1, 15),
        )
        .unwrap();

        assert_eq!(sub.end_date, date(2024, 2, 1));
        assert_eq!(sub.price, 2000.0);
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[test]
    fn test_quarterly_and_yearly_terms() {
        let start = date(2024, 1, 1);
        assert_eq!(SubscriptionPlan::Quarterly.end_date(start), Some(date(2024, 4, 1)));
        assert_eq!(SubscriptionPlan::Quarterly.price(), 5000.0);
        assert_eq!(SubscriptionPlan::Yearly.end_date(start), Some(date(2025, 1, 1)));
        assert_eq!(SubscriptionPlan::Yearly.price(), 18000.0);
    }

    #[test]
    fn test_month_end_overflows_into_next_month() {
        assert_eq!(
            SubscriptionPlan::Monthly.end_date(date(2024, 1, 31)),
            Some(date(2024, 3, 2))
        );
        assert_eq!(
            SubscriptionPlan::Monthly.end_date(date(2023, 1, 31)),
            Some(date(2023, 3, 3))
        );
        assert_eq!(
            SubscriptionPlan::Quarterly.end_date(date(2024, 11, 30)),
            Some(date(2025, 3, 2))
        );
        assert_eq!(
            SubscriptionPlan::Yearly.end_date(date(2024, 2, 29)),
            Some(date(2025, 3, 1))
        );
    }

    #[test]
    fn test_days_that_fit_are_kept() {
        assert_eq!(
            SubscriptionPlan::Monthly.end_date(date(2024, 3, 15)),
            Some(date(2024, 4, 15))
        );
        assert_eq!(
            SubscriptionPlan::Monthly.end_date(date(2024, 12, 31)),
            Some(date(2025, 1, 31))
        );
    }

    #[test]
    fn test_end_date_covers_its_own_midnight_only() {
        let end = date(2024, 2, 1);
        assert!(!is_past(end, day_start(end)));
        assert!(is_past(end, at(2024, 2, 1)));
        assert!(!is_past(end, at(2024, 1, 31)));
    }

    #[test]
    fn test_unknown_plan_is_rejected() {
        assert!("weekly".parse::<SubscriptionPlan>().is_err());
        assert_eq!(
            "Monthly".parse::<SubscriptionPlan>().unwrap(),
            SubscriptionPlan::Monthly
        );
    }

    #[test]
    fn test_past_subscription_is_created_expired() {
        let sub = NewSubscription::for_plan(
            1,
            SubscriptionPlan::Monthly,
            date(2020, 1, 1),
            at(2024, 6, 1),
        )
        .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Expired);
    }

    #[test]
    fn test_future_subscription_is_created_active() {
        let sub = NewSubscription::for_plan(
            1,
            SubscriptionPlan::Yearly,
            date(2030, 1, 1),
            at(2024, 6, 1),
        )
        .unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[test]
    fn test_cancelled_is_sticky() {
        let derived = SubscriptionStatus::Cancelled.derive(
            date(2020, 1, 1),
            date(2020, 2, 1),
            at(2024, 1, 1),
        );
        assert_eq!(derived, SubscriptionStatus::Cancelled);
    }

    #[test]
    fn test_derive_expires_after_end_date() {
        let start = date(2024, 1, 1);
        let end = date(2024, 2, 1);

        assert_eq!(
            SubscriptionStatus::Active.derive(start, end, at(2024, 1, 31)),
            SubscriptionStatus::Active
        );
        // Midnight of the end date has already passed at noon.
        assert_eq!(
            SubscriptionStatus::Active.derive(start, end, at(2024, 2, 1)),
            SubscriptionStatus::Expired
        );
    }

    #[test]
    fn test_derive_reactivates_expired_row_with_future_end() {
        let derived =
            SubscriptionStatus::Expired.derive(date(2024, 1, 1), date(2024, 12, 1), at(2024, 5, 1));
        assert_eq!(derived, SubscriptionStatus::Active);
    }

    #[test]
    fn test_derived_status_invariant() {
        let now = at(2024, 6, 15);
        let starts = [date(2024, 1, 1), date(2024, 6, 15), date(2024, 9, 1)];
        let statuses = [
            SubscriptionStatus::Active,
            SubscriptionStatus::Expired,
            SubscriptionStatus::Cancelled,
        ];

        for start in starts {
            for plan in [SubscriptionPlan::Monthly, SubscriptionPlan::Quarterly] {
                let end = plan.end_date(start).unwrap();
                for status in statuses {
                    // Rows are never stored expired before they start.
                    if status == SubscriptionStatus::Expired && day_start(start) > now {
                        continue;
                    }
                    let derived = status.derive(start, end, now);
                    let expired = is_past(end, now);
                    assert!(
                        derived == SubscriptionStatus::Cancelled
                            || (derived == SubscriptionStatus::Expired) == expired,
                        "{status} -> {derived} for {start}..{end}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_subscription_serializes_type_field() {
        let sub = Subscription {
            id: 1,
            client_id: 2,
            plan: SubscriptionPlan::Quarterly,
            start_date: date(2024, 1, 1),
            end_date: date(2024, 4, 1),
            price: 5000.0,
            status: SubscriptionStatus::Active,
            created_at: at(2024, 1, 1),
            client: None,
        };

        let value = serde_json::to_value(&sub).unwrap();
        assert_eq!(value["type"], "quarterly");
        assert_eq!(value["start_date"], "2024-01-01");
        assert_eq!(value["end_date"], "2024-04-01");
        assert!(value.get("client").is_none());
    }
}
