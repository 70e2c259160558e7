//! Per-user monthly search allowance.
//!
//! The period is the UTC calendar month. Rollover is lazy: nothing runs at
//! midnight on the first; the next [`QuotaLedger::check_quota`] after the
//! month changes zeroes the counter in the same statement that reads it.

use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use trendscout_core::PlanTier;

use crate::error::StoreError;
use crate::store::SearchStore;

/// Quota snapshot presented to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaView {
    pub quota: i32,
    pub used: i32,
    /// `quota - used`, never below zero.
    pub remaining: i32,
    /// Anchor of the current period.
    pub period_start: DateTime<Utc>,
    /// First instant of the next calendar month.
    pub resets_at: DateTime<Utc>,
    pub plan: PlanTier,
}

#[derive(Clone)]
pub struct QuotaLedger {
    store: Arc<dyn SearchStore>,
}

impl QuotaLedger {
    #[must_use]
    pub fn new(store: Arc<dyn SearchStore>) -> Self {
        Self { store }
    }

    /// Returns `true` if the user may start another search now.
    ///
    /// A rollover into a new month always grants quota. An unknown user is
    /// refused.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    pub async fn check_quota(&self, user_id: i64, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let Some(period) = self.store.refresh_quota_period(user_id, now).await? else {
            tracing::warn!(user_id, "quota check for unknown user");
            return Ok(false);
        };

        if period.was_reset {
            tracing::info!(user_id, "quota period rolled over");
            return Ok(true);
        }

        Ok(period.searches_used < period.search_quota)
    }

    /// Charges one search against the user's allowance.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the user does not exist.
    pub async fn consume_quota(&self, user_id: i64) -> Result<(), StoreError> {
        self.store.increment_searches_used(user_id).await
    }

    /// Current quota snapshot, after applying any pending rollover.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the user does not exist.
    pub async fn quota_view(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<QuotaView, StoreError> {
        let period = self
            .store
            .refresh_quota_period(user_id, now)
            .await?
            .ok_or(StoreError::NotFound)?;
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        Ok(QuotaView {
            quota: period.search_quota,
            used: period.searches_used,
            remaining: (period.search_quota - period.searches_used).max(0),
            period_start: period.quota_reset_date,
            resets_at: next_period_start(now),
            plan: user.plan_tier,
        })
    }
}

/// Midnight UTC on the first day of the month after `now`.
#[must_use]
pub fn next_period_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    async fn ledger_with_user(used: i32, anchor: DateTime<Utc>) -> (QuotaLedger, i64) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .find_or_create_user("idp|q", "q@example.com", None, PlanTier::Free)
            .await
            .expect("user");
        store
            .set_quota_state(user.id, used, anchor)
            .await
            .expect("seed");
        (QuotaLedger::new(store), user.id)
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn check_quota_allows_below_ceiling() {
        let (ledger, user_id) = ledger_with_user(9, at(2026, 3, 1)).await;
        assert!(ledger.check_quota(user_id, at(2026, 3, 20)).await.unwrap());
    }

    #[tokio::test]
    async fn check_quota_refuses_at_ceiling() {
        let (ledger, user_id) = ledger_with_user(10, at(2026, 3, 1)).await;
        assert!(!ledger.check_quota(user_id, at(2026, 3, 20)).await.unwrap());
    }

    #[tokio::test]
    async fn check_quota_resets_in_new_month_regardless_of_usage() {
        let (ledger, user_id) = ledger_with_user(250, at(2026, 2, 28)).await;
        assert!(ledger.check_quota(user_id, at(2026, 3, 1)).await.unwrap());

        let view = ledger.quota_view(user_id, at(2026, 3, 1)).await.unwrap();
        assert_eq!(view.used, 0);
        assert_eq!(view.period_start, at(2026, 3, 1));
    }

    #[tokio::test]
    async fn check_quota_fails_closed_for_unknown_user() {
        let ledger = QuotaLedger::new(Arc::new(MemoryStore::new()));
        assert!(!ledger.check_quota(404, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn consume_quota_adds_exactly_one() {
        let (ledger, user_id) = ledger_with_user(3, at(2026, 3, 1)).await;
        ledger.consume_quota(user_id).await.unwrap();
        let view = ledger.quota_view(user_id, at(2026, 3, 2)).await.unwrap();
        assert_eq!(view.used, 4);
        assert_eq!(view.remaining, 6);
    }

    #[tokio::test]
    async fn remaining_never_goes_negative() {
        let (ledger, user_id) = ledger_with_user(14, at(2026, 3, 1)).await;
        let view = ledger.quota_view(user_id, at(2026, 3, 2)).await.unwrap();
        assert_eq!(view.remaining, 0);
        assert_eq!(view.plan, PlanTier::Free);
        assert_eq!(view.quota, 10);
    }

    #[test]
    fn next_period_start_wraps_december() {
        assert_eq!(
            next_period_start(at(2026, 12, 31)),
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            next_period_start(at(2026, 4, 15)),
            Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap()
        );
    }
}
