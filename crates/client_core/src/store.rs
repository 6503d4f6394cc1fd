//! Store client: the UI's single point of contact with the record store.
//!
//! Reads fail soft (logged, empty list) after the retry budget is spent.
//! Writes fail loud: errors are returned to the caller unretried.

use chrono::NaiveDate;
use shared::{
    domain::{Activity, ActivityFields, ActivityId, NewActivity},
    error::StoreError,
    protocol::{ActivityQuery, OrderColumn},
};
use tracing::{debug, info, warn};

use crate::{retry::RetryPolicy, ActivityStore};

/// How a fetched day is ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderingMode {
    /// Start time only; drag reordering lasts until the next fetch.
    #[default]
    StartTime,
    /// Persisted `rank` first, unranked rows after, `start_time` as tiebreak.
    /// Drops are written back through `update_rank`.
    PersistedRank,
}

impl OrderingMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "start_time" | "start" | "time" => Some(Self::StartTime),
            "rank" | "persisted_rank" => Some(Self::PersistedRank),
            _ => None,
        }
    }

    pub fn order_column(self) -> OrderColumn {
        match self {
            OrderingMode::StartTime => OrderColumn::StartTime,
            OrderingMode::PersistedRank => OrderColumn::RankThenStartTime,
        }
    }

    pub fn persists_drops(self) -> bool {
        matches!(self, OrderingMode::PersistedRank)
    }

    /// Stable sort, so rows with equal keys keep the store's order.
    pub fn sort(self, activities: &mut [Activity]) {
        match self {
            OrderingMode::StartTime => activities.sort_by_key(|a| a.fields.start_time),
            OrderingMode::PersistedRank => {
                activities.sort_by_key(|a| (a.rank.is_none(), a.rank, a.fields.start_time))
            }
        }
    }
}

pub struct ActivityStoreClient<S> {
    store: S,
    retry: RetryPolicy,
    ordering: OrderingMode,
}

impl<S: ActivityStore> ActivityStoreClient<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            ordering: OrderingMode::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_ordering(mut self, ordering: OrderingMode) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ordering(&self) -> OrderingMode {
        self.ordering
    }

    /// Activities for `date`, ordered; any store failure yields an empty list.
    pub async fn fetch_for_date(&self, date: NaiveDate) -> Vec<Activity> {
        match self.try_fetch_for_date(date).await {
            Ok(activities) => activities,
            Err(err) => {
                warn!(%date, kind = ?err.kind(), error = %err, "activity fetch failed; showing empty day");
                Vec::new()
            }
        }
    }

    /// Same as [`Self::fetch_for_date`] but surfaces the final error.
    pub async fn try_fetch_for_date(&self, date: NaiveDate) -> Result<Vec<Activity>, StoreError> {
        let query = ActivityQuery::for_date(date).ordered_by(self.ordering.order_column());
        let mut activities = self
            .retry
            .run("fetch_for_date", || self.store.query_by_date(query))
            .await?;
        activities.retain(|a| a.date == date);
        self.ordering.sort(&mut activities);
        debug!(%date, count = activities.len(), "fetched activities");
        Ok(activities)
    }

    /// Inserts a new activity on `date`. Nothing is sent without a title and a date.
    pub async fn create(
        &self,
        date: Option<NaiveDate>,
        fields: ActivityFields,
    ) -> Result<Activity, StoreError> {
        let fields = fields.normalized();
        if !fields.has_title() {
            return Err(StoreError::validation("activity title is required"));
        }
        let Some(date) = date else {
            return Err(StoreError::validation("no date selected for new activity"));
        };

        let created = self.store.insert(NewActivity { date, fields }).await?;
        info!(id = created.id.0, %date, "created activity");
        Ok(created)
    }

    /// Replaces every mutable field of `id`; the date is left untouched.
    pub async fn update(
        &self,
        id: ActivityId,
        fields: ActivityFields,
    ) -> Result<Activity, StoreError> {
        let fields = fields.normalized();
        if !fields.has_title() {
            return Err(StoreError::validation("activity title is required"));
        }

        let updated = self.store.update(id, fields).await?;
        info!(id = id.0, "updated activity");
        Ok(updated)
    }

    pub async fn remove(&self, id: ActivityId) -> Result<(), StoreError> {
        self.store.delete(id).await?;
        info!(id = id.0, "removed activity");
        Ok(())
    }

    /// Writes `rank = position` for every item whose stored rank differs.
    /// Returns the number of rows written.
    pub async fn persist_order(&self, activities: &[Activity]) -> Result<usize, StoreError> {
        let mut written = 0;
        for (position, activity) in activities.iter().enumerate() {
            let rank = position as i64;
            if activity.rank == Some(rank) {
                continue;
            }
            self.store.update_rank(activity.id, Some(rank)).await?;
            written += 1;
        }
        debug!(written, "persisted activity order");
        Ok(written)
    }
}
