use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{Activity, ActivityFields, ActivityId, NewActivity},
    error::{StoreError, StoreErrorKind},
    protocol::ActivityQuery,
};
use storage::Storage;

pub mod planner;
pub mod reorder;
pub mod rest;
pub mod retry;
pub mod store;

pub use planner::{
    Editor, FetchTicket, PlannerError, PlannerSession, PlannerState, SaveOutcome, WriteAction,
};
pub use reorder::{
    move_item, DropOutcome, Point, PointerTarget, Rect, ReorderController, ReorderKey,
};
pub use rest::{RestActivityStore, RestStoreConfig};
pub use retry::RetryPolicy;
pub use store::{ActivityStoreClient, OrderingMode};

/// Query/insert/update/delete surface of the record store holding activities.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn query_by_date(&self, query: ActivityQuery) -> Result<Vec<Activity>, StoreError>;
    async fn insert(&self, activity: NewActivity) -> Result<Activity, StoreError>;
    async fn update(&self, id: ActivityId, fields: ActivityFields) -> Result<Activity, StoreError>;
    async fn delete(&self, id: ActivityId) -> Result<(), StoreError>;
    async fn update_rank(&self, id: ActivityId, rank: Option<i64>) -> Result<(), StoreError>;
}

#[async_trait]
impl<T> ActivityStore for Arc<T>
where
    T: ActivityStore + ?Sized,
{
    async fn query_by_date(&self, query: ActivityQuery) -> Result<Vec<Activity>, StoreError> {
        (**self).query_by_date(query).await
    }

    async fn insert(&self, activity: NewActivity) -> Result<Activity, StoreError> {
        (**self).insert(activity).await
    }

    async fn update(&self, id: ActivityId, fields: ActivityFields) -> Result<Activity, StoreError> {
        (**self).update(id, fields).await
    }

    async fn delete(&self, id: ActivityId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }

    async fn update_rank(&self, id: ActivityId, rank: Option<i64>) -> Result<(), StoreError> {
        (**self).update_rank(id, rank).await
    }
}

/// Stand-in used when no store is configured; every call fails as a transport error.
pub struct MissingActivityStore;

#[async_trait]
impl ActivityStore for MissingActivityStore {
    async fn query_by_date(&self, query: ActivityQuery) -> Result<Vec<Activity>, StoreError> {
        Err(StoreError::new(
            StoreErrorKind::Transport,
            format!("record store unavailable for date {}", query.date),
        ))
    }

    async fn insert(&self, activity: NewActivity) -> Result<Activity, StoreError> {
        Err(StoreError::new(
            StoreErrorKind::Transport,
            format!("record store unavailable for date {}", activity.date),
        ))
    }

    async fn update(&self, id: ActivityId, _fields: ActivityFields) -> Result<Activity, StoreError> {
        Err(StoreError::new(
            StoreErrorKind::Transport,
            format!("record store unavailable for activity {id}"),
        ))
    }

    async fn delete(&self, id: ActivityId) -> Result<(), StoreError> {
        Err(StoreError::new(
            StoreErrorKind::Transport,
            format!("record store unavailable for activity {id}"),
        ))
    }

    async fn update_rank(&self, id: ActivityId, _rank: Option<i64>) -> Result<(), StoreError> {
        Err(StoreError::new(
            StoreErrorKind::Transport,
            format!("record store unavailable for activity {id}"),
        ))
    }
}

fn local_store_error(err: anyhow::Error) -> StoreError {
    StoreError::new(StoreErrorKind::Transport, format!("{err:#}"))
}

#[async_trait]
impl ActivityStore for Storage {
    async fn query_by_date(&self, query: ActivityQuery) -> Result<Vec<Activity>, StoreError> {
        self.list_activities_for_date(query.date, query.order)
            .await
            .map_err(local_store_error)
    }

    async fn insert(&self, activity: NewActivity) -> Result<Activity, StoreError> {
        self.insert_activity(&activity)
            .await
            .map_err(local_store_error)
    }

    async fn update(&self, id: ActivityId, fields: ActivityFields) -> Result<Activity, StoreError> {
        self.update_activity(id, &fields)
            .await
            .map_err(local_store_error)?
            .ok_or_else(|| StoreError::not_found(format!("activity {id} does not exist")))
    }

    async fn delete(&self, id: ActivityId) -> Result<(), StoreError> {
        if self.delete_activity(id).await.map_err(local_store_error)? {
            Ok(())
        } else {
            Err(StoreError::not_found(format!("activity {id} does not exist")))
        }
    }

    async fn update_rank(&self, id: ActivityId, rank: Option<i64>) -> Result<(), StoreError> {
        if self
            .set_activity_rank(id, rank)
            .await
            .map_err(local_store_error)?
        {
            Ok(())
        } else {
            Err(StoreError::not_found(format!("activity {id} does not exist")))
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
