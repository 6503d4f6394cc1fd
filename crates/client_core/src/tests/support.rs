//! In-memory record store with scripted failures and gated queries.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicI64, AtomicU32, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use shared::{
    domain::{Activity, ActivityFields, ActivityId, NewActivity},
    error::StoreError,
    protocol::ActivityQuery,
};
use tokio::sync::oneshot;

use crate::ActivityStore;

pub(crate) fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, d).expect("date")
}

pub(crate) fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("time")
}

pub(crate) fn fields(title: &str, start: NaiveTime) -> ActivityFields {
    ActivityFields::new(title, start, start)
}

struct QueryGate {
    started: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    rows: Mutex<Vec<Activity>>,
    next_id: AtomicI64,
    query_failures: Mutex<VecDeque<StoreError>>,
    write_failure: Mutex<Option<(u32, StoreError)>>,
    gates: Mutex<HashMap<NaiveDate, QueryGate>>,
    pub queries: AtomicU32,
    pub inserts: AtomicU32,
    pub updates: AtomicU32,
    pub deletes: AtomicU32,
    pub rank_updates: AtomicU32,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Seeds a row directly, bypassing the call counters.
    pub(crate) fn seed(&self, date: NaiveDate, fields: ActivityFields) -> ActivityId {
        let id = ActivityId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.rows.lock().expect("rows").push(Activity {
            id,
            date,
            fields,
            rank: None,
        });
        id
    }

    pub(crate) fn rows(&self) -> Vec<Activity> {
        self.rows.lock().expect("rows").clone()
    }

    pub(crate) fn fail_next_queries(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.query_failures.lock().expect("failures").extend(errors);
    }

    pub(crate) fn fail_next_write(&self, error: StoreError) {
        self.fail_write_after(0, error);
    }

    /// Lets `successes` writes through, then fails the one after.
    pub(crate) fn fail_write_after(&self, successes: u32, error: StoreError) {
        *self.write_failure.lock().expect("failure") = Some((successes, error));
    }

    /// Holds the next query for `date` until the returned sender fires.
    /// The receiver resolves once that query has started.
    pub(crate) fn gate(&self, date: NaiveDate) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.gates.lock().expect("gates").insert(
            date,
            QueryGate {
                started: started_tx,
                release: release_rx,
            },
        );
        (started_rx, release_tx)
    }

    fn take_write_failure(&self) -> Result<(), StoreError> {
        let mut failure = self.write_failure.lock().expect("failure");
        if let Some((remaining, _)) = failure.as_mut() {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(());
            }
        }
        match failure.take() {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn query_by_date(&self, query: ActivityQuery) -> Result<Vec<Activity>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.query_failures.lock().expect("failures").pop_front() {
            return Err(err);
        }

        let gate = self.gates.lock().expect("gates").remove(&query.date);
        if let Some(gate) = gate {
            let _ = gate.started.send(());
            let _ = gate.release.await;
        }

        Ok(self
            .rows
            .lock()
            .expect("rows")
            .iter()
            .filter(|a| a.date == query.date)
            .cloned()
            .collect())
    }

    async fn insert(&self, activity: NewActivity) -> Result<Activity, StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.take_write_failure()?;
        let id = self.seed(activity.date, activity.fields);
        Ok(self
            .rows()
            .into_iter()
            .find(|a| a.id == id)
            .expect("seeded row"))
    }

    async fn update(&self, id: ActivityId, fields: ActivityFields) -> Result<Activity, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.take_write_failure()?;
        let mut rows = self.rows.lock().expect("rows");
        let row = rows
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::not_found(format!("activity {id} does not exist")))?;
        row.fields = fields;
        Ok(row.clone())
    }

    async fn delete(&self, id: ActivityId) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.take_write_failure()?;
        let mut rows = self.rows.lock().expect("rows");
        let before = rows.len();
        rows.retain(|a| a.id != id);
        if rows.len() == before {
            return Err(StoreError::not_found(format!("activity {id} does not exist")));
        }
        Ok(())
    }

    async fn update_rank(&self, id: ActivityId, rank: Option<i64>) -> Result<(), StoreError> {
        self.rank_updates.fetch_add(1, Ordering::SeqCst);
        self.take_write_failure()?;
        let mut rows = self.rows.lock().expect("rows");
        let row = rows
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::not_found(format!("activity {id} does not exist")))?;
        row.rank = rank;
        Ok(())
    }
}
