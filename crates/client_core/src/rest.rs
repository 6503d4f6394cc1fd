//! Hosted record store reached over a PostgREST-style table endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Activity, ActivityFields, ActivityId, NewActivity},
    error::{StoreApiError, StoreError, StoreErrorKind},
    protocol::{ActivityColumns, ActivityQuery, InsertActivityRow, RankUpdateRow},
};
use tracing::debug;
use url::Url;

use crate::ActivityStore;

pub const DEFAULT_TABLE: &str = "activities";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RETURN_REPRESENTATION: &str = "return=representation";

#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub base_url: String,
    pub table: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl RestStoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            table: DEFAULT_TABLE.to_string(),
            api_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn table_endpoint(&self) -> Result<Url, StoreError> {
        let base = self.base_url.trim().trim_end_matches('/');
        let table = self.table.trim().trim_matches('/');
        if table.is_empty() {
            return Err(StoreError::validation("record store table name is empty"));
        }
        Url::parse(&format!("{base}/rest/v1/{table}")).map_err(|err| {
            StoreError::validation(format!("invalid record store url '{base}': {err}"))
        })
    }
}

pub struct RestActivityStore {
    http: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl RestActivityStore {
    pub fn new(config: RestStoreConfig) -> Result<Self, StoreError> {
        let endpoint = config.table_endpoint()?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(transport_error)?;
        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn row_url(&self, id: ActivityId) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", id.0));
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = self
            .authorize(request)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        response.json::<T>().await.map_err(|err| {
            StoreError::new(
                StoreErrorKind::Decode,
                format!("unexpected record store response: {err}"),
            )
        })
    }

    /// Mutations return the affected rows; zero rows means the id did not match.
    async fn send_returning_rows(
        &self,
        request: RequestBuilder,
        id: ActivityId,
    ) -> Result<Activity, StoreError> {
        let rows: Vec<Activity> = self
            .send(request.header("Prefer", RETURN_REPRESENTATION))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(format!("activity {id} does not exist")))
    }
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let api_error = serde_json::from_str::<StoreApiError>(&body).unwrap_or_else(|_| {
        StoreApiError {
            message: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
            ..StoreApiError::default()
        }
    });
    Err(api_error.into_store_error(status.as_u16()))
}

fn transport_error(err: reqwest::Error) -> StoreError {
    let kind = if err.is_timeout() {
        StoreErrorKind::Timeout
    } else if err.is_decode() {
        StoreErrorKind::Decode
    } else {
        StoreErrorKind::Transport
    };
    StoreError::new(kind, err.to_string())
}

#[async_trait]
impl ActivityStore for RestActivityStore {
    async fn query_by_date(&self, query: ActivityQuery) -> Result<Vec<Activity>, StoreError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().extend_pairs(query.query_pairs());
        debug!(date = %query.date, "querying record store");
        self.send(self.http.get(url)).await
    }

    async fn insert(&self, activity: NewActivity) -> Result<Activity, StoreError> {
        let row = InsertActivityRow::from(activity);
        let rows: Vec<Activity> = self
            .send(
                self.http
                    .post(self.endpoint.clone())
                    .header("Prefer", RETURN_REPRESENTATION)
                    .json(&row),
            )
            .await?;
        rows.into_iter().next().ok_or_else(|| {
            StoreError::new(
                StoreErrorKind::Decode,
                "record store returned no row for insert",
            )
        })
    }

    async fn update(&self, id: ActivityId, fields: ActivityFields) -> Result<Activity, StoreError> {
        let columns = ActivityColumns::from(fields);
        self.send_returning_rows(self.http.patch(self.row_url(id)).json(&columns), id)
            .await
    }

    async fn delete(&self, id: ActivityId) -> Result<(), StoreError> {
        self.send_returning_rows(self.http.delete(self.row_url(id)), id)
            .await
            .map(|_| ())
    }

    async fn update_rank(&self, id: ActivityId, rank: Option<i64>) -> Result<(), StoreError> {
        self.send_returning_rows(
            self.http
                .patch(self.row_url(id))
                .json(&RankUpdateRow { rank }),
            id,
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
#[path = "tests/rest_tests.rs"]
mod tests;
