use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::{
    domain::{Activity, ActivityFields, ActivityId, ColorTag, NewActivity},
    protocol::{format_date, parse_date, OrderColumn},
    time_of_day,
};

const SELECT_COLUMNS: &str =
    "id, date, title, description, start_time, end_time, image_url, link, color_tag, rank";

/// SQLite-backed activity table with the same surface as the hosted store.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // A single connection keeps `sqlite::memory:` databases shared across queries.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn list_activities_for_date(
        &self,
        date: NaiveDate,
        order: OrderColumn,
    ) -> Result<Vec<Activity>> {
        let order_by = match order {
            OrderColumn::StartTime => "start_time ASC, id ASC",
            OrderColumn::RankThenStartTime => "rank IS NULL, rank ASC, start_time ASC, id ASC",
        };
        let sql = format!("SELECT {SELECT_COLUMNS} FROM activities WHERE date = ? ORDER BY {order_by}");
        let rows = sqlx::query(&sql)
            .bind(format_date(date))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to list activities for {date}"))?;
        rows.iter().map(activity_from_row).collect()
    }

    pub async fn load_activity(&self, id: ActivityId) -> Result<Option<Activity>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM activities WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(activity_from_row).transpose()
    }

    pub async fn insert_activity(&self, activity: &NewActivity) -> Result<Activity> {
        let fields = &activity.fields;
        let sql = format!(
            "INSERT INTO activities (date, title, description, start_time, end_time, image_url, link, color_tag)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {SELECT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(format_date(activity.date))
            .bind(&fields.title)
            .bind(fields.description.as_deref())
            .bind(time_of_day::format(fields.start_time))
            .bind(time_of_day::format(fields.end_time))
            .bind(fields.image_url.as_deref())
            .bind(fields.link.as_deref())
            .bind(fields.color_tag.as_str())
            .fetch_one(&self.pool)
            .await
            .context("failed to insert activity")?;
        let inserted = activity_from_row(&row)?;
        debug!(id = inserted.id.0, date = %activity.date, "inserted activity");
        Ok(inserted)
    }

    /// Replaces every mutable column. `None` when no row has that id.
    pub async fn update_activity(
        &self,
        id: ActivityId,
        fields: &ActivityFields,
    ) -> Result<Option<Activity>> {
        let sql = format!(
            "UPDATE activities
             SET title = ?, description = ?, start_time = ?, end_time = ?, image_url = ?, link = ?, color_tag = ?
             WHERE id = ?
             RETURNING {SELECT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&fields.title)
            .bind(fields.description.as_deref())
            .bind(time_of_day::format(fields.start_time))
            .bind(time_of_day::format(fields.end_time))
            .bind(fields.image_url.as_deref())
            .bind(fields.link.as_deref())
            .bind(fields.color_tag.as_str())
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to update activity {id}"))?;
        row.as_ref().map(activity_from_row).transpose()
    }

    pub async fn delete_activity(&self, id: ActivityId) -> Result<bool> {
        let res = sqlx::query("DELETE FROM activities WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete activity {id}"))?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn set_activity_rank(&self, id: ActivityId, rank: Option<i64>) -> Result<bool> {
        let res = sqlx::query("UPDATE activities SET rank = ? WHERE id = ?")
            .bind(rank)
            .bind(id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to set rank for activity {id}"))?;
        Ok(res.rows_affected() > 0)
    }
}

fn activity_from_row(row: &SqliteRow) -> Result<Activity> {
    let raw_date: String = row.try_get("date")?;
    let raw_start: String = row.try_get("start_time")?;
    let raw_end: String = row.try_get("end_time")?;
    let raw_color: String = row.try_get("color_tag")?;

    Ok(Activity {
        id: ActivityId(row.try_get::<i64, _>("id")?),
        date: parse_date(&raw_date).ok_or_else(|| anyhow!("invalid stored date '{raw_date}'"))?,
        fields: ActivityFields {
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            start_time: time_of_day::parse(&raw_start)
                .ok_or_else(|| anyhow!("invalid stored start_time '{raw_start}'"))?,
            end_time: time_of_day::parse(&raw_end)
                .ok_or_else(|| anyhow!("invalid stored end_time '{raw_end}'"))?,
            image_url: row.try_get("image_url")?,
            link: row.try_get("link")?,
            color_tag: ColorTag::parse(&raw_color).unwrap_or_default(),
        },
        rank: row.try_get("rank")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
