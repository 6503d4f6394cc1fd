//! Row shapes exchanged with the record store.
//!
//! Optional columns are always serialized, so an update that clears a field
//! sends an explicit `null` instead of leaving the old value in place.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::domain::{ActivityFields, ColorTag, NewActivity};

pub const DATE_WIRE_FORMAT: &str = "%Y-%m-%d";

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_WIRE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_WIRE_FORMAT).ok()
}

/// Mutable columns, as sent by an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityColumns {
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "crate::time_of_day")]
    pub start_time: NaiveTime,
    #[serde(with = "crate::time_of_day")]
    pub end_time: NaiveTime,
    pub image_url: Option<String>,
    pub link: Option<String>,
    pub color_tag: ColorTag,
}

impl From<ActivityFields> for ActivityColumns {
    fn from(fields: ActivityFields) -> Self {
        Self {
            title: fields.title,
            description: fields.description,
            start_time: fields.start_time,
            end_time: fields.end_time,
            image_url: fields.image_url,
            link: fields.link,
            color_tag: fields.color_tag,
        }
    }
}

impl From<ActivityColumns> for ActivityFields {
    fn from(columns: ActivityColumns) -> Self {
        Self {
            title: columns.title,
            description: columns.description,
            start_time: columns.start_time,
            end_time: columns.end_time,
            image_url: columns.image_url,
            link: columns.link,
            color_tag: columns.color_tag,
        }
    }
}

/// Insert body: every column except the store-assigned `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertActivityRow {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub columns: ActivityColumns,
}

impl From<NewActivity> for InsertActivityRow {
    fn from(value: NewActivity) -> Self {
        Self {
            date: value.date,
            columns: value.fields.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankUpdateRow {
    pub rank: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderColumn {
    #[default]
    StartTime,
    /// `rank` first (unranked rows last), then `start_time`.
    RankThenStartTime,
}

impl OrderColumn {
    /// Value for a PostgREST `order=` query parameter.
    pub fn as_query_value(self) -> &'static str {
        match self {
            OrderColumn::StartTime => "start_time.asc",
            OrderColumn::RankThenStartTime => "rank.asc.nullslast,start_time.asc",
        }
    }
}

/// Equality filter on `date` plus an ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityQuery {
    pub date: NaiveDate,
    pub order: OrderColumn,
}

impl ActivityQuery {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date,
            order: OrderColumn::default(),
        }
    }

    pub fn ordered_by(mut self, order: OrderColumn) -> Self {
        self.order = order;
        self
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("select", "*".to_string()),
            ("date", format!("eq.{}", format_date(self.date))),
            ("order", self.order.as_query_value().to_string()),
        ]
    }
}
