use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ActivityId);

/// Display category for an activity card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorTag {
    #[default]
    Blue,
    Green,
    Orange,
    Pink,
    Purple,
    Red,
    Slate,
}

impl ColorTag {
    pub const ALL: [ColorTag; 7] = [
        ColorTag::Blue,
        ColorTag::Green,
        ColorTag::Orange,
        ColorTag::Pink,
        ColorTag::Purple,
        ColorTag::Red,
        ColorTag::Slate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ColorTag::Blue => "blue",
            ColorTag::Green => "green",
            ColorTag::Orange => "orange",
            ColorTag::Pink => "pink",
            ColorTag::Purple => "purple",
            ColorTag::Red => "red",
            ColorTag::Slate => "slate",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(raw))
    }
}

/// Missing, `null`, unknown or differently cased tags all decode; unknown ones
/// fall back to the default tag.
fn lenient_color_tag<'de, D>(deserializer: D) -> Result<ColorTag, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(ColorTag::parse).unwrap_or_default())
}

impl fmt::Display for ColorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every field of an activity a user can replace through the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFields {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "crate::time_of_day")]
    pub start_time: NaiveTime,
    #[serde(with = "crate::time_of_day")]
    pub end_time: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "lenient_color_tag")]
    pub color_tag: ColorTag,
}

impl Default for ActivityFields {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: None,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default(),
            image_url: None,
            link: None,
            color_tag: ColorTag::default(),
        }
    }
}

impl ActivityFields {
    pub fn new(title: impl Into<String>, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            title: title.into(),
            start_time,
            end_time,
            ..Self::default()
        }
    }

    /// Trims the title and collapses blank optional text to `None`.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.description = blank_to_none(self.description);
        self.image_url = blank_to_none(self.image_url);
        self.link = blank_to_none(self.link);
        self
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Insert payload: all fields except the store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub date: NaiveDate,
    pub fields: ActivityFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub fields: ActivityFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i64>,
}

impl Activity {
    pub fn title(&self) -> &str {
        &self.fields.title
    }

    pub fn start_time(&self) -> NaiveTime {
        self.fields.start_time
    }
}
