mod config;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Args as ClapArgs, Parser, Subcommand};
use client_core::{
    ActivityStore, ActivityStoreClient, MissingActivityStore, PlannerSession, PlannerState,
    ReorderKey, RestActivityStore, SaveOutcome,
};
use shared::{
    domain::{ActivityFields, ActivityId, ColorTag},
    protocol::parse_date,
    time_of_day,
};
use storage::Storage;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{normalize_database_url, Backend, Settings};

#[derive(Parser, Debug)]
#[command(name = "planner", about = "Plan the activities of a day")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the activities of a day in order.
    List {
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },
    /// Add an activity.
    Add {
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Replace fields of an existing activity.
    Edit {
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        #[arg(long)]
        id: i64,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Delete an activity. Without `--yes` only the confirmation prompt is shown.
    Delete {
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        #[arg(long)]
        id: i64,
        #[arg(long)]
        yes: bool,
    },
    /// Move the activity at position `from` to position `to` (zero based).
    Move {
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        #[arg(long)]
        from: usize,
        #[arg(long)]
        to: usize,
    },
}

#[derive(ClapArgs, Debug, Default)]
struct FieldArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, value_parser = parse_time_arg)]
    start: Option<NaiveTime>,
    #[arg(long, value_parser = parse_time_arg)]
    end: Option<NaiveTime>,
    #[arg(long)]
    image_url: Option<String>,
    #[arg(long)]
    link: Option<String>,
    #[arg(long, value_parser = parse_color_arg)]
    color: Option<ColorTag>,
}

impl FieldArgs {
    fn apply(&self, fields: &mut ActivityFields) {
        if let Some(title) = &self.title {
            fields.title = title.clone();
        }
        if let Some(description) = &self.description {
            fields.description = Some(description.clone());
        }
        if let Some(start) = self.start {
            fields.start_time = start;
            if self.end.is_none() && fields.end_time < start {
                fields.end_time = start;
            }
        }
        if let Some(end) = self.end {
            fields.end_time = end;
        }
        if let Some(image_url) = &self.image_url {
            fields.image_url = Some(image_url.clone());
        }
        if let Some(link) = &self.link {
            fields.link = Some(link.clone());
        }
        if let Some(color) = self.color {
            fields.color_tag = color;
        }
    }
}

fn parse_date_arg(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw).ok_or_else(|| format!("expected YYYY-MM-DD, got '{raw}'"))
}

fn parse_time_arg(raw: &str) -> Result<NaiveTime, String> {
    time_of_day::parse(raw).ok_or_else(|| format!("expected HH:MM, got '{raw}'"))
}

fn parse_color_arg(raw: &str) -> Result<ColorTag, String> {
    ColorTag::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = ColorTag::ALL.iter().map(|tag| tag.as_str()).collect();
        format!("unknown color '{raw}', expected one of {}", known.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    let settings = config::load_settings();

    let store = open_store(&settings).await?;
    let client = ActivityStoreClient::new(store)
        .with_retry(settings.retry_policy())
        .with_ordering(settings.ordering);
    let session = PlannerSession::new(client);

    run(&session, args.command).await
}

async fn open_store(settings: &Settings) -> Result<Arc<dyn ActivityStore>> {
    match settings.backend {
        Backend::Rest => {
            let Some(config) = settings.rest_config() else {
                warn!("no record store url configured; reads will be empty and writes will fail");
                return Ok(Arc::new(MissingActivityStore));
            };
            let store = RestActivityStore::new(config)?;
            info!(endpoint = %store.endpoint(), "using hosted record store");
            Ok(Arc::new(store))
        }
        Backend::Sqlite => {
            let database_url = normalize_database_url(&settings.database_url);
            let storage = Storage::new(&database_url)
                .await
                .with_context(|| format!("failed to open database '{database_url}'"))?;
            info!(%database_url, "using local sqlite store");
            Ok(Arc::new(storage))
        }
    }
}

async fn run<S: ActivityStore>(session: &PlannerSession<S>, command: Command) -> Result<()> {
    match command {
        Command::List { date } => {
            session.select_date(date_or_today(date)).await;
        }
        Command::Add { date, fields } => {
            session.select_date(date_or_today(date)).await;
            session
                .update_state(|state| {
                    state.open_create();
                    if let Some(editor) = state.editor_fields_mut() {
                        fields.apply(editor);
                    }
                })
                .await;
            report_save(session.save_editor().await?)?;
        }
        Command::Edit { date, id, fields } => {
            let date = date_or_today(date);
            let id = ActivityId(id);
            session.select_date(date).await;
            let opened = session
                .update_state(|state| {
                    let opened = state.open_edit(id);
                    if let Some(editor) = state.editor_fields_mut() {
                        fields.apply(editor);
                    }
                    opened
                })
                .await;
            if !opened {
                bail!("activity {id} is not planned on {date}");
            }
            report_save(session.save_editor().await?)?;
        }
        Command::Delete { date, id, yes } => {
            let date = date_or_today(date);
            let id = ActivityId(id);
            session.select_date(date).await;
            if !session.update_state(|state| state.request_delete(id)).await {
                bail!("activity {id} is not planned on {date}");
            }
            if !yes {
                let state = session.snapshot().await;
                let title = state
                    .activities()
                    .iter()
                    .find(|a| a.id == id)
                    .map(|a| a.title().to_string())
                    .unwrap_or_default();
                session.update_state(PlannerState::cancel_delete).await;
                println!("Delete \"{title}\"? Run again with --yes to confirm.");
                return Ok(());
            }
            if let Some(id) = session.confirm_delete().await? {
                println!("Deleted activity {id}.");
            }
        }
        Command::Move { date, from, to } => {
            session.select_date(date_or_today(date)).await;
            let outcome = session
                .update_state(|state| keyboard_move(state, from, to))
                .await?;
            match outcome {
                Some(outcome) => {
                    session.handle_drop(outcome).await?;
                    if !session.client().ordering().persists_drops() {
                        println!("Order changed for this session only; set PLANNER_ORDERING=rank to keep it.");
                    }
                }
                None => println!("Order unchanged."),
            }
        }
    }

    print_day(&session.snapshot().await);
    Ok(())
}

fn date_or_today(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Local::now().date_naive())
}

fn report_save(outcome: SaveOutcome) -> Result<()> {
    match outcome {
        SaveOutcome::Created(id) => println!("Created activity {id}."),
        SaveOutcome::Updated(id) => println!("Updated activity {id}."),
        SaveOutcome::Invalid => bail!("an activity needs a title"),
        SaveOutcome::NothingToSave => {}
    }
    Ok(())
}

/// Drives the keyboard reorder gesture: pick up `from`, step to `to`, drop.
fn keyboard_move(
    state: &mut PlannerState,
    from: usize,
    to: usize,
) -> Result<Option<client_core::DropOutcome>> {
    let order = state.activity_ids();
    let Some(&active) = order.get(from) else {
        bail!("no activity at position {from}; the day has {}", order.len());
    };
    if to >= order.len() {
        bail!("no activity at position {to}; the day has {}", order.len());
    }

    let reorder = state.reorder_mut();
    reorder.key(&order, active, ReorderKey::Pickup);
    let (step, count) = if to >= from {
        (ReorderKey::Down, to - from)
    } else {
        (ReorderKey::Up, from - to)
    };
    for _ in 0..count {
        reorder.key(&order, active, step);
    }
    Ok(reorder.key(&order, active, ReorderKey::Pickup))
}

fn print_day(state: &PlannerState) {
    let Some(date) = state.selected_date() else {
        return;
    };
    println!("{}", date.format("%A, %B %-d, %Y"));
    if state.activities().is_empty() {
        println!("  No activities planned.");
        return;
    }
    for (position, activity) in state.activities().iter().enumerate() {
        let fields = &activity.fields;
        println!(
            "  {position}. [{}] {}-{}  {}  ({})",
            activity.id,
            time_of_day::format(fields.start_time),
            time_of_day::format(fields.end_time),
            fields.title,
            fields.color_tag,
        );
        if let Some(description) = &fields.description {
            println!("       {description}");
        }
        if let Some(link) = &fields.link {
            println!("       {link}");
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
