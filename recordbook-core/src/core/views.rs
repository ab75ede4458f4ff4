//! Derived record views: kanban board columns and the weekly agenda.
//!
//! Both views are pure projections over already-loaded records; they never
//! touch storage.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};
use serde::Serialize;
use serde_json::Value;

use crate::lookup;
use crate::value::FieldValue;
use crate::{Record, RecordbookError, Result, Workspace};

/// Label of the column holding records with no value.
pub const UNSET_COLUMN_LABEL: &str = "Sin asignar";

/// One kanban column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardColumn {
    /// The grouped value; `""` for the unset column.
    pub key: String,
    pub label: String,
    /// Record IDs in record order.
    pub record_ids: Vec<String>,
}

impl BoardColumn {
    fn new(key: String) -> Self {
        let label = if key.is_empty() {
            UNSET_COLUMN_LABEL.to_string()
        } else {
            key.clone()
        };
        Self {
            key,
            label,
            record_ids: Vec::new(),
        }
    }
}

/// Groups `records` into columns by the value of `property_id`.
///
/// Columns come in option order, then any values found in records but not
/// declared as options (first-seen order), then the unset column. Declared
/// options always get a column, even when empty; the unset column only
/// appears when some record has no value. Multiselect records land in one
/// column per selected value.
///
/// # Errors
///
/// Returns [`RecordbookError::PropertyNotFound`] if `property_id` is not in
/// the workspace schema.
pub fn board(
    workspace: &Workspace,
    records: &[Record],
    property_id: &str,
    status_defaults: &[String],
) -> Result<Vec<BoardColumn>> {
    let def = workspace
        .property(property_id)
        .ok_or_else(|| RecordbookError::PropertyNotFound(property_id.to_string()))?;

    let mut columns: Vec<BoardColumn> = def
        .effective_options(status_defaults)
        .into_iter()
        .filter(|o| !o.is_empty())
        .map(BoardColumn::new)
        .collect();
    let mut unset = BoardColumn::new(String::new());

    for record in records {
        let keys = match record.field(def) {
            FieldValue::Set(items) => items.into_iter().collect::<Vec<_>>(),
            FieldValue::Empty => Vec::new(),
            other => vec![other.display(def)],
        };
        let keys: Vec<String> = keys.into_iter().filter(|k| !k.is_empty()).collect();

        if keys.is_empty() {
            unset.record_ids.push(record.id.clone());
            continue;
        }
        for key in keys {
            match columns.iter_mut().find(|c| c.key == key) {
                Some(column) => column.record_ids.push(record.id.clone()),
                None => {
                    let mut column = BoardColumn::new(key);
                    column.record_ids.push(record.id.clone());
                    columns.push(column);
                }
            }
        }
    }

    if !unset.record_ids.is_empty() {
        columns.push(unset);
    }
    Ok(columns)
}

/// One record placed on the weekly agenda grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaEntry {
    pub record_id: String,
    pub title: String,
    pub date: NaiveDate,
    /// Days since the start of the week, 0 to 6.
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

/// The Sunday on or before `date`.
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// Places every record with a date inside the week starting at `week_start`
/// and a valid time on the agenda grid.
///
/// `date_key` and `time_key` are resolved exact-then-case-insensitive, so
/// `"Fecha"` also finds `"fecha"`. Dates are ISO `YYYY-MM-DD`, optionally
/// followed by a `T` time part; times are `HH:MM` or `HH:MM:SS`. Records
/// missing either value, or with unparseable values, are skipped. Entries
/// are sorted by day then time; ties keep record order.
pub fn agenda_week(
    records: &[Record],
    week_start: NaiveDate,
    date_key: &str,
    time_key: &str,
) -> Vec<AgendaEntry> {
    let week_end = week_start + Duration::days(7);
    let mut entries: Vec<AgendaEntry> = records
        .iter()
        .filter_map(|record| {
            let date = parse_date(lookup::get_prop(&record.properties, date_key)?)?;
            if date < week_start || date >= week_end {
                return None;
            }
            let time = parse_time(lookup::get_prop(&record.properties, time_key)?)?;
            Some(AgendaEntry {
                record_id: record.id.clone(),
                title: record.title.clone(),
                date,
                day: (date - week_start).num_days() as u32,
                hour: time.hour(),
                minute: time.minute(),
            })
        })
        .collect();
    entries.sort_by_key(|e| (e.day, e.hour, e.minute));
    entries
}

fn parse_date(raw: &Value) -> Option<NaiveDate> {
    let text = raw.as_str()?.trim();
    let day_part = text.split('T').next()?;
    NaiveDate::parse_from_str(day_part, "%Y-%m-%d").ok()
}

fn parse_time(raw: &Value) -> Option<NaiveTime> {
    let text = raw.as_str()?.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}
