//! Schedules — when a time-based automation fires next.
//!
//! Cron expressions use the classic 5-field grammar
//! (`minute hour day-of-month month day-of-week`, day-of-week `0-7` with
//! both `0` and `7` meaning Sunday). They are translated into the
//! seconds-first grammar of the `cron` crate and evaluated in an IANA
//! timezone (UTC by default).

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::Utc;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::automation::{AutomationDefinition, TriggerConfig, TriggerType};
use crate::error::ScheduleError;
use crate::id::AutomationId;
use crate::time::Timestamp;

/// Number of upcoming instants returned by [`validate_cron_expression`].
pub const PREVIEW_RUNS: usize = 5;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// A parsed cron expression bound to a timezone.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    timezone: Tz,
    schedule: cron::Schedule,
}

impl CronSchedule {
    /// Parse a 5-field expression, optionally in a named timezone.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError`] when the field count is wrong, a field does
    /// not parse, or the timezone is unknown.
    pub fn parse(expression: &str, timezone: Option<&str>) -> Result<Self, ScheduleError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::FieldCount(fields.len()));
        }
        let invalid = |reason: String| ScheduleError::InvalidCron {
            expression: expression.to_string(),
            reason,
        };
        let day_of_week = translate_day_of_week(fields[4]).map_err(invalid)?;
        let normalized = format!(
            "0 {} {} {} {} {day_of_week}",
            fields[0], fields[1], fields[2], fields[3]
        );
        let schedule =
            cron::Schedule::from_str(&normalized).map_err(|err| invalid(err.to_string()))?;

        let timezone = match timezone.map(str::trim).filter(|tz| !tz.is_empty()) {
            Some(name) => Tz::from_str(name)
                .map_err(|_| ScheduleError::UnknownTimezone(name.to_string()))?,
            None => Tz::UTC,
        };

        Ok(Self {
            expression: expression.trim().to_string(),
            timezone,
            schedule,
        })
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First occurrence strictly after `after`.
    #[must_use]
    pub fn next_after(&self, after: Timestamp) -> Option<Timestamp> {
        let local = after.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .next()
            .map(|instant| instant.with_timezone(&Utc))
    }

    /// Up to `count` occurrences strictly after `after`, ascending.
    #[must_use]
    pub fn upcoming(&self, after: Timestamp, count: usize) -> Vec<Timestamp> {
        let local = after.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .take(count)
            .map(|instant| instant.with_timezone(&Utc))
            .collect()
    }
}

/// Expand the day-of-week field into an explicit list of day names.
///
/// The `cron` crate orders days Sunday-first and has no day `7`, so ranges
/// and steps are resolved here and `7` folds into Sunday.
fn translate_day_of_week(field: &str) -> Result<String, String> {
    let mut days = BTreeSet::new();
    for item in field.split(',') {
        days.extend(expand_day_item(item)?);
    }
    if days.len() == DAY_NAMES.len() {
        return Ok("*".to_string());
    }
    Ok(days
        .into_iter()
        .map(|day| DAY_NAMES[day])
        .collect::<Vec<_>>()
        .join(","))
}

fn expand_day_item(item: &str) -> Result<Vec<usize>, String> {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => match step.parse::<usize>() {
            Ok(step) if step > 0 => (range, Some(step)),
            _ => return Err(format!("invalid day-of-week step `{step}`")),
        },
        None => (item, None),
    };
    let (start, end) = if range == "*" || range == "?" {
        (0, 6)
    } else if let Some((start, end)) = range.split_once('-') {
        let (start_num, end_num) = (day_number(start)?, day_number(end)?);
        if start_num > end_num {
            return Err(format!("day-of-week range {start}-{end} is reversed"));
        }
        (start_num, end_num)
    } else {
        let day = day_number(range)?;
        // `n/step` runs to the end of the week.
        (day, if step.is_some() { 7 } else { day })
    };
    Ok((start..=end)
        .step_by(step.unwrap_or(1))
        .map(|day| day % 7)
        .collect())
}

fn day_number(token: &str) -> Result<usize, String> {
    if let Some(day) = DAY_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
    {
        return Ok(day);
    }
    match token.parse::<usize>() {
        Ok(day) if day <= 7 => Ok(day),
        Ok(_) => Err(format!("day-of-week `{token}` is out of range 0-7")),
        Err(_) => Err(format!("invalid day-of-week `{token}`")),
    }
}

/// The one timer kind backing a scheduled automation.
#[derive(Debug, Clone)]
pub enum ScheduleSpec {
    Recurring(CronSchedule),
    OneShot(Timestamp),
}

impl ScheduleSpec {
    /// Build the schedule for a trigger; `None` for non-time triggers.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError`] when a cron trigger does not parse.
    pub fn from_trigger(trigger: &TriggerConfig) -> Result<Option<Self>, ScheduleError> {
        match trigger {
            TriggerConfig::Cron {
                cron_expression,
                timezone,
            } => CronSchedule::parse(cron_expression, timezone.as_deref())
                .map(|cron| Some(Self::Recurring(cron))),
            TriggerConfig::Time { execute_at } => Ok(Some(Self::OneShot(*execute_at))),
            _ => Ok(None),
        }
    }

    #[must_use]
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Self::Recurring(_) => TriggerType::Cron,
            Self::OneShot(_) => TriggerType::Time,
        }
    }

    /// Next fire instant strictly after `after`, if any remains.
    #[must_use]
    pub fn next_after(&self, after: Timestamp) -> Option<Timestamp> {
        match self {
            Self::Recurring(cron) => cron.next_after(after),
            Self::OneShot(at) => (*at > after).then_some(*at),
        }
    }
}

/// Introspection view of one armed timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAutomation {
    pub id: AutomationId,
    pub name: String,
    pub trigger_type: TriggerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<Timestamp>,
}

impl ScheduledAutomation {
    #[must_use]
    pub fn new(definition: &AutomationDefinition, spec: &ScheduleSpec, now: Timestamp) -> Self {
        let (cron_expression, execute_at, timezone) = match spec {
            ScheduleSpec::Recurring(cron) => (
                Some(cron.expression().to_string()),
                None,
                Some(cron.timezone().name().to_string()),
            ),
            ScheduleSpec::OneShot(at) => (None, Some(*at), None),
        };
        Self {
            id: definition.id,
            name: definition.name.clone(),
            trigger_type: spec.trigger_type(),
            cron_expression,
            execute_at,
            timezone,
            is_active: definition.is_active,
            next_run: spec.next_after(now),
            last_run: definition.last_run,
        }
    }
}

/// Outcome of [`validate_cron_expression`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CronValidation {
    pub valid: bool,
    pub next_runs: Vec<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Parse `expression` and preview its next [`PREVIEW_RUNS`] instants after `now`.
///
/// Never fails: parse problems are reported in [`CronValidation::error`].
#[must_use]
pub fn validate_cron_expression(
    expression: &str,
    timezone: Option<&str>,
    now: Timestamp,
) -> CronValidation {
    match CronSchedule::parse(expression, timezone) {
        Ok(cron) => CronValidation {
            valid: true,
            next_runs: cron.upcoming(now, PREVIEW_RUNS),
            error: None,
        },
        Err(err) => CronValidation {
            valid: false,
            next_runs: Vec::new(),
            error: Some(err.to_string()),
        },
    }
}
