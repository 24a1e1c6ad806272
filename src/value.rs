//! Operand conversion.
//!
//! Operands travel as text. Before validation accepts them and before the
//! compiler binds them, they are converted to the property's type using the
//! configured formatting culture. The invariant spelling (`.` decimals, ISO
//! dates) is always accepted as a fallback, which is how builder-produced
//! operands round-trip under any culture.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};

use thiserror::Error;
use uuid::Uuid;

use crate::model::{PropertyKind, ValueType};

/// A converted operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Uuid(Uuid),
}

impl FilterValue {
    /// Orders two values of compatible kinds; ints and floats compare numerically.
    pub fn compare(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (FilterValue::Bool(a), FilterValue::Bool(b)) => Some(a.cmp(b)),
            (FilterValue::Int(a), FilterValue::Int(b)) => Some(a.cmp(b)),
            (FilterValue::Float(a), FilterValue::Float(b)) => a.partial_cmp(b),
            (FilterValue::Int(a), FilterValue::Float(b)) => (*a as f64).partial_cmp(b),
            (FilterValue::Float(a), FilterValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (FilterValue::Text(a), FilterValue::Text(b)) => Some(a.cmp(b)),
            (FilterValue::DateTime(a), FilterValue::DateTime(b)) => Some(a.cmp(b)),
            (FilterValue::Uuid(a), FilterValue::Uuid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Bool(b) => write!(f, "{}", b),
            FilterValue::Int(i) => write!(f, "{}", i),
            FilterValue::Float(x) => write!(f, "{}", x),
            FilterValue::Text(s) => write!(f, "{:?}", s),
            FilterValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            FilterValue::Uuid(id) => write!(f, "{}", id),
        }
    }
}

impl From<FilterValue> for sea_query::Value {
    fn from(value: FilterValue) -> Self {
        match value {
            FilterValue::Bool(b) => b.into(),
            FilterValue::Int(i) => i.into(),
            FilterValue::Float(x) => x.into(),
            FilterValue::Text(s) => s.into(),
            FilterValue::DateTime(dt) => dt.into(),
            FilterValue::Uuid(id) => id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    Ymd,
    Dmy,
    Mdy,
}

/// Number and date spelling rules of a locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Culture {
    pub name: &'static str,
    pub decimal_separator: char,
    pub date_separator: char,
    pub date_order: DateOrder,
}

impl Culture {
    pub const INVARIANT: Culture = Culture {
        name: "invariant",
        decimal_separator: '.',
        date_separator: '/',
        date_order: DateOrder::Mdy,
    };
    pub const EN_US: Culture = Culture {
        name: "en-US",
        decimal_separator: '.',
        date_separator: '/',
        date_order: DateOrder::Mdy,
    };
    pub const RU_RU: Culture = Culture {
        name: "ru-RU",
        decimal_separator: ',',
        date_separator: '.',
        date_order: DateOrder::Dmy,
    };
    pub const DE_DE: Culture = Culture {
        name: "de-DE",
        decimal_separator: ',',
        date_separator: '.',
        date_order: DateOrder::Dmy,
    };
    pub const ZH_CN: Culture = Culture {
        name: "zh-CN",
        decimal_separator: '.',
        date_separator: '/',
        date_order: DateOrder::Ymd,
    };

    const KNOWN: [Culture; 5] = [
        Self::INVARIANT,
        Self::EN_US,
        Self::RU_RU,
        Self::DE_DE,
        Self::ZH_CN,
    ];

    pub fn by_name(name: &str) -> Option<Culture> {
        let name = name.trim();
        if name.is_empty() {
            return Some(Self::INVARIANT);
        }
        Self::KNOWN
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .copied()
    }

    pub fn parse_bool(&self, raw: &str) -> Option<bool> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("true") {
            Some(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }

    pub fn parse_int(&self, raw: &str) -> Option<i64> {
        raw.trim().parse().ok()
    }

    pub fn parse_float(&self, raw: &str) -> Option<f64> {
        let raw = raw.trim();
        let localized = if self.decimal_separator == '.' {
            None
        } else {
            raw.replace(self.decimal_separator, ".").parse::<f64>().ok()
        };
        localized
            .or_else(|| raw.parse::<f64>().ok())
            .filter(|x| x.is_finite())
    }

    /// Parses an instant. Offset-less spellings are read in `zone`; a bare
    /// date means local midnight.
    pub fn parse_datetime(&self, raw: &str, zone: &TimeZoneSetting) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in self.datetime_formats() {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, &format) {
                return zone.interpret(naive);
            }
        }
        for format in self.date_formats() {
            if let Ok(date) = NaiveDate::parse_from_str(raw, &format) {
                return zone.interpret(date.and_time(NaiveTime::MIN));
            }
        }
        None
    }

    fn date_formats(&self) -> Vec<String> {
        let sep = self.date_separator;
        let mut formats = vec!["%Y-%m-%d".to_string()];
        match self.date_order {
            DateOrder::Ymd => formats.push(format!("%Y{sep}%m{sep}%d")),
            DateOrder::Dmy => formats.push(format!("%d{sep}%m{sep}%Y")),
            DateOrder::Mdy => formats.push(format!("%m{sep}%d{sep}%Y")),
        }
        formats
    }

    fn datetime_formats(&self) -> Vec<String> {
        let mut formats = vec![
            "%Y-%m-%dT%H:%M:%S%.f".to_string(),
            "%Y-%m-%dT%H:%M".to_string(),
        ];
        for date in self.date_formats() {
            formats.push(format!("{date} %H:%M:%S"));
            formats.push(format!("{date} %H:%M"));
        }
        formats
    }
}

impl Default for Culture {
    fn default() -> Self {
        Self::INVARIANT
    }
}

/// Time zone that defines "local calendar day" for date widening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeZoneSetting {
    /// The process's local zone.
    #[default]
    Local,
    Fixed(FixedOffset),
}

/// Half-open UTC interval `[start, next)` covering one local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBounds {
    pub start: DateTime<Utc>,
    pub next: DateTime<Utc>,
}

impl TimeZoneSetting {
    pub fn utc() -> Self {
        TimeZoneSetting::Fixed(Utc.fix())
    }

    /// Reads a wall-clock time in this zone.
    pub fn interpret(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            TimeZoneSetting::Local => in_zone(&Local, naive),
            TimeZoneSetting::Fixed(offset) => in_zone(offset, naive),
        }
    }

    /// The local calendar day containing `instant`.
    pub fn day_bounds(&self, instant: DateTime<Utc>) -> Option<DayBounds> {
        match self {
            TimeZoneSetting::Local => day_bounds_in(&Local, instant),
            TimeZoneSetting::Fixed(offset) => day_bounds_in(offset, instant),
        }
    }
}

fn in_zone<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn day_bounds_in<Tz: TimeZone>(tz: &Tz, instant: DateTime<Utc>) -> Option<DayBounds> {
    let date = instant.with_timezone(tz).date_naive();
    let start = in_zone(tz, date.and_time(NaiveTime::MIN))?;
    let next = in_zone(tz, date.succ_opt()?.and_time(NaiveTime::MIN))?;
    Some(DayBounds { start, next })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time zone `{0}`, expected `local`, `utc` or `+HH:MM`")]
pub struct ParseZoneError(String);

impl FromStr for TimeZoneSetting {
    type Err = ParseZoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("local") {
            return Ok(TimeZoneSetting::Local);
        }
        if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
            return Ok(TimeZoneSetting::utc());
        }

        let err = || ParseZoneError(s.to_string());
        let (sign, rest) = match trimmed.as_bytes().first() {
            Some(b'+') => (1, &trimmed[1..]),
            Some(b'-') => (-1, &trimmed[1..]),
            _ => return Err(err()),
        };
        let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
        let hours: i32 = hours.parse().map_err(|_| err())?;
        let minutes: i32 = minutes.parse().map_err(|_| err())?;
        if hours > 14 || minutes >= 60 {
            return Err(err());
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(TimeZoneSetting::Fixed)
            .ok_or_else(err)
    }
}

impl fmt::Display for TimeZoneSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeZoneSetting::Local => f.write_str("local"),
            TimeZoneSetting::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

/// Converts raw operand text to a value of a scalar property kind.
///
/// Returns `None` when the text does not parse, and for relation kinds,
/// which are compared through their identifier property instead.
pub fn convert_operand(
    raw: &str,
    kind: &PropertyKind,
    culture: &Culture,
    zone: &TimeZoneSetting,
) -> Option<FilterValue> {
    match kind {
        PropertyKind::Text => Some(FilterValue::Text(raw.to_string())),
        PropertyKind::Value(ValueType::Bool) => culture.parse_bool(raw).map(FilterValue::Bool),
        PropertyKind::Value(ValueType::Int) => culture.parse_int(raw).map(FilterValue::Int),
        PropertyKind::Value(ValueType::Float) => culture.parse_float(raw).map(FilterValue::Float),
        PropertyKind::Value(ValueType::DateTime) => culture
            .parse_datetime(raw, zone)
            .map(FilterValue::DateTime),
        PropertyKind::Value(ValueType::Uuid) => {
            Uuid::parse_str(raw.trim()).ok().map(FilterValue::Uuid)
        }
        PropertyKind::Value(ValueType::Enum(members)) => {
            convert_enum(raw, members).map(|m| FilterValue::Text(m.to_string()))
        }
        PropertyKind::Reference { .. } | PropertyKind::Collection { .. } => None,
    }
}

/// Matches a member by name (any case) or by ordinal.
fn convert_enum(raw: &str, members: &[&'static str]) -> Option<&'static str> {
    let raw = raw.trim();
    if let Some(member) = members.iter().copied().find(|m| m.eq_ignore_ascii_case(raw)) {
        return Some(member);
    }
    raw.parse::<usize>()
        .ok()
        .and_then(|index| members.get(index))
        .copied()
}
