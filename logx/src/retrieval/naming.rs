//! Resolving an application descriptor and a target date into a remote path.

use crate::config::{ApplicationDescriptor, DATE_PLACEHOLDER};
use chrono::{Local, NaiveDate, NaiveTime};
use std::fmt;
use tracing::warn;

/// The only accepted literal format for caller-supplied dates.
pub const REQUEST_DATE_FORMAT: &str = "%Y-%m-%d";

/// Which file of an application to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetDate {
    /// The live, non-dated file at `log_path`.
    Current,
    /// The dated file for the local calendar date at retrieval time.
    Today,
    On(NaiveDate),
}

impl TargetDate {
    /// Parse a caller-supplied date: `YYYY-MM-DD` or `today`; empty means
    /// [`TargetDate::Current`]. Returns the offending input on mismatch.
    pub fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(TargetDate::Current);
        }
        if input.eq_ignore_ascii_case("today") {
            return Ok(TargetDate::Today);
        }
        parse_request_date(input).map(TargetDate::On)
    }

    /// Concrete calendar date, or `None` for the live file.
    pub fn resolve(&self) -> Option<NaiveDate> {
        match self {
            TargetDate::Current => None,
            TargetDate::Today => Some(Local::now().date_naive()),
            TargetDate::On(date) => Some(*date),
        }
    }
}

impl fmt::Display for TargetDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetDate::Current => write!(f, "current"),
            TargetDate::Today => write!(f, "today"),
            TargetDate::On(date) => write!(f, "{}", date.format(REQUEST_DATE_FORMAT)),
        }
    }
}

/// Strict `YYYY-MM-DD` parse (four-digit year, two-digit month and day).
pub fn parse_request_date(input: &str) -> Result<NaiveDate, String> {
    let bytes = input.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shape_ok {
        return Err(input.to_string());
    }
    NaiveDate::parse_from_str(input, REQUEST_DATE_FORMAT).map_err(|_| input.to_string())
}

/// Reference-date layout tokens and their strftime equivalents, longest first
/// so that `2006` wins over `06` and `January` over `Jan`.
const LAYOUT_TOKENS: &[(&str, &str)] = &[
    ("January", "%B"),
    ("Monday", "%A"),
    ("2006", "%Y"),
    ("Jan", "%b"),
    ("Mon", "%a"),
    ("MST", "%Z"),
    ("01", "%m"),
    ("02", "%d"),
    ("06", "%y"),
    ("15", "%H"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("PM", "%p"),
];

/// Turn a date-format specifier into a strftime template.
///
/// Templates containing `%` are already strftime. Anything else is read as a
/// reference-date layout (`2006-01-02`, `20060102`, `02-01-2006`) and
/// translated token by token; unrecognised characters are literals.
pub fn to_strftime(spec: &str) -> String {
    if spec.contains('%') {
        return spec.to_string();
    }

    let mut out = String::with_capacity(spec.len() * 2);
    let mut rest = spec;
    'outer: while !rest.is_empty() {
        for (token, directive) in LAYOUT_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(directive);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// Render a date with a descriptor's date-format specifier.
///
/// The date is formatted as midnight UTC, so time-of-day directives render
/// as `00`, `%p` as `AM` and `%Z` as `UTC`.
pub fn render_date(date: NaiveDate, spec: &str) -> String {
    use std::fmt::Write;

    let template = to_strftime(spec);
    let midnight = date.and_time(NaiveTime::MIN).and_utc();
    let mut rendered = String::new();
    // Only an unknown strftime directive makes Display fail.
    if write!(rendered, "{}", midnight.format(&template)).is_err() {
        warn!(format = spec, "unsupported date format, using YYYY-MM-DD");
        rendered.clear();
        rendered.push_str(&date.format(REQUEST_DATE_FORMAT).to_string());
    }
    rendered
}

/// Where a request's file lives on every host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Base name, used for display and for naming saved views.
    pub file_name: String,
    /// Full remote path probed and read on each host.
    pub remote_path: String,
}

impl ResolvedTarget {
    /// Remote directory holding the file, if the path names one.
    pub fn directory(&self) -> Option<&str> {
        self.remote_path.rfind('/').map(|idx| {
            if idx == 0 {
                "/"
            } else {
                &self.remote_path[..idx]
            }
        })
    }
}

/// Substitute `{date}` in the pattern and place the result next to `log_path`.
///
/// With no date (or an empty pattern) the live `log_path` is returned as is.
/// When `log_path` has no directory component the rendered pattern is used
/// verbatim as the remote path.
pub fn resolve_target(app: &ApplicationDescriptor, date: Option<NaiveDate>) -> ResolvedTarget {
    let date = match date {
        Some(date) if !app.log_pattern.is_empty() => date,
        _ => {
            return ResolvedTarget {
                file_name: base_name(&app.log_path).to_string(),
                remote_path: app.log_path.clone(),
            }
        }
    };

    let file_name = app
        .log_pattern
        .replace(DATE_PLACEHOLDER, &render_date(date, &app.date_format));

    let remote_path = match app.log_path.rfind('/') {
        Some(idx) => format!("{}{}", &app.log_path[..=idx], file_name),
        None => file_name.clone(),
    };

    ResolvedTarget {
        file_name,
        remote_path,
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// The literal part of a pattern before `{date}`, used to filter listings.
pub fn pattern_prefix(pattern: &str) -> &str {
    match pattern.find(DATE_PLACEHOLDER) {
        Some(idx) => &pattern[..idx],
        None => pattern,
    }
}
