use crate::mailbox::EmailSummary;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("invalid operator '{0}' (expected AND or OR)")]
    InvalidOperator(String),
    #[error("invalid size format: {0}")]
    InvalidSize(String),
    #[error("invalid size bounds: minimum {min} exceeds maximum {max}")]
    InvalidSizeBounds { min: u64, max: u64 },
    #[error("day count must be a positive number of days, got {0}")]
    InvalidDays(u32),
    #[error("day count {0} is out of range")]
    DaysOutOfRange(u32),
    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("composite filter needs at least one child filter")]
    EmptyComposite,
    #[error("{path}: {message}")]
    Definition { path: String, message: String },
}

/// Source of the current time, read once when a relative date filter is built.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

impl FromStr for Operator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AND" => Ok(Operator::And),
            "OR" => Ok(Operator::Or),
            _ => Err(FilterError::InvalidOperator(s.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::And => write!(f, "AND"),
            Operator::Or => write!(f, "OR"),
        }
    }
}

/// How a date filter's cutoff was specified. Drives the query fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateCutoff {
    DaysOld(u32),
    Before(NaiveDate),
}

/// A `*`/`?` glob compiled to an unanchored, case-insensitive regex.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    pattern: String,
    regex: Regex,
}

impl WildcardPattern {
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        let mut source = String::with_capacity(pattern.len() * 2);
        for ch in pattern.chars() {
            match ch {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                c => source.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
            }
        }

        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| FilterError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        Ok(WildcardPattern {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Well-known Gmail system labels and the search operator that selects them.
const LABEL_QUERY_MAP: &[(&str, &str)] = &[
    ("promotions", "category:promotions"),
    ("social", "category:social"),
    ("updates", "category:updates"),
    ("forums", "category:forums"),
    ("spam", "in:spam"),
    ("trash", "in:trash"),
    ("inbox", "in:inbox"),
    ("sent", "in:sent"),
];

const UNREAD_LABEL: &str = "UNREAD";

#[derive(Debug, Clone)]
pub enum Filter {
    /// Matches messages dated strictly before `cutoff`.
    Date {
        cutoff: DateTime<Utc>,
        basis: DateCutoff,
    },
    Sender(WildcardPattern),
    Label(String),
    /// Inclusive bounds in bytes; `None` leaves that side open.
    Size {
        min: Option<u64>,
        max: Option<u64>,
    },
    Subject(WildcardPattern),
    ReadStatus {
        want_read: bool,
    },
    /// Only enforced by the server query. Local matching always passes,
    /// since attachment presence is not part of the message metadata.
    HasAttachment {
        want: bool,
    },
    Composite(CompositeFilter),
}

#[derive(Debug, Clone)]
pub struct CompositeFilter {
    children: Vec<Filter>,
    operator: Operator,
}

impl CompositeFilter {
    pub fn new(children: Vec<Filter>, operator: Operator) -> Result<Self, FilterError> {
        if children.is_empty() {
            return Err(FilterError::EmptyComposite);
        }
        Ok(CompositeFilter { children, operator })
    }

    pub fn matches(&self, email: &EmailSummary) -> bool {
        match self.operator {
            Operator::And => self.children.iter().all(|c| c.matches(email)),
            Operator::Or => self.children.iter().any(|c| c.matches(email)),
        }
    }

    pub fn query_fragment(&self) -> String {
        let fragments: Vec<String> = self
            .children
            .iter()
            .filter_map(|child| {
                let fragment = child.query_fragment();
                if fragment.is_empty() {
                    return None;
                }
                // Nested OR groups keep their parentheses inside an AND.
                let grouped = match self.operator {
                    Operator::Or => true,
                    Operator::And => child.is_or_group(),
                };
                Some(if grouped {
                    format!("({})", fragment)
                } else {
                    fragment
                })
            })
            .collect();

        match self.operator {
            Operator::And => fragments.join(" "),
            Operator::Or => fragments.join(" OR "),
        }
    }
}

impl Filter {
    /// Relative cutoff: `clock.now() - days`, fixed at construction.
    pub fn older_than(days: u32, clock: &dyn Clock) -> Result<Self, FilterError> {
        if days == 0 {
            return Err(FilterError::InvalidDays(days));
        }
        let cutoff = clock
            .now()
            .checked_sub_signed(Duration::days(i64::from(days)))
            .ok_or(FilterError::DaysOutOfRange(days))?;
        Ok(Filter::Date {
            cutoff,
            basis: DateCutoff::DaysOld(days),
        })
    }

    /// Absolute cutoff at midnight UTC of `date`.
    pub fn before(date: NaiveDate) -> Result<Self, FilterError> {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| FilterError::InvalidDate(date.to_string()))?;
        Ok(Filter::Date {
            cutoff: Utc.from_utc_datetime(&midnight),
            basis: DateCutoff::Before(date),
        })
    }

    /// Accepts `YYYY-MM-DD` or `YYYY/MM/DD`.
    pub fn before_str(date: &str) -> Result<Self, FilterError> {
        let trimmed = date.trim();
        let parsed = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y/%m/%d"))
            .map_err(|_| FilterError::InvalidDate(date.to_string()))?;
        Self::before(parsed)
    }

    pub fn sender(pattern: &str) -> Result<Self, FilterError> {
        Ok(Filter::Sender(WildcardPattern::new(pattern)?))
    }

    pub fn subject(pattern: &str) -> Result<Self, FilterError> {
        Ok(Filter::Subject(WildcardPattern::new(pattern)?))
    }

    pub fn label(name: &str) -> Self {
        Filter::Label(name.to_string())
    }

    pub fn size(min: Option<u64>, max: Option<u64>) -> Result<Self, FilterError> {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(FilterError::InvalidSizeBounds { min, max });
            }
        }
        Ok(Filter::Size { min, max })
    }

    pub fn read_status(want_read: bool) -> Self {
        Filter::ReadStatus { want_read }
    }

    pub fn has_attachment(want: bool) -> Self {
        Filter::HasAttachment { want }
    }

    pub fn composite(children: Vec<Filter>, operator: Operator) -> Result<Self, FilterError> {
        Ok(Filter::Composite(CompositeFilter::new(children, operator)?))
    }

    /// No filters means no filtering at all; a single filter is used as is.
    pub fn combine(mut filters: Vec<Filter>, operator: Operator) -> Option<Filter> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::Composite(CompositeFilter {
                children: filters,
                operator,
            })),
        }
    }

    fn is_or_group(&self) -> bool {
        matches!(self, Filter::Composite(c) if c.operator == Operator::Or)
    }

    /// Local, exact re-check of a candidate. Malformed data never matches
    /// (dates) or falls back to empty/zero defaults (everything else).
    pub fn matches(&self, email: &EmailSummary) -> bool {
        match self {
            Filter::Date { cutoff, .. } => match parse_header_date(&email.date) {
                Some(date) => date < *cutoff,
                None => false,
            },
            Filter::Sender(pattern) => pattern.is_match(&email.from),
            Filter::Subject(pattern) => pattern.is_match(&email.subject),
            Filter::Label(name) => {
                let wanted = name.to_uppercase();
                let category = format!("CATEGORY_{}", wanted);
                email.labels.iter().any(|label| {
                    let label = label.to_uppercase();
                    label == wanted || label == category
                })
            }
            Filter::Size { min, max } => {
                min.map_or(true, |min| email.size >= min)
                    && max.map_or(true, |max| email.size <= max)
            }
            Filter::ReadStatus { want_read } => {
                let unread = email
                    .labels
                    .iter()
                    .any(|l| l.eq_ignore_ascii_case(UNREAD_LABEL));
                unread != *want_read
            }
            Filter::HasAttachment { .. } => true,
            Filter::Composite(composite) => composite.matches(email),
        }
    }

    /// Fragment of the Gmail search grammar; empty when the filter does not
    /// narrow the server-side search.
    pub fn query_fragment(&self) -> String {
        match self {
            Filter::Date { basis, .. } => match basis {
                DateCutoff::DaysOld(days) => format!("older_than:{}d", days),
                DateCutoff::Before(date) => format!("before:{}", date.format("%Y/%m/%d")),
            },
            Filter::Sender(pattern) => prefixed_fragment("from", pattern.as_str()),
            Filter::Subject(pattern) => prefixed_fragment("subject", pattern.as_str()),
            Filter::Label(name) => {
                let lower = name.to_lowercase();
                LABEL_QUERY_MAP
                    .iter()
                    .find(|(label, _)| *label == lower)
                    .map(|(_, query)| query.to_string())
                    .unwrap_or_else(|| format!("label:{}", name))
            }
            Filter::Size { min, max } => {
                let mut parts = Vec::new();
                if let Some(min) = min {
                    parts.push(format!("larger:{}", min));
                }
                if let Some(max) = max {
                    parts.push(format!("smaller:{}", max));
                }
                parts.join(" ")
            }
            Filter::ReadStatus { want_read } => {
                String::from(if *want_read { "is:read" } else { "is:unread" })
            }
            Filter::HasAttachment { want } => {
                String::from(if *want { "has:attachment" } else { "-has:attachment" })
            }
            Filter::Composite(composite) => composite.query_fragment(),
        }
    }
}

fn prefixed_fragment(operator: &str, pattern: &str) -> String {
    if pattern.is_empty() {
        String::new()
    } else {
        format!("{}:{}", operator, pattern)
    }
}

const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];
const UTC_ZONE_NAMES: [&str; 4] = ["GMT", "UT", "UTC", "Z"];

/// RFC 2822 `Date` header parsing, ignoring a trailing `(comment)` such as
/// `(UTC)` that many mailers append.
///
/// Headers that fail strict parsing get a second, looser pass: the weekday
/// is dropped (mailers often get it wrong), one-digit hours are accepted,
/// and a header with no zone is read as UTC.
pub fn parse_header_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    let value = match trimmed.rfind('(') {
        Some(idx) if trimmed.ends_with(')') => trimmed[..idx].trim_end(),
        _ => trimmed,
    };
    DateTime::parse_from_rfc2822(value)
        .map(|date| date.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_loose_date(value))
}

fn parse_loose_date(value: &str) -> Option<DateTime<Utc>> {
    let mut tokens: Vec<&str> = value.split_whitespace().collect();

    let leading_weekday = tokens.first().is_some_and(|first| {
        let day = first.trim_end_matches(',').to_ascii_lowercase();
        day.chars().all(|c| c.is_ascii_alphabetic())
            && WEEKDAYS.iter().any(|weekday| day.starts_with(weekday))
    });
    if leading_weekday {
        tokens.remove(0);
    }

    let rest = tokens.join(" ");
    for format in ["%d %b %Y %H:%M:%S %z", "%d %b %Y %H:%M %z"] {
        if let Ok(date) = DateTime::parse_from_str(&rest, format) {
            return Some(date.with_timezone(&Utc));
        }
    }

    if tokens
        .last()
        .is_some_and(|zone| UTC_ZONE_NAMES.iter().any(|name| zone.eq_ignore_ascii_case(name)))
    {
        tokens.pop();
    }
    let rest = tokens.join(" ");
    ["%d %b %Y %H:%M:%S", "%d %b %Y %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&rest, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Date { basis, cutoff } => match basis {
                DateCutoff::DaysOld(days) => write!(
                    f,
                    "older than {} days (before {})",
                    days,
                    cutoff.format("%Y-%m-%d %H:%M UTC")
                ),
                DateCutoff::Before(date) => write!(f, "before {}", date.format("%Y-%m-%d")),
            },
            Filter::Sender(pattern) => write!(f, "from ~ \"{}\"", pattern.as_str()),
            Filter::Subject(pattern) => write!(f, "subject ~ \"{}\"", pattern.as_str()),
            Filter::Label(name) => write!(f, "label = {}", name),
            Filter::Size { min, max } => match (min, max) {
                (Some(min), Some(max)) => write!(f, "size in [{}, {}] bytes", min, max),
                (Some(min), None) => write!(f, "size >= {} bytes", min),
                (None, Some(max)) => write!(f, "size <= {} bytes", max),
                (None, None) => write!(f, "any size"),
            },
            Filter::ReadStatus { want_read } => {
                write!(f, "{}", if *want_read { "read" } else { "unread" })
            }
            Filter::HasAttachment { want } => write!(
                f,
                "{} attachments (server-side only)",
                if *want { "with" } else { "without" }
            ),
            Filter::Composite(composite) => {
                let parts: Vec<String> = composite.children.iter().map(|c| c.to_string()).collect();
                let name = match composite.operator {
                    Operator::And => "all",
                    Operator::Or => "any",
                };
                write!(f, "{}({})", name, parts.join(", "))
            }
        }
    }
}
