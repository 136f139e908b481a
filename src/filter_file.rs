use crate::filters::{Clock, Filter, FilterError, Operator};
use crate::format::parse_size;
use serde::Deserialize;
use std::path::Path;

// --- TOML deserialization types ---

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FilterDef {
    All(AllDef),
    Any(AnyDef),
    Leaf(LeafDef),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllDef {
    pub all: Vec<FilterDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnyDef {
    pub any: Vec<FilterDef>,
}

/// A table of predicates. Several keys in one table must all hold.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeafDef {
    #[serde(default)]
    pub older_than_days: Option<u32>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub larger_than: Option<String>,
    #[serde(default)]
    pub smaller_than: Option<String>,
    #[serde(default)]
    pub read: Option<bool>,
    #[serde(default)]
    pub has_attachment: Option<bool>,
}

// --- Loading and compilation ---

const ROOT_PATH: &str = "filter";

pub fn load_filter(path: &Path, clock: &dyn Clock) -> Result<Filter, FilterError> {
    let file = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| FilterError::Definition {
        path: file.clone(),
        message: format!("failed to read filter file: {}", e),
    })?;
    parse_filter(&content, clock).map_err(|e| match e {
        FilterError::Definition { path, message } => FilterError::Definition {
            path: format!("{}: {}", file, path),
            message,
        },
        other => other,
    })
}

pub fn parse_filter(content: &str, clock: &dyn Clock) -> Result<Filter, FilterError> {
    let def: FilterDef = toml::from_str(content).map_err(|e| FilterError::Definition {
        path: ROOT_PATH.to_string(),
        message: format!("failed to parse filter TOML: {}", e.message()),
    })?;
    compile_filter(def, ROOT_PATH, clock)
}

pub fn compile_filter(
    def: FilterDef,
    path: &str,
    clock: &dyn Clock,
) -> Result<Filter, FilterError> {
    match def {
        FilterDef::All(group) => {
            compile_group(group.all, Operator::And, &format!("{}.all", path), clock)
        }
        FilterDef::Any(group) => {
            compile_group(group.any, Operator::Or, &format!("{}.any", path), clock)
        }
        FilterDef::Leaf(leaf) => compile_leaf(leaf, path, clock),
    }
}

fn compile_group(
    defs: Vec<FilterDef>,
    operator: Operator,
    path: &str,
    clock: &dyn Clock,
) -> Result<Filter, FilterError> {
    let children = defs
        .into_iter()
        .enumerate()
        .map(|(idx, def)| compile_filter(def, &format!("{}[{}]", path, idx), clock))
        .collect::<Result<Vec<_>, _>>()?;

    Filter::composite(children, operator).map_err(|e| definition_error(path, e))
}

fn compile_leaf(leaf: LeafDef, path: &str, clock: &dyn Clock) -> Result<Filter, FilterError> {
    let at = |key: &str| format!("{}.{}", path, key);
    let mut filters = Vec::new();

    if let Some(days) = leaf.older_than_days {
        let filter = Filter::older_than(days, clock)
            .map_err(|e| definition_error(&at("older_than_days"), e))?;
        filters.push(filter);
    }
    if let Some(date) = leaf.before {
        let filter =
            Filter::before_str(&date).map_err(|e| definition_error(&at("before"), e))?;
        filters.push(filter);
    }
    if let Some(pattern) = leaf.from {
        let filter = Filter::sender(&pattern).map_err(|e| definition_error(&at("from"), e))?;
        filters.push(filter);
    }
    if let Some(pattern) = leaf.subject {
        let filter =
            Filter::subject(&pattern).map_err(|e| definition_error(&at("subject"), e))?;
        filters.push(filter);
    }
    if let Some(label) = leaf.label {
        filters.push(Filter::label(&label));
    }

    let min = leaf
        .larger_than
        .map(|s| parse_size(&s).map_err(|e| definition_error(&at("larger_than"), e)))
        .transpose()?;
    let max = leaf
        .smaller_than
        .map(|s| parse_size(&s).map_err(|e| definition_error(&at("smaller_than"), e)))
        .transpose()?;
    if min.is_some() || max.is_some() {
        filters.push(Filter::size(min, max).map_err(|e| definition_error(path, e))?);
    }

    if let Some(read) = leaf.read {
        filters.push(Filter::read_status(read));
    }
    if let Some(want) = leaf.has_attachment {
        filters.push(Filter::has_attachment(want));
    }

    Filter::combine(filters, Operator::And).ok_or_else(|| FilterError::Definition {
        path: path.to_string(),
        message: "empty filter table".to_string(),
    })
}

fn definition_error(path: &str, err: FilterError) -> FilterError {
    FilterError::Definition {
        path: path.to_string(),
        message: err.to_string(),
    }
}
