//! Filters available to theme templates.

use std::collections::HashMap;
use std::fmt::Write;

use serde_json::Value;
use tera::{Error, Tera};

use crate::model::parse_timestamp;

pub type FilterFn = fn(&Value, &HashMap<String, Value>) -> tera::Result<Value>;

/// Named filters registered on every template set a renderer builds.
#[derive(Clone, Default)]
pub struct FunctionTable {
    filters: Vec<(&'static str, FilterFn)>,
}

impl FunctionTable {
    /// `add`, `format_time` and `limit_sentence`.
    pub fn standard() -> Self {
        Self::default()
            .with_filter("add", add)
            .with_filter("format_time", format_time)
            .with_filter("limit_sentence", limit_sentence)
    }

    /// Adds a filter, replacing any earlier one with the same name.
    pub fn with_filter(mut self, name: &'static str, filter: FilterFn) -> Self {
        self.filters.retain(|(n, _)| *n != name);
        self.filters.push((name, filter));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.filters.iter().map(|(name, _)| *name)
    }

    pub fn register(&self, tera: &mut Tera) {
        for (name, filter) in &self.filters {
            tera.register_filter(name, *filter);
        }
    }
}

fn arg<'a>(filter: &str, args: &'a HashMap<String, Value>, name: &str) -> tera::Result<&'a Value> {
    args.get(name)
        .ok_or_else(|| Error::msg(format!("{} filter requires a `{}` argument", filter, name)))
}

fn int_arg(filter: &str, args: &HashMap<String, Value>, name: &str) -> tera::Result<i64> {
    arg(filter, args, name)?
        .as_i64()
        .ok_or_else(|| Error::msg(format!("{} filter: `{}` must be an integer", filter, name)))
}

/// Usage: `{{ current_page | add(n=1) }}`
fn add(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let lhs = value
        .as_i64()
        .ok_or_else(|| Error::msg("add filter requires an integer"))?;
    let rhs = int_arg("add", args, "n")?;

    lhs.checked_add(rhs)
        .map(Value::from)
        .ok_or_else(|| Error::msg("add filter overflowed"))
}

/// Reformats a content timestamp with a chrono format string.
/// Usage: `{{ created_at | format_time(format="%d %B %Y") }}`
fn format_time(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let format = arg("format_time", args, "format")?
        .as_str()
        .ok_or_else(|| Error::msg("format_time filter: `format` must be a string"))?;

    let Some(ts) = value.as_str().and_then(|s| parse_timestamp(s).ok()) else {
        return Ok(Value::String(String::new()));
    };

    let mut formatted = String::new();
    write!(formatted, "{}", ts.format(format))
        .map_err(|_| Error::msg(format!("format_time filter: invalid format {:?}", format)))?;

    Ok(Value::String(formatted))
}

/// Usage: `{{ excerpt | limit_sentence(n=2) }}`
fn limit_sentence(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let src = value
        .as_str()
        .ok_or_else(|| Error::msg("limit_sentence filter requires a string"))?;
    let n = int_arg("limit_sentence", args, "n")?;

    Ok(Value::String(first_sentences(src, n.max(0) as usize).to_string()))
}

/// The first `n` sentences of `src`, terminators included. Sentences end at
/// `.`, `?`, `!` or a newline.
pub fn first_sentences(src: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }

    src.match_indices(['.', '?', '!', '\n'])
        .nth(n - 1)
        .map(|(i, t)| &src[..i + t.len()])
        .unwrap_or(src)
}
