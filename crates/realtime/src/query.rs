//! Select queries against the remote store.
//!
//! Only the shapes the realtime layer issues are modelled: equality filters,
//! ordering, and an offset/limit range.

use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Equality filter on one column (`column=eq.value`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Returns true if the row's column has this filter's value.
    pub fn matches(&self, row: &Value) -> bool {
        row.get(&self.column)
            .and_then(value_text)
            .map_or(false, |text| text == self.value)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=eq.{}", self.column, self.value)
    }
}

/// One ordering key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl Order {
    /// Compares two rows on this key. Missing and null values sort first.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let cmp = compare_values(a.get(&self.column), b.get(&self.column));
        match self.direction {
            Direction::Asc => cmp,
            Direction::Desc => cmp.reverse(),
        }
    }
}

/// Offset/limit window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    pub offset: usize,
    pub limit: usize,
}

/// A select against one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectQuery {
    pub table: String,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub range: Option<Range>,
}

impl SelectQuery {
    /// Selects every row of a table.
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
        }
    }

    /// Adds an equality filter.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    /// Adds an ordering key. Keys apply in the order they were added.
    pub fn order(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order.push(Order {
            column: column.into(),
            direction,
        });
        self
    }

    /// Restricts the result to `limit` rows starting at `offset`.
    pub fn range(mut self, offset: usize, limit: usize) -> Self {
        self.range = Some(Range { offset, limit });
        self
    }

    /// Returns true if the row passes every filter.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Filters, orders and windows a set of rows the way the store would.
    pub fn execute<'a, I>(&self, rows: I) -> Vec<Value>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut selected: Vec<Value> = rows.into_iter().filter(|r| self.matches(r)).cloned().collect();
        selected.sort_by(|a, b| {
            self.order
                .iter()
                .map(|o| o.compare(a, b))
                .find(|cmp| *cmp != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        if let Some(range) = self.range {
            let len = selected.len();
            let start = range.offset.min(len);
            let end = range.offset.saturating_add(range.limit).min(len);
            selected.truncate(end);
            selected.drain(..start);
        }
        selected
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?select=*", self.table)?;
        for filter in &self.filters {
            write!(f, "&{}", filter)?;
        }
        if !self.order.is_empty() {
            f.write_str("&order=")?;
            for (i, order) in self.order.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                let dir = match order.direction {
                    Direction::Asc => "asc",
                    Direction::Desc => "desc",
                };
                write!(f, "{}.{}", order.column, dir)?;
            }
        }
        if let Some(range) = self.range {
            write!(f, "&offset={}&limit={}", range.offset, range.limit)?;
        }
        Ok(())
    }
}

/// Text form of a scalar column value, as used by equality filters.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (Some(av), Some(bv)) => match (av, bv) {
            (Value::Number(x), Value::Number(y)) => {
                let x = x.as_f64().unwrap_or(0.0);
                let y = y.as_f64().unwrap_or(0.0);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => value_text(av).cmp(&value_text(bv)),
        },
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
