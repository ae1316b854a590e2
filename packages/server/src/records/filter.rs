use chrono::{DateTime, Utc};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{ExprTrait, Func, LikeExpr};
use sea_orm::{ColumnTrait, Condition};

use super::ContentRecord;
use crate::entity::content_record;

/// A single `(field, operator, value)` test over a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Substring of `original_filename`, ignoring ASCII case.
    FilenameContains(String),
    /// Substring of `content_type`, ignoring ASCII case.
    ContentTypeContains(String),
    /// `size_bytes >= n`
    SizeAtLeast(i64),
    /// `size_bytes <= n`
    SizeAtMost(i64),
    /// `created_at >= t`
    CreatedAfter(DateTime<Utc>),
    /// `created_at <= t`
    CreatedBefore(DateTime<Utc>),
}

impl Predicate {
    pub fn matches(&self, record: &ContentRecord) -> bool {
        match self {
            Self::FilenameContains(term) => contains_ci(&record.original_filename, term),
            Self::ContentTypeContains(term) => contains_ci(&record.content_type, term),
            Self::SizeAtLeast(n) => record.size_bytes >= *n,
            Self::SizeAtMost(n) => record.size_bytes <= *n,
            Self::CreatedAfter(t) => record.created_at >= *t,
            Self::CreatedBefore(t) => record.created_at <= *t,
        }
    }

    fn condition(&self) -> Condition {
        let cond = Condition::all();
        match self {
            Self::FilenameContains(term) => {
                lower_like(cond, content_record::Column::OriginalFilename, term)
            }
            Self::ContentTypeContains(term) => {
                lower_like(cond, content_record::Column::ContentType, term)
            }
            Self::SizeAtLeast(n) => cond.add(content_record::Column::SizeBytes.gte(*n)),
            Self::SizeAtMost(n) => cond.add(content_record::Column::SizeBytes.lte(*n)),
            Self::CreatedAfter(t) => cond.add(content_record::Column::CreatedAt.gte(*t)),
            Self::CreatedBefore(t) => cond.add(content_record::Column::CreatedAt.lte(*t)),
        }
    }
}

/// Conjunction of predicates. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    predicates: Vec<Predicate>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate; all predicates must hold.
    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Evaluate the filter in memory.
    pub fn matches(&self, record: &ContentRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }

    /// Compile the filter into a SQL condition.
    pub fn condition(&self) -> Condition {
        self.predicates
            .iter()
            .fold(Condition::all(), |acc, p| acc.add(p.condition()))
    }
}

/// Only ASCII letters are folded, matching SQLite's `LOWER` and `LIKE`.
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

fn lower_like(cond: Condition, column: content_record::Column, term: &str) -> Condition {
    let pattern = format!("%{}%", escape_like(&term.to_ascii_lowercase()));
    cond.add(Expr::expr(Func::lower(Expr::col(column))).like(LikeExpr::new(pattern).escape('\\')))
}

/// Escape LIKE wildcard characters in a search string.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
