//! Query compilation: raw text + structured filters into a [`CompiledQuery`].
//!
//! A compiled query is a primary text clause AND-combined with zero or more
//! filter clauses. Values inside one filter clause are OR-combined and matched
//! as exact terms, never as sub-text searches.

use std::fmt;

use crate::model::types::RegistrationStatus;

/// Fields a filter clause may constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    CourseId,
    Section,
    Team,
    RegistrationStatus,
}

impl FilterField {
    pub const fn name(self) -> &'static str {
        match self {
            Self::CourseId => "courseId",
            Self::Section => "section",
            Self::Team => "team",
            Self::RegistrationStatus => "registrationStatus",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryClause {
    MatchAll,
    /// Trimmed free text. Empty text matches everything.
    Text(String),
}

impl PrimaryClause {
    pub fn matches_all(&self) -> bool {
        match self {
            Self::MatchAll => true,
            Self::Text(text) => text.is_empty(),
        }
    }
}

/// One exact-match constraint. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    field: FilterField,
    values: Vec<String>,
}

impl FilterClause {
    pub fn field(&self) -> FilterField {
        self.field
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    primary: PrimaryClause,
    filters: Vec<FilterClause>,
}

impl CompiledQuery {
    /// Compile raw user text.
    ///
    /// The bare literals `REGISTERED` / `UNREGISTERED` (any case, any padding)
    /// become a match-all query with a `registrationStatus` clause, so the token
    /// selects students by status instead of by free-text occurrence.
    pub fn compile(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(status) = RegistrationStatus::parse(trimmed) {
            let mut query = Self {
                primary: PrimaryClause::MatchAll,
                filters: Vec::new(),
            };
            query.add_filter(FilterField::RegistrationStatus, Some(status.as_str()));
            return query;
        }
        Self {
            primary: PrimaryClause::Text(trimmed.to_string()),
            filters: Vec::new(),
        }
    }

    pub fn primary(&self) -> &PrimaryClause {
        &self.primary
    }

    pub fn filters(&self) -> &[FilterClause] {
        &self.filters
    }

    pub fn filter_for(&self, field: FilterField) -> impl Iterator<Item = &FilterClause> {
        self.filters.iter().filter(move |c| c.field == field)
    }

    /// Add a single-value clause. Absent or blank values are a no-op.
    /// Returns whether a clause was added.
    pub fn add_filter(&mut self, field: FilterField, value: Option<&str>) -> bool {
        self.add_filter_values(field, value)
    }

    /// Add one OR-combined clause over `values`. Blank entries are dropped and
    /// duplicates collapsed; if nothing remains the call is a no-op.
    pub fn add_filter_values<I, S>(&mut self, field: FilterField, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kept: Vec<String> = Vec::new();
        for value in values {
            let value = value.as_ref();
            if value.trim().is_empty() || kept.iter().any(|k| k == value) {
                continue;
            }
            kept.push(value.to_string());
        }
        if kept.is_empty() {
            return false;
        }
        self.filters.push(FilterClause {
            field,
            values: kept,
        });
        true
    }

    /// Structured registration filter: trimmed and uppercased before use.
    pub fn add_registration_filter(&mut self, raw: Option<&str>) -> bool {
        let normalized = raw.map(|r| r.trim().to_uppercase());
        self.add_filter(FilterField::RegistrationStatus, normalized.as_deref())
    }

    /// Render in Lucene/Solr syntax with every filter value quoted and escaped.
    pub fn to_query_string(&self) -> String {
        let primary = match &self.primary {
            PrimaryClause::MatchAll => "*:*".to_string(),
            PrimaryClause::Text(text) if text.is_empty() => "*:*".to_string(),
            PrimaryClause::Text(text) => text.clone(),
        };
        let mut out = primary;
        for clause in &self.filters {
            let quoted: Vec<String> = clause.values.iter().map(|v| quote_term(v)).collect();
            out.push_str(" +");
            out.push_str(clause.field.name());
            out.push(':');
            if quoted.len() == 1 {
                out.push_str(&quoted[0]);
            } else {
                out.push('(');
                out.push_str(&quoted.join(" OR "));
                out.push(')');
            }
        }
        out
    }
}

/// Quote a value as a phrase term, escaping `\` and `"`.
pub fn quote_term(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if ch == '\\' || ch == '"' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}
