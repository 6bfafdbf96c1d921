//! Arguments for a selection against one table.
//!
//! `QueryArgs` carries everything a backing store needs besides the table
//! name and projection: an optional selection with `?` placeholders and its
//! typed arguments, grouping, ordering, and a row limit. Built through a
//! chainable builder; an empty `QueryArgs` selects everything.

use serde::Serialize;

use crate::value::StoreValue;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QueryArgs {
    distinct: bool,
    selection: Option<String>,
    selection_args: Vec<StoreValue>,
    group_by: Option<String>,
    having: Option<String>,
    order_by: Option<String>,
    limit: Option<u64>,
}

impl QueryArgs {
    /// Starts building a query description.
    pub fn builder() -> QueryArgsBuilder {
        QueryArgsBuilder {
            args: QueryArgs::default(),
        }
    }

    /// Selects every row of the table.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn distinct(&self) -> bool {
        self.distinct
    }

    /// Row filter with `?` placeholders, if any.
    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// Values replacing the placeholders, in placeholder order.
    pub fn selection_args(&self) -> &[StoreValue] {
        &self.selection_args
    }

    pub fn group_by(&self) -> Option<&str> {
        self.group_by.as_deref()
    }

    pub fn having(&self) -> Option<&str> {
        self.having.as_deref()
    }

    pub fn order_by(&self) -> Option<&str> {
        self.order_by.as_deref()
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }
}

/// Chainable builder for [`QueryArgs`].
pub struct QueryArgsBuilder {
    args: QueryArgs,
}

impl QueryArgsBuilder {
    pub fn distinct(mut self, distinct: bool) -> Self {
        self.args.distinct = distinct;
        self
    }

    pub fn selection(mut self, selection: &str) -> Self {
        self.args.selection = Some(selection.to_string());
        self
    }

    pub fn selection_args(mut self, args: impl Into<Vec<StoreValue>>) -> Self {
        self.args.selection_args = args.into();
        self
    }

    pub fn group_by(mut self, group_by: &str) -> Self {
        self.args.group_by = Some(group_by.to_string());
        self
    }

    pub fn having(mut self, having: &str) -> Self {
        self.args.having = Some(having.to_string());
        self
    }

    pub fn order_by(mut self, order_by: &str) -> Self {
        self.args.order_by = Some(order_by.to_string());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.args.limit = Some(limit);
        self
    }

    pub fn build(self) -> QueryArgs {
        self.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_selects_everything() {
        let args = QueryArgs::all();
        assert!(!args.distinct());
        assert_eq!(args.selection(), None);
        assert!(args.selection_args().is_empty());
        assert_eq!(args.order_by(), None);
        assert_eq!(args.limit(), None);
    }

    #[test]
    fn builder_sets_every_field() {
        let args = QueryArgs::builder()
            .distinct(true)
            .selection("first=?")
            .selection_args(vec![StoreValue::Text("Ada".into())])
            .group_by("last")
            .having("count(*) > 1")
            .order_by("last DESC")
            .limit(10)
            .build();
        assert!(args.distinct());
        assert_eq!(args.selection(), Some("first=?"));
        assert_eq!(args.selection_args(), &[StoreValue::Text("Ada".into())]);
        assert_eq!(args.group_by(), Some("last"));
        assert_eq!(args.having(), Some("count(*) > 1"));
        assert_eq!(args.order_by(), Some("last DESC"));
        assert_eq!(args.limit(), Some(10));
    }
}
