//! Typed filters over `plugin_outputs` and their translation to SQL.
//!
//! Filters arrive from the reporting layer as loose string-or-list
//! parameters. They are validated once, when the `OutputFilter` is built,
//! so the query builder itself never fails.

use std::collections::HashMap;

use rusqlite::types::ToSql;
use serde::{Deserialize, Serialize};

use crate::error::ParamError;
use crate::models::{MAX_RANK, UNRANKED};

/// A loosely-typed filter parameter: one string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    List(Vec<String>),
}

impl ParamValue {
    fn is_empty(&self) -> bool {
        match self {
            ParamValue::Single(s) => s.is_empty(),
            ParamValue::List(values) => values.is_empty(),
        }
    }

    fn first(&self) -> Option<&str> {
        match self {
            ParamValue::Single(s) => Some(s.as_str()),
            ParamValue::List(values) => values.first().map(String::as_str),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        ParamValue::List(values.into_iter().map(str::to_string).collect())
    }
}

/// A validated filter value: equality for `One`, membership for `Many`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> FilterValue<T> {
    pub fn values(&self) -> &[T] {
        match self {
            FilterValue::One(v) => std::slice::from_ref(v),
            FilterValue::Many(values) => values,
        }
    }
}

impl From<&str> for FilterValue<String> {
    fn from(value: &str) -> Self {
        FilterValue::One(value.to_string())
    }
}

impl From<String> for FilterValue<String> {
    fn from(value: String) -> Self {
        FilterValue::One(value)
    }
}

impl From<Vec<&str>> for FilterValue<String> {
    fn from(values: Vec<&str>) -> Self {
        FilterValue::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for FilterValue<String> {
    fn from(values: Vec<String>) -> Self {
        FilterValue::Many(values)
    }
}

impl From<i32> for FilterValue<i32> {
    fn from(value: i32) -> Self {
        FilterValue::One(value)
    }
}

impl From<Vec<i32>> for FilterValue<i32> {
    fn from(values: Vec<i32>) -> Self {
        FilterValue::Many(values)
    }
}

/// Whether a query needs deterministic ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Ascending by plugin key; used by reads.
    Ordered,
    /// No ORDER BY; used by bulk delete, which only needs completeness.
    Unordered,
}

/// Conjunctive filter over one target's results. Absent fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputFilter {
    pub plugin_key: Option<FilterValue<String>>,
    pub plugin_type: Option<FilterValue<String>>,
    pub plugin_group: Option<FilterValue<String>>,
    pub plugin_code: Option<FilterValue<String>>,
    pub status: Option<FilterValue<String>>,
    pub user_rank: Option<FilterValue<i32>>,
    pub owtf_rank: Option<FilterValue<i32>>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl OutputFilter {
    /// Matches every result of the target.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a filter from loose request parameters.
    ///
    /// Empty strings and empty lists count as absent; unknown keys are ignored.
    pub fn from_params(params: &HashMap<String, ParamValue>) -> Result<Self, ParamError> {
        let get = |name: &str| params.get(name).filter(|v| !v.is_empty());

        Ok(Self {
            plugin_key: get("plugin_key").map(string_filter),
            plugin_type: get("plugin_type").map(string_filter),
            plugin_group: get("plugin_group").map(string_filter),
            plugin_code: get("plugin_code").map(string_filter),
            status: get("status").map(string_filter),
            user_rank: get("user_rank")
                .map(|v| int_filter("user_rank", v))
                .transpose()?,
            owtf_rank: get("owtf_rank")
                .map(|v| int_filter("owtf_rank", v))
                .transpose()?,
            offset: get("offset").map(|v| first_u64("offset", v)).transpose()?,
            limit: get("limit").map(|v| first_u64("limit", v)).transpose()?,
        })
    }

    /// Filter selecting exactly one natural key within a target.
    pub fn natural_key(group: &str, plugin_type: &str, code: &str) -> Self {
        Self::default()
            .plugin_group(group)
            .plugin_type(plugin_type)
            .plugin_code(code)
    }

    pub fn plugin_key(mut self, value: impl Into<FilterValue<String>>) -> Self {
        self.plugin_key = Some(value.into());
        self
    }

    pub fn plugin_type(mut self, value: impl Into<FilterValue<String>>) -> Self {
        self.plugin_type = Some(value.into());
        self
    }

    pub fn plugin_group(mut self, value: impl Into<FilterValue<String>>) -> Self {
        self.plugin_group = Some(value.into());
        self
    }

    pub fn plugin_code(mut self, value: impl Into<FilterValue<String>>) -> Self {
        self.plugin_code = Some(value.into());
        self
    }

    pub fn status(mut self, value: impl Into<FilterValue<String>>) -> Self {
        self.status = Some(value.into());
        self
    }

    pub fn user_rank(mut self, value: impl Into<FilterValue<i32>>) -> Self {
        self.user_rank = Some(value.into());
        self
    }

    pub fn owtf_rank(mut self, value: impl Into<FilterValue<i32>>) -> Self {
        self.owtf_rank = Some(value.into());
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Translates the filter into SQL scoped to `target_id`.
    pub(crate) fn to_sql(&self, target_id: i64, mode: QueryMode) -> SqlFilter {
        let mut sql = SqlFilter::default();
        sql.push_condition("target_id = ?", vec![Box::new(target_id) as Box<dyn ToSql>]);

        sql.push_value("plugin_key", self.plugin_key.as_ref());
        sql.push_value("plugin_type", self.plugin_type.as_ref());
        sql.push_value("plugin_group", self.plugin_group.as_ref());
        sql.push_value("plugin_code", self.plugin_code.as_ref());
        sql.push_value("status", self.status.as_ref());
        sql.push_value("user_rank", self.user_rank.as_ref());
        sql.push_value("owtf_rank", self.owtf_rank.as_ref());

        if mode == QueryMode::Ordered {
            sql.tail
                .push_str(" ORDER BY plugin_key ASC, plugin_group ASC");
        }

        // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded.
        match (self.limit, self.offset) {
            (None, None) => {}
            (limit, offset) => {
                let limit = limit.map(saturating_i64).unwrap_or(-1);
                let offset = offset.map(saturating_i64).unwrap_or(0);
                sql.tail.push_str(" LIMIT ? OFFSET ?");
                sql.tail_params.push(Box::new(limit));
                sql.tail_params.push(Box::new(offset));
            }
        }

        sql
    }
}

fn string_filter(value: &ParamValue) -> FilterValue<String> {
    match value {
        ParamValue::Single(s) => FilterValue::One(s.clone()),
        ParamValue::List(values) => FilterValue::Many(values.clone()),
    }
}

fn parse_i32(field: &str, raw: &str) -> Result<i32, ParamError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| ParamError::NotAnInteger {
            field: field.to_string(),
            value: raw.to_string(),
        })
}

fn int_filter(field: &str, value: &ParamValue) -> Result<FilterValue<i32>, ParamError> {
    match value {
        ParamValue::Single(s) => Ok(FilterValue::One(parse_i32(field, s)?)),
        ParamValue::List(values) => values
            .iter()
            .map(|v| parse_i32(field, v))
            .collect::<Result<Vec<_>, _>>()
            .map(FilterValue::Many),
    }
}

/// Bounds set through the builder may exceed what SQLite binds.
fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Parses a pagination bound. SQLite binds integers as `i64`.
fn first_u64(field: &str, value: &ParamValue) -> Result<u64, ParamError> {
    let raw = value.first().unwrap_or_default();
    let parsed = raw.trim().parse::<u64>().map_err(|_| ParamError::NotAnInteger {
        field: field.to_string(),
        value: raw.to_string(),
    })?;
    i64::try_from(parsed)
        .map(|_| parsed)
        .map_err(|_| ParamError::OutOfRange {
            field: field.to_string(),
            value: parsed.to_string(),
            min: 0,
            max: i64::MAX,
        })
}

/// SQL fragments produced from an `OutputFilter`.
///
/// Placeholders are positional `?`, so `params()` must be bound in order.
#[derive(Default)]
pub(crate) struct SqlFilter {
    conditions: Vec<String>,
    where_params: Vec<Box<dyn ToSql>>,
    tail: String,
    tail_params: Vec<Box<dyn ToSql>>,
}

impl SqlFilter {
    fn push_condition(&mut self, condition: &str, params: Vec<Box<dyn ToSql>>) {
        self.conditions.push(condition.to_string());
        self.where_params.extend(params);
    }

    fn push_value<T>(&mut self, column: &'static str, value: Option<&FilterValue<T>>)
    where
        T: ToSql + Clone + 'static,
    {
        let Some(value) = value else {
            return;
        };
        match value {
            FilterValue::One(v) => {
                let param = Box::new(v.clone()) as Box<dyn ToSql>;
                self.push_condition(&format!("{} = ?", column), vec![param]);
            }
            FilterValue::Many(values) if values.is_empty() => {
                self.push_condition("0", Vec::new());
            }
            FilterValue::Many(values) => {
                let placeholders = vec!["?"; values.len()].join(", ");
                let params = values
                    .iter()
                    .map(|v| Box::new(v.clone()) as Box<dyn ToSql>)
                    .collect();
                self.push_condition(&format!("{} IN ({})", column, placeholders), params);
            }
        }
    }

    pub(crate) fn where_clause(&self) -> String {
        format!("WHERE {}", self.conditions.join(" AND "))
    }

    /// ORDER BY / LIMIT suffix (may be empty).
    pub(crate) fn tail(&self) -> &str {
        &self.tail
    }

    /// All bound parameters, WHERE first then tail.
    pub(crate) fn params(&self) -> Vec<&dyn ToSql> {
        self.where_params
            .iter()
            .chain(self.tail_params.iter())
            .map(|p| p.as_ref())
            .collect()
    }
}

/// Review patch applied to an existing result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputPatch {
    pub user_rank: Option<i32>,
    pub user_notes: Option<String>,
}

impl OutputPatch {
    pub fn rank(user_rank: i32) -> Self {
        Self {
            user_rank: Some(user_rank),
            user_notes: None,
        }
    }

    pub fn notes(mut self, notes: &str) -> Self {
        self.user_notes = Some(notes.to_string());
        self
    }

    /// Builds a patch from loose request parameters; lists use their first element.
    pub fn from_params(params: &HashMap<String, ParamValue>) -> Result<Self, ParamError> {
        let get = |name: &str| params.get(name).filter(|v| !v.is_empty());

        let user_rank = get("user_rank")
            .map(|v| parse_i32("user_rank", v.first().unwrap_or_default()))
            .transpose()?;
        // An empty string clears the notes.
        let user_notes = params
            .get("user_notes")
            .and_then(|v| v.first())
            .map(str::to_string);

        let patch = Self {
            user_rank,
            user_notes,
        };
        patch.validate()?;
        Ok(patch)
    }

    /// Checks that a rank lies in `[-1, 5]`.
    pub fn validate(&self) -> Result<(), ParamError> {
        if let Some(rank) = self.user_rank {
            if !(UNRANKED..=MAX_RANK).contains(&rank) {
                return Err(ParamError::OutOfRange {
                    field: "user_rank".to_string(),
                    value: rank.to_string(),
                    min: UNRANKED as i64,
                    max: MAX_RANK as i64,
                });
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.user_rank.is_none() && self.user_notes.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, ParamValue)]) -> HashMap<String, ParamValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_params_yield_unconstrained_filter() {
        let filter = OutputFilter::from_params(&HashMap::new()).unwrap();
        assert_eq!(filter, OutputFilter::all());

        let sql = filter.to_sql(7, QueryMode::Ordered);
        assert_eq!(sql.where_clause(), "WHERE target_id = ?");
        assert_eq!(sql.tail(), " ORDER BY plugin_key ASC, plugin_group ASC");
        assert_eq!(sql.params().len(), 1);
    }

    #[test]
    fn test_single_and_list_values() {
        let filter = OutputFilter::from_params(&params(&[
            ("plugin_type", "active".into()),
            ("status", vec!["Successful", "Aborted"].into()),
        ]))
        .unwrap();

        assert_eq!(filter.plugin_type, Some(FilterValue::One("active".to_string())));
        assert_eq!(
            filter.status,
            Some(FilterValue::Many(vec![
                "Successful".to_string(),
                "Aborted".to_string()
            ]))
        );

        let sql = filter.to_sql(1, QueryMode::Unordered);
        assert_eq!(
            sql.where_clause(),
            "WHERE target_id = ? AND plugin_type = ? AND status IN (?, ?)"
        );
        assert_eq!(sql.tail(), "");
        assert_eq!(sql.params().len(), 4);
    }

    #[test]
    fn test_rank_values_are_parsed() {
        let filter = OutputFilter::from_params(&params(&[
            ("user_rank", "3".into()),
            ("owtf_rank", vec!["1", " 2 "].into()),
        ]))
        .unwrap();
        assert_eq!(filter.user_rank, Some(FilterValue::One(3)));
        assert_eq!(filter.owtf_rank, Some(FilterValue::Many(vec![1, 2])));
    }

    #[test]
    fn test_non_numeric_rank_names_field() {
        let err = OutputFilter::from_params(&params(&[("user_rank", "x".into())])).unwrap_err();
        assert_eq!(err.field(), "user_rank");

        let err =
            OutputFilter::from_params(&params(&[("owtf_rank", vec!["1", "high"].into())]))
                .unwrap_err();
        assert_eq!(
            err,
            ParamError::NotAnInteger {
                field: "owtf_rank".to_string(),
                value: "high".to_string()
            }
        );
    }

    #[test]
    fn test_pagination_uses_first_element() {
        let filter = OutputFilter::from_params(&params(&[
            ("offset", vec!["5", "9"].into()),
            ("limit", "10".into()),
        ]))
        .unwrap();
        assert_eq!(filter.offset, Some(5));
        assert_eq!(filter.limit, Some(10));

        let sql = filter.to_sql(1, QueryMode::Ordered);
        assert!(sql.tail().ends_with("LIMIT ? OFFSET ?"));
        assert_eq!(sql.params().len(), 3);

        let err = OutputFilter::from_params(&params(&[("limit", "ten".into())])).unwrap_err();
        assert_eq!(err.field(), "limit");
    }

    #[test]
    fn test_pagination_beyond_i64_is_rejected() {
        let too_big = (i64::MAX as u64 + 1).to_string();
        let err =
            OutputFilter::from_params(&params(&[("limit", too_big.as_str().into())])).unwrap_err();
        assert!(matches!(err, ParamError::OutOfRange { ref field, .. } if field == "limit"));

        let huge = u64::MAX.to_string();
        let err =
            OutputFilter::from_params(&params(&[("offset", huge.as_str().into())])).unwrap_err();
        assert_eq!(err.field(), "offset");

        let max = i64::MAX.to_string();
        let filter = OutputFilter::from_params(&params(&[("limit", max.as_str().into())])).unwrap();
        assert_eq!(filter.limit, Some(i64::MAX as u64));
    }

    #[test]
    fn test_builder_pagination_saturates() {
        assert_eq!(saturating_i64(u64::MAX), i64::MAX);
        assert_eq!(saturating_i64(7), 7);
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let filter = OutputFilter::from_params(&params(&[
            ("plugin_group", "".into()),
            ("user_rank", ParamValue::List(vec![])),
            ("unknown", "x".into()),
        ]))
        .unwrap();
        assert_eq!(filter, OutputFilter::all());
    }

    #[test]
    fn test_empty_membership_matches_nothing() {
        let filter = OutputFilter::all().status(Vec::<String>::new());
        let sql = filter.to_sql(1, QueryMode::Ordered);
        assert_eq!(sql.where_clause(), "WHERE target_id = ? AND 0");
    }

    #[test]
    fn test_param_value_deserializes_from_json() {
        let raw: HashMap<String, ParamValue> =
            serde_json::from_str(r#"{"status": "Successful", "plugin_type": ["active", "passive"]}"#)
                .unwrap();
        let filter = OutputFilter::from_params(&raw).unwrap();
        assert_eq!(filter.status, Some(FilterValue::One("Successful".to_string())));
        assert_eq!(filter.plugin_type.unwrap().values().len(), 2);
    }

    #[test]
    fn test_patch_from_params() {
        let patch = OutputPatch::from_params(&params(&[
            ("user_rank", vec!["4"].into()),
            ("user_notes", "confirmed manually".into()),
        ]))
        .unwrap();
        assert_eq!(patch.user_rank, Some(4));
        assert_eq!(patch.user_notes.as_deref(), Some("confirmed manually"));

        let err = OutputPatch::from_params(&params(&[("user_rank", "abc".into())])).unwrap_err();
        assert_eq!(err.field(), "user_rank");

        let err = OutputPatch::from_params(&params(&[("user_rank", "9".into())])).unwrap_err();
        assert!(matches!(err, ParamError::OutOfRange { ref value, .. } if value == "9"));
    }
}
