use rusqlite::types::Value;
use tracing::warn;

use crate::database::queries::{placeholders, BOOK_SELECT_COLS};
use crate::database::tables::DB_BOOKS_NAME;
use crate::model::title::fold_case;
use crate::model::AssocKind;
use crate::search::order::OrderBy;
use crate::search::parser::{ParsedQuery, ScalarKey, ScalarValue};

const BOOK_ALIAS: &str = "b";

/// SQL text plus the values bound to its placeholders, in order
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
    /// Same filters without ordering or pagination
    pub count_sql: String,
    pub count_params: Vec<Value>,
}

/// Escapes LIKE wildcards so they match literally (used with `ESCAPE '\'`)
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn parse_flag(s: &str) -> Option<i64> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(1),
        "0" | "false" | "no" | "n" => Some(0),
        _ => None,
    }
}

/// Bound value for a scalar filter, None if the raw text makes no sense for the column
fn scalar_param(key: ScalarKey, value: &ScalarValue) -> Option<Value> {
    match (key, value) {
        (_, ScalarValue::Id(id)) => Some(Value::Integer(*id)),
        (ScalarKey::Favorite | ScalarKey::Nsfw, ScalarValue::Raw(s)) => {
            parse_flag(s).map(Value::Integer)
        }
        (_, ScalarValue::Raw(s)) => s.trim().parse::<i64>().ok().map(Value::Integer),
    }
}

fn assoc_exists(kind: AssocKind, n: usize) -> String {
    format!(
        "EXISTS (SELECT 1 FROM {join} j JOIN {lookup} l ON l.id = j.{id_col} \
         WHERE j.book_id = {BOOK_ALIAS}.id AND l.name IN ({ph}))",
        join = kind.join_table(),
        lookup = kind.lookup_table(),
        id_col = kind.id_column(),
        ph = placeholders(n),
    )
}

/// WHERE clause body and its parameters
fn where_clause(parsed: &ParsedQuery) -> (String, Vec<Value>) {
    let mut conds: Vec<String> = vec![];
    let mut params: Vec<Value> = vec![];

    if let Some(title) = parsed.title.as_deref().filter(|t| !t.trim().is_empty()) {
        // both sides folded, `casefold` is registered on every connection
        let pattern = format!("%{}%", escape_like(&fold_case(title.trim())));
        conds.push(format!(
            "(casefold({BOOK_ALIAS}.title_eng) LIKE ? ESCAPE '\\' \
             OR casefold({BOOK_ALIAS}.title_foreign) LIKE ? ESCAPE '\\')"
        ));
        params.push(Value::Text(pattern.clone()));
        params.push(Value::Text(pattern));
    }

    for (key, value) in &parsed.scalars {
        match scalar_param(*key, value) {
            Some(v) => {
                conds.push(format!("{BOOK_ALIAS}.{} = ?", key.column()));
                params.push(v);
            }
            None => warn!("Ignoring invalid value {value:?} for '{}'", key.column()),
        }
    }

    // any of the names within one attribute, every attribute has to match
    for (kind, names) in parsed.include.iter().filter(|(_, n)| !n.is_empty()) {
        conds.push(assoc_exists(*kind, names.len()));
        params.extend(names.iter().cloned().map(Value::Text));
    }

    // none of the names; this also wins over an include of the same name
    for (kind, names) in parsed.exclude.iter().filter(|(_, n)| !n.is_empty()) {
        conds.push(format!("NOT {}", assoc_exists(*kind, names.len())));
        params.extend(names.iter().cloned().map(Value::Text));
    }

    if conds.is_empty() {
        ("1 = 1".to_string(), params)
    } else {
        (conds.join(" AND "), params)
    }
}

fn select_cols() -> String {
    BOOK_SELECT_COLS
        .split(',')
        .map(|c| format!("{BOOK_ALIAS}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builds the page query and the count query for a parsed search.
/// `limit` of None returns every row after `offset`.
pub fn compile(
    parsed: &ParsedQuery,
    order: OrderBy,
    limit: Option<i64>,
    offset: i64,
) -> CompiledQuery {
    let (where_sql, where_params) = where_clause(parsed);

    let sql = format!(
        "SELECT {cols} FROM {DB_BOOKS_NAME} {BOOK_ALIAS} WHERE {where_sql} ORDER BY {order} LIMIT ? OFFSET ?",
        cols = select_cols(),
        order = order.to_sql(BOOK_ALIAS),
    );
    let mut params = where_params.clone();
    params.push(Value::Integer(limit.unwrap_or(-1)));
    params.push(Value::Integer(offset.max(0)));

    let count_sql = format!("SELECT COUNT(*) FROM {DB_BOOKS_NAME} {BOOK_ALIAS} WHERE {where_sql}");

    CompiledQuery {
        sql,
        params,
        count_sql,
        count_params: where_params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::order::{SortColumn, SortDirection};
    use std::collections::BTreeMap;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like(r"100%_a\b"), r"100\%\_a\\b");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_empty_query() {
        let q = compile(&ParsedQuery::default(), OrderBy::default(), Some(10), 20);
        assert!(q.sql.contains("WHERE 1 = 1 ORDER BY b.id DESC LIMIT ? OFFSET ?"));
        assert_eq!(q.params, vec![Value::Integer(10), Value::Integer(20)]);
        assert!(q.count_params.is_empty());
    }

    #[test]
    fn test_values_are_bound_not_interpolated() {
        let parsed = ParsedQuery {
            title: Some("'; DROP TABLE books; --".to_string()),
            include: BTreeMap::from([(AssocKind::Tag, vec!["x' OR '1'='1".to_string()])]),
            ..Default::default()
        };
        let q = compile(&parsed, OrderBy::default(), None, 0);
        assert!(!q.sql.contains("DROP"));
        assert!(!q.sql.contains("'1'='1"));
        assert_eq!(q.params[0], Value::Text("%'; drop table books; --%".to_string()));
        assert_eq!(q.params[2], Value::Text("x' OR '1'='1".to_string()));
        assert_eq!(q.params.last(), Some(&Value::Integer(0)));
    }

    #[test]
    fn test_one_subquery_per_attribute() {
        let parsed = ParsedQuery {
            include: BTreeMap::from([
                (AssocKind::Tag, vec!["A".to_string(), "C".to_string()]),
                (AssocKind::Artist, vec!["X".to_string()]),
            ]),
            exclude: BTreeMap::from([(AssocKind::Tag, vec!["B".to_string()])]),
            ..Default::default()
        };
        let q = compile(&parsed, OrderBy::default(), None, 0);
        assert_eq!(q.count_sql.matches("NOT EXISTS").count(), 1);
        assert_eq!(q.count_sql.matches("EXISTS").count(), 3);
        assert!(q.count_sql.contains("l.name IN (?, ?)"));
        assert!(!q.count_sql.contains(" JOIN lkp_book_tag j ON"));
        assert_eq!(q.count_params.len(), 4);
    }

    #[test]
    fn test_scalar_values_are_interpreted() {
        let parsed = ParsedQuery {
            scalars: BTreeMap::from([
                (ScalarKey::Favorite, ScalarValue::Raw("yes".to_string())),
                (ScalarKey::Pages, ScalarValue::Raw("many".to_string())),
                (ScalarKey::LanguageId, ScalarValue::Id(2)),
            ]),
            ..Default::default()
        };
        let q = compile(
            &parsed,
            OrderBy { column: SortColumn::Pages, direction: SortDirection::Asc },
            Some(5),
            0,
        );
        assert!(q.count_sql.contains("b.favorite = ?"));
        assert!(q.count_sql.contains("b.language_id = ?"));
        assert!(!q.count_sql.contains("b.pages = ?"));
        assert_eq!(q.count_params, vec![Value::Integer(1), Value::Integer(2)]);
        assert!(q.sql.contains("ORDER BY b.pages ASC, b.id ASC"));
    }
}
