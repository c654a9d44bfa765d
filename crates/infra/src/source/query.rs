//! SQL for the windowed report query and the current-level lookup.
//!
//! Values are always bound as numbered parameters; the only text spliced into
//! the statements are identifiers, which are quoted when needed.

use std::borrow::Cow;

use chrono::NaiveDate;

use warehouse_core::ProductKey;
use warehouse_inventory::DateWindow;

use super::schema::{FieldKind, LogicalField, ResolvedSchema};
use crate::config::{ImageConfig, TableConfig};

/// Upper bound on keys bound into one current-level statement.
pub const MAX_KEYS_PER_QUERY: usize = 500;

/// A statement plus its positional parameters (`?1` is `params[0]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<String>,
}

#[derive(Debug, Default)]
struct Params(Vec<String>);

impl Params {
    /// Register a value and return its placeholder.
    fn bind(&mut self, value: impl Into<String>) -> String {
        self.0.push(value.into());
        format!("?{}", self.0.len())
    }
}

/// SQLite keywords, sorted for binary search.
const SQLITE_KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT",
    "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS",
    "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE",
    "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE",
    "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET",
    "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED",
    "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN",
    "WHERE", "WINDOW", "WITH", "WITHOUT",
];

fn is_keyword(name: &str) -> bool {
    SQLITE_KEYWORDS
        .binary_search(&name.to_ascii_uppercase().as_str())
        .is_ok()
}

/// Quote `name` unless it is a plain identifier (`[A-Za-z_][A-Za-z0-9_]*`)
/// that is not an SQLite keyword.
pub fn quote_identifier(name: &str) -> Cow<'_, str> {
    let mut chars = name.chars();
    let plain = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !is_keyword(name);
    if plain {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

fn column(table_alias: &str, name: &str) -> String {
    format!("{table_alias}.{}", quote_identifier(name))
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Builds queries against the configured tables for one resolved schema.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    tables: TableConfig,
    images: ImageConfig,
    schema: ResolvedSchema,
}

impl QueryBuilder {
    pub fn new(tables: TableConfig, images: ImageConfig, schema: ResolvedSchema) -> Self {
        Self {
            tables,
            images,
            schema,
        }
    }

    pub fn schema(&self) -> &ResolvedSchema {
        &self.schema
    }

    /// Readings within `window` (both ends inclusive) joined to their metadata.
    ///
    /// The upper bound is expressed as `< end + 1 day` so stored values with a
    /// time suffix on the last day still fall inside the window.
    pub fn build(&self, window: &DateWindow) -> BuiltQuery {
        let t = &self.tables;
        let mut params = Params::default();

        let start = params.bind(iso(window.start));
        let end_exclusive = params.bind(iso(window.end.succ_opt().unwrap_or(NaiveDate::MAX)));

        let mut select = vec![
            format!("CAST({} AS TEXT) AS product_key", column("h", &t.fact_key)),
            format!("CAST({} AS TEXT) AS check_date", column("h", &t.check_date)),
            format!(
                "CAST(COALESCE({}, 0) AS INTEGER) AS quantity_available",
                column("h", &t.quantity)
            ),
        ];

        for field in LogicalField::ALL {
            if field == LogicalField::ImageReference {
                continue;
            }
            let projection = match self.schema.column(field) {
                Some(name) => {
                    let cast = match field.kind() {
                        FieldKind::Text => "TEXT",
                        FieldKind::Real => "REAL",
                    };
                    format!("CAST({} AS {cast}) AS {}", column("a", name), field.alias())
                }
                None => format!("NULL AS {}", field.alias()),
            };
            select.push(projection);
        }

        select.extend(self.image_projections(&mut params));

        let sql = format!(
            "SELECT {select}\n\
             FROM {fact} h\n\
             JOIN {meta} a ON {h_key} = {a_key}\n\
             WHERE {date} >= {start} AND {date} < {end_exclusive}\n\
             ORDER BY brand_name, product_name, product_key, check_date, quantity_available",
            select = select.join(",\n       "),
            fact = quote_identifier(&t.fact_table),
            meta = quote_identifier(&t.metadata_table),
            h_key = column("h", &t.fact_key),
            a_key = column("a", &t.metadata_key),
            date = column("h", &t.check_date),
        );

        BuiltQuery {
            sql,
            params: params.0,
        }
    }

    fn image_projections(&self, params: &mut Params) -> Vec<String> {
        let Some(name) = self.schema.column(LogicalField::ImageReference) else {
            return vec![
                "0 AS has_image".to_string(),
                "NULL AS image_path".to_string(),
                "NULL AS image_url".to_string(),
            ];
        };

        let raw = column("a", name);
        let sentinel = params.bind(self.images.missing_sentinel.clone());
        let prefix = params.bind(self.images.storage_prefix.clone());
        let api_base = params.bind(self.images.api_base.clone());
        let present = format!("{raw} IS NOT NULL AND {raw} != '' AND {raw} != {sentinel}");

        vec![
            format!("CASE WHEN {present} THEN 1 ELSE 0 END AS has_image"),
            format!("CASE WHEN {present} THEN CAST({raw} AS TEXT) ELSE NULL END AS image_path"),
            format!(
                "CASE WHEN {present} THEN {api_base} || REPLACE(REPLACE(CAST({raw} AS TEXT), '\\', '/'), {prefix}, '') ELSE NULL END AS image_url"
            ),
        ]
    }

    /// Latest reading over the whole history for each of `keys`.
    ///
    /// Callers split large key sets into chunks of [`MAX_KEYS_PER_QUERY`].
    pub fn current_levels_query(&self, keys: &[ProductKey]) -> BuiltQuery {
        let t = &self.tables;
        let mut params = Params::default();
        let placeholders: Vec<String> = keys.iter().map(|k| params.bind(k.as_str())).collect();

        let fact = quote_identifier(&t.fact_table);
        let key = quote_identifier(&t.fact_key);
        let date = quote_identifier(&t.check_date);

        let sql = format!(
            "SELECT CAST({h_key} AS TEXT) AS product_key,\n       \
                    CAST({h_date} AS TEXT) AS check_date,\n       \
                    CAST(COALESCE({h_qty}, 0) AS INTEGER) AS quantity_available\n\
             FROM {fact} h\n\
             JOIN (SELECT {key} AS latest_key, MAX({date}) AS latest_date\n      \
                   FROM {fact}\n      \
                   WHERE {key} IN ({placeholders})\n      \
                   GROUP BY {key}) l\n  \
               ON {h_key} = l.latest_key AND {h_date} = l.latest_date\n\
             ORDER BY product_key, quantity_available",
            h_key = column("h", &t.fact_key),
            h_date = column("h", &t.check_date),
            h_qty = column("h", &t.quantity),
            placeholders = placeholders.join(", "),
        );

        BuiltQuery {
            sql,
            params: params.0,
        }
    }
}
