//! Builds parameterized SELECT, INSERT, UPDATE, DELETE for a module's table.
//! Identifiers come from config only; values are always parameters.

use crate::config::{ColumnDescriptor, ModuleDescriptor};
use crate::record::Criteria;
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a parameter and return its placeholder, cast for the column it feeds.
    fn push_param(&mut self, v: Value, column: Option<&ColumnDescriptor>) -> String {
        self.params.push(v);
        let n = self.params.len();
        match column.and_then(ColumnDescriptor::bind_cast) {
            Some(cast) => format!("${}::{}", n, cast),
            None => format!("${}", n),
        }
    }
}

fn table(module: &ModuleDescriptor) -> String {
    qualified_table(&module.schema_name, &module.table_name)
}

/// SELECT list: custom enum types (schema.typename) and numeric come back as text.
fn select_column_list(module: &ModuleDescriptor) -> String {
    module
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            let pg_type = c.pg_type.as_deref().unwrap_or("");
            if pg_type.contains('.') || pg_type == "numeric" {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// SELECT by primary key.
pub fn select_by_id(module: &ModuleDescriptor, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(Value::from(id), module.column(&module.id_column));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(module),
        table(module),
        quoted(&module.id_column),
        ph
    );
    q
}

/// SELECT with exact-match criteria (array values become IN lists), ordered by `sort_column`
/// when it is a known column, else by the id column. Unknown criteria columns are skipped.
pub fn select_matching(module: &ModuleDescriptor, criteria: &Criteria, sort_column: Option<&str>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    for (col, val) in criteria {
        let Some(column) = module.column(col) else {
            continue;
        };
        match val {
            Value::Array(options) if options.is_empty() => where_parts.push("FALSE".to_string()),
            Value::Array(options) => {
                let phs: Vec<String> = options
                    .iter()
                    .map(|o| q.push_param(o.clone(), Some(column)))
                    .collect();
                where_parts.push(format!("{} IN ({})", quoted(col), phs.join(", ")));
            }
            other => {
                let ph = q.push_param(other.clone(), Some(column));
                where_parts.push(format!("{} = {}", quoted(col), ph));
            }
        }
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let sort = sort_column
        .filter(|s| module.has_column(s))
        .unwrap_or(&module.id_column);
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}",
        select_column_list(module),
        table(module),
        where_clause,
        quoted(sort)
    );
    q
}

/// INSERT the known columns present in `values`; the id column is left to the database.
pub fn insert(module: &ModuleDescriptor, values: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &module.columns {
        if c.name == module.id_column {
            continue;
        }
        let Some(val) = values.get(&c.name) else {
            continue;
        };
        placeholders.push(q.push_param(val.clone(), Some(c)));
        cols.push(quoted(&c.name));
    }
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table(module), select_column_list(module))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table(module),
            cols.join(", "),
            placeholders.join(", "),
            select_column_list(module)
        )
    };
    q
}

/// UPDATE by id: SET only known, non-id columns present in `values`.
/// With nothing to set this degrades to a SELECT of the row.
pub fn update(module: &ModuleDescriptor, id: i64, values: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &module.columns {
        if c.name == module.id_column {
            continue;
        }
        let Some(val) = values.get(&c.name) else {
            continue;
        };
        let ph = q.push_param(val.clone(), Some(c));
        sets.push(format!("{} = {}", quoted(&c.name), ph));
    }
    if sets.is_empty() {
        return select_by_id(module, id);
    }
    let id_ph = q.push_param(Value::from(id), module.column(&module.id_column));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        table(module),
        sets.join(", "),
        quoted(&module.id_column),
        id_ph,
        select_column_list(module)
    );
    q
}

/// DELETE by id.
pub fn delete(module: &ModuleDescriptor, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(Value::from(id), module.column(&module.id_column));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        table(module),
        quoted(&module.id_column),
        ph
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, AdminConfig};
    use serde_json::json;

    fn widget() -> ModuleDescriptor {
        let config: AdminConfig = serde_json::from_value(json!({ "modules": [{
            "type": "Widget",
            "schema": "shop",
            "columns": [
                { "name": "WidgetID", "type": "int", "key": "Primary" },
                { "name": "Name", "type": "varchar(255)" },
                { "name": "Active", "type": "tinyint(1)" },
                { "name": "Made", "type": "date" }
            ]
        }]}))
        .unwrap();
        resolve(&config).unwrap().modules.remove(0)
    }

    #[test]
    fn select_matching_casts_and_expands_arrays() {
        let mut criteria = Criteria::new();
        criteria.insert("WidgetID".into(), json!([1, 2]));
        criteria.insert("Active".into(), json!(true));
        criteria.insert("Nope".into(), json!("x"));
        let q = select_matching(&widget(), &criteria, Some("Name"));
        assert_eq!(
            q.sql,
            r#"SELECT "WidgetID", "Name", "Active", "Made" FROM "shop"."Widget" WHERE "Active" = $1::boolean AND "WidgetID" IN ($2::bigint, $3::bigint) ORDER BY "Name""#
        );
        assert_eq!(q.params, vec![json!(true), json!(1), json!(2)]);
    }

    #[test]
    fn unknown_sort_falls_back_to_id() {
        let q = select_matching(&widget(), &Criteria::new(), Some("Robert'); DROP"));
        assert!(q.sql.ends_with(r#"ORDER BY "WidgetID""#));
    }

    #[test]
    fn insert_skips_id_and_update_targets_it() {
        let values = json!({ "WidgetID": 9, "Name": "Cog", "Made": "2024-01-02" });
        let values = values.as_object().unwrap();
        let q = insert(&widget(), values);
        assert_eq!(
            q.sql,
            r#"INSERT INTO "shop"."Widget" ("Name", "Made") VALUES ($1, $2::date) RETURNING "WidgetID", "Name", "Active", "Made""#
        );

        let q = update(&widget(), 9, values);
        assert!(q.sql.starts_with(r#"UPDATE "shop"."Widget" SET "Name" = $1, "Made" = $2::date WHERE "WidgetID" = $3::bigint"#));
        assert_eq!(q.params.last(), Some(&json!(9)));
    }

    #[test]
    fn empty_update_reads_the_row() {
        let q = update(&widget(), 3, &Map::new());
        assert!(q.sql.starts_with("SELECT "));
        assert_eq!(q.params, vec![json!(3)]);
    }
}
