//! SQL DDL for collections and their indexes, plus identifier validation.
//!
//! Collection names and field paths are spliced into SQL text (SQLite cannot
//! bind identifiers or the JSON path of an expression index), so both are
//! restricted to `[A-Za-z0-9_]` segments before use.

use crate::db::index::IndexSpec;
use crate::error::StoreError;

const MAX_NAME_LEN: usize = 64;

/// One table per collection. `id` mirrors the document's `_id` field.
pub(crate) fn collection_ddl(collection: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {table} (
    id TEXT PRIMARY KEY NOT NULL,
    doc TEXT NOT NULL CHECK (json_valid(doc))
)"#,
        table = quote_ident(collection)
    )
}

pub(crate) fn index_ddl(collection: &str, spec: &IndexSpec) -> String {
    let columns = spec
        .keys()
        .iter()
        .map(|key| format!("{} {}", json_extract(&key.field), key.direction.sql()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE {unique}INDEX IF NOT EXISTS {index} ON {table} ({columns})",
        unique = if spec.is_unique() { "UNIQUE " } else { "" },
        index = quote_ident(&qualified_index_name(collection, &spec.name())),
        table = quote_ident(collection),
    )
}

/// SQLite index names share one namespace per database, so they carry the collection.
pub(crate) fn qualified_index_name(collection: &str, index: &str) -> String {
    format!("{collection}.{index}")
}

pub(crate) fn json_extract(field: &str) -> String {
    format!("json_extract(doc, '$.{field}')")
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn validate_collection_name(name: &str) -> Result<(), StoreError> {
    let invalid = |reason| {
        Err(StoreError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };
    if name.is_empty() {
        return invalid("collection name is empty");
    }
    if name.len() > MAX_NAME_LEN {
        return invalid("collection name is too long");
    }
    if name.starts_with("sqlite_") {
        return invalid("collection name uses the reserved sqlite_ prefix");
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return invalid("collection name starts with a digit");
    }
    if !name.chars().all(is_name_char) {
        return invalid("collection name may only contain [A-Za-z0-9_]");
    }
    Ok(())
}

pub(crate) fn validate_field_path(path: &str) -> Result<(), StoreError> {
    let invalid = |reason| {
        Err(StoreError::InvalidName {
            name: path.to_string(),
            reason,
        })
    };
    if path.is_empty() {
        return invalid("field path is empty");
    }
    for segment in path.split('.') {
        if segment.is_empty() {
            return invalid("field path has an empty segment");
        }
        if !segment.chars().all(is_name_char) {
            return invalid("field path segments may only contain [A-Za-z0-9_]");
        }
    }
    Ok(())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
