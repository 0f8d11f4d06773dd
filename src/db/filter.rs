use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};
use std::fmt;

use crate::db::schema::{json_extract, validate_field_path};
use crate::error::StoreError;

/// Conjunction of equality clauses over document fields.
///
/// Only scalar JSON values (string, number, bool, null) can be compared; a
/// `null` clause matches documents where the field is null or absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(field, value)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Appends ` WHERE ...` (or nothing for an empty filter) to `builder`.
    pub(crate) fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) -> Result<(), StoreError> {
        for (i, (field, value)) in self.clauses.iter().enumerate() {
            validate_field_path(field)?;
            builder.push(if i == 0 { " WHERE " } else { " AND " });
            builder.push(json_extract(field));
            match value {
                Value::Null => {
                    builder.push(" IS NULL");
                }
                Value::String(s) => {
                    builder.push(" = ").push_bind(s.clone());
                }
                // json_extract yields 1/0 for JSON booleans.
                Value::Bool(b) => {
                    builder.push(" = ").push_bind(i64::from(*b));
                }
                Value::Number(n) => {
                    builder.push(" = ");
                    if let Some(int) = n.as_i64() {
                        builder.push_bind(int);
                    } else if let Some(float) = n.as_f64() {
                        builder.push_bind(float);
                    } else {
                        return Err(StoreError::UnsupportedFilter {
                            field: field.clone(),
                        });
                    }
                }
                Value::Array(_) | Value::Object(_) => {
                    return Err(StoreError::UnsupportedFilter {
                        field: field.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (field, value)) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}: {value}")?;
        }
        f.write_str("}")
    }
}
