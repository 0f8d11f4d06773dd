use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Sqlite};
use std::{marker::PhantomData, sync::Arc};
use tracing::debug;

use crate::db::connection::Database;
use crate::db::feed::Operation;
use crate::db::filter::Filter;
use crate::db::index::{IndexInfo, IndexSpec};
use crate::db::schema::{collection_ddl, index_ddl, qualified_index_name, quote_ident};
use crate::error::StoreError;

/// Untyped document.
pub type Document = Map<String, Value>;

const ID_FIELD: &str = "_id";

/// Typed handle to one collection. Cheap to clone.
///
/// Documents are JSON objects; `_id` is the primary key and is generated
/// (UUID v4) on insert when missing.
pub struct Collection<T = Document> {
    db: Database,
    name: Arc<str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("db", &self.db.name())
            .field("name", &self.name)
            .finish()
    }
}

impl<T> Collection<T> {
    pub(crate) fn new(db: Database, name: &str) -> Self {
        Self {
            db,
            name: Arc::from(name),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same collection, viewed as documents of type `U`.
    pub fn typed<U>(&self) -> Collection<U> {
        Collection {
            db: self.db.clone(),
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }

    fn table(&self) -> String {
        quote_ident(&self.name)
    }

    pub(crate) async fn create(&self) -> Result<(), StoreError> {
        sqlx::query(&collection_ddl(&self.name))
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    /// Indexes currently present, excluding the primary key.
    pub async fn indexes(&self) -> Result<Vec<IndexInfo>, StoreError> {
        let rows: Vec<(String, bool)> =
            sqlx::query_as(r#"SELECT name, "unique" FROM pragma_index_list(?) ORDER BY name"#)
                .bind(self.name.as_ref())
                .fetch_all(self.db.pool())
                .await?;
        let prefix = qualified_index_name(&self.name, "");
        Ok(rows
            .into_iter()
            .filter_map(|(name, unique)| {
                name.strip_prefix(&prefix).map(|short| IndexInfo {
                    name: short.to_string(),
                    unique,
                })
            })
            .collect())
    }

    /// Issues `CREATE [UNIQUE] INDEX IF NOT EXISTS`. Existing data that violates
    /// a unique spec surfaces as [`StoreError::DuplicateKey`].
    pub(crate) async fn create_index(&self, spec: &IndexSpec) -> Result<(), StoreError> {
        for key in spec.keys() {
            crate::db::schema::validate_field_path(&key.field)?;
        }
        sqlx::query(&index_ddl(&self.name, spec))
            .execute(self.db.pool())
            .await
            .map_err(|e| StoreError::from_write(&self.name, e))?;
        Ok(())
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
        builder.push(self.table());
        filter.push_where(&mut builder)?;
        let count: i64 = builder.build_query_scalar().fetch_one(self.db.pool()).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Deletes every match and returns how many were removed. Zero matches is success.
    pub async fn delete_many(&self, filter: &Filter) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM ");
        builder.push(self.table());
        filter.push_where(&mut builder)?;
        builder.push(" RETURNING id");
        let ids: Vec<String> = builder
            .build_query_scalar()
            .fetch_all(self.db.pool())
            .await?;

        for id in &ids {
            self.db
                .feed()
                .publish(Operation::Delete, &self.name, id, None);
        }
        debug!(collection = %self.name, %filter, deleted = ids.len(), "delete_many");
        Ok(ids.len() as u64)
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub async fn find(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT doc FROM ");
        builder.push(self.table());
        filter.push_where(&mut builder)?;
        builder.push(" ORDER BY rowid");
        let rows: Vec<String> = builder
            .build_query_scalar()
            .fetch_all(self.db.pool())
            .await?;
        rows.iter()
            .map(|raw| serde_json::from_str(raw).map_err(StoreError::from))
            .collect()
    }

    pub async fn find_one(&self, filter: &Filter) -> Result<Option<T>, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT doc FROM ");
        builder.push(self.table());
        filter.push_where(&mut builder)?;
        builder.push(" ORDER BY rowid LIMIT 1");
        let row: Option<String> = builder
            .build_query_scalar()
            .fetch_optional(self.db.pool())
            .await?;
        row.map(|raw| serde_json::from_str(&raw).map_err(StoreError::from))
            .transpose()
    }

    /// Inserts one document and returns its `_id`.
    pub async fn insert_one(&self, doc: &T) -> Result<String, StoreError> {
        let (id, value) = prepare_document(doc)?;
        sqlx::query(&format!("INSERT INTO {} (id, doc) VALUES (?, ?)", self.table()))
            .bind(&id)
            .bind(value.to_string())
            .execute(self.db.pool())
            .await
            .map_err(|e| StoreError::from_write(&self.name, e))?;

        self.db
            .feed()
            .publish(Operation::Insert, &self.name, &id, Some(&value));
        Ok(id)
    }

    /// Inserts all documents in one transaction; either all land or none do.
    pub async fn insert_many(&self, docs: &[T]) -> Result<Vec<String>, StoreError> {
        let prepared = docs
            .iter()
            .map(prepare_document)
            .collect::<Result<Vec<_>, _>>()?;

        let sql = format!("INSERT INTO {} (id, doc) VALUES (?, ?)", self.table());
        let mut tx = self.db.pool().begin().await?;
        for (id, value) in &prepared {
            sqlx::query(&sql)
                .bind(id)
                .bind(value.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::from_write(&self.name, e))?;
        }
        tx.commit()
            .await
            .map_err(|e| StoreError::from_write(&self.name, e))?;

        for (id, value) in &prepared {
            self.db
                .feed()
                .publish(Operation::Insert, &self.name, id, Some(value));
        }
        Ok(prepared.into_iter().map(|(id, _)| id).collect())
    }

    /// Replaces the first match, keeping its `_id`. Returns whether a document matched.
    pub async fn replace_one(&self, filter: &Filter, doc: &T) -> Result<bool, StoreError> {
        let mut value = serde_json::to_value(doc)?;
        let Value::Object(ref mut object) = value else {
            return Err(StoreError::InvalidDocument(
                "document must serialize to a JSON object".to_string(),
            ));
        };

        let mut tx = self.db.pool().begin().await?;
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id FROM ");
        builder.push(self.table());
        filter.push_where(&mut builder)?;
        builder.push(" ORDER BY rowid LIMIT 1");
        let existing: Option<String> = builder.build_query_scalar().fetch_optional(&mut *tx).await?;
        let Some(id) = existing else {
            return Ok(false);
        };

        object.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        sqlx::query(&format!("UPDATE {} SET doc = ? WHERE id = ?", self.table()))
            .bind(value.to_string())
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::from_write(&self.name, e))?;
        tx.commit()
            .await
            .map_err(|e| StoreError::from_write(&self.name, e))?;

        self.db
            .feed()
            .publish(Operation::Replace, &self.name, &id, Some(&value));
        Ok(true)
    }
}

/// Serializes `doc`, assigning a fresh `_id` when it has none.
fn prepare_document<T: Serialize>(doc: &T) -> Result<(String, Value), StoreError> {
    let mut value = serde_json::to_value(doc)?;
    let Value::Object(ref mut object) = value else {
        return Err(StoreError::InvalidDocument(
            "document must serialize to a JSON object".to_string(),
        ));
    };

    let id = match object.get(ID_FIELD) {
        None | Some(Value::Null) => {
            let id = uuid::Uuid::new_v4().to_string();
            object.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        }
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(other) => {
            return Err(StoreError::InvalidDocument(format!(
                "_id must be a non-empty string, got {other}"
            )));
        }
    };
    Ok((id, value))
}
