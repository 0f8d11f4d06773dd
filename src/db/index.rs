use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Direction::Ascending => "1",
            Direction::Descending => "-1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub field: String,
    pub direction: Direction,
}

/// Declared index: ordered keys plus a uniqueness flag.
///
/// The index name is derived from the keys only (`field_1`, `field_-1`, joined
/// with `_`), so two specs over the same keys that differ in uniqueness name the
/// same index and are reported as a conflict rather than created side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    keys: Vec<IndexKey>,
    unique: bool,
}

impl IndexSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self::single(field, Direction::Ascending)
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self::single(field, Direction::Descending)
    }

    fn single(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            keys: vec![IndexKey {
                field: field.into(),
                direction,
            }],
            unique: false,
        }
    }

    pub fn then_ascending(self, field: impl Into<String>) -> Self {
        self.then(field, Direction::Ascending)
    }

    pub fn then_descending(self, field: impl Into<String>) -> Self {
        self.then(field, Direction::Descending)
    }

    fn then(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.keys.push(IndexKey {
            field: field.into(),
            direction,
        });
        self
    }

    /// Rejects a second document with the same key values.
    ///
    /// Keys are extracted with `json_extract`, so a document whose field is
    /// missing or JSON `null` indexes as SQL `NULL`. SQLite treats every
    /// `NULL` as distinct: any number of documents lacking the field are
    /// accepted. Callers that need presence must check it before inserting.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn keys(&self) -> &[IndexKey] {
        &self.keys
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|key| format!("{}_{}", key.field, key.direction.suffix()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())?;
        if self.unique {
            f.write_str(" (unique)")?;
        }
        Ok(())
    }
}

/// An index as it currently exists on a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
}
