//! Declaration of a position field and its collection layout.
//!
//! [`OrderingConfig`] describes which columns partition rows into collections,
//! which columns are auto-refreshed when a row is shifted, and which
//! uniqueness constraints the host has declared. The last part exists only so
//! it can be rejected: positions are shifted in bulk, and a unique index over
//! the position column would make every such shift fail half way through.
//!
//! ```
//! use positions::config::{OrderingConfig, ValueKind};
//!
//! let config = OrderingConfig::new("tasks")
//!     .collection("list_id", ValueKind::Integer)
//!     .auto_refresh("updated_at");
//! assert!(config.validate().is_ok());
//! ```

mod errors;

pub use errors::ConfigError;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Storage kind of a collection column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// 64-bit signed integer column
    #[default]
    Integer,
    /// Text column
    Text,
}

/// One column of the collection key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionField {
    /// Column name
    pub name: String,
    /// Column storage kind
    #[serde(default)]
    pub kind: ValueKind,
}

/// Configuration of one positioned model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingConfig {
    /// Table holding the rows
    #[serde(default = "default_table")]
    pub table: String,
    /// Primary key column
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Name of the position field (column)
    #[serde(default = "default_field")]
    pub field: String,
    /// Ordered list of columns forming the collection key. Empty means all
    /// rows share one collection.
    #[serde(default)]
    pub collection: Vec<CollectionField>,
    /// Columns stamped with the current time whenever a shift touches the row
    #[serde(default)]
    pub auto_refresh: Vec<String>,
    /// Whether the position column was declared unique
    #[serde(default)]
    pub unique: bool,
    /// Multi-column uniqueness constraints declared on the model
    #[serde(default)]
    pub unique_together: Vec<Vec<String>>,
}

fn default_table() -> String {
    "items".to_string()
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_field() -> String {
    "position".to_string()
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            id_column: default_id_column(),
            field: default_field(),
            collection: Vec::new(),
            auto_refresh: Vec::new(),
            unique: false,
            unique_together: Vec::new(),
        }
    }
}

impl OrderingConfig {
    /// Create a configuration for `table` with default column names and a
    /// single global collection.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON. Missing keys take their defaults.
    ///
    /// The result is not validated; call [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|source| ConfigError::InvalidJson { source })
    }

    /// Rename the position field.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.field = name.into();
        self
    }

    /// Rename the primary key column.
    pub fn id_column(mut self, name: impl Into<String>) -> Self {
        self.id_column = name.into();
        self
    }

    /// Append a column to the collection key.
    pub fn collection(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.collection.push(CollectionField {
            name: name.into(),
            kind,
        });
        self
    }

    /// Declare a column to be stamped whenever a shift touches its row.
    pub fn auto_refresh(mut self, name: impl Into<String>) -> Self {
        self.auto_refresh.push(name.into());
        self
    }

    /// Mark the position column unique. Only useful to exercise validation.
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Declare a multi-column uniqueness constraint.
    pub fn unique_together<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_together
            .push(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Whether rows are partitioned by at least one collection column.
    pub fn has_collection(&self) -> bool {
        !self.collection.is_empty()
    }

    /// Validate the configuration.
    ///
    /// Rejects a unique position field, a position field inside any
    /// `unique_together` constraint, names that are not plain identifiers,
    /// duplicated columns, and a position field reused as a collection or
    /// auto-refresh column.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_identifier(&self.table, "table")?;
        check_identifier(&self.id_column, "id column")?;
        check_identifier(&self.field, "position field")?;

        if self.unique {
            return Err(ConfigError::UniquePosition {
                field: self.field.clone(),
            });
        }
        if let Some(constraint) = self
            .unique_together
            .iter()
            .find(|constraint| constraint.iter().any(|name| *name == self.field))
        {
            return Err(ConfigError::UniqueTogether {
                field: self.field.clone(),
                constraint: constraint.clone(),
            });
        }

        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(self.id_column.as_str());
        for name in self
            .collection
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.auto_refresh.iter().map(String::as_str))
        {
            check_identifier(name, "column")?;
            if name == self.field {
                return Err(ConfigError::PositionInCollection {
                    field: self.field.clone(),
                });
            }
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateField {
                    name: name.to_string(),
                });
            }
        }
        if seen.contains(self.field.as_str()) {
            return Err(ConfigError::DuplicateField {
                name: self.field.clone(),
            });
        }

        Ok(())
    }
}

fn check_identifier(name: &str, what: &'static str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    match chars.next() {
        None => Err(ConfigError::EmptyName { what }),
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
                Ok(())
            } else {
                Err(ConfigError::InvalidIdentifier {
                    name: name.to_string(),
                })
            }
        }
        Some(_) => Err(ConfigError::InvalidIdentifier {
            name: name.to_string(),
        }),
    }
}
