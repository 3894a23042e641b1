//! Customer directory used to personalise tickets.
//!
//! Customers may prefix a query with their customer id (`<id>:<query>`). The
//! directory maps that id to a display name and email. It is an optional
//! enrichment: every failure degrades to the raw query text.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A customer known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer-supplied identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact email, if known.
    #[serde(default)]
    pub email: Option<String>,
}

/// Errors from directory lookups.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The directory file could not be read.
    #[error("failed to read directory {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The directory file could not be parsed.
    #[error("failed to parse directory {path}: {source}")]
    Parse {
        /// File path.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// The backing source is unavailable.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Lookup capability from customer id to customer details.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Find the customer with `customer_id`.
    async fn lookup(&self, customer_id: &str) -> Result<Option<Customer>, DirectoryError>;
}

#[derive(Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    customers: Vec<Customer>,
}

/// In-memory directory, usually loaded from a TOML file of `[[customers]]`.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    customers: HashMap<String, Customer>,
}

impl StaticDirectory {
    /// Build a directory from a list of customers. Later duplicates win.
    pub fn from_customers(customers: Vec<Customer>) -> Self {
        let customers = customers
            .into_iter()
            .map(|c| (c.id.trim().to_owned(), c))
            .collect();
        Self { customers }
    }

    /// Parse a directory from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Parse`] on invalid TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self, DirectoryError> {
        let file: DirectoryFile =
            toml::from_str(toml_str).map_err(|source| DirectoryError::Parse {
                path: "<inline>".to_owned(),
                source,
            })?;
        Ok(Self::from_customers(file.customers))
    }

    /// Load a directory from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let shown = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| DirectoryError::Io {
            path: shown.clone(),
            source,
        })?;
        let file: DirectoryFile =
            toml::from_str(&contents).map_err(|source| DirectoryError::Parse {
                path: shown.clone(),
                source,
            })?;
        let directory = Self::from_customers(file.customers);
        info!(path = %shown, customers = directory.len(), "customer directory loaded");
        Ok(directory)
    }

    /// Number of customers.
    pub fn len(&self) -> usize {
        self.customers.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

#[async_trait]
impl CustomerDirectory for StaticDirectory {
    async fn lookup(&self, customer_id: &str) -> Result<Option<Customer>, DirectoryError> {
        Ok(self.customers.get(customer_id.trim()).cloned())
    }
}

/// Split `<customerId>:<query>` into its parts.
///
/// Returns `None` when there is no `:` or either side is blank.
pub fn split_customer_query(text: &str) -> Option<(&str, &str)> {
    let (id, query) = text.split_once(':')?;
    let (id, query) = (id.trim(), query.trim());
    if id.is_empty() || query.is_empty() {
        return None;
    }
    Some((id, query))
}

/// Query text personalised with the customer's name.
pub fn personalised_query(customer: &Customer, query: &str) -> String {
    format!("{}'s query: {query}", customer.name)
}
