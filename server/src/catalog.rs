//! Read-only catalog of example documents served under `/items`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Served in place of the body of an item that has none
pub const MISSING_CONTENT: &str = "Error: Content missing";

/// Listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub content: String,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list(&self) -> Result<Vec<CatalogSummary>, CatalogError>;

    async fn get(&self, id: &str) -> Result<Option<CatalogItem>, CatalogError>;
}

pub type CatalogRef = Arc<dyn Catalog>;

/// Catalog backed by a TOML file of `[[items]]` tables, re-read on every call
#[derive(Debug, Clone, Default)]
pub struct FileCatalog {
    path: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
struct CatalogFile {
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(Deserialize)]
struct RawItem {
    id: Option<String>,
    name: Option<String>,
    content: Option<String>,
}

impl FileCatalog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// A catalog with no backing file; lists nothing
    pub fn empty() -> Self {
        Self::default()
    }

    async fn load(&self) -> Result<Vec<RawItem>, CatalogError> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CatalogError::Read {
                path: path.clone(),
                source,
            })?;
        let file: CatalogFile = toml::from_str(&content).map_err(|source| CatalogError::Parse {
            path: path.clone(),
            source,
        })?;

        Ok(file.items)
    }
}

#[async_trait]
impl Catalog for FileCatalog {
    async fn list(&self) -> Result<Vec<CatalogSummary>, CatalogError> {
        let items = self.load().await?;
        let total = items.len();

        let summaries: Vec<CatalogSummary> = items
            .into_iter()
            .filter_map(|item| match (item.id, item.name) {
                (Some(id), Some(name)) => Some(CatalogSummary { id, name }),
                _ => None,
            })
            .collect();

        if summaries.len() != total {
            warn!("Some catalog items were missing 'id' or 'name' attributes");
        }
        debug!(count = summaries.len(), "Listed catalog items");
        Ok(summaries)
    }

    async fn get(&self, id: &str) -> Result<Option<CatalogItem>, CatalogError> {
        let item = self
            .load()
            .await?
            .into_iter()
            .find(|item| item.id.as_deref() == Some(id));

        Ok(item.map(|item| {
            let content = item.content.unwrap_or_else(|| {
                warn!(item_id = %id, "Catalog item has no 'content' attribute");
                MISSING_CONTENT.to_string()
            });
            CatalogItem {
                id: id.to_string(),
                name: item.name.unwrap_or_default(),
                content,
            }
        }))
    }
}
