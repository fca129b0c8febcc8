//! Resolution of named templates and scripts.
//!
//! A renderer built to load by name keeps a list of loaders in its `loader`
//! field. Names are resolved at call time by trying each loader in order;
//! the first one that knows the name supplies the source.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::debug;
use weave_core::RenderError;

/// Resolves a template or script name to its source text.
///
/// Returns `Ok(None)` when the name is unknown to this loader so the next
/// loader in the list gets a chance.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, name: &str) -> Result<Option<String>, RenderError>;
}

/// Resolves `name` through `loaders`, first hit wins.
pub async fn load_source(loaders: &[Arc<dyn Loader>], name: &str) -> Result<String, RenderError> {
    for loader in loaders {
        if let Some(source) = loader.load(name).await? {
            debug!(name, "Resolved source by name");
            return Ok(source);
        }
    }
    Err(RenderError::TemplateNotFound(name.to_string()))
}

/// In-memory sources keyed by name.
///
/// ```rust
/// use weave_config::{Loader, MemoryLoader};
///
/// let loader = MemoryLoader::new().with("greeting", "Hello {{ name }}");
/// let source = futures::executor::block_on(loader.load("greeting")).unwrap();
/// assert_eq!(source.as_deref(), Some("Hello {{ name }}"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    sources: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
    }

    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }
}

#[async_trait]
impl Loader for MemoryLoader {
    async fn load(&self, name: &str) -> Result<Option<String>, RenderError> {
        Ok(self.sources.get(name).cloned())
    }
}

/// Reads sources from files below a root directory.
///
/// Names are relative paths; absolute paths and `..` segments are rejected.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    root: PathBuf,
}

impl FileSystemLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, RenderError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(RenderError::Loader(format!("'{}' is outside the loader root", name)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Loader for FileSystemLoader {
    async fn load(&self, name: &str) -> Result<Option<String>, RenderError> {
        let path = self.resolve(name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(source) => Ok(Some(source)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RenderError::Loader(format!("{}: {}", path.display(), e))),
        }
    }
}

/// Fetches sources over HTTP from `{base_url}/{name}`.
///
/// A `404` means the name is unknown; any other non-success status is an
/// error.
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLoader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name.trim_start_matches('/'))
    }
}

#[async_trait]
impl Loader for HttpLoader {
    async fn load(&self, name: &str) -> Result<Option<String>, RenderError> {
        let url = self.url(name);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RenderError::Loader(format!("{}: {}", url, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RenderError::Loader(format!("{}: HTTP {}", url, response.status())));
        }
        let body = response
            .text()
            .await
            .map_err(|e| RenderError::Loader(format!("{}: {}", url, e)))?;
        Ok(Some(body))
    }
}

/// Queries several loaders concurrently.
///
/// All loaders run at once; among those that found the name, the one listed
/// first wins, so the result does not depend on which finished first. An
/// error from a loader listed before the winner is returned instead.
#[derive(Clone, Default)]
pub struct RaceLoader {
    loaders: Vec<Arc<dyn Loader>>,
}

impl RaceLoader {
    pub fn new(loaders: Vec<Arc<dyn Loader>>) -> Self {
        Self { loaders }
    }
}

impl std::fmt::Debug for RaceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceLoader").field("loaders", &self.loaders.len()).finish()
    }
}

#[async_trait]
impl Loader for RaceLoader {
    async fn load(&self, name: &str) -> Result<Option<String>, RenderError> {
        let results = join_all(self.loaders.iter().map(|loader| loader.load(name))).await;
        for result in results {
            if let Some(source) = result? {
                return Ok(Some(source));
            }
        }
        Ok(None)
    }
}
