//! The asynchronous document boundary.
//!
//! A [`Session`] shares one [`Graph`] behind a mutex and talks to the
//! network through a [`Transport`]. The lock is only taken for the
//! synchronous graph work between network calls, never across an `.await`,
//! and fetched text is fully decoded before the tree is touched.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{try_join_all, BoxFuture};
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::change::Change;
use crate::config::ClientConfig;
use crate::document::LoadState;
use crate::error::{DocumentError, ObservableError};
use crate::graph::Graph;
use crate::oml;
use crate::transport::{Authorize, HttpTransport, NoAuthorization, Transport};
use crate::value::{Input, NodeId};

/// Handle to a document registered in a session's graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: NodeId,
    url: Url,
}

impl Document {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Per-document fetch locks. A second load of a document that is already
/// being fetched waits here, then finds it loaded.
type LoadLocks = Arc<Mutex<HashMap<NodeId, Arc<tokio::sync::Mutex<()>>>>>;

#[derive(Clone)]
pub struct Session {
    graph: Arc<Mutex<Graph>>,
    loads: LoadLocks,
    transport: Arc<dyn Transport>,
    authorize: Arc<dyn Authorize>,
    config: ClientConfig,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("config", &self.config).finish_non_exhaustive()
    }
}

/// Restores the previous load state unless disarmed, so a failed or
/// cancelled load never leaves a document stuck in `Loading`.
struct LoadingGuard<'a> {
    session: &'a Session,
    id: NodeId,
    previous: LoadState,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(err) = self.session.graph().set_load_state(self.id, self.previous) {
                warn!(node = %self.id, error = %err, "failed to restore load state");
            }
        }
    }
}

impl Session {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            graph: Arc::new(Mutex::new(Graph::new())),
            loads: Arc::default(),
            transport: Arc::new(transport),
            authorize: Arc::new(NoAuthorization),
            config: ClientConfig::default(),
        }
    }

    /// A session talking HTTP(S) with the given settings.
    pub fn http(config: ClientConfig) -> Result<Self, DocumentError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(transport).with_config(config))
    }

    pub fn with_authorization(mut self, authorize: impl Authorize + 'static) -> Self {
        self.authorize = Arc::new(authorize);
        self
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Lock the shared graph. A poisoned lock is recovered: every graph
    /// operation validates before it writes, so a panicking listener cannot
    /// leave a half-applied mutation behind.
    pub fn graph(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get or create the document for `url`. Nothing is fetched.
    pub fn open(&self, url: &str) -> Result<Document, DocumentError> {
        let mut graph = self.graph();
        let id = graph.document(url)?;
        self.handle(&graph, id)
    }

    fn handle(&self, graph: &Graph, id: NodeId) -> Result<Document, DocumentError> {
        let url = graph
            .document_url(id)
            .cloned()
            .ok_or_else(|| ObservableError::Type(format!("{id} is not a document")))?;
        Ok(Document { id, url })
    }

    /// Fetch `doc`, assign the decoded tree into it and then load every
    /// document it links, concurrently. Returns the changes made to `doc`.
    ///
    /// With `use_cache`, an already loaded document is not fetched again.
    /// Linked documents always use the cache. A document already being
    /// fetched by another call is waited for, not fetched twice.
    pub async fn load(&self, doc: &Document, use_cache: bool) -> Result<Vec<Change>, DocumentError> {
        let visited = Arc::new(Mutex::new(HashSet::new()));
        self.load_tree(doc.clone(), use_cache, visited).await
    }

    fn load_tree(
        &self,
        doc: Document,
        use_cache: bool,
        visited: Arc<Mutex<HashSet<NodeId>>>,
    ) -> BoxFuture<'_, Result<Vec<Change>, DocumentError>> {
        Box::pin(async move {
            let first_visit = visited
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(doc.id);
            if !first_visit {
                return Ok(Vec::new());
            }
            let changes = self.load_one(&doc, use_cache).await?;
            let links = {
                let graph = self.graph();
                graph
                    .linked_documents(doc.id)
                    .into_iter()
                    .map(|id| self.handle(&graph, id))
                    .collect::<Result<Vec<_>, _>>()?
            };
            try_join_all(
                links
                    .into_iter()
                    .map(|link| self.load_tree(link, true, Arc::clone(&visited))),
            )
            .await?;
            Ok(changes)
        })
    }

    fn load_lock(&self, id: NodeId) -> Arc<tokio::sync::Mutex<()>> {
        let mut loads = self.loads.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(loads.entry(id).or_default())
    }

    async fn load_one(&self, doc: &Document, use_cache: bool) -> Result<Vec<Change>, DocumentError> {
        let lock = self.load_lock(doc.id);
        let _fetching = match Arc::clone(&lock).try_lock_owned() {
            Ok(held) => held,
            Err(_) => {
                debug!(url = %doc.url, "waiting for in-flight load");
                lock.lock_owned().await
            }
        };
        let previous = {
            let mut graph = self.graph();
            let state = graph.load_state(doc.id).unwrap_or_default();
            if state == LoadState::Loaded && use_cache {
                return Ok(Vec::new());
            }
            graph.set_load_state(doc.id, LoadState::Loading)?;
            state
        };
        let mut guard = LoadingGuard {
            session: self,
            id: doc.id,
            previous,
            armed: true,
        };
        let changes = self.fetch_and_assign(doc).await?;
        guard.armed = false;
        Ok(changes)
    }

    async fn fetch_and_assign(&self, doc: &Document) -> Result<Vec<Change>, DocumentError> {
        let authorization = self.authorize.authorization(&doc.url).await;
        let response = self
            .bounded(self.transport.get(&doc.url, authorization.as_deref()))
            .await?;
        debug!(url = %doc.url, status = response.status, "fetched document");
        if !response.is_success() {
            return Err(DocumentError::Http {
                status: response.status,
                message: response.body,
            });
        }
        let input = oml::decode(&response.body)?;
        let read_only = response.is_read_only();

        let mut graph = self.graph();
        let was_read_only = graph.is_read_only(doc.id);
        let before = graph.snapshot(doc.id)?;
        graph.set_read_only(doc.id, false)?;
        let changes = match graph.assign(doc.id, input) {
            Ok(changes) => changes,
            Err(err) => {
                // A listener vetoed part of the update; put back what was there.
                if let Err(restore) = graph.assign(doc.id, Input::from(before)) {
                    warn!(url = %doc.url, error = %restore, "failed to restore document after rejected load");
                }
                graph.set_read_only(doc.id, was_read_only)?;
                return Err(err.into());
            }
        };
        graph.set_read_only(doc.id, read_only)?;
        graph.set_load_state(doc.id, LoadState::Loaded)?;
        info!(url = %doc.url, changes = changes.len(), read_only, "document loaded");
        Ok(changes)
    }

    /// Encode `doc` and POST it. The in-memory document is never modified.
    pub async fn store(&self, doc: &Document) -> Result<(), DocumentError> {
        let text = self.graph().encode(doc.id)?;
        let authorization = self.authorize.authorization(&doc.url).await;
        let response = match self
            .bounded(self.transport.post(&doc.url, text, authorization.as_deref()))
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(url = %doc.url, error = %err, "store failed");
                return Err(err);
            }
        };
        debug!(url = %doc.url, status = response.status, "stored document");
        if !response.is_success() {
            warn!(url = %doc.url, status = response.status, "store rejected");
            return Err(DocumentError::Http {
                status: response.status,
                message: response.body,
            });
        }
        Ok(())
    }

    async fn bounded<T, F>(&self, request: F) -> Result<T, DocumentError>
    where
        F: Future<Output = Result<T, DocumentError>>,
    {
        tokio::time::timeout(self.config.timeout(), request)
            .await
            .map_err(|_| DocumentError::Timeout)?
    }
}
