//! URL-bound documents.
//!
//! A document is an ordinary dict node with [`DocumentMeta`] attached. The
//! graph keeps one document per normalized URL, so every link to the same
//! URL resolves to the same node.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::Url;

use crate::error::ObservableError;
use crate::graph::{Body, Graph, Node};
use crate::value::NodeId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
}

pub(crate) struct DocumentMeta {
    url: Url,
    read_only: Arc<AtomicBool>,
    pub(crate) state: LoadState,
}

impl DocumentMeta {
    pub(crate) fn url(&self) -> &Url {
        &self.url
    }
}

/// Parse and normalize a document URL.
pub fn normalize_url(raw: &str) -> Result<Url, ObservableError> {
    Url::parse(raw).map_err(|e| ObservableError::Type(format!("invalid document url {raw:?}: {e}")))
}

impl Graph {
    /// The document for `url`, created on first use.
    ///
    /// New documents start unloaded and writable, with a before-change
    /// guard that rejects every mutation while they are read-only.
    pub fn document(&mut self, url: &str) -> Result<NodeId, ObservableError> {
        let url = normalize_url(url)?;
        if let Some(id) = self.documents.get(url.as_str()) {
            return Ok(*id);
        }
        let read_only = Arc::new(AtomicBool::new(false));
        let mut node = Node::new(Body::Dict(Default::default()));
        node.document = Some(DocumentMeta {
            url: url.clone(),
            read_only: Arc::clone(&read_only),
            state: LoadState::Unloaded,
        });
        let id = self.insert_node(node);
        let guarded = url.to_string();
        self.on_before_change(id, move |change| {
            if read_only.load(Ordering::Acquire) {
                tracing::warn!(url = %guarded, path = %change.path(), "rejected write to read-only document");
                return Err(ObservableError::WritePermission { url: guarded.clone() });
            }
            Ok(())
        })?;
        self.documents.insert(url.to_string(), id);
        Ok(id)
    }

    fn meta(&self, id: NodeId) -> Option<&DocumentMeta> {
        self.node(id).ok()?.document.as_ref()
    }

    pub fn is_document(&self, id: NodeId) -> bool {
        self.meta(id).is_some()
    }

    pub fn document_url(&self, id: NodeId) -> Option<&Url> {
        self.meta(id).map(DocumentMeta::url)
    }

    /// Every registered document as `(url, id)`.
    pub fn documents(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.documents.iter().map(|(url, id)| (url.as_str(), *id))
    }

    pub fn is_read_only(&self, id: NodeId) -> bool {
        self.meta(id)
            .map(|meta| meta.read_only.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    pub fn set_read_only(&mut self, id: NodeId, read_only: bool) -> Result<(), ObservableError> {
        let meta = self
            .meta(id)
            .ok_or_else(|| ObservableError::Type(format!("{id} is not a document")))?;
        meta.read_only.store(read_only, Ordering::Release);
        Ok(())
    }

    pub fn load_state(&self, id: NodeId) -> Option<LoadState> {
        self.meta(id).map(|meta| meta.state)
    }

    pub(crate) fn set_load_state(&mut self, id: NodeId, state: LoadState) -> Result<(), ObservableError> {
        match self.node_mut(id)?.document.as_mut() {
            Some(meta) => {
                meta.state = state;
                Ok(())
            }
            None => Err(ObservableError::Type(format!("{id} is not a document"))),
        }
    }
}
