//! Fake per-language providers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tower_lsp_server::ls_types::{CodeLens, Location, Position};
use utsushi::error::ProviderError;
use utsushi::feature::{CodeLensProvider, ReferenceProvider};
use utsushi::VirtualDocumentUri;

/// Answers every request with the same items and counts the calls.
pub struct StaticProvider<T> {
    items: Option<Vec<T>>,
    calls: AtomicUsize,
}

impl<T> StaticProvider<T> {
    pub fn new(items: Vec<T>) -> Arc<Self> {
        Arc::new(Self {
            items: Some(items),
            calls: AtomicUsize::new(0),
        })
    }

    /// A provider with nothing applicable to say.
    pub fn none() -> Arc<Self> {
        Arc::new(Self {
            items: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self) -> Option<Vec<T>>
    where
        T: Clone,
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.items.clone()
    }
}

#[async_trait]
impl ReferenceProvider for StaticProvider<Location> {
    async fn references(
        &self,
        _uri: &VirtualDocumentUri,
        _position: Position,
        _token: &CancellationToken,
    ) -> Result<Option<Vec<Location>>, ProviderError> {
        Ok(self.answer())
    }
}

#[async_trait]
impl CodeLensProvider for StaticProvider<CodeLens> {
    async fn code_lenses(
        &self,
        _uri: &VirtualDocumentUri,
        _token: &CancellationToken,
    ) -> Result<Option<Vec<CodeLens>>, ProviderError> {
        Ok(self.answer())
    }
}

/// Fails every request.
pub struct FailingProvider;

#[async_trait]
impl ReferenceProvider for FailingProvider {
    async fn references(
        &self,
        _uri: &VirtualDocumentUri,
        _position: Position,
        _token: &CancellationToken,
    ) -> Result<Option<Vec<Location>>, ProviderError> {
        Err(ProviderError::Failed("analysis engine crashed".into()))
    }
}

#[async_trait]
impl CodeLensProvider for FailingProvider {
    async fn code_lenses(
        &self,
        _uri: &VirtualDocumentUri,
        _token: &CancellationToken,
    ) -> Result<Option<Vec<CodeLens>>, ProviderError> {
        Err(ProviderError::Failed("analysis engine crashed".into()))
    }
}
