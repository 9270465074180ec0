//! Reference-count code lenses for host documents.
//!
//! Lenses are computed in two phases, like the editor protocol:
//! [`ReferenceCodeLensFeature::provide_code_lenses`] asks the code provider
//! for lenses over the whole virtual document and returns them unresolved in
//! host coordinates. [`ReferenceCodeLensFeature::resolve_code_lens`] then
//! runs a reference lookup at the lens and attaches the count and a
//! "show references" command.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower_lsp_server::ls_types::{CodeLens, Command, Location, Position, Range};
use url::Url;

use super::delegation::{Delegated, FeatureDelegate, FeatureRequest, RequestTarget, SkipReason};
use super::provider::{CodeLensProvider, ReferenceProvider};
use crate::document::LanguageKind;

const LOG_TARGET: &str = "utsushi::code_lens";

/// Command the editor runs to list references.
pub const SHOW_REFERENCES_COMMAND: &str = "editor.action.showReferences";

/// A lens owned by a host document.
#[derive(Debug, Clone, PartialEq)]
pub struct HostCodeLens {
    pub host_uri: Url,
    /// Host-coordinate range.
    pub range: Range,
    pub command: Option<Command>,
    /// Remapped references, filled in on resolve.
    pub references: Vec<Location>,
}

impl HostCodeLens {
    fn unresolved(host_uri: Url, lens: CodeLens) -> Self {
        Self {
            host_uri,
            range: lens.range,
            command: lens.command,
            references: Vec::new(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.command.as_ref().map(|command| command.title.as_str())
    }
}

/// A lens handed back for resolution. Lenses this feature did not produce
/// are passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum CodeLensItem {
    Host(HostCodeLens),
    Foreign(CodeLens),
}

/// `"1 reference"` or `"N references"`.
pub fn reference_label(count: usize) -> String {
    if count == 1 {
        "1 reference".to_string()
    } else {
        format!("{count} references")
    }
}

fn empty_command() -> Command {
    Command {
        title: String::new(),
        command: String::new(),
        arguments: Some(Vec::new()),
    }
}

fn show_references_command(
    host_uri: &Url,
    position: Position,
    references: &[Location],
) -> Result<Command, serde_json::Error> {
    let arguments = vec![
        Value::String(host_uri.to_string()),
        serde_json::to_value(position)?,
        serde_json::to_value(references)?,
    ];
    Ok(Command {
        title: reference_label(references.len()),
        command: SHOW_REFERENCES_COMMAND.to_string(),
        arguments: Some(arguments),
    })
}

pub struct ReferenceCodeLensFeature {
    delegate: Arc<FeatureDelegate>,
    lenses: Arc<dyn CodeLensProvider>,
    references: Arc<dyn ReferenceProvider>,
}

impl ReferenceCodeLensFeature {
    pub fn new(
        delegate: Arc<FeatureDelegate>,
        lenses: Arc<dyn CodeLensProvider>,
        references: Arc<dyn ReferenceProvider>,
    ) -> Self {
        Self {
            delegate,
            lenses,
            references,
        }
    }

    /// Unresolved lenses for `host_uri`, in host coordinates.
    ///
    /// `None` when the document is not tracked or the provider has nothing
    /// applicable; an empty list when the request degraded.
    pub async fn provide_code_lenses(
        &self,
        host_uri: &Url,
        token: &CancellationToken,
    ) -> Option<Vec<HostCodeLens>> {
        let provider = Arc::clone(&self.lenses);
        let request = FeatureRequest {
            operation: "provide_code_lenses",
            host_uri,
            target: RequestTarget::Document,
            language: LanguageKind::Code,
            token,
        };

        let outcome = self
            .delegate
            .delegate(request, |target| async move {
                provider
                    .code_lenses(target.virtual_document.uri(), token)
                    .await
            })
            .await;

        match outcome {
            Delegated::Completed { items, .. } => {
                let lenses: Vec<_> = items?
                    .into_iter()
                    .map(|lens| HostCodeLens::unresolved(host_uri.clone(), lens))
                    .collect();
                log::debug!(
                    target: LOG_TARGET,
                    "{} code lens(es) for {}",
                    lenses.len(),
                    host_uri
                );
                Some(lenses)
            }
            Delegated::Skipped(SkipReason::NotTracked) => None,
            Delegated::Skipped(_) | Delegated::Cancelled | Delegated::Failed => Some(Vec::new()),
        }
    }

    /// Attach the reference count to a lens.
    ///
    /// Lenses from elsewhere yield `None`, as does a reference lookup with no
    /// applicable answer. Otherwise the host lens comes back, with an empty
    /// command when the lookup degraded.
    pub async fn resolve_code_lens(
        &self,
        item: CodeLensItem,
        token: &CancellationToken,
    ) -> Option<CodeLensItem> {
        match item {
            CodeLensItem::Host(lens) => self
                .resolve_host_lens(lens, token)
                .await
                .map(CodeLensItem::Host),
            CodeLensItem::Foreign(_) => None,
        }
    }

    async fn resolve_host_lens(
        &self,
        mut lens: HostCodeLens,
        token: &CancellationToken,
    ) -> Option<HostCodeLens> {
        lens.command = Some(empty_command());
        lens.references.clear();

        let provider = Arc::clone(&self.references);
        let request = FeatureRequest {
            operation: "resolve_code_lens",
            host_uri: &lens.host_uri,
            target: RequestTarget::Position(lens.range.start),
            language: LanguageKind::Code,
            token,
        };

        let outcome = self
            .delegate
            .delegate(request, |target| async move {
                let Some(position) = target.virtual_position else {
                    return Ok(None);
                };
                provider
                    .references(target.virtual_document.uri(), position, token)
                    .await
            })
            .await;

        let references = match outcome {
            Delegated::Completed {
                items: Some(references),
                ..
            } => references,
            Delegated::Completed { items: None, .. } => {
                log::trace!(
                    target: LOG_TARGET,
                    "No references applicable at {}:{}",
                    lens.host_uri,
                    lens.range.start.line
                );
                return None;
            }
            Delegated::Skipped(_) | Delegated::Cancelled | Delegated::Failed => return Some(lens),
        };

        match show_references_command(&lens.host_uri, lens.range.start, &references) {
            Ok(command) => {
                log::trace!(
                    target: LOG_TARGET,
                    "Resolved lens at {}:{} to {:?}",
                    lens.host_uri,
                    lens.range.start.line,
                    command.title
                );
                lens.command = Some(command);
                lens.references = references;
            }
            Err(err) => {
                log::warn!(
                    target: LOG_TARGET,
                    "resolve_code_lens failed for {}: {}",
                    lens.host_uri,
                    err
                );
            }
        }
        Some(lens)
    }
}
