//! Language features delegated to per-language providers.

mod code_lens;
mod delegation;
mod provider;
mod refresh;

pub use code_lens::{
    CodeLensItem, HostCodeLens, ReferenceCodeLensFeature, SHOW_REFERENCES_COMMAND, reference_label,
};
pub use delegation::{
    Delegated, DelegationTarget, FeatureDelegate, FeatureRequest, Remappable, RequestState,
    RequestTarget, ResultProvenance, SkipReason,
};
pub use provider::{CodeLensProvider, OpenDocuments, ReferenceProvider};
pub use refresh::RefreshScheduler;
