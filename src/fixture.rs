//! Host document fixtures described in TOML.
//!
//! A fixture holds a host text plus the virtual documents a generator would
//! have produced for it:
//!
//! ```toml
//! uri = "file:///project/Index.host"
//! text = "<p>@Model.Name</p>\n"
//!
//! [[virtual]]
//! language = "code"
//! text = "Write(Model.Name);\n"
//! mappings = [{ host_start = 4, generated_start = 6, length = 10 }]
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use crate::document::{
    DocumentManager, HostDocumentSnapshot, LanguageKind, MappingMetadata, SourceMapping,
};
use crate::error::{UtsushiError, UtsushiResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    pub uri: Url,
    pub text: String,
    #[serde(default, rename = "virtual")]
    pub virtual_documents: Vec<VirtualFixture>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VirtualFixture {
    pub language: LanguageKind,
    pub text: String,
    #[serde(default)]
    pub mappings: Vec<SourceMapping>,
}

impl Fixture {
    pub fn from_toml_str(text: &str) -> UtsushiResult<Self> {
        let fixture: Fixture =
            toml::from_str(text).map_err(|err| UtsushiError::config(err.to_string()))?;
        fixture.validate()?;
        Ok(fixture)
    }

    pub fn load(path: &Path) -> UtsushiResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|err| UtsushiError::config(format!("{}: {}", path.display(), err)))
    }

    fn validate(&self) -> UtsushiResult<()> {
        for document in &self.virtual_documents {
            for mapping in &document.mappings {
                if mapping.host_end() > self.text.len()
                    || mapping.generated_end() > document.text.len()
                {
                    return Err(UtsushiError::config(format!(
                        "{} mapping {:?} exceeds its text",
                        document.language, mapping
                    )));
                }
            }
        }
        Ok(())
    }

    /// Open the host in `manager` and install every virtual document as
    /// generated from the initial host version.
    pub fn open_in(&self, manager: &DocumentManager) -> UtsushiResult<Arc<HostDocumentSnapshot>> {
        let mut host = manager
            .open(self.uri.clone(), self.text.clone())
            .ok_or_else(|| UtsushiError::internal(format!("{} is already open", self.uri)))?;

        for document in &self.virtual_documents {
            host = manager
                .update_virtual(
                    &self.uri,
                    document.language,
                    document.text.clone(),
                    MappingMetadata::new(document.mappings.clone()),
                    host.version(),
                )
                .ok_or_else(|| {
                    UtsushiError::internal(format!(
                        "{} virtual document of {} was rejected",
                        document.language, self.uri
                    ))
                })?;
        }
        Ok(host)
    }
}
