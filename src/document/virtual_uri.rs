//! Virtual document URIs.
//!
//! A virtual document's URI is derived from its host URI and the embedded
//! language it carries, so the same pair always names the same document.
//!
//! For most URIs (file://, https://, etc.) the virtual document is a sibling
//! of the host with a language suffix appended to the file name. For
//! "cannot-be-a-base" URIs (untitled:, mailto:, data:) a utsushi:// scheme
//! fallback is used.

use std::fmt;

use url::Url;

use super::LanguageKind;

/// Scheme used when the host URI has no path to hang a sibling off.
const FALLBACK_SCHEME: &str = "utsushi";

/// Marker between the host file name and the language extension.
const VIRTUAL_SUFFIX_MARKER: &str = ".virt.";

/// Virtual document URI for one embedded language of a host document.
///
/// ## URI Format
///
/// For normal URIs:
/// - Format: `{host_uri}.virt.{ext}`
/// - Example: `file:///project/A.host` → `file:///project/A.host.virt.code`
///
/// For cannot-be-a-base URIs:
/// - Format: `utsushi:///virtual/{encoded_host}/document.virt.{ext}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualDocumentUri {
    host_uri: Url,
    language: LanguageKind,
    uri: String,
}

impl VirtualDocumentUri {
    pub fn new(host_uri: &Url, language: LanguageKind) -> Self {
        let uri = Self::derive(host_uri, language);
        Self {
            host_uri: host_uri.clone(),
            language,
            uri,
        }
    }

    pub fn host_uri(&self) -> &Url {
        &self.host_uri
    }

    pub fn language(&self) -> LanguageKind {
        self.language
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// Convert to the LSP wire URI type.
    pub fn to_lsp_uri(&self) -> Option<tower_lsp_server::ls_types::Uri> {
        self.uri.parse().ok()
    }

    /// Check if a URI string names a virtual document.
    ///
    /// Uses proper URL parsing so query strings containing slashes do not
    /// confuse the file name check.
    pub fn is_virtual_uri(uri: &str) -> bool {
        let Ok(url) = Url::parse(uri) else {
            return false;
        };
        if url.scheme() == FALLBACK_SCHEME {
            return true;
        }

        let Some(filename) = url.path_segments().and_then(|mut s| s.next_back()) else {
            return false;
        };
        filename
            .rsplit_once(VIRTUAL_SUFFIX_MARKER)
            .is_some_and(|(stem, ext)| !stem.is_empty() && LanguageKind::from_extension(ext).is_some())
    }

    fn derive(host_uri: &Url, language: LanguageKind) -> String {
        let suffix = format!("{VIRTUAL_SUFFIX_MARKER}{}", language.extension());

        if !host_uri.cannot_be_a_base() && !host_uri.path().ends_with('/') {
            let mut url = host_uri.clone();
            // The path is already percent-encoded; set_path keeps existing escapes
            let path = format!("{}{suffix}", url.path());
            url.set_path(&path);
            url.set_query(None);
            url.set_fragment(None);
            return url.to_string();
        }

        let encoded_host = percent_encoding::utf8_percent_encode(
            host_uri.as_str(),
            percent_encoding::NON_ALPHANUMERIC,
        );
        format!("{FALLBACK_SCHEME}:///virtual/{encoded_host}/document{suffix}")
    }
}

impl fmt::Display for VirtualDocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_uri_gets_sibling_with_language_suffix() {
        let host = Url::parse("file:///project/A.host").unwrap();
        let code = VirtualDocumentUri::new(&host, LanguageKind::Code);
        let markup = VirtualDocumentUri::new(&host, LanguageKind::Markup);

        assert_eq!(code.as_str(), "file:///project/A.host.virt.code");
        assert_eq!(markup.as_str(), "file:///project/A.host.virt.markup");
    }

    #[test]
    fn derivation_is_deterministic() {
        let host = Url::parse("file:///project/A.host").unwrap();
        assert_eq!(
            VirtualDocumentUri::new(&host, LanguageKind::Code),
            VirtualDocumentUri::new(&host, LanguageKind::Code)
        );
    }

    #[test]
    fn percent_escapes_in_host_path_are_preserved() {
        let host = Url::parse("file:///my%20project/A.host").unwrap();
        let code = VirtualDocumentUri::new(&host, LanguageKind::Code);
        assert_eq!(code.as_str(), "file:///my%20project/A.host.virt.code");
    }

    #[test]
    fn query_and_fragment_are_dropped() {
        let host = Url::parse("https://example.com/pages/A.host?rev=2#top").unwrap();
        let code = VirtualDocumentUri::new(&host, LanguageKind::Code);
        assert_eq!(code.as_str(), "https://example.com/pages/A.host.virt.code");
    }

    #[test]
    fn untitled_uri_falls_back_to_utsushi_scheme() {
        let host = Url::parse("untitled:Untitled-1").unwrap();
        let code = VirtualDocumentUri::new(&host, LanguageKind::Code);

        assert!(code.as_str().starts_with("utsushi:///virtual/untitled%3AUntitled%2D1/"));
        assert!(code.as_str().ends_with("/document.virt.code"));
        assert!(VirtualDocumentUri::is_virtual_uri(code.as_str()));
    }

    #[test]
    fn is_virtual_uri_distinguishes_real_files() {
        assert!(VirtualDocumentUri::is_virtual_uri(
            "file:///project/A.host.virt.code"
        ));
        assert!(!VirtualDocumentUri::is_virtual_uri("file:///project/A.host"));
        assert!(!VirtualDocumentUri::is_virtual_uri(
            "file:///project/A.host.virt.unknown"
        ));
        assert!(!VirtualDocumentUri::is_virtual_uri("not a uri"));
        assert!(!VirtualDocumentUri::is_virtual_uri(
            "file:///project/real.rs?path=/x.virt.code"
        ));
    }

    #[test]
    fn converts_to_lsp_uri() {
        let host = Url::parse("file:///project/A.host").unwrap();
        let uri = VirtualDocumentUri::new(&host, LanguageKind::Code)
            .to_lsp_uri()
            .expect("virtual uri should be a valid LSP uri");
        assert_eq!(uri.as_str(), "file:///project/A.host.virt.code");
    }
}
