//! Document loading from files, strings, memory, and HTTP URLs.
//!
//! The engine only sees the [`Loader`] trait. Caching by absolute URI is done
//! by the [`DocumentGraph`](crate::DocumentGraph), so loaders stay stateless.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use url::Url;

use crate::error::LoadError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches and parses the document behind a URI.
pub trait Loader: Send + Sync {
    /// Load the document at `uri`. The URI never carries a fragment.
    fn load(&self, uri: &Url) -> Result<Value, LoadError>;
}

/// Parse document text as JSON, or as YAML when it is not a JSON object.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` for text that starts like JSON but does not
/// parse, and `LoadError::InvalidYaml` otherwise.
pub fn parse_document(content: &str) -> Result<Value, LoadError> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
    } else {
        serde_yaml::from_str(content).map_err(|source| LoadError::InvalidYaml { source })
    }
}

/// Load a document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or a parse error if the file isn't valid JSON or YAML.
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    parse_document(&content)
}

/// Load a document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails, or a parse error
/// if the body isn't valid JSON or YAML.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str) -> Result<Value, LoadError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;
    fetch(&client, url)
}

#[cfg(feature = "remote")]
fn fetch(client: &reqwest::blocking::Client, url: &str) -> Result<Value, LoadError> {
    let response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|source| LoadError::NetworkError {
            url: url.to_string(),
            source,
        })?;

    let text = response.text().map_err(|source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    })?;
    parse_document(&text)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a document from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_document_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_document_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::UnsupportedLocation {
                uri: source.to_string(),
            })
        }
    } else {
        load_document(Path::new(source))
    }
}

/// Base URI for a document loaded from `source` (a path or URL).
pub fn base_uri_for(source: &str) -> Option<Url> {
    if is_url(source) {
        return Url::parse(source).ok();
    }
    let path = Path::new(source);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    Url::from_file_path(absolute).ok()
}

/// Loads `file://` URIs from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemLoader;

impl Loader for FileSystemLoader {
    fn load(&self, uri: &Url) -> Result<Value, LoadError> {
        if uri.scheme() != "file" {
            return Err(LoadError::UnsupportedLocation {
                uri: uri.to_string(),
            });
        }
        let path = uri.to_file_path().map_err(|()| LoadError::UnsupportedLocation {
            uri: uri.to_string(),
        })?;
        load_document(&path)
    }
}

/// Loads `http(s)://` URIs with a blocking client.
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl HttpLoader {
    pub fn new() -> Result<Self, LoadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|source| LoadError::NetworkError {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }
}

#[cfg(feature = "remote")]
impl Loader for HttpLoader {
    fn load(&self, uri: &Url) -> Result<Value, LoadError> {
        if !matches!(uri.scheme(), "http" | "https") {
            return Err(LoadError::UnsupportedLocation {
                uri: uri.to_string(),
            });
        }
        fetch(&self.client, uri.as_str())
    }
}

/// Files through [`FileSystemLoader`], URLs through `HttpLoader` when the
/// `remote` feature is enabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLoader;

impl Loader for DefaultLoader {
    fn load(&self, uri: &Url) -> Result<Value, LoadError> {
        match uri.scheme() {
            "file" => FileSystemLoader.load(uri),
            #[cfg(feature = "remote")]
            "http" | "https" => load_document_url(uri.as_str()),
            _ => Err(LoadError::UnsupportedLocation {
                uri: uri.to_string(),
            }),
        }
    }
}

/// Serves pre-parsed documents keyed by absolute URI.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    documents: HashMap<String, Value>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `document` under `uri`. Fragments are ignored.
    pub fn with(mut self, uri: &str, document: Value) -> Self {
        let key = uri.split('#').next().unwrap_or(uri).to_string();
        self.documents.insert(key, document);
        self
    }
}

impl Loader for MemoryLoader {
    fn load(&self, uri: &Url) -> Result<Value, LoadError> {
        self.documents
            .get(uri.as_str())
            .cloned()
            .ok_or_else(|| LoadError::UnsupportedLocation {
                uri: uri.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_document_valid_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"openapi": "3.1.0"}}"#).unwrap();

        let doc = load_document(file.path()).unwrap();
        assert_eq!(doc["openapi"], "3.1.0");
    }

    #[test]
    fn load_document_valid_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "openapi: 3.0.3\ninfo:\n  title: pets\n  version: '1'").unwrap();

        let doc = load_document(file.path()).unwrap();
        assert_eq!(doc["openapi"], "3.0.3");
        assert_eq!(doc["info"]["version"], "1");
    }

    #[test]
    fn load_document_file_not_found() {
        let result = load_document(Path::new("/nonexistent/openapi.yaml"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn parse_document_invalid_json() {
        let result = parse_document("{ not json");
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn parse_document_invalid_yaml() {
        let result = parse_document("key: [unclosed");
        assert!(matches!(result, Err(LoadError::InvalidYaml { .. })));
    }

    #[test]
    fn is_url_detection() {
        assert!(is_url("https://example.com/openapi.json"));
        assert!(is_url("http://example.com/openapi.json"));
        assert!(!is_url("/path/to/openapi.json"));
        assert!(!is_url("openapi.yaml"));
    }

    #[test]
    fn filesystem_loader_reads_file_uri() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"components": {{}}}}"#).unwrap();
        let uri = Url::from_file_path(file.path()).unwrap();

        let doc = FileSystemLoader.load(&uri).unwrap();
        assert!(doc.get("components").is_some());
    }

    #[test]
    fn filesystem_loader_rejects_http() {
        let uri = Url::parse("https://example.com/doc.json").unwrap();
        let result = FileSystemLoader.load(&uri);
        assert!(matches!(
            result,
            Err(LoadError::UnsupportedLocation { .. })
        ));
    }

    #[test]
    fn memory_loader_ignores_fragment_on_registration() {
        let loader = MemoryLoader::new().with("http://example/common.json#/x", json!({"a": 1}));
        let uri = Url::parse("http://example/common.json").unwrap();
        assert_eq!(loader.load(&uri).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn base_uri_for_relative_path_is_absolute_file_uri() {
        let uri = base_uri_for("specs/openapi.yaml").unwrap();
        assert_eq!(uri.scheme(), "file");
        assert!(uri.path().ends_with("/specs/openapi.yaml"));
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[test]
        fn http_loader_fetches_yaml() {
            let mut server = mockito::Server::new();
            let mock = server
                .mock("GET", "/openapi.yaml")
                .with_status(200)
                .with_body("openapi: 3.1.0\npaths: {}\n")
                .create();

            let uri = Url::parse(&format!("{}/openapi.yaml", server.url())).unwrap();
            let doc = HttpLoader::new().unwrap().load(&uri).unwrap();
            assert_eq!(doc["openapi"], "3.1.0");
            mock.assert();
        }

        #[test]
        fn http_loader_404() {
            let mut server = mockito::Server::new();
            let _mock = server.mock("GET", "/missing.json").with_status(404).create();

            let uri = Url::parse(&format!("{}/missing.json", server.url())).unwrap();
            let result = HttpLoader::new().unwrap().load(&uri);
            assert!(matches!(result, Err(LoadError::NetworkError { .. })));
        }
    }
}
