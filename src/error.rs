//! Error types for document loading, construction, and calls.

use std::path::PathBuf;

use thiserror::Error;

use crate::transport::HttpResponse;

/// Renders names the way diagnostics quote them: `['a','b']`.
pub(crate) fn name_list<S: AsRef<str>>(names: &[S]) -> String {
    let quoted: Vec<String> = names
        .iter()
        .map(|n| format!("'{}'", n.as_ref()))
        .collect();
    format!("[{}]", quoted.join(","))
}

/// Like [`name_list`] with a space after each comma: `['a', 'b']`.
fn spaced_name_list(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    format!("[{}]", quoted.join(", "))
}

fn nested_name_list(sets: &[Vec<String>]) -> String {
    let rendered: Vec<String> = sets.iter().map(|s| name_list(s)).collect();
    format!("[{}]", rendered.join(","))
}

/// Errors raised by a [`Loader`](crate::Loader) while fetching a document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("no loader handles {uri}")]
    UnsupportedLocation { uri: String },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::InvalidJson { .. } | LoadError::InvalidYaml { .. } => 2,
            _ => 3,
        }
    }
}

/// Errors resolving a `$ref` pointer.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("invalid reference {reference:?} relative to {base}: {source}")]
    InvalidUri {
        reference: String,
        base: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unresolved reference {reference}")]
    Unresolved { reference: String },

    #[error("reference {reference} resolves to {actual}, expected {expected}")]
    Incompatible {
        reference: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("reference cycle without a concrete target: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    #[error("failed to load {uri}: {source}")]
    Load {
        uri: String,
        #[source]
        source: LoadError,
    },
}

/// Fatal errors found while constructing an [`Api`](crate::Api).
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error("unsupported description version {version:?}: expected 3.0.x or 3.1.x")]
    UnsupportedVersion { version: String },

    #[error("invalid definition at {location}: {message}")]
    Malformed { location: String, message: String },

    #[error("Duplicate operationId {operation_id}")]
    DuplicateOperationId { operation_id: String },

    #[error("empty property name in schema {location}")]
    EmptyPropertyName { location: String },

    #[error("conflicting definitions of property {property:?} in allOf of {location}")]
    ConflictingProperty { location: String, property: String },

    #[error("ambiguous discriminator mapping in {location}: {message}")]
    AmbiguousDiscriminator { location: String, message: String },

    #[error("invalid pattern {pattern:?} in {location}: {source}")]
    InvalidPattern {
        location: String,
        pattern: String,
        #[source]
        source: Box<fancy_regex::Error>,
    },

    #[error("Parameter names are invalid: {}", spaced_name_list(names))]
    InvalidParameterNames { operation: String, names: Vec<String> },

    #[error("Parameter name not found in path: {name}")]
    ParameterNotInPath { operation: String, name: String },

    #[error("Parameter name not found in parameters: {name}")]
    UnboundPlaceholder { operation: String, name: String },

    #[error("duplicate {location} parameter {name} in {operation}")]
    DuplicateParameter {
        operation: String,
        name: String,
        location: &'static str,
    },

    #[error("style {style} is not allowed for {location} parameter {name}")]
    StyleNotAllowed {
        name: String,
        style: &'static str,
        location: &'static str,
    },

    #[error("Missing Server Variables {}", name_list(names))]
    MissingServerVariables { url: String, names: Vec<String> },

    #[error("link {name} must specify exactly one of operationId and operationRef")]
    LinkTarget { name: String },

    #[error("link {name} targets unknown operation {operation_id}")]
    UnknownLinkOperation { name: String, operation_id: String },

    #[error("security requirement references undefined scheme {scheme}")]
    UndefinedSecurityScheme { scheme: String },

    #[error("invalid security scheme {name}: {message}")]
    InvalidSecurityScheme { name: String, message: String },
}

impl DefinitionError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            DefinitionError::Reference(ReferenceError::Load { source, .. }) => source.exit_code(),
            _ => 2,
        }
    }
}

/// Failure reported by a [`Transport`](crate::Transport).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Errors encoding or decoding a serialized parameter value.
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("style {style} cannot serialize {shape} values")]
    UnsupportedShape {
        style: &'static str,
        shape: &'static str,
    },

    #[error("style {style} cannot serialize nested value at {key}")]
    Nested { style: &'static str, key: String },

    #[error("malformed {style} value {text:?}")]
    Malformed { style: &'static str, text: String },
}

/// Per-call errors. The [`Api`](crate::Api) stays usable after any of these.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("unknown operation {key}")]
    UnknownOperation { key: String },

    #[error("Parameter {} unknown (accepted {})", name_list(unknown), name_list(accepted))]
    UnknownParameter {
        unknown: Vec<String>,
        accepted: Vec<String>,
    },

    #[error("Required Parameter {} missing (provided {})", name_list(missing), name_list(provided))]
    MissingParameter {
        missing: Vec<String>,
        provided: Vec<String>,
    },

    #[error("cannot serialize parameter {name}: {source}")]
    ParameterEncoding {
        name: String,
        #[source]
        source: CodecError,
    },

    #[error("parameter {name} violates its schema: {}", first_error(errors))]
    ParameterSchema {
        name: String,
        errors: Vec<SchemaError>,
    },

    #[error("security scheme {scheme} is not defined")]
    UnknownSecurityScheme { scheme: String },

    #[error("{operation} does not accept security schemes {}", name_list(schemes))]
    UnexpectedSecurity {
        operation: String,
        schemes: Vec<String>,
    },

    #[error("No security requirement satisfied (accepted {}, provided {})", nested_name_list(attempted), name_list(provided))]
    NoSecuritySatisfied {
        attempted: Vec<Vec<String>>,
        provided: Vec<String>,
    },

    #[error("authentication via {scheme} failed: {message}")]
    Authentication { scheme: String, message: String },

    #[error("Server Variable {name} value {value} not allowed")]
    ServerVariableNotAllowed {
        name: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("invalid request URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{operation} requires a request body")]
    MissingBody { operation: String },

    #[error("request body cannot be sent as {media_type}: {message}")]
    BodyEncoding { media_type: String, message: String },

    #[error("request body violates schema: {}", first_error(errors))]
    RequestSchema { errors: Vec<SchemaError> },

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("HTTP client error {}", response.status)]
    HttpClient { response: Box<HttpResponse> },

    #[error("HTTP server error {}", response.status)]
    HttpServer { response: Box<HttpResponse> },

    #[error("HTTP status {} configured as failure", response.status)]
    HttpStatus { response: Box<HttpResponse> },

    #[error("no response contract matched status {}", response.status)]
    NoContractMatched { response: Box<HttpResponse> },

    #[error("unexpected content type {} for status {status} (declared {})", actual.as_deref().unwrap_or("<none>"), name_list(expected))]
    ContentType {
        status: u16,
        actual: Option<String>,
        expected: Vec<String>,
    },

    #[error("response headers missing: {}", name_list(missing))]
    HeadersMissing { missing: Vec<String> },

    #[error("cannot decode {name} response header: {source}")]
    HeaderDecoding {
        name: String,
        #[source]
        source: CodecError,
    },

    #[error("failed to decode {media_type} response: {message}")]
    ResponseDecoding { media_type: String, message: String },

    #[error("response body violates schema: {}", first_error(errors))]
    ResponseSchema {
        errors: Vec<SchemaError>,
        data: serde_json::Value,
    },
}

fn first_error(errors: &[SchemaError]) -> String {
    match errors {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

impl CallError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            CallError::Transport(_) => 3,
            CallError::UnknownOperation { .. } | CallError::UnknownSecurityScheme { .. } => 2,
            _ => 1,
        }
    }

    /// The raw response carried by status and contract failures.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            CallError::HttpClient { response }
            | CallError::HttpServer { response }
            | CallError::HttpStatus { response }
            | CallError::NoContractMatched { response } => Some(&**response),
            _ => None,
        }
    }
}

/// Errors validating a standalone value against a component schema.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("unknown schema {name}")]
    UnknownSchema { name: String },

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::UnknownSchema { .. } => 2,
            ValidateError::Invalid { .. } => 1,
        }
    }
}

/// Single validation violation with path context.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid value.
    pub path: String,
    /// The violated keyword, e.g. `required` or `maxLength`.
    pub keyword: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}
