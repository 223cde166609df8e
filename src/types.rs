//! Core types shared across the engine.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP methods that may carry an operation in a path item.
pub const OPERATION_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Where a parameter travels in the request.
///
/// The declaration order of the variants is the order used when listing
/// parameters in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Cookie,
    Header,
    Path,
    Query,
}

impl ParameterLocation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cookie" => Some(ParameterLocation::Cookie),
            "header" => Some(ParameterLocation::Header),
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Cookie => "cookie",
            ParameterLocation::Header => "header",
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
        }
    }

    /// Style used when a parameter declares none.
    pub fn default_style(&self) -> ParameterStyle {
        match self {
            ParameterLocation::Path | ParameterLocation::Header => ParameterStyle::Simple,
            ParameterLocation::Query | ParameterLocation::Cookie => ParameterStyle::Form,
        }
    }

    /// Whether `style` may be declared for this location.
    pub fn allows(&self, style: ParameterStyle) -> bool {
        use ParameterStyle::*;
        match self {
            ParameterLocation::Path => matches!(style, Simple | Label | Matrix),
            ParameterLocation::Query => {
                matches!(style, Form | SpaceDelimited | PipeDelimited | DeepObject)
            }
            ParameterLocation::Header => style == Simple,
            ParameterLocation::Cookie => style == Form,
        }
    }
}

/// Serialization format selector for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterStyle {
    Simple,
    Matrix,
    Label,
    Form,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl ParameterStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "simple" => Some(ParameterStyle::Simple),
            "matrix" => Some(ParameterStyle::Matrix),
            "label" => Some(ParameterStyle::Label),
            "form" => Some(ParameterStyle::Form),
            "spaceDelimited" => Some(ParameterStyle::SpaceDelimited),
            "pipeDelimited" => Some(ParameterStyle::PipeDelimited),
            "deepObject" => Some(ParameterStyle::DeepObject),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterStyle::Simple => "simple",
            ParameterStyle::Matrix => "matrix",
            ParameterStyle::Label => "label",
            ParameterStyle::Form => "form",
            ParameterStyle::SpaceDelimited => "spaceDelimited",
            ParameterStyle::PipeDelimited => "pipeDelimited",
            ParameterStyle::DeepObject => "deepObject",
        }
    }

    /// `explode` defaults to true for `form` and false otherwise.
    pub fn default_explode(&self) -> bool {
        matches!(self, ParameterStyle::Form)
    }

    /// Styles that produce `name=value` pairs rather than a single text value.
    pub fn is_pair_style(&self) -> bool {
        matches!(
            self,
            ParameterStyle::Form
                | ParameterStyle::SpaceDelimited
                | ParameterStyle::PipeDelimited
                | ParameterStyle::DeepObject
        )
    }
}

/// A hundreds-class of HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
}

impl StatusClass {
    /// Class of a status code, `None` outside 100..=599.
    pub fn of(status: StatusCode) -> Option<Self> {
        match status.as_u16() / 100 {
            1 => Some(StatusClass::Informational),
            2 => Some(StatusClass::Success),
            3 => Some(StatusClass::Redirection),
            4 => Some(StatusClass::ClientError),
            5 => Some(StatusClass::ServerError),
            _ => None,
        }
    }
}

/// Per-client configuration, fixed for the lifetime of an [`Api`](crate::Api).
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Status classes that fail a call before the response is decoded.
    pub fail_on_status: Vec<StatusClass>,
    /// When true, an unmapped discriminator value fails validation instead
    /// of producing a warning.
    pub strict_discriminator: bool,
    /// Validate structured request bodies before sending.
    pub validate_request_body: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            fail_on_status: vec![StatusClass::ClientError, StatusClass::ServerError],
            strict_discriminator: false,
            validate_request_body: true,
        }
    }
}

impl ClientOptions {
    /// Options with 4xx and 5xx responses treated as failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set of status classes treated as hard failures.
    pub fn fail_on_status(mut self, classes: impl IntoIterator<Item = StatusClass>) -> Self {
        self.fail_on_status = classes.into_iter().collect();
        self
    }

    /// Set strict discriminator mode.
    pub fn strict_discriminator(mut self, strict: bool) -> Self {
        self.strict_discriminator = strict;
        self
    }

    /// Enable or disable validation of outgoing request bodies.
    pub fn validate_request_body(mut self, validate: bool) -> Self {
        self.validate_request_body = validate;
        self
    }

    pub(crate) fn fails_on(&self, status: StatusCode) -> Option<StatusClass> {
        StatusClass::of(status).filter(|class| self.fail_on_status.contains(class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_ordering_is_alphabetical() {
        let mut locations = vec![
            ParameterLocation::Query,
            ParameterLocation::Path,
            ParameterLocation::Cookie,
            ParameterLocation::Header,
        ];
        locations.sort();
        assert_eq!(
            locations,
            vec![
                ParameterLocation::Cookie,
                ParameterLocation::Header,
                ParameterLocation::Path,
                ParameterLocation::Query,
            ]
        );
    }

    #[test]
    fn default_styles() {
        assert_eq!(
            ParameterLocation::Path.default_style(),
            ParameterStyle::Simple
        );
        assert_eq!(
            ParameterLocation::Query.default_style(),
            ParameterStyle::Form
        );
        assert!(ParameterStyle::Form.default_explode());
        assert!(!ParameterStyle::Simple.default_explode());
    }

    #[test]
    fn style_parse_roundtrip() {
        for name in [
            "simple",
            "matrix",
            "label",
            "form",
            "spaceDelimited",
            "pipeDelimited",
            "deepObject",
        ] {
            assert_eq!(ParameterStyle::parse(name).map(|s| s.as_str()), Some(name));
        }
        assert_eq!(ParameterStyle::parse("tabDelimited"), None);
    }

    #[test]
    fn deep_object_only_in_query() {
        assert!(ParameterLocation::Query.allows(ParameterStyle::DeepObject));
        assert!(!ParameterLocation::Path.allows(ParameterStyle::DeepObject));
        assert!(!ParameterLocation::Header.allows(ParameterStyle::Form));
    }

    #[test]
    fn default_options_fail_on_4xx_and_5xx() {
        let options = ClientOptions::new();
        assert_eq!(
            options.fails_on(StatusCode::NOT_FOUND),
            Some(StatusClass::ClientError)
        );
        assert_eq!(
            options.fails_on(StatusCode::BAD_GATEWAY),
            Some(StatusClass::ServerError)
        );
        assert_eq!(options.fails_on(StatusCode::OK), None);

        let lenient = ClientOptions::new().fail_on_status([]);
        assert_eq!(lenient.fails_on(StatusCode::NOT_FOUND), None);
    }
}
