//! The [`Api`] entry point and the per-call request state machine.
//!
//! A call moves through `Request` (built, no I/O) → [`PreparedRequest`]
//! (parameters, security, body, and URL resolved) → [`SentRequest`] (raw
//! response) → [`DecodedResponse`] (routed, headers and body decoded) →
//! [`CallResult`] (schema-validated). Each stage consumes the previous one.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use http::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE, WWW_AUTHENTICATE};
use http::{Method, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::document::{self, Document, Link, MediaType, Operation, Server};
use crate::error::{CallError, CodecError, DefinitionError, TransportError, ValidateError};
use crate::loader::{DefaultLoader, Loader};
use crate::params::{check_parameters, decode_text, substitute_path, Encoded};
use crate::schema::{SchemaEngine, SchemaId, TypeHint, ValidationWarning};
use crate::security::{apply, check_unexpected, negotiate, AppliedSecurity, Authenticator, Credential, Credentials};
use crate::transport::{HttpRequest, HttpResponse, Transport};
use crate::types::{ClientOptions, ParameterLocation, ParameterStyle, StatusClass};

/// Addresses an operation by id or by path and method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKey {
    Id(String),
    PathMethod(String, Method),
}

impl From<&str> for OperationKey {
    fn from(id: &str) -> Self {
        OperationKey::Id(id.to_string())
    }
}

impl From<String> for OperationKey {
    fn from(id: String) -> Self {
        OperationKey::Id(id)
    }
}

impl From<(&str, Method)> for OperationKey {
    fn from((path, method): (&str, Method)) -> Self {
        OperationKey::PathMethod(path.to_string(), method)
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKey::Id(id) => f.write_str(id),
            OperationKey::PathMethod(path, method) => write!(f, "{method} {path}"),
        }
    }
}

/// Transport used when none is configured and no HTTP client can be built.
struct UnavailableTransport {
    reason: String,
}

impl Transport for UnavailableTransport {
    fn send(&self, _: HttpRequest) -> Result<HttpResponse, TransportError> {
        Err(TransportError::new(self.reason.clone()))
    }
}

#[cfg(feature = "remote")]
fn default_transport() -> Arc<dyn Transport> {
    match crate::transport::ReqwestTransport::new() {
        Ok(transport) => Arc::new(transport),
        Err(e) => Arc::new(UnavailableTransport {
            reason: e.to_string(),
        }),
    }
}

#[cfg(not(feature = "remote"))]
fn default_transport() -> Arc<dyn Transport> {
    Arc::new(UnavailableTransport {
        reason: "no transport configured".to_string(),
    })
}

/// Configures and constructs an [`Api`].
pub struct ApiBuilder {
    base: String,
    document: Value,
    loader: Box<dyn Loader>,
    transport: Option<Arc<dyn Transport>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    options: ClientOptions,
}

impl ApiBuilder {
    /// Loader for external documents (default: files and, with `remote`, URLs).
    pub fn loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn authenticator(mut self, authenticator: impl Authenticator + 'static) -> Self {
        self.authenticator = Some(Arc::new(authenticator));
        self
    }

    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve the description and build every schema descriptor.
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError` for any definition or reference error; no
    /// partially built `Api` is returned.
    pub fn build(self) -> Result<Api, DefinitionError> {
        let base = parse_base(&self.base)?;
        let (document, engine) = document::parse(base, self.document, self.loader.as_ref())?;
        Ok(Api {
            document,
            engine,
            options: self.options,
            transport: self.transport.unwrap_or_else(default_transport),
            authenticator: self.authenticator,
            credentials: Credentials::new(),
            server_variables: BTreeMap::new(),
        })
    }
}

fn parse_base(base: &str) -> Result<Url, DefinitionError> {
    let invalid = |message: String| DefinitionError::Malformed {
        location: base.to_string(),
        message,
    };
    match Url::parse(base) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse("file:///")
            .and_then(|root| root.join(base))
            .map_err(|e| invalid(e.to_string())),
        Err(e) => Err(invalid(e.to_string())),
    }
}

/// A contract-checked client for one API description.
///
/// Construction resolves everything; afterwards the description and schemas
/// are read-only, and only session credentials and server variables change.
pub struct Api {
    document: Document,
    engine: SchemaEngine,
    options: ClientOptions,
    transport: Arc<dyn Transport>,
    authenticator: Option<Arc<dyn Authenticator>>,
    credentials: Credentials,
    server_variables: BTreeMap<String, String>,
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("base", &self.document.base.as_str())
            .field("operations", &self.document.operations.len())
            .field("schemas", &self.engine.len())
            .field("options", &self.options)
            .field("credentials", &self.credentials.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Api {
    /// Construct with default loader, transport, and options.
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError` for any definition or reference error.
    pub fn construct(base: impl Into<String>, document: Value) -> Result<Self, DefinitionError> {
        Self::builder(base, document).build()
    }

    pub fn builder(base: impl Into<String>, document: Value) -> ApiBuilder {
        ApiBuilder {
            base: base.into(),
            document,
            loader: Box::new(DefaultLoader),
            transport: None,
            authenticator: None,
            options: ClientOptions::default(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn engine(&self) -> &SchemaEngine {
        &self.engine
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn operations(&self) -> &[Operation] {
        &self.document.operations
    }

    pub fn operations_tagged(&self, tag: &str) -> Vec<&Operation> {
        self.document.operations_tagged(tag)
    }

    /// Start a call to the operation addressed by `key`.
    ///
    /// # Errors
    ///
    /// Returns `CallError::UnknownOperation` when nothing matches.
    pub fn operation(&self, key: impl Into<OperationKey>) -> Result<Request<'_>, CallError> {
        let key = key.into();
        let operation = match &key {
            OperationKey::Id(id) => self.document.operation_by_id(id),
            OperationKey::PathMethod(path, method) => self.document.operation_at(path, method),
        };
        let operation = operation.ok_or_else(|| CallError::UnknownOperation {
            key: key.to_string(),
        })?;
        Ok(Request {
            api: self,
            operation,
            body: None,
            parameters: BTreeMap::new(),
        })
    }

    /// Add session credentials keyed by security scheme name.
    ///
    /// # Errors
    ///
    /// Returns `CallError::UnknownSecurityScheme` for names the description
    /// does not define; no credential is stored in that case.
    pub fn authenticate<I, K, C>(&mut self, credentials: I) -> Result<(), CallError>
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: Into<Credential>,
    {
        let mut accepted = Vec::new();
        for (name, credential) in credentials {
            let name = name.into();
            if !self.document.security_schemes.contains_key(&name) {
                return Err(CallError::UnknownSecurityScheme { scheme: name });
            }
            accepted.push((name, credential.into()));
        }
        self.credentials.extend(accepted);
        Ok(())
    }

    /// Drop all session credentials.
    pub fn reset_authentication(&mut self) {
        self.credentials.clear();
    }

    /// Override server template variables for subsequent calls.
    pub fn set_server_variables<I, K, V>(&mut self, variables: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.server_variables
            .extend(variables.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// The operation targeted by a response link.
    pub fn link_target(&self, link: &Link) -> Option<&Operation> {
        self.document.link_target(link)
    }

    /// Descriptor of the component schema `name`.
    pub fn schema(&self, name: &str) -> Option<SchemaId> {
        self.document.schemas.get(name).copied()
    }

    /// Validate `value` against the component schema `name`.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::UnknownSchema` or `ValidateError::Invalid`.
    pub fn validate(&self, name: &str, value: &Value) -> Result<Vec<ValidationWarning>, ValidateError> {
        let id = self.schema(name).ok_or_else(|| ValidateError::UnknownSchema {
            name: name.to_string(),
        })?;
        self.engine
            .validate_with(id, value, self.options.strict_discriminator)
            .map_err(|errors| ValidateError::Invalid { errors })
    }

    fn server_url(&self, server: &Server) -> Result<Url, CallError> {
        let mut url = server.url.clone();
        for (name, variable) in &server.variables {
            let value = self
                .server_variables
                .get(name)
                .or(variable.default.as_ref())
                .cloned()
                .unwrap_or_default();
            if !variable.allowed.is_empty() && !variable.allowed.contains(&value) {
                return Err(CallError::ServerVariableNotAllowed {
                    name: name.clone(),
                    value,
                    allowed: variable.allowed.clone(),
                });
            }
            url = url.replace(&format!("{{{name}}}"), &value);
        }
        self.document
            .base
            .join(&url)
            .map_err(|source| CallError::InvalidUrl { url, source })
    }
}

enum Payload {
    Value(Value),
    Raw(Vec<u8>),
}

/// A call under construction. No I/O happens until [`Request::call`] or
/// [`PreparedRequest::send`].
pub struct Request<'a> {
    api: &'a Api,
    operation: &'a Operation,
    body: Option<Payload>,
    parameters: BTreeMap<String, Value>,
}

impl<'a> Request<'a> {
    pub fn operation(&self) -> &'a Operation {
        self.operation
    }

    /// Structured body, encoded per the declared media type.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(Payload::Value(body));
        self
    }

    /// Body bytes sent as-is.
    pub fn with_raw_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(Payload::Raw(body.into()));
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn with_parameters<I, K>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.parameters
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Prepare, send, decode, and validate.
    ///
    /// # Errors
    ///
    /// Returns the `CallError` of the first failing stage.
    pub fn call(self) -> Result<CallResult, CallError> {
        self.prepare()?.send()?.decode()?.validate()
    }

    /// Check and encode parameters, negotiate security, encode the body, and
    /// resolve the URL.
    ///
    /// # Errors
    ///
    /// Returns parameter, security, body, or server-variable errors.
    pub fn prepare(self) -> Result<PreparedRequest<'a>, CallError> {
        let api = self.api;
        let operation = self.operation;
        check_parameters(&operation.parameters, &self.parameters)?;

        let mut path_values = BTreeMap::new();
        let mut query: Vec<(String, String)> = Vec::new();
        let mut cookies: Vec<(String, String)> = Vec::new();
        let mut headers = http::HeaderMap::new();

        for parameter in &operation.parameters {
            let Some(value) = self.parameters.get(&parameter.name) else {
                continue;
            };
            if let (Some(schema), false) = (parameter.schema, value.is_null()) {
                api.engine
                    .validate_with(schema, value, api.options.strict_discriminator)
                    .map_err(|errors| CallError::ParameterSchema {
                        name: parameter.name.clone(),
                        errors,
                    })?;
            }
            let encoded = parameter
                .encode(value)
                .map_err(|source| CallError::ParameterEncoding {
                    name: parameter.name.clone(),
                    source,
                })?;
            match (parameter.location, encoded) {
                (ParameterLocation::Path, Encoded::Text(text)) => {
                    path_values.insert(parameter.name.clone(), text);
                }
                (ParameterLocation::Header, Encoded::Text(text)) => {
                    let (name, value) = header_pair(&parameter.name, &text, parameter.style)?;
                    headers.append(name, value);
                }
                (ParameterLocation::Cookie, Encoded::Pairs(pairs)) => cookies.extend(pairs),
                (_, Encoded::Pairs(pairs)) => query.extend(pairs),
                (_, Encoded::Text(text)) => query.push((parameter.name.clone(), text)),
            }
        }

        let applied = self.negotiate_security()?;
        for (name, value) in applied.headers {
            let (name, value) = header_pair(&name, &value, ParameterStyle::Simple)?;
            headers.append(name, value);
        }
        query.extend(applied.query);
        cookies.extend(applied.cookies);

        let body = self.encode_body(&mut headers)?;

        let server = operation
            .servers
            .first()
            .or(api.document.servers.first())
            .cloned()
            .unwrap_or_else(Server::root);
        let base = api.server_url(&server)?;
        let path = substitute_path(&operation.path, &path_values);
        let joined = format!("{}{}", base.as_str().trim_end_matches('/'), path);
        let mut url = Url::parse(&joined).map_err(|source| CallError::InvalidUrl {
            url: joined.clone(),
            source,
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(&query);
        }

        if !cookies.is_empty() {
            let rendered: Vec<String> = cookies.iter().map(|(k, v)| format!("{k}={v}")).collect();
            let (name, value) = header_pair(COOKIE.as_str(), &rendered.join("; "), ParameterStyle::Form)?;
            headers.insert(name, value);
        }

        debug!(operation = %operation.label(), method = %operation.method, url = %url, "prepared request");
        Ok(PreparedRequest {
            api,
            operation,
            request: HttpRequest {
                method: operation.method.clone(),
                url,
                headers,
                body,
            },
            digest: applied.digest,
        })
    }

    fn negotiate_security(&self) -> Result<AppliedSecurity, CallError> {
        let api = self.api;
        let document = &api.document;
        let requirements = document.security_for(self.operation);
        check_unexpected(
            &self.operation.label(),
            requirements,
            &document.security,
            &api.credentials,
        )?;

        let mut applied = AppliedSecurity::default();
        let Some(requirement) = negotiate(requirements, &api.credentials)? else {
            return Ok(applied);
        };
        for name in requirement.schemes.keys() {
            let scheme = document
                .security_schemes
                .get(name)
                .ok_or_else(|| CallError::UnknownSecurityScheme {
                    scheme: name.clone(),
                })?;
            let credential = api
                .credentials
                .get(name)
                .ok_or_else(|| CallError::UnknownSecurityScheme {
                    scheme: name.clone(),
                })?;
            apply(name, scheme, credential, api.authenticator.as_deref(), &mut applied)?;
        }
        Ok(applied)
    }

    fn encode_body(&self, headers: &mut http::HeaderMap) -> Result<Option<Vec<u8>>, CallError> {
        let declared = self.operation.request_body.as_ref();
        let (declared, payload) = match (declared, &self.body) {
            (Some(declared), Some(payload)) => (declared, payload),
            (Some(declared), None) if declared.required => {
                return Err(CallError::MissingBody {
                    operation: self.operation.label(),
                })
            }
            (_, None) => return Ok(None),
            (None, Some(_)) => {
                return Err(CallError::BodyEncoding {
                    media_type: String::new(),
                    message: format!("{} declares no request body", self.operation.label()),
                })
            }
        };
        let Some((media_type, media)) = declared.content.first() else {
            return Ok(match payload {
                Payload::Raw(bytes) => Some(bytes.clone()),
                Payload::Value(value) => Some(value.to_string().into_bytes()),
            });
        };

        let bytes = match payload {
            Payload::Raw(bytes) => bytes.clone(),
            Payload::Value(value) => {
                self.check_body(media, value)?;
                encode_value(media_type, value)?
            }
        };
        let content_type = HeaderValue::from_str(media_type).map_err(|e| CallError::BodyEncoding {
            media_type: media_type.clone(),
            message: e.to_string(),
        })?;
        headers.insert(CONTENT_TYPE, content_type);
        Ok(Some(bytes))
    }

    fn check_body(&self, media: &MediaType, value: &Value) -> Result<(), CallError> {
        let api = self.api;
        match media.schema {
            Some(schema) if api.options.validate_request_body => api
                .engine
                .validate_with(schema, value, api.options.strict_discriminator)
                .map(|_| ())
                .map_err(|errors| CallError::RequestSchema { errors }),
            _ => Ok(()),
        }
    }
}

fn is_json(media_type: &str) -> bool {
    media_type == "application/json" || media_type.ends_with("+json")
}

fn encode_value(media_type: &str, value: &Value) -> Result<Vec<u8>, CallError> {
    let unsupported = |message: &str| CallError::BodyEncoding {
        media_type: media_type.to_string(),
        message: message.to_string(),
    };
    if is_json(media_type) {
        return serde_json::to_vec(value).map_err(|e| unsupported(&e.to_string()));
    }
    if media_type == "application/x-www-form-urlencoded" {
        let fields = value
            .as_object()
            .ok_or_else(|| unsupported("form bodies must be objects"))?;
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        for (name, field) in fields {
            let text = match field {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            form.append_pair(name, &text);
        }
        return Ok(form.finish().into_bytes());
    }
    match value {
        Value::String(text) => Ok(text.clone().into_bytes()),
        _ if media_type.starts_with("text/") => Err(unsupported("text bodies must be strings")),
        _ => Err(unsupported("pass binary bodies with with_raw_body")),
    }
}

fn header_pair(
    name: &str,
    value: &str,
    style: ParameterStyle,
) -> Result<(HeaderName, HeaderValue), CallError> {
    let malformed = || CallError::ParameterEncoding {
        name: name.to_string(),
        source: CodecError::Malformed {
            style: style.as_str(),
            text: value.to_string(),
        },
    };
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| malformed())?;
    let header_value = HeaderValue::from_str(value).map_err(|_| malformed())?;
    Ok((header_name, header_value))
}

/// A request ready for the transport.
pub struct PreparedRequest<'a> {
    api: &'a Api,
    operation: &'a Operation,
    request: HttpRequest,
    digest: Option<String>,
}

impl<'a> PreparedRequest<'a> {
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// Send through the transport. A negotiated Digest scheme answers the
    /// server's first `401` challenge and re-sends exactly once.
    ///
    /// # Errors
    ///
    /// Returns `CallError::Transport` or `CallError::Authentication`.
    pub fn send(self) -> Result<SentRequest<'a>, CallError> {
        let api = self.api;
        let mut request = self.request;
        let mut response = api.transport.send(request.clone())?;

        let digest = self
            .digest
            .as_ref()
            .filter(|_| response.status == StatusCode::UNAUTHORIZED);
        if let Some(scheme) = digest {
            match response.header(WWW_AUTHENTICATE.as_str()).map(str::to_string) {
                Some(challenge) => {
                    let failure = |message: String| CallError::Authentication {
                        scheme: scheme.clone(),
                        message,
                    };
                    let authenticator = api
                        .authenticator
                        .as_deref()
                        .ok_or_else(|| failure("no authenticator configured".to_string()))?;
                    let credential = api
                        .credentials
                        .get(scheme)
                        .ok_or_else(|| failure("no credential".to_string()))?;
                    let answer = authenticator
                        .answer_challenge(scheme, &challenge, &request, credential)
                        .map_err(|e| failure(e.to_string()))?;
                    let value = HeaderValue::from_str(&answer).map_err(|e| failure(e.to_string()))?;
                    request.headers.insert(AUTHORIZATION, value);
                    debug!(scheme = %scheme, "answering digest challenge");
                    response = api.transport.send(request)?;
                }
                None => warn!(scheme = %scheme, "401 without a challenge, not retrying"),
            }
        }

        Ok(SentRequest {
            api,
            operation: self.operation,
            response,
        })
    }
}

/// A raw response not yet checked against the contract.
pub struct SentRequest<'a> {
    api: &'a Api,
    operation: &'a Operation,
    response: HttpResponse,
}

impl<'a> SentRequest<'a> {
    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    /// Route the status, check the content type, decode headers and body.
    ///
    /// # Errors
    ///
    /// Returns status, routing, content-type, header, or decoding errors.
    pub fn decode(self) -> Result<DecodedResponse<'a>, CallError> {
        let api = self.api;
        let response = self.response;
        let status = response.status;

        if let Some(class) = api.options.fails_on(status) {
            let response = Box::new(response);
            return Err(match class {
                StatusClass::ClientError => CallError::HttpClient { response },
                StatusClass::ServerError => CallError::HttpServer { response },
                _ => CallError::HttpStatus { response },
            });
        }

        let Some((matched, declared)) = self.operation.route(status) else {
            return Err(CallError::NoContractMatched {
                response: Box::new(response),
            });
        };
        debug!(status = status.as_u16(), matched, "routed response");

        let actual = response.media_type();
        let bodiless = actual.is_none() && response.body.is_empty();
        let media = if declared.content.is_empty() || bodiless {
            None
        } else {
            let found = actual
                .as_deref()
                .and_then(|actual| declared.content.get_key_value(actual));
            match found {
                Some((key, media)) => Some((key.clone(), media.schema)),
                None => {
                    return Err(CallError::ContentType {
                        status: status.as_u16(),
                        actual,
                        expected: declared.content.keys().cloned().collect(),
                    })
                }
            }
        };

        let mut headers = Map::new();
        let mut missing = Vec::new();
        for (name, header) in &declared.headers {
            let Some(raw) = response.header(name) else {
                if header.required {
                    missing.push(name.clone());
                }
                continue;
            };
            let hint = header
                .schema
                .map_or_else(TypeHint::untyped, |id| api.engine.hint(id));
            let value = decode_text(name, ParameterStyle::Simple, header.explode, raw, hint)
                .map_err(|source| CallError::HeaderDecoding {
                    name: name.clone(),
                    source,
                })?;
            headers.insert(name.clone(), value);
        }
        if !missing.is_empty() {
            return Err(CallError::HeadersMissing { missing });
        }

        let (media_type, schema) = match media {
            Some((media_type, schema)) => (Some(media_type), schema),
            None => (None, None),
        };
        let data = decode_body(media_type.as_deref(), &response.body)?;

        Ok(DecodedResponse {
            api,
            status,
            matched: matched.to_string(),
            media_type,
            schema,
            headers,
            data,
        })
    }
}

fn decode_body(media_type: Option<&str>, body: &[u8]) -> Result<ResponseData, CallError> {
    let Some(media_type) = media_type else {
        return Ok(if body.is_empty() {
            ResponseData::Empty
        } else {
            ResponseData::Bytes(body.to_vec())
        });
    };
    let failure = |message: String| CallError::ResponseDecoding {
        media_type: media_type.to_string(),
        message,
    };
    if is_json(media_type) {
        serde_json::from_slice(body)
            .map(ResponseData::Json)
            .map_err(|e| failure(e.to_string()))
    } else if media_type.starts_with("text/") {
        String::from_utf8(body.to_vec())
            .map(ResponseData::Text)
            .map_err(|e| failure(e.to_string()))
    } else {
        Ok(ResponseData::Bytes(body.to_vec()))
    }
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    Empty,
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

/// A routed and decoded response awaiting schema validation.
pub struct DecodedResponse<'a> {
    api: &'a Api,
    status: StatusCode,
    matched: String,
    media_type: Option<String>,
    schema: Option<SchemaId>,
    headers: Map<String, Value>,
    data: ResponseData,
}

impl DecodedResponse<'_> {
    pub fn data(&self) -> &ResponseData {
        &self.data
    }

    /// Validate the body against the matched media type's schema.
    ///
    /// # Errors
    ///
    /// Returns `CallError::ResponseSchema` carrying the violations and data.
    pub fn validate(self) -> Result<CallResult, CallError> {
        let api = self.api;
        let strict = api.options.strict_discriminator;
        let warnings = match (self.schema, &self.data) {
            (Some(schema), ResponseData::Json(value)) => api
                .engine
                .validate_with(schema, value, strict)
                .map_err(|errors| CallError::ResponseSchema {
                    errors,
                    data: value.clone(),
                })?,
            (Some(schema), ResponseData::Text(text)) => {
                let value = Value::String(text.clone());
                api.engine
                    .validate_with(schema, &value, strict)
                    .map_err(|errors| CallError::ResponseSchema { errors, data: value })?
            }
            _ => Vec::new(),
        };
        Ok(CallResult {
            status: self.status,
            matched: self.matched,
            media_type: self.media_type,
            headers: self.headers,
            data: self.data,
            warnings,
        })
    }
}

/// Outcome of a successful call.
#[derive(Debug, Clone)]
pub struct CallResult {
    pub status: StatusCode,
    /// Response key that matched: status literal, pattern, or `default`.
    pub matched: String,
    pub media_type: Option<String>,
    /// Declared headers present on the response, decoded.
    pub headers: Map<String, Value>,
    pub data: ResponseData,
    /// Warning-class findings, such as unmapped discriminator values.
    pub warnings: Vec<ValidationWarning>,
}

impl CallResult {
    /// The JSON body, if the response carried one.
    pub fn json(&self) -> Option<&Value> {
        match &self.data {
            ResponseData::Json(value) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use serde_json::json;

    fn api(doc: Value) -> Api {
        Api::builder("http://example/openapi.json", doc)
            .loader(MemoryLoader::new())
            .build()
            .unwrap()
    }

    fn servers_doc() -> Value {
        json!({
            "openapi": "3.0.3",
            "servers": [{
                "url": "https://{region}.example.com/{version}",
                "variables": {
                    "region": {"default": "eu", "enum": ["eu", "us"]},
                    "version": {"default": "v1"}
                }
            }],
            "paths": {"/items/{id}": {"get": {
                "operationId": "getItem",
                "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "string"}}],
                "responses": {"200": {"description": "ok"}}
            }}}
        })
    }

    #[test]
    fn server_variables_default_and_override() {
        let mut api = api(servers_doc());
        let prepared = api
            .operation("getItem")
            .unwrap()
            .with_parameter("id", json!("a b"))
            .prepare()
            .unwrap();
        assert_eq!(
            prepared.request().url.as_str(),
            "https://eu.example.com/v1/items/a%20b"
        );

        api.set_server_variables([("region", "us")]);
        let prepared = api
            .operation("getItem")
            .unwrap()
            .with_parameter("id", json!("x"))
            .prepare()
            .unwrap();
        assert_eq!(prepared.request().url.host_str(), Some("us.example.com"));
    }

    #[test]
    fn server_variable_outside_enum_fails() {
        let mut api = api(servers_doc());
        api.set_server_variables([("region", "mars")]);
        let err = api
            .operation("getItem")
            .unwrap()
            .with_parameter("id", json!("x"))
            .prepare()
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Server Variable region value mars not allowed");
    }

    #[test]
    fn relative_server_resolves_against_base() {
        let api = api(json!({
            "openapi": "3.1.0",
            "servers": [{"url": "/api/"}],
            "paths": {"/ping": {"get": {"operationId": "ping", "responses": {"200": {"description": "ok"}}}}}
        }));
        let prepared = api.operation("ping").unwrap().prepare().unwrap();
        assert_eq!(prepared.request().url.as_str(), "http://example/api/ping");
    }

    #[test]
    fn operation_lookup_by_path_and_method() {
        let api = api(servers_doc());
        assert!(api.operation(("/items/{id}", Method::GET)).is_ok());
        let err = api.operation(("/items/{id}", Method::DELETE)).err().unwrap();
        assert_eq!(err.to_string(), "unknown operation DELETE /items/{id}");
    }

    #[test]
    fn relative_base_is_accepted() {
        let api = Api::builder("/", json!({"openapi": "3.1.0", "paths": {}}))
            .loader(MemoryLoader::new())
            .build()
            .unwrap();
        assert_eq!(api.document().base.scheme(), "file");
    }

    #[test]
    fn form_body_encoding() {
        let bytes = encode_value(
            "application/x-www-form-urlencoded",
            &json!({"name": "rex dog", "age": 3}),
        )
        .unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "name=rex+dog&age=3");
        assert!(encode_value("text/plain", &json!(1)).is_err());
        assert_eq!(encode_value("text/plain", &json!("hi")).unwrap(), b"hi");
    }
}
