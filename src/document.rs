//! The resolved description: operations, parameters, responses, servers.
//!
//! [`parse`] walks the description once, resolving every reference and
//! building every schema descriptor, and rejects definition errors up front.
//! The resulting [`Document`] is immutable.

use std::collections::HashMap;

use http::header::HeaderName;
use http::{Method, StatusCode};
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::error::DefinitionError;
use crate::graph::{split_pointer, DocumentGraph, Location};
use crate::loader::Loader;
use crate::params::{template_names, Parameter};
use crate::schema::{SchemaBuilder, SchemaEngine, SchemaId};
use crate::security::{SecurityRequirement, SecurityScheme};
use crate::types::{ParameterLocation, ParameterStyle, OPERATION_METHODS};

/// Description dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    V30,
    V31,
}

impl Dialect {
    /// Dialect of an `openapi` version string.
    pub fn detect(version: &str) -> Option<Self> {
        let mut parts = version.split('.');
        match (parts.next(), parts.next()) {
            (Some("3"), Some("0")) => Some(Dialect::V30),
            (Some("3"), Some("1")) => Some(Dialect::V31),
            _ => None,
        }
    }
}

/// A server URL template.
#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub url: String,
    pub variables: IndexMap<String, ServerVariable>,
}

impl Server {
    pub(crate) fn root() -> Self {
        Server {
            url: "/".to_string(),
            variables: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerVariable {
    pub default: Option<String>,
    /// Allowed values; empty means unrestricted.
    pub allowed: Vec<String>,
}

/// Schema attached to one media type.
#[derive(Debug, Clone, Default)]
pub struct MediaType {
    pub schema: Option<SchemaId>,
}

#[derive(Debug, Clone)]
pub struct RequestBody {
    pub required: bool,
    /// Keyed by lowercased media type.
    pub content: IndexMap<String, MediaType>,
}

/// A declared response header.
#[derive(Debug, Clone)]
pub struct Header {
    pub required: bool,
    pub explode: bool,
    pub schema: Option<SchemaId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    OperationId(String),
    OperationRef(String),
}

/// A design-time link from a response to another operation.
#[derive(Debug, Clone)]
pub struct Link {
    pub target: LinkTarget,
    /// Parameter name → runtime expression or constant, unevaluated.
    pub parameters: IndexMap<String, Value>,
    pub request_body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub description: String,
    pub headers: IndexMap<String, Header>,
    pub content: IndexMap<String, MediaType>,
    pub links: IndexMap<String, Link>,
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub operation_id: Option<String>,
    pub path: String,
    pub method: Method,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    /// Effective parameters: path-item parameters merged with the
    /// operation's own.
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    /// Keyed by status literal, `NXX` pattern, or `default`.
    pub responses: IndexMap<String, Response>,
    /// Operation-level requirements; `None` falls back to the document's.
    pub security: Option<Vec<SecurityRequirement>>,
    /// Effective servers after operation > path > document precedence.
    pub servers: Vec<Server>,
}

impl Operation {
    /// `operationId`, or `METHOD path` for anonymous operations.
    pub fn label(&self) -> String {
        match &self.operation_id {
            Some(id) => id.clone(),
            None => format!("{} {}", self.method, self.path),
        }
    }

    /// Response definition for `status`: exact code, then `NXX`, then `default`.
    pub fn route(&self, status: StatusCode) -> Option<(&str, &Response)> {
        let code = status.as_str();
        let class = (status.as_u16() / 100).to_string();
        let exact = self.responses.get_key_value(code);
        let pattern = || {
            self.responses.iter().find(|(key, _)| {
                key.len() == 3
                    && key.is_ascii()
                    && key.starts_with(&class)
                    && key[1..].eq_ignore_ascii_case("xx")
            })
        };
        let default = || self.responses.get_key_value("default");
        exact
            .or_else(pattern)
            .or_else(default)
            .map(|(key, response)| (key.as_str(), response))
    }
}

/// A loaded, fully resolved description.
#[derive(Debug)]
pub struct Document {
    pub dialect: Dialect,
    pub base: Url,
    pub servers: Vec<Server>,
    pub operations: Vec<Operation>,
    /// Component schemas by name.
    pub schemas: IndexMap<String, SchemaId>,
    pub security_schemes: IndexMap<String, SecurityScheme>,
    /// Document-level default security.
    pub security: Vec<SecurityRequirement>,
    by_id: HashMap<String, usize>,
}

impl Document {
    pub fn operation_by_id(&self, operation_id: &str) -> Option<&Operation> {
        self.by_id.get(operation_id).map(|i| &self.operations[*i])
    }

    pub fn operation_at(&self, path: &str, method: &Method) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|op| op.path == path && op.method == method)
    }

    /// Operations carrying `tag`, in document order.
    pub fn operations_tagged(&self, tag: &str) -> Vec<&Operation> {
        self.operations
            .iter()
            .filter(|op| op.tags.iter().any(|t| t == tag))
            .collect()
    }

    /// Requirements in force for `operation`.
    pub fn security_for<'a>(&'a self, operation: &'a Operation) -> &'a [SecurityRequirement] {
        operation.security.as_deref().unwrap_or(&self.security)
    }

    /// The operation a link points at.
    pub fn link_target(&self, link: &Link) -> Option<&Operation> {
        match &link.target {
            LinkTarget::OperationId(id) => self.operation_by_id(id),
            LinkTarget::OperationRef(reference) => {
                let (path, method) = operation_ref_parts(reference)?;
                self.operation_at(&path, &method)
            }
        }
    }
}

/// `(path, method)` addressed by an operationRef like `#/paths/~1pets/get`.
fn operation_ref_parts(reference: &str) -> Option<(String, Method)> {
    let fragment = reference.split_once('#')?.1;
    let pointer = percent_decode_str(fragment).decode_utf8_lossy();
    match split_pointer(&pointer).as_slice() {
        [paths, path, method] if paths == "paths" => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).ok()?;
            Some((path.clone(), method))
        }
        _ => None,
    }
}

/// Resolve and check a description rooted at `base`.
///
/// # Errors
///
/// Returns the first `DefinitionError` found; no partial document is kept.
pub(crate) fn parse(
    base: Url,
    root: Value,
    loader: &dyn Loader,
) -> Result<(Document, SchemaEngine), DefinitionError> {
    let version = root
        .get("openapi")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let dialect = Dialect::detect(&version)
        .ok_or(DefinitionError::UnsupportedVersion { version })?;

    let mut parser = Parser {
        graph: DocumentGraph::new(base.clone(), root),
        schemas: SchemaBuilder::new(),
        loader,
    };
    let root_location = Location::root(parser.graph.root().clone());
    let root_map = parser.graph.object(&root_location)?.clone();

    let mut schemas = IndexMap::new();
    if let Some(components) = components(&root_map, "schemas") {
        let base = root_location.child("components").child("schemas");
        for name in components.keys() {
            let id = parser.schema(base.child(name))?;
            schemas.insert(name.clone(), id);
        }
    }

    let mut security_schemes = IndexMap::new();
    if let Some(components) = components(&root_map, "securitySchemes") {
        let base = root_location.child("components").child("securitySchemes");
        for name in components.keys() {
            let (_, node) = parser.resolve(base.child(name))?;
            security_schemes.insert(name.clone(), SecurityScheme::parse(name, &node)?);
        }
    }

    let security = match root_map.get("security") {
        Some(node) => SecurityRequirement::parse_list(&root_location.child("security").to_string(), node)?,
        None => Vec::new(),
    };
    let servers = parse_servers(&root_location, root_map.get("servers"))?
        .unwrap_or_else(|| vec![Server::root()]);

    let mut operations = Vec::new();
    if let Some(paths) = root_map.get("paths").and_then(Value::as_object) {
        let paths_location = root_location.child("paths");
        for path in paths.keys() {
            parser.path_item(path, paths_location.child(path), &servers, &mut operations)?;
        }
    }

    let mut by_id = HashMap::new();
    for (index, operation) in operations.iter().enumerate() {
        if let Some(id) = &operation.operation_id {
            if by_id.insert(id.clone(), index).is_some() {
                return Err(DefinitionError::DuplicateOperationId {
                    operation_id: id.clone(),
                });
            }
        }
    }

    let document = Document {
        dialect,
        base,
        servers,
        operations,
        schemas,
        security_schemes,
        security,
        by_id,
    };
    check_security_names(&document)?;
    check_links(&document)?;

    debug!(
        documents = parser.graph.document_count(),
        operations = document.operations.len(),
        "description resolved"
    );
    let engine = parser.schemas.finish()?;
    Ok((document, engine))
}

fn components<'a>(root: &'a Map<String, Value>, kind: &str) -> Option<&'a Map<String, Value>> {
    root.get("components")?.get(kind)?.as_object()
}

fn check_security_names(document: &Document) -> Result<(), DefinitionError> {
    let declared = document
        .operations
        .iter()
        .filter_map(|op| op.security.as_ref())
        .chain(std::iter::once(&document.security));
    for requirements in declared {
        for requirement in requirements {
            for scheme in requirement.schemes.keys() {
                if !document.security_schemes.contains_key(scheme) {
                    return Err(DefinitionError::UndefinedSecurityScheme {
                        scheme: scheme.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn check_links(document: &Document) -> Result<(), DefinitionError> {
    for operation in &document.operations {
        for response in operation.responses.values() {
            for (name, link) in &response.links {
                if document.link_target(link).is_none() {
                    let target = match &link.target {
                        LinkTarget::OperationId(id) => id.clone(),
                        LinkTarget::OperationRef(reference) => reference.clone(),
                    };
                    return Err(DefinitionError::UnknownLinkOperation {
                        name: name.clone(),
                        operation_id: target,
                    });
                }
            }
        }
    }
    Ok(())
}

fn parse_servers(
    owner: &Location,
    node: Option<&Value>,
) -> Result<Option<Vec<Server>>, DefinitionError> {
    let Some(node) = node else {
        return Ok(None);
    };
    let location = owner.child("servers");
    let malformed = |message: &str| DefinitionError::Malformed {
        location: location.to_string(),
        message: message.to_string(),
    };
    let entries = node.as_array().ok_or_else(|| malformed("servers must be a list"))?;
    if entries.is_empty() {
        return Ok(None);
    }

    let mut servers = Vec::new();
    for entry in entries {
        let url = entry
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("server requires url"))?;
        let mut variables = IndexMap::new();
        if let Some(declared) = entry.get("variables").and_then(Value::as_object) {
            for (name, variable) in declared {
                let allowed = variable
                    .get("enum")
                    .and_then(Value::as_array)
                    .map(|values| {
                        values
                            .iter()
                            .filter_map(|v| v.as_str().map(String::from))
                            .collect()
                    })
                    .unwrap_or_default();
                variables.insert(
                    name.clone(),
                    ServerVariable {
                        default: variable.get("default").and_then(Value::as_str).map(String::from),
                        allowed,
                    },
                );
            }
        }

        let missing: Vec<String> = template_names(url)
            .into_iter()
            .filter(|name| variables.get(name).and_then(|v| v.default.as_ref()).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(DefinitionError::MissingServerVariables {
                url: url.to_string(),
                names: missing,
            });
        }
        servers.push(Server {
            url: url.to_string(),
            variables,
        });
    }
    Ok(Some(servers))
}

struct Parser<'l> {
    graph: DocumentGraph,
    schemas: SchemaBuilder,
    loader: &'l dyn Loader,
}

impl Parser<'_> {
    /// The concrete object behind `location`, following references.
    fn resolve(
        &mut self,
        location: Location,
    ) -> Result<(Location, Map<String, Value>), DefinitionError> {
        let location = self.graph.deref(location, self.loader)?;
        let map = self.graph.object(&location)?.clone();
        Ok((location, map))
    }

    fn schema(&mut self, location: Location) -> Result<SchemaId, DefinitionError> {
        self.schemas.build(&mut self.graph, self.loader, location)
    }

    fn optional_schema(
        &mut self,
        owner: &Location,
        map: &Map<String, Value>,
    ) -> Result<Option<SchemaId>, DefinitionError> {
        if map.contains_key("schema") {
            self.schema(owner.child("schema")).map(Some)
        } else {
            Ok(None)
        }
    }

    fn content(
        &mut self,
        owner: &Location,
        map: &Map<String, Value>,
    ) -> Result<IndexMap<String, MediaType>, DefinitionError> {
        let mut content = IndexMap::new();
        let Some(entries) = map.get("content").and_then(Value::as_object) else {
            return Ok(content);
        };
        let base = owner.child("content");
        for (media_type, node) in entries {
            let schema = match node.as_object() {
                Some(node) => self.optional_schema(&base.child(media_type), node)?,
                None => None,
            };
            content.insert(media_type.to_ascii_lowercase(), MediaType { schema });
        }
        Ok(content)
    }

    fn path_item(
        &mut self,
        path: &str,
        location: Location,
        document_servers: &[Server],
        operations: &mut Vec<Operation>,
    ) -> Result<(), DefinitionError> {
        let (location, item) = self.resolve(location)?;
        let shared = self.parameters(&location, &item, path)?;
        let servers = parse_servers(&location, item.get("servers"))?;

        for method in OPERATION_METHODS {
            if item.get(*method).is_none() {
                continue;
            }
            let op_servers = servers.as_deref().unwrap_or(document_servers);
            let operation =
                self.operation(path, method, location.child(method), &shared, op_servers)?;
            operations.push(operation);
        }
        Ok(())
    }

    fn operation(
        &mut self,
        path: &str,
        method: &str,
        location: Location,
        shared: &[Parameter],
        inherited_servers: &[Server],
    ) -> Result<Operation, DefinitionError> {
        let (location, node) = self.resolve(location)?;
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| {
            DefinitionError::Malformed {
                location: location.to_string(),
                message: format!("invalid method {method}"),
            }
        })?;
        let operation_id = node
            .get("operationId")
            .and_then(Value::as_str)
            .map(String::from);
        let label = operation_id
            .clone()
            .unwrap_or_else(|| format!("{method} {path}"));

        let own = self.parameters(&location, &node, &label)?;
        let mut parameters: Vec<Parameter> = shared
            .iter()
            .map(|inherited| {
                own.iter()
                    .find(|p| p.name == inherited.name && p.location == inherited.location)
                    .unwrap_or(inherited)
                    .clone()
            })
            .collect();
        for parameter in own {
            let present = parameters
                .iter()
                .any(|p| p.name == parameter.name && p.location == parameter.location);
            if !present {
                parameters.push(parameter);
            }
        }
        check_parameter_names(&label, path, &parameters)?;

        let request_body = match node.get("requestBody") {
            Some(_) => Some(self.request_body(location.child("requestBody"))?),
            None => None,
        };

        let mut responses = IndexMap::new();
        if let Some(declared) = node.get("responses").and_then(Value::as_object) {
            let base = location.child("responses");
            for code in declared.keys() {
                let response = self.response(base.child(code))?;
                responses.insert(code.clone(), response);
            }
        }

        let security = match node.get("security") {
            Some(value) => Some(SecurityRequirement::parse_list(
                &location.child("security").to_string(),
                value,
            )?),
            None => None,
        };
        let servers = parse_servers(&location, node.get("servers"))?
            .unwrap_or_else(|| inherited_servers.to_vec());

        Ok(Operation {
            operation_id,
            path: path.to_string(),
            method,
            summary: node.get("summary").and_then(Value::as_str).map(String::from),
            tags: node
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(|t| t.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default(),
            parameters,
            request_body,
            responses,
            security,
            servers,
        })
    }

    fn parameters(
        &mut self,
        owner: &Location,
        map: &Map<String, Value>,
        label: &str,
    ) -> Result<Vec<Parameter>, DefinitionError> {
        let Some(entries) = map.get("parameters").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };
        let base = owner.child("parameters");
        let mut parameters: Vec<Parameter> = Vec::new();
        for index in 0..entries.len() {
            let parameter = self.parameter(base.child(&index.to_string()))?;
            let duplicate = parameters
                .iter()
                .any(|p| p.name == parameter.name && p.location == parameter.location);
            if duplicate {
                return Err(DefinitionError::DuplicateParameter {
                    operation: label.to_string(),
                    name: parameter.name,
                    location: parameter.location.as_str(),
                });
            }
            parameters.push(parameter);
        }
        Ok(parameters)
    }

    fn parameter(&mut self, location: Location) -> Result<Parameter, DefinitionError> {
        let (location, node) = self.resolve(location)?;
        let malformed = |message: &str| DefinitionError::Malformed {
            location: location.to_string(),
            message: message.to_string(),
        };
        let name = node
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("parameter requires name"))?
            .to_string();
        let parameter_location = node
            .get("in")
            .and_then(Value::as_str)
            .and_then(ParameterLocation::parse)
            .ok_or_else(|| malformed("parameter requires in: path, query, header, or cookie"))?;
        let style = match node.get("style").and_then(Value::as_str) {
            Some(raw) => ParameterStyle::parse(raw)
                .ok_or_else(|| malformed(&format!("unknown style {raw:?}")))?,
            None => parameter_location.default_style(),
        };
        if !parameter_location.allows(style) {
            return Err(DefinitionError::StyleNotAllowed {
                name,
                style: style.as_str(),
                location: parameter_location.as_str(),
            });
        }
        let explode = node
            .get("explode")
            .and_then(Value::as_bool)
            .unwrap_or_else(|| style.default_explode());

        let (schema, media_type) = if node.contains_key("content") {
            let content = self.content(&location, &node)?;
            match content.into_iter().next() {
                Some((media_type, declared)) => (declared.schema, Some(media_type)),
                None => (None, None),
            }
        } else {
            (self.optional_schema(&location, &node)?, None)
        };

        Ok(Parameter {
            name,
            location: parameter_location,
            required: node.get("required").and_then(Value::as_bool).unwrap_or(false),
            style,
            explode,
            schema,
            media_type,
        })
    }

    fn request_body(&mut self, location: Location) -> Result<RequestBody, DefinitionError> {
        let (location, node) = self.resolve(location)?;
        Ok(RequestBody {
            required: node.get("required").and_then(Value::as_bool).unwrap_or(false),
            content: self.content(&location, &node)?,
        })
    }

    fn response(&mut self, location: Location) -> Result<Response, DefinitionError> {
        let (location, node) = self.resolve(location)?;

        let mut headers = IndexMap::new();
        if let Some(declared) = node.get("headers").and_then(Value::as_object) {
            let base = location.child("headers");
            for name in declared.keys() {
                // Content-Type is described by the content map.
                if name.eq_ignore_ascii_case("content-type") {
                    continue;
                }
                headers.insert(name.clone(), self.header(base.child(name))?);
            }
        }

        let mut links = IndexMap::new();
        if let Some(declared) = node.get("links").and_then(Value::as_object) {
            let base = location.child("links");
            for name in declared.keys() {
                let (_, link) = self.resolve(base.child(name))?;
                links.insert(name.clone(), parse_link(name, &link)?);
            }
        }

        Ok(Response {
            description: node
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            headers,
            content: self.content(&location, &node)?,
            links,
        })
    }

    fn header(&mut self, location: Location) -> Result<Header, DefinitionError> {
        let (location, node) = self.resolve(location)?;
        let schema = if node.contains_key("content") {
            self.content(&location, &node)?
                .into_values()
                .next()
                .and_then(|media| media.schema)
        } else {
            self.optional_schema(&location, &node)?
        };
        Ok(Header {
            required: node.get("required").and_then(Value::as_bool).unwrap_or(false),
            explode: node.get("explode").and_then(Value::as_bool).unwrap_or(false),
            schema,
        })
    }
}

fn parse_link(name: &str, node: &Map<String, Value>) -> Result<Link, DefinitionError> {
    let operation_id = node.get("operationId").and_then(Value::as_str);
    let operation_ref = node.get("operationRef").and_then(Value::as_str);
    let target = match (operation_id, operation_ref) {
        (Some(id), None) => LinkTarget::OperationId(id.to_string()),
        (None, Some(reference)) => LinkTarget::OperationRef(reference.to_string()),
        _ => {
            return Err(DefinitionError::LinkTarget {
                name: name.to_string(),
            })
        }
    };
    Ok(Link {
        target,
        parameters: node
            .get("parameters")
            .and_then(Value::as_object)
            .map(|p| p.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default(),
        request_body: node.get("requestBody").cloned(),
    })
}

fn is_path_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '~' | '-')
}

fn check_parameter_names(
    label: &str,
    path: &str,
    parameters: &[Parameter],
) -> Result<(), DefinitionError> {
    let invalid: Vec<String> = parameters
        .iter()
        .filter(|p| match p.location {
            _ if p.name.is_empty() => true,
            ParameterLocation::Path => !p.name.chars().all(is_path_name_char),
            ParameterLocation::Header => HeaderName::from_bytes(p.name.as_bytes()).is_err(),
            _ => false,
        })
        .map(|p| p.name.clone())
        .collect();
    if !invalid.is_empty() {
        return Err(DefinitionError::InvalidParameterNames {
            operation: label.to_string(),
            names: invalid,
        });
    }

    let placeholders = template_names(path);
    for parameter in parameters {
        if parameter.location == ParameterLocation::Path && !placeholders.contains(&parameter.name)
        {
            return Err(DefinitionError::ParameterNotInPath {
                operation: label.to_string(),
                name: parameter.name.clone(),
            });
        }
    }
    for placeholder in placeholders {
        let bound = parameters
            .iter()
            .any(|p| p.location == ParameterLocation::Path && p.name == placeholder);
        if !bound {
            return Err(DefinitionError::UnboundPlaceholder {
                operation: label.to_string(),
                name: placeholder,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use serde_json::json;

    fn load(doc: Value) -> Result<(Document, SchemaEngine), DefinitionError> {
        let base = Url::parse("http://example/openapi.json").unwrap();
        parse(base, doc, &MemoryLoader::new())
    }

    fn petstore() -> Value {
        json!({
            "openapi": "3.1.0",
            "info": {"title": "pets", "version": "1"},
            "servers": [{"url": "https://{host}/v1", "variables": {"host": {"default": "api.example.com"}}}],
            "paths": {
                "/pets/{petId}": {
                    "parameters": [
                        {"name": "petId", "in": "path", "required": true, "schema": {"type": "integer"}},
                        {"name": "trace", "in": "header", "schema": {"type": "string"}}
                    ],
                    "get": {
                        "operationId": "getPet",
                        "tags": ["pets"],
                        "parameters": [
                            {"name": "trace", "in": "header", "required": true, "schema": {"type": "string"}}
                        ],
                        "responses": {
                            "200": {
                                "description": "ok",
                                "headers": {"X-Rate": {"$ref": "#/components/headers/Rate"}},
                                "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}},
                                "links": {"owner": {"operationId": "listPets"}}
                            },
                            "default": {"description": "error"}
                        }
                    }
                },
                "/pets": {
                    "servers": [{"url": "/local"}],
                    "get": {"operationId": "listPets", "tags": ["pets", "list"], "responses": {"200": {"description": "ok"}}}
                }
            },
            "components": {
                "schemas": {"Pet": {"type": "object", "properties": {"id": {"type": "integer"}}}},
                "headers": {"Rate": {"required": true, "schema": {"type": "integer"}}}
            }
        })
    }

    #[test]
    fn parses_operations_and_inherits_parameters() {
        let (doc, _) = load(petstore()).unwrap();
        assert_eq!(doc.dialect, Dialect::V31);
        let op = doc.operation_by_id("getPet").unwrap();
        assert_eq!(op.method, Method::GET);
        let names: Vec<(&str, bool)> = op
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.required))
            .collect();
        assert_eq!(names, vec![("petId", true), ("trace", true)]);
        assert!(op.responses["200"].headers["X-Rate"].required);
        assert!(doc.operation_at("/pets", &Method::GET).is_some());
        assert_eq!(doc.operations_tagged("list").len(), 1);
        assert_eq!(doc.schemas.len(), 1);
    }

    #[test]
    fn server_precedence() {
        let (doc, _) = load(petstore()).unwrap();
        assert_eq!(doc.operation_by_id("getPet").unwrap().servers[0].url, "https://{host}/v1");
        assert_eq!(doc.operation_by_id("listPets").unwrap().servers[0].url, "/local");

        let mut bare = petstore();
        bare.as_object_mut().unwrap().remove("servers");
        let (doc, _) = load(bare).unwrap();
        assert_eq!(doc.servers, vec![Server::root()]);
    }

    #[test]
    fn routes_exact_then_pattern_then_default() {
        let doc = json!({
            "openapi": "3.0.3",
            "paths": {"/test": {"get": {"operationId": "test", "responses": {
                "201": {"description": "created"},
                "2XX": {"description": "success"},
                "5XX": {"description": "failure"},
                "default": {"description": "other"}
            }}}}
        });
        let (doc, _) = load(doc).unwrap();
        let op = doc.operation_by_id("test").unwrap();
        let key = |code: u16| op.route(StatusCode::from_u16(code).unwrap()).map(|(k, _)| k);
        assert_eq!(key(201), Some("201"));
        assert_eq!(key(200), Some("2XX"));
        assert_eq!(key(500), Some("5XX"));
        assert_eq!(key(100), Some("default"));
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = load(json!({"openapi": "2.0", "paths": {}})).unwrap_err();
        assert!(matches!(err, DefinitionError::UnsupportedVersion { .. }));
        let err = load(json!({"swagger": "2.0"})).unwrap_err();
        assert!(matches!(err, DefinitionError::UnsupportedVersion { .. }));
    }

    #[test]
    fn rejects_duplicate_operation_id() {
        let err = load(json!({
            "openapi": "3.1.0",
            "paths": {
                "/a": {"get": {"operationId": "list", "responses": {}}},
                "/b": {"get": {"operationId": "list", "responses": {}}}
            }
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "Duplicate operationId list");
    }

    #[test]
    fn rejects_invalid_parameter_names_together() {
        let err = load(json!({
            "openapi": "3.1.0",
            "paths": {"/{Path:}": {"get": {
                "operationId": "bad",
                "parameters": [
                    {"name": "", "in": "query", "schema": {"type": "string"}},
                    {"name": "Path:", "in": "path", "required": true, "schema": {"type": "string"}}
                ],
                "responses": {}
            }}}
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "Parameter names are invalid: ['', 'Path:']");
    }

    #[test]
    fn path_template_must_match_parameters() {
        let unbound = load(json!({
            "openapi": "3.1.0",
            "paths": {"/items/{missing}": {"get": {"operationId": "get", "responses": {}}}}
        }))
        .unwrap_err();
        assert_eq!(
            unbound.to_string(),
            "Parameter name not found in parameters: missing"
        );

        let stray = load(json!({
            "openapi": "3.1.0",
            "paths": {"/items": {"get": {
                "operationId": "get",
                "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "string"}}],
                "responses": {}
            }}}
        }))
        .unwrap_err();
        assert_eq!(stray.to_string(), "Parameter name not found in path: id");
    }

    #[test]
    fn rejects_duplicate_parameter_and_bad_style() {
        let duplicate = load(json!({
            "openapi": "3.1.0",
            "paths": {"/items": {"get": {
                "operationId": "get",
                "parameters": [
                    {"name": "q", "in": "query"},
                    {"name": "q", "in": "query"}
                ],
                "responses": {}
            }}}
        }))
        .unwrap_err();
        assert!(matches!(duplicate, DefinitionError::DuplicateParameter { .. }));

        let style = load(json!({
            "openapi": "3.1.0",
            "paths": {"/items": {"get": {
                "operationId": "get",
                "parameters": [{"name": "f", "in": "header", "style": "deepObject"}],
                "responses": {}
            }}}
        }))
        .unwrap_err();
        assert!(matches!(style, DefinitionError::StyleNotAllowed { .. }));
    }

    #[test]
    fn server_variable_without_default_fails() {
        let err = load(json!({
            "openapi": "3.1.0",
            "servers": [{"url": "https://{host}/api"}],
            "paths": {}
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "Missing Server Variables ['host']");
    }

    #[test]
    fn links_need_exactly_one_target() {
        let mut doc = petstore();
        doc["paths"]["/pets/{petId}"]["get"]["responses"]["200"]["links"] =
            json!({"both": {"operationId": "listPets", "operationRef": "#/paths/~1pets/get"}});
        assert!(matches!(load(doc).unwrap_err(), DefinitionError::LinkTarget { .. }));

        let mut doc = petstore();
        doc["paths"]["/pets/{petId}"]["get"]["responses"]["200"]["links"] =
            json!({"ghost": {"operationId": "nope"}});
        assert!(matches!(
            load(doc).unwrap_err(),
            DefinitionError::UnknownLinkOperation { .. }
        ));
    }

    #[test]
    fn link_targets_resolve() {
        let mut doc = petstore();
        doc["paths"]["/pets/{petId}"]["get"]["responses"]["200"]["links"] =
            json!({"list": {"operationRef": "#/paths/~1pets/get"}});
        let (doc, _) = load(doc).unwrap();
        let op = doc.operation_by_id("getPet").unwrap();
        let link = &op.responses["200"].links["list"];
        assert_eq!(doc.link_target(link).unwrap().label(), "listPets");
    }

    #[test]
    fn undefined_security_scheme_fails() {
        let err = load(json!({
            "openapi": "3.1.0",
            "security": [{"ghost": []}],
            "paths": {}
        }))
        .unwrap_err();
        assert!(matches!(err, DefinitionError::UndefinedSecurityScheme { .. }));
    }

    #[test]
    fn unresolved_reference_fails_construction() {
        let err = load(json!({
            "openapi": "3.1.0",
            "paths": {"/a": {"get": {"operationId": "a", "responses": {
                "200": {"$ref": "#/components/responses/Missing"}
            }}}}
        }))
        .unwrap_err();
        assert!(matches!(err, DefinitionError::Reference(_)));
    }
}
