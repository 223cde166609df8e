//! OpenAPI Contract Client
//!
//! Calls HTTP operations described by an OpenAPI 3.0 or 3.1 document and checks
//! every exchange against the description.
//!
//! Construction resolves all references (local, cross-document, and remote),
//! builds a descriptor for every schema, and indexes every operation. A call
//! then serializes parameters per their declared style, negotiates security,
//! routes the response by status, checks its content type and required
//! headers, and validates the decoded body.
//!
//! # Example
//!
//! ```
//! use http::StatusCode;
//! use oas_client::{Api, HttpRequest, HttpResponse, MemoryLoader, Transport, TransportError};
//! use serde_json::json;
//!
//! struct Canned;
//!
//! impl Transport for Canned {
//!     fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
//!         assert_eq!(request.url.as_str(), "https://pets.example/pets/7");
//!         Ok(HttpResponse::json(StatusCode::OK, &json!({"id": 7, "name": "rex"})))
//!     }
//! }
//!
//! let description = json!({
//!     "openapi": "3.1.0",
//!     "servers": [{"url": "https://pets.example"}],
//!     "paths": {
//!         "/pets/{petId}": {
//!             "get": {
//!                 "operationId": "getPet",
//!                 "parameters": [
//!                     {"name": "petId", "in": "path", "required": true, "schema": {"type": "integer"}}
//!                 ],
//!                 "responses": {
//!                     "200": {
//!                         "description": "a pet",
//!                         "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}}
//!                     }
//!                 }
//!             }
//!         }
//!     },
//!     "components": {
//!         "schemas": {
//!             "Pet": {
//!                 "type": "object",
//!                 "required": ["id", "name"],
//!                 "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}
//!             }
//!         }
//!     }
//! });
//!
//! let api = Api::builder("https://pets.example/openapi.json", description)
//!     .loader(MemoryLoader::new())
//!     .transport(Canned)
//!     .build()
//!     .unwrap();
//!
//! let result = api
//!     .operation("getPet")
//!     .unwrap()
//!     .with_parameter("petId", json!(7))
//!     .call()
//!     .unwrap();
//!
//! assert_eq!(result.matched, "200");
//! assert_eq!(result.json().unwrap()["name"], "rex");
//! ```
//!
//! # Parameter Styles
//!
//! | Location | Styles | Default |
//! |----------|--------|---------|
//! | `path` | `simple`, `label`, `matrix` | `simple` |
//! | `query` | `form`, `spaceDelimited`, `pipeDelimited`, `deepObject` | `form` |
//! | `header` | `simple` | `simple` |
//! | `cookie` | `form` | `form` |
//!
//! `explode` defaults to true for `form` and false otherwise.

mod client;
mod document;
mod error;
mod graph;
mod loader;
mod params;
mod schema;
mod security;
mod transport;
mod types;

pub use client::{
    Api, ApiBuilder, CallResult, DecodedResponse, OperationKey, PreparedRequest, Request,
    ResponseData, SentRequest,
};
pub use document::{
    Dialect, Document, Header, Link, LinkTarget, MediaType, Operation, RequestBody, Response,
    Server, ServerVariable,
};
pub use error::{
    CallError, CodecError, DefinitionError, LoadError, ReferenceError, SchemaError,
    TransportError, ValidateError,
};
pub use graph::{DocumentGraph, Location};
pub use loader::{
    base_uri_for, is_url, load_document, load_document_auto, parse_document, DefaultLoader,
    FileSystemLoader, Loader, MemoryLoader,
};
pub use params::{
    check_parameters, decode_pairs, decode_text, encode_pairs, encode_path, encode_text,
    substitute_path, template_names, Encoded, Parameter,
};
pub use schema::{
    AdditionalProperties, Discriminator, MergedObject, Primitive, Schema, SchemaEngine, SchemaId,
    SchemaType, TypeHint, ValidationWarning, ValueKind,
};
pub use security::{
    AppliedSecurity, AuthError, Authenticator, Credential, Credentials, HttpAuthScheme,
    SecurityRequirement, SecurityScheme,
};
pub use transport::{HttpRequest, HttpResponse, Transport};
pub use types::{ClientOptions, ParameterLocation, ParameterStyle, StatusClass};

#[cfg(feature = "remote")]
pub use loader::{load_document_url, HttpLoader};
#[cfg(feature = "remote")]
pub use transport::ReqwestTransport;
