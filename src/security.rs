//! Security schemes, session credentials, and requirement negotiation.
//!
//! A requirement list is an OR of AND-sets of scheme names. [`negotiate`]
//! picks the first set whose every scheme has a credential, and [`apply`]
//! turns each selected scheme into headers, query pairs, or cookies.

use std::collections::BTreeMap;
use std::error::Error as StdError;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{CallError, DefinitionError};
use crate::transport::HttpRequest;
use crate::types::ParameterLocation;

/// Error type returned by [`Authenticator`] hooks.
pub type AuthError = Box<dyn StdError + Send + Sync>;

/// Scheme named by an `http` security scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpAuthScheme {
    Basic,
    Bearer,
    Digest,
    /// Any other registered scheme, lowercased.
    Other(String),
}

/// A declared security scheme.
#[derive(Debug, Clone, PartialEq)]
pub enum SecurityScheme {
    ApiKey {
        name: String,
        location: ParameterLocation,
    },
    Http {
        scheme: HttpAuthScheme,
        bearer_format: Option<String>,
    },
    OAuth2 {
        flows: Value,
    },
    OpenIdConnect {
        url: String,
    },
    MutualTls,
}

impl SecurityScheme {
    /// Parse a security scheme object.
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError::InvalidSecurityScheme` for unknown types and
    /// missing required fields.
    pub fn parse(name: &str, node: &Map<String, Value>) -> Result<Self, DefinitionError> {
        let invalid = |message: &str| DefinitionError::InvalidSecurityScheme {
            name: name.to_string(),
            message: message.to_string(),
        };
        let field = |key: &str| node.get(key).and_then(Value::as_str);

        match field("type") {
            Some("apiKey") => {
                let key_name = field("name").ok_or_else(|| invalid("apiKey requires name"))?;
                let location = field("in")
                    .and_then(ParameterLocation::parse)
                    .filter(|l| *l != ParameterLocation::Path)
                    .ok_or_else(|| invalid("apiKey requires in: query, header, or cookie"))?;
                Ok(SecurityScheme::ApiKey {
                    name: key_name.to_string(),
                    location,
                })
            }
            Some("http") => {
                let scheme = field("scheme").ok_or_else(|| invalid("http requires scheme"))?;
                let scheme = match scheme.to_ascii_lowercase().as_str() {
                    "basic" => HttpAuthScheme::Basic,
                    "bearer" => HttpAuthScheme::Bearer,
                    "digest" => HttpAuthScheme::Digest,
                    other => HttpAuthScheme::Other(other.to_string()),
                };
                Ok(SecurityScheme::Http {
                    scheme,
                    bearer_format: field("bearerFormat").map(String::from),
                })
            }
            Some("oauth2") => Ok(SecurityScheme::OAuth2 {
                flows: node.get("flows").cloned().unwrap_or(Value::Null),
            }),
            Some("openIdConnect") => {
                let url = field("openIdConnectUrl")
                    .ok_or_else(|| invalid("openIdConnect requires openIdConnectUrl"))?;
                Ok(SecurityScheme::OpenIdConnect {
                    url: url.to_string(),
                })
            }
            Some("mutualTLS") => Ok(SecurityScheme::MutualTls),
            Some(other) => Err(invalid(&format!("unknown type {other:?}"))),
            None => Err(invalid("missing type")),
        }
    }
}

/// An AND-set of scheme names with their scopes. Empty means anonymous access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityRequirement {
    pub schemes: IndexMap<String, Vec<String>>,
}

impl SecurityRequirement {
    /// Parse a requirement list (`[{scheme: [scopes]}, ...]`).
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError::Malformed` for anything but a list of objects.
    pub fn parse_list(location: &str, node: &Value) -> Result<Vec<Self>, DefinitionError> {
        let malformed = || DefinitionError::Malformed {
            location: location.to_string(),
            message: "security must be a list of requirement objects".to_string(),
        };
        node.as_array()
            .ok_or_else(malformed)?
            .iter()
            .map(|entry| {
                let map = entry.as_object().ok_or_else(malformed)?;
                let schemes = map
                    .iter()
                    .map(|(name, scopes)| {
                        let scopes = scopes
                            .as_array()
                            .map(|s| {
                                s.iter()
                                    .filter_map(|v| v.as_str().map(String::from))
                                    .collect()
                            })
                            .unwrap_or_default();
                        (name.clone(), scopes)
                    })
                    .collect();
                Ok(SecurityRequirement { schemes })
            })
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.schemes.keys().cloned().collect()
    }

    pub fn is_anonymous(&self) -> bool {
        self.schemes.is_empty()
    }
}

/// A session credential for one scheme.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// API key, bearer token, or pre-acquired OAuth2 access token.
    Secret(String),
    /// Username and password for Basic or Digest.
    UserPassword { user: String, password: String },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Secret(_) => f.write_str("Secret(***)"),
            Credential::UserPassword { user, .. } => f
                .debug_struct("UserPassword")
                .field("user", user)
                .field("password", &"***")
                .finish(),
        }
    }
}

impl From<&str> for Credential {
    fn from(secret: &str) -> Self {
        Credential::Secret(secret.to_string())
    }
}

impl From<String> for Credential {
    fn from(secret: String) -> Self {
        Credential::Secret(secret)
    }
}

impl From<(&str, &str)> for Credential {
    fn from((user, password): (&str, &str)) -> Self {
        Credential::UserPassword {
            user: user.to_string(),
            password: password.to_string(),
        }
    }
}

/// Session credentials keyed by scheme name.
pub type Credentials = BTreeMap<String, Credential>;

/// Hooks for token acquisition and challenge/response schemes.
pub trait Authenticator: Send + Sync {
    /// Access token for an OAuth2 or OpenID Connect scheme.
    fn access_token(&self, scheme_name: &str, scheme: &SecurityScheme) -> Result<String, AuthError> {
        let _ = scheme;
        Err(format!("no token source for {scheme_name}").into())
    }

    /// `Authorization` value answering a `WWW-Authenticate` challenge.
    fn answer_challenge(
        &self,
        scheme_name: &str,
        challenge: &str,
        request: &HttpRequest,
        credential: &Credential,
    ) -> Result<String, AuthError> {
        let _ = (challenge, request, credential);
        Err(format!("no challenge handler for {scheme_name}").into())
    }
}

/// Credentials rendered for one request.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AppliedSecurity {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    /// Digest scheme to answer after the server's first 401.
    pub digest: Option<String>,
}

/// Reject credentials for schemes that neither the operation nor the document
/// default ever requests.
///
/// # Errors
///
/// Returns `CallError::UnexpectedSecurity` naming every unexpected scheme.
pub fn check_unexpected(
    operation: &str,
    requirements: &[SecurityRequirement],
    global: &[SecurityRequirement],
    credentials: &Credentials,
) -> Result<(), CallError> {
    let requested = |name: &str| {
        requirements
            .iter()
            .chain(global)
            .any(|r| r.schemes.contains_key(name))
    };
    let unexpected: Vec<String> = credentials
        .keys()
        .filter(|name| !requested(name.as_str()))
        .cloned()
        .collect();
    if unexpected.is_empty() {
        Ok(())
    } else {
        Err(CallError::UnexpectedSecurity {
            operation: operation.to_string(),
            schemes: unexpected,
        })
    }
}

/// The first requirement set fully covered by `credentials`.
///
/// Returns `Ok(None)` when the operation declares no requirements.
///
/// # Errors
///
/// Returns `CallError::NoSecuritySatisfied` listing every attempted set.
pub fn negotiate<'r>(
    requirements: &'r [SecurityRequirement],
    credentials: &Credentials,
) -> Result<Option<&'r SecurityRequirement>, CallError> {
    if requirements.is_empty() {
        return Ok(None);
    }
    let selected = requirements
        .iter()
        .find(|r| r.schemes.keys().all(|name| credentials.contains_key(name)));
    match selected {
        Some(requirement) => {
            debug!(schemes = ?requirement.names(), "negotiated security requirement");
            Ok(Some(requirement))
        }
        None => Err(CallError::NoSecuritySatisfied {
            attempted: requirements.iter().map(SecurityRequirement::names).collect(),
            provided: credentials.keys().cloned().collect(),
        }),
    }
}

/// Render one negotiated scheme into `out`.
///
/// # Errors
///
/// Returns `CallError::Authentication` when the credential does not fit the
/// scheme or the authenticator cannot supply a token.
pub fn apply(
    scheme_name: &str,
    scheme: &SecurityScheme,
    credential: &Credential,
    authenticator: Option<&dyn Authenticator>,
    out: &mut AppliedSecurity,
) -> Result<(), CallError> {
    let failure = |message: &str| CallError::Authentication {
        scheme: scheme_name.to_string(),
        message: message.to_string(),
    };
    let secret = || match credential {
        Credential::Secret(secret) => Ok(secret.clone()),
        Credential::UserPassword { .. } => Err(failure("expects a single secret")),
    };

    match scheme {
        SecurityScheme::ApiKey { name, location } => {
            let pair = (name.clone(), secret()?);
            match location {
                ParameterLocation::Query => out.query.push(pair),
                ParameterLocation::Cookie => out.cookies.push(pair),
                _ => out.headers.push(pair),
            }
        }
        SecurityScheme::Http { scheme, .. } => match scheme {
            HttpAuthScheme::Basic => {
                let raw = match credential {
                    Credential::UserPassword { user, password } => format!("{user}:{password}"),
                    Credential::Secret(secret) => secret.clone(),
                };
                out.headers
                    .push(("authorization".into(), format!("Basic {}", STANDARD.encode(raw))));
            }
            HttpAuthScheme::Bearer => {
                out.headers
                    .push(("authorization".into(), format!("Bearer {}", secret()?)));
            }
            HttpAuthScheme::Digest => out.digest = Some(scheme_name.to_string()),
            HttpAuthScheme::Other(name) => {
                out.headers
                    .push(("authorization".into(), format!("{name} {}", secret()?)));
            }
        },
        SecurityScheme::OAuth2 { .. } | SecurityScheme::OpenIdConnect { .. } => {
            let token = match authenticator {
                Some(authenticator) => authenticator
                    .access_token(scheme_name, scheme)
                    .map_err(|e| failure(&e.to_string()))?,
                None => secret()?,
            };
            out.headers
                .push(("authorization".into(), format!("Bearer {token}")));
        }
        SecurityScheme::MutualTls => {
            debug!(scheme = scheme_name, "mutual TLS is handled by the transport");
        }
    }
    Ok(())
}
