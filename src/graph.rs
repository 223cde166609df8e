//! Reference resolution across one or more description documents.
//!
//! Every `$ref` is resolved against the URI of the document that contains it.
//! Targets are memoized by absolute reference, and external documents are
//! fetched through the [`Loader`] at most once per absolute URI.

use std::collections::{HashMap, HashSet};
use std::fmt;

use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::error::ReferenceError;
use crate::loader::Loader;
use crate::types::json_type_name;

/// A node address: a document URI plus a JSON Pointer into it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub document: Url,
    /// Escaped JSON Pointer, empty for the document root.
    pub pointer: String,
}

impl Location {
    pub fn root(document: Url) -> Self {
        Self {
            document,
            pointer: String::new(),
        }
    }

    /// Location of a child member or array index.
    pub fn child(&self, token: &str) -> Self {
        Self {
            document: self.document.clone(),
            pointer: format!("{}/{}", self.pointer, escape_token(token)),
        }
    }

    /// Unescaped pointer tokens.
    pub fn tokens(&self) -> Vec<String> {
        split_pointer(&self.pointer)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document, self.pointer)
    }
}

/// Escape a pointer token (`~` → `~0`, `/` → `~1`).
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Unescape a pointer token (`~1` → `/`, `~0` → `~`).
pub fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Unescaped tokens of a JSON Pointer.
pub fn split_pointer(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer
        .strip_prefix('/')
        .unwrap_or(pointer)
        .split('/')
        .map(unescape_token)
        .collect()
}

/// Navigate a JSON Pointer (e.g. `/components/schemas/Pet`) within `root`.
pub fn navigate<'a>(root: &'a Value, pointer: &str) -> Option<&'a Value> {
    let mut current = root;
    for token in split_pointer(pointer) {
        current = match current {
            Value::Object(map) => map.get(&token)?,
            Value::Array(items) => items.get(token.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolved document set with memoized reference targets.
#[derive(Debug)]
pub struct DocumentGraph {
    root: Url,
    documents: HashMap<Url, Value>,
    resolved: HashMap<String, Location>,
}

impl DocumentGraph {
    pub fn new(root: Url, document: Value) -> Self {
        let root = without_fragment(&root);
        let mut documents = HashMap::new();
        documents.insert(root.clone(), document);
        Self {
            root,
            documents,
            resolved: HashMap::new(),
        }
    }

    /// URI of the root document.
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Number of loaded documents, including the root.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// The node at `location`, if its document is loaded and the pointer exists.
    pub fn node(&self, location: &Location) -> Option<&Value> {
        navigate(self.documents.get(&location.document)?, &location.pointer)
    }

    /// The object at `location`, failing for missing or non-object nodes.
    pub fn object(&self, location: &Location) -> Result<&Map<String, Value>, ReferenceError> {
        let node = self.node(location).ok_or_else(|| ReferenceError::Unresolved {
            reference: location.to_string(),
        })?;
        node.as_object().ok_or_else(|| ReferenceError::Incompatible {
            reference: location.to_string(),
            expected: "object",
            actual: json_type_name(node),
        })
    }

    /// Resolve `reference` as written inside the document at `base`.
    ///
    /// Chains of reference-only nodes are followed to the first concrete node.
    /// Repeated resolution of the same absolute reference returns the memoized
    /// location without touching the loader.
    pub fn resolve(
        &mut self,
        base: &Url,
        reference: &str,
        loader: &dyn Loader,
    ) -> Result<Location, ReferenceError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut base = base.clone();
        let mut reference = reference.to_string();

        loop {
            let absolute = base
                .join(&reference)
                .map_err(|source| ReferenceError::InvalidUri {
                    reference: reference.clone(),
                    base: base.to_string(),
                    source,
                })?;
            let key = absolute.to_string();

            if let Some(location) = self.resolved.get(&key) {
                let location = location.clone();
                self.memoize(chain, &location);
                return Ok(location);
            }
            if !seen.insert(key.clone()) {
                chain.push(key);
                return Err(ReferenceError::Cycle { chain });
            }

            let location = self.locate(&absolute, loader)?;
            chain.push(key);

            match self.node(&location).and_then(reference_of) {
                Some(next) => {
                    base = location.document.clone();
                    reference = next.to_string();
                }
                None => {
                    self.memoize(chain, &location);
                    return Ok(location);
                }
            }
        }
    }

    /// The concrete node for `location`: itself, or its reference target.
    pub fn deref(
        &mut self,
        location: Location,
        loader: &dyn Loader,
    ) -> Result<Location, ReferenceError> {
        let next = self.node(&location).and_then(reference_of).map(str::to_string);
        match next {
            Some(reference) => self.resolve(&location.document.clone(), &reference, loader),
            None => Ok(location),
        }
    }

    fn memoize(&mut self, chain: Vec<String>, location: &Location) {
        for key in chain {
            self.resolved.insert(key, location.clone());
        }
    }

    fn locate(&mut self, absolute: &Url, loader: &dyn Loader) -> Result<Location, ReferenceError> {
        let document = without_fragment(absolute);
        let fragment = absolute.fragment().unwrap_or("");
        let pointer = percent_decode_str(fragment)
            .decode_utf8_lossy()
            .into_owned();

        if !self.documents.contains_key(&document) {
            debug!(uri = %document, "loading referenced document");
            let loaded = loader
                .load(&document)
                .map_err(|source| ReferenceError::Load {
                    uri: document.to_string(),
                    source,
                })?;
            self.documents.insert(document.clone(), loaded);
        }

        let location = Location { document, pointer };
        if self.node(&location).is_none() {
            return Err(ReferenceError::Unresolved {
                reference: absolute.to_string(),
            });
        }
        Ok(location)
    }
}

/// The `$ref` string of a reference object, if `node` is one.
pub fn reference_of(node: &Value) -> Option<&str> {
    node.as_object()?.get("$ref")?.as_str()
}

fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}
