//! Schema descriptors and value validation.
//!
//! Schemas live in an arena owned by [`SchemaEngine`] and refer to each other
//! by [`SchemaId`], so recursive definitions are plain index cycles.
//! Descriptors are built once per concrete node (memoized by location) while
//! the document loads; afterwards the engine is read-only.

use std::collections::{HashMap, HashSet};

use fancy_regex::Regex;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use crate::error::{DefinitionError, ReferenceError, SchemaError};
use crate::graph::{escape_token, DocumentGraph, Location};
use crate::loader::Loader;
use crate::types::json_type_name;

/// Index of a schema in its [`SchemaEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaId(usize);

impl SchemaId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Primitive type keyword values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl SchemaType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "null" => Some(SchemaType::Null),
            "boolean" => Some(SchemaType::Boolean),
            "integer" => Some(SchemaType::Integer),
            "number" => Some(SchemaType::Number),
            "string" => Some(SchemaType::String),
            "array" => Some(SchemaType::Array),
            "object" => Some(SchemaType::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Null => "null",
            SchemaType::Boolean => "boolean",
            SchemaType::Integer => "integer",
            SchemaType::Number => "number",
            SchemaType::String => "string",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
        }
    }

    /// Whether `value` is an instance of this type. Integers are numbers.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (SchemaType::Null, Value::Null) => true,
            (SchemaType::Boolean, Value::Bool(_)) => true,
            (SchemaType::Number, Value::Number(_)) => true,
            (SchemaType::Integer, Value::Number(n)) => integral(n).is_some(),
            (SchemaType::String, Value::String(_)) => true,
            (SchemaType::Array, Value::Array(_)) => true,
            (SchemaType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

/// The integer value of `n` when it has no fractional part, so `1.0` counts.
fn integral(n: &Number) -> Option<i128> {
    if let Some(i) = n.as_i64() {
        return Some(i128::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(i128::from(u));
    }
    n.as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0)
        .map(|f| f as i128)
}

/// Treatment of properties not listed in `properties`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdditionalProperties {
    #[default]
    Allowed,
    Forbidden,
    Schema(SchemaId),
}

/// Tagged-union hint for `oneOf`/`anyOf`.
#[derive(Debug, Clone)]
pub struct Discriminator {
    pub property_name: String,
    /// Explicit tag → member mapping, already resolved.
    pub mapping: IndexMap<String, SchemaId>,
}

/// Object view of an `allOf` composition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedObject {
    pub properties: IndexMap<String, SchemaId>,
    pub required: Vec<String>,
}

/// A schema descriptor.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub location: String,
    /// Name under `components/schemas`, used for implicit discriminator tags.
    pub name: Option<String>,
    /// Accepted types; empty accepts any type.
    pub types: Vec<SchemaType>,
    pub format: Option<String>,
    pub nullable: bool,
    /// The boolean schema `false`.
    pub never: bool,
    pub enumeration: Option<Vec<Value>>,
    pub constant: Option<Value>,
    pub default: Option<Value>,
    pub example: Option<Value>,

    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub multiple_of: Option<f64>,

    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,

    pub items: Option<SchemaId>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub unique_items: bool,

    pub properties: IndexMap<String, SchemaId>,
    pub required: Vec<String>,
    pub additional_properties: AdditionalProperties,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,

    pub all_of: Vec<SchemaId>,
    pub one_of: Vec<SchemaId>,
    pub any_of: Vec<SchemaId>,
    pub not: Option<SchemaId>,
    pub discriminator: Option<Discriminator>,

    merged: Option<MergedObject>,
}

impl Schema {
    fn accepts_null(&self) -> bool {
        self.nullable || self.types.contains(&SchemaType::Null)
    }

    fn members(&self) -> impl Iterator<Item = SchemaId> + '_ {
        self.one_of.iter().chain(self.any_of.iter()).copied()
    }
}

/// A non-fatal validation finding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationWarning {
    /// JSON Pointer to the value that triggered the warning.
    pub path: String,
    pub message: String,
}

/// Read-only arena of schema descriptors.
#[derive(Debug, Default)]
pub struct SchemaEngine {
    schemas: Vec<Schema>,
    index: HashMap<Location, SchemaId>,
}

impl SchemaEngine {
    pub fn get(&self, id: SchemaId) -> &Schema {
        &self.schemas[id.0]
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// The descriptor built for the concrete node at `location`.
    pub fn lookup(&self, location: &Location) -> Option<SchemaId> {
        self.index.get(location).copied()
    }

    /// Object view of `id`: the `allOf` merge when present, its own
    /// properties otherwise.
    pub fn merged(&self, id: SchemaId) -> MergedObject {
        let schema = self.get(id);
        match &schema.merged {
            Some(merged) => merged.clone(),
            None => MergedObject {
                properties: schema.properties.clone(),
                required: schema.required.clone(),
            },
        }
    }

    /// Typing information for decoding serialized values.
    pub fn hint(&self, id: SchemaId) -> TypeHint<'_> {
        TypeHint {
            engine: Some(self),
            schema: Some(id),
        }
    }

    /// Validate `value` against schema `id` with lenient discriminators.
    pub fn validate(
        &self,
        id: SchemaId,
        value: &Value,
    ) -> Result<Vec<ValidationWarning>, Vec<SchemaError>> {
        self.validate_with(id, value, false)
    }

    /// Validate `value`; `strict_discriminator` turns unmapped discriminator
    /// values into failures.
    pub fn validate_with(
        &self,
        id: SchemaId,
        value: &Value,
        strict_discriminator: bool,
    ) -> Result<Vec<ValidationWarning>, Vec<SchemaError>> {
        let mut validator = Validator::new(self, strict_discriminator, HashSet::new());
        validator.check(id, value, "");
        validator.finish()
    }
}

// --- Construction ---

/// Builds descriptors from resolved nodes, memoized by location.
#[derive(Debug, Default)]
pub(crate) struct SchemaBuilder {
    engine: SchemaEngine,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build (or return the memoized) descriptor for the node at `location`.
    pub fn build(
        &mut self,
        graph: &mut DocumentGraph,
        loader: &dyn Loader,
        location: Location,
    ) -> Result<SchemaId, DefinitionError> {
        let location = graph.deref(location, loader)?;
        if let Some(id) = self.engine.lookup(&location) {
            return Ok(id);
        }

        let node = graph
            .node(&location)
            .cloned()
            .ok_or_else(|| ReferenceError::Unresolved {
                reference: location.to_string(),
            })?;

        let id = SchemaId(self.engine.schemas.len());
        self.engine.schemas.push(Schema {
            location: location.to_string(),
            ..Schema::default()
        });
        self.engine.index.insert(location.clone(), id);

        let schema = match &node {
            Value::Bool(allowed) => Schema {
                location: location.to_string(),
                never: !allowed,
                ..Schema::default()
            },
            Value::Object(map) => self.parse(graph, loader, &location, map)?,
            other => {
                return Err(ReferenceError::Incompatible {
                    reference: location.to_string(),
                    expected: "schema",
                    actual: json_type_name(other),
                }
                .into())
            }
        };
        self.engine.schemas[id.0] = schema;
        Ok(id)
    }

    fn parse(
        &mut self,
        graph: &mut DocumentGraph,
        loader: &dyn Loader,
        location: &Location,
        map: &Map<String, Value>,
    ) -> Result<Schema, DefinitionError> {
        let mut schema = Schema {
            location: location.to_string(),
            name: component_name(location),
            ..Schema::default()
        };

        schema.types = match map.get("type") {
            None => Vec::new(),
            Some(Value::String(s)) => vec![parse_type(s, location)?],
            Some(Value::Array(items)) => items
                .iter()
                .map(|t| {
                    t.as_str()
                        .ok_or_else(|| malformed(location, "type entries must be strings"))
                        .and_then(|s| parse_type(s, location))
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(malformed(location, "type must be a string or array")),
        };
        schema.nullable = map.get("nullable").and_then(Value::as_bool).unwrap_or(false);
        schema.format = map.get("format").and_then(Value::as_str).map(String::from);
        schema.enumeration = map.get("enum").and_then(Value::as_array).cloned();
        schema.constant = map.get("const").cloned();
        schema.default = map.get("default").cloned();
        schema.example = map.get("example").cloned();

        schema.minimum = map.get("minimum").and_then(Value::as_f64);
        schema.maximum = map.get("maximum").and_then(Value::as_f64);
        // 3.0 flags the bound as exclusive, 3.1 carries the bound itself.
        match map.get("exclusiveMinimum") {
            Some(Value::Bool(true)) => schema.exclusive_minimum = schema.minimum.take(),
            Some(Value::Number(n)) => schema.exclusive_minimum = n.as_f64(),
            _ => {}
        }
        match map.get("exclusiveMaximum") {
            Some(Value::Bool(true)) => schema.exclusive_maximum = schema.maximum.take(),
            Some(Value::Number(n)) => schema.exclusive_maximum = n.as_f64(),
            _ => {}
        }
        schema.multiple_of = map.get("multipleOf").and_then(Value::as_f64);

        schema.min_length = as_usize(map.get("minLength"));
        schema.max_length = as_usize(map.get("maxLength"));
        if let Some(pattern) = map.get("pattern").and_then(Value::as_str) {
            let regex = Regex::new(pattern).map_err(|source| DefinitionError::InvalidPattern {
                location: location.to_string(),
                pattern: pattern.to_string(),
                source: Box::new(source),
            })?;
            schema.pattern = Some(regex);
        }

        if matches!(map.get("items"), Some(Value::Object(_) | Value::Bool(_))) {
            schema.items = Some(self.build(graph, loader, location.child("items"))?);
        }
        schema.min_items = as_usize(map.get("minItems"));
        schema.max_items = as_usize(map.get("maxItems"));
        schema.unique_items = map.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false);

        if let Some(properties) = map.get("properties").and_then(Value::as_object) {
            let base = location.child("properties");
            for name in properties.keys() {
                if name.is_empty() {
                    return Err(DefinitionError::EmptyPropertyName {
                        location: location.to_string(),
                    });
                }
                let id = self.build(graph, loader, base.child(name))?;
                schema.properties.insert(name.clone(), id);
            }
        }
        schema.required = map
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        schema.additional_properties = match map.get("additionalProperties") {
            Some(Value::Bool(false)) => AdditionalProperties::Forbidden,
            Some(Value::Object(_)) => AdditionalProperties::Schema(self.build(
                graph,
                loader,
                location.child("additionalProperties"),
            )?),
            _ => AdditionalProperties::Allowed,
        };
        schema.min_properties = as_usize(map.get("minProperties"));
        schema.max_properties = as_usize(map.get("maxProperties"));

        schema.all_of = self.build_list(graph, loader, location, map, "allOf")?;
        schema.one_of = self.build_list(graph, loader, location, map, "oneOf")?;
        schema.any_of = self.build_list(graph, loader, location, map, "anyOf")?;
        if map.contains_key("not") {
            schema.not = Some(self.build(graph, loader, location.child("not"))?);
        }

        if let Some(discriminator) = map.get("discriminator").and_then(Value::as_object) {
            schema.discriminator = Some(self.discriminator(graph, loader, location, discriminator)?);
        }

        Ok(schema)
    }

    fn build_list(
        &mut self,
        graph: &mut DocumentGraph,
        loader: &dyn Loader,
        location: &Location,
        map: &Map<String, Value>,
        keyword: &str,
    ) -> Result<Vec<SchemaId>, DefinitionError> {
        let Some(members) = map.get(keyword) else {
            return Ok(Vec::new());
        };
        let members = members
            .as_array()
            .ok_or_else(|| malformed(location, &format!("{keyword} must be an array")))?;
        let base = location.child(keyword);
        (0..members.len())
            .map(|i| self.build(graph, loader, base.child(&i.to_string())))
            .collect()
    }

    fn discriminator(
        &mut self,
        graph: &mut DocumentGraph,
        loader: &dyn Loader,
        location: &Location,
        node: &Map<String, Value>,
    ) -> Result<Discriminator, DefinitionError> {
        let property_name = node
            .get("propertyName")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed(location, "discriminator requires propertyName"))?
            .to_string();

        let mut mapping = IndexMap::new();
        if let Some(entries) = node.get("mapping").and_then(Value::as_object) {
            for (tag, target) in entries {
                let target = target
                    .as_str()
                    .ok_or_else(|| malformed(location, "discriminator mapping values must be strings"))?;
                let target_location = if target.contains('#') || target.contains('/') {
                    graph.resolve(&location.document, target, loader)?
                } else {
                    Location::root(location.document.clone())
                        .child("components")
                        .child("schemas")
                        .child(target)
                };
                let id = self.build(graph, loader, target_location)?;
                mapping.insert(tag.clone(), id);
            }
        }
        Ok(Discriminator {
            property_name,
            mapping,
        })
    }

    /// Run whole-graph checks and freeze the engine.
    pub fn finish(mut self) -> Result<SchemaEngine, DefinitionError> {
        for schema in &self.engine.schemas {
            check_discriminator(&self.engine, schema)?;
        }

        let composed: Vec<SchemaId> = (0..self.engine.schemas.len())
            .map(SchemaId)
            .filter(|id| !self.engine.get(*id).all_of.is_empty())
            .collect();
        for id in composed {
            let merged = merge(&self.engine, id, &mut HashSet::new())?;
            self.engine.schemas[id.0].merged = Some(merged);
        }
        Ok(self.engine)
    }
}

fn check_discriminator(engine: &SchemaEngine, schema: &Schema) -> Result<(), DefinitionError> {
    let Some(discriminator) = &schema.discriminator else {
        return Ok(());
    };
    let members: Vec<SchemaId> = schema.members().collect();
    if members.is_empty() {
        return Ok(());
    }

    for (tag, target) in &discriminator.mapping {
        if !members.contains(target) {
            return Err(DefinitionError::AmbiguousDiscriminator {
                location: schema.location.clone(),
                message: format!(
                    "tag {tag:?} maps to {} which is not a member of the union",
                    engine.get(*target).location
                ),
            });
        }
    }

    let mut names = HashMap::new();
    for member in members {
        if let Some(name) = &engine.get(member).name {
            if let Some(previous) = names.insert(name.clone(), member) {
                if previous != member {
                    return Err(DefinitionError::AmbiguousDiscriminator {
                        location: schema.location.clone(),
                        message: format!("several members are named {name:?}"),
                    });
                }
            }
        }
    }
    Ok(())
}

fn merge(
    engine: &SchemaEngine,
    id: SchemaId,
    visiting: &mut HashSet<SchemaId>,
) -> Result<MergedObject, DefinitionError> {
    if !visiting.insert(id) {
        return Ok(MergedObject::default());
    }
    let schema = engine.get(id);
    let mut merged = MergedObject {
        properties: schema.properties.clone(),
        required: schema.required.clone(),
    };

    for member in &schema.all_of {
        let part = merge(engine, *member, visiting)?;
        for (name, property) in part.properties {
            match merged.properties.get(&name) {
                Some(existing) if !compatible(engine, *existing, property) => {
                    return Err(DefinitionError::ConflictingProperty {
                        location: schema.location.clone(),
                        property: name,
                    });
                }
                Some(_) => {}
                None => {
                    merged.properties.insert(name, property);
                }
            }
        }
        for name in part.required {
            if !merged.required.contains(&name) {
                merged.required.push(name);
            }
        }
    }

    visiting.remove(&id);
    Ok(merged)
}

const MERGE_DEPTH: usize = 8;

/// Whether two property schemas constrain values identically. Annotations
/// such as `description`, `title`, `example`, and `default` are ignored.
fn compatible(engine: &SchemaEngine, a: SchemaId, b: SchemaId) -> bool {
    same_constraints(engine, a, b, 0)
}

fn same_constraints(engine: &SchemaEngine, a: SchemaId, b: SchemaId, depth: usize) -> bool {
    if a == b {
        return true;
    }
    if depth >= MERGE_DEPTH {
        return false;
    }
    let same = |x: SchemaId, y: SchemaId| same_constraints(engine, x, y, depth + 1);
    let same_opt = |x: Option<SchemaId>, y: Option<SchemaId>| match (x, y) {
        (Some(x), Some(y)) => same(x, y),
        (None, None) => true,
        _ => false,
    };
    let same_list = |x: &[SchemaId], y: &[SchemaId]| {
        x.len() == y.len() && x.iter().zip(y).all(|(x, y)| same(*x, *y))
    };
    let (x, y) = (engine.get(a), engine.get(b));

    let mut required_x = x.required.clone();
    let mut required_y = y.required.clone();
    required_x.sort();
    required_y.sort();

    let additional = match (x.additional_properties, y.additional_properties) {
        (AdditionalProperties::Schema(p), AdditionalProperties::Schema(q)) => same(p, q),
        (p, q) => p == q,
    };
    let properties = x.properties.len() == y.properties.len()
        && x
            .properties
            .iter()
            .all(|(name, p)| y.properties.get(name).is_some_and(|q| same(*p, *q)));

    x.types == y.types
        && x.format == y.format
        && x.nullable == y.nullable
        && x.never == y.never
        && x.enumeration == y.enumeration
        && x.constant == y.constant
        && x.minimum == y.minimum
        && x.maximum == y.maximum
        && x.exclusive_minimum == y.exclusive_minimum
        && x.exclusive_maximum == y.exclusive_maximum
        && x.multiple_of == y.multiple_of
        && x.min_length == y.min_length
        && x.max_length == y.max_length
        && x.pattern.as_ref().map(Regex::as_str) == y.pattern.as_ref().map(Regex::as_str)
        && same_opt(x.items, y.items)
        && x.min_items == y.min_items
        && x.max_items == y.max_items
        && x.unique_items == y.unique_items
        && properties
        && required_x == required_y
        && additional
        && x.min_properties == y.min_properties
        && x.max_properties == y.max_properties
        && same_list(&x.all_of, &y.all_of)
        && same_list(&x.one_of, &y.one_of)
        && same_list(&x.any_of, &y.any_of)
        && same_opt(x.not, y.not)
}

fn component_name(location: &Location) -> Option<String> {
    match location.tokens().as_slice() {
        [components, schemas, name] if components == "components" && schemas == "schemas" => {
            Some(name.clone())
        }
        _ => None,
    }
}

fn parse_type(s: &str, location: &Location) -> Result<SchemaType, DefinitionError> {
    SchemaType::parse(s).ok_or_else(|| malformed(location, &format!("unknown type {s:?}")))
}

fn malformed(location: &Location, message: &str) -> DefinitionError {
    DefinitionError::Malformed {
        location: location.to_string(),
        message: message.to_string(),
    }
}

fn as_usize(value: Option<&Value>) -> Option<usize> {
    value.and_then(Value::as_u64).map(|n| n as usize)
}

// --- Validation ---

struct Validator<'e> {
    engine: &'e SchemaEngine,
    strict_discriminator: bool,
    active: HashSet<(SchemaId, String)>,
    errors: Vec<SchemaError>,
    warnings: Vec<ValidationWarning>,
}

impl<'e> Validator<'e> {
    fn new(
        engine: &'e SchemaEngine,
        strict_discriminator: bool,
        active: HashSet<(SchemaId, String)>,
    ) -> Self {
        Self {
            engine,
            strict_discriminator,
            active,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn finish(self) -> Result<Vec<ValidationWarning>, Vec<SchemaError>> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(self.errors)
        }
    }

    fn fail(&mut self, path: &str, keyword: &str, message: String) {
        self.errors.push(SchemaError {
            path: path.to_string(),
            keyword: keyword.to_string(),
            message,
        });
    }

    /// Validate against `id` in a scratch validator.
    fn probe(
        &self,
        id: SchemaId,
        value: &Value,
        path: &str,
    ) -> Result<Vec<ValidationWarning>, Vec<SchemaError>> {
        let mut scratch = Validator::new(self.engine, self.strict_discriminator, self.active.clone());
        scratch.check(id, value, path);
        scratch.finish()
    }

    fn check(&mut self, id: SchemaId, value: &Value, path: &str) {
        // Re-entering the same schema at the same value path adds nothing.
        let frame = (id, path.to_string());
        if !self.active.insert(frame.clone()) {
            return;
        }
        self.check_schema(id, value, path);
        self.active.remove(&frame);
    }

    fn check_schema(&mut self, id: SchemaId, value: &Value, path: &str) {
        let engine = self.engine;
        let schema = engine.get(id);

        if schema.never {
            self.fail(path, "false", "no value is allowed here".to_string());
            return;
        }
        if value.is_null() && schema.accepts_null() {
            return;
        }
        if !schema.types.is_empty() && !schema.types.iter().any(|t| t.matches(value)) {
            let expected: Vec<&str> = schema.types.iter().map(SchemaType::as_str).collect();
            self.fail(
                path,
                "type",
                format!(
                    "expected {}, got {}",
                    expected.join(" or "),
                    json_type_name(value)
                ),
            );
            return;
        }
        if let Some(allowed) = &schema.enumeration {
            if !allowed.contains(value) {
                self.fail(path, "enum", format!("{value} is not one of the allowed values"));
            }
        }
        if let Some(constant) = &schema.constant {
            if constant != value {
                self.fail(path, "const", format!("expected {constant}"));
            }
        }

        match value {
            Value::Number(n) => self.check_number(schema, n, path),
            Value::String(s) => self.check_string(schema, s, path),
            Value::Array(items) => self.check_array(schema, items, path),
            Value::Object(map) => self.check_object(schema, map, path),
            _ => {}
        }

        for member in &schema.all_of {
            self.check(*member, value, path);
        }

        let is_union = !schema.one_of.is_empty() || !schema.any_of.is_empty();
        match &schema.discriminator {
            Some(discriminator) if is_union => self.dispatch(schema, discriminator, value, path),
            _ => {
                if !schema.one_of.is_empty() {
                    self.check_alternatives(&schema.one_of, value, path, true);
                }
                if !schema.any_of.is_empty() {
                    self.check_alternatives(&schema.any_of, value, path, false);
                }
            }
        }

        if let Some(not) = schema.not {
            if self.probe(not, value, path).is_ok() {
                self.fail(path, "not", "value matches a disallowed schema".to_string());
            }
        }
    }

    fn check_number(&mut self, schema: &Schema, n: &Number, path: &str) {
        let Some(f) = n.as_f64() else {
            return;
        };
        if let Some(min) = schema.minimum {
            if f < min {
                self.fail(path, "minimum", format!("{f} is less than {min}"));
            }
        }
        if let Some(max) = schema.maximum {
            if f > max {
                self.fail(path, "maximum", format!("{f} is greater than {max}"));
            }
        }
        if let Some(min) = schema.exclusive_minimum {
            if f <= min {
                self.fail(path, "exclusiveMinimum", format!("{f} is not greater than {min}"));
            }
        }
        if let Some(max) = schema.exclusive_maximum {
            if f >= max {
                self.fail(path, "exclusiveMaximum", format!("{f} is not less than {max}"));
            }
        }
        if let Some(step) = schema.multiple_of {
            let quotient = f / step;
            if step > 0.0 && (quotient - quotient.round()).abs() > 1e-9 {
                self.fail(path, "multipleOf", format!("{f} is not a multiple of {step}"));
            }
        }
        if schema.format.as_deref() == Some("int32") {
            let in_range = integral(n).is_some_and(|i| i32::try_from(i).is_ok());
            if !in_range {
                self.fail(path, "format", format!("{n} is not a valid int32"));
            }
        }
    }

    fn check_string(&mut self, schema: &Schema, s: &str, path: &str) {
        let length = s.chars().count();
        if let Some(min) = schema.min_length {
            if length < min {
                self.fail(path, "minLength", format!("length {length} is shorter than {min}"));
            }
        }
        if let Some(max) = schema.max_length {
            if length > max {
                self.fail(path, "maxLength", format!("length {length} is longer than {max}"));
            }
        }
        if let Some(pattern) = &schema.pattern {
            match pattern.is_match(s) {
                Ok(true) => {}
                Ok(false) => self.fail(
                    path,
                    "pattern",
                    format!("{s:?} does not match {:?}", pattern.as_str()),
                ),
                Err(err) => self.fail(
                    path,
                    "pattern",
                    format!("{s:?} could not be matched against {:?}: {err}", pattern.as_str()),
                ),
            }
        }
    }

    fn check_array(&mut self, schema: &Schema, items: &[Value], path: &str) {
        if let Some(min) = schema.min_items {
            if items.len() < min {
                self.fail(path, "minItems", format!("{} items, at least {min} required", items.len()));
            }
        }
        if let Some(max) = schema.max_items {
            if items.len() > max {
                self.fail(path, "maxItems", format!("{} items, at most {max} allowed", items.len()));
            }
        }
        if schema.unique_items {
            let duplicate = items
                .iter()
                .enumerate()
                .any(|(i, a)| items[i + 1..].contains(a));
            if duplicate {
                self.fail(path, "uniqueItems", "items are not unique".to_string());
            }
        }
        if let Some(item_schema) = schema.items {
            for (i, item) in items.iter().enumerate() {
                self.check(item_schema, item, &format!("{path}/{i}"));
            }
        }
    }

    fn check_object(&mut self, schema: &Schema, map: &Map<String, Value>, path: &str) {
        for name in &schema.required {
            if !map.contains_key(name) {
                self.fail(path, "required", format!("missing required property {name:?}"));
            }
        }
        for (name, value) in map {
            let child = format!("{path}/{}", escape_token(name));
            match schema.properties.get(name) {
                Some(property) => self.check(*property, value, &child),
                None => match schema.additional_properties {
                    AdditionalProperties::Allowed => {}
                    AdditionalProperties::Forbidden => {
                        self.fail(&child, "additionalProperties", format!("unexpected property {name:?}"))
                    }
                    AdditionalProperties::Schema(extra) => self.check(extra, value, &child),
                },
            }
        }
        if let Some(min) = schema.min_properties {
            if map.len() < min {
                self.fail(path, "minProperties", format!("{} properties, at least {min} required", map.len()));
            }
        }
        if let Some(max) = schema.max_properties {
            if map.len() > max {
                self.fail(path, "maxProperties", format!("{} properties, at most {max} allowed", map.len()));
            }
        }
    }

    fn check_alternatives(&mut self, members: &[SchemaId], value: &Value, path: &str, exclusive: bool) {
        let mut matched = Vec::new();
        for member in members {
            if let Ok(warnings) = self.probe(*member, value, path) {
                matched.push(warnings);
            }
        }
        let keyword = if exclusive { "oneOf" } else { "anyOf" };
        match matched.len() {
            0 => self.fail(
                path,
                keyword,
                format!("value matches none of {} alternatives", members.len()),
            ),
            1 => self.warnings.extend(matched.remove(0)),
            n if exclusive => self.fail(
                path,
                keyword,
                format!("value matches {n} of {} alternatives, exactly one expected", members.len()),
            ),
            _ => self.warnings.extend(matched.remove(0)),
        }
    }

    /// Select exactly one member by the discriminator tag and validate only
    /// against it: explicit mapping, then member name, then unresolved.
    fn dispatch(&mut self, schema: &Schema, discriminator: &Discriminator, value: &Value, path: &str) {
        let property = &discriminator.property_name;
        let Some(map) = value.as_object() else {
            self.fail(
                path,
                "discriminator",
                format!("expected object with {property:?}, got {}", json_type_name(value)),
            );
            return;
        };
        let tag = match map.get(property) {
            Some(Value::String(tag)) => tag,
            Some(other) => {
                self.fail(
                    &format!("{path}/{}", escape_token(property)),
                    "discriminator",
                    format!("discriminator must be a string, got {}", json_type_name(other)),
                );
                return;
            }
            None => {
                self.fail(
                    path,
                    "discriminator",
                    format!("missing discriminator property {property:?}"),
                );
                return;
            }
        };

        let engine = self.engine;
        let selected = discriminator.mapping.get(tag).copied().or_else(|| {
            schema
                .members()
                .find(|m| engine.get(*m).name.as_deref() == Some(tag.as_str()))
        });

        match selected {
            Some(member) => {
                debug!(tag = %tag, schema = %engine.get(member).location, "discriminator selected member");
                self.check(member, value, path);
            }
            None if self.strict_discriminator => self.fail(
                path,
                "discriminator",
                format!("discriminator value {tag:?} does not select any member"),
            ),
            None => {
                let message = format!("discriminator value {tag:?} does not select any member");
                warn!(path = %path, schema = %schema.location, "{message}");
                self.warnings.push(ValidationWarning {
                    path: path.to_string(),
                    message,
                });
            }
        }
    }
}

// --- Typing for serialized values ---

/// Scalar type used when decoding text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    String,
    Integer,
    Number,
    Boolean,
}

/// Value shape expected by a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Scalar(Primitive),
    Array,
    Object,
}

/// Lazily walks a schema to type decoded parameter and header values.
#[derive(Debug, Clone, Copy)]
pub struct TypeHint<'e> {
    engine: Option<&'e SchemaEngine>,
    schema: Option<SchemaId>,
}

const HINT_DEPTH: usize = 8;

impl<'e> TypeHint<'e> {
    /// A hint that treats every value as a string scalar.
    pub fn untyped() -> Self {
        Self {
            engine: None,
            schema: None,
        }
    }

    fn find<T>(&self, f: &mut impl FnMut(&Schema) -> Option<T>) -> Option<T> {
        let engine = self.engine?;
        find_in(engine, self.schema?, f, 0)
    }

    fn to(&self, schema: Option<SchemaId>) -> TypeHint<'e> {
        TypeHint {
            engine: self.engine,
            schema,
        }
    }

    pub fn kind(&self) -> ValueKind {
        let found = self.find(&mut |schema: &Schema| {
            if let Some(t) = schema.types.iter().find(|t| **t != SchemaType::Null) {
                return Some(*t);
            }
            if !schema.properties.is_empty() {
                return Some(SchemaType::Object);
            }
            schema.items.map(|_| SchemaType::Array)
        });
        match found {
            Some(SchemaType::Array) => ValueKind::Array,
            Some(SchemaType::Object) => ValueKind::Object,
            Some(SchemaType::Integer) => ValueKind::Scalar(Primitive::Integer),
            Some(SchemaType::Number) => ValueKind::Scalar(Primitive::Number),
            Some(SchemaType::Boolean) => ValueKind::Scalar(Primitive::Boolean),
            _ => ValueKind::Scalar(Primitive::String),
        }
    }

    /// Hint for array items.
    pub fn items(&self) -> TypeHint<'e> {
        self.to(self.find(&mut |schema: &Schema| schema.items))
    }

    /// Hint for the object property `name`.
    pub fn property(&self, name: &str) -> TypeHint<'e> {
        self.to(self.find(&mut |schema: &Schema| {
            schema.properties.get(name).copied().or(match schema.additional_properties {
                AdditionalProperties::Schema(extra) => Some(extra),
                _ => None,
            })
        }))
    }

    /// Convert serialized text to a typed scalar. Text that does not parse as
    /// the hinted type stays a string.
    pub fn coerce(&self, text: &str) -> Value {
        match self.kind() {
            ValueKind::Scalar(Primitive::Integer) | ValueKind::Scalar(Primitive::Number) => {
                if let Ok(i) = text.parse::<i64>() {
                    return Value::from(i);
                }
                match text.parse::<f64>().ok().and_then(Number::from_f64) {
                    Some(n) => Value::Number(n),
                    None if text.is_empty() => Value::Null,
                    None => Value::String(text.to_string()),
                }
            }
            ValueKind::Scalar(Primitive::Boolean) => match text {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "" => Value::Null,
                other => Value::String(other.to_string()),
            },
            _ => Value::String(text.to_string()),
        }
    }
}

fn find_in<T>(
    engine: &SchemaEngine,
    id: SchemaId,
    f: &mut impl FnMut(&Schema) -> Option<T>,
    depth: usize,
) -> Option<T> {
    if depth > HINT_DEPTH {
        return None;
    }
    let schema = engine.get(id);
    if let Some(found) = f(schema) {
        return Some(found);
    }
    schema
        .all_of
        .iter()
        .chain(&schema.one_of)
        .chain(&schema.any_of)
        .find_map(|member| find_in(engine, *member, f, depth + 1))
}
