//! Parameter serialization by location, style, and explode.
//!
//! Path and header parameters serialize to a single text value
//! ([`encode_text`]); query and cookie parameters serialize to `name=value`
//! pairs ([`encode_pairs`]). Decoding inverts both, typing scalars through a
//! [`TypeHint`].

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::{Map, Value};

use crate::error::{CallError, CodecError};
use crate::schema::{SchemaId, TypeHint, ValueKind};
use crate::types::{json_type_name, ParameterLocation, ParameterStyle};

/// Characters escaped inside a single path value.
const PATH_ATOM: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^')
    .add(b'[')
    .add(b']')
    .add(b',')
    .add(b';')
    .add(b'=');

/// A declared operation parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub style: ParameterStyle,
    pub explode: bool,
    pub schema: Option<SchemaId>,
    /// Media type of a `content`-declared parameter; its value is sent as
    /// serialized JSON instead of through the style rules.
    pub media_type: Option<String>,
}

/// A parameter value ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Encoded {
    Text(String),
    Pairs(Vec<(String, String)>),
}

impl Parameter {
    /// Serialize `value` for this parameter's location.
    ///
    /// # Errors
    ///
    /// Returns `CodecError` when the style cannot express the value's shape.
    pub fn encode(&self, value: &Value) -> Result<Encoded, CodecError> {
        if self.media_type.is_some() {
            let text = value.to_string();
            return Ok(match self.location {
                ParameterLocation::Query | ParameterLocation::Cookie => {
                    Encoded::Pairs(vec![(self.name.clone(), text)])
                }
                ParameterLocation::Path => {
                    Encoded::Text(utf8_percent_encode(&text, PATH_ATOM).to_string())
                }
                ParameterLocation::Header => Encoded::Text(text),
            });
        }
        match self.location {
            ParameterLocation::Path => {
                encode_path(&self.name, self.style, self.explode, value).map(Encoded::Text)
            }
            ParameterLocation::Header => {
                encode_text(&self.name, self.style, self.explode, value).map(Encoded::Text)
            }
            ParameterLocation::Query | ParameterLocation::Cookie => {
                encode_pairs(&self.name, self.style, self.explode, value).map(Encoded::Pairs)
            }
        }
    }
}

fn scalar_text(key: &str, style: ParameterStyle, value: &Value) -> Result<String, CodecError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Array(_) | Value::Object(_) => Err(CodecError::Nested {
            style: style.as_str(),
            key: key.to_string(),
        }),
    }
}

fn array_atoms(style: ParameterStyle, items: &[Value]) -> Result<Vec<String>, CodecError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| scalar_text(&i.to_string(), style, item))
        .collect()
}

fn object_atoms(
    style: ParameterStyle,
    map: &Map<String, Value>,
) -> Result<Vec<(String, String)>, CodecError> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), scalar_text(k, style, v)?)))
        .collect()
}

/// Serialize a `simple`, `label`, or `matrix` value as unescaped text.
///
/// # Errors
///
/// Returns `CodecError` for nested values and for pair styles.
pub fn encode_text(
    name: &str,
    style: ParameterStyle,
    explode: bool,
    value: &Value,
) -> Result<String, CodecError> {
    render_text(name, style, explode, value, &|atom: &str| atom.to_string())
}

/// Like [`encode_text`], with every value atom percent-encoded for a path.
///
/// # Errors
///
/// Returns `CodecError` for nested values and for pair styles.
pub fn encode_path(
    name: &str,
    style: ParameterStyle,
    explode: bool,
    value: &Value,
) -> Result<String, CodecError> {
    render_text(name, style, explode, value, &|atom: &str| {
        utf8_percent_encode(atom, PATH_ATOM).to_string()
    })
}

fn render_text(
    name: &str,
    style: ParameterStyle,
    explode: bool,
    value: &Value,
    esc: &dyn Fn(&str) -> String,
) -> Result<String, CodecError> {
    let name = esc(name);
    match value {
        Value::Array(items) => {
            let atoms: Vec<String> = array_atoms(style, items)?.iter().map(|a| esc(a)).collect();
            match style {
                ParameterStyle::Simple => Ok(atoms.join(",")),
                ParameterStyle::Label => Ok(format!(".{}", atoms.join("."))),
                ParameterStyle::Matrix if atoms.is_empty() => Ok(format!(";{name}")),
                ParameterStyle::Matrix if explode => {
                    Ok(atoms.iter().map(|a| format!(";{name}={a}")).collect())
                }
                ParameterStyle::Matrix => Ok(format!(";{name}={}", atoms.join(","))),
                other => Err(not_text(other, "array")),
            }
        }
        Value::Object(map) => {
            let pairs: Vec<(String, String)> = object_atoms(style, map)?
                .iter()
                .map(|(k, v)| (esc(k), esc(v)))
                .collect();
            let keyed = |sep: &str, prefix: &str| -> String {
                pairs
                    .iter()
                    .map(|(k, v)| format!("{prefix}{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(sep)
            };
            let flat = |sep: &str| -> String {
                pairs
                    .iter()
                    .flat_map(|(k, v)| [k.as_str(), v.as_str()])
                    .collect::<Vec<_>>()
                    .join(sep)
            };
            match style {
                ParameterStyle::Simple if explode => Ok(keyed(",", "")),
                ParameterStyle::Simple => Ok(flat(",")),
                ParameterStyle::Label if explode => Ok(format!(".{}", keyed(".", ""))),
                ParameterStyle::Label => Ok(format!(".{}", flat("."))),
                ParameterStyle::Matrix if explode => Ok(keyed("", ";")),
                ParameterStyle::Matrix if pairs.is_empty() => Ok(format!(";{name}")),
                ParameterStyle::Matrix => Ok(format!(";{name}={}", flat(","))),
                other => Err(not_text(other, "object")),
            }
        }
        scalar => {
            let text = esc(&scalar_text(&name, style, scalar)?);
            match style {
                ParameterStyle::Simple => Ok(text),
                ParameterStyle::Label => Ok(format!(".{text}")),
                ParameterStyle::Matrix if text.is_empty() => Ok(format!(";{name}")),
                ParameterStyle::Matrix => Ok(format!(";{name}={text}")),
                other => Err(not_text(other, json_type_name(scalar))),
            }
        }
    }
}

fn not_text(style: ParameterStyle, shape: &'static str) -> CodecError {
    CodecError::UnsupportedShape {
        style: style.as_str(),
        shape,
    }
}

/// Serialize a `form`, `spaceDelimited`, `pipeDelimited`, or `deepObject`
/// value as unescaped `name=value` pairs.
///
/// # Errors
///
/// Returns `CodecError` for shapes the style cannot express.
pub fn encode_pairs(
    name: &str,
    style: ParameterStyle,
    explode: bool,
    value: &Value,
) -> Result<Vec<(String, String)>, CodecError> {
    let separator = match style {
        ParameterStyle::Form => ",",
        ParameterStyle::SpaceDelimited => " ",
        ParameterStyle::PipeDelimited => "|",
        ParameterStyle::DeepObject => {
            return match value {
                Value::Object(map) => {
                    let mut pairs = Vec::new();
                    deep_pairs(name, map, &mut pairs)?;
                    Ok(pairs)
                }
                other => Err(CodecError::UnsupportedShape {
                    style: style.as_str(),
                    shape: json_type_name(other),
                }),
            };
        }
        other => {
            return Err(CodecError::UnsupportedShape {
                style: other.as_str(),
                shape: "pair",
            })
        }
    };

    match value {
        Value::Array(items) => {
            let atoms = array_atoms(style, items)?;
            if explode {
                Ok(atoms.into_iter().map(|a| (name.to_string(), a)).collect())
            } else {
                Ok(vec![(name.to_string(), atoms.join(separator))])
            }
        }
        Value::Object(map) => {
            let pairs = object_atoms(style, map)?;
            if explode && style == ParameterStyle::Form {
                Ok(pairs)
            } else {
                let flat: Vec<String> = pairs.into_iter().flat_map(|(k, v)| [k, v]).collect();
                Ok(vec![(name.to_string(), flat.join(separator))])
            }
        }
        scalar => Ok(vec![(name.to_string(), scalar_text(name, style, scalar)?)]),
    }
}

fn deep_pairs(
    prefix: &str,
    map: &Map<String, Value>,
    out: &mut Vec<(String, String)>,
) -> Result<(), CodecError> {
    for (key, value) in map {
        let path = format!("{prefix}[{key}]");
        match value {
            Value::Object(inner) => deep_pairs(&path, inner, out)?,
            Value::Array(_) => {
                return Err(CodecError::Nested {
                    style: ParameterStyle::DeepObject.as_str(),
                    key: path,
                })
            }
            scalar => out.push((path, scalar_text(key, ParameterStyle::DeepObject, scalar)?)),
        }
    }
    Ok(())
}

// --- Decoding ---

/// Parse an unescaped `simple`, `label`, or `matrix` value.
///
/// # Errors
///
/// Returns `CodecError::Malformed` when the text lacks the style's prefix.
pub fn decode_text(
    name: &str,
    style: ParameterStyle,
    explode: bool,
    text: &str,
    hint: TypeHint<'_>,
) -> Result<Value, CodecError> {
    let malformed = || CodecError::Malformed {
        style: style.as_str(),
        text: text.to_string(),
    };
    let kind = hint.kind();

    match style {
        ParameterStyle::Simple => Ok(typed(kind, hint, split_atoms(text, ","), explode)),
        ParameterStyle::Label => {
            let body = text.strip_prefix('.').ok_or_else(malformed)?;
            match kind {
                ValueKind::Scalar(_) => Ok(hint.coerce(body)),
                _ => Ok(typed(kind, hint, split_atoms(body, "."), explode)),
            }
        }
        ParameterStyle::Matrix => {
            let bare = format!(";{name}");
            if text == bare {
                return Ok(match kind {
                    ValueKind::Scalar(_) => hint.coerce(""),
                    ValueKind::Array => Value::Array(Vec::new()),
                    ValueKind::Object => Value::Object(Map::new()),
                });
            }
            let assigned = format!(";{name}=");
            match kind {
                ValueKind::Object if explode => {
                    let pairs = split_atoms(text.strip_prefix(';').ok_or_else(malformed)?, ";");
                    Ok(typed(kind, hint, pairs, true))
                }
                ValueKind::Array if explode => {
                    let atoms = text
                        .split(';')
                        .filter(|part| !part.is_empty())
                        .map(|part| {
                            part.strip_prefix(&assigned[1..])
                                .map(String::from)
                                .ok_or_else(malformed)
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(typed(kind, hint, atoms, explode))
                }
                _ => {
                    let body = text.strip_prefix(&assigned).ok_or_else(malformed)?;
                    match kind {
                        ValueKind::Scalar(_) => Ok(hint.coerce(body)),
                        _ => Ok(typed(kind, hint, split_atoms(body, ","), false)),
                    }
                }
            }
        }
        other => Err(not_text(other, "text")),
    }
}

/// Parse `name=value` pairs for a `form`, delimited, or `deepObject`
/// parameter. Pairs belonging to other parameters are ignored except for
/// exploded `form` objects, which claim every pair.
///
/// # Errors
///
/// Returns `CodecError` for styles that are not pair styles.
pub fn decode_pairs(
    name: &str,
    style: ParameterStyle,
    explode: bool,
    pairs: &[(String, String)],
    hint: TypeHint<'_>,
) -> Result<Value, CodecError> {
    let separator = match style {
        ParameterStyle::Form => ",",
        ParameterStyle::SpaceDelimited => " ",
        ParameterStyle::PipeDelimited => "|",
        ParameterStyle::DeepObject => return Ok(decode_deep(name, pairs, hint)),
        other => return Err(not_text(other, "pair")),
    };
    let own: Vec<&str> = pairs
        .iter()
        .filter(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
        .collect();

    let kind = hint.kind();
    Ok(match kind {
        ValueKind::Scalar(_) => own.first().map_or(Value::Null, |text| hint.coerce(text)),
        ValueKind::Array if explode => {
            typed(kind, hint, own.iter().map(|s| s.to_string()).collect(), true)
        }
        ValueKind::Object if explode && style == ParameterStyle::Form => {
            let mut map = Map::new();
            for (key, value) in pairs {
                map.insert(key.clone(), hint.property(key).coerce(value));
            }
            Value::Object(map)
        }
        _ => {
            let text = own.first().copied().unwrap_or("");
            typed(kind, hint, split_atoms(text, separator), false)
        }
    })
}

fn decode_deep(name: &str, pairs: &[(String, String)], hint: TypeHint<'_>) -> Value {
    let mut root = Map::new();
    for (key, value) in pairs {
        let path = key.strip_prefix(name).and_then(bracket_path);
        if let Some(path) = path {
            insert_deep(&mut root, &path, value, hint);
        }
    }
    Value::Object(root)
}

fn insert_deep(node: &mut Map<String, Value>, path: &[String], text: &str, hint: TypeHint<'_>) {
    match path {
        [] => {}
        [last] => {
            node.insert(last.clone(), hint.property(last).coerce(text));
        }
        [head, rest @ ..] => {
            let child = node
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_deep(map, rest, text, hint.property(head));
            }
        }
    }
}

fn bracket_path(text: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let end = inner.find(']')?;
        segments.push(inner[..end].to_string());
        rest = &inner[end + 1..];
    }
    (!segments.is_empty()).then_some(segments)
}

fn split_atoms(text: &str, separator: &str) -> Vec<String> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.split(separator).map(String::from).collect()
    }
}

/// Shape split atoms per the hinted kind. Objects come either as `k=v`
/// atoms (`keyed`) or as alternating keys and values.
fn typed(kind: ValueKind, hint: TypeHint<'_>, atoms: Vec<String>, keyed: bool) -> Value {
    match kind {
        ValueKind::Scalar(_) => hint.coerce(&atoms.join(",")),
        ValueKind::Array => {
            let items = hint.items();
            Value::Array(atoms.iter().map(|a| items.coerce(a)).collect())
        }
        ValueKind::Object => {
            let mut map = Map::new();
            if keyed && atoms.iter().all(|a| a.contains('=')) {
                for atom in &atoms {
                    if let Some((k, v)) = atom.split_once('=') {
                        map.insert(k.to_string(), hint.property(k).coerce(v));
                    }
                }
            } else {
                for pair in atoms.chunks(2) {
                    let value = pair.get(1).map(String::as_str).unwrap_or("");
                    map.insert(pair[0].clone(), hint.property(&pair[0]).coerce(value));
                }
            }
            Value::Object(map)
        }
    }
}

// --- Parameter sets ---

/// Declared parameters ordered by location, then declaration order.
pub(crate) fn ordered(parameters: &[Parameter]) -> Vec<&Parameter> {
    let mut ordered: Vec<&Parameter> = parameters.iter().collect();
    ordered.sort_by_key(|p| p.location);
    ordered
}

/// Check caller-supplied names against the declared parameters.
///
/// # Errors
///
/// Returns `CallError::UnknownParameter` when a supplied name is not declared,
/// then `CallError::MissingParameter` when required parameters are absent.
pub fn check_parameters(
    parameters: &[Parameter],
    supplied: &BTreeMap<String, Value>,
) -> Result<(), CallError> {
    let ordered = ordered(parameters);
    let mut accepted: Vec<String> = Vec::new();
    for parameter in &ordered {
        if !accepted.contains(&parameter.name) {
            accepted.push(parameter.name.clone());
        }
    }

    let unknown: Vec<String> = supplied
        .keys()
        .filter(|name| !accepted.contains(name))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(CallError::UnknownParameter { unknown, accepted });
    }

    let mut missing: Vec<String> = Vec::new();
    for parameter in &ordered {
        let required = parameter.required || parameter.location == ParameterLocation::Path;
        if required && !supplied.contains_key(&parameter.name) && !missing.contains(&parameter.name)
        {
            missing.push(parameter.name.clone());
        }
    }
    if !missing.is_empty() {
        return Err(CallError::MissingParameter {
            missing,
            provided: supplied.keys().cloned().collect(),
        });
    }
    Ok(())
}

/// Placeholder names of a path template, in order.
pub fn template_names(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                names.push(after[..end].to_string());
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

/// Replace `{name}` placeholders with already-encoded values.
///
/// The result always starts with `/`; placeholders without a value become
/// empty segments.
pub fn substitute_path(template: &str, values: &BTreeMap<String, String>) -> String {
    let mut path = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        path.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                if let Some(value) = values.get(&after[..end]) {
                    path.push_str(value);
                }
                rest = &after[end + 1..];
            }
            None => {
                path.push('{');
                rest = after;
            }
        }
    }
    path.push_str(rest);
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DocumentGraph, Location};
    use crate::loader::MemoryLoader;
    use crate::schema::{SchemaBuilder, SchemaEngine};
    use serde_json::json;
    use url::Url;

    use ParameterStyle::*;

    fn color() -> Value {
        json!({"R": 100, "G": 200, "B": 150})
    }

    fn colors() -> Value {
        json!(["blue", "black", "brown"])
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn form_encoding() {
        assert_eq!(
            encode_pairs("array", Form, false, &colors()).unwrap(),
            pairs(&[("array", "blue,black,brown")])
        );
        assert_eq!(
            encode_pairs("array", Form, true, &colors()).unwrap(),
            pairs(&[("array", "blue"), ("array", "black"), ("array", "brown")])
        );
        assert_eq!(
            encode_pairs("object", Form, false, &color()).unwrap(),
            pairs(&[("object", "R,100,G,200,B,150")])
        );
        assert_eq!(
            encode_pairs("object", Form, true, &color()).unwrap(),
            pairs(&[("R", "100"), ("G", "200"), ("B", "150")])
        );
        assert_eq!(
            encode_pairs("empty", Form, true, &Value::Null).unwrap(),
            pairs(&[("empty", "")])
        );
    }

    #[test]
    fn matrix_encoding() {
        assert_eq!(encode_text("string", Matrix, false, &json!("blue")).unwrap(), ";string=blue");
        assert_eq!(
            encode_text("array", Matrix, false, &colors()).unwrap(),
            ";array=blue,black,brown"
        );
        assert_eq!(
            encode_text("array", Matrix, true, &colors()).unwrap(),
            ";array=blue;array=black;array=brown"
        );
        assert_eq!(
            encode_text("object", Matrix, false, &color()).unwrap(),
            ";object=R,100,G,200,B,150"
        );
        assert_eq!(
            encode_text("object", Matrix, true, &color()).unwrap(),
            ";R=100;G=200;B=150"
        );
        assert_eq!(encode_text("empty", Matrix, false, &Value::Null).unwrap(), ";empty");
        assert_eq!(encode_text("boolean", Matrix, false, &json!(false)).unwrap(), ";boolean=false");
    }

    #[test]
    fn label_encoding() {
        assert_eq!(encode_text("s", Label, false, &json!("blue")).unwrap(), ".blue");
        assert_eq!(encode_text("a", Label, false, &colors()).unwrap(), ".blue.black.brown");
        assert_eq!(encode_text("a", Label, true, &colors()).unwrap(), ".blue.black.brown");
        assert_eq!(encode_text("o", Label, false, &color()).unwrap(), ".R.100.G.200.B.150");
        assert_eq!(encode_text("o", Label, true, &color()).unwrap(), ".R=100.G=200.B=150");
        assert_eq!(encode_text("e", Label, false, &Value::Null).unwrap(), ".");
    }

    #[test]
    fn simple_encoding() {
        assert_eq!(encode_text("a", Simple, false, &colors()).unwrap(), "blue,black,brown");
        assert_eq!(encode_text("o", Simple, false, &color()).unwrap(), "R,100,G,200,B,150");
        assert_eq!(encode_text("o", Simple, true, &color()).unwrap(), "R=100,G=200,B=150");
        assert_eq!(encode_text("i", Simple, false, &json!(100)).unwrap(), "100");
        assert_eq!(encode_text("e", Simple, false, &Value::Null).unwrap(), "");
    }

    #[test]
    fn delimited_encoding() {
        assert_eq!(
            encode_pairs("pipe", PipeDelimited, false, &json!(["a", "b"])).unwrap(),
            pairs(&[("pipe", "a|b")])
        );
        assert_eq!(
            encode_pairs("space", SpaceDelimited, false, &json!(["1", "2"])).unwrap(),
            pairs(&[("space", "1 2")])
        );
        assert_eq!(
            encode_pairs("object", SpaceDelimited, false, &color()).unwrap(),
            pairs(&[("object", "R 100 G 200 B 150")])
        );
    }

    #[test]
    fn deep_object_encoding_is_recursive() {
        let value = json!({"size": 3, "inner": {"size": 2, "inner": {"size": 1, "inner": {}}}});
        assert_eq!(
            encode_pairs("object", DeepObject, true, &value).unwrap(),
            pairs(&[
                ("object[size]", "3"),
                ("object[inner][size]", "2"),
                ("object[inner][inner][size]", "1"),
            ])
        );
        assert!(matches!(
            encode_pairs("object", DeepObject, true, &json!([1])),
            Err(CodecError::UnsupportedShape { .. })
        ));
    }

    #[test]
    fn nested_values_rejected_outside_deep_object() {
        let err = encode_pairs("o", Form, true, &json!({"a": {"b": 1}})).unwrap_err();
        assert_eq!(
            err,
            CodecError::Nested {
                style: "form",
                key: "a".into()
            }
        );
        assert!(encode_text("a", Simple, false, &json!([[1]])).is_err());
    }

    #[test]
    fn path_atoms_are_escaped() {
        assert_eq!(
            encode_path("p", Simple, false, &json!(["a/b", "c d"])).unwrap(),
            "a%2Fb,c%20d"
        );
        assert_eq!(encode_path("p", Matrix, false, &json!("x;y")).unwrap(), ";p=x%3By");
    }

    fn engine() -> (SchemaEngine, Vec<SchemaId>) {
        let base = Url::parse("http://example/openapi.json").unwrap();
        let doc = json!({"components": {"schemas": {
            "Color": {"type": "object", "properties": {
                "R": {"type": "integer"}, "G": {"type": "integer"}, "B": {"type": "integer"}
            }},
            "Colors": {"type": "array", "items": {"type": "string"}},
            "Count": {"type": "integer"},
            "Nest": {"type": "object", "properties": {
                "size": {"type": "integer"},
                "inner": {"$ref": "#/components/schemas/Nest"}
            }}
        }}});
        let mut graph = DocumentGraph::new(base.clone(), doc);
        let loader = MemoryLoader::new();
        let mut builder = SchemaBuilder::new();
        let ids = ["Color", "Colors", "Count", "Nest"]
            .iter()
            .map(|name| {
                let location = Location::root(base.clone())
                    .child("components")
                    .child("schemas")
                    .child(name);
                builder.build(&mut graph, &loader, location).unwrap()
            })
            .collect();
        (builder.finish().unwrap(), ids)
    }

    #[test]
    fn text_styles_round_trip() {
        let (engine, ids) = engine();
        let cases = [(ids[0], color()), (ids[1], colors()), (ids[2], json!(100))];
        for style in [Simple, Label, Matrix] {
            for explode in [false, true] {
                for (schema, value) in &cases {
                    let text = encode_text("p", style, explode, value).unwrap();
                    let decoded =
                        decode_text("p", style, explode, &text, engine.hint(*schema)).unwrap();
                    assert_eq!(&decoded, value, "{style:?} explode={explode} via {text:?}");
                }
            }
        }
    }

    #[test]
    fn pair_styles_round_trip() {
        let (engine, ids) = engine();
        let cases = [
            (Form, false, ids[0], color()),
            (Form, true, ids[0], color()),
            (Form, false, ids[1], colors()),
            (Form, true, ids[1], colors()),
            (Form, false, ids[2], json!(100)),
            (Form, true, ids[2], json!(100)),
            (SpaceDelimited, false, ids[1], colors()),
            (PipeDelimited, false, ids[1], colors()),
            (SpaceDelimited, false, ids[0], color()),
            (PipeDelimited, false, ids[0], color()),
            (
                DeepObject,
                true,
                ids[3],
                json!({"size": 2, "inner": {"size": 1}}),
            ),
        ];
        for (style, explode, schema, value) in cases {
            let encoded = encode_pairs("p", style, explode, &value).unwrap();
            let decoded = decode_pairs("p", style, explode, &encoded, engine.hint(schema)).unwrap();
            assert_eq!(decoded, value, "{style:?} explode={explode} via {encoded:?}");
        }
    }

    #[test]
    fn header_object_decodes_typed_values() {
        let (engine, ids) = engine();
        let value = decode_text("X-object", Simple, false, "R,1,G,2,B,3", engine.hint(ids[0])).unwrap();
        assert_eq!(value, json!({"R": 1, "G": 2, "B": 3}));

        let untyped = decode_text("X-list", Simple, false, "1,2,3", TypeHint::untyped()).unwrap();
        assert_eq!(untyped, json!("1,2,3"));
    }

    #[test]
    fn malformed_label_is_rejected() {
        let err = decode_text("p", Label, false, "blue", TypeHint::untyped()).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { style: "label", .. }));
    }

    fn parameter(name: &str, location: ParameterLocation, required: bool) -> Parameter {
        Parameter {
            name: name.to_string(),
            location,
            required,
            style: location.default_style(),
            explode: location.default_style().default_explode(),
            schema: None,
            media_type: None,
        }
    }

    fn four_locations() -> Vec<Parameter> {
        vec![
            parameter("Query", ParameterLocation::Query, true),
            parameter("Path", ParameterLocation::Path, true),
            parameter("Header", ParameterLocation::Header, true),
            parameter("Cookie", ParameterLocation::Cookie, true),
        ]
    }

    #[test]
    fn missing_parameters_listed_by_location() {
        let err = check_parameters(&four_locations(), &BTreeMap::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Required Parameter ['Cookie','Header','Path','Query'] missing (provided [])"
        );
    }

    #[test]
    fn unknown_parameter_lists_accepted() {
        let supplied = BTreeMap::from([("Invalid".to_string(), json!("x"))]);
        let err = check_parameters(&four_locations(), &supplied).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter ['Invalid'] unknown (accepted ['Cookie','Header','Path','Query'])"
        );
    }

    #[test]
    fn optional_parameters_may_be_omitted() {
        let parameters = vec![
            parameter("id", ParameterLocation::Path, false),
            parameter("limit", ParameterLocation::Query, false),
        ];
        let supplied = BTreeMap::from([("id".to_string(), json!(1))]);
        assert!(check_parameters(&parameters, &supplied).is_ok());
        // path parameters are always required
        assert!(check_parameters(&parameters, &BTreeMap::new()).is_err());
    }

    #[test]
    fn path_substitution() {
        let values = BTreeMap::from([
            ("a".to_string(), "x".to_string()),
            ("b".to_string(), String::new()),
        ]);
        assert_eq!(substitute_path("/items/{a}/{b}/tail", &values), "/items/x//tail");
        assert_eq!(substitute_path("{b}", &values), "/");
        assert_eq!(template_names("/a/{x}/b/{y}"), vec!["x", "y"]);
    }

    #[test]
    fn content_parameters_send_json() {
        let mut p = parameter("filter", ParameterLocation::Query, false);
        p.media_type = Some("application/json".into());
        assert_eq!(
            p.encode(&json!({"a": 1})).unwrap(),
            Encoded::Pairs(pairs(&[("filter", r#"{"a":1}"#)]))
        );
    }
}
