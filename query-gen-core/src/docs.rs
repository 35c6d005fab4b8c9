//! RETURN documentation extraction and parsing.
//!
//! Module source is untrusted text. It is turned into a [`ReturnSchema`] by a
//! single fallible step; callers either get a fully-typed schema or a
//! [`DocParseError`], never a half-filled structure.

use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::contract::FetchedModule;
use crate::error::{DocParseError, DocProblem};

static RETURN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?s)RETURN\s*=\s*r?"""(.*?)""""#,
        r#"(?s)RETURN\s*=\s*r?'''(.*?)'''"#,
        r#"(?s)RETURN\s*=\s*r?"(.*?)""#,
        r#"(?s)RETURN\s*=\s*r?'(.*?)'"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static regex"))
    .collect()
});

/// Keys of a field definition that describe the field rather than nest fields.
const FIELD_META_KEYS: &[&str] = &[
    "type",
    "description",
    "returned",
    "sample",
    "elements",
    "contains",
    "version_added",
    "version_added_collection",
    "choices",
    "aliases",
    "default",
    "example",
];

/// Declared `type:` of a RETURN field.
///
/// Only `list` and `dict` are trusted as shapes. `complex`, `raw` and other
/// loose types say nothing reliable about the value and are kept as `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    List,
    Dict,
    Scalar(String),
    Other(String),
}

const SCALAR_TYPES: &[&str] = &[
    "str", "string", "bool", "boolean", "int", "integer", "float", "path", "bytes", "bits",
];

impl DeclaredType {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "list" => DeclaredType::List,
            "dict" => DeclaredType::Dict,
            other if SCALAR_TYPES.contains(&other) => DeclaredType::Scalar(other.to_string()),
            other => DeclaredType::Other(other.to_string()),
        }
    }
}

/// One field of a module's RETURN documentation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnField {
    pub name: String,
    pub declared_type: Option<DeclaredType>,
    pub elements: Option<String>,
    pub returned: Option<String>,
    pub description: Option<String>,
    pub sample: Option<Value>,
    /// Nested field definitions, declaration order.
    pub contains: Vec<ReturnField>,
}

impl ReturnField {
    fn bare(name: String) -> Self {
        ReturnField {
            name,
            declared_type: None,
            elements: None,
            returned: None,
            description: None,
            sample: None,
            contains: Vec::new(),
        }
    }

    fn from_definition(name: String, definition: &Value) -> Self {
        let Value::Mapping(map) = definition else {
            return ReturnField::bare(name);
        };

        let declared_type = get(map, "type")
            .and_then(scalar_to_string)
            .map(|t| DeclaredType::parse(&t));
        let elements = get(map, "elements").and_then(scalar_to_string);
        let returned = get(map, "returned").and_then(scalar_to_string);
        let description = get(map, "description").and_then(text_of);
        let sample = get(map, "sample").filter(|v| !v.is_null()).cloned();

        let contains = match get(map, "contains") {
            Some(Value::Mapping(nested)) => parse_fields(nested),
            _ if matches!(declared_type, Some(DeclaredType::Dict | DeclaredType::Other(_))) => {
                // Some collections nest field definitions directly under a dict field.
                let nested: Mapping = map
                    .iter()
                    .filter(|(k, v)| {
                        v.is_mapping()
                            && k.as_str().is_some_and(|k| !FIELD_META_KEYS.contains(&k))
                    })
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                parse_fields(&nested)
            }
            _ => Vec::new(),
        };

        ReturnField {
            name,
            declared_type,
            elements,
            returned,
            description,
            sample,
            contains,
        }
    }
}

/// Typed RETURN documentation of one module.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReturnSchema {
    pub fields: Vec<ReturnField>,
}

impl ReturnSchema {
    pub fn field(&self, name: &str) -> Option<&ReturnField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Module documentation ready for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDoc {
    pub fqcn: String,
    pub module_name: String,
    /// Raw RETURN block, when one was found.
    pub return_text: Option<String>,
    pub schema: Result<ReturnSchema, DocProblem>,
}

impl ModuleDoc {
    /// Builds the doc for a fetched module, recording fetch or parse problems.
    pub fn from_fetched(collection_name: &str, module: &FetchedModule) -> Self {
        let fqcn = format!("{}.{}", collection_name, module.name);
        let (return_text, schema) = match &module.content {
            Err(e) => (None, Err(DocProblem::Fetch(e.clone()))),
            Ok(content) => match extract_return_block(content) {
                None => (None, Err(DocProblem::Parse(DocParseError::MissingReturn))),
                Some(text) => {
                    let schema = parse_return_schema(&text).map_err(DocProblem::Parse);
                    (Some(text), schema)
                }
            },
        };
        match &schema {
            Ok(s) => debug!(module = %fqcn, fields = s.fields.len(), "Parsed RETURN documentation"),
            Err(e) => debug!(module = %fqcn, problem = %e, "No usable RETURN documentation"),
        }
        ModuleDoc {
            fqcn,
            module_name: module.name.clone(),
            return_text,
            schema,
        }
    }
}

/// Finds the RETURN block in module source.
pub fn extract_return_block(content: &str) -> Option<String> {
    RETURN_PATTERNS
        .iter()
        .find_map(|re| re.captures(content))
        .map(|caps| caps[1].trim().to_string())
}

/// Parses RETURN text into typed field definitions.
pub fn parse_return_schema(text: &str) -> Result<ReturnSchema, DocParseError> {
    if text.trim().is_empty() {
        return Err(DocParseError::EmptyReturn);
    }
    let value: Value =
        serde_yaml::from_str(text).map_err(|e| DocParseError::Yaml(e.to_string()))?;
    match value {
        Value::Null => Err(DocParseError::EmptyReturn),
        Value::Mapping(map) if map.is_empty() => Err(DocParseError::EmptyReturn),
        Value::Mapping(map) => Ok(ReturnSchema {
            fields: parse_fields(&map),
        }),
        _ => Err(DocParseError::NotAMapping),
    }
}

fn parse_fields(map: &Mapping) -> Vec<ReturnField> {
    map.iter()
        .filter_map(|(k, v)| scalar_to_string(k).map(|name| ReturnField::from_definition(name, v)))
        .collect()
}

fn get<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(key)
}

/// Renders a YAML scalar as a string; sequences and mappings yield `None`.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        _ => None,
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Sequence(lines) => {
            let parts: Vec<String> = lines.iter().filter_map(scalar_to_string).collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        other => scalar_to_string(other),
    }
}
