//! Declarative tool argument schemas
//!
//! Each tool declares its fields once; the same declaration renders the
//! advertised JSON schema and validates incoming arguments. Validation stops
//! at the first violated constraint and yields a normalized argument map
//! (unknown keys and nulls dropped, defaults filled, whole numbers stored as
//! integers) that deserializes straight into the tool's typed parameters.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::errors::AppError;

static SELECT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^select").expect("select prefix regex"));

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Text { min_length: usize },
    OneOf(&'static [&'static str]),
    PositiveInteger,
    PositiveNumber,
    Boolean,
}

#[derive(Debug, Clone, Copy)]
pub enum DefaultValue {
    Bool(bool),
    Integer(i64),
    Text(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<DefaultValue>,
}

impl FieldSpec {
    pub const fn required(name: &'static str, description: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            description,
            kind,
            required: true,
            default: None,
        }
    }

    pub const fn optional(name: &'static str, description: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            description,
            kind,
            required: false,
            default: None,
        }
    }

    pub const fn with_default(self, default: DefaultValue) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    fn json_schema(&self) -> Value {
        let mut schema = match self.kind {
            FieldKind::Text { min_length } if min_length > 0 => {
                json!({ "type": "string", "minLength": min_length })
            }
            FieldKind::Text { .. } => json!({ "type": "string" }),
            FieldKind::OneOf(choices) => json!({ "type": "string", "enum": choices }),
            FieldKind::PositiveInteger => json!({ "type": "integer", "minimum": 1 }),
            FieldKind::PositiveNumber => json!({ "type": "number", "exclusiveMinimum": 0 }),
            FieldKind::Boolean => json!({ "type": "boolean" }),
        };

        if let Value::Object(object) = &mut schema {
            object.insert("description".to_string(), json!(self.description));
            if let Some(default) = self.default {
                object.insert("default".to_string(), default.to_value());
            }
        }
        schema
    }

    fn check(&self, value: &Value) -> Result<Value, AppError> {
        match self.kind {
            FieldKind::Text { min_length } => {
                let text = value.as_str().ok_or_else(|| {
                    AppError::validation(format!("Field '{}' must be a string", self.name))
                })?;
                if text.chars().count() < min_length {
                    return Err(AppError::validation(format!(
                        "Field '{}' must contain at least {min_length} character(s)",
                        self.name
                    )));
                }
                Ok(value.clone())
            }
            FieldKind::OneOf(choices) => match value.as_str() {
                Some(text) if choices.contains(&text) => Ok(value.clone()),
                _ => Err(AppError::validation(format!(
                    "Field '{}' must be one of: {}",
                    self.name,
                    choices.join(", ")
                ))),
            },
            FieldKind::PositiveInteger => as_whole_number(value)
                .filter(|number| *number > 0)
                .map(Value::from)
                .ok_or_else(|| {
                    AppError::validation(format!(
                        "Field '{}' must be a positive integer",
                        self.name
                    ))
                }),
            FieldKind::PositiveNumber => value
                .as_f64()
                .filter(|number| number.is_finite() && *number > 0.0)
                .map(|_| value.clone())
                .ok_or_else(|| {
                    AppError::validation(format!("Field '{}' must be a positive number", self.name))
                }),
            FieldKind::Boolean => {
                if value.is_boolean() {
                    Ok(value.clone())
                } else {
                    Err(AppError::validation(format!(
                        "Field '{}' must be a boolean",
                        self.name
                    )))
                }
            }
        }
    }
}

impl DefaultValue {
    fn to_value(self) -> Value {
        match self {
            Self::Bool(value) => Value::Bool(value),
            Self::Integer(value) => Value::from(value),
            Self::Text(value) => Value::from(value),
        }
    }
}

fn as_whole_number(value: &Value) -> Option<i64> {
    if let Some(number) = value.as_i64() {
        return Some(number);
    }

    value
        .as_f64()
        .filter(|number| number.fract() == 0.0 && number.abs() < i64::MAX as f64)
        .map(|number| number as i64)
}

pub fn input_schema(fields: &[FieldSpec]) -> Value {
    let properties = fields
        .iter()
        .map(|field| (field.name.to_string(), field.json_schema()))
        .collect::<Map<_, _>>();
    let required = fields
        .iter()
        .filter(|field| field.required)
        .map(|field| field.name)
        .collect::<Vec<_>>();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

pub fn validate_arguments(
    fields: &[FieldSpec],
    arguments: &Map<String, Value>,
) -> Result<Map<String, Value>, AppError> {
    let mut normalized = Map::new();

    for field in fields {
        match arguments.get(field.name).filter(|value| !value.is_null()) {
            Some(value) => {
                normalized.insert(field.name.to_string(), field.check(value)?);
            }
            None if field.required => {
                return Err(AppError::validation(format!(
                    "Missing required field: {}",
                    field.name
                )));
            }
            None => {
                if let Some(default) = field.default {
                    normalized.insert(field.name.to_string(), default.to_value());
                }
            }
        }
    }

    Ok(normalized)
}

/// Validates `arguments` against `fields` and deserializes the result into
/// the tool's typed parameters.
pub fn parse_arguments<T: DeserializeOwned>(
    fields: &[FieldSpec],
    arguments: &Map<String, Value>,
) -> Result<T, AppError> {
    let normalized = validate_arguments(fields, arguments)?;
    serde_json::from_value(Value::Object(normalized))
        .map_err(|err| AppError::validation(format!("Invalid arguments: {err}")))
}

/// Textual check only; it does not parse SQL. The statement must start with
/// `SELECT` and nothing but comments may follow a terminating `;`.
pub fn ensure_select(query: &str) -> Result<(), AppError> {
    if !SELECT_PREFIX.is_match(query.trim()) {
        return Err(AppError::ReadOnlyViolation);
    }
    if has_stacked_statement(query) {
        return Err(AppError::StackedStatements);
    }
    Ok(())
}

/// Scans for a `;` outside literals, quoted identifiers and comments that is
/// followed by more SQL.
fn has_stacked_statement(query: &str) -> bool {
    let mut chars = query.chars().peekable();
    let mut terminated = false;

    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' | '`' | '[' => {
                if terminated {
                    return true;
                }
                let close = if ch == '[' { ']' } else { ch };
                // A doubled quote closes and immediately reopens the literal.
                for next in chars.by_ref() {
                    if next == close {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for next in chars.by_ref() {
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
            }
            ';' => terminated = true,
            ch if ch.is_whitespace() => {}
            _ if terminated => return true,
            _ => {}
        }
    }

    false
}
