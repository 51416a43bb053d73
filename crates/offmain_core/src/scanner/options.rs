//! Static parsing of the worker options argument.
//!
//! Only plain object literals whose values are literals are understood.
//! Anything that would need evaluation is reported, never executed.

use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, ObjectPropertyKind, PropertyKey, PropertyKind};
use oxc_parser::Parser;
use oxc_span::SourceType;
use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("`{0}` is not valid JavaScript")]
    Syntax(String),
    #[error("worker options must be an object literal")]
    NotAnObject,
    #[error("worker option `{0}` is not a literal value")]
    NotStatic(String),
    #[error("computed, spread or method properties are not supported in worker options")]
    UnsupportedProperty,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

/// Options object in source order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkerOptions {
    fields: Vec<(String, OptionValue)>,
}

const WORKER_TYPES: &[&str] = &["classic", "module"];
const CREDENTIALS: &[&str] = &["omit", "same-origin", "include"];

impl WorkerOptions {
    pub fn parse(text: &str) -> Result<Self, OptionsError> {
        let allocator = Allocator::default();
        let expression = Parser::new(&allocator, text, SourceType::default())
            .parse_expression()
            .map_err(|_| OptionsError::Syntax(text.to_string()))?;

        let mut expression = &expression;
        while let Expression::ParenthesizedExpression(inner) = expression {
            expression = &inner.expression;
        }
        let Expression::ObjectExpression(object) = expression else {
            return Err(OptionsError::NotAnObject);
        };

        let mut fields = Vec::with_capacity(object.properties.len());
        for property in object.properties.iter() {
            let ObjectPropertyKind::ObjectProperty(property) = property else {
                return Err(OptionsError::UnsupportedProperty);
            };
            if property.computed || property.method || !matches!(property.kind, PropertyKind::Init) {
                return Err(OptionsError::UnsupportedProperty);
            }
            let key = match &property.key {
                PropertyKey::StaticIdentifier(ident) => ident.name.to_string(),
                PropertyKey::StringLiteral(literal) => literal.value.to_string(),
                _ => return Err(OptionsError::UnsupportedProperty),
            };
            let value = match &property.value {
                Expression::StringLiteral(literal) => OptionValue::String(literal.value.to_string()),
                Expression::NumericLiteral(literal) => OptionValue::Number(literal.value),
                Expression::BooleanLiteral(literal) => OptionValue::Bool(literal.value),
                Expression::NullLiteral(_) => OptionValue::Null,
                _ => return Err(OptionsError::NotStatic(key)),
            };
            fields.push((key, value));
        }
        Ok(Self { fields })
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.fields.iter().find(|(name, _)| name == key).map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Drop fields that only work when workers run as modules. Returns
    /// `true` when something was removed.
    pub fn strip_module_only(&mut self) -> bool {
        let before = self.fields.len();
        self.fields.retain(|(name, _)| name != "type");
        self.fields.len() != before
    }

    /// Human-readable problems with known fields, and unknown field names.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (name, value) in &self.fields {
            let allowed: Option<&[&str]> = match name.as_str() {
                "type" => Some(WORKER_TYPES),
                "credentials" => Some(CREDENTIALS),
                "name" => None,
                other => {
                    problems.push(format!("unknown worker option `{other}`"));
                    continue;
                }
            };
            match (value, allowed) {
                (OptionValue::String(v), Some(allowed)) if !allowed.contains(&v.as_str()) => {
                    problems.push(format!("worker option `{name}` must be one of {allowed:?}, got \"{v}\""));
                }
                (OptionValue::String(_), _) => {}
                _ => problems.push(format!("worker option `{name}` must be a string")),
            }
        }
        problems
    }

    /// JSON rendering, which is also a valid JavaScript object literal.
    pub fn to_js(&self) -> String {
        let mut map = Map::new();
        for (name, value) in &self.fields {
            let value = match value {
                OptionValue::String(s) => Value::String(s.clone()),
                OptionValue::Bool(b) => Value::Bool(*b),
                OptionValue::Null => Value::Null,
                OptionValue::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                    Value::Number(Number::from(*n as i64))
                }
                OptionValue::Number(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            };
            map.insert(name.clone(), value);
        }
        Value::Object(map).to_string()
    }
}
