//! Parameter schemas and option validation.
//!
//! Every pass type publishes a static list of [`ParamSchema`] entries. The
//! registry validates user-supplied [`Properties`] against it once, at
//! construction time, and fills in defaults for anything left out. Passes
//! therefore only ever see complete, well-typed configuration.

use crate::error::ConstructionError;
use crate::types::{ParamValue, Properties};

/// Accepted value shape for one option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    Bool,
    /// Integer greater than zero.
    PositiveInt,
    /// Integer greater than or equal to zero.
    NonNegativeInt,
    /// Number within an inclusive range. Integers are accepted.
    Float { min: f64, max: f64 },
    /// One of a fixed set of names.
    Choice(&'static [&'static str]),
    /// Free-form string.
    Text,
}

/// Default value for an option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
}

impl ParamDefault {
    pub fn to_value(self) -> ParamValue {
        match self {
            Self::Bool(value) => ParamValue::Bool(value),
            Self::Int(value) => ParamValue::Int(value),
            Self::Float(value) => ParamValue::Float(value),
            Self::Str(value) => ParamValue::String(value.to_string()),
        }
    }
}

/// Declaration of one configuration option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSchema {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: ParamDefault,
    /// Deprecated spelling still accepted on input.
    pub alias: Option<&'static str>,
}

impl ParamSchema {
    pub const fn bool(name: &'static str, default: bool) -> Self {
        Self {
            name,
            kind: ParamKind::Bool,
            default: ParamDefault::Bool(default),
            alias: None,
        }
    }

    pub const fn positive(name: &'static str, default: i64) -> Self {
        Self {
            name,
            kind: ParamKind::PositiveInt,
            default: ParamDefault::Int(default),
            alias: None,
        }
    }

    pub const fn non_negative(name: &'static str, default: i64) -> Self {
        Self {
            name,
            kind: ParamKind::NonNegativeInt,
            default: ParamDefault::Int(default),
            alias: None,
        }
    }

    pub const fn float(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Float { min, max },
            default: ParamDefault::Float(default),
            alias: None,
        }
    }

    pub const fn choice(
        name: &'static str,
        choices: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self {
            name,
            kind: ParamKind::Choice(choices),
            default: ParamDefault::Str(default),
            alias: None,
        }
    }

    pub const fn text(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Text,
            default: ParamDefault::Str(default),
            alias: None,
        }
    }

    /// Accept `alias` as a deprecated spelling of this option.
    pub const fn with_alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    /// Check a single value against this entry.
    pub fn check(&self, value: &ParamValue) -> Result<(), String> {
        match (self.kind, value) {
            (ParamKind::Bool, ParamValue::Bool(_)) => Ok(()),
            (ParamKind::PositiveInt, ParamValue::Int(v)) if *v > 0 => Ok(()),
            (ParamKind::PositiveInt, ParamValue::Int(v)) => {
                Err(format!("expected a positive integer, got {v}"))
            }
            (ParamKind::NonNegativeInt, ParamValue::Int(v)) if *v >= 0 => Ok(()),
            (ParamKind::NonNegativeInt, ParamValue::Int(v)) => {
                Err(format!("expected a non-negative integer, got {v}"))
            }
            (ParamKind::Float { min, max }, ParamValue::Float(_) | ParamValue::Int(_)) => {
                let v = value.as_float().unwrap_or(f64::NAN);
                if v >= min && v <= max {
                    Ok(())
                } else {
                    Err(format!("expected a value in [{min}, {max}], got {v}"))
                }
            }
            (ParamKind::Choice(choices), ParamValue::String(v)) => {
                if choices.contains(&v.as_str()) {
                    Ok(())
                } else {
                    Err(format!("expected one of {}, got '{v}'", choices.join(", ")))
                }
            }
            (ParamKind::Text, ParamValue::String(_)) => Ok(()),
            (kind, value) => Err(format!(
                "expected {}, got {} {value}",
                kind_name(kind),
                value.type_name()
            )),
        }
    }
}

fn kind_name(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::Bool => "a bool",
        ParamKind::PositiveInt => "a positive integer",
        ParamKind::NonNegativeInt => "a non-negative integer",
        ParamKind::Float { .. } => "a number",
        ParamKind::Choice(_) => "a name",
        ParamKind::Text => "a string",
    }
}

fn invalid(pass_type: &str, option: &str, reason: impl Into<String>) -> ConstructionError {
    ConstructionError::InvalidParameter {
        pass_type: pass_type.to_string(),
        option: option.to_string(),
        reason: reason.into(),
    }
}

/// Find the schema entry for `name`, following aliases.
///
/// Returns the entry and whether `name` was a deprecated alias.
pub fn lookup<'a>(schema: &'a [ParamSchema], name: &str) -> Option<(&'a ParamSchema, bool)> {
    schema
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| (entry, false))
        .or_else(|| {
            schema
                .iter()
                .find(|entry| entry.alias == Some(name))
                .map(|entry| (entry, true))
        })
}

/// Validate `props` against `schema` and fill in defaults.
///
/// Unknown option names and ill-typed values are rejected. A deprecated alias
/// is accepted with a warning and stored under the canonical name; when both
/// spellings are present the canonical one wins.
pub fn validate(
    pass_type: &str,
    schema: &[ParamSchema],
    props: &Properties,
) -> Result<Properties, ConstructionError> {
    let mut resolved = Properties::new();

    for (name, value) in props.iter() {
        let (entry, is_alias) =
            lookup(schema, name).ok_or_else(|| invalid(pass_type, name, "unknown option"))?;
        entry
            .check(value)
            .map_err(|reason| invalid(pass_type, name, reason))?;

        if is_alias {
            if props.contains(entry.name) {
                log::warn!(
                    "{pass_type}: '{name}' is ignored because '{}' is also set",
                    entry.name
                );
                continue;
            }
            log::warn!(
                "{pass_type}: '{name}' is deprecated, use '{}' instead",
                entry.name
            );
        }
        resolved.set(entry.name, value.clone());
    }

    for entry in schema {
        if !resolved.contains(entry.name) {
            resolved.set(entry.name, entry.default.to_value());
        }
    }

    Ok(resolved)
}
