//! Canonical forms: deterministic renderings of a record's identity fields,
//! used as the signing input.
//!
//! Templates are plain strings with `{field}` placeholders (`{{` and `}}` for
//! literal braces). They are compiled once against the entity's declared
//! identity fields, so a template naming an unknown field is a configuration
//! error at construction time rather than a per-call failure.

use std::marker::PhantomData;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// A record type whose identity is protected by a signature.
pub trait SignedEntity {
    /// Entity name, used in logs, errors and as encryption context.
    const ENTITY: &'static str;

    /// Canonical templates, newest first. New rows are always signed with the
    /// first one; older ones stay listed so existing signatures still verify.
    fn canonical_templates() -> &'static [&'static str];

    /// Fields a template may reference. Must only name immutable identity
    /// fields, never secrets or derived values.
    fn canonical_fields() -> &'static [&'static str];

    /// Render one identity field.
    fn canonical_value(&self, field: &str) -> Option<String>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CanonicalError {
    #[error("{entity}: no canonical template declared")]
    NoTemplate { entity: &'static str },
    #[error("{entity}: template `{template}` references unknown field `{field}`")]
    UnknownField {
        entity: &'static str,
        template: String,
        field: String,
    },
    #[error("{entity}: template `{template}` is malformed: {reason}")]
    Malformed {
        entity: &'static str,
        template: String,
        reason: &'static str,
    },
    #[error("{entity}: identity field `{field}` has no value")]
    MissingValue {
        entity: &'static str,
        field: &'static str,
    },
}

/// One rendered canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalForm {
    /// Stable identifier of the template that produced this form.
    pub form_id: String,
    pub text: String,
}

impl CanonicalForm {
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(&'static str),
}

#[derive(Debug, Clone)]
struct Template {
    id: String,
    segments: Vec<Segment>,
}

/// Compiled canonical templates for one entity type.
#[derive(Debug, Clone)]
pub struct CanonicalForms<E> {
    templates: Vec<Template>,
    _entity: PhantomData<fn(&E)>,
}

impl<E: SignedEntity> CanonicalForms<E> {
    pub fn compile() -> Result<Self, CanonicalError> {
        let sources = E::canonical_templates();
        if sources.is_empty() {
            return Err(CanonicalError::NoTemplate { entity: E::ENTITY });
        }

        let templates = sources
            .iter()
            .map(|source| {
                Ok(Template {
                    id: form_id(source),
                    segments: parse::<E>(source)?,
                })
            })
            .collect::<Result<Vec<_>, CanonicalError>>()?;

        Ok(Self {
            templates,
            _entity: PhantomData,
        })
    }

    /// Identifier of the template new signatures are produced with.
    pub fn current_form_id(&self) -> &str {
        &self.templates[0].id
    }

    /// Render every template against `entity`, in declaration order.
    pub fn render(&self, entity: &E) -> Result<Vec<CanonicalForm>, CanonicalError> {
        self.templates
            .iter()
            .map(|template| {
                let mut text = String::new();
                for segment in &template.segments {
                    match segment {
                        Segment::Literal(lit) => text.push_str(lit),
                        Segment::Field(field) => {
                            let value = entity.canonical_value(field).ok_or(
                                CanonicalError::MissingValue {
                                    entity: E::ENTITY,
                                    field: *field,
                                },
                            )?;
                            text.push_str(&value);
                        }
                    }
                }
                Ok(CanonicalForm {
                    form_id: template.id.clone(),
                    text,
                })
            })
            .collect()
    }
}

fn form_id(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    hex::encode(&digest[..8])
}

fn parse<E: SignedEntity>(source: &str) -> Result<Vec<Segment>, CanonicalError> {
    let malformed = |reason| CanonicalError::Malformed {
        entity: E::ENTITY,
        template: source.to_string(),
        reason,
    };

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(malformed("unterminated placeholder")),
                    }
                }
                let field = E::canonical_fields()
                    .iter()
                    .copied()
                    .find(|f| *f == name)
                    .ok_or_else(|| CanonicalError::UnknownField {
                        entity: E::ENTITY,
                        template: source.to_string(),
                        field: name.clone(),
                    })?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field(field));
            }
            '}' => return Err(malformed("unmatched `}`")),
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    if !segments.iter().any(|s| matches!(s, Segment::Field(_))) {
        return Err(malformed("references no field"));
    }
    Ok(segments)
}
