//! Minimal `{{variable}}` templates.
//!
//! Used for completion labels, note file names and note bodies. A variable is a
//! dotted path looked up in a JSON-serializable context (`{{metadata.author}}`).
//! Missing variables render as an empty string.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed '{{{{' at offset {offset}")]
    Unclosed { offset: usize },

    #[error("empty variable at offset {offset}")]
    EmptyVariable { offset: usize },

    #[error("invalid template context: {0}")]
    Context(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Variable(Vec<String>),
}

/// A parsed template, ready to be rendered any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_string()));
            }
            let after_open = &rest[open + 2..];
            let close = after_open.find("}}").ok_or(TemplateError::Unclosed {
                offset: offset + open,
            })?;
            let name = after_open[..close].trim();
            if name.is_empty() {
                return Err(TemplateError::EmptyVariable {
                    offset: offset + open,
                });
            }
            segments.push(Segment::Variable(
                name.split('.').map(str::to_string).collect(),
            ));
            let consumed = open + 2 + close + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self { segments })
    }

    pub fn render<T: Serialize>(&self, context: &T) -> Result<String, TemplateError> {
        let context =
            serde_json::to_value(context).map_err(|err| TemplateError::Context(err.to_string()))?;
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Variable(path) => {
                    if let Some(value) = lookup(&context, path) {
                        push_value(&mut output, value);
                    }
                }
            }
        }
        Ok(output)
    }
}

fn lookup<'a>(context: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(context, |value, key| value.as_object()?.get(key))
}

fn push_value(output: &mut String, value: &Value) {
    match value {
        Value::Null | Value::Object(_) => {}
        Value::String(text) => output.push_str(text),
        Value::Bool(flag) => output.push_str(&flag.to_string()),
        Value::Number(number) => output.push_str(&number.to_string()),
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    output.push_str(", ");
                }
                push_value(output, item);
            }
        }
    }
}
