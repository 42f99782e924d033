use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use super::PromptError;

pub type PromptArguments = HashMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptSource {
    BuiltIn,
    File(PathBuf),
}

impl PromptSource {
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::BuiltIn => None,
            Self::File(path) => Some(path.as_path()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(String),
}

/// A rubric body with `{name}` slots. `{{` and `}}` render as literal braces,
/// so JSON examples survive substitution.
#[derive(Clone, Debug)]
pub struct PromptTemplate {
    key: String,
    segments: Vec<Segment>,
    slots: BTreeSet<String>,
    required: BTreeSet<String>,
    description: Option<String>,
    source: PromptSource,
}

impl PromptTemplate {
    pub fn parse(
        key: impl Into<String>,
        body: &str,
        required: &[String],
        description: Option<String>,
        source: PromptSource,
    ) -> Result<Self, PromptError> {
        let key = key.into();
        let (segments, slots) = split_segments(body);

        let required = if required.is_empty() {
            slots.clone()
        } else {
            let mut set = BTreeSet::new();
            for name in required {
                let name = name.trim().to_string();
                if !slots.contains(&name) {
                    return Err(PromptError::UnknownRequired {
                        key: key.clone(),
                        argument: name,
                    });
                }
                set.insert(name);
            }
            set
        };

        Ok(Self {
            key,
            segments,
            slots,
            required,
            description,
            source,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn source(&self) -> &PromptSource {
        &self.source
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(String::as_str)
    }

    pub fn render(&self, arguments: &PromptArguments) -> Result<String, PromptError> {
        if let Some(missing) = self.required.iter().find(|name| !arguments.contains_key(*name)) {
            return Err(PromptError::MissingArgument {
                key: self.key.clone(),
                argument: missing.clone(),
            });
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(name) => {
                    if let Some(value) = arguments.get(name) {
                        out.push_str(value);
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn render_with<I, K, V>(&self, arguments: I) -> Result<String, PromptError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: PromptArguments = arguments
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.render(&map)
    }
}

fn split_segments(body: &str) -> (Vec<Segment>, BTreeSet<String>) {
    let mut segments = Vec::new();
    let mut slots = BTreeSet::new();
    let mut text = String::new();
    let mut chars = body.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                text.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                text.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }

                let trimmed = name.trim();
                if closed && is_slot_name(trimmed) {
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    slots.insert(trimmed.to_string());
                    segments.push(Segment::Slot(trimmed.to_string()));
                } else {
                    text.push('{');
                    text.push_str(&name);
                    if closed {
                        text.push('}');
                    }
                }
            }
            _ => text.push(ch),
        }
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }

    (segments, slots)
}

fn is_slot_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
