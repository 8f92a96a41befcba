use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template '{template}': placeholder must fill a whole segment ({segment})")]
    PartialSegment { template: String, segment: String },
    #[error("template '{template}': empty placeholder name")]
    EmptyName { template: String },
    #[error("template '{template}': placeholder '{name}' appears more than once")]
    DuplicateVariable { template: String, name: String },
    #[error("template '{template}' has no placeholders")]
    NoVariables { template: String },
    #[error("template '{template}': placeholders {placeholders:?} do not match handler parameters {declared:?}")]
    ParameterMismatch {
        template: String,
        placeholders: Vec<String>,
        declared: Vec<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A resource URI pattern such as `confluence://space/{spaceKey}/pages`.
///
/// Matching splits on `/` and compares segment by segment. Literal segments
/// must be equal; a variable segment binds the raw (non-empty) text at that
/// position.
#[derive(Clone, Debug)]
pub struct UriTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut names: Vec<String> = Vec::new();

        for part in raw.split('/') {
            let has_brace = part.contains('{') || part.contains('}');
            if !has_brace {
                segments.push(Segment::Literal(part.to_string()));
                continue;
            }
            let name = part
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
                .filter(|inner| !inner.contains('{') && !inner.contains('}'))
                .ok_or_else(|| TemplateError::PartialSegment {
                    template: raw.to_string(),
                    segment: part.to_string(),
                })?;
            if name.is_empty() {
                return Err(TemplateError::EmptyName {
                    template: raw.to_string(),
                });
            }
            if names.iter().any(|existing| existing == name) {
                return Err(TemplateError::DuplicateVariable {
                    template: raw.to_string(),
                    name: name.to_string(),
                });
            }
            names.push(name.to_string());
            segments.push(Segment::Variable(name.to_string()));
        }

        if names.is_empty() {
            return Err(TemplateError::NoVariables {
                template: raw.to_string(),
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Every placeholder must be declared exactly once and every declared
    /// name must appear as a placeholder.
    pub fn check_parameters(&self, declared: &[&str]) -> Result<(), TemplateError> {
        let mut placeholders: Vec<&str> = self.variables().collect();
        let mut names = declared.to_vec();
        placeholders.sort_unstable();
        names.sort_unstable();
        if placeholders == names {
            return Ok(());
        }
        Err(TemplateError::ParameterMismatch {
            template: self.raw.clone(),
            placeholders: self.variables().map(str::to_string).collect(),
            declared: declared.iter().map(|name| name.to_string()).collect(),
        })
    }

    /// Bindings in template order, or `None` when the URI does not fit.
    pub fn matches(&self, uri: &str) -> Option<Vec<(String, String)>> {
        let parts: Vec<&str> = uri.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut bindings = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Variable(_) if part.is_empty() => return None,
                Segment::Variable(name) => bindings.push((name.clone(), part.to_string())),
            }
        }
        Some(bindings)
    }
}
