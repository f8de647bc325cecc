//! Event tag templates

/// Marker replaced by the metric path in a tag template
const WILDCARD: char = '*';

/// A tag template compiled once at configuration time.
///
/// `kubernetes.metrics.*` renders `node.cpu.usage` as
/// `kubernetes.metrics.node.cpu.usage`. A template without a wildcard
/// renders every metric under the literal template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagTemplate {
    Literal(String),
    Wildcard { prefix: String, suffix: String },
}

impl TagTemplate {
    /// Compile a template. Only the first `*` is a placeholder.
    pub fn parse(template: &str) -> Self {
        match template.split_once(WILDCARD) {
            Some((prefix, suffix)) => TagTemplate::Wildcard {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            },
            None => TagTemplate::Literal(template.to_string()),
        }
    }

    pub fn render(&self, segment: &str) -> String {
        match self {
            TagTemplate::Literal(tag) => tag.clone(),
            TagTemplate::Wildcard { prefix, suffix } => {
                let mut tag = String::with_capacity(prefix.len() + segment.len() + suffix.len());
                tag.push_str(prefix);
                tag.push_str(segment);
                tag.push_str(suffix);
                tag
            }
        }
    }
}

impl Default for TagTemplate {
    fn default() -> Self {
        Self::parse("kubernetes.metrics.*")
    }
}
