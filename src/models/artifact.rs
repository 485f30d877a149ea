use std::sync::Arc;

/// One named output produced by the processor (e.g. "standard.png").
///
/// Content is reference-counted so results, the artifact cache and archive
/// packaging share a single buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub content: Arc<[u8]>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl From<(&str, Vec<u8>)> for Artifact {
    fn from((name, content): (&str, Vec<u8>)) -> Self {
        Self::new(name, content)
    }
}
