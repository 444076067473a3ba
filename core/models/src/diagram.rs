//! Diagram artifacts rendered from a snapshot.
use serde::Deserialize;
use serde::Serialize;

/// A pre-rendered diagram served to the web front-end.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DiagramArtifact {
    /// Stable identifier of the artifact across refreshes.
    pub id: String,

    /// Human readable title for the front-end to display.
    pub title: String,

    /// How `content` is to be interpreted.
    #[serde(rename = "type")]
    pub kind: DiagramKind,

    /// Opaque payload: Mermaid source, Markdown text or a JSON document.
    pub content: String,
}

impl DiagramArtifact {
    /// Create an artifact, normalising arguments into owned strings.
    pub fn new<S1, S2, S3>(id: S1, title: S2, kind: DiagramKind, content: S3) -> DiagramArtifact
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        DiagramArtifact {
            id: id.into(),
            title: title.into(),
            kind,
            content: content.into(),
        }
    }
}

/// The kinds of diagram artifact contents the front-end understands.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    /// `content` is Mermaid source.
    Mermaid,

    /// `content` is Markdown text (used for empty-state placeholders).
    Markdown,

    /// `content` is a JSON array of uniform records.
    Table,

    /// `content` is a JSON document with `nodes` and `edges` lists.
    Flow,
}
