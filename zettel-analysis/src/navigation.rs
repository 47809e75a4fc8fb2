//! Hover, go to definition, references and document links.

use lsp_types::{
    DocumentLink, GotoDefinitionResponse, Hover, HoverContents, Location, LocationLink,
    MarkupContent, MarkupKind, Position, Range,
};
use std::fs;
use zettel_notebook::paths::strip_extension;
use zettel_notebook::{NoteFilter, Notebook};

use crate::document::{LinkReference, OpenDocument};
use crate::error::{AnalysisError, Result};
use crate::resolver::{resolve, target_of, ResolvedTarget};

fn target_at(
    document: &OpenDocument,
    notebook: &dyn Notebook,
    position: Position,
) -> Result<Option<(LinkReference, ResolvedTarget)>> {
    let Some(link) = document.link_at(position) else {
        return Ok(None);
    };
    Ok(resolve(&link, document, notebook)?.map(|target| (link, target)))
}

/// Content of the note linked at `position`, as Markdown.
pub fn hover(
    document: &OpenDocument,
    notebook: &dyn Notebook,
    position: Position,
) -> Result<Option<Hover>> {
    let Some((link, target)) = target_at(document, notebook, position)? else {
        return Ok(None);
    };
    let contents = fs::read_to_string(&target.path).map_err(|source| AnalysisError::Io {
        path: target.path.clone(),
        source,
    })?;
    Ok(Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: contents,
        }),
        range: Some(link.range),
    }))
}

/// The note linked at `position`. `link_support` selects a `LocationLink`
/// answer, for clients advertising it.
pub fn definition(
    document: &OpenDocument,
    notebook: &dyn Notebook,
    position: Position,
    link_support: bool,
) -> Result<Option<GotoDefinitionResponse>> {
    let Some((link, target)) = target_at(document, notebook, position)? else {
        return Ok(None);
    };
    let response = if link_support {
        GotoDefinitionResponse::Link(vec![LocationLink {
            origin_selection_range: Some(link.range),
            target_uri: target.uri,
            target_range: Range::default(),
            target_selection_range: Range::default(),
        }])
    } else {
        GotoDefinitionResponse::Scalar(Location::new(target.uri, Range::default()))
    };
    Ok(Some(response))
}

/// Notes linking to the target of the link at `position`, or to the document
/// itself when the cursor is not on a link. Each location points at the first
/// line mentioning the target.
pub fn references(
    document: &OpenDocument,
    notebook: &dyn Notebook,
    position: Position,
) -> Result<Vec<Location>> {
    let link = match document.link_at(position) {
        Some(link) => link,
        None => {
            let Some(name) = document.path.file_name() else {
                return Ok(Vec::new());
            };
            LinkReference {
                href: name.to_string_lossy().into_owned(),
                range: Range::default(),
                title: None,
                has_title: false,
                is_wiki: false,
            }
        }
    };
    let Some(target) = resolve(&link, document, notebook)? else {
        return Ok(Vec::new());
    };

    let stem = strip_extension(&target.note.path);
    let notes = notebook.find_notes(&NoteFilter::linking_to(target.note.path.clone()))?;
    notes
        .into_iter()
        .map(|note| {
            let line = note
                .raw_content
                .find(stem)
                .map_or(0, |idx| note.raw_content[..idx].matches('\n').count() as u32);
            let uri = target_of(note.as_minimal(), notebook.root())?.uri;
            Ok(Location::new(
                uri,
                Range::new(Position::new(line, 0), Position::new(line, 0)),
            ))
        })
        .collect()
}

/// Clickable links for every resolvable link of the document.
pub fn document_links(document: &OpenDocument, notebook: &dyn Notebook) -> Vec<DocumentLink> {
    document
        .links()
        .into_iter()
        .filter_map(|link| match resolve(&link, document, notebook) {
            Ok(target) => target.map(|target| DocumentLink {
                range: link.range,
                target: Some(target.uri),
                tooltip: None,
                data: None,
            }),
            Err(err) => {
                tracing::warn!(href = %link.href, error = %err, "skipping document link");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::Url;
    use std::path::Path;
    use tempfile::TempDir;
    use zettel_notebook::config::NOTEBOOK_DIR;
    use zettel_notebook::test_support::MemoryNotebook;
    use zettel_notebook::FsNotebook;

    fn memory_notebook() -> MemoryNotebook {
        MemoryNotebook::new("/nb")
            .with_note("a.md", "# A\nsee [[b]]")
            .with_note("b.md", "# B")
            .with_note("c.md", "# C\n\nintro\nlink to [b](b.md)")
            .with_note("d.md", "# D\n[[a]]")
    }

    fn document(path: &str, text: &str) -> OpenDocument {
        OpenDocument::new(
            Url::from_file_path(Path::new("/nb").join(path)).unwrap(),
            1,
            text.to_string(),
        )
    }

    #[test]
    fn definition_honors_link_support() {
        let notebook = memory_notebook();
        let doc = document("a.md", "# A\nsee [[b]]");

        let scalar = definition(&doc, &notebook, Position::new(1, 6), false)
            .unwrap()
            .unwrap();
        match scalar {
            GotoDefinitionResponse::Scalar(location) => {
                assert_eq!(location.uri.as_str(), "file:///nb/b.md")
            }
            other => panic!("unexpected response {other:?}"),
        }

        let linked = definition(&doc, &notebook, Position::new(1, 6), true)
            .unwrap()
            .unwrap();
        match linked {
            GotoDefinitionResponse::Link(links) => {
                assert_eq!(links.len(), 1);
                assert_eq!(
                    links[0].origin_selection_range,
                    Some(Range::new(Position::new(1, 4), Position::new(1, 9)))
                );
            }
            other => panic!("unexpected response {other:?}"),
        }

        assert!(definition(&doc, &notebook, Position::new(0, 1), false)
            .unwrap()
            .is_none());
    }

    #[test]
    fn references_to_link_target() {
        let notebook = memory_notebook();
        let doc = document("a.md", "# A\nsee [[b]]");
        let locations = references(&doc, &notebook, Position::new(1, 6)).unwrap();
        let found: Vec<(String, u32)> = locations
            .into_iter()
            .map(|location| (location.uri.to_string(), location.range.start.line))
            .collect();
        assert_eq!(
            found,
            vec![
                ("file:///nb/a.md".to_string(), 1),
                ("file:///nb/c.md".to_string(), 3),
            ]
        );
    }

    #[test]
    fn references_to_current_document_without_link() {
        let notebook = memory_notebook();
        let doc = document("a.md", "# A\nsee [[b]]");
        let locations = references(&doc, &notebook, Position::new(0, 0)).unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].uri.as_str(), "file:///nb/d.md");
        assert_eq!(locations[0].range.start.line, 1);
    }

    #[test]
    fn document_links_skip_unresolved() {
        let notebook = memory_notebook();
        let doc = document("a.md", "[[b]] [[nope]] [x](https://example.com)");
        let links = document_links(&doc, &notebook);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target.as_ref().unwrap().as_str(), "file:///nb/b.md");
    }

    fn disk_notebook() -> (TempDir, FsNotebook) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(NOTEBOOK_DIR)).unwrap();
        fs::write(dir.path().join("b.md"), "# B\n\nBody of b").unwrap();
        let notebook = FsNotebook::open(dir.path()).unwrap();
        (dir, notebook)
    }

    #[test]
    fn hover_shows_target_content() {
        let (_dir, notebook) = disk_notebook();
        let doc = OpenDocument::new(
            Url::from_file_path(notebook.root().join("a.md")).unwrap(),
            1,
            "[[b]]".to_string(),
        );
        let result = hover(&doc, &notebook, Position::new(0, 2)).unwrap().unwrap();
        match result.contents {
            HoverContents::Markup(content) => {
                assert_eq!(content.kind, MarkupKind::Markdown);
                assert_eq!(content.value, "# B\n\nBody of b");
            }
            other => panic!("unexpected hover {other:?}"),
        }
        assert!(hover(&doc, &notebook, Position::new(0, 9)).unwrap().is_none());
    }

    #[test]
    fn hover_fails_when_target_unreadable() {
        let notebook = memory_notebook();
        let doc = document("a.md", "[[b]]");
        assert!(matches!(
            hover(&doc, &notebook, Position::new(0, 2)),
            Err(AnalysisError::Io { .. })
        ));
    }
}
