//! Open documents and positional queries against their live text.
//!
//! Positions follow the LSP convention: zero-based lines, columns counted in
//! UTF-16 code units. A line ends at `\n`; a `\r` right before it belongs to
//! the line terminator.

use lsp_types::{Position, Range, TextDocumentContentChangeEvent, Url};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use zettel_notebook::extract_links;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document {0} is already open")]
    AlreadyOpen(Url),

    #[error("range {start:?}..{end:?} is out of bounds")]
    InvalidRange { start: Position, end: Position },
}

impl DocumentError {
    fn invalid_range(range: Range) -> Self {
        DocumentError::InvalidRange {
            start: range.start,
            end: range.end,
        }
    }
}

/// A link found in an open document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReference {
    pub href: String,
    pub range: Range,
    pub title: Option<String>,
    pub has_title: bool,
    pub is_wiki: bool,
}

#[derive(Debug, Clone)]
pub struct OpenDocument {
    pub uri: Url,
    /// File-system path of the document, derived from its URI.
    pub path: PathBuf,
    pub version: i32,
    text: String,
}

impl OpenDocument {
    pub fn new(uri: Url, version: i32, text: String) -> Self {
        let path = uri
            .to_file_path()
            .unwrap_or_else(|_| PathBuf::from(uri.path()));
        Self {
            uri,
            path,
            version,
            text,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Apply content changes in order. On an out-of-bounds change the changes
    /// before it stay applied and the rest are dropped.
    pub fn apply_changes(
        &mut self,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) -> Result<(), DocumentError> {
        for change in changes {
            match change.range {
                None => self.text = change.text,
                Some(range) => {
                    let span = self
                        .byte_range(range)
                        .ok_or_else(|| DocumentError::invalid_range(range))?;
                    self.text.replace_range(span, &change.text);
                }
            }
        }
        Ok(())
    }

    /// Byte offset of `position`, or `None` when it lies outside the text.
    pub fn offset_at(&self, position: Position) -> Option<usize> {
        let (line_start, line) = self.line(position.line)?;
        let mut units = 0u32;
        for (idx, c) in line.char_indices() {
            if units == position.character {
                return Some(line_start + idx);
            }
            if units > position.character {
                return None;
            }
            units += c.len_utf16() as u32;
        }
        (units == position.character).then_some(line_start + line.len())
    }

    /// Position of the byte `offset`, clamped to the end of the text.
    pub fn position_at(&self, offset: usize) -> Position {
        let mut line = 0u32;
        let mut character = 0u32;
        for (idx, c) in self.text.char_indices() {
            if idx >= offset {
                break;
            }
            if c == '\n' {
                line += 1;
                character = 0;
            } else {
                character += c.len_utf16() as u32;
            }
        }
        Position::new(line, character)
    }

    /// Up to `count` characters before `position`, never crossing the line start.
    pub fn look_behind(&self, position: Position, count: usize) -> String {
        let Some((line_start, _)) = self.line(position.line) else {
            return String::new();
        };
        let Some(offset) = self.offset_at(position) else {
            return String::new();
        };
        let before = &self.text[line_start..offset];
        let skip = before.chars().count().saturating_sub(count);
        before.chars().skip(skip).collect()
    }

    /// Up to `count` characters after `position`, never crossing the line end.
    pub fn look_forward(&self, position: Position, count: usize) -> String {
        let Some((line_start, line)) = self.line(position.line) else {
            return String::new();
        };
        let Some(offset) = self.offset_at(position) else {
            return String::new();
        };
        self.text[offset..line_start + line.len()]
            .chars()
            .take(count)
            .collect()
    }

    /// Every link of the current text, in document order.
    pub fn links(&self) -> Vec<LinkReference> {
        extract_links(&self.text)
            .into_iter()
            .map(|link| LinkReference {
                range: Range::new(
                    self.position_at(link.span.start),
                    self.position_at(link.span.end),
                ),
                has_title: link.has_title(),
                href: link.href,
                title: link.title,
                is_wiki: link.is_wiki,
            })
            .collect()
    }

    /// The link whose range contains `position`, bounds included.
    pub fn link_at(&self, position: Position) -> Option<LinkReference> {
        let key = (position.line, position.character);
        self.links().into_iter().find(|link| {
            (link.range.start.line, link.range.start.character) <= key
                && key <= (link.range.end.line, link.range.end.character)
        })
    }

    pub fn content_at_range(&self, range: Range) -> Result<&str, DocumentError> {
        let span = self
            .byte_range(range)
            .ok_or_else(|| DocumentError::invalid_range(range))?;
        Ok(&self.text[span])
    }

    fn byte_range(&self, range: Range) -> Option<std::ops::Range<usize>> {
        let start = self.offset_at(range.start)?;
        let end = self.offset_at(range.end)?;
        (start <= end).then_some(start..end)
    }

    /// Byte offset and content (terminator excluded) of line `index`.
    fn line(&self, index: u32) -> Option<(usize, &str)> {
        let mut start = 0;
        for (current, line) in self.text.split('\n').enumerate() {
            if current == index as usize {
                return Some((start, line.strip_suffix('\r').unwrap_or(line)));
            }
            start += line.len() + 1;
        }
        None
    }
}

/// The documents currently open in the editor.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: HashMap<Url, OpenDocument>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document. Opening a document twice replaces it and reports
    /// [`DocumentError::AlreadyOpen`].
    pub fn open(&mut self, uri: Url, version: i32, text: String) -> Result<(), DocumentError> {
        let previous = self
            .documents
            .insert(uri.clone(), OpenDocument::new(uri.clone(), version, text));
        match previous {
            Some(_) => Err(DocumentError::AlreadyOpen(uri)),
            None => Ok(()),
        }
    }

    /// Apply changes to an open document. Unknown documents are ignored.
    pub fn apply_changes(
        &mut self,
        uri: &Url,
        version: i32,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) -> Result<(), DocumentError> {
        let Some(document) = self.documents.get_mut(uri) else {
            return Ok(());
        };
        document.version = version;
        document.apply_changes(changes)
    }

    pub fn close(&mut self, uri: &Url) -> Option<OpenDocument> {
        self.documents.remove(uri)
    }

    pub fn get(&self, uri: &Url) -> Option<&OpenDocument> {
        self.documents.get(uri)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::sample::Index;

    fn uri() -> Url {
        Url::parse("file:///notebook/notes/a.md").unwrap()
    }

    fn doc(text: &str) -> OpenDocument {
        OpenDocument::new(uri(), 1, text.to_string())
    }

    fn change(range: Option<Range>, text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range,
            range_length: None,
            text: text.to_string(),
        }
    }

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
        Range::new(Position::new(sl, sc), Position::new(el, ec))
    }

    #[test]
    fn derives_path_from_uri() {
        assert_eq!(doc("").path, PathBuf::from("/notebook/notes/a.md"));
    }

    #[test]
    fn applies_incremental_changes_in_order() {
        let mut document = doc("hello\nworld\n");
        document
            .apply_changes(vec![
                change(Some(range(0, 0, 0, 5)), "goodbye"),
                change(Some(range(1, 5, 1, 5)), "!"),
                change(Some(range(0, 7, 1, 0)), " "),
            ])
            .unwrap();
        assert_eq!(document.text(), "goodbye world!\n");
    }

    #[test]
    fn full_replacement_then_incremental() {
        let mut document = doc("old");
        document
            .apply_changes(vec![change(None, "new text"), change(Some(range(0, 0, 0, 3)), "old")])
            .unwrap();
        assert_eq!(document.text(), "old text");
    }

    #[test]
    fn invalid_range_keeps_earlier_changes() {
        let mut document = doc("abc");
        let err = document
            .apply_changes(vec![
                change(Some(range(0, 0, 0, 1)), "X"),
                change(Some(range(3, 0, 3, 1)), "never"),
                change(Some(range(0, 0, 0, 0)), "dropped"),
            ])
            .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidRange { .. }));
        assert_eq!(document.text(), "Xbc");
    }

    #[test]
    fn rejects_columns_past_line_end_and_reversed_ranges() {
        let document = doc("ab\ncd");
        assert!(document.content_at_range(range(0, 3, 0, 3)).is_err());
        assert!(document.content_at_range(range(1, 1, 0, 0)).is_err());
        assert_eq!(document.content_at_range(range(0, 1, 1, 1)).unwrap(), "b\nc");
    }

    #[test]
    fn columns_are_utf16() {
        let document = doc("😀é[[x]]");
        assert_eq!(document.offset_at(Position::new(0, 2)), Some(4));
        assert_eq!(document.offset_at(Position::new(0, 3)), Some(6));
        assert_eq!(document.offset_at(Position::new(0, 1)), None);
        assert_eq!(document.position_at(6), Position::new(0, 3));
        assert_eq!(document.look_behind(Position::new(0, 3), 5), "😀é");
    }

    #[test]
    fn look_around_is_clipped_to_the_line() {
        let document = doc("ab\r\n[[cd]]\nef");
        assert_eq!(document.look_behind(Position::new(1, 2), 3), "[[");
        assert_eq!(document.look_behind(Position::new(1, 0), 2), "");
        assert_eq!(document.look_forward(Position::new(0, 1), 4), "b");
        assert_eq!(document.look_forward(Position::new(1, 4), 2), "]]");
        assert_eq!(document.look_forward(Position::new(9, 0), 2), "");
        assert_eq!(document.offset_at(Position::new(0, 3)), None);
    }

    #[test]
    fn link_lookup_includes_range_bounds() {
        let document = doc("see [[target]] and [t](b.md)");
        let links = document.links();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].range, range(0, 4, 0, 14));
        assert!(links[0].is_wiki && !links[0].has_title);
        assert!(links[1].has_title);

        assert_eq!(document.link_at(Position::new(0, 4)).unwrap().href, "target");
        assert_eq!(document.link_at(Position::new(0, 14)).unwrap().href, "target");
        assert!(document.link_at(Position::new(0, 16)).is_none());
    }

    #[test]
    fn links_follow_edits() {
        let mut document = doc("[[one]]");
        assert_eq!(document.links(), document.links());
        document
            .apply_changes(vec![change(Some(range(0, 2, 0, 5)), "two")])
            .unwrap();
        let links = document.links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].href, "two");
    }

    #[test]
    fn store_lifecycle() {
        let mut store = DocumentStore::new();
        store.open(uri(), 1, "first".into()).unwrap();
        assert_eq!(
            store.open(uri(), 2, "second".into()),
            Err(DocumentError::AlreadyOpen(uri()))
        );
        assert_eq!(store.get(&uri()).unwrap().text(), "second");

        store
            .apply_changes(&uri(), 3, vec![change(None, "third")])
            .unwrap();
        assert_eq!(store.get(&uri()).unwrap().version, 3);

        assert!(store.close(&uri()).is_some());
        assert!(store.get(&uri()).is_none());
        let missing = Url::parse("file:///missing.md").unwrap();
        assert!(store.apply_changes(&missing, 1, vec![change(None, "x")]).is_ok());
        assert!(store.is_empty());
    }

    /// Position of the character index `char_idx`, computed independently of
    /// the document code.
    fn char_position(text: &str, char_idx: usize) -> Position {
        let mut line = 0;
        let mut character = 0;
        for c in text.chars().take(char_idx) {
            if c == '\n' {
                line += 1;
                character = 0;
            } else {
                character += c.len_utf16() as u32;
            }
        }
        Position::new(line, character)
    }

    proptest! {
        #[test]
        fn incremental_edits_match_full_replacement(
            initial in "[ab é😀\n]{0,30}",
            edits in prop::collection::vec((any::<Index>(), any::<Index>(), "[xyé😀\n]{0,4}"), 0..8),
        ) {
            let mut document = doc(&initial);
            let mut reference: Vec<char> = initial.chars().collect();

            for (a, b, replacement) in edits {
                let len = reference.len() + 1;
                let (start, end) = {
                    let (a, b) = (a.index(len), b.index(len));
                    (a.min(b), a.max(b))
                };
                let current: String = reference.iter().collect();
                let range = Range::new(char_position(&current, start), char_position(&current, end));

                document.apply_changes(vec![change(Some(range), &replacement)]).unwrap();
                reference.splice(start..end, replacement.chars());

                let expected: String = reference.iter().collect();
                prop_assert_eq!(document.text(), expected.as_str());
            }
        }
    }
}
