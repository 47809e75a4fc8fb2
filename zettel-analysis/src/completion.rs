//! Link and tag completion.
//!
//! The trigger is read from the characters right before the cursor rather than
//! from the completion context, which clients do not always send:
//!
//!     ]((  => link to a note, written as `(path)` after an already typed title
//!     [[   => link to a note, in the notebook's link format
//!     #    => hashtag, when hashtags are enabled
//!     :    => colon tag, when colon tags are enabled

use lsp_types::{
    CompletionItem, CompletionItemKind, CompletionTextEdit, Documentation, MarkupContent,
    MarkupKind, Position, Range, TextEdit,
};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use zettel_config::{MarkdownConfig, NoteCompletionConfig};
use zettel_notebook::{
    pluralize, CollectionKind, LinkFormatter, LinkFormatterContext, MinimalNote, NoteFilter,
    Notebook, Template,
};

use crate::document::OpenDocument;
use crate::error::{AnalysisError, Result};
use crate::resolver::document_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTrigger {
    /// `]((`
    MarkdownHref,
    /// `[[`
    WikiLink,
    /// `#`
    Hashtag,
    /// `:`
    ColonTag,
}

impl CompletionTrigger {
    pub fn is_link(self) -> bool {
        matches!(self, CompletionTrigger::MarkdownHref | CompletionTrigger::WikiLink)
    }
}

pub fn detect_trigger(
    document: &OpenDocument,
    position: Position,
    config: &MarkdownConfig,
) -> Option<CompletionTrigger> {
    if document.look_behind(position, 3) == "]((" {
        return Some(CompletionTrigger::MarkdownHref);
    }
    if document.look_behind(position, 2) == "[[" {
        return Some(CompletionTrigger::WikiLink);
    }
    match document.look_behind(position, 1).as_str() {
        "#" if config.hashtags => Some(CompletionTrigger::Hashtag),
        ":" if config.colon_tags => Some(CompletionTrigger::ColonTag),
        _ => None,
    }
}

/// The formatter used to write links for `trigger`.
pub fn select_link_formatter(trigger: CompletionTrigger, notebook: &dyn Notebook) -> LinkFormatter {
    match trigger {
        CompletionTrigger::MarkdownHref => LinkFormatter::Markdown { with_parens: true },
        _ => notebook.new_link_formatter(),
    }
}

/// Completion items at `position`. No trigger means no items.
pub fn complete(
    document: &OpenDocument,
    notebook: &dyn Notebook,
    position: Position,
) -> Result<Vec<CompletionItem>> {
    let markdown = &notebook.config().format.markdown;
    match detect_trigger(document, position, markdown) {
        Some(trigger) if trigger.is_link() => link_items(document, notebook, position, trigger),
        Some(trigger) => tag_items(notebook, trigger),
        None => Ok(Vec::new()),
    }
}

struct ItemTemplates {
    label: Option<Template>,
    filter_text: Option<Template>,
    detail: Option<Template>,
}

impl ItemTemplates {
    fn parse(config: &NoteCompletionConfig) -> Result<Self> {
        let parse = |source: &Option<String>| -> Result<Option<Template>> {
            Ok(source.as_deref().map(Template::parse).transpose()?)
        };
        Ok(Self {
            label: parse(&config.label)?,
            filter_text: parse(&config.filter_text)?,
            detail: parse(&config.detail)?,
        })
    }
}

fn link_items(
    document: &OpenDocument,
    notebook: &dyn Notebook,
    position: Position,
    trigger: CompletionTrigger,
) -> Result<Vec<CompletionItem>> {
    let formatter = select_link_formatter(trigger, notebook);
    let templates = ItemTemplates::parse(&notebook.config().lsp.completion.note)?;
    let notes = notebook.find_minimal_notes(&NoteFilter::all())?;

    let mut items = Vec::with_capacity(notes.len());
    for note in notes {
        match link_item(document, notebook, position, formatter, &templates, &note) {
            Ok(item) => items.push(item),
            Err(err) => {
                tracing::warn!(path = %note.path, error = %err, "skipping completion candidate")
            }
        }
    }
    Ok(items)
}

fn link_item(
    document: &OpenDocument,
    notebook: &dyn Notebook,
    position: Position,
    formatter: LinkFormatter,
    templates: &ItemTemplates,
    note: &MinimalNote,
) -> Result<CompletionItem> {
    let root = notebook.root();
    let current_dir = document_dir(document, notebook);
    let current_dir = current_dir.as_path();
    let context = render_context(note, root, current_dir);

    let mut label = match &templates.label {
        Some(template) => template.render(&context)?,
        None => note.title.clone(),
    };
    if label.is_empty() {
        label = note.path.clone();
    }

    let mut filter_text = match &templates.filter_text {
        Some(template) => template.render(&context)?,
        None => String::new(),
    };
    if filter_text.is_empty() {
        filter_text = format!("{label} {}", note.path);
    }

    let detail = templates
        .detail
        .as_ref()
        .map(|template| template.render(&context))
        .transpose()?;

    let link = formatter.format(
        &LinkFormatterContext::new(note, root, current_dir),
        &notebook.config().format.markdown,
    );
    let closer = document.look_forward(position, 2);
    let end = if closer == "]]" || closer == "))" {
        Position::new(position.line, position.character + 2)
    } else {
        position
    };

    Ok(CompletionItem {
        label,
        kind: Some(CompletionItemKind::REFERENCE),
        detail,
        filter_text: Some(filter_text),
        text_edit: Some(CompletionTextEdit::Edit(TextEdit {
            range: Range::new(position, end),
            new_text: link,
        })),
        // Removes the two trigger characters before the cursor.
        additional_text_edits: Some(vec![TextEdit {
            range: Range::new(
                Position::new(position.line, position.character.saturating_sub(2)),
                position,
            ),
            new_text: String::new(),
        }]),
        data: Some(Value::String(root.join(&note.path).display().to_string())),
        ..CompletionItem::default()
    })
}

/// Variables available to the completion item templates.
fn render_context(note: &MinimalNote, root: &Path, current_dir: &Path) -> Value {
    let absolute = root.join(&note.path);
    let relative = pathdiff::diff_paths(&absolute, current_dir)
        .map(|path| zettel_notebook::paths::to_slash(&path))
        .unwrap_or_else(|| note.path.clone());
    json!({
        "title": note.title,
        "path": note.path,
        "rel_path": relative,
        "abs_path": absolute.display().to_string(),
        "filename": note.filename(),
        "filename_stem": note.filename_stem(),
        "metadata": note.metadata,
        "notebook_root": root.display().to_string(),
        "current_dir": current_dir.display().to_string(),
    })
}

fn tag_items(notebook: &dyn Notebook, trigger: CompletionTrigger) -> Result<Vec<CompletionItem>> {
    let markdown = &notebook.config().format.markdown;
    let tags = notebook.find_collections(CollectionKind::Tag, &NoteFilter::all())?;
    Ok(tags
        .into_iter()
        .map(|tag| CompletionItem {
            insert_text: Some(tag_insert_text(&tag.name, trigger, markdown)),
            detail: Some(format!(
                "{} {}",
                tag.note_count,
                pluralize("note", tag.note_count)
            )),
            label: tag.name,
            ..CompletionItem::default()
        })
        .collect())
}

/// Text inserted for a tag so that it stays a single tag token.
pub fn tag_insert_text(name: &str, trigger: CompletionTrigger, config: &MarkdownConfig) -> String {
    match trigger {
        CompletionTrigger::ColonTag => format!("{name}:"),
        CompletionTrigger::Hashtag if name.contains(' ') => {
            if config.multiword_tags {
                format!("{name}#")
            } else {
                name.replace(' ', "\\ ")
            }
        }
        _ => name.to_string(),
    }
}

/// Attach the content of the note file named by `data` as documentation.
/// Items without a path are returned unchanged.
pub fn resolve_item(mut item: CompletionItem) -> Result<CompletionItem> {
    let Some(Value::String(path)) = &item.data else {
        return Ok(item);
    };
    let content = fs::read_to_string(path).map_err(|source| AnalysisError::Io {
        path: path.into(),
        source,
    })?;
    item.documentation = Some(Documentation::MarkupContent(MarkupContent {
        kind: MarkupKind::Markdown,
        value: content,
    }));
    Ok(item)
}
