//! Link formatting: how a link to a note is written into another note.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use zettel_config::{LinkFormat, MarkdownConfig};

use crate::note::MinimalNote;
use crate::paths::{strip_extension, to_slash};

/// Link syntaxes a note can be linked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFormatter {
    /// `[[path]]`, path relative to the notebook root.
    Wiki,
    /// `[title](path)`, path relative to the linking note. With `with_parens`
    /// only the `(path)` part is produced, for links whose title is already typed.
    Markdown { with_parens: bool },
}

/// Everything known about the link target, from the point of view of the
/// note the link is written into.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkFormatterContext {
    /// Path relative to the directory of the linking note.
    pub path: String,
    /// Path relative to the notebook root.
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub title: String,
    pub metadata: Map<String, Value>,
}

impl LinkFormatterContext {
    pub fn new(note: &MinimalNote, notebook_root: &Path, current_dir: &Path) -> Self {
        let abs_path = notebook_root.join(&note.path);
        let path = pathdiff::diff_paths(&abs_path, current_dir)
            .map(|relative| to_slash(&relative))
            .unwrap_or_else(|| note.path.clone());
        Self {
            path,
            rel_path: note.path.clone(),
            abs_path,
            title: note.title.clone(),
            metadata: note.metadata.clone(),
        }
    }
}

impl LinkFormatter {
    /// The formatter configured for the notebook.
    pub fn from_config(config: &MarkdownConfig) -> Self {
        match config.link_format {
            LinkFormat::Wiki => LinkFormatter::Wiki,
            LinkFormat::Markdown => LinkFormatter::Markdown { with_parens: false },
        }
    }

    pub fn format(&self, context: &LinkFormatterContext, config: &MarkdownConfig) -> String {
        match self {
            LinkFormatter::Wiki => {
                format!("[[{}]]", link_path(&context.rel_path, config.link_drop_extension))
            }
            LinkFormatter::Markdown { with_parens } => {
                let mut path = link_path(&context.path, config.link_drop_extension);
                if config.link_encode_path {
                    path = path.replace(' ', "%20");
                } else if path.contains(' ') {
                    path = format!("<{path}>");
                }
                if *with_parens {
                    format!("({path})")
                } else {
                    format!("[{}]({path})", context.title)
                }
            }
        }
    }
}

fn link_path(path: &str, drop_extension: bool) -> String {
    if drop_extension {
        strip_extension(path).to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zettel_config::load_defaults;

    fn note(path: &str, title: &str) -> MinimalNote {
        MinimalNote {
            path: path.to_string(),
            title: title.to_string(),
            metadata: Map::new(),
        }
    }

    fn markdown() -> MarkdownConfig {
        load_defaults().unwrap().format.markdown
    }

    #[test]
    fn markdown_links_are_relative_to_the_current_note() {
        let root = Path::new("/nb");
        let context = LinkFormatterContext::new(
            &note("refs/target.md", "Target"),
            root,
            &root.join("journal"),
        );
        assert_eq!(context.path, "../refs/target.md");
        assert_eq!(context.rel_path, "refs/target.md");

        let formatter = LinkFormatter::Markdown { with_parens: false };
        assert_eq!(
            formatter.format(&context, &markdown()),
            "[Target](../refs/target)"
        );
        let parens = LinkFormatter::Markdown { with_parens: true };
        assert_eq!(parens.format(&context, &markdown()), "(../refs/target)");
    }

    #[test]
    fn wiki_links_use_notebook_paths() {
        let root = Path::new("/nb");
        let context =
            LinkFormatterContext::new(&note("refs/target.md", "Target"), root, &root.join("journal"));
        assert_eq!(
            LinkFormatter::Wiki.format(&context, &markdown()),
            "[[refs/target]]"
        );

        let mut config = markdown();
        config.link_drop_extension = false;
        assert_eq!(
            LinkFormatter::Wiki.format(&context, &config),
            "[[refs/target.md]]"
        );
    }

    #[test]
    fn paths_with_spaces() {
        let root = Path::new("/nb");
        let context = LinkFormatterContext::new(&note("my note.md", "Mine"), root, root);
        let formatter = LinkFormatter::Markdown { with_parens: false };
        assert_eq!(formatter.format(&context, &markdown()), "[Mine](<my note>)");

        let mut config = markdown();
        config.link_encode_path = true;
        assert_eq!(formatter.format(&context, &config), "[Mine](my%20note)");
    }

    #[test]
    fn picks_configured_formatter() {
        let mut config = markdown();
        assert_eq!(
            LinkFormatter::from_config(&config),
            LinkFormatter::Markdown { with_parens: false }
        );
        config.link_format = LinkFormat::Wiki;
        assert_eq!(LinkFormatter::from_config(&config), LinkFormatter::Wiki);
    }
}
