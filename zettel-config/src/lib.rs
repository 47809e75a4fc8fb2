//! Notebook configuration loader for the zettel toolchain.
//!
//! `defaults/zettel.default.toml` is embedded into every binary so that docs and
//! runtime behavior stay in sync. A notebook layers its own `.zettel/config.toml`
//! on top of those defaults via [`Loader`] before deserializing into
//! [`NotebookConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

pub use config::ConfigError;

const DEFAULT_TOML: &str = include_str!("../defaults/zettel.default.toml");

/// Directory marking the root of a notebook.
pub const NOTEBOOK_DIR: &str = ".zettel";

/// Name of the per-notebook configuration file inside [`NOTEBOOK_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration of a notebook.
#[derive(Debug, Clone, Deserialize)]
pub struct NotebookConfig {
    pub note: NoteConfig,
    pub format: FormatConfig,
    pub lsp: LspConfig,
    /// Named note groups, selected with the `group` option of note creation.
    #[serde(default)]
    pub group: HashMap<String, GroupConfig>,
}

/// Defaults applied when creating notes.
#[derive(Debug, Clone, Deserialize)]
pub struct NoteConfig {
    /// File extension of notes, without the leading dot.
    pub extension: String,
    pub default_title: String,
    /// Template for the file name (without extension) of new notes.
    pub filename: String,
    /// Body template used when neither the caller nor the group names one.
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupConfig {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatConfig {
    pub markdown: MarkdownConfig,
}

/// Markdown flavour knobs shared by tag extraction, completion and link formatting.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkdownConfig {
    /// Enables `#tag` tags.
    pub hashtags: bool,
    /// Enables `:tag:` tags.
    pub colon_tags: bool,
    /// Enables `#multi word tag#` hashtags.
    pub multiword_tags: bool,
    pub link_format: LinkFormat,
    pub link_drop_extension: bool,
    pub link_encode_path: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkFormat {
    Wiki,
    Markdown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LspConfig {
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

/// Severity of each diagnostic category; `none` disables the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DiagnosticsConfig {
    pub wiki_title: DiagnosticLevel,
    pub dead_link: DiagnosticLevel,
}

impl DiagnosticsConfig {
    /// True when every category is disabled.
    pub fn is_disabled(&self) -> bool {
        !self.wiki_title.is_enabled() && !self.dead_link.is_enabled()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    None,
    Hint,
    Info,
    Warning,
    Error,
}

impl DiagnosticLevel {
    pub fn is_enabled(self) -> bool {
        self != DiagnosticLevel::None
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionConfig {
    #[serde(default)]
    pub note: NoteCompletionConfig,
}

/// Templates rendering the parts of a note completion item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteCompletionConfig {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub filter_text: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Helper for layering notebook overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer the configuration file of the notebook rooted at `root`, if it has one.
    pub fn for_notebook(root: impl AsRef<Path>) -> Self {
        let path = root.as_ref().join(NOTEBOOK_DIR).join(CONFIG_FILE);
        Self::new().with_optional_file(path)
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<NotebookConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<NotebookConfig, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn loads_default_config() {
        let config = load_defaults().expect("defaults to deserialize");
        assert_eq!(config.note.extension, "md");
        assert!(config.format.markdown.hashtags);
        assert!(!config.format.markdown.colon_tags);
        assert_eq!(config.format.markdown.link_format, LinkFormat::Markdown);
        assert_eq!(config.lsp.diagnostics.dead_link, DiagnosticLevel::Error);
        assert_eq!(config.lsp.diagnostics.wiki_title, DiagnosticLevel::None);
        assert!(config.lsp.completion.note.label.is_none());
        assert!(config.group.is_empty());
    }

    #[test]
    fn supports_overrides() {
        let config = Loader::new()
            .set_override("lsp.diagnostics.dead_link", "none")
            .expect("override to apply")
            .build()
            .expect("config to build");
        assert_eq!(config.lsp.diagnostics.dead_link, DiagnosticLevel::None);
        assert!(config.lsp.diagnostics.is_disabled());
    }

    #[test]
    fn notebook_file_layers_over_defaults() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join(NOTEBOOK_DIR)).unwrap();
        fs::write(
            root.path().join(NOTEBOOK_DIR).join(CONFIG_FILE),
            r#"
[format.markdown]
colon_tags = true
link_format = "wiki"

[lsp.completion.note]
label = "{{title}} ({{path}})"

[group.journal]
filename = "{{date}}"
"#,
        )
        .unwrap();

        let config = Loader::for_notebook(root.path()).build().unwrap();
        assert!(config.format.markdown.colon_tags);
        assert!(config.format.markdown.hashtags);
        assert_eq!(config.format.markdown.link_format, LinkFormat::Wiki);
        assert_eq!(
            config.lsp.completion.note.label.as_deref(),
            Some("{{title}} ({{path}})")
        );
        assert_eq!(
            config.group["journal"].filename.as_deref(),
            Some("{{date}}")
        );
    }

    #[test]
    fn missing_notebook_file_falls_back_to_defaults() {
        let root = tempdir().unwrap();
        let config = Loader::for_notebook(root.path()).build().unwrap();
        assert_eq!(config.note.default_title, "Untitled");
    }

    #[test]
    fn required_file_must_exist() {
        let root = tempdir().unwrap();
        let result = Loader::new()
            .with_file(root.path().join("absent.toml"))
            .build();
        assert!(result.is_err());
    }
}
