//! Workspace commands: `zettel.index` and `zettel.new`.

use chrono::NaiveDateTime;
use lsp_types::{Location, ShowDocumentParams, TextEdit, WorkspaceEdit};
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tower_lsp::jsonrpc::{Error, Result};
use zettel_analysis::resolver::{document_dir, path_to_uri};
use zettel_analysis::DocumentStore;
use zettel_notebook::{
    parse_natural_date, LinkFormatterContext, NewNoteOptions, Note, NoteFilter, Notebook,
    NotebookError, NotebookStore,
};

use super::internal_error;
use crate::outbox::{ClientMessage, Outbox};
use crate::session::Session;

pub const COMMAND_INDEX: &str = "zettel.index";
pub const COMMAND_NEW: &str = "zettel.new";

pub const COMMANDS: [&str; 2] = [COMMAND_INDEX, COMMAND_NEW];

/// Options of `zettel.index`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexCommandOptions {
    #[serde(deserialize_with = "lenient_bool")]
    pub force: bool,
}

/// Options of `zettel.new`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewNoteCommandOptions {
    pub title: Option<String>,
    pub content: Option<String>,
    pub dir: Option<String>,
    pub group: Option<String>,
    pub template: Option<String>,
    pub extra: HashMap<String, String>,
    /// Natural language date, such as "yesterday" or "2024-05-01".
    pub date: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub edit: bool,
    pub insert_link_at_location: Option<Location>,
}

/// Accepts `true`, `"true"`, `1` and `"1"` as true. Anything else is false.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(value) => value,
        Value::Number(number) => number.as_f64() == Some(1.0),
        Value::String(text) => text.eq_ignore_ascii_case("true") || text == "1",
        _ => false,
    })
}

/// What commands need from the server.
pub struct CommandContext<'a> {
    pub store: &'a dyn NotebookStore,
    pub documents: &'a DocumentStore,
    pub session: &'a Session,
    pub outbox: &'a Outbox,
    /// Date of notes created without a `date` option.
    pub now: NaiveDateTime,
}

pub fn execute_command(
    command: &str,
    arguments: &[Value],
    context: &CommandContext<'_>,
) -> Result<Option<Value>> {
    match command {
        COMMAND_INDEX => index(arguments, context).map(Some),
        COMMAND_NEW => new_note(arguments, context).map(Some),
        _ => Err(Error::invalid_params(format!("Unknown command: {command}"))),
    }
}

fn path_argument(command: &str, arguments: &[Value]) -> Result<String> {
    match arguments.first() {
        Some(Value::String(path)) => Ok(path.clone()),
        Some(other) => Err(Error::invalid_params(format!(
            "{command} expects a notebook path as first argument, got: {other}"
        ))),
        None => Err(Error::invalid_params(format!(
            "Missing notebook path argument for {command}"
        ))),
    }
}

fn options_argument<T: DeserializeOwned + Default>(command: &str, arguments: &[Value]) -> Result<T> {
    match arguments.get(1) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value @ Value::Object(_)) => serde_json::from_value(value.clone()).map_err(|err| {
            Error::invalid_params(format!("Invalid options for {command}: {err}"))
        }),
        Some(other) => Err(Error::invalid_params(format!(
            "{command} expects a dictionary of options as second argument, got: {other}"
        ))),
    }
}

fn open_notebook(path: &str, context: &CommandContext<'_>) -> Result<Arc<dyn Notebook>> {
    context
        .store
        .open(&context.session.resolve_path(path))
        .map_err(internal_error)
}

fn index(arguments: &[Value], context: &CommandContext<'_>) -> Result<Value> {
    let path = path_argument(COMMAND_INDEX, arguments)?;
    let options: IndexCommandOptions = options_argument(COMMAND_INDEX, arguments)?;
    let notebook = open_notebook(&path, context)?;
    let stats = notebook.index(options.force).map_err(internal_error)?;
    tracing::info!(root = %notebook.root().display(), ?stats, "notebook indexed");
    serde_json::to_value(stats).map_err(internal_error)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn new_note(arguments: &[Value], context: &CommandContext<'_>) -> Result<Value> {
    let path = path_argument(COMMAND_NEW, arguments)?;
    let options: NewNoteCommandOptions = options_argument(COMMAND_NEW, arguments)?;
    let notebook = open_notebook(&path, context)?;

    let date = options.date.as_deref().unwrap_or_default();
    let date = parse_natural_date(date, context.now)
        .map_err(|err| internal_error(format!("failed to parse the `date` option: {err}")))?;
    let directory = match non_empty(options.dir) {
        Some(dir) => Some(notebook.rel_path(Path::new(&dir)).map_err(internal_error)?),
        None => None,
    };

    let mut request = NewNoteOptions::new(date);
    request.title = non_empty(options.title);
    request.content = options.content.unwrap_or_default();
    request.directory = directory;
    request.group = non_empty(options.group);
    request.template = non_empty(options.template);
    request.extra = options.extra;

    let note = create_or_find(notebook.as_ref(), request)?;
    let absolute = notebook.root().join(&note.path);

    if let Some(location) = options.insert_link_at_location {
        insert_link(notebook.as_ref(), &note, location, context)?;
    }
    if options.edit {
        let uri = path_to_uri(&absolute).map_err(internal_error)?;
        context.outbox.send(ClientMessage::ShowDocument(ShowDocumentParams {
            uri,
            external: None,
            take_focus: Some(true),
            selection: None,
        }));
    }

    Ok(json!({ "path": absolute.display().to_string() }))
}

/// Creates the note, or finds the note already sitting where it would be
/// created.
fn create_or_find(notebook: &dyn Notebook, request: NewNoteOptions) -> Result<Note> {
    let relative = match notebook.new_note(request) {
        Ok(path) => notebook.rel_path(&path).map_err(internal_error)?,
        Err(NotebookError::NoteExists { name }) => {
            tracing::debug!(%name, "note exists, reusing it");
            name
        }
        Err(err) => return Err(internal_error(err)),
    };
    notebook
        .find_note(&NoteFilter::include_path(relative))
        .map_err(internal_error)?
        .ok_or_else(|| internal_error("could not generate a new note"))
}

fn insert_link(
    notebook: &dyn Notebook,
    note: &Note,
    location: Location,
    context: &CommandContext<'_>,
) -> Result<()> {
    let Some(document) = context.documents.get(&location.uri) else {
        return Err(internal_error(format!("can't insert link in {}", location.uri)));
    };
    let current_dir = document_dir(document, notebook);
    let link_context = LinkFormatterContext::new(&note.as_minimal(), notebook.root(), &current_dir);
    let link = notebook
        .new_link_formatter()
        .format(&link_context, &notebook.config().format.markdown);

    context.outbox.send(ClientMessage::ApplyEdit(WorkspaceEdit {
        changes: Some(HashMap::from([(
            location.uri,
            vec![TextEdit::new(location.range, link)],
        )])),
        ..WorkspaceEdit::default()
    }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lsp_types::{Position, Range, Url};
    use tokio::sync::mpsc::UnboundedReceiver;
    use zettel_notebook::test_support::{MemoryNotebook, MemoryNotebookStore};

    struct Fixture {
        store: MemoryNotebookStore,
        documents: DocumentStore,
        session: Session,
        outbox: Outbox,
        receiver: UnboundedReceiver<ClientMessage>,
    }

    impl Fixture {
        fn new() -> Self {
            let notebook = MemoryNotebook::new("/nb").with_note("existing.md", "# Existing");
            let mut documents = DocumentStore::new();
            documents
                .open(
                    Url::parse("file:///nb/journal/today.md").unwrap(),
                    1,
                    "Some Idea here".to_string(),
                )
                .unwrap();
            let (outbox, receiver) = Outbox::channel();
            Self {
                store: MemoryNotebookStore::new(notebook.into_arc()),
                documents,
                session: Session::default(),
                outbox,
                receiver,
            }
        }

        fn run(&self, command: &str, arguments: Vec<Value>) -> Result<Option<Value>> {
            let context = CommandContext {
                store: &self.store,
                documents: &self.documents,
                session: &self.session,
                outbox: &self.outbox,
                now: NaiveDate::from_ymd_opt(2024, 5, 1)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap(),
            };
            execute_command(command, &arguments, &context)
        }
    }

    #[test]
    fn index_returns_stats() {
        let fixture = Fixture::new();
        let value = fixture
            .run(COMMAND_INDEX, vec![json!("/nb"), json!({"force": "1"})])
            .unwrap()
            .unwrap();
        assert_eq!(value["sourceCount"], json!(1));
        assert_eq!(fixture.store.notebook().index_count(), 1);
    }

    #[test]
    fn lenient_booleans() {
        for (raw, expected) in [
            (json!(true), true),
            (json!("true"), true),
            (json!("TRUE"), true),
            (json!(1), true),
            (json!("1"), true),
            (json!(false), false),
            (json!("yes"), false),
            (json!(0), false),
        ] {
            let options: IndexCommandOptions =
                serde_json::from_value(json!({ "force": raw })).unwrap();
            assert_eq!(options.force, expected, "{raw}");
        }
    }

    #[test]
    fn malformed_arguments_are_invalid_params() {
        let fixture = Fixture::new();
        for arguments in [
            vec![],
            vec![json!(42)],
            vec![json!("/nb"), json!("force")],
            vec![json!("/nb"), json!({"extra": {"key": ["not", "a", "string"]}})],
        ] {
            let err = fixture.run(COMMAND_NEW, arguments).unwrap_err();
            assert_eq!(err.code, tower_lsp::jsonrpc::ErrorCode::InvalidParams);
        }
        let err = fixture.run("zettel.unknown", vec![json!("/nb")]).unwrap_err();
        assert_eq!(err.code, tower_lsp::jsonrpc::ErrorCode::InvalidParams);
    }

    #[test]
    fn collaborator_failures_are_internal_errors() {
        let fixture = Fixture::new();
        let err = fixture.run(COMMAND_INDEX, vec![json!("/elsewhere")]).unwrap_err();
        assert_eq!(err.code, tower_lsp::jsonrpc::ErrorCode::InternalError);

        let err = fixture
            .run(COMMAND_NEW, vec![json!("/nb"), json!({"date": "someday maybe"})])
            .unwrap_err();
        assert_eq!(err.code, tower_lsp::jsonrpc::ErrorCode::InternalError);
    }

    #[test]
    fn out_of_range_dates_are_request_errors() {
        let fixture = Fixture::new();
        for date in ["in 100000000 weeks", "100000000 weeks ago"] {
            let err = fixture
                .run(COMMAND_NEW, vec![json!("/nb"), json!({"title": "Far", "date": date})])
                .unwrap_err();
            assert_eq!(err.code, tower_lsp::jsonrpc::ErrorCode::InternalError);
            assert!(err.message.contains("date"));
        }
        assert_eq!(fixture.store.notebook().note_count(), 1);
    }

    #[test]
    fn new_note_is_idempotent() {
        let fixture = Fixture::new();
        let arguments = vec![json!("/nb"), json!({"title": "Fresh Idea", "dir": "ideas"})];

        let first = fixture.run(COMMAND_NEW, arguments.clone()).unwrap().unwrap();
        assert_eq!(first, json!({"path": "/nb/ideas/fresh-idea.md"}));
        let count = fixture.store.notebook().note_count();

        let second = fixture.run(COMMAND_NEW, arguments).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(fixture.store.notebook().note_count(), count);
    }

    #[test]
    fn absolute_directories_are_made_relative() {
        let fixture = Fixture::new();
        let value = fixture
            .run(
                COMMAND_NEW,
                vec![json!("/nb"), json!({"title": "Deep", "dir": "/nb/journal"})],
            )
            .unwrap()
            .unwrap();
        assert_eq!(value, json!({"path": "/nb/journal/deep.md"}));
    }

    #[test]
    fn inserts_link_and_shows_the_note() {
        let mut fixture = Fixture::new();
        let uri = Url::parse("file:///nb/journal/today.md").unwrap();
        let range = Range::new(Position::new(0, 0), Position::new(0, 9));
        fixture
            .run(
                COMMAND_NEW,
                vec![
                    json!("/nb"),
                    json!({
                        "title": "Some Idea",
                        "edit": "true",
                        "insertLinkAtLocation": {"uri": uri, "range": range},
                    }),
                ],
            )
            .unwrap();

        match fixture.receiver.try_recv().unwrap() {
            ClientMessage::ApplyEdit(edit) => {
                let changes = edit.changes.unwrap();
                assert_eq!(
                    changes[&uri],
                    vec![TextEdit::new(range, "[Some Idea](../some-idea)".into())]
                );
            }
            other => panic!("unexpected message {other:?}"),
        }
        match fixture.receiver.try_recv().unwrap() {
            ClientMessage::ShowDocument(params) => {
                assert_eq!(params.uri.as_str(), "file:///nb/some-idea.md");
                assert_eq!(params.take_focus, Some(true));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn link_insertion_needs_an_open_document() {
        let fixture = Fixture::new();
        let err = fixture
            .run(
                COMMAND_NEW,
                vec![
                    json!("/nb"),
                    json!({
                        "title": "Orphan",
                        "insertLinkAtLocation": {
                            "uri": "file:///nb/closed.md",
                            "range": Range::default(),
                        },
                    }),
                ],
            )
            .unwrap_err();
        assert!(err.message.contains("can't insert link"));
    }
}
