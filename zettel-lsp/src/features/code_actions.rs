use lsp_types::{CodeAction, CodeActionKind, CodeActionOrCommand, Command, Location, Range};
use serde_json::{json, Value};
use zettel_analysis::{DocumentError, OpenDocument};

use super::commands::COMMAND_NEW;

/// Actions turning the selected text into a new note, linked in place of the
/// selection. Nothing is offered for an empty selection.
pub fn new_note_actions(
    document: &OpenDocument,
    range: Range,
) -> Result<Vec<CodeActionOrCommand>, DocumentError> {
    if range.start == range.end {
        return Ok(Vec::new());
    }
    let title = document.content_at_range(range)?;
    let wd = document
        .path
        .parent()
        .map(|dir| dir.display().to_string())
        .unwrap_or_default();
    let location = Location::new(document.uri.clone(), range);

    Ok(vec![
        new_note_action("New note in current directory", &wd, title, Some(&wd), &location),
        new_note_action("New note in top directory", &wd, title, None, &location),
    ])
}

fn new_note_action(
    label: &str,
    wd: &str,
    title: &str,
    dir: Option<&str>,
    location: &Location,
) -> CodeActionOrCommand {
    let mut options = json!({
        "title": title,
        "insertLinkAtLocation": location,
    });
    if let (Some(dir), Value::Object(map)) = (dir, &mut options) {
        map.insert("dir".to_string(), json!(dir));
    }
    CodeActionOrCommand::CodeAction(CodeAction {
        title: label.to_string(),
        kind: Some(CodeActionKind::REFACTOR),
        command: Some(Command {
            title: label.to_string(),
            command: COMMAND_NEW.to_string(),
            arguments: Some(vec![json!(wd), options]),
        }),
        ..CodeAction::default()
    })
}
