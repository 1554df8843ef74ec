use crate::LspServer;
use crate::util::{RangeMapper, file_to_uri};
use smaliscope_core::features::{self, RenameEdits};
use smaliscope_core::index::ProjectIndex;
use std::collections::HashMap;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;

pub async fn rename(server: &LspServer, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
    let uri = params.text_document_position.text_document.uri;
    let position = params.text_document_position.position;
    let Some(target) = server.locate(&uri, position).await else {
        return Ok(None);
    };
    let index = target.session.engine.index();

    let edits = features::rename(
        index,
        &target.file,
        target.position,
        &params.new_name,
        &target.cancel,
    )
    .await
    .map_err(|e| Error::invalid_params(e.to_string()))?;
    Ok(Some(to_workspace_edit(index, edits).await))
}

async fn to_workspace_edit(index: &ProjectIndex, edits: RenameEdits) -> WorkspaceEdit {
    let mut mapper = RangeMapper::new(index);
    let mut text_edits: HashMap<Url, Vec<TextEdit>> = HashMap::new();
    for (file, file_edits) in &edits.edits {
        let Some(uri) = file_to_uri(file) else {
            continue;
        };
        for edit in file_edits {
            if let Some(range) = mapper.range(file, edit.range).await {
                text_edits.entry(uri.clone()).or_default().push(TextEdit {
                    range,
                    new_text: edit.new_text.clone(),
                });
            }
        }
    }

    if edits.file_renames.is_empty() {
        return WorkspaceEdit {
            changes: Some(text_edits),
            ..Default::default()
        };
    }

    // File moves need document changes, applied after the text edits.
    let mut operations: Vec<DocumentChangeOperation> = text_edits
        .into_iter()
        .map(|(uri, edits)| {
            DocumentChangeOperation::Edit(TextDocumentEdit {
                text_document: OptionalVersionedTextDocumentIdentifier { uri, version: None },
                edits: edits.into_iter().map(OneOf::Left).collect(),
            })
        })
        .collect();
    for (from, to) in &edits.file_renames {
        if let (Some(old_uri), Some(new_uri)) = (file_to_uri(from), file_to_uri(to)) {
            operations.push(DocumentChangeOperation::Op(ResourceOp::Rename(RenameFile {
                old_uri,
                new_uri,
                options: None,
                annotation_id: None,
            })));
        }
    }
    WorkspaceEdit {
        document_changes: Some(DocumentChanges::Operations(operations)),
        ..Default::default()
    }
}
