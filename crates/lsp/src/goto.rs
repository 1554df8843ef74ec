use crate::LspServer;
use crate::util::RangeMapper;
use smaliscope_core::features;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;

pub async fn definition(
    server: &LspServer,
    params: GotoDefinitionParams,
) -> Result<Option<GotoDefinitionResponse>> {
    let uri = params.text_document_position_params.text_document.uri;
    let position = params.text_document_position_params.position;
    let Some(target) = server.locate(&uri, position).await else {
        return Ok(None);
    };
    let index = target.session.engine.index();

    let found = features::definition(index, &target.file, target.position, &target.cancel).await;
    let mut locations = RangeMapper::new(index).locations(&found).await;
    match locations.len() {
        0 => Ok(None),
        1 => Ok(locations.pop().map(GotoDefinitionResponse::Scalar)),
        _ => Ok(Some(GotoDefinitionResponse::Array(locations))),
    }
}

pub async fn references(
    server: &LspServer,
    params: ReferenceParams,
) -> Result<Option<Vec<Location>>> {
    let uri = params.text_document_position.text_document.uri;
    let position = params.text_document_position.position;
    let Some(target) = server.locate(&uri, position).await else {
        return Ok(None);
    };
    let index = target.session.engine.index();

    let found = features::references(
        index,
        &target.file,
        target.position,
        params.context.include_declaration,
        &target.cancel,
    )
    .await;
    if found.is_empty() {
        return Ok(None);
    }
    Ok(Some(RangeMapper::new(index).locations(&found).await))
}
