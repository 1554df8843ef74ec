use crate::LspServer;
use crate::util::RangeMapper;
use smaliscope_core::features;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;

pub async fn hover(server: &LspServer, params: HoverParams) -> Result<Option<Hover>> {
    let uri = params.text_document_position_params.text_document.uri;
    let position = params.text_document_position_params.position;
    let Some(target) = server.locate(&uri, position).await else {
        return Ok(None);
    };
    let index = target.session.engine.index();

    let Some(info) = features::hover(index, &target.file, target.position, &target.cancel).await
    else {
        return Ok(None);
    };
    let range = RangeMapper::new(index).range(&target.file, info.range).await;
    Ok(Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: format!("```java\n{}\n```", info.contents),
        }),
        range,
    }))
}
