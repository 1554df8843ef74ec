use crate::LspServer;
use crate::util::{RangeMapper, to_lsp_range, uri_to_file};
use smaliscope_core::features::{self, SymbolKind as CoreKind};
use smaliscope_core::model::SourceText;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;

const WORKSPACE_SYMBOL_LIMIT: usize = 256;

pub async fn document_symbol(
    server: &LspServer,
    params: DocumentSymbolParams,
) -> Result<Option<DocumentSymbolResponse>> {
    let Some(session) = server.session().await else {
        return Ok(None);
    };
    let Some(file) = uri_to_file(&params.text_document.uri) else {
        return Ok(None);
    };
    let Some(class) = session.engine.index().class(&file).await else {
        return Ok(None);
    };
    let symbols = features::document_symbols(&class)
        .into_iter()
        .map(|symbol| convert_symbol(symbol, class.source()))
        .collect();
    Ok(Some(DocumentSymbolResponse::Nested(symbols)))
}

fn convert_symbol(symbol: features::DocumentSymbol, src: &SourceText) -> DocumentSymbol {
    #[allow(deprecated)]
    DocumentSymbol {
        name: symbol.name,
        detail: symbol.detail,
        kind: to_symbol_kind(symbol.kind),
        tags: None,
        deprecated: None,
        range: to_lsp_range(src, symbol.range),
        selection_range: to_lsp_range(src, symbol.selection_range),
        children: if symbol.children.is_empty() {
            None
        } else {
            Some(
                symbol
                    .children
                    .into_iter()
                    .map(|child| convert_symbol(child, src))
                    .collect(),
            )
        },
    }
}

fn to_symbol_kind(kind: CoreKind) -> SymbolKind {
    match kind {
        CoreKind::Class => SymbolKind::CLASS,
        CoreKind::Interface => SymbolKind::INTERFACE,
        CoreKind::Field => SymbolKind::FIELD,
        CoreKind::Constructor => SymbolKind::CONSTRUCTOR,
        CoreKind::Method => SymbolKind::METHOD,
    }
}

pub async fn workspace_symbol(
    server: &LspServer,
    params: WorkspaceSymbolParams,
) -> Result<Option<Vec<SymbolInformation>>> {
    let Some(session) = server.session().await else {
        return Ok(None);
    };
    let index = session.engine.index();
    let cancel = session.engine.cancel_token().child_token();
    let found =
        features::workspace_symbols(index, &params.query, WORKSPACE_SYMBOL_LIMIT, &cancel).await;

    let mut mapper = RangeMapper::new(index);
    let mut symbols = Vec::with_capacity(found.len());
    for info in found {
        let Some(location) = mapper.location(&info.location).await else {
            continue;
        };
        #[allow(deprecated)]
        symbols.push(SymbolInformation {
            name: info.name,
            kind: to_symbol_kind(info.kind),
            tags: None,
            deprecated: None,
            location,
            container_name: info.container,
        });
    }
    Ok(Some(symbols))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_lsp() {
        assert_eq!(to_symbol_kind(CoreKind::Constructor), SymbolKind::CONSTRUCTOR);
        assert_eq!(to_symbol_kind(CoreKind::Interface), SymbolKind::INTERFACE);
    }
}
