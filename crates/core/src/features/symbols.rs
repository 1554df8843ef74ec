use crate::index::{Location, ProjectIndex};
use crate::model::{Class, Method, Range};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Class,
    Interface,
    Field,
    Constructor,
    Method,
}

/// One node of a document outline.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DocumentSymbol {
    pub name: String,
    pub detail: Option<String>,
    pub kind: SymbolKind,
    /// The whole declaration, bodies included.
    pub range: Range,
    pub selection_range: Range,
    pub children: Vec<DocumentSymbol>,
}

/// A workspace search hit.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    pub container: Option<String>,
    pub location: Location,
}

fn method_symbol(method: &Method) -> DocumentSymbol {
    DocumentSymbol {
        name: method.name.text.clone(),
        detail: Some(method.descriptor()),
        kind: if method.is_constructor() {
            SymbolKind::Constructor
        } else {
            SymbolKind::Method
        },
        range: method.full_range(),
        selection_range: method.name.range,
        children: Vec::new(),
    }
}

fn class_kind(class: &Class) -> SymbolKind {
    if class.is_interface() {
        SymbolKind::Interface
    } else {
        SymbolKind::Class
    }
}

/// The outline of one class: fields, then constructors, then methods.
pub fn document_symbols(class: &Class) -> Vec<DocumentSymbol> {
    let mut children: Vec<DocumentSymbol> = class
        .fields
        .iter()
        .map(|field| DocumentSymbol {
            name: field.name.text.clone(),
            detail: Some(field.ty.readable()),
            kind: SymbolKind::Field,
            range: field.range,
            selection_range: field.name.range,
            children: Vec::new(),
        })
        .collect();
    children.extend(class.constructors.iter().map(method_symbol));
    children.extend(class.methods.iter().map(method_symbol));

    let whole = class.source().range_of(0, class.source().len());
    vec![DocumentSymbol {
        name: class.name.readable(),
        detail: class.source_file_name().map(str::to_string),
        kind: class_kind(class),
        range: whole,
        selection_range: class.name.range(),
        children,
    }]
}

/// Classes and members whose name contains `query`, ignoring case. An empty query
/// matches everything. At most `limit` results.
pub async fn workspace_symbols(
    index: &ProjectIndex,
    query: &str,
    limit: usize,
    cancel: &CancellationToken,
) -> Vec<SymbolInfo> {
    index.wait_ready().await;
    let query = query.to_lowercase();
    let matches = |name: &str| name.to_lowercase().contains(&query);
    let mut found = Vec::new();

    for file in index.known_files() {
        if cancel.is_cancelled() || found.len() >= limit {
            break;
        }
        let Some(class) = index.class(&file).await else {
            continue;
        };
        let class_name = class.name.readable();
        if matches(&class_name) {
            found.push(SymbolInfo {
                name: class_name.clone(),
                kind: class_kind(&class),
                container: None,
                location: Location::new(file.clone(), class.name.range()),
            });
        }
        for field in class.fields.iter().filter(|f| matches(&f.name.text)) {
            found.push(SymbolInfo {
                name: field.name.text.clone(),
                kind: SymbolKind::Field,
                container: Some(class_name.clone()),
                location: Location::new(file.clone(), field.name.range),
            });
        }
        for method in class.methods.iter().filter(|m| matches(&m.name.text)) {
            found.push(SymbolInfo {
                name: method.name.text.clone(),
                kind: SymbolKind::Method,
                container: Some(class_name.clone()),
                location: Location::new(file.clone(), method.name.range),
            });
        }
    }
    found.truncate(limit);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::parser::parse_text;
    use crate::project::MemoryProject;
    use std::sync::Arc;

    const FOO: &str = "\
.class public Lcom/example/Foo;
.super Ljava/lang/Object;
.field private count:I
.method public constructor <init>()V
    return-void
.end method
.method public countAll()I
    const/4 v0, 0x0
    return v0
.end method
";

    #[test]
    fn outline_groups_members_under_the_class() {
        let class = parse_text(FOO).unwrap();
        let symbols = document_symbols(&class);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "com.example.Foo");
        let kinds: Vec<SymbolKind> = symbols[0].children.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![SymbolKind::Field, SymbolKind::Constructor, SymbolKind::Method]
        );
        assert_eq!(symbols[0].children[2].range.end_line, 9);
    }

    #[tokio::test]
    async fn search_matches_members_case_insensitively() {
        let project = MemoryProject::with_files([("Foo.smali", FOO)]);
        let index = ProjectIndex::new(Arc::new(project), IndexConfig::default());
        index.load_project(&CancellationToken::new()).await.unwrap();
        let cancel = CancellationToken::new();

        let hits = workspace_symbols(&index, "COUNT", 10, &cancel).await;
        let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["count", "countAll"]);
        assert_eq!(hits[0].container.as_deref(), Some("com.example.Foo"));

        assert_eq!(workspace_symbols(&index, "", 1, &cancel).await.len(), 1);
    }
}
