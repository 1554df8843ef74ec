use super::resolve::{resolve_field, resolve_method};
use super::spot_in;
use crate::index::{Location, ProjectIndex};
use crate::model::Position;
use crate::parser::spot::Spot;
use crate::project::FileId;
use tokio_util::sync::CancellationToken;

/// Where the symbol under the cursor is declared. Several locations come back when a
/// class is declared by more than one file or a member by more than one candidate.
pub async fn definition(
    index: &ProjectIndex,
    file: &FileId,
    position: Position,
    cancel: &CancellationToken,
) -> Vec<Location> {
    let Some((_, spot)) = spot_in(index, file, position).await else {
        return Vec::new();
    };
    let mut locations = match spot {
        Spot::String(_) => Vec::new(),
        Spot::Type(ty) => match ty.class_identifier() {
            Some(identifier) => index
                .find_classes(identifier, cancel)
                .await
                .into_iter()
                .map(|(file, class)| Location::new(file, class.name.range()))
                .collect(),
            None => Vec::new(),
        },
        Spot::FieldDefinition(field) => vec![Location::new(file.clone(), field.name.range)],
        Spot::MethodDefinition(method) => vec![Location::new(file.clone(), method.name.range)],
        Spot::FieldReference(reference) => {
            resolve_field(index, &reference.owner.raw(), &reference.field, cancel)
                .await
                .into_iter()
                .map(|d| Location::new(d.file, d.member.name.range))
                .collect()
        }
        Spot::MethodReference(reference) => {
            resolve_method(index, &reference.owner.raw(), &reference.method, cancel)
                .await
                .into_iter()
                .map(|d| Location::new(d.file, d.member.name.range))
                .collect()
        }
        Spot::Label(label) => label
            .definition
            .map(|range| Location::new(file.clone(), range))
            .into_iter()
            .collect(),
    };
    locations.sort();
    locations.dedup();
    locations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::model::Range;
    use crate::project::MemoryProject;
    use std::sync::Arc;

    const BASE: &str = "\
.class public Lp/Base;
.super Ljava/lang/Object;
.field protected count:I
.method public run()V
    return-void
.end method
";
    const CHILD: &str = "\
.class public Lp/Child;
.super Lp/Base;
.method public go()V
    iget v0, p0, Lp/Child;->count:I
    invoke-virtual {p0}, Lp/Child;->run()V
    if-eqz v0, :done
    :done
    return-void
.end method
";

    async fn loaded() -> ProjectIndex {
        let project = MemoryProject::with_files([("p/Base.smali", BASE), ("p/Child.smali", CHILD)]);
        let index = ProjectIndex::new(Arc::new(project), IndexConfig::default());
        index.load_project(&CancellationToken::new()).await.unwrap();
        index
    }

    fn at(line: usize, start: usize, end: usize) -> Range {
        Range::new(Position::new(line, start), Position::new(line, end))
    }

    #[tokio::test]
    async fn inherited_members_resolve_to_the_base_class() {
        let index = loaded().await;
        let cancel = CancellationToken::new();
        let child = FileId::new("p/Child.smali");
        let base = FileId::new("p/Base.smali");

        let field = definition(&index, &child, Position::new(3, 30), &cancel).await;
        assert_eq!(field, vec![Location::new(base.clone(), at(2, 17, 22))]);

        let method = definition(&index, &child, Position::new(4, 38), &cancel).await;
        assert_eq!(method, vec![Location::new(base.clone(), at(3, 15, 18))]);

        let ty = definition(&index, &child, Position::new(1, 9), &cancel).await;
        assert_eq!(ty, vec![Location::new(base, at(0, 14, 22))]);
    }

    #[tokio::test]
    async fn labels_jump_to_their_line() {
        let index = loaded().await;
        let found = definition(
            &index,
            &FileId::new("p/Child.smali"),
            Position::new(5, 16),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].range.start_line, 6);
    }

    #[tokio::test]
    async fn framework_types_have_no_definition() {
        let index = loaded().await;
        let found = definition(
            &index,
            &FileId::new("p/Base.smali"),
            Position::new(1, 10),
            &CancellationToken::new(),
        )
        .await;
        assert!(found.is_empty());
    }
}
