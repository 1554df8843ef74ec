use super::resolve::resolve_field;
use super::spot_in;
use crate::index::{Location, ProjectIndex};
use crate::model::{Field, Method, Position};
use crate::parser::spot::Spot;
use crate::project::FileId;
use indexmap::{IndexMap, IndexSet};
use tokio_util::sync::CancellationToken;

/// The reference keys a member is written as across its class family, and where the
/// member is declared.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemberFamily {
    pub symbols: Vec<String>,
    pub declarations: Vec<Location>,
}

impl MemberFamily {
    pub async fn occurrences(
        &self,
        index: &ProjectIndex,
        cancel: &CancellationToken,
    ) -> IndexMap<String, Vec<Location>> {
        index.find_symbol_occurrences(&self.symbols, cancel).await
    }
}

async fn with_subclasses(
    index: &ProjectIndex,
    identifiers: impl IntoIterator<Item = String>,
    cancel: &CancellationToken,
) -> IndexSet<String> {
    let mut family = IndexSet::new();
    for identifier in identifiers {
        let subclasses = index.find_subclass_identifiers(&identifier, cancel).await;
        family.insert(identifier);
        family.extend(subclasses);
    }
    family
}

/// A field is reachable through its declaring class and every subclass of it.
/// `owner` is where the field was seen; `declared_here` skips the ancestor lookup
/// when the cursor is on the declaration itself.
pub(crate) async fn field_family(
    index: &ProjectIndex,
    owner: &str,
    field: &Field,
    declared_here: bool,
    cancel: &CancellationToken,
) -> MemberFamily {
    let mut declaring: IndexSet<String> = IndexSet::new();
    if !declared_here {
        for declaration in resolve_field(index, owner, field, cancel).await {
            declaring.insert(declaration.class.identifier().to_string());
        }
    }
    if declaring.is_empty() {
        declaring.insert(owner.to_string());
    }

    let mut declarations = Vec::new();
    for identifier in &declaring {
        for (file, class) in index.find_classes(identifier, cancel).await {
            for member in class.find_fields(field) {
                declarations.push(Location::new(file.clone(), member.name.range));
            }
        }
    }

    let family = with_subclasses(index, declaring, cancel).await;
    MemberFamily {
        symbols: family.iter().map(|id| field.reference_key(id)).collect(),
        declarations,
    }
}

/// A virtual method is reachable through every class below its root declarations.
/// Private methods do not dispatch, so they never root a family above `owner`.
/// Constructors are reachable only through `owner`.
pub(crate) async fn method_family(
    index: &ProjectIndex,
    owner: &str,
    method: &Method,
    cancel: &CancellationToken,
) -> MemberFamily {
    let family: IndexSet<String> = if method.is_constructor() {
        IndexSet::from([owner.to_string()])
    } else {
        let mut roots = index
            .find_root_defining_classes(owner, method, false, cancel)
            .await;
        if roots.is_empty() {
            roots.push(owner.to_string());
        }
        with_subclasses(index, roots, cancel).await
    };

    let mut declarations = Vec::new();
    for identifier in &family {
        for (file, class) in index.find_classes(identifier, cancel).await {
            for member in class.find_methods(method) {
                declarations.push(Location::new(file.clone(), member.name.range));
            }
        }
    }
    MemberFamily {
        symbols: family.iter().map(|id| method.reference_key(id)).collect(),
        declarations,
    }
}

/// Every location the symbol under the cursor appears at.
pub async fn references(
    index: &ProjectIndex,
    file: &FileId,
    position: Position,
    include_declaration: bool,
    cancel: &CancellationToken,
) -> Vec<Location> {
    let Some((_, spot)) = spot_in(index, file, position).await else {
        return Vec::new();
    };

    let (mut found, declarations) = match spot {
        Spot::String(_) => return Vec::new(),
        Spot::Label(label) => {
            let found = label
                .occurrences
                .iter()
                .map(|range| Location::new(file.clone(), *range))
                .collect();
            let declarations = label
                .definition
                .map(|range| Location::new(file.clone(), range))
                .into_iter()
                .collect();
            (found, declarations)
        }
        Spot::Type(ty) => {
            let Some(identifier) = ty.class_identifier() else {
                return Vec::new();
            };
            let symbols = [identifier.to_string()];
            let found = index
                .find_symbol_occurrences(&symbols, cancel)
                .await
                .into_values()
                .flatten()
                .collect();
            let declarations = index
                .find_classes(identifier, cancel)
                .await
                .into_iter()
                .map(|(file, class)| Location::new(file, class.name.range()))
                .collect();
            (found, declarations)
        }
        Spot::FieldReference(reference) => {
            let owner = reference.owner.raw();
            let family = field_family(index, &owner, &reference.field, false, cancel).await;
            flatten(family, index, cancel).await
        }
        Spot::FieldDefinition(field) => {
            let Some(class) = index.class(file).await else {
                return Vec::new();
            };
            let family = field_family(index, class.identifier(), &field, true, cancel).await;
            flatten(family, index, cancel).await
        }
        Spot::MethodReference(reference) => {
            let owner = reference.owner.raw();
            let family = method_family(index, &owner, &reference.method, cancel).await;
            flatten(family, index, cancel).await
        }
        Spot::MethodDefinition(method) => {
            let Some(class) = index.class(file).await else {
                return Vec::new();
            };
            let family = method_family(index, class.identifier(), &method, cancel).await;
            flatten(family, index, cancel).await
        }
    };

    if include_declaration {
        found.extend(declarations);
    } else {
        found.retain(|location| !declarations.contains(location));
    }
    found.sort();
    found.dedup();
    found
}

async fn flatten(
    family: MemberFamily,
    index: &ProjectIndex,
    cancel: &CancellationToken,
) -> (Vec<Location>, Vec<Location>) {
    let found = family
        .occurrences(index, cancel)
        .await
        .into_values()
        .flatten()
        .collect();
    (found, family.declarations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::project::MemoryProject;
    use std::sync::Arc;

    const A: &str = "\
.class public LA;
.super Ljava/lang/Object;
.field public x:I
.method public foo()V
    return-void
.end method
";
    const B: &str = "\
.class public LB;
.super LA;
.method public foo()V
    iget v0, p0, LB;->x:I
    return-void
.end method
";
    const USER: &str = "\
.class public LUser;
.super Ljava/lang/Object;
.method public use(LA;)V
    invoke-virtual {p1}, LA;->foo()V
    iget v0, p1, LA;->x:I
    return-void
.end method
";

    async fn loaded() -> ProjectIndex {
        let project =
            MemoryProject::with_files([("A.smali", A), ("B.smali", B), ("User.smali", USER)]);
        let index = ProjectIndex::new(Arc::new(project), IndexConfig::default());
        index.load_project(&CancellationToken::new()).await.unwrap();
        index
    }

    fn files(locations: &[Location]) -> Vec<(String, usize)> {
        locations
            .iter()
            .map(|l| (l.file.to_string(), l.range.start_line))
            .collect()
    }

    #[tokio::test]
    async fn field_references_cover_subclass_owners() {
        let index = loaded().await;
        let cancel = CancellationToken::new();
        let found = references(&index, &FileId::new("A.smali"), Position::new(2, 14), true, &cancel).await;
        assert_eq!(
            files(&found),
            vec![
                ("A.smali".to_string(), 2),
                ("B.smali".to_string(), 3),
                ("User.smali".to_string(), 4)
            ]
        );
    }

    #[tokio::test]
    async fn method_references_include_overrides() {
        let index = loaded().await;
        let cancel = CancellationToken::new();
        let found = references(&index, &FileId::new("User.smali"), Position::new(3, 31), false, &cancel).await;
        assert_eq!(files(&found), vec![("User.smali".to_string(), 3)]);

        let with_declarations =
            references(&index, &FileId::new("User.smali"), Position::new(3, 31), true, &cancel).await;
        assert_eq!(
            files(&with_declarations),
            vec![
                ("A.smali".to_string(), 3),
                ("B.smali".to_string(), 2),
                ("User.smali".to_string(), 3)
            ]
        );
    }

    #[tokio::test]
    async fn type_references_find_every_descriptor() {
        let index = loaded().await;
        let found = references(
            &index,
            &FileId::new("B.smali"),
            Position::new(1, 8),
            false,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(
            files(&found),
            vec![
                ("B.smali".to_string(), 1),
                ("User.smali".to_string(), 2),
                ("User.smali".to_string(), 3),
                ("User.smali".to_string(), 4)
            ]
        );
    }

    #[tokio::test]
    async fn private_methods_stay_with_their_class() {
        let p = "\
.class LP;
.super Ljava/lang/Object;
.method private secret()V
    invoke-direct {p0}, LP;->secret()V
    return-void
.end method
";
        let q = "\
.class LQ;
.super LP;
.method private secret()V
    invoke-direct {p0}, LQ;->secret()V
    return-void
.end method
";
        let project = MemoryProject::with_files([("P.smali", p), ("Q.smali", q)]);
        let index = ProjectIndex::new(Arc::new(project), IndexConfig::default());
        index.load_project(&CancellationToken::new()).await.unwrap();

        let found = references(
            &index,
            &FileId::new("Q.smali"),
            Position::new(2, 17),
            true,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(
            files(&found),
            vec![("Q.smali".to_string(), 2), ("Q.smali".to_string(), 3)]
        );
    }
}
