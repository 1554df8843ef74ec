//! Rename edits for classes, members and labels.
//!
//! Edits are assembled from query results by pure functions so that hosts can apply
//! them however they apply workspace edits.

use super::references::{MemberFamily, field_family, method_family};
use super::spot_in;
use crate::error::{Result, SmaliscopeError};
use crate::index::{Location, ProjectIndex};
use crate::model::types::{is_identifier_char, to_class_descriptor};
use crate::model::{Position, Range, SmaliType};
use crate::parser::spot::Spot;
use crate::project::FileId;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

#[derive(Serialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TextEdit {
    pub range: Range,
    pub new_text: String,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameEdits {
    pub edits: BTreeMap<FileId, Vec<TextEdit>>,
    /// `(from, to)` moves of class files that follow a class rename.
    pub file_renames: Vec<(FileId, FileId)>,
}

impl RenameEdits {
    fn push(&mut self, file: FileId, range: Range, new_text: &str) {
        self.edits.entry(file).or_default().push(TextEdit {
            range,
            new_text: new_text.to_string(),
        });
    }

    fn normalize(mut self) -> Self {
        for edits in self.edits.values_mut() {
            edits.sort();
            edits.dedup();
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.file_renames.is_empty()
    }

    pub fn edit_count(&self) -> usize {
        self.edits.values().map(Vec::len).sum()
    }
}

/// Renames a member. Each occurrence is a full reference key such as
/// `LA;->foo()V`; only the name after `->` is replaced. Declarations are name ranges.
pub fn member_rename_edits(
    occurrences: &IndexMap<String, Vec<Location>>,
    declarations: &[Location],
    old_name: &str,
    new_name: &str,
) -> RenameEdits {
    let mut edits = RenameEdits::default();
    for (symbol, locations) in occurrences {
        let Some(arrow) = symbol.find("->") else {
            continue;
        };
        let offset = arrow + 2;
        for location in locations {
            let start = location.range.start().translate(offset);
            let range = Range::new(start, start.translate(old_name.len()));
            edits.push(location.file.clone(), range, new_name);
        }
    }
    for declaration in declarations {
        edits.push(declaration.file.clone(), declaration.range, new_name);
    }
    edits.normalize()
}

/// Renames a class. Every occurrence is a whole descriptor and is replaced by the new
/// one; each declaring file moves to the conventional path of the new name.
pub fn class_rename_edits(
    occurrences: &[Location],
    declaring_files: &[FileId],
    old_identifier: &str,
    new_identifier: &str,
) -> RenameEdits {
    let mut edits = RenameEdits::default();
    for location in occurrences {
        edits.push(location.file.clone(), location.range, new_identifier);
    }
    let old_path = SmaliType::from_descriptor(old_identifier).and_then(|ty| ty.file_path());
    let new_path = SmaliType::from_descriptor(new_identifier).and_then(|ty| ty.file_path());
    if let (Some(old_path), Some(new_path)) = (old_path, new_path) {
        for file in declaring_files {
            let target = file.relocated(&old_path, &new_path);
            if target != *file {
                edits.file_renames.push((file.clone(), target));
            }
        }
    }
    edits.normalize()
}

/// Renames a label inside its method.
pub fn label_rename_edits(file: &FileId, occurrences: &[Range], new_label: &str) -> RenameEdits {
    let mut edits = RenameEdits::default();
    for range in occurrences {
        edits.push(file.clone(), *range, new_label);
    }
    edits.normalize()
}

fn is_valid_member_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('<') && name.chars().all(is_identifier_char)
}

fn invalid_name(name: &str) -> SmaliscopeError {
    SmaliscopeError::Rename(format!("\"{name}\" is not a valid name"))
}

/// Edits that rename the symbol under the cursor to `new_name`.
pub async fn rename(
    index: &ProjectIndex,
    file: &FileId,
    position: Position,
    new_name: &str,
    cancel: &CancellationToken,
) -> Result<RenameEdits> {
    let Some((_, spot)) = spot_in(index, file, position).await else {
        return Err(SmaliscopeError::Rename(
            "Nothing that can be renamed here".to_string(),
        ));
    };

    match spot {
        Spot::String(_) => Err(SmaliscopeError::Rename(
            "String literals cannot be renamed".to_string(),
        )),
        Spot::Label(label) => {
            let bare = new_name.strip_prefix(':').unwrap_or(new_name);
            if !is_valid_member_name(bare) {
                return Err(invalid_name(new_name));
            }
            Ok(label_rename_edits(file, &label.occurrences, &format!(":{bare}")))
        }
        Spot::Type(ty) => {
            let Some(identifier) = ty.class_identifier() else {
                return Err(SmaliscopeError::Rename(format!(
                    "{} is a primitive type",
                    ty.readable()
                )));
            };
            let new_identifier =
                to_class_descriptor(new_name).ok_or_else(|| invalid_name(new_name))?;
            let declaring: Vec<FileId> = index
                .find_classes(identifier, cancel)
                .await
                .into_iter()
                .map(|(file, _)| file)
                .collect();
            if declaring.is_empty() {
                return Err(SmaliscopeError::Rename(format!(
                    "{} is not declared in this project",
                    ty.readable()
                )));
            }
            let symbols = [identifier.to_string()];
            let occurrences: Vec<Location> = index
                .find_symbol_occurrences(&symbols, cancel)
                .await
                .into_values()
                .flatten()
                .collect();
            tracing::info!(
                "Renaming {} to {} in {} places",
                identifier,
                new_identifier,
                occurrences.len()
            );
            Ok(class_rename_edits(&occurrences, &declaring, identifier, &new_identifier))
        }
        Spot::FieldReference(reference) => {
            check_member_name(new_name)?;
            let owner = reference.owner.raw();
            let family = field_family(index, &owner, &reference.field, false, cancel).await;
            member_edits(index, family, &reference.field.name.text, new_name, cancel).await
        }
        Spot::FieldDefinition(field) => {
            check_member_name(new_name)?;
            let owner = owner_of(index, file).await?;
            let family = field_family(index, &owner, &field, true, cancel).await;
            member_edits(index, family, &field.name.text, new_name, cancel).await
        }
        Spot::MethodReference(reference) => {
            check_method(reference.method.is_constructor(), new_name)?;
            let owner = reference.owner.raw();
            let family = method_family(index, &owner, &reference.method, cancel).await;
            member_edits(index, family, &reference.method.name.text, new_name, cancel).await
        }
        Spot::MethodDefinition(method) => {
            check_method(method.is_constructor(), new_name)?;
            let owner = owner_of(index, file).await?;
            let family = method_family(index, &owner, &method, cancel).await;
            member_edits(index, family, &method.name.text, new_name, cancel).await
        }
    }
}

fn check_member_name(new_name: &str) -> Result<()> {
    if is_valid_member_name(new_name) {
        Ok(())
    } else {
        Err(invalid_name(new_name))
    }
}

fn check_method(is_constructor: bool, new_name: &str) -> Result<()> {
    if is_constructor {
        return Err(SmaliscopeError::Rename(
            "Constructors are renamed with their class".to_string(),
        ));
    }
    check_member_name(new_name)
}

async fn owner_of(index: &ProjectIndex, file: &FileId) -> Result<String> {
    index
        .class(file)
        .await
        .map(|class| class.identifier().to_string())
        .ok_or_else(|| SmaliscopeError::Rename(format!("{file} does not parse")))
}

async fn member_edits(
    index: &ProjectIndex,
    family: MemberFamily,
    old_name: &str,
    new_name: &str,
    cancel: &CancellationToken,
) -> Result<RenameEdits> {
    let occurrences = family.occurrences(index, cancel).await;
    let edits = member_rename_edits(&occurrences, &family.declarations, old_name, new_name);
    tracing::info!(
        "Renaming {} to {}: {} edits in {} files",
        old_name,
        new_name,
        edits.edit_count(),
        edits.edits.len()
    );
    Ok(edits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(line: usize, start: usize, end: usize) -> Range {
        Range::new(Position::new(line, start), Position::new(line, end))
    }

    #[test]
    fn member_edits_replace_only_the_name() {
        let mut occurrences = IndexMap::new();
        occurrences.insert(
            "LA;->foo()V".to_string(),
            vec![Location::new(FileId::new("U.smali"), range(3, 25, 36))],
        );
        let declarations = [Location::new(FileId::new("A.smali"), range(3, 15, 18))];
        let edits = member_rename_edits(&occurrences, &declarations, "foo", "bar");

        assert_eq!(
            edits.edits[&FileId::new("U.smali")],
            vec![TextEdit {
                range: range(3, 30, 33),
                new_text: "bar".to_string()
            }]
        );
        assert_eq!(edits.edits[&FileId::new("A.smali")][0].range, range(3, 15, 18));
        assert!(edits.file_renames.is_empty());
    }

    #[test]
    fn class_edits_move_the_declaring_file() {
        let occurrences = [
            Location::new(FileId::new("smali/a/Foo.smali"), range(0, 14, 22)),
            Location::new(FileId::new("smali/a/Bar.smali"), range(1, 7, 15)),
        ];
        let edits = class_rename_edits(
            &occurrences,
            &[FileId::new("smali/a/Foo.smali")],
            "La/Foo;",
            "Lb/Baz;",
        );
        assert_eq!(edits.edit_count(), 2);
        assert_eq!(
            edits.file_renames,
            vec![(FileId::new("smali/a/Foo.smali"), FileId::new("smali/b/Baz.smali"))]
        );
    }

    #[test]
    fn member_names_are_validated() {
        assert!(is_valid_member_name("value$1"));
        assert!(!is_valid_member_name(""));
        assert!(!is_valid_member_name("<init>"));
        assert!(!is_valid_member_name("a b"));
    }
}
