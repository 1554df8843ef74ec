mod common;

use common::{memory_index, position_of};
use smaliscope_core::features::{RenameEdits, rename};
use smaliscope_core::model::{DiagnosticKind, Position, Range};
use smaliscope_core::parser::parse_text;
use smaliscope_core::project::FileId;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const FOO: &str = "\
.class public Lcom/example/Foo;
.super Ljava/lang/Object;
.field private x:I
.method public bar()V
    return-void
.end method
";

const BAR: &str = "\
.class public Lcom/example/Bar;
.super Ljava/lang/Object;
.method public static read()I
    sget-object v0, Lcom/example/Foo;->x:I
    return v0
.end method
";

#[test]
fn given_minimal_class_when_parsed_then_header_and_members_are_captured() {
    let class = parse_text(FOO).unwrap();
    assert_eq!(class.name.raw(), "Lcom/example/Foo;");
    assert_eq!(class.super_class.raw(), "Ljava/lang/Object;");

    assert_eq!(class.fields.len(), 1);
    assert_eq!(class.fields[0].name.text, "x");
    assert_eq!(class.fields[0].ty.raw(), "I");
    assert_eq!(class.fields[0].range.start_line, 2);
    assert_eq!(class.fields[0].range.end_line, 2);

    assert_eq!(class.methods.len(), 1);
    let bar = &class.methods[0];
    assert_eq!(bar.name.text, "bar");
    assert!(bar.parameters.is_empty());
    assert!(bar.return_type.is_void());
    assert_eq!(bar.range.start_line, 3);
    assert_eq!(bar.full_range().end_line, 5);
}

#[test]
fn given_unchanged_text_when_parsed_twice_then_classes_are_equal() {
    let first = parse_text(FOO).unwrap();
    let second = parse_text(FOO).unwrap();
    assert!(first.same_structure(&second));
    assert_eq!(first.fields, second.fields);
    assert_eq!(first.methods, second.methods);
}

#[tokio::test]
async fn given_field_access_when_searching_the_key_then_one_exact_location() {
    let index = memory_index(&[("Foo.smali", FOO), ("Bar.smali", BAR)]).await;
    let symbol = "Lcom/example/Foo;->x:I".to_string();
    let found = index
        .find_symbol_occurrences(std::slice::from_ref(&symbol), &CancellationToken::new())
        .await;

    let locations = &found[&symbol];
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].file, FileId::new("Bar.smali"));
    let start = position_of(BAR, &symbol, 0);
    assert_eq!(
        locations[0].range,
        Range::new(start, start.translate(symbol.len()))
    );
}

#[tokio::test]
async fn given_missing_end_method_when_loaded_then_previous_class_is_kept() {
    let index = memory_index(&[("Foo.smali", FOO)]).await;
    let file = FileId::new("Foo.smali");
    let broken = ".class public Lcom/example/Foo;\n.super Ljava/lang/Object;\n\n.method public bar()V\n    return-void\n";

    let diagnostic = index
        .load_or_refresh(&file, Arc::from(broken), None)
        .unwrap_err();
    assert_eq!(diagnostic.kind, DiagnosticKind::Unterminated);
    assert_eq!(diagnostic.range.start(), Position::new(3, 0));
    assert_eq!(diagnostic.range.end(), Position::new(5, 0));

    let class = index.class(&file).await.unwrap();
    assert_eq!(class.methods.len(), 1);
    assert_eq!(class.fields.len(), 1);
    assert_eq!(index.diagnostics(&file), vec![diagnostic]);
}

const A: &str = "\
.class public LA;
.super Ljava/lang/Object;
.method public foo()V
    return-void
.end method
";
const B: &str = "\
.class public LB;
.super LA;
.method public foo()V
    invoke-super {p0}, LA;->foo()V
    return-void
.end method
";
const C: &str = "\
.class public LC;
.super LB;
";
const USER: &str = "\
.class public LUser;
.super Ljava/lang/Object;
.method public run(LA;LB;LC;)V
    invoke-virtual {p1}, LA;->foo()V
    invoke-virtual {p2}, LB;->foo()V
    invoke-virtual {p3}, LC;->foo()V
    return-void
.end method
";

fn edited_lines(edits: &RenameEdits, file: &str) -> Vec<usize> {
    edits
        .edits
        .get(&FileId::new(file))
        .map(|edits| edits.iter().map(|e| e.range.start_line).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn given_override_chain_when_renaming_the_root_then_every_declaration_and_call_changes() {
    let index = memory_index(&[
        ("A.smali", A),
        ("B.smali", B),
        ("C.smali", C),
        ("User.smali", USER),
    ])
    .await;
    let cancel = CancellationToken::new();

    let edits = rename(
        &index,
        &FileId::new("A.smali"),
        position_of(A, "foo", 0),
        "bar",
        &cancel,
    )
    .await
    .unwrap();

    assert_eq!(edited_lines(&edits, "A.smali"), vec![2]);
    assert_eq!(edited_lines(&edits, "B.smali"), vec![2, 3]);
    assert!(edited_lines(&edits, "C.smali").is_empty());
    assert_eq!(edited_lines(&edits, "User.smali"), vec![3, 4, 5]);
    assert!(edits.file_renames.is_empty());

    // Only the member name is replaced in each reference.
    let first_call = &edits.edits[&FileId::new("User.smali")][0];
    assert_eq!(first_call.range.start(), position_of(USER, "foo", 0));
    assert_eq!(first_call.new_text, "bar");

    // Starting from the call typed as `C` gives the same edits.
    let from_c = rename(
        &index,
        &FileId::new("User.smali"),
        position_of(USER, "LC;->foo", 5),
        "bar",
        &cancel,
    )
    .await
    .unwrap();
    assert_eq!(from_c, edits);
}

#[tokio::test]
async fn given_no_literal_c_call_when_renaming_then_c_forms_are_only_found_in_text() {
    let user = USER.replace("    invoke-virtual {p3}, LC;->foo()V\n", "");
    let index = memory_index(&[
        ("A.smali", A),
        ("B.smali", B),
        ("C.smali", C),
        ("User.smali", user.as_str()),
    ])
    .await;

    let edits = rename(
        &index,
        &FileId::new("B.smali"),
        position_of(B, "foo()V\n    invoke", 0),
        "bar",
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(edited_lines(&edits, "User.smali"), vec![3, 4]);
    assert!(edited_lines(&edits, "C.smali").is_empty());
}

#[tokio::test]
async fn given_constructor_when_renaming_then_it_is_rejected() {
    let with_init = format!(
        "{A}.method public constructor <init>()V\n    return-void\n.end method\n"
    );
    let index = memory_index(&[("A.smali", with_init.as_str())]).await;
    let result = rename(
        &index,
        &FileId::new("A.smali"),
        position_of(&with_init, "<init>", 1),
        "make",
        &CancellationToken::new(),
    )
    .await;
    assert!(result.is_err());
}
