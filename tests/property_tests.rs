//! Property-based tests for the source patcher
//!
//! Sources are generated from random top-level function and class
//! declarations, each hiding nested declarations that must stay unexported.

use exrun::frontend::patcher::{DeclKind, ExportOrigin, Patcher};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Item {
    Function { name: String, is_async: bool },
    Class { name: String },
}

impl Item {
    fn name(&self) -> &str {
        match self {
            Item::Function { name, .. } | Item::Class { name } => name,
        }
    }

    fn render(&self, index: usize) -> String {
        match self {
            Item::Function { name, is_async } => format!(
                "{}function {name}() {{\n  function inner_{index}() {{ return '{{'; }}\n  class Local_{index} {{}}\n  return inner_{index}();\n}}\n",
                if *is_async { "async " } else { "" }
            ),
            Item::Class { name } => format!(
                "class {name} {{\n  method() {{\n    function hidden_{index}() {{}}\n    return `class Fake_{index} {{}}`;\n  }}\n}}\n"
            ),
        }
    }
}

fn item() -> impl Strategy<Value = Item> {
    prop_oneof![
        ("[a-z][a-z0-9_]{0,8}", any::<bool>()).prop_map(|(name, is_async)| Item::Function {
            name: format!("f_{name}"),
            is_async
        }),
        "[A-Z][a-z0-9]{0,8}".prop_map(|name| Item::Class {
            name: format!("K{name}")
        }),
    ]
}

/// Items with unique names.
fn items() -> impl Strategy<Value = Vec<Item>> {
    prop::collection::vec(item(), 0..12).prop_map(|items| {
        let mut seen = std::collections::HashSet::new();
        items
            .into_iter()
            .filter(|item| seen.insert(item.name().to_string()))
            .collect()
    })
}

fn render(items: &[Item]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| item.render(i))
        .collect::<Vec<_>>()
        .join("\n")
}

proptest! {
    /// N functions and M classes yield exactly N + M exports, in source order.
    #[test]
    fn exports_every_top_level_declaration(items in items()) {
        let source = render(&items);
        let patched = Patcher::new("/work").patch(&source);

        let names: Vec<&str> = patched.declarations.iter().map(|d| d.name.as_str()).collect();
        let expected: Vec<&str> = items.iter().map(Item::name).collect();
        prop_assert_eq!(names, expected);

        for (declaration, item) in patched.declarations.iter().zip(&items) {
            prop_assert_eq!(declaration.origin, ExportOrigin::Patched);
            match item {
                Item::Function { is_async, .. } => {
                    prop_assert_eq!(declaration.kind, DeclKind::Function { is_async: *is_async })
                }
                Item::Class { .. } => prop_assert_eq!(declaration.kind, DeclKind::Class),
            }
        }
        prop_assert_eq!(patched.text.matches("export ").count(), items.len());
    }

    /// Nested declarations are never exported.
    #[test]
    fn nested_declarations_stay_private(items in items()) {
        let source = render(&items);
        let patched = Patcher::new("/work").patch(&source);

        for i in 0..items.len() {
            for nested in [
                format!("export function inner_{i}"),
                format!("export class Local_{i}"),
                format!("export function hidden_{i}"),
                format!("export class Fake_{i}"),
            ] {
                prop_assert!(!patched.text.contains(&nested), "exported nested declaration: {}", nested);
            }
        }
    }

    /// Removing the inserted markers gives back the source.
    #[test]
    fn patching_only_inserts_markers(items in items()) {
        let source = render(&items);
        let patched = Patcher::new("/work").patch(&source);
        prop_assert_eq!(patched.text.replace("export ", ""), source);
    }

    /// Sources without declarations pass through unchanged.
    #[test]
    fn declaration_free_source_is_unchanged(body in "[ =+;0-9\n]{0,80}") {
        let source = format!("let value = 1;\nvalue = value{body}");
        let patched = Patcher::new("/work").patch(&source);
        prop_assert!(patched.declarations.is_empty());
        prop_assert_eq!(patched.text, source);
    }
}
