// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use rstest::{fixture, rstest};

use super::*;

fn locator(url: &str, rev: &str) -> Locator {
    Locator {
        url: url.to_string(),
        rev: rev.to_string(),
    }
}

#[fixture]
fn registry() -> SourceRegistry {
    let mut decls = BTreeMap::new();
    decls.insert(
        "pkgs".to_string(),
        locator("https://github.com/example/pkgs", "a1b2c3"),
    );
    decls.insert(
        "rust-overlay".to_string(),
        locator("https://github.com/example/rust-overlay", "d4e5f6"),
    );
    SourceRegistry::from_decls(&decls).expect("Should build registry")
}

#[rstest]
fn test_resolve_known_source(registry: SourceRegistry) {
    let source = registry.resolve("pkgs").expect("Should resolve");
    assert_eq!(source.name, "pkgs");
    assert_eq!(source.locator.rev, "a1b2c3");
    assert_eq!(registry.len(), 2);
}

#[rstest]
fn test_resolve_unknown_source_suggests(registry: SourceRegistry) {
    let err = registry.resolve("pkg").unwrap_err();
    match err {
        Error::UnknownSource { name, similar } => {
            assert_eq!(name, "pkg");
            assert_eq!(similar, vec!["pkgs".to_string()]);
        }
        other => panic!("Expected UnknownSource, got {other:?}"),
    }
}

#[rstest]
fn test_resolve_unknown_source_without_suggestion(registry: SourceRegistry) {
    let err = registry.resolve("haskell-updates").unwrap_err();
    assert!(matches!(err, Error::UnknownSource { similar, .. } if similar.is_empty()));
}

#[rstest]
#[case("", "abc")]
#[case("https://example.com/pkgs", "")]
#[case("https://example.com/pkgs", "   ")]
fn test_unpinned_source_rejected(#[case] url: &str, #[case] rev: &str) {
    let mut decls = BTreeMap::new();
    decls.insert("pkgs".to_string(), locator(url, rev));
    let err = SourceRegistry::from_decls(&decls).unwrap_err();
    assert!(matches!(err, Error::ValidationFailed(_)));
}

#[rstest]
fn test_locator_display() {
    let l = locator("https://github.com/example/pkgs", "a1b2c3");
    assert_eq!(l.to_string(), "https://github.com/example/pkgs?rev=a1b2c3");
}
