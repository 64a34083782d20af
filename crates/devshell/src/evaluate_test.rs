// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;
use crate::compose::DEFAULT_LIBRARY_PATH_VAR;
use crate::package::PackageRef;
use crate::platform::{Arch, Os};
use crate::source::Locator;
use crate::spec::{OverlaySpec, ToolchainDecl};

const LINUX: Platform = Platform {
    arch: Arch::X86_64,
    os: Os::Linux,
};
const DARWIN: Platform = Platform {
    arch: Arch::Aarch64,
    os: Os::Darwin,
};

fn locator(url: &str) -> Locator {
    Locator {
        url: url.to_string(),
        rev: "a1b2c3".to_string(),
    }
}

fn packages(entries: Vec<(&str, PackageEntry)>) -> IndexMap<String, PackageEntry> {
    entries
        .into_iter()
        .map(|(name, entry)| (name.to_string(), entry))
        .collect()
}

fn version(v: &str) -> PackageEntry {
    PackageEntry::Version(v.to_string())
}

#[fixture]
fn spec() -> MergedSpec {
    let mut spec = MergedSpec::new();
    spec.sources
        .insert("pkgs".to_string(), locator("https://github.com/example/pkgs"));
    spec.platforms = vec![LINUX, DARWIN];
    spec.base_source = Some("pkgs".to_string());
    spec.base_packages = packages(vec![
        ("openssl", version("3.0.13")),
        ("zlib", version("1.3.1")),
        ("cargo", version("1.79.0")),
    ]);
    spec.tools = vec!["cargo".to_string()];
    spec.link_deps = vec!["openssl".to_string(), "zlib".to_string()];
    spec
}

#[rstest]
fn test_evaluate_platform_builds_descriptor(spec: MergedSpec) {
    let descriptor = evaluate_platform(&spec, LINUX).unwrap();

    let names: Vec<_> = descriptor.package_names().collect();
    assert_eq!(names, vec!["cargo", "openssl", "zlib"]);
    for dep in &spec.link_deps {
        assert!(descriptor.contains(dep));
    }

    let lib_paths: Vec<_> = descriptor.variables[DEFAULT_LIBRARY_PATH_VAR]
        .split(':')
        .map(PathBuf::from)
        .collect();
    let expected: Vec<_> = descriptor
        .build_inputs
        .iter()
        .map(|p| p.out_path.join("lib"))
        .collect();
    assert_eq!(lib_paths, expected);
}

#[rstest]
fn test_evaluation_is_deterministic(spec: MergedSpec) {
    let evaluator = ShellEvaluator::new(spec).unwrap();
    assert_eq!(
        evaluator.packages(LINUX).unwrap(),
        evaluator.packages(LINUX).unwrap()
    );
}

#[rstest]
fn test_platforms_are_isolated(mut spec: MergedSpec) {
    spec.environment = vec![crate::EnvOp::Set(crate::environment::SetEnv {
        set: "ZLIB_DIR".to_string(),
        value: "${pkgs.zlib}".to_string(),
    })];
    let evaluator = ShellEvaluator::new(spec).unwrap();
    let all = evaluator.evaluate_all().unwrap();

    let order: Vec<_> = all.keys().copied().collect();
    assert_eq!(order, vec![LINUX, DARWIN]);

    let linux = &all[&LINUX];
    let darwin = &all[&DARWIN];
    assert_ne!(linux.variables["ZLIB_DIR"], darwin.variables["ZLIB_DIR"]);
    assert_eq!(linux, &evaluator.evaluate(LINUX).unwrap());
    assert_eq!(darwin, &evaluator.evaluate(DARWIN).unwrap());
}

#[rstest]
fn test_unknown_source_yields_no_descriptor(mut spec: MergedSpec) {
    spec.base_source = Some("pkgz".to_string());

    let err = evaluate_all(&spec).unwrap_err();
    match &err {
        Error::PlatformEvaluation { platform, .. } => assert_eq!(*platform, LINUX),
        other => panic!("expected PlatformEvaluation, got {other:?}"),
    }
    match err.root() {
        Error::UnknownSource { name, similar } => {
            assert_eq!(name, "pkgz");
            assert_eq!(similar, &vec!["pkgs".to_string()]);
        }
        other => panic!("expected UnknownSource, got {other:?}"),
    }
}

#[rstest]
fn test_overlays_apply_in_order(mut spec: MergedSpec) {
    spec.overlays = vec![
        OverlaySpec {
            name: "a".to_string(),
            source: None,
            packages: packages(vec![("openssl", version("1"))]),
        },
        OverlaySpec {
            name: "b".to_string(),
            source: None,
            packages: packages(vec![("openssl", version("2"))]),
        },
    ];
    let forward = ShellEvaluator::new(spec.clone()).unwrap();
    assert_eq!(forward.packages(LINUX).unwrap().get("openssl").unwrap().version, "2");

    spec.overlays.reverse();
    let reversed = ShellEvaluator::new(spec).unwrap();
    assert_eq!(reversed.packages(LINUX).unwrap().get("openssl").unwrap().version, "1");
}

#[rstest]
fn test_override_from_prev_keeps_source(mut spec: MergedSpec) {
    spec.overlays = vec![OverlaySpec {
        name: "pins".to_string(),
        source: None,
        packages: packages(vec![(
            "openssl",
            PackageEntry::Def(PackageDef {
                from: Some(PackageRef::prev("openssl")),
                version: Some("3.1.4".to_string()),
                ..Default::default()
            }),
        )]),
    }];
    let set = ShellEvaluator::new(spec).unwrap().packages(LINUX).unwrap();
    let openssl = set.get("openssl").unwrap();

    assert_eq!(openssl.version, "3.1.4");
    assert_eq!(openssl.source.as_ref().unwrap().name, "pkgs");
    assert!(openssl.out_path.to_string_lossy().ends_with("-openssl-3.1.4"));
}

#[rstest]
fn test_depends_on_final_sees_later_overlay(mut spec: MergedSpec) {
    spec.overlays = vec![
        OverlaySpec {
            name: "tools".to_string(),
            source: None,
            packages: packages(vec![(
                "curl",
                PackageEntry::Def(PackageDef {
                    version: Some("8.8.0".to_string()),
                    depends: vec![PackageRef::final_("openssl")],
                    ..Default::default()
                }),
            )]),
        },
        OverlaySpec {
            name: "pins".to_string(),
            source: None,
            packages: packages(vec![("openssl", version("3.3.0"))]),
        },
    ];
    let set = ShellEvaluator::new(spec).unwrap().packages(LINUX).unwrap();
    let curl = set.get("curl").unwrap();
    assert_eq!(curl.depends, vec![set.get("openssl").unwrap().out_path.clone()]);
    assert!(curl.depends[0].to_string_lossy().ends_with("-openssl-3.3.0"));
}

#[rstest]
fn test_base_cannot_read_prev(mut spec: MergedSpec) {
    spec.base_packages.insert(
        "libssl".to_string(),
        PackageEntry::Def(PackageDef {
            from: Some(PackageRef::prev("openssl")),
            ..Default::default()
        }),
    );
    let err = evaluate_platform(&spec, LINUX).unwrap_err();
    assert!(matches!(err.root(), Error::OverlayResolution { .. }));
}

#[rstest]
fn test_platform_restricted_package(mut spec: MergedSpec) {
    spec.base_packages.insert(
        "darwin-only".to_string(),
        PackageEntry::Def(PackageDef {
            version: Some("1".to_string()),
            platforms: vec![DARWIN],
            ..Default::default()
        }),
    );
    let evaluator = ShellEvaluator::new(spec).unwrap();
    assert!(!evaluator.packages(LINUX).unwrap().contains("darwin-only"));
    assert!(evaluator.packages(DARWIN).unwrap().contains("darwin-only"));
}

#[rstest]
fn test_toolchain_package(mut spec: MergedSpec) {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("rust-toolchain.toml");
    std::fs::write(
        &file,
        "[toolchain]\nchannel = \"1.79.0\"\ncomponents = [\"rustfmt\", \"clippy\"]\n",
    )
    .unwrap();

    spec.sources.insert(
        "rust-overlay".to_string(),
        locator("https://github.com/example/rust-overlay"),
    );
    spec.toolchain = Some(ToolchainDecl {
        file,
        package: Some("rust-toolchain".to_string()),
        source: Some("rust-overlay".to_string()),
    });
    spec.tools.push("rust-toolchain".to_string());

    let evaluator = ShellEvaluator::new(spec).unwrap();
    let set = evaluator.packages(LINUX).unwrap();
    let rust = set.get("rust-toolchain").unwrap();

    assert_eq!(rust.version, "1.79.0");
    assert_eq!(rust.source.as_ref().unwrap().name, "rust-overlay");
    assert_eq!(rust.meta["toolchain.components"], "rustfmt,clippy");
    assert!(evaluator.evaluate(LINUX).unwrap().contains("rust-toolchain"));
}

#[rstest]
fn test_missing_toolchain_file(mut spec: MergedSpec) {
    let tmp = TempDir::new().unwrap();
    spec.toolchain = Some(ToolchainDecl {
        file: tmp.path().join("rust-toolchain.toml"),
        package: None,
        source: None,
    });
    let err = ShellEvaluator::new(spec).unwrap_err();
    assert!(matches!(err, Error::MissingToolchainFile { .. }));
}

#[rstest]
fn test_toolchain_package_without_toolchain(mut spec: MergedSpec) {
    spec.base_packages.insert(
        "rust".to_string(),
        PackageEntry::Def(PackageDef {
            toolchain: true,
            ..Default::default()
        }),
    );
    let err = evaluate_platform(&spec, LINUX).unwrap_err();
    assert!(matches!(err.root(), Error::ValidationFailed(_)));
}

#[rstest]
fn test_missing_tool_names_shell(mut spec: MergedSpec) {
    spec.tools.push("rust-analyzer".to_string());
    let err = evaluate_platform(&spec, LINUX).unwrap_err();
    match err.root() {
        Error::OverlayResolution {
            reference,
            required_by,
            ..
        } => {
            assert_eq!(reference, "rust-analyzer");
            assert_eq!(required_by, "shell tools");
        }
        other => panic!("expected OverlayResolution, got {other:?}"),
    }
}

#[rstest]
fn test_default_platform(mut spec: MergedSpec) {
    spec.default_platform = Some(DARWIN);
    let evaluator = ShellEvaluator::new(spec.clone()).unwrap();
    assert_eq!(evaluator.default_platform().unwrap(), DARWIN);

    spec.platforms = vec![LINUX];
    let evaluator = ShellEvaluator::new(spec).unwrap();
    assert!(evaluator.default_platform().is_err());
}

#[rstest]
fn test_store_dir_changes_paths(mut spec: MergedSpec) {
    let default = evaluate_platform(&spec, LINUX).unwrap();
    spec.store_dir = Some(PathBuf::from("/opt/store"));
    let custom = evaluate_platform(&spec, LINUX).unwrap();

    assert!(default.packages[0].out_path.starts_with(DEFAULT_STORE_DIR));
    assert!(custom.packages[0].out_path.starts_with("/opt/store"));
}

#[rstest]
fn test_check_platform(spec: MergedSpec) {
    let evaluator = ShellEvaluator::new(spec).unwrap();
    assert_eq!(evaluator.check_platform(DARWIN).unwrap(), DARWIN);

    let undeclared = Platform::new(Arch::Aarch64, Os::Linux);
    match evaluator.check_platform(undeclared) {
        Err(Error::ValidationFailed(msg)) => {
            assert!(msg.contains("aarch64-linux"));
            assert!(msg.contains("x86_64-linux, aarch64-darwin"));
        }
        other => panic!("expected ValidationFailed, got {other:?}"),
    }
}

#[rstest]
fn test_library_path_cannot_be_overridden(mut spec: MergedSpec) {
    spec.library_path_var = Some("DYLD_LIBRARY_PATH".to_string());
    spec.environment = vec![crate::EnvOp::Set(crate::environment::SetEnv {
        set: "DYLD_LIBRARY_PATH".to_string(),
        value: "/elsewhere".to_string(),
    })];

    let err = ShellEvaluator::new(spec.clone()).unwrap_err();
    assert!(matches!(err, Error::ValidationFailed(_)));
    assert!(evaluate_all(&spec).is_err());
}
