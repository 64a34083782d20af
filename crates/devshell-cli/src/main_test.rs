// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;

#[rstest]
fn test_absolute_includes() {
    let cwd = Path::new("/work/project");
    let includes = vec![
        "shared.devshell.yaml".to_string(),
        "/etc/devshell/base.devshell.yaml".to_string(),
        "~/defaults.devshell.yaml".to_string(),
    ];

    assert_eq!(
        absolute_includes(&includes, cwd),
        vec![
            "/work/project/shared.devshell.yaml",
            "/etc/devshell/base.devshell.yaml",
            "~/defaults.devshell.yaml",
        ]
    );
}

#[rstest]
fn test_parse_eval_flags() {
    let opt = Opt::try_parse_from([
        "devshell",
        "-vv",
        "eval",
        "--platform",
        "aarch64-darwin",
        "-i",
        "extra.devshell.yaml",
        "--format",
        "json",
    ])
    .expect("flags should parse");

    assert_eq!(opt.logging.verbose, 2);
    assert!(matches!(opt.cmd, Command::Eval(_)));
}

#[rstest]
fn test_reject_unknown_platform() {
    let result = Opt::try_parse_from(["devshell", "eval", "--platform", "sparc-solaris"]);
    assert!(result.is_err());
}

#[rstest]
fn test_lock_path_beside_start() {
    let tmp = TempDir::new().unwrap();
    let spec = tmp.path().join("rust.devshell.yaml");
    std::fs::write(&spec, "api: devshell/v0\n").unwrap();

    let flags = DiscoveryFlags {
        file: spec,
        inherit: false,
        no_inherit: false,
        includes: Vec::new(),
    };
    assert_eq!(
        flags.lock_path(),
        tmp.path().join(devshell::DEVSHELL_LOCK_FILENAME)
    );

    let flags = DiscoveryFlags {
        file: tmp.path().to_path_buf(),
        ..flags
    };
    assert_eq!(
        flags.lock_path(),
        tmp.path().join(devshell::DEVSHELL_LOCK_FILENAME)
    );
}

#[rstest]
fn test_discover_and_merge() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join(devshell::DEVSHELL_FILENAME),
        "api: devshell/v0\nshell:\n  tools: [cargo]\n",
    )
    .unwrap();

    let flags = DiscoveryFlags {
        file: tmp.path().to_path_buf(),
        inherit: false,
        no_inherit: true,
        includes: Vec::new(),
    };
    let merged = flags.merged().unwrap();
    assert_eq!(merged.tools, vec!["cargo"]);
}
