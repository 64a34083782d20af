// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use tempfile::TempDir;

use super::*;

fn create_spec_file(dir: &Path, content: &str) {
    let path = dir.join(DEVSHELL_FILENAME);
    std::fs::write(path, content).expect("Failed to write spec file");
}

fn spec_with_tool(tool: &str, inherit: bool) -> String {
    format!("api: devshell/v0\ninherit: {inherit}\nshell:\n  tools:\n    - {tool}\n")
}

#[rstest]
fn test_discover_single_spec() {
    let tmp = TempDir::new().unwrap();
    create_spec_file(tmp.path(), &spec_with_tool("ripgrep", false));

    let options = DiscoveryOptions::default();
    let specs = discover_specs(tmp.path(), &options).expect("Should discover spec");

    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].shell.tools, vec!["ripgrep"]);
}

#[rstest]
fn test_discover_spec_file_path() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("rust.devshell.yaml");
    std::fs::write(&path, spec_with_tool("cargo", false)).unwrap();

    let specs = discover_specs(&path, &DiscoveryOptions::default()).expect("Should load file");
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].source_path.as_deref(), Some(path.as_path()));
}

#[rstest]
fn test_inherit_false_stops_discovery() {
    let tmp = TempDir::new().unwrap();
    let child = tmp.path().join("child");
    std::fs::create_dir(&child).unwrap();

    create_spec_file(tmp.path(), &spec_with_tool("parent-tool", false));
    create_spec_file(&child, &spec_with_tool("child-tool", false));

    let options = DiscoveryOptions::default();
    let specs = discover_specs(&child, &options).expect("Should discover spec");

    // Should only find child spec since inherit defaults to false
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].shell.tools, vec!["child-tool"]);
}

#[rstest]
fn test_inherit_true_walks_up() {
    let tmp = TempDir::new().unwrap();
    let child = tmp.path().join("child");
    std::fs::create_dir(&child).unwrap();

    create_spec_file(tmp.path(), &spec_with_tool("parent-tool", false));
    create_spec_file(&child, &spec_with_tool("child-tool", true));

    let options = DiscoveryOptions::default();
    let specs = discover_specs(&child, &options).expect("Should discover specs");

    // Parent comes first in merge order
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].shell.tools, vec!["parent-tool"]);
    assert_eq!(specs[1].shell.tools, vec!["child-tool"]);
}

#[rstest]
#[case(DiscoveryOptions { force_inherit: true, ..Default::default() }, false, 2)]
#[case(DiscoveryOptions { no_inherit: true, ..Default::default() }, true, 1)]
fn test_inherit_overrides(
    #[case] options: DiscoveryOptions,
    #[case] child_inherit: bool,
    #[case] expected: usize,
) {
    let tmp = TempDir::new().unwrap();
    let child = tmp.path().join("child");
    std::fs::create_dir(&child).unwrap();

    create_spec_file(tmp.path(), &spec_with_tool("parent-tool", false));
    create_spec_file(&child, &spec_with_tool("child-tool", child_inherit));

    let specs = discover_specs(&child, &options).expect("Should discover specs");
    assert_eq!(specs.len(), expected);
    assert_eq!(specs.last().unwrap().shell.tools, vec!["child-tool"]);
}

#[rstest]
fn test_no_inherit_requires_spec_at_start() {
    let tmp = TempDir::new().unwrap();
    let child = tmp.path().join("child");
    std::fs::create_dir(&child).unwrap();
    create_spec_file(tmp.path(), &spec_with_tool("parent-tool", false));

    let options = DiscoveryOptions {
        no_inherit: true,
        ..Default::default()
    };
    let result = discover_specs(&child, &options);
    assert!(matches!(result, Err(crate::Error::NotFoundAtPath(_))));
}

#[rstest]
fn test_not_found_error() {
    let tmp = TempDir::new().unwrap();

    let options = DiscoveryOptions::default();
    let result = discover_specs(tmp.path(), &options);

    match result {
        Err(crate::Error::NotFoundInTree(_)) => {}
        other => panic!("Expected NotFoundInTree, got: {:?}", other),
    }
}

#[rstest]
fn test_includes_come_before_including_spec() {
    let tmp = TempDir::new().unwrap();
    let shared = tmp.path().join("shared");
    let project = tmp.path().join("project");
    std::fs::create_dir(&shared).unwrap();
    std::fs::create_dir(&project).unwrap();

    std::fs::write(
        shared.join("base.devshell.yaml"),
        spec_with_tool("shared-tool", false),
    )
    .unwrap();
    create_spec_file(
        &project,
        "api: devshell/v0\nincludes:\n  - ../shared/base.devshell.yaml\nshell:\n  tools: [project-tool]\n",
    );

    let specs = discover_specs(&project, &DiscoveryOptions::default()).unwrap();
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].shell.tools, vec!["shared-tool"]);
    assert_eq!(specs[1].shell.tools, vec!["project-tool"]);
}

#[rstest]
fn test_cli_and_env_includes_go_first() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("project");
    std::fs::create_dir(&project).unwrap();
    create_spec_file(&project, &spec_with_tool("project-tool", false));

    let cli = tmp.path().join("cli.devshell.yaml");
    let env = tmp.path().join("env.devshell.yaml");
    std::fs::write(&cli, spec_with_tool("cli-tool", false)).unwrap();
    std::fs::write(&env, spec_with_tool("env-tool", false)).unwrap();

    let options = DiscoveryOptions {
        cli_includes: vec![cli.display().to_string()],
        env_includes: vec![env.display().to_string()],
        ..Default::default()
    };
    let specs = discover_specs(&project, &options).unwrap();
    let order: Vec<_> = specs.iter().map(|s| s.shell.tools[0].as_str()).collect();
    assert_eq!(order, vec!["cli-tool", "env-tool", "project-tool"]);
}

#[rstest]
fn test_circular_include_detected() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("a.devshell.yaml"),
        "api: devshell/v0\nincludes: [b.devshell.yaml]\n",
    )
    .unwrap();
    std::fs::write(
        tmp.path().join("b.devshell.yaml"),
        "api: devshell/v0\nincludes: [a.devshell.yaml]\n",
    )
    .unwrap();
    create_spec_file(tmp.path(), "api: devshell/v0\nincludes: [a.devshell.yaml]\n");

    let result = discover_specs(tmp.path(), &DiscoveryOptions::default());
    assert!(matches!(result, Err(crate::Error::CircularInclude(_))));
}

#[rstest]
fn test_shared_include_is_not_circular() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("common.devshell.yaml"),
        spec_with_tool("common", false),
    )
    .unwrap();
    std::fs::write(
        tmp.path().join("a.devshell.yaml"),
        "api: devshell/v0\nincludes: [common.devshell.yaml]\n",
    )
    .unwrap();
    create_spec_file(
        tmp.path(),
        "api: devshell/v0\nincludes: [a.devshell.yaml, common.devshell.yaml]\n",
    );

    let specs = discover_specs(tmp.path(), &DiscoveryOptions::default())
        .expect("Diamond includes should load");
    assert_eq!(specs.len(), 4);
}

#[rstest]
fn test_missing_include() {
    let tmp = TempDir::new().unwrap();
    create_spec_file(tmp.path(), "api: devshell/v0\nincludes: [missing.devshell.yaml]\n");

    let result = discover_specs(tmp.path(), &DiscoveryOptions::default());
    assert!(matches!(result, Err(crate::Error::IncludeNotFound { .. })));
}

#[rstest]
fn test_local_override() {
    let tmp = TempDir::new().unwrap();

    create_spec_file(tmp.path(), &spec_with_tool("main-tool", false));
    let local_path = tmp.path().join(DEVSHELL_LOCAL_FILENAME);
    std::fs::write(local_path, spec_with_tool("local-tool", false)).unwrap();

    let options = DiscoveryOptions::default();
    let specs = discover_specs(tmp.path(), &options).expect("Should discover specs");

    // Should find both main and local
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].shell.tools, vec!["main-tool"]);
    assert_eq!(specs[1].shell.tools, vec!["local-tool"]);
}
