// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use rstest::rstest;

use crate::environment::{
    AppendEnv, CommentEnv, EnvOp, PrependEnv, SetEnv, escape_value, is_valid_variable_name,
};

fn prepend(var: &str, value: &str, separator: Option<&str>) -> EnvOp {
    EnvOp::Prepend(PrependEnv {
        prepend: var.to_string(),
        value: value.to_string(),
        separator: separator.map(String::from),
    })
}

fn append(var: &str, value: &str) -> EnvOp {
    EnvOp::Append(AppendEnv {
        append: var.to_string(),
        value: value.to_string(),
        separator: None,
    })
}

fn set(var: &str, value: &str) -> EnvOp {
    EnvOp::Set(SetEnv {
        set: var.to_string(),
        value: value.to_string(),
    })
}

#[rstest]
fn test_escape_value() {
    assert_eq!(
        escape_value("value with $dollar and \"quotes\""),
        "value with \\$dollar and \\\"quotes\\\""
    );
    assert_eq!(escape_value("`cmd` \\"), "\\`cmd\\` \\\\");
}

#[rstest]
#[case("PATH", true)]
#[case("_private", true)]
#[case("OPENSSL_DIR2", true)]
#[case("", false)]
#[case("2FAST", false)]
#[case("FOO BAR", false)]
#[case("FOO;rm -rf /", false)]
#[case("A-B", false)]
fn test_variable_names(#[case] name: &str, #[case] valid: bool) {
    assert_eq!(is_valid_variable_name(name), valid);
}

#[rstest]
fn test_apply_ops_in_order() {
    let ops = vec![
        set("PKG_CONFIG_PATH", "/b"),
        prepend("PKG_CONFIG_PATH", "/a", None),
        append("PKG_CONFIG_PATH", "/c"),
        prepend("MANPATH", "/man", Some(";")),
        EnvOp::Comment(CommentEnv {
            comment: "ignored".to_string(),
        }),
    ];

    let mut vars = BTreeMap::new();
    for op in &ops {
        if let Some(value) = op.value() {
            op.apply_to(&mut vars, value.to_string());
        }
    }

    assert_eq!(vars["PKG_CONFIG_PATH"], "/a:/b:/c");
    assert_eq!(vars["MANPATH"], "/man");
    assert_eq!(vars.len(), 2);
}

#[rstest]
fn test_set_replaces_existing_value() {
    let mut vars = BTreeMap::new();
    vars.insert("RUSTFLAGS".to_string(), "-Dwarnings".to_string());
    set("RUSTFLAGS", "-Copt-level=1").apply_to(&mut vars, "-Copt-level=1".to_string());
    assert_eq!(vars["RUSTFLAGS"], "-Copt-level=1");
}

#[rstest]
fn test_parse_env_ops() {
    let yaml = r#"
- set: FOO
  value: bar
- prepend: PATH
  value: /bin
  separator: ";"
- append: LD_LIBRARY_PATH
  value: /lib
- comment: "note"
"#;
    let ops: Vec<EnvOp> = serde_yaml::from_str(yaml).expect("Should parse ops");
    assert_eq!(ops.len(), 4);
    assert_eq!(ops[0].variable(), Some("FOO"));
    assert!(matches!(&ops[1], EnvOp::Prepend(p) if p.separator.as_deref() == Some(";")));
    assert_eq!(ops[3].variable(), None);
}

#[rstest]
fn test_reject_unknown_op() {
    let yaml = "- priority: 20\n";
    assert!(serde_yaml::from_str::<Vec<EnvOp>>(yaml).is_err());
}
