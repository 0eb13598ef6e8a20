//! App files loaded from disk.

use std::io::Write;

use apptheory_constructs::config::{load_config, synthesize_file, ValidationError};
use apptheory_constructs::ConfigError;

mod common;

fn write_app(source: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(source.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_app_from_disk() {
    let file = write_app(common::FULL_APP);
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.constructs.len(), 18);

    let from_disk = synthesize_file(file.path()).unwrap().to_json().unwrap();
    let in_memory = common::synth(common::FULL_APP).to_json().unwrap();
    assert_eq!(from_disk, in_memory);
}

#[test]
fn test_reference_errors_are_all_reported() {
    let file = write_app(
        r#"
        [stack]
        name = "shop"
        region = "us-east-1"

        [[constructs]]
        type = "queue"
        id = "jobs"
        consumers = ["worker"]
        producers = ["api"]

        [[constructs]]
        type = "mcp_server"
        id = "mcp"
        handler = "jobs"
        "#,
    );
    match load_config(file.path()) {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 3);
            assert!(errors
                .iter()
                .all(|e| matches!(e, ValidationError::UnresolvedReference { .. })));
        }
        other => panic!("expected validation errors, got {other:?}"),
    }
}

#[test]
fn test_synthesis_error_is_wrapped() {
    let file = write_app(
        r#"
        [stack]
        name = "shop"
        region = "us-east-1"

        [[constructs]]
        type = "table"
        id = "orders"
        "#,
    );
    assert!(matches!(synthesize_file(file.path()), Err(ConfigError::Synth(_))));
}
