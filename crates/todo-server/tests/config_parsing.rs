use std::{env, fs};

use todo_server::config::StorageBackend;
use todo_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("todoapp.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081
body_limit_bytes = 4096

[storage]
backend = "postgres"

[lakebase]
database = "todoapp"
project_id = "todo-app"
endpoint_id = "default"
pool_size = 4

[workspace]
host = "https://ws.example.com"

[user]
email = "dev@example.com"
name = "Dev"

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.storage.backend, StorageBackend::Postgres);
    assert_eq!(cfg.lakebase.pool_size, 4);
    assert_eq!(cfg.lakebase.branch_id, "");
    assert_eq!(cfg.workspace.host, "https://ws.example.com");
    assert_eq!(cfg.user.email, "dev@example.com");
    assert_eq!(cfg.logging.level, "debug");

    // 2) Env override should win over file
    unsafe {
        env::set_var("TODOAPP__LAKEBASE__BRANCH_ID", "dev-alice");
        env::set_var("TODOAPP__SERVER__PORT", "9090");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.lakebase.branch_id, "dev-alice");
    assert_eq!(cfg_env.server.port, 9090);
    unsafe {
        env::remove_var("TODOAPP__LAKEBASE__BRANCH_ID");
        env::remove_var("TODOAPP__SERVER__PORT");
    }

    // 3) Postgres without any way to find the host should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[storage]
backend = "postgres"

[lakebase]
database = "todoapp"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("workspace.host or lakebase.host"));

    // 4) Memory backend needs nothing else
    let memory_path = dir.path().join("memory.toml");
    fs::write(&memory_path, "[storage]\nbackend = \"memory\"\n").expect("write memory toml");
    let cfg = load_config(memory_path.to_str()).expect("memory config should parse");
    assert_eq!(cfg.storage.backend, StorageBackend::Memory);
    assert_eq!(cfg.server.port, 8000);
}
