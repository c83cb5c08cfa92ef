// Checks on the files shipped in defaults/.

use std::path::{Path, PathBuf};

use softball_core::config::{ensure_config_files, load_config_from};

fn defaults_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("defaults")
}

#[test]
fn shipped_defaults_load_and_validate() {
    let base = std::env::temp_dir().join("softball_scaffold_defaults");
    let _ = std::fs::remove_dir_all(&base);
    let defaults = base.join("defaults");
    std::fs::create_dir_all(&defaults).unwrap();
    for entry in std::fs::read_dir(defaults_dir()).unwrap() {
        let path = entry.unwrap().path();
        std::fs::copy(&path, defaults.join(path.file_name().unwrap())).unwrap();
    }

    let copied = ensure_config_files(&base).unwrap();
    assert_eq!(copied, vec![base.join("config").join("server.toml")]);

    let config = load_config_from(&base).unwrap();
    assert_eq!(config.server.bind, "127.0.0.1");
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.db_path, "softball.db");
    // The example credentials file is not copied, so writes start disabled.
    assert_eq!(config.admin_token(), None);

    let _ = std::fs::remove_dir_all(&base);
}

#[test]
fn credentials_example_is_valid_toml() {
    let content = std::fs::read_to_string(defaults_dir().join("credentials.toml.example"))
        .expect("credentials.toml.example should exist");
    let parsed: toml::Value = toml::from_str(&content).expect("example should be valid TOML");
    assert!(parsed.get("admin_token").and_then(|v| v.as_str()).is_some());
}
