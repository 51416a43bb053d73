use clap::Parser;
use kernel::Cli;
use std::fs;
use std::path::PathBuf;

#[test]
fn test_root_and_entries() {
    let cli = Cli::try_parse_from(["offmain", "site", "./src/a.js", "./src/b.js"]).unwrap();
    assert_eq!(cli.root, PathBuf::from("site"));
    assert_eq!(cli.entries, vec!["./src/a.js", "./src/b.js"]);
    assert!(cli.config.is_none());
}

#[test]
fn test_entries_are_required() {
    assert!(Cli::try_parse_from(["offmain", "site"]).is_err());
    assert!(Cli::try_parse_from(["offmain"]).is_err());
}

#[test]
fn test_explicit_config_file_wins() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("offmain.toml"), "amd_function_name = \"__found\"\n").unwrap();
    let explicit = dir.path().join("custom.toml");
    fs::write(&explicit, "amd_function_name = \"__chosen\"\n").unwrap();
    let root = dir.path().to_str().unwrap();

    let discovered = Cli::try_parse_from(["offmain", root, "./main.js"]).unwrap();
    assert_eq!(discovered.load_config().unwrap().amd_function_name, "__found");

    let chosen = Cli::try_parse_from(["offmain", "--config", explicit.to_str().unwrap(), root, "./main.js"]).unwrap();
    assert_eq!(chosen.load_config().unwrap().amd_function_name, "__chosen");

    let missing = Cli::try_parse_from(["offmain", "-C", "/nonexistent/offmain.toml", root, "./main.js"]).unwrap();
    assert!(missing.load_config().is_err());
}
