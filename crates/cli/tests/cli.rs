use assert_cmd::Command;

fn cli() -> Command {
    let mut command = Command::cargo_bin("libra-cli").unwrap();
    command.env_remove("LIBRA_ENV").env("LIBRA_CONFIG_DIR", "/nonexistent");
    command
}

#[test]
fn indexes_lists_every_unique_constraint() {
    let output = cli().arg("indexes").assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output).unwrap();

    assert!(text.contains("review_user_book"));
    assert!(text.contains("goal_user_year"));
    assert!(text.contains("read_book_user_book"));
}

#[test]
fn openapi_prints_merged_document() {
    let output = cli().arg("openapi").assert().success().get_output().stdout.clone();
    let spec: serde_json::Value = serde_json::from_slice(&output).unwrap();

    assert_eq!(spec["info"]["title"], "LIBRA API");
    assert!(spec["paths"]["/reviews"]["post"].is_object());
    assert!(spec["paths"]["/goals/{id}/books"]["put"].is_object());
    assert!(spec["paths"]["/graphql"]["post"].is_object());
}

#[test]
fn graphql_schema_names_gateway_queries() {
    let output = cli()
        .arg("graphql-schema")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let sdl = String::from_utf8(output).unwrap();
    assert!(sdl.contains("goalWithBooks"));
    assert!(sdl.contains("BookInGoal"));
}

#[test]
fn unknown_module_fails_to_serve() {
    cli()
        .args(["serve", "--module", "books"])
        .assert()
        .failure();
}
