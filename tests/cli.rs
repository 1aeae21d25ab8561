mod common;

use common::TestSite;

fn site() -> TestSite {
    let site = TestSite::new();
    site.seed_template(&[
        ("index.html.liquid", "<html>\n  <title>{{ site.title }}</title>\n</html>\n"),
        ("css/style.css", "a{color:red}"),
        ("template-tools/setup.sh", "#!/bin/sh\n"),
    ]);
    site.seed_project(&[("css/style.css", "a{color:blue}"), ("notes.txt", "mine")]);
    site.write_config("title = \"Demo\"\n");
    site
}

#[test]
fn build_adds_new_files_and_keeps_local_edits() {
    let site = site();
    let out = site.stencil_ok(&["build", "{project}"]);

    assert!(out.contains("index.html: ADD"), "output: {out}");
    assert!(out.contains("Updated 1 file(s)."), "output: {out}");
    assert!(out.contains("rerun with --force"), "output: {out}");
    assert_eq!(
        site.read_project("index.html"),
        "<html><title>Demo</title></html>\n"
    );
    assert_eq!(site.read_project("css/style.css"), "a{color:blue}");
    assert_eq!(site.read_project("notes.txt"), "mine");
    assert!(!site.project_has("template-tools"));
}

#[test]
fn build_force_overwrites_changed_files() {
    let site = site();
    let out = site.stencil_ok(&["build", "{project}", "--force"]);
    assert!(out.contains("css/style.css: OVERWRITE"), "output: {out}");
    assert_eq!(site.read_project("css/style.css"), "a{color:red}");
    assert_eq!(site.read_project("notes.txt"), "mine");
}

#[test]
fn second_build_has_nothing_to_do() {
    let site = site();
    site.stencil_ok(&["build", "{project}", "--force"]);
    let out = site.stencil_ok(&["build", "{project}", "--force"]);
    assert!(out.contains("Nothing to update."), "output: {out}");
}

#[test]
fn declined_prompt_exits_2_and_changes_nothing() {
    let site = site();
    let out = site.stencil_with_input(&["build", "{project}", "--force", "--ask"], "n\n");

    assert_eq!(out.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("css/style.css: OVERWRITE"), "stdout: {stdout}");
    assert!(stdout.contains("Continue? [y/N]"), "stdout: {stdout}");
    assert!(stdout.contains("Aborted, nothing changed."), "stdout: {stdout}");
    assert!(!site.project_has("index.html"));
    assert_eq!(site.read_project("css/style.css"), "a{color:blue}");
}

#[test]
fn accepted_prompt_applies() {
    let site = site();
    let out = site.stencil_with_input(&["build", "{project}", "--ask"], "y\n");
    assert!(out.status.success());
    assert!(site.project_has("index.html"));
}

#[test]
fn diff_writes_nothing() {
    let site = site();
    let out = site.stencil_ok(&["diff", "{project}"]);
    assert!(out.contains("css/style.css: OVERWRITE"), "output: {out}");
    assert!(out.contains("index.html: ADD"), "output: {out}");
    assert!(out.contains("1 to add, 1 to overwrite, 0 unchanged"), "output: {out}");
    assert!(!site.project_has("index.html"));
}

#[test]
fn diff_json_contract() {
    let site = site();
    let out = site.stencil_ok(&["diff", "{project}", "--format", "json"]);
    let json: serde_json::Value = serde_json::from_str(&out).expect("valid JSON output");

    assert_eq!(json["stats"]["add"].as_u64(), Some(1));
    assert_eq!(json["stats"]["changed"].as_u64(), Some(1));
    assert_eq!(json["files"]["index.html"].as_str(), Some("ADD"));
    assert_eq!(json["files"]["css/style.css"].as_str(), Some("OVERWRITE"));
    assert!(json["project"].as_str().is_some_and(|p| p.ends_with("project")));
}

#[test]
fn missing_template_fails_with_message() {
    let site = site();
    std::fs::remove_dir_all(site.template()).unwrap();
    let out = site.stencil(&["build", "{project}"]);

    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("does not exist"), "stderr: {stderr}");
    assert_eq!(site.read_project("css/style.css"), "a{color:blue}");
}

#[test]
fn invalid_config_is_reported() {
    let site = site();
    site.write_config("[build]\nbogus = 1\n");
    let out = site.stencil(&["build", "{project}"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("bogus"), "stderr: {stderr}");
}

#[cfg(unix)]
#[test]
fn hooks_run_in_staging_with_project_path() {
    let site = site();
    site.write_config(
        "title = \"Demo\"\npre_build = [\"echo <PROJECT> > from-hook.txt\"]\npost_build = [\"false\"]\n",
    );
    let out = site.stencil_ok(&["build", "{project}"]);
    assert!(out.contains("from-hook.txt: ADD"), "output: {out}");
    let recorded = site.read_project("from-hook.txt");
    assert_eq!(recorded.trim(), site.project().to_string_lossy());
}

#[cfg(unix)]
#[test]
fn abort_policy_stops_on_failed_hook() {
    let site = site();
    site.write_config("pre_build = [\"exit 3\"]\n[hooks]\non_failure = \"abort\"\n");
    let out = site.stencil(&["build", "{project}", "--force"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("exit code 3"), "stderr: {stderr}");
    assert!(!site.project_has("index.html"));
}

#[test]
fn batch_updates_every_project() {
    let site = site();
    let other = site.root().join("more/second");
    common::write_all(&other, &[("stencil.toml", "title = \"Two\"\n")]);

    let out = site.stencil_ok(&["batch", ".", "--yes"]);
    assert!(out.contains("Summary:"), "output: {out}");
    assert_eq!(
        std::fs::read_to_string(other.join("index.html")).unwrap(),
        "<html><title>Two</title></html>\n"
    );
    assert!(site.project_has("index.html"));
}
