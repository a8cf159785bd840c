use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{json, Value};
use tempfile::tempdir;

fn cli_bin() -> &'static str {
    env!("CARGO_BIN_EXE_i18n-autokey")
}

fn run_cli<P: AsRef<Path>>(cwd: P, args: &[&str]) -> Output {
    Command::new(cli_bin())
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("failed to run i18n-autokey")
}

fn read_json(path: &Path) -> Value {
    let content = fs::read_to_string(path).expect("missing json file");
    serde_json::from_str(&content).expect("invalid json")
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Project with a resource document and one component under `src/view/Censor`
fn setup_project(root: &Path) -> (PathBuf, PathBuf) {
    let resource = root.join("src/lang/zh.json");
    write_file(&resource, "{\n  \"CommonText\": {\n    \"001\": \"确认\"\n  }\n}\n");

    let component = root.join("src/view/Censor/index.vue");
    write_file(
        &component,
        "<template>\n  <div>\n    <el-input placeholder=\"请输入用户名称\"></el-input>\n    <el-button>确认</el-button>\n    <el-button>取消</el-button>\n  </div>\n</template>\n\n<script>\nexport default {\n  methods: {\n    done() {\n      this.$message('保存成功请刷新');\n    }\n  }\n}\n</script>\n",
    );
    (resource, component)
}

#[test]
fn exec_rewrites_component_and_records_keys() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    let (resource, component) = setup_project(project);

    let output = run_cli(
        project,
        &[
            "exec",
            resource.to_str().unwrap(),
            project.join("src/view/Censor").to_str().unwrap(),
        ],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Files transformed: 1"));

    let rewritten = fs::read_to_string(&component).unwrap();
    assert!(rewritten.contains(":placeholder=\"$t('Censor.index.001')\""));
    assert!(rewritten.contains("<el-button>{{ $t('CommonText.001') }}</el-button>"));
    assert!(rewritten.contains("<el-button>{{ $t('CommonText.002') }}</el-button>"));
    assert!(rewritten.contains("this.$message(window.$t('Censor.index.002'))"));

    assert_eq!(
        read_json(&resource),
        json!({
            "CommonText": {"001": "确认", "002": "取消"},
            "Censor": {"index": {"001": "请输入用户名称", "002": "保存成功请刷新"}}
        })
    );
}

#[test]
fn exec_twice_is_idempotent() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    let (resource, component) = setup_project(project);
    let target = project.join("src/view/Censor");
    let args = [
        "exec",
        resource.to_str().unwrap(),
        target.to_str().unwrap(),
    ];

    assert!(run_cli(project, &args).status.success());
    let first_source = fs::read_to_string(&component).unwrap();
    let first_resource = fs::read_to_string(&resource).unwrap();

    let output = run_cli(project, &args);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No new keys added."));
    assert_eq!(fs::read_to_string(&component).unwrap(), first_source);
    assert_eq!(fs::read_to_string(&resource).unwrap(), first_resource);
}

#[test]
fn exec_dry_run_leaves_files_alone() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    let (resource, component) = setup_project(project);
    let before_source = fs::read_to_string(&component).unwrap();
    let before_resource = fs::read_to_string(&resource).unwrap();

    let output = run_cli(
        project,
        &[
            "exec",
            "--dry-run",
            resource.to_str().unwrap(),
            component.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Censor.index - added 2 new key(s)"));
    assert_eq!(fs::read_to_string(&component).unwrap(), before_source);
    assert_eq!(fs::read_to_string(&resource).unwrap(), before_resource);
}

#[test]
fn exec_fails_on_missing_or_relative_paths() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    let (resource, _) = setup_project(project);

    let missing = run_cli(
        project,
        &[
            "exec",
            resource.to_str().unwrap(),
            project.join("src/view/Nope").to_str().unwrap(),
        ],
    );
    assert!(!missing.status.success());
    assert!(String::from_utf8_lossy(&missing.stderr).contains("does not exist"));

    let relative = run_cli(project, &["exec", "src/lang/zh.json", "src/view/Censor"]);
    assert!(!relative.status.success());
    assert!(String::from_utf8_lossy(&relative.stderr).contains("absolute"));
}

#[test]
fn exec_skips_unparseable_script_and_continues() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    let resource = project.join("src/lang/zh.json");
    write_file(&resource, "{}");
    let broken = project.join("src/view/Order/broken.js");
    write_file(&broken, "const a = '这是一段说明文字';\nconst = ;\n");
    let fine = project.join("src/view/Order/fine.js");
    write_file(&fine, "const a = '这是一段说明文字';\n");

    let output = run_cli(
        project,
        &[
            "--log-level",
            "warn",
            "exec",
            resource.to_str().unwrap(),
            project.join("src/view/Order").to_str().unwrap(),
        ],
    );
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("broken.js"));
    assert_eq!(
        fs::read_to_string(&broken).unwrap(),
        "const a = '这是一段说明文字';\nconst = ;\n"
    );
    assert_eq!(
        fs::read_to_string(&fine).unwrap(),
        "const a = window.$t('Order.fine.001');\n"
    );
}

#[test]
fn exec_uses_config_function_names() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    let (resource, component) = setup_project(project);
    let config_path = project.join("i18n-autokey.json");
    write_file(
        &config_path,
        "{\n  // plain calls in scripts\n  programFunction: \"this.$t\",\n}\n",
    );

    let output = run_cli(
        project,
        &[
            "--config",
            config_path.to_str().unwrap(),
            "exec",
            resource.to_str().unwrap(),
            component.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());
    let rewritten = fs::read_to_string(&component).unwrap();
    assert!(rewritten.contains("this.$message(this.$t('Censor.index.002'))"));
}

#[test]
fn exec_setup_failure_is_returned_from_main() {
    let tmp = tempdir().unwrap();
    let project = tmp.path();
    let (resource, component) = setup_project(project);
    write_file(&resource, "{\"CommonText\": 1}");
    let before = fs::read_to_string(&component).unwrap();

    let output = run_cli(
        project,
        &["exec", resource.to_str().unwrap(), component.to_str().unwrap()],
    );
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("Error: "), "stderr: {}", stderr);
    assert!(stderr.contains("zh.json"));
    assert_eq!(fs::read_to_string(&component).unwrap(), before);
}
