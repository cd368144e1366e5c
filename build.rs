use std::path::{Path, PathBuf};
use std::process::Command;

const MAX_LINES: usize = 750;

const CHECKED_EXTENSIONS: &[&str] = &["rs", "yaml", "toml"];

const EXCLUDED_DIRS: &[&str] = &["target", ".git", "examples"];

const EXCLUDED_FILES: &[&str] = &["Cargo.lock"];

/// One offending line: (path relative to the crate root, 1-based line, message).
type Violation = (PathBuf, usize, String);

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/main");

    let sha = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=SURVEY_GIT_SHA={}", sha);

    let root = PathBuf::from(
        std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set"),
    );
    let files = collect_files_to_check(&root);
    for file in &files {
        println!("cargo:rerun-if-changed={}", file.display());
    }
    let sources: Vec<(PathBuf, String)> = files
        .iter()
        .filter(|p| {
            p.extension().and_then(|e| e.to_str()) == Some("rs")
                && p.file_name().and_then(|n| n.to_str()) != Some("build.rs")
        })
        .filter_map(|p| {
            let content = std::fs::read_to_string(p).ok()?;
            Some((p.strip_prefix(&root).unwrap_or(p).to_path_buf(), content))
        })
        .collect();

    enforce_line_limits(&root, &files);
    report(
        "#[allow(dead_code)] IS NOT ALLOWED",
        &find_dead_code_allows(&sources),
        &[
            "Delete unused code instead of silencing the warning.",
            "Code only needed by tests belongs behind #[cfg(test)].",
        ],
    );
    report(
        "ENV MUTATIONS REQUIRE #[serial]",
        &find_unserialized_env_tests(&sources),
        &[
            "Tests calling std::env::set_var or remove_var change global state.",
            "Add `use serial_test::serial;` and mark the test #[serial].",
        ],
    );
    report(
        "SILENT TEST SKIPS ARE NOT ALLOWED",
        &find_test_skips(&sources),
        &["A test that cannot run must fail, not return early."],
    );
}

fn report(title: &str, violations: &[Violation], advice: &[&str]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n========================================");
    eprintln!("{}", title);
    eprintln!("========================================");
    for (path, line, message) in violations {
        eprintln!("  {}:{}", path.display(), line);
        eprintln!("    {}", message);
    }
    eprintln!("========================================");
    for line in advice {
        eprintln!("{}", line);
    }
    eprintln!();
    panic!("Build failed: {} ({} occurrence(s))", title, violations.len());
}

fn enforce_line_limits(root: &Path, files: &[PathBuf]) {
    let violations: Vec<Violation> = files
        .iter()
        .filter_map(|file| {
            let content = std::fs::read_to_string(file).ok()?;
            let lines = content.lines().filter(|l| !l.trim().is_empty()).count();
            (lines > MAX_LINES).then(|| {
                (
                    file.strip_prefix(root).unwrap_or(file).to_path_buf(),
                    lines,
                    format!("{} non-empty lines (max {})", lines, MAX_LINES),
                )
            })
        })
        .collect();
    report(
        "FILE LINE LIMIT EXCEEDED",
        &violations,
        &["Split these files into smaller modules."],
    );
}

fn find_dead_code_allows(sources: &[(PathBuf, String)]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (path, content) in sources {
        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if (trimmed.starts_with("#[allow(") || trimmed.starts_with("#![allow("))
                && trimmed.contains("dead_code")
            {
                violations.push((path.clone(), i + 1, trimmed.to_string()));
            }
        }
    }
    violations
}

/// Test function bodies as (first line, name, lines, has #[serial]).
fn test_functions(content: &str) -> Vec<(usize, String, Vec<&str>, bool)> {
    let lines: Vec<&str> = content.lines().collect();
    let mut tests = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed != "#[test]" && !trimmed.starts_with("#[tokio::test") {
            i += 1;
            continue;
        }
        let start = i;
        let mut serial = false;
        let mut body = Vec::new();
        let mut depth = 0i32;
        let mut opened = false;
        let mut name = String::new();
        // Attributes directly above the test count too
        if start > 0 && lines[start - 1].trim().ends_with("serial]") {
            serial = true;
        }
        while i < lines.len() {
            let line = lines[i];
            if line.trim().ends_with("serial]") {
                serial = true;
            }
            if name.is_empty() {
                if let Some(pos) = line.find("fn ") {
                    let after = &line[pos + 3..];
                    name = after.split('(').next().unwrap_or_default().trim().to_string();
                }
            }
            for c in line.chars() {
                match c {
                    '{' => {
                        depth += 1;
                        opened = true;
                    }
                    '}' => depth -= 1,
                    _ => {}
                }
            }
            body.push(line);
            i += 1;
            if opened && depth <= 0 {
                break;
            }
        }
        tests.push((start + 1, name, body, serial));
    }
    tests
}

fn find_unserialized_env_tests(sources: &[(PathBuf, String)]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (path, content) in sources {
        for (line, name, body, serial) in test_functions(content) {
            let mutates = body.iter().any(|l| {
                let t = l.trim();
                !t.starts_with("//")
                    && (t.contains("env::set_var") || t.contains("env::remove_var"))
            });
            if mutates && !serial {
                violations.push((
                    path.clone(),
                    line,
                    format!("test `{}` mutates env without #[serial]", name),
                ));
            }
        }
    }
    violations
}

fn find_test_skips(sources: &[(PathBuf, String)]) -> Vec<Violation> {
    let patterns = ["Skipping test", "skipping test", "Test skipped", "test skipped"];
    let mut violations = Vec::new();
    for (path, content) in sources {
        for (line, name, body, _) in test_functions(content) {
            let skips = body
                .iter()
                .any(|l| patterns.iter().any(|p| l.contains(p)) || l.trim() == "return;");
            if skips {
                violations.push((
                    path.clone(),
                    line,
                    format!("test `{}` returns early or skips", name),
                ));
            }
        }
    }
    violations
}

fn collect_files_to_check(root: &Path) -> Vec<PathBuf> {
    if let Ok(output) = Command::new("git")
        .args(["ls-files"])
        .current_dir(root)
        .output()
    {
        if output.status.success() {
            if let Ok(stdout) = String::from_utf8(output.stdout) {
                let files: Vec<PathBuf> = stdout
                    .lines()
                    .map(|line| root.join(line))
                    .filter(|path| should_check_file(path, root))
                    .collect();
                if !files.is_empty() {
                    return files;
                }
            }
        }
    }

    let mut files = Vec::new();
    walk_directory(root, root, &mut files);
    files
}

fn walk_directory(dir: &Path, root: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            let excluded = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| EXCLUDED_DIRS.contains(&name));
            if !excluded {
                walk_directory(&path, root, files);
            }
        } else if should_check_file(&path, root) {
            files.push(path);
        }
    }
}

fn should_check_file(path: &Path, root: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    if !CHECKED_EXTENSIONS.contains(&ext) {
        return false;
    }
    let Ok(rel_path) = path.strip_prefix(root) else {
        return true;
    };
    if EXCLUDED_FILES.contains(&rel_path.to_string_lossy().as_ref()) {
        return false;
    }
    !rel_path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
    })
}
