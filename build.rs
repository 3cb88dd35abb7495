use std::path::{Path, PathBuf};
use std::process::Command;

const MAX_LINES: usize = 750;

const CHECKED_EXTENSIONS: &[&str] = &["rs", "md", "yaml", "toml"];

const EXCLUDED_DIRS: &[&str] = &["target", ".git", "node_modules", "examples"];

const EXCLUDED_FILES: &[&str] = &["Cargo.lock", "spec.md", "SPEC_FULL.md", "DESIGN.md"];

/// One broken source rule: path relative to the crate root, 1-based line, message.
struct Violation {
    path: PathBuf,
    line: usize,
    message: String,
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/main");
    println!("cargo:rerun-if-changed=.git/packed-refs");

    let sha = git_output(&["rev-parse", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=AGENT_FACTORY_GIT_SHA={}", sha);

    let root = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set"));
    let files = collect_files(&root);
    for file in &files {
        println!("cargo:rerun-if-changed={}", file.display());
    }

    let mut violations = Vec::new();
    for file in &files {
        let Ok(content) = std::fs::read_to_string(file) else {
            println!("cargo:warning=Could not read {}", file.display());
            continue;
        };
        let path = file.strip_prefix(&root).unwrap_or(file).to_path_buf();

        let non_empty = content.lines().filter(|l| !l.trim().is_empty()).count();
        if non_empty > MAX_LINES {
            violations.push(Violation {
                path: path.clone(),
                line: 1,
                message: format!("{} non-empty lines (max {}); split the module", non_empty, MAX_LINES),
            });
        }

        let is_rust = path.extension().and_then(|e| e.to_str()) == Some("rs");
        if is_rust && path != Path::new("build.rs") {
            check_rust_source(&path, &content, &mut violations);
        }
    }

    if !violations.is_empty() {
        eprintln!("\nsource rules violated:");
        for v in &violations {
            eprintln!("  {}:{}: {}", v.path.display(), v.line, v.message);
        }
        panic!("Build failed: {} source rule violation(s)", violations.len());
    }
}

fn git_output(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}

fn collect_files(root: &Path) -> Vec<PathBuf> {
    if let Some(listing) = git_output(&["-C", &root.to_string_lossy(), "ls-files"]) {
        if !listing.is_empty() {
            return listing
                .lines()
                .map(|line| root.join(line))
                .filter(|path| path.is_file() && is_checked(path, root))
                .collect();
        }
    }
    let mut files = Vec::new();
    walk(root, root, &mut files);
    files
}

fn walk(dir: &Path, root: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|e| e.path()) {
        let excluded = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| EXCLUDED_DIRS.contains(&n));
        if path.is_dir() && !excluded {
            walk(&path, root, files);
        } else if is_checked(&path, root) {
            files.push(path);
        }
    }
}

fn is_checked(path: &Path, root: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    CHECKED_EXTENSIONS.contains(&ext)
        && !EXCLUDED_FILES.iter().any(|excluded| rel == Path::new(excluded))
        && !rel
            .components()
            .any(|c| c.as_os_str().to_str().is_some_and(|n| EXCLUDED_DIRS.contains(&n)))
}

/// Rust source rules:
/// - no `allow(dead_code)`;
/// - no conditional early `return;` inside a test (a silent skip);
/// - a test that mutates the environment carries `#[serial]`.
fn check_rust_source(path: &Path, content: &str, violations: &mut Vec<Violation>) {
    let mut attributes: Vec<String> = Vec::new();
    let mut test: Option<TestScan> = None;

    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        let line_no = index + 1;
        let mut report = |message: String| {
            violations.push(Violation {
                path: path.to_path_buf(),
                line: line_no,
                message,
            })
        };

        if trimmed.starts_with("#[allow(dead_code)]") || trimmed.starts_with("#![allow(dead_code)]") {
            report("allow(dead_code) hides dead code; remove the code instead".to_string());
        }

        if let Some(scan) = test.as_mut() {
            let depth_before = scan.depth;
            scan.depth += brace_delta(trimmed);
            if trimmed.starts_with("return;") && depth_before > 1 {
                report(format!("test `{}` returns early; this silently skips it", scan.name));
            }
            if (trimmed.contains("env::set_var(") || trimmed.contains("env::remove_var(")) && !scan.serial {
                report(format!("test `{}` mutates the environment without #[serial]", scan.name));
                scan.serial = true;
            }
            if scan.started && scan.depth <= 0 {
                test = None;
            } else if scan.depth > 0 {
                scan.started = true;
            }
            continue;
        }

        if trimmed.starts_with("#[") {
            attributes.push(trimmed.to_string());
            continue;
        }
        if let Some(name) = fn_name(trimmed) {
            let is_test = attributes.iter().any(|a| a == "#[test]" || a.starts_with("#[tokio::test"));
            if is_test {
                let depth = brace_delta(trimmed);
                test = Some(TestScan {
                    name,
                    serial: attributes.iter().any(|a| a.starts_with("#[serial")),
                    depth,
                    started: depth > 0,
                });
            }
        }
        if !trimmed.starts_with("///") && !trimmed.is_empty() {
            attributes.clear();
        }
    }
}

struct TestScan {
    name: String,
    serial: bool,
    depth: i64,
    started: bool,
}

fn fn_name(line: &str) -> Option<String> {
    let rest = line.strip_prefix("async fn ").or_else(|| line.strip_prefix("fn "))?;
    let end = rest.find(|c: char| !(c.is_alphanumeric() || c == '_'))?;
    rest.get(..end).map(str::to_string)
}

fn brace_delta(line: &str) -> i64 {
    let code = line.split("//").next().unwrap_or(line);
    code.chars().fold(0, |depth, c| match c {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}
