//! Integration tests for tfinstall

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// A command isolated from the user's config and cache
    fn tfinstall(home: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("tfinstall");
        cmd.env("TFINSTALL_CONFIG", home.path().join("config.toml"))
            .env("TFINSTALL_WORK_DIR", home.path().join("work"));
        cmd
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        tfinstall(&home)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Terraform binaries"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        tfinstall(&home)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("tfinstall"));
    }

    #[test]
    fn invalid_selector_fails_with_hint() {
        let home = TempDir::new().unwrap();
        tfinstall(&home)
            .args(["find", "???"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid selector"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn config_path_honours_override() {
        let home = TempDir::new().unwrap();
        tfinstall(&home)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let home = TempDir::new().unwrap();
        tfinstall(&home)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"))
            .stdout(predicate::str::contains("[install]"));
    }

    #[test]
    fn malformed_config_is_reported() {
        let home = TempDir::new().unwrap();
        std::fs::write(home.path().join("config.toml"), "[install\n").unwrap();
        tfinstall(&home)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn cache_list_empty() {
        let home = TempDir::new().unwrap();
        tfinstall(&home)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached binaries"));
    }

    #[test]
    fn cache_list_json_empty() {
        let home = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        tfinstall(&home)
            .args(["cache", "list", "--format", "json", "--work-dir"])
            .arg(work.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn cache_clear_empty() {
        let home = TempDir::new().unwrap();
        tfinstall(&home)
            .args(["cache", "clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached binaries to clear"));
    }

    #[test]
    fn completions_generate() {
        let home = TempDir::new().unwrap();
        tfinstall(&home)
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("tfinstall"));
    }
}

#[cfg(unix)]
mod source_build_tests {
    use assert_cmd::cargo::cargo_bin_cmd;
    use predicates::prelude::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::process::Command as StdCommand;
    use tempfile::TempDir;

    fn git_available() -> bool {
        StdCommand::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn sh_git(dir: &Path, args: &[&str]) {
        let status = StdCommand::new("git")
            .args(["-c", "user.email=test@example.com", "-c", "user.name=test"])
            .args(["-c", "init.defaultBranch=main", "-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {:?} failed", args);
    }

    /// Fake `go` whose "binary" reports the VERSION file of the checkout
    fn write_fake_go(path: &Path) {
        let script = r#"#!/bin/sh
if [ "$1" = "version" ]; then echo "go version go1.22.0 linux/amd64"; exit 0; fi
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
v=$(cat VERSION)
mkdir -p "$(dirname "$out")"
printf '#!/bin/sh\necho "Terraform v%s"\n' "$v" > "$out"
chmod 755 "$out"
"#;
        std::fs::write(path, script).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    struct Fixture {
        home: TempDir,
        upstream: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let home = TempDir::new().unwrap();
            let go = home.path().join("fake-go");
            write_fake_go(&go);
            std::fs::write(
                home.path().join("config.toml"),
                format!("[install]\ngo_binary = {:?}\n", go.display().to_string()),
            )
            .unwrap();

            let upstream = TempDir::new().unwrap();
            sh_git(upstream.path(), &["init", "--quiet"]);
            std::fs::write(upstream.path().join("VERSION"), "0.12.29\n").unwrap();
            sh_git(upstream.path(), &["add", "VERSION"]);
            sh_git(upstream.path(), &["commit", "--quiet", "-m", "release"]);
            sh_git(upstream.path(), &["tag", "v0.12.29"]);
            sh_git(upstream.path(), &["branch", "v0.12"]);
            std::fs::write(upstream.path().join("VERSION"), "0.13.0-dev\n").unwrap();
            sh_git(upstream.path(), &["commit", "--quiet", "-am", "next"]);

            Self { home, upstream }
        }

        fn find(&self, git_ref: &str) -> assert_cmd::assert::Assert {
            cargo_bin_cmd!("tfinstall")
                .env("TFINSTALL_CONFIG", self.home.path().join("config.toml"))
                .env("TFINSTALL_WORK_DIR", self.home.path().join("work"))
                .args(["-v", "find", "--git-ref", git_ref, "--repo"])
                .arg(format!("file://{}", self.upstream.path().display()))
                .assert()
        }
    }

    #[test]
    fn builds_refs_and_reports_versions() {
        if !git_available() {
            return;
        }
        let fixture = Fixture::new();

        for (git_ref, expected) in [
            ("refs/heads/v0.12", "0.12."),
            ("refs/tags/v0.12.29", "0.12.29"),
            ("", "0.13.0-dev"),
        ] {
            fixture
                .find(git_ref)
                .success()
                .stdout(predicate::str::contains("terraform"))
                .stderr(predicate::str::contains(expected));
        }
    }

    #[test]
    fn second_find_is_cached() {
        if !git_available() {
            return;
        }
        let fixture = Fixture::new();

        fixture.find("refs/tags/v0.12.29").success();
        fixture
            .find("refs/tags/v0.12.29")
            .success()
            .stderr(predicate::str::contains("cached: yes"));
    }

    #[test]
    fn unknown_ref_fails_with_selector() {
        if !git_available() {
            return;
        }
        let fixture = Fixture::new();

        fixture
            .find("refs/heads/does-not-exist")
            .failure()
            .stderr(predicate::str::contains("refs/heads/does-not-exist"));
    }
}

/// Against the public Terraform repository and release server.
mod network_tests {
    use assert_cmd::cargo::cargo_bin_cmd;
    use predicates::prelude::*;
    use tempfile::TempDir;

    #[test]
    #[ignore = "requires network, git and go"]
    fn finds_upstream_refs() {
        let home = TempDir::new().unwrap();

        for (git_ref, expected) in [
            ("refs/heads/v0.12", "0.12."),
            ("refs/tags/v0.12.29", "0.12.29"),
            ("refs/pull/25633/head", "0.12.29-dev"),
            ("", "0."),
        ] {
            cargo_bin_cmd!("tfinstall")
                .env("TFINSTALL_CONFIG", home.path().join("config.toml"))
                .env("TFINSTALL_WORK_DIR", home.path().join("work"))
                .args(["-v", "find", "--git-ref", git_ref])
                .assert()
                .success()
                .stderr(predicate::str::contains(expected));
        }
    }

    #[test]
    #[ignore = "requires network"]
    fn downloads_release() {
        let home = TempDir::new().unwrap();

        cargo_bin_cmd!("tfinstall")
            .env("TFINSTALL_CONFIG", home.path().join("config.toml"))
            .env("TFINSTALL_WORK_DIR", home.path().join("work"))
            .args(["find", "--json", "1.5.7"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"version\": \"1.5.7\""));
    }
}
