//! Host platform detection in release naming (`linux_amd64`, `darwin_arm64`)

use std::fmt;

/// An operating system / architecture pair as used in release file names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Operating system (linux, darwin, windows, freebsd, ...)
    pub os: String,
    /// Architecture (amd64, arm64, 386, arm)
    pub arch: String,
}

impl Platform {
    /// Create a new platform
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this process runs on
    pub fn current() -> Self {
        Self::from_rust(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map Rust's `std::env::consts` names to release names
    pub fn from_rust(os: &str, arch: &str) -> Self {
        let os = match os {
            "macos" => "darwin",
            other => other,
        };
        let arch = match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self::new(os, arch)
    }

    /// Name of the terraform executable on this platform
    pub fn binary_name(&self) -> &'static str {
        if self.os == "windows" {
            "terraform.exe"
        } else {
            "terraform"
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_rust_names() {
        assert_eq!(Platform::from_rust("macos", "aarch64").to_string(), "darwin_arm64");
        assert_eq!(Platform::from_rust("linux", "x86_64").to_string(), "linux_amd64");
        assert_eq!(Platform::from_rust("windows", "x86").to_string(), "windows_386");
    }

    #[test]
    fn binary_name_per_os() {
        assert_eq!(Platform::new("windows", "amd64").binary_name(), "terraform.exe");
        assert_eq!(Platform::new("linux", "amd64").binary_name(), "terraform");
    }

    #[test]
    fn current_is_not_empty() {
        let platform = Platform::current();
        assert!(!platform.os.is_empty());
        assert!(!platform.arch.is_empty());
    }
}
