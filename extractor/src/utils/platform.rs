//! Which release asset fits the running machine.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    Mac,
    Unknown(String),
}

/// CPU architectures the published binaries are built for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Architecture {
    X64,
    X86,
    Armv7l,
    Aarch64,
    Unknown(String),
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::Mac => "macos",
            Platform::Unknown(os) => os,
        };
        f.write_str(name)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Architecture::X64 => "x64",
            Architecture::X86 => "x86",
            Architecture::Armv7l => "armv7l",
            Architecture::Aarch64 => "aarch64",
            Architecture::Unknown(arch) => arch,
        };
        f.write_str(name)
    }
}

impl Platform {
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Maps a `std::env::consts::OS` value.
    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Platform::Windows,
            "linux" => Platform::Linux,
            "macos" => Platform::Mac,
            other => {
                #[cfg(feature = "tracing")]
                tracing::warn!("No prebuilt binaries are known for OS {}", other);

                Platform::Unknown(other.to_string())
            }
        }
    }
}

impl Architecture {
    pub fn detect() -> Self {
        Self::from_arch(std::env::consts::ARCH)
    }

    /// Maps a `std::env::consts::ARCH` value. 32-bit `arm` targets run the armv7l builds.
    pub fn from_arch(arch: &str) -> Self {
        match arch {
            "x86_64" => Architecture::X64,
            "x86" => Architecture::X86,
            "arm" | "armv7l" => Architecture::Armv7l,
            "aarch64" => Architecture::Aarch64,
            other => Architecture::Unknown(other.to_string()),
        }
    }
}
