//! Host toolchain locations, configured per OS family.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cipherforge_targets::{HostOs, TargetId};

use crate::manifest::ConfigError;

/// Grouping of the per-platform tool sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub windows: WindowsTools,
    pub android: AndroidTools,
    pub apple: AppleTools,
}

/// Perl executable name on Windows.
pub const PERL_EXE: &str = "perl.exe";
/// Windows command interpreter used to run generated `.bat` scripts.
pub const CMD_EXE: &str = "cmd.exe";

/// Visual Studio and MSYS2 install locations.
///
/// Windows builds can use Visual Studio, MinGW, or both. The OpenSSL
/// Configure script is perl: Visual Studio builds need a Windows-oriented
/// perl (Strawberry or ActivePerl), MinGW builds need the MSYS2 perl.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowsTools {
    pub msys2_install_directory: String,
    pub visual_studio_install: String,
    pub sdk_install: String,
    pub sdk_lib_version: String,
    pub perl_install_directory: String,
}

impl Default for WindowsTools {
    fn default() -> Self {
        Self {
            msys2_install_directory: String::new(),
            visual_studio_install:
                "C:\\Program Files (x86)\\Microsoft Visual Studio\\2019\\Community\\VC".to_owned(),
            sdk_install: "C:\\Program Files (x86)\\Windows Kits\\10".to_owned(),
            sdk_lib_version: "10.0.18362.0".to_owned(),
            perl_install_directory: String::new(),
        }
    }
}

impl WindowsTools {
    /// The MinGW-w64 toolchain root inside the MSYS2 install.
    pub fn mingw_install_directory(&self) -> PathBuf {
        Path::new(&self.msys2_install_directory).join("mingw64")
    }

    /// MSYS2's `usr/bin`, home of its POSIX tools.
    pub fn msys2_usr_bin(&self) -> PathBuf {
        Path::new(&self.msys2_install_directory).join("usr").join("bin")
    }

    /// The MSYS2 (Linux-oriented) perl.
    pub fn msys2_perl(&self) -> PathBuf {
        self.msys2_usr_bin().join(PERL_EXE)
    }

    /// `env.exe`, the entry point for running commands under MSYS2 bash.
    pub fn msys2_exec(&self) -> PathBuf {
        self.msys2_usr_bin().join("env.exe")
    }

    /// PATH value giving generated MinGW scripts the MSYS2 and MinGW bins.
    pub fn mingw_bin_path(&self) -> String {
        format!(
            "{};{}",
            self.msys2_usr_bin().display(),
            self.mingw_install_directory().join("bin").display()
        )
    }

    /// The Visual Studio environment bootstrap file (`vcvars64.bat`).
    pub fn vstudio_env_file(&self) -> PathBuf {
        Path::new(&self.visual_studio_install)
            .join("Auxiliary")
            .join("Build")
            .join("vcvars64.bat")
    }

    /// The Windows-oriented perl used for Visual Studio builds.
    pub fn windows_perl(&self) -> PathBuf {
        Path::new(&self.perl_install_directory).join("bin").join(PERL_EXE)
    }

    /// Root of the Windows SDK libraries for the configured version.
    pub fn sdk_lib_path(&self) -> PathBuf {
        Path::new(&self.sdk_install).join("Lib").join(&self.sdk_lib_version)
    }
}

/// Android SDK/NDK locations. The NDK version may be left empty to pick
/// the newest installed one at verification time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AndroidTools {
    pub windows_sdk_location: String,
    pub linux_sdk_location: String,
    pub macos_sdk_location: String,
    pub ndk_version: String,
    pub minimum_sdk: u32,
}

impl Default for AndroidTools {
    fn default() -> Self {
        Self {
            windows_sdk_location: String::new(),
            linux_sdk_location: String::new(),
            macos_sdk_location: String::new(),
            ndk_version: "21.3.6528147".to_owned(),
            minimum_sdk: 23,
        }
    }
}

impl AndroidTools {
    /// The SDK location configured for the given host.
    pub fn sdk_location(&self, host: HostOs) -> &str {
        match host {
            HostOs::Linux => &self.linux_sdk_location,
            HostOs::Windows => &self.windows_sdk_location,
            HostOs::Mac => &self.macos_sdk_location,
        }
    }

    /// `<sdk>/ndk/<version>` for the configured (or resolved) version.
    pub fn ndk_root(&self, host: HostOs) -> PathBuf {
        Path::new(self.sdk_location(host))
            .join("ndk")
            .join(&self.ndk_version)
    }

    /// Whether the configured NDK is r22 or later. Starting with r22 the
    /// required PATH for tool usage simplified and `-fuse-ld=bfd` is no
    /// longer needed.
    ///
    /// # Errors
    /// Returns an error if the version string is not `major.minor.micro`.
    pub fn r22_or_later(&self) -> Result<bool, ConfigError> {
        if self.ndk_version.is_empty() {
            return Ok(false);
        }
        let tokens: Vec<&str> = self.ndk_version.split('.').collect();
        let major = tokens.first().and_then(|t| t.parse::<u32>().ok());
        match (tokens.len(), major) {
            (3, Some(major)) => Ok(major >= 22),
            _ => Err(ConfigError::InvalidNdkVersion {
                version: self.ndk_version.clone(),
            }),
        }
    }
}

/// Xcode platform SDK locations for Apple builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppleTools {
    pub platforms_location: String,
    pub sdk_version_minimum: String,
}

impl Default for AppleTools {
    fn default() -> Self {
        Self {
            platforms_location: "/Applications/Xcode.app/Contents/Developer".to_owned(),
            sdk_version_minimum: "14".to_owned(),
        }
    }
}

impl AppleTools {
    /// Xcode platform name for an Apple target, `None` for other targets.
    pub fn platform_name(id: TargetId) -> Option<&'static str> {
        match id {
            TargetId::IosX64 => Some("iPhoneSimulator"),
            TargetId::IosArm64 => Some("iPhoneOS"),
            TargetId::MacosX64 => Some("MacOSX"),
            _ => None,
        }
    }

    /// The platform's Developer directory inside the Xcode install.
    pub fn cross_path(&self, platform: &str) -> String {
        format!("{}/Platforms/{platform}.platform/Developer", self.platforms_location)
    }

    /// The default Xcode toolchain bin directory.
    pub fn toolchain_path(&self) -> String {
        format!(
            "{}/Toolchains/XcodeDefault.xctoolchain/usr/bin",
            self.platforms_location
        )
    }

    /// Compiler options every Apple build requires: `-isysroot` pointing
    /// at the platform SDK, plus the minimum OS version for iOS targets.
    pub fn sdk_options(&self, id: TargetId) -> Vec<String> {
        let Some(platform) = Self::platform_name(id) else {
            return Vec::new();
        };
        let mut options = vec![format!(
            "-isysroot {}/SDKs/{platform}.sdk",
            self.cross_path(platform)
        )];
        if id != TargetId::MacosX64 {
            options.push(format!("-miphoneos-version-min={}", self.sdk_version_minimum));
        }
        options
    }
}
