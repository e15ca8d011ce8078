#![forbid(unsafe_code)]
//! Host detection and the build target catalog for Cipherforge.
//!
//! The catalog is a static data table: each target id maps to a descriptor
//! carrying its architecture, toolchain family, and the host operating
//! systems that can build it. Dispatch stays in free functions so nothing
//! here needs build machinery to test.

use std::fmt;
use std::str::FromStr;

/// Operating system families that can run a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOs {
    Linux,
    Windows,
    Mac,
}

impl HostOs {
    /// Detect the host operating system from the runtime platform.
    ///
    /// There is no degraded mode: an unrecognized platform is fatal.
    ///
    /// # Errors
    /// Returns [`TargetError::UnsupportedHost`] on any platform other
    /// than Linux, Windows, or macOS.
    pub fn query() -> Result<Self, TargetError> {
        match std::env::consts::OS {
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            "macos" => Ok(Self::Mac),
            other => Err(TargetError::UnsupportedHost {
                os: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Linux => "Linux",
            Self::Windows => "Windows",
            Self::Mac => "Mac",
        };
        f.write_str(name)
    }
}

/// One (OS, architecture, toolchain) combination the engine can produce
/// artifacts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetId {
    /// Windows, MinGW 64-bit toolchain under MSYS2.
    MingwX64,
    /// Linux x86-64 via autotools.
    LinuxX64,
    /// iOS Simulator (x86-64), macOS hosts only.
    IosX64,
    /// iOS ARM 64-bit devices, macOS hosts only.
    IosArm64,
    /// macOS 64-bit Intel.
    MacosX64,
    /// Android ARM 64-bit via the NDK, buildable on every host.
    AndroidArm64,
    /// Android x86-64 via the NDK, typically for emulators.
    AndroidX64,
    /// Windows x86-64 via the Visual Studio toolchain.
    VStudio64,
}

impl TargetId {
    /// Every target in catalog order.
    pub const ALL: [Self; 8] = [
        Self::MingwX64,
        Self::LinuxX64,
        Self::IosX64,
        Self::IosArm64,
        Self::MacosX64,
        Self::AndroidArm64,
        Self::AndroidX64,
        Self::VStudio64,
    ];

    /// The canonical camelCase name used in configuration and paths.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MingwX64 => "mingwX64",
            Self::LinuxX64 => "linuxX64",
            Self::IosX64 => "iosX64",
            Self::IosArm64 => "iosArm64",
            Self::MacosX64 => "macosX64",
            Self::AndroidArm64 => "androidArm64",
            Self::AndroidX64 => "androidX64",
            Self::VStudio64 => "vStudio64",
        }
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetId {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TargetError::InvalidTarget { name: s.to_owned() })
    }
}

/// CPU architecture family of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchFamily {
    X64,
    Arm64,
}

/// Grouping of targets that share a build strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolchainFamily {
    /// Visual Studio nmake builds.
    Msvc,
    /// MinGW-w64 under MSYS2.
    Mingw,
    /// Linux autotools.
    LinuxGnu,
    /// Android NDK cross builds.
    AndroidNdk,
    /// Apple clang against a platform SDK.
    AppleClang,
}

/// Catalog row for one build target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub id: TargetId,
    pub arch: ArchFamily,
    pub toolchain: ToolchainFamily,
    /// Host operating systems that can build this target.
    pub hosts: &'static [HostOs],
}

const ALL_HOSTS: &[HostOs] = &[HostOs::Linux, HostOs::Windows, HostOs::Mac];

const MINGW_X64: TargetDescriptor = TargetDescriptor {
    id: TargetId::MingwX64,
    arch: ArchFamily::X64,
    toolchain: ToolchainFamily::Mingw,
    hosts: &[HostOs::Windows],
};
const LINUX_X64: TargetDescriptor = TargetDescriptor {
    id: TargetId::LinuxX64,
    arch: ArchFamily::X64,
    toolchain: ToolchainFamily::LinuxGnu,
    hosts: &[HostOs::Linux],
};
const IOS_X64: TargetDescriptor = TargetDescriptor {
    id: TargetId::IosX64,
    arch: ArchFamily::X64,
    toolchain: ToolchainFamily::AppleClang,
    hosts: &[HostOs::Mac],
};
const IOS_ARM64: TargetDescriptor = TargetDescriptor {
    id: TargetId::IosArm64,
    arch: ArchFamily::Arm64,
    toolchain: ToolchainFamily::AppleClang,
    hosts: &[HostOs::Mac],
};
const MACOS_X64: TargetDescriptor = TargetDescriptor {
    id: TargetId::MacosX64,
    arch: ArchFamily::X64,
    toolchain: ToolchainFamily::AppleClang,
    hosts: &[HostOs::Mac],
};
const ANDROID_ARM64: TargetDescriptor = TargetDescriptor {
    id: TargetId::AndroidArm64,
    arch: ArchFamily::Arm64,
    toolchain: ToolchainFamily::AndroidNdk,
    hosts: ALL_HOSTS,
};
const ANDROID_X64: TargetDescriptor = TargetDescriptor {
    id: TargetId::AndroidX64,
    arch: ArchFamily::X64,
    toolchain: ToolchainFamily::AndroidNdk,
    hosts: ALL_HOSTS,
};
const VSTUDIO_64: TargetDescriptor = TargetDescriptor {
    id: TargetId::VStudio64,
    arch: ArchFamily::X64,
    toolchain: ToolchainFamily::Msvc,
    hosts: &[HostOs::Windows],
};

/// The fixed catalog of build targets.
pub const CATALOG: [&TargetDescriptor; 8] = [
    &MINGW_X64,
    &LINUX_X64,
    &IOS_X64,
    &IOS_ARM64,
    &MACOS_X64,
    &ANDROID_ARM64,
    &ANDROID_X64,
    &VSTUDIO_64,
];

/// Look up the catalog descriptor for a target.
pub fn descriptor(id: TargetId) -> &'static TargetDescriptor {
    match id {
        TargetId::MingwX64 => &MINGW_X64,
        TargetId::LinuxX64 => &LINUX_X64,
        TargetId::IosX64 => &IOS_X64,
        TargetId::IosArm64 => &IOS_ARM64,
        TargetId::MacosX64 => &MACOS_X64,
        TargetId::AndroidArm64 => &ANDROID_ARM64,
        TargetId::AndroidX64 => &ANDROID_X64,
        TargetId::VStudio64 => &VSTUDIO_64,
    }
}

/// Whether the given host can build the given target. Pure lookup.
pub fn supported_on(id: TargetId, host: HostOs) -> bool {
    descriptor(id).hosts.contains(&host)
}

/// The Android ABI name for NDK targets (`APP_ABI`), `None` otherwise.
pub fn android_abi(id: TargetId) -> Option<&'static str> {
    match id {
        TargetId::AndroidArm64 => Some("arm64-v8a"),
        TargetId::AndroidX64 => Some("x86_64"),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("unsupported host OS: {os} — builds require Linux, Windows, or macOS")]
    UnsupportedHost { os: String },

    #[error("invalid build target: {name}")]
    InvalidTarget { name: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn query_succeeds_on_supported_platforms() {
        // The test suite itself only runs on supported platforms.
        let host = HostOs::query().unwrap();
        assert!(matches!(host, HostOs::Linux | HostOs::Windows | HostOs::Mac));
    }

    #[test]
    fn target_names_round_trip() {
        for id in TargetId::ALL {
            let parsed: TargetId = id.as_str().parse().unwrap();
            assert_eq!(parsed, id);
        }
    }

    #[test]
    fn invalid_target_name_rejected() {
        assert!("linux64".parse::<TargetId>().is_err());
        assert!("LINUXX64".parse::<TargetId>().is_err());
        assert!("".parse::<TargetId>().is_err());
    }

    #[test]
    fn catalog_covers_every_target_exactly_once() {
        for id in TargetId::ALL {
            assert_eq!(CATALOG.iter().filter(|d| d.id == id).count(), 1);
            assert_eq!(descriptor(id).id, id);
        }
    }

    #[test]
    fn windows_only_targets() {
        for id in [TargetId::MingwX64, TargetId::VStudio64] {
            assert!(supported_on(id, HostOs::Windows));
            assert!(!supported_on(id, HostOs::Linux));
            assert!(!supported_on(id, HostOs::Mac));
        }
    }

    #[test]
    fn apple_targets_are_mac_only() {
        for id in [TargetId::IosX64, TargetId::IosArm64, TargetId::MacosX64] {
            assert!(supported_on(id, HostOs::Mac));
            assert!(!supported_on(id, HostOs::Linux));
            assert!(!supported_on(id, HostOs::Windows));
        }
    }

    #[test]
    fn android_targets_build_everywhere() {
        for id in [TargetId::AndroidArm64, TargetId::AndroidX64] {
            for host in [HostOs::Linux, HostOs::Windows, HostOs::Mac] {
                assert!(supported_on(id, host));
            }
        }
    }

    #[test]
    fn linux_target_is_linux_only() {
        assert!(supported_on(TargetId::LinuxX64, HostOs::Linux));
        assert!(!supported_on(TargetId::LinuxX64, HostOs::Windows));
        assert!(!supported_on(TargetId::LinuxX64, HostOs::Mac));
    }

    #[test]
    fn android_abi_names() {
        assert_eq!(android_abi(TargetId::AndroidArm64), Some("arm64-v8a"));
        assert_eq!(android_abi(TargetId::AndroidX64), Some("x86_64"));
        assert_eq!(android_abi(TargetId::LinuxX64), None);
    }

    proptest::proptest! {
        #[test]
        fn parsing_accepts_exactly_the_catalog_names(name in "[a-zA-Z0-9]{0,12}") {
            let known = TargetId::ALL.iter().any(|t| t.as_str() == name);
            proptest::prop_assert_eq!(name.parse::<TargetId>().is_ok(), known);
        }
    }

    #[test]
    fn toolchain_families() {
        assert_eq!(descriptor(TargetId::VStudio64).toolchain, ToolchainFamily::Msvc);
        assert_eq!(descriptor(TargetId::MingwX64).toolchain, ToolchainFamily::Mingw);
        assert_eq!(descriptor(TargetId::LinuxX64).toolchain, ToolchainFamily::LinuxGnu);
        assert_eq!(
            descriptor(TargetId::AndroidArm64).toolchain,
            ToolchainFamily::AndroidNdk
        );
        assert_eq!(
            descriptor(TargetId::MacosX64).toolchain,
            ToolchainFamily::AppleClang
        );
    }
}
