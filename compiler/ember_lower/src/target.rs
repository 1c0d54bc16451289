//! Target parameters consumed by lowering.
//!
//! Only three things about the target influence the emitted IR: the width
//! of immediate integers, whether every tail call may be marked must-tail,
//! and which exception model the landing pads follow.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// Triple does not have the `<arch>-<vendor>-<os>[-<env>]` shape.
    InvalidTripleFormat { triple: String, reason: String },
    /// Architecture component is not one we generate code for.
    UnsupportedArch { triple: String, arch: String },
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTripleFormat { triple, reason } => {
                write!(f, "invalid target triple '{triple}': {reason}")
            }
            Self::UnsupportedArch { triple, arch } => {
                write!(f, "unsupported architecture '{arch}' in target '{triple}'")
            }
        }
    }
}

impl std::error::Error for TargetError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    Aarch64,
    Riscv64,
    Wasm32,
    X86,
    Arm,
}

impl Arch {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "x86_64" | "amd64" => Arch::X86_64,
            "aarch64" | "arm64" => Arch::Aarch64,
            "riscv64" | "riscv64gc" => Arch::Riscv64,
            "wasm32" => Arch::Wasm32,
            "i386" | "i586" | "i686" | "x86" => Arch::X86,
            "arm" | "armv7" | "thumbv7" => Arch::Arm,
            _ => return None,
        })
    }

    pub fn pointer_width(self) -> u32 {
        match self {
            Arch::X86_64 | Arch::Aarch64 | Arch::Riscv64 => 64,
            Arch::Wasm32 | Arch::X86 | Arch::Arm => 32,
        }
    }
}

/// How thrown exceptions are matched by landing pads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExceptionModel {
    /// Table-based unwinding; landing pads catch with a null type descriptor.
    Dwarf,
    /// Windows structured exception handling; landing pads need a type-info global.
    Seh,
}

/// Target description derived from a triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetInfo {
    triple: String,
    arch: Arch,
    os: String,
    env: Option<String>,
}

impl Default for TargetInfo {
    fn default() -> Self {
        TargetInfo {
            triple: "x86_64-unknown-linux-gnu".to_string(),
            arch: Arch::X86_64,
            os: "linux".to_string(),
            env: Some("gnu".to_string()),
        }
    }
}

/// Immediate width with the nan-boxed encoding (47-bit payload).
const NANBOXED_IMMEDIATE_BITS: u32 = 47;
/// Immediate width on other 64-bit targets (4 tag bits).
const TAGGED64_IMMEDIATE_BITS: u32 = 60;
/// Immediate width on 32-bit targets (4 tag bits).
const TAGGED32_IMMEDIATE_BITS: u32 = 28;

impl TargetInfo {
    /// Parse a target triple.
    ///
    /// Format: `<arch>-<vendor>-<os>[-<env>]`. `wasm32-unknown-unknown`
    /// and the like are accepted as-is.
    pub fn from_triple(triple: &str) -> Result<Self, TargetError> {
        let parts: Vec<&str> = triple.split('-').collect();
        if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(TargetError::InvalidTripleFormat {
                triple: triple.to_string(),
                reason: "expected at least 3 components: <arch>-<vendor>-<os>".to_string(),
            });
        }
        let arch = Arch::parse(parts[0]).ok_or_else(|| TargetError::UnsupportedArch {
            triple: triple.to_string(),
            arch: parts[0].to_string(),
        })?;
        Ok(TargetInfo {
            triple: triple.to_string(),
            arch,
            os: parts[2].to_string(),
            env: parts.get(3).map(|s| (*s).to_string()),
        })
    }

    #[inline]
    pub fn triple(&self) -> &str {
        &self.triple
    }

    #[inline]
    pub fn arch(&self) -> Arch {
        self.arch
    }

    #[inline]
    pub fn pointer_width(&self) -> u32 {
        self.arch.pointer_width()
    }

    /// Only x86_64 uses the compact nan-boxed term encoding.
    pub fn supports_nanboxing(&self) -> bool {
        self.arch == Arch::X86_64
    }

    /// Bit width of integers encoded directly in a term.
    pub fn immediate_bits(&self) -> u32 {
        if self.supports_nanboxing() {
            NANBOXED_IMMEDIATE_BITS
        } else if self.pointer_width() == 64 {
            TAGGED64_IMMEDIATE_BITS
        } else {
            TAGGED32_IMMEDIATE_BITS
        }
    }

    /// Whether every tail call may be marked must-tail regardless of arity.
    pub fn musttail_always(&self) -> bool {
        self.arch == Arch::Wasm32
    }

    pub fn exception_model(&self) -> ExceptionModel {
        if self.os == "windows" || self.env.as_deref() == Some("msvc") {
            ExceptionModel::Seh
        } else {
            ExceptionModel::Dwarf
        }
    }
}

#[cfg(test)]
mod tests;
