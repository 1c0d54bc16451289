#![allow(clippy::unwrap_used)]

use pretty_assertions::assert_eq;

use super::*;

#[test]
fn parses_linux_triple() {
    let t = TargetInfo::from_triple("x86_64-unknown-linux-gnu").unwrap();
    assert_eq!(t.arch(), Arch::X86_64);
    assert_eq!(t.pointer_width(), 64);
    assert!(t.supports_nanboxing());
    assert_eq!(t.immediate_bits(), 47);
    assert!(!t.musttail_always());
    assert_eq!(t.exception_model(), ExceptionModel::Dwarf);
}

#[test]
fn non_x86_64_targets_use_conservative_widths() {
    let arm = TargetInfo::from_triple("aarch64-apple-darwin").unwrap();
    assert!(!arm.supports_nanboxing());
    assert_eq!(arm.immediate_bits(), 60);

    let wasm = TargetInfo::from_triple("wasm32-unknown-unknown").unwrap();
    assert_eq!(wasm.immediate_bits(), 28);
    assert!(wasm.musttail_always());
}

#[test]
fn windows_and_msvc_use_seh() {
    let win = TargetInfo::from_triple("x86_64-pc-windows-msvc").unwrap();
    assert_eq!(win.exception_model(), ExceptionModel::Seh);
    let gnu = TargetInfo::from_triple("x86_64-pc-windows-gnu").unwrap();
    assert_eq!(gnu.exception_model(), ExceptionModel::Seh);
}

#[test]
fn rejects_malformed_triples() {
    assert!(matches!(
        TargetInfo::from_triple("x86_64-linux"),
        Err(TargetError::InvalidTripleFormat { .. })
    ));
    assert!(matches!(
        TargetInfo::from_triple("x86_64--linux"),
        Err(TargetError::InvalidTripleFormat { .. })
    ));
    let err = TargetInfo::from_triple("sparc-sun-solaris").unwrap_err();
    assert_eq!(
        err.to_string(),
        "unsupported architecture 'sparc' in target 'sparc-sun-solaris'"
    );
}

#[test]
fn default_target_is_x86_64_linux() {
    assert_eq!(TargetInfo::default(), TargetInfo::from_triple("x86_64-unknown-linux-gnu").unwrap());
}
