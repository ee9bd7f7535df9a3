#![cfg(test)]

use super::punycode_decode;
use crate::{demangle, Error, Flags, Options};

macro_rules! eq {
    ($mangled:literal => $demangled:literal) => {
        eq!($mangled, Options::default() => $demangled);
    };
    ($mangled:literal, $opts:expr => $demangled:literal) => {
        match demangle($mangled, &$opts) {
            Ok(out) => assert_eq!(out, $demangled, "demangling {}", $mangled),
            Err(err) => panic!("demangling {} failed: {}", $mangled, err),
        }
    };
}

macro_rules! fail {
    ($mangled:literal => $message:literal) => {
        match demangle($mangled, &Options::default()) {
            Ok(out) => panic!("demangling {} succeeded with {:?}", $mangled, out),
            Err(err) => assert_eq!(err.to_string(), $message, "error for {}", $mangled),
        }
    };
}

#[test]
fn paths() {
    eq!("_RNvC8rust_out4main" => "rust_out::main");
    eq!("_RNvNtCs1234_7mycrate3foo3bar" => "mycrate::foo::bar");
    eq!("_RC7mycrate" => "mycrate");
}

#[test]
fn instantiating_crate_is_dropped() {
    eq!("_RNvC8rust_out4mainCs1234_8rust_out" => "rust_out::main");
}

#[test]
fn closures_and_shims() {
    eq!("_RNCNvC8rust_out4main0" => "rust_out::main::{closure#0}");
    eq!("_RNCNvC8rust_out4mains_0" => "rust_out::main::{closure#1}");
    eq!("_RNCNvC8rust_out4mains0_0" => "rust_out::main::{closure#2}");
    eq!("_RNSNvC8rust_out4main4drop" => "rust_out::main::{shim:drop#0}");
}

#[test]
fn generic_args() {
    eq!("_RINvNtC3std3mem8align_ofjE" => "std::mem::align_of::<usize>");
    eq!("_RINvNtC3std3mem8align_ofjE", Options::new(Flags::NO_TEMPLATE_PARAMS)
        => "std::mem::align_of::<>");
    eq!("_RINvNtC3std3mem8align_ofRhE" => "std::mem::align_of::<&u8>");
    eq!("_RINvNtC3std3mem8align_ofQhE" => "std::mem::align_of::<&mut u8>");
    eq!("_RINvNtC3std3mem8align_ofPhE" => "std::mem::align_of::<*const u8>");
    eq!("_RINvNtC3std3mem8align_ofOhE" => "std::mem::align_of::<*mut u8>");
    eq!("_RINvNtC3std3mem8align_ofTjjEE" => "std::mem::align_of::<(usize, usize)>");
    eq!("_RINvNtC3std3mem8align_ofTjEE" => "std::mem::align_of::<(usize,)>");
    eq!("_RINvNtC3std3mem8align_ofAhj4_E" => "std::mem::align_of::<[u8; 4]>");
    eq!("_RINvNtC3std3mem8align_ofShE" => "std::mem::align_of::<[u8]>");
}

#[test]
fn basic_types() {
    eq!("_RINvC5alloc3fooeE" => "alloc::foo::<str>");
    eq!("_RINvC5alloc3foozE" => "alloc::foo::<!>");
    eq!("_RINvC5alloc3foouE" => "alloc::foo::<()>");
    eq!("_RINvC5alloc3foopE" => "alloc::foo::<_>");
    eq!("_RINvC5alloc3foocE" => "alloc::foo::<char>");
}

#[test]
fn function_pointers() {
    eq!("_RINvC5alloc3fooFjEuE" => "alloc::foo::<fn(usize)>");
    eq!("_RINvC5alloc3fooFjEjE" => "alloc::foo::<fn(usize) -> usize>");
    eq!("_RINvC5alloc3fooFUjEuE" => "alloc::foo::<unsafe fn(usize)>");
    eq!("_RINvC5alloc3fooFUKCjEuE"
        => "alloc::foo::<unsafe extern \"C\" fn(usize)>");
}

#[test]
fn dyn_traits() {
    eq!("_RINvC5alloc3fooDNtNtC4core3ops5DerefEL_E"
        => "alloc::foo::<dyn core::ops::Deref>");
    eq!("_RINvC5alloc3fooDNtNtC4core3ops5Derefp6OutputhEL_E"
        => "alloc::foo::<dyn core::ops::Deref<Output = u8>>");
}

#[test]
fn impl_paths() {
    eq!("_RNvMNtC4core3fmtNtB2_3Arg3fmt" => "<core::fmt::Arg>::fmt");
    eq!("_RNvXNtC4core3fmtNtB2_3ArgNtB2_5Debug3fmt"
        => "<core::fmt::Arg as core::fmt::Debug>::fmt");
}

#[test]
fn const_generics() {
    eq!("_RINvNtC4core5array4funcKj3_E" => "core::array::func::<3>");
    eq!("_RINvNtC4core5array4funcKin1_E" => "core::array::func::<-1>");
    eq!("_RINvNtC4core5array4funcKb1_E" => "core::array::func::<true>");
    eq!("_RINvNtC4core5array4funcKc61_E" => "core::array::func::<'a'>");
    eq!("_RINvNtC4core5array4funcKpE" => "core::array::func::<_>");
}

#[test]
fn punycoded_identifiers() {
    eq!("_RNvC7mycrateu10mnchen_3ya" => "mycrate::münchen");
}

#[test]
fn punycode() {
    assert_eq!(punycode_decode("mnchen_3ya").as_deref(), Some("münchen"));
    assert_eq!(punycode_decode(""), None);
    assert_eq!(punycode_decode("bad!"), None);
}

#[test]
fn vendor_suffixes() {
    eq!("_RNvC8rust_out4main.llvm.123" => "rust_out::main");
    eq!("_RNvC8rust_out4main.exit.i" => "rust_out::main.exit.i");
    eq!("_RNvC8rust_out4main.exit.i", Options::new(Flags::NO_CLONES) => "rust_out::main");
}

#[test]
fn no_rust_option() {
    assert_eq!(
        demangle("_RNvC8rust_out4main", &Options::new(Flags::NO_RUST)),
        Err(Error::NotMangled)
    );
}

#[test]
fn failures() {
    fail!("_R0NvC3foo3bar" => "unsupported mangling version at 2");
    fail!("_RNvB0_4main" => "invalid substitution index at 4");
    fail!("_RNvC3foo" => "expected decimal number at 9");
}

#[test]
fn legacy_symbols_route_to_itanium() {
    // Pre-v0 Rust symbols are Itanium-shaped and demangle as data names.
    assert_eq!(
        demangle("_ZN4testE", &Options::default()).as_deref(),
        Ok("test")
    );
}
