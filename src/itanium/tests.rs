#![cfg(test)]

use crate::{demangle, filter, parse, Error, Flags, Options};

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

macro_rules! none {
    ($mangled:literal) => {
        assert_eq!(
            demangle($mangled, &Options::default()),
            Err(Error::NotMangled),
            "{} should not look mangled",
            $mangled
        );
    };
}

fn no_params() -> Options {
    Options::new(Flags::NO_PARAMS)
}

fn no_template_params() -> Options {
    Options::new(Flags::NO_TEMPLATE_PARAMS)
}

fn llvm() -> Options {
    Options::new(Flags::LLVM_STYLE)
}

#[test]
fn plain_functions() {
    eq!("_ZN5space3fooEii" => "space::foo(int, int)");
    eq!("_Z3foov" => "foo()");
    eq!("_Z3fooi" => "foo(int)");
    eq!("_ZN12_GLOBAL__N_14testEv" => "(anonymous namespace)::test()");
}

#[test]
fn data_names() {
    eq!("_ZN1A1xE" => "A::x");
    eq!("_ZL6secret" => "secret");
}

#[test]
fn well_known_substitutions() {
    eq!("_ZNSaIcEC1ERKS_"
        => "std::allocator<char>::allocator(std::allocator<char> const&)");
    eq!("_ZNSaIcEC1ERKS_", no_params()
        => "std::allocator<char>::allocator");
    eq!("_ZNSaIcEC1ERKS_", no_template_params()
        => "std::allocator::allocator(std::allocator const&)");
    eq!("_ZSt3maxIVdERKT_S3_S3_"
        => "double const volatile& std::max<double volatile>(double const volatile&, double const volatile&)");
    eq!("_ZSt3maxIVdERKT_S3_S3_", no_template_params()
        => "double const volatile& std::max(double const volatile&, double const volatile&)");
}

#[test]
fn verbose_expands_std_string() {
    eq!("_ZNSsC1Ev" => "std::string::string()");
    eq!("_ZNSsC1Ev", Options::new(Flags::VERBOSE)
        => "std::basic_string<char, std::char_traits<char>, std::allocator<char> >::basic_string()");
}

#[test]
fn nested_templates() {
    eq!("_ZN9__gnu_cxx13stdio_filebufIcSt11char_traitsIcEEC1EP8_IO_FILESt13_Ios_Openmodem"
        => "__gnu_cxx::stdio_filebuf<char, std::char_traits<char> >::stdio_filebuf(_IO_FILE*, std::_Ios_Openmode, unsigned long)");
    eq!("_ZN9__gnu_cxx13stdio_filebufIcSt11char_traitsIcEEC1EP8_IO_FILESt13_Ios_Openmodem", llvm()
        => "__gnu_cxx::stdio_filebuf<char, std::char_traits<char>>::stdio_filebuf(_IO_FILE*, std::_Ios_Openmode, unsigned long)");
}

#[test]
fn literal_template_args() {
    eq!("_ZN1CILj50ELb1EE1DEv" => "C<50u, true>::D()");
    eq!("_ZN1CILj50ELb1EE1DEv", no_params() => "C<50u, true>::D");
    eq!("_ZN1CILj50ELb1EE1DEv", no_template_params() => "C::D()");
}

#[test]
fn template_parameter_resolution() {
    eq!("_Z1fICiEvT_" => "void f<int _Complex>(int _Complex)");
    eq!("_Z1fICiEvT_", no_template_params() => "void f(int _Complex)");
    eq!("_Z1fICiEvT_", no_params() => "f<int _Complex>");
}

#[test]
fn substituted_template_parameters() {
    eq!("_Z1CIvPN1D1E1FIdJEEEdEPN1GILb0ET_T0_T1_E1HEPFS6_S7_S8_EN1H1I1JIS7_E1KENSG_IS8_E1KE"
        => "G<false, void, D::E::F<double>*, double>::H* C<void, D::E::F<double>*, double>(void (*)(D::E::F<double>*, double), H::I::J<D::E::F<double>*>::K, H::I::J<double>::K)");
}

#[test]
fn pack_expansion() {
    eq!("_ZN1CI1DE1EIJiRiRPKcRA1_S4_S8_bS6_S3_RjRPKN1F1GERPKN1H1IEEEEvDpOT_"
        => "void C<D>::E<int, int&, char const*&, char const (&) [1], char const (&) [1], bool, char const*&, int&, unsigned int&, F::G const*&, H::I const*&>(int&&, int&, char const*&, char const (&) [1], char const (&) [1], bool&&, char const*&, int&, unsigned int&, F::G const*&, H::I const*&)");
    eq!("_ZN1C1D1E1FIJEEEvi1GDpT_" => "void C::D::E::F<>(int, G)");
}

#[test]
fn member_function_pointers() {
    eq!("_ZNKSt1CIM1DKFjvEEclIJEvEEjPKS0_DpOT_"
        => "unsigned int std::C<unsigned int (D::*)() const>::operator()<void>(D const*) const");
    eq!("_ZNKSt1CIM1DKFjvEEclIJEvEEjPKS0_DpOT_", no_params()
        => "std::C<unsigned int (D::*)() const>::operator()<void>");
    eq!("_ZNKSt1CIM1DKFjvEEclIJEvEEjPKS0_DpOT_", no_template_params()
        => "unsigned int std::C::operator()(D const*) const");
}

#[test]
fn conversion_operators() {
    eq!("_ZN1n1CcvNS_1DIT_EEI1EEEv" => "n::C::operator n::D<E><E>()");
    eq!("_ZN1n1CcvNS_1DIT_EEI1EEEv", no_template_params() => "n::C::operator n::D()");
    eq!("_ZNKSt2Cr1AIN1B1CENS_1DIS2_EEEcvbB7v170000Ev"
        => "std::Cr::A<B::C, std::Cr::D<B::C> >::operator bool[abi:v170000]() const");
}

#[test]
fn ctors_dtors() {
    eq!("_ZN1CUt_C2Ev" => "C::{unnamed type#1}::{unnamed type#1}()");
    eq!("_ZN3fooD1Ev" => "foo::~foo()");
    eq!("_ZN3fooD0Ev" => "foo::~foo()");
}

#[test]
fn thunks() {
    eq!("_ZThn8_NK1C1D1EEv" => "non-virtual thunk to C::D::E() const");
    eq!("_ZTv0_n96_NK1C1D1E1FEv" => "virtual thunk to C::D::E::F() const");
    eq!("_ZThn8_NK1C1D1EEv", no_params() => "non-virtual thunk to C::D::E() const");
}

#[test]
fn special_names() {
    eq!("_ZTV1A" => "vtable for A");
    eq!("_ZTT1A" => "VTT for A");
    eq!("_ZTI1A" => "typeinfo for A");
    eq!("_ZTS1A" => "typeinfo name for A");
    eq!("_ZGVN1A1xE" => "guard variable for A::x");
    eq!("_ZTCSt9strstream16_So"
        => "construction vtable for std::ostream-in-std::strstream");
    eq!("_ZGTt3foov" => "transaction clone for foo()");
}

#[test]
fn global_ctor_dtor() {
    eq!("_GLOBAL__D__Z2fnv" => "global destructors keyed to fn()");
    eq!("_GLOBAL__I__Z2fnv" => "global constructors keyed to fn()");
    eq!("_GLOBAL__I_main.cc" => "global constructors keyed to main.cc");
}

#[test]
fn lambdas() {
    eq!("_ZZN1C1D1E1F1G1HEvENUlvE_C2EOS4_"
        => "C::D::E::F::G::H()::{lambda()#1}::{lambda()#1}({lambda()#1}&&)");
    eq!("_ZZ3foovENKUlvE_clEv" => "foo()::{lambda()#1}::operator()() const");
    eq!("_ZZ3foovENKUlvE_clEv", llvm() => "foo()::'lambda'()::operator()() const");
    eq!("_ZZ3foovENKUlvE0_clEv" => "foo()::{lambda()#2}::operator()() const");
    eq!("_ZZ3foovENKUlvE0_clEv", llvm() => "foo()::'lambda0'()::operator()() const");
}

#[test]
fn local_entities() {
    eq!("_ZZNK1CI1DIcSt1EIcESaIcEEJEE1FEvE1F"
        => "C<D<char, std::E<char>, std::allocator<char> > >::F() const::F");
    eq!("_ZZNK1CI1DIcSt1EIcESaIcEEJEE1FEvE1F", no_template_params()
        => "C::F() const::F");
    eq!("_ZGVZZN1C1D1EEvENK3$_0clEvE1F"
        => "guard variable for C::D::E()::$_0::operator()() const::F");
    eq!("_ZZ3foovE1x" => "foo()::x");
    eq!("_ZZ3foovE1x_0" => "foo()::x");
}

#[test]
fn enclosing_params_suppression() {
    let opts = Options::new(Flags::NO_ENCLOSING_PARAMS);
    eq!("_ZZ3fooiE1x", opts => "foo()::x");
    eq!("_ZZN1C1D1E1F1G1HEvENUlvE_C2EOS4_", Options::new(Flags::NO_ENCLOSING_PARAMS)
        => "C::D::E::F::G::H()::{lambda()#1}::{lambda()#1}({lambda()#1}&&)");
}

#[test]
fn expressions() {
    eq!("_Z1fIXadL_Z1hvEEEvv" => "void f<&h>()");
    eq!("_Z1fIXadL_Z1hvEEEvv", no_template_params() => "void f()");
    eq!("_Z1fIXadL_Z1hvEEEvv", no_params() => "f<&h>");
}

#[test]
fn arrays_and_references() {
    eq!("_Z3fooRA1_Kc" => "foo(char const (&) [1])");
    eq!("_Z3fooPA5_i" => "foo(int (*) [5])");
    eq!("_Z3fooPFvvE" => "foo(void (*)())");
    eq!("_Z3fooPFviE" => "foo(void (*)(int))");
}

#[test]
fn extra_leading_underscore() {
    eq!("__ZN5space3fooEii" => "space::foo(int, int)");
}

#[test]
fn clone_suffixes() {
    eq!("_Z3foov.isra.0" => "foo() [clone .isra.0]");
    eq!("_Z3foov.isra.1.constprop.2" => "foo() [clone .isra.1] [clone .constprop.2]");
    eq!("_Z3foov.isra.0", Options::new(Flags::NO_CLONES) => "foo()");
}

#[test]
fn parse_failures() {
    fail!("_Z1FE" => "unparsed characters at end of mangled name at 4");
    fail!("_ZcvT_" => "not in scope of template at 6");
    fail!("_Zv00" => "expected positive number at 5");
    fail!("_Z1fS9_" => "invalid substitution index at 7");
}

#[test]
fn not_mangled() {
    none!("foo");
    none!("main");
    none!("_Y3foo");
    none!("");
}

#[test]
fn error_offsets_stay_in_bounds() {
    let cases = [
        "_Z", "_Z1", "_ZN", "_ZNE", "_Z1FQ", "_ZZSaIL0D", "_ZNKE", "_Z1gIEDTclspilE",
        "_ZSt", "_ZTVX", "_ZThn_", "_Z3fooIJ",
    ];
    for case in cases {
        if let Err(err) = demangle(case, &Options::default()) {
            if let Some(offset) = err.offset() {
                assert!(offset <= case.len(), "offset {offset} out of bounds for {case}");
            }
        }
    }
}

#[test]
fn recursion_limit() {
    // `*****...char` with 10,000 pointer indirections is a valid type
    // symbol, but something that would otherwise blow the stack.
    let mut mangled = String::from("_Z3foo");
    for _ in 0..10_000 {
        mangled.push('P');
    }
    mangled.push('c');
    assert_eq!(
        demangle(&mangled, &Options::default()),
        Err(Error::RecursionLimit)
    );
}

#[test]
fn max_length_truncates_to_prefix() {
    let sym = "_ZN9__gnu_cxx13stdio_filebufIcSt11char_traitsIcEEC1EP8_IO_FILESt13_Ios_Openmodem";
    let full = demangle(sym, &Options::default()).unwrap();
    assert!(full.len() > 64);

    let capped = Options::default().max_length(6);
    match demangle(sym, &capped) {
        Err(Error::Truncated(partial)) => assert_eq!(partial, full[..64]),
        other => panic!("expected truncation, got {other:?}"),
    }
}

#[test]
fn no_template_params_removes_every_clause() {
    let syms = [
        "_ZNSaIcEC1ERKS_",
        "_ZSt3maxIVdERKT_S3_S3_",
        "_ZNKSt1CIM1DKFjvEEclIJEvEEjPKS0_DpOT_",
        "_ZZNK1CI1DIcSt1EIcESaIcEEJEE1FEvE1F",
    ];
    for sym in syms {
        let out = demangle(sym, &no_template_params()).unwrap();
        assert!(!out.contains('<'), "{sym} still has template args: {out}");
    }
}

#[test]
fn display_is_deterministic() {
    let sym = parse("_ZNSaIcEC1ERKS_", &Options::default()).unwrap();
    let first = sym.display(&Options::default()).unwrap();
    let second = sym.display(&Options::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn filter_replaces_embedded_symbols() {
    let opts = Options::default();
    assert_eq!(filter("no symbols here", &opts), "no symbols here");
    assert_eq!(
        filter("call _ZN5space3fooEii failed", &opts),
        "call space::foo(int, int) failed"
    );
    // A token that starts like a symbol but fails to parse passes through.
    assert_eq!(filter("_Z1FE stays", &opts), "_Z1FE stays");
    assert_eq!(
        filter("_Z3foov and _RNvC8rust_out4main", &opts),
        "foo() and rust_out::main"
    );
}
