//! Symbol demangler for the Itanium C++ ABI and the Rust v0 mangling scheme.
//!
//! A mangled linker symbol such as `_ZN5space3fooEii` or
//! `_RNvC8rust_out4main` parses into an abstract syntax tree describing what
//! the name refers to, and formats back out as the human-readable source
//! form (`space::foo(int, int)`, `rust_out::main`). Parsing and formatting
//! are separate stages: [`parse`] returns the tree, [`demangle`] runs both.
//!
//! ```
//! use demangler::{demangle, Options};
//!
//! let opts = Options::default();
//! assert_eq!(
//!     demangle("_ZN5space3fooEii", &opts).unwrap(),
//!     "space::foo(int, int)",
//! );
//! ```

use bitflags::bitflags;

pub mod ast;
mod error;
mod fmt;
mod index_str;
mod itanium;
mod rust;

pub use error::Error;

use ast::{Arena, Node, NodeId};

bitflags! {
    /// Demangling option flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct Flags: u32 {
        /// Omit the top-level function parameter list (and return type).
        const NO_PARAMS = 1;
        /// Omit every template argument clause.
        const NO_TEMPLATE_PARAMS = 1 << 1;
        /// Omit parameter lists of functions enclosing a local entity.
        const NO_ENCLOSING_PARAMS = 1 << 2;
        /// Suppress `[clone .suffix]` markers and Rust vendor suffixes.
        const NO_CLONES = 1 << 3;
        /// Do not demangle Rust v0 symbols at all.
        const NO_RUST = 1 << 4;
        /// Use llvm-cxxfilt spelling conventions instead of libiberty's.
        const LLVM_STYLE = 1 << 5;
        /// Expand `std::string` and friends to their full template form.
        const VERBOSE = 1 << 6;
    }
}

/// Options accepted by every entry point.
#[derive(Clone, Debug)]
pub struct Options {
    pub flags: Flags,
    /// Output cap as a power of two (1..=30), or `None` for unbounded.
    max_length_pow: Option<u8>,
    /// Parser and formatter recursion bound.
    pub(crate) max_depth: u32,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            flags: Flags::empty(),
            max_length_pow: None,
            max_depth: 2048,
        }
    }
}

impl Options {
    pub fn new(flags: Flags) -> Options {
        Options {
            flags,
            ..Options::default()
        }
    }

    /// Cap output at `2^pow` bytes. The power is clamped to `1..=30`.
    pub fn max_length(mut self, pow: u8) -> Options {
        self.max_length_pow = Some(pow.clamp(1, 30));
        self
    }

    /// Bound parser and formatter recursion (default 2048).
    pub fn max_depth(mut self, depth: u32) -> Options {
        self.max_depth = depth.max(1);
        self
    }

    pub(crate) fn max_bytes(&self) -> usize {
        match self.max_length_pow {
            Some(pow) => 1usize << pow,
            None => usize::MAX,
        }
    }

    pub(crate) fn verbose(&self) -> bool {
        self.flags.contains(Flags::VERBOSE)
    }
}

/// A parsed symbol: the arena of nodes plus the root.
#[derive(Debug)]
pub struct Symbol {
    arena: Arena,
    root: NodeId,
}

impl Symbol {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.arena.get(id)
    }

    /// Format the tree as a demangled string.
    pub fn display(&self, opts: &Options) -> Result<String, Error> {
        fmt::format(&self.arena, self.root, opts)
    }
}

/// Parse a mangled symbol into its tree without formatting it.
pub fn parse(input: &str, opts: &Options) -> Result<Symbol, Error> {
    let mut arena = Arena::new();
    let root = dispatch(&mut arena, input, opts)?;
    Ok(Symbol { arena, root })
}

/// Parse and format a mangled symbol.
pub fn demangle(input: &str, opts: &Options) -> Result<String, Error> {
    parse(input, opts)?.display(opts)
}

/// Detect the ABI from the symbol's prefix and hand off to its parser.
fn dispatch(arena: &mut Arena, input: &str, opts: &Options) -> Result<NodeId, Error> {
    // `_GLOBAL__I_` / `_GLOBAL__D_` with `_`, `.` or `$` separators wrap
    // either another mangled name or a plain file-keyed identifier.
    if let Some(rest) = input.strip_prefix("_GLOBAL__") {
        let mut chars = rest.bytes();
        let kind = chars.next();
        let sep = chars.next();
        if matches!(kind, Some(b'I') | Some(b'D')) && matches!(sep, Some(b'_' | b'.' | b'$')) {
            let ctor = kind == Some(b'I');
            let body = &rest[2..];
            log::trace!("demangling {input:?} as a global ctor/dtor");
            let body = if body.starts_with("_Z") || body.starts_with("__Z") {
                dispatch(arena, body, opts)?
            } else {
                arena.alloc(Node::Name(body.into()))
            };
            return Ok(arena.alloc(Node::GlobalCtorDtor { ctor, body }));
        }
        return Err(Error::NotMangled);
    }

    // macOS prefixes every symbol with an extra underscore.
    let stripped = match input.strip_prefix('_') {
        Some(rest) if rest.starts_with("_Z") || rest.starts_with("_R") => rest,
        _ => input,
    };

    // GCC-style clone markers trail the mangled name after a dot.
    let (mangled, suffix) = match stripped.find('.') {
        Some(dot) if dot > 0 => (&stripped[..dot], Some(&stripped[dot + 1..])),
        _ => (stripped, None),
    };

    if mangled.starts_with("_Z") {
        log::trace!("demangling {input:?} as Itanium C++");
        let mut root = itanium::parse(arena, mangled.as_bytes(), opts)?;
        if let Some(suffix) = suffix {
            for group in clone_groups(suffix) {
                root = arena.alloc(Node::CloneSuffix {
                    base: root,
                    suffix: group.into(),
                });
            }
        }
        return Ok(root);
    }

    if mangled.starts_with("_R") {
        if opts.flags.contains(Flags::NO_RUST) {
            return Err(Error::NotMangled);
        }
        log::trace!("demangling {input:?} as Rust v0");
        let mut root = rust::parse(arena, mangled.as_bytes(), opts)?;
        if let Some(suffix) = suffix {
            // `.llvm.<hash>` markers carry no information and drop.
            if !suffix.starts_with("llvm.") {
                root = arena.alloc(Node::VendorSuffix {
                    base: root,
                    suffix: suffix.into(),
                });
            }
        }
        return Ok(root);
    }

    Err(Error::NotMangled)
}

/// Split a clone suffix into render groups: a named segment swallows the
/// numeric segments that follow it, so `isra.1.constprop.2` renders as two
/// `[clone ...]` markers.
fn clone_groups(suffix: &str) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    for segment in suffix.split('.') {
        if segment.is_empty() {
            continue;
        }
        let numeric = segment.bytes().all(|b| b.is_ascii_digit());
        match groups.last_mut() {
            Some(last) if numeric => {
                last.push('.');
                last.push_str(segment);
            }
            _ => groups.push(segment.to_owned()),
        }
    }
    groups
}

/// Scan arbitrary text for mangled symbols and demangle each token that
/// parses cleanly; everything else passes through unchanged.
pub fn filter(text: &str, opts: &Options) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        let start = match rest.find(is_symbol_byte) {
            Some(i) => i,
            None => {
                out.push_str(rest);
                break;
            }
        };
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        let end = rest
            .find(|c: char| !is_symbol_byte(c))
            .unwrap_or(rest.len());
        let token = &rest[..end];
        match demangle(token, opts) {
            Ok(demangled) => out.push_str(&demangled),
            Err(Error::Truncated(partial)) => out.push_str(&partial),
            Err(err) => {
                if !matches!(err, Error::NotMangled) {
                    log::debug!("filter: leaving {token:?} alone: {err}");
                }
                out.push_str(token);
            }
        }
        rest = &rest[end..];
    }
    out
}

fn is_symbol_byte(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.')
}
