//! Itanium C++ ABI demangler: the parser half.
//!
//! ```text
//! <mangled-name> = _Z <encoding>
//!
//! <encoding> = <function name> <bare-function-type>
//!            | <data name>
//!            | <special-name>
//!
//! <name> = <nested-name>
//!        | <unscoped-template-name> <template-args>
//!        | <unscoped-name>
//!        | <local-name>
//!
//! <nested-name> = N [<CV-qualifiers>] [<ref-qualifier>] <prefix> E
//!
//! <prefix> = <unqualified-name>
//!          | <prefix> <unqualified-name>
//!          | <template-prefix> <template-args>
//!          | <template-param>
//!          | <decltype>
//!          | <substitution>
//! ```
//!
//! The parser produces handles into the shared [`Arena`]; it never emits
//! text. Completed types and prefixes are appended to the substitution
//! table so later `S<seq>_` references can share the subtree. Template
//! parameter references are recorded by index and resolved by the formatter
//! against whatever template scope is live when the reference is printed.
//!
//! source: <https://itanium-cxx-abi.github.io/cxx-abi/abi.html#mangling>

pub(crate) mod ops;
pub(crate) mod subs;
mod tests;

use crate::ast::{
    Arena, CtorKind, CvQuals, DtorKind, MemberKind, Node, NodeId, RefQual,
};
use crate::error::{Error, Result};
use crate::index_str::IndexStr;
use crate::Options;
use subs::{decode_seq_id, SubstitutionTable};

/// Parse a full `_Z...` symbol (clone suffixes already stripped) and return
/// the root node.
pub(crate) fn parse(arena: &mut Arena, input: &[u8], opts: &Options) -> Result<NodeId> {
    let mut parser = Parser::new(arena, input, opts);
    if !parser.input.eat_slice(b"_Z") {
        return Err(Error::NotMangled);
    }
    let root = parser.parse_encoding()?;
    if !parser.input.is_empty() {
        return Err(Error::parse(
            "unparsed characters at end of mangled name",
            parser.input.offset(),
        ));
    }
    if !parser.pending_forward.is_empty() {
        return Err(Error::parse(
            "not in scope of template",
            parser.input.offset(),
        ));
    }
    Ok(root)
}

/// A template scope the parser is currently inside. Only the argument count
/// matters at parse time; the formatter keeps the real frames.
struct Frame {
    count: usize,
    lambda: bool,
}

struct NameResult {
    node: NodeId,
    cv: CvQuals,
    ref_qual: RefQual,
    /// `Some(arg count)` when the rightmost component carries template args.
    template_args: Option<usize>,
    /// Constructors, destructors and conversion operators encode no return
    /// type even when templated.
    no_return_type: bool,
    /// The name is a bare substitution or well-known abbreviation and must
    /// not be re-added to the substitution table when used as a type.
    from_subst: bool,
}

struct Parser<'a, 'b> {
    input: IndexStr<'a>,
    arena: &'b mut Arena,
    subs: SubstitutionTable,
    opts: &'b Options,
    depth: u32,
    max_depth: u32,
    scopes: Vec<Frame>,
    in_conversion: bool,
    /// `T<n>_` references seen inside a conversion operator target before
    /// the template arguments they forward-reference were parsed.
    pending_forward: Vec<(usize, usize)>,
}

impl<'a, 'b> Parser<'a, 'b> {
    fn new(arena: &'b mut Arena, input: &'a [u8], opts: &'b Options) -> Parser<'a, 'b> {
        Parser {
            input: IndexStr::new(input),
            arena,
            subs: SubstitutionTable::new(),
            opts,
            depth: 0,
            max_depth: opts.max_depth,
            scopes: Vec::new(),
            in_conversion: false,
            pending_forward: Vec::new(),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth >= self.max_depth {
            return Err(Error::RecursionLimit);
        }
        Ok(())
    }

    fn exit(&mut self) {
        debug_assert!(self.depth > 0);
        self.depth -= 1;
    }

    fn fail<T>(&self, reason: &'static str) -> Result<T> {
        Err(Error::parse(reason, self.input.offset()))
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.arena.alloc(node)
    }

    fn name_node(&mut self, s: &str) -> NodeId {
        self.alloc(Node::Name(s.into()))
    }

    fn qualified(&mut self, scope: NodeId, name: NodeId) -> NodeId {
        self.alloc(Node::Qualified { scope, name })
    }

    // ---- encodings ----------------------------------------------------

    /// An encoding ends at the end of input (top level, thunk targets) or
    /// at the `E` closing a `Z <encoding> E` local name. No type production
    /// starts with `E`, so the check needs no context.
    fn at_stop(&self) -> bool {
        matches!(self.input.peek(), None | Some(b'E'))
    }

    fn parse_encoding(&mut self) -> Result<NodeId> {
        self.enter()?;
        let result = self.parse_encoding_inner(false).map(|(id, _)| id);
        self.exit();
        result
    }

    /// Parse an encoding; with `keep_frame` the template scope its name
    /// introduced stays pushed for the caller (local names need it live
    /// while the local entity parses). Returns the pushed-frame flag.
    fn parse_encoding_inner(&mut self, keep_frame: bool) -> Result<(NodeId, bool)> {
        match self.input.peek() {
            Some(b'T') | Some(b'G') => {
                let special = self.parse_special_name()?;
                return Ok((special, false));
            }
            _ => {}
        }

        let name = self.parse_name()?;
        if self.at_stop() {
            // A data object: the name is the whole encoding.
            return Ok((name.node, false));
        }

        let mut pushed = false;
        if let Some(count) = name.template_args {
            self.scopes.push(Frame {
                count,
                lambda: false,
            });
            pushed = true;
        }

        let enable_if = self.parse_enable_if()?;

        let ret = if name.template_args.is_some() && !name.no_return_type {
            Some(self.parse_type()?)
        } else {
            None
        };

        let mut params = Vec::new();
        while !self.at_stop() {
            match self.parse_type() {
                Ok(ty) => params.push(ty),
                Err(Error::Parse { reason, offset })
                    if params.is_empty() && reason == "expected type" =>
                {
                    return Err(Error::Parse {
                        reason: "expected at least one type".into(),
                        offset,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        if params.is_empty() {
            return self.fail("expected at least one type");
        }

        let mut node = self.alloc(Node::Encoding {
            name: name.node,
            ret,
            params,
            cv: name.cv,
            ref_qual: name.ref_qual,
        });
        if let Some(args) = enable_if {
            node = self.alloc(Node::EnableIf { body: node, args });
        }

        if pushed && !keep_frame {
            self.scopes.pop();
            pushed = false;
        }
        Ok((node, pushed))
    }

    /// Clang attaches `__attribute__((enable_if(...)))` between the name and
    /// the bare function type as `Ua9enable_ifI...E`.
    fn parse_enable_if(&mut self) -> Result<Option<Vec<NodeId>>> {
        if !self.input.rest().starts_with(b"Ua9enable_ifI") {
            return Ok(None);
        }
        self.input.eat_slice(b"Ua9enable_if");
        let args = self.parse_template_args()?;
        Ok(Some(args))
    }

    // ---- special names ------------------------------------------------

    fn parse_special_name(&mut self) -> Result<NodeId> {
        if self.input.eat_slice(b"TV") {
            let ty = self.parse_type()?;
            return Ok(self.alloc(Node::Special {
                prefix: "vtable for ",
                body: ty,
            }));
        }
        if self.input.eat_slice(b"TT") {
            let ty = self.parse_type()?;
            return Ok(self.alloc(Node::Special {
                prefix: "VTT for ",
                body: ty,
            }));
        }
        if self.input.eat_slice(b"TI") {
            let ty = self.parse_type()?;
            return Ok(self.alloc(Node::Special {
                prefix: "typeinfo for ",
                body: ty,
            }));
        }
        if self.input.eat_slice(b"TS") {
            let ty = self.parse_type()?;
            return Ok(self.alloc(Node::Special {
                prefix: "typeinfo name for ",
                body: ty,
            }));
        }
        if self.input.eat_slice(b"TH") {
            let name = self.parse_name()?;
            return Ok(self.alloc(Node::Special {
                prefix: "TLS init function for ",
                body: name.node,
            }));
        }
        if self.input.eat_slice(b"TW") {
            let name = self.parse_name()?;
            return Ok(self.alloc(Node::Special {
                prefix: "TLS wrapper function for ",
                body: name.node,
            }));
        }
        if self.input.eat_slice(b"Tc") {
            self.parse_call_offset()?;
            self.parse_call_offset()?;
            let target = self.parse_encoding()?;
            return Ok(self.alloc(Node::Special {
                prefix: "covariant return thunk to ",
                body: target,
            }));
        }
        if self.input.eat_slice(b"Th") {
            self.parse_nv_offset()?;
            if !self.input.eat(b'_') {
                return self.fail("expected _ after thunk offset");
            }
            let target = self.parse_encoding()?;
            return Ok(self.alloc(Node::Special {
                prefix: "non-virtual thunk to ",
                body: target,
            }));
        }
        if self.input.eat_slice(b"Tv") {
            self.parse_nv_offset()?;
            if !self.input.eat(b'_') {
                return self.fail("expected _ after thunk offset");
            }
            self.parse_nv_offset()?;
            if !self.input.eat(b'_') {
                return self.fail("expected _ after thunk offset");
            }
            let target = self.parse_encoding()?;
            return Ok(self.alloc(Node::Special {
                prefix: "virtual thunk to ",
                body: target,
            }));
        }
        if self.input.eat_slice(b"TC") {
            let derived = self.parse_type()?;
            self.parse_number_digits()?;
            if !self.input.eat(b'_') {
                return self.fail("expected _ after construction vtable offset");
            }
            let base = self.parse_type()?;
            return Ok(self.alloc(Node::ConstructionVtable { derived, base }));
        }
        if self.input.eat_slice(b"TA") {
            let arg = self.parse_template_arg()?;
            return Ok(self.alloc(Node::Special {
                prefix: "template parameter object for ",
                body: arg,
            }));
        }
        if self.input.eat_slice(b"GV") {
            let name = self.parse_name()?;
            return Ok(self.alloc(Node::Special {
                prefix: "guard variable for ",
                body: name.node,
            }));
        }
        if self.input.eat_slice(b"GR") {
            let name = self.parse_name()?;
            // Newer symbols append a sequence id before a closing _.
            if !self.input.is_empty() {
                while matches!(self.input.peek(), Some(b'0'..=b'9') | Some(b'A'..=b'Z')) {
                    self.input.take();
                }
                if !self.input.eat(b'_') {
                    return self.fail("expected _ after reference temporary");
                }
            }
            return Ok(self.alloc(Node::Special {
                prefix: "reference temporary for ",
                body: name.node,
            }));
        }
        if self.input.eat_slice(b"GTt") {
            let target = self.parse_encoding()?;
            return Ok(self.alloc(Node::Special {
                prefix: "transaction clone for ",
                body: target,
            }));
        }
        self.fail("unrecognized special name")
    }

    fn parse_nv_offset(&mut self) -> Result<()> {
        self.input.eat(b'n');
        let _ = self.parse_number_digits()?;
        Ok(())
    }

    fn parse_call_offset(&mut self) -> Result<()> {
        if self.input.eat(b'h') {
            self.parse_nv_offset()?;
            if !self.input.eat(b'_') {
                return self.fail("expected _ after call offset");
            }
            return Ok(());
        }
        if self.input.eat(b'v') {
            self.parse_nv_offset()?;
            if !self.input.eat(b'_') {
                return self.fail("expected _ after call offset");
            }
            self.parse_nv_offset()?;
            if !self.input.eat(b'_') {
                return self.fail("expected _ after call offset");
            }
            return Ok(());
        }
        self.fail("expected call offset")
    }

    // ---- names --------------------------------------------------------

    fn parse_name(&mut self) -> Result<NameResult> {
        self.enter()?;
        let result = self.parse_name_inner();
        self.exit();
        result
    }

    fn parse_name_inner(&mut self) -> Result<NameResult> {
        match self.input.peek() {
            Some(b'N') => self.parse_nested_name(),
            Some(b'Z') => self.parse_local_name(),
            Some(b'S') if self.input.peek_at(1) == Some(b't') => {
                // `St <unqualified-name>`: an `std::` member.
                self.input.eat_slice(b"St");
                let std = self.name_node("std");
                let comp = self.parse_unqualified_component(None)?;
                let mut node = self.qualified(std, comp.node);
                let mut template_args = None;
                if self.input.peek() == Some(b'I') {
                    self.subs.push(node);
                    let args = self.parse_template_args()?;
                    template_args = Some(args.len());
                    node = self.alloc(Node::Template { name: node, args });
                }
                Ok(NameResult {
                    node,
                    cv: CvQuals::empty(),
                    ref_qual: RefQual::None,
                    template_args,
                    no_return_type: comp.no_return_type,
                    from_subst: false,
                })
            }
            Some(b'S') => {
                let node = self.parse_substitution()?;
                let mut template_args = None;
                let mut out = node;
                if self.input.peek() == Some(b'I') {
                    let args = self.parse_template_args()?;
                    template_args = Some(args.len());
                    out = self.alloc(Node::Template { name: node, args });
                }
                Ok(NameResult {
                    node: out,
                    cv: CvQuals::empty(),
                    ref_qual: RefQual::None,
                    template_args,
                    no_return_type: false,
                    from_subst: template_args.is_none(),
                })
            }
            _ => {
                let comp = self.parse_unqualified_component(None)?;
                let mut node = comp.node;
                let mut template_args = None;
                if self.input.peek() == Some(b'I') {
                    // `<unscoped-template-name>` is a substitution candidate.
                    self.subs.push(node);
                    let args = self.parse_template_args()?;
                    template_args = Some(args.len());
                    node = self.alloc(Node::Template { name: node, args });
                }
                Ok(NameResult {
                    node,
                    cv: CvQuals::empty(),
                    ref_qual: RefQual::None,
                    template_args,
                    no_return_type: comp.no_return_type,
                    from_subst: false,
                })
            }
        }
    }

    fn parse_cv_quals(&mut self) -> CvQuals {
        let mut quals = CvQuals::empty();
        loop {
            match self.input.peek() {
                Some(b'r') => quals |= CvQuals::RESTRICT,
                Some(b'V') => quals |= CvQuals::VOLATILE,
                Some(b'K') => quals |= CvQuals::CONST,
                _ => return quals,
            }
            self.input.take();
        }
    }

    fn parse_nested_name(&mut self) -> Result<NameResult> {
        if !self.input.eat(b'N') {
            return self.fail("expected nested name");
        }
        let cv = self.parse_cv_quals();
        let ref_qual = if self.input.eat(b'R') {
            RefQual::LValue
        } else if self.input.eat(b'O') {
            RefQual::RValue
        } else {
            RefQual::None
        };

        let mut current: Option<NodeId> = None;
        // A bare substitution or well-known component must not be re-added
        // when the prefix is extended; it is already in the table (or is a
        // well-known abbreviation that never goes in).
        let mut skip_add = false;
        let mut template_args = None;
        let mut no_return_type = false;

        loop {
            let byte = match self.input.peek() {
                Some(b) => b,
                None => return self.fail("expected prefix"),
            };
            match byte {
                b'E' => {
                    self.input.take();
                    break;
                }
                b'I' => {
                    let prior = match current {
                        Some(p) => p,
                        None => return self.fail("expected prefix"),
                    };
                    if !skip_add {
                        self.subs.push(prior);
                    }
                    let args = self.parse_template_args()?;
                    template_args = Some(args.len());
                    current = Some(self.alloc(Node::Template { name: prior, args }));
                    skip_add = false;
                }
                b'S' => {
                    if current.is_some() {
                        return self.fail("expected prefix");
                    }
                    let node = if self.input.peek_at(1) == Some(b't') {
                        self.input.eat_slice(b"St");
                        self.name_node("std")
                    } else {
                        self.parse_substitution()?
                    };
                    current = Some(node);
                    skip_add = true;
                }
                b'T' => {
                    let tp = self.parse_template_param()?;
                    self.subs.push(tp);
                    current = match current {
                        None => Some(tp),
                        Some(_) => return self.fail("expected prefix"),
                    };
                    skip_add = true;
                }
                b'M' => {
                    // Data-member prefix marker: the lambda that follows
                    // lives in this member's initializer.
                    self.input.take();
                }
                _ => {
                    if let Some(prior) = current {
                        if !skip_add {
                            self.subs.push(prior);
                        }
                    }
                    let comp = self.parse_unqualified_component(current)?;
                    no_return_type = comp.no_return_type;
                    template_args = None;
                    current = Some(match current {
                        None => comp.node,
                        Some(prior) => self.qualified(prior, comp.node),
                    });
                    skip_add = false;
                }
            }
        }

        let node = match current {
            Some(n) => n,
            None => return self.fail("expected prefix"),
        };
        Ok(NameResult {
            node,
            cv,
            ref_qual,
            template_args,
            no_return_type,
            from_subst: false,
        })
    }

    fn parse_local_name(&mut self) -> Result<NameResult> {
        if !self.input.eat(b'Z') {
            return self.fail("expected local name");
        }
        self.enter()?;
        let result = self.parse_local_name_inner();
        self.exit();
        result
    }

    fn parse_local_name_inner(&mut self) -> Result<NameResult> {
        let (function, pushed) = self.parse_encoding_inner(true)?;
        if !self.input.eat(b'E') {
            if pushed {
                self.scopes.pop();
            }
            return self.fail("expected E after local name");
        }

        // The entity's own cv-qualifiers, ref-qualifier and template
        // arguments belong to the local function the caller is building.
        let mut cv = CvQuals::empty();
        let mut ref_qual = RefQual::None;
        let mut template_args = None;
        let mut no_return_type = false;

        let entity = if self.input.eat(b's') {
            self.parse_discriminator()?;
            self.name_node("string literal")
        } else if self.input.peek() == Some(b'd')
            && matches!(self.input.peek_at(1), Some(b'_') | Some(b'0'..=b'9'))
        {
            self.input.take();
            let num = match self.input.peek() {
                Some(b'0'..=b'9') => {
                    let digits = self.parse_number_digits()?;
                    digits + 2
                }
                _ => 1,
            };
            if !self.input.eat(b'_') {
                if pushed {
                    self.scopes.pop();
                }
                return self.fail("expected _ after default argument index");
            }
            let scope = self.name_node(&format!("{{default arg#{num}}}"));
            let inner = self.parse_name();
            let inner = match inner {
                Ok(n) => n,
                Err(e) => {
                    if pushed {
                        self.scopes.pop();
                    }
                    return Err(e);
                }
            };
            self.qualified(scope, inner.node)
        } else {
            let inner = self.parse_name();
            let inner = match inner {
                Ok(n) => n,
                Err(e) => {
                    if pushed {
                        self.scopes.pop();
                    }
                    return Err(e);
                }
            };
            self.parse_discriminator()?;
            cv = inner.cv;
            ref_qual = inner.ref_qual;
            template_args = inner.template_args;
            no_return_type = inner.no_return_type;
            inner.node
        };

        if pushed {
            self.scopes.pop();
        }
        let node = self.alloc(Node::LocalName { function, entity });
        Ok(NameResult {
            node,
            cv,
            ref_qual,
            template_args,
            no_return_type,
            from_subst: false,
        })
    }

    fn parse_discriminator(&mut self) -> Result<()> {
        if self.input.peek() != Some(b'_') {
            return Ok(());
        }
        if self.input.peek_at(1) == Some(b'_') {
            // `__ <number >= 10> _`
            let mark = self.input.offset();
            self.input.take();
            self.input.take();
            if !matches!(self.input.peek(), Some(b'0'..=b'9')) {
                self.input.seek(mark);
                return Ok(());
            }
            self.parse_number_digits()?;
            if !self.input.eat(b'_') {
                return self.fail("expected _ after discriminator");
            }
        } else if matches!(self.input.peek_at(1), Some(b'0'..=b'9')) {
            self.input.take();
            self.input.take();
        }
        Ok(())
    }

    // ---- unqualified names --------------------------------------------

    /// Parse one prefix component: a source name, operator, ctor/dtor,
    /// closure, unnamed type or structured binding. `scope` is the prefix
    /// built so far (constructors take their name from its leaf).
    fn parse_unqualified_component(&mut self, scope: Option<NodeId>) -> Result<Component> {
        let byte = match self.input.peek() {
            Some(b) => b,
            None => return self.fail("expected prefix"),
        };
        match byte {
            b'0'..=b'9' => {
                let node = self.parse_source_name()?;
                let node = self.parse_abi_tags(node)?;
                Ok(Component::plain(node))
            }
            b'L' => {
                // Internal linkage marker; the name renders unchanged.
                self.input.take();
                self.parse_unqualified_component(scope)
            }
            b'U' => match self.input.peek_at(1) {
                Some(b'l') => {
                    let node = self.parse_closure()?;
                    Ok(Component::plain(node))
                }
                Some(b't') => {
                    let node = self.parse_unnamed_type()?;
                    let node = self.parse_abi_tags(node)?;
                    Ok(Component::plain(node))
                }
                _ => self.fail("expected closure or unnamed type"),
            },
            b'C' => {
                let scope = match scope {
                    Some(s) => s,
                    None => return self.fail("expected prefix"),
                };
                self.input.take();
                let kind = match self.input.take() {
                    Some(b'1') => CtorKind::Complete,
                    Some(b'2') => CtorKind::Base,
                    Some(b'3') => CtorKind::Allocating,
                    Some(b'I') => {
                        // CI1 / CI2 <base class type>
                        if !matches!(self.input.take(), Some(b'1') | Some(b'2')) {
                            return self.fail("expected constructor kind");
                        }
                        let _base = self.parse_type()?;
                        CtorKind::Inheriting
                    }
                    _ => return self.fail("expected constructor kind"),
                };
                let name = self.leaf_name(scope);
                let node = self.alloc(Node::Ctor { name, kind });
                let node = self.parse_abi_tags(node)?;
                Ok(Component::ctor_dtor(node))
            }
            b'D' => match self.input.peek_at(1) {
                Some(b'0') | Some(b'1') | Some(b'2') => {
                    let scope = match scope {
                        Some(s) => s,
                        None => return self.fail("expected prefix"),
                    };
                    self.input.take();
                    let kind = match self.input.take() {
                        Some(b'0') => DtorKind::Deleting,
                        Some(b'1') => DtorKind::Complete,
                        _ => DtorKind::Base,
                    };
                    let name = self.leaf_name(scope);
                    let node = self.alloc(Node::Dtor { name, kind });
                    let node = self.parse_abi_tags(node)?;
                    Ok(Component::ctor_dtor(node))
                }
                Some(b't') | Some(b'T') => {
                    let node = self.parse_decltype()?;
                    Ok(Component::plain(node))
                }
                Some(b'C') => {
                    self.input.eat_slice(b"DC");
                    let mut names = Vec::new();
                    while self.input.peek() != Some(b'E') {
                        names.push(self.parse_source_name()?);
                    }
                    self.input.take();
                    if names.is_empty() {
                        return self.fail("expected structured binding name");
                    }
                    let node = self.alloc(Node::StructuredBinding { names });
                    Ok(Component::plain(node))
                }
                _ => self.fail("expected prefix"),
            },
            _ => {
                let node = self.parse_operator_name()?;
                let no_ret = matches!(self.arena.get(node), Node::Conversion { .. });
                let node = self.parse_abi_tags(node)?;
                Ok(Component {
                    node,
                    no_return_type: no_ret,
                })
            }
        }
    }

    fn parse_source_name(&mut self) -> Result<NodeId> {
        let len = self.parse_number_digits()?;
        if len == 0 {
            return self.fail("expected positive number");
        }
        let bytes = match self.input.take_slice(len) {
            Some(b) => b,
            None => return self.fail("name exceeds remaining input"),
        };
        let ident = String::from_utf8_lossy(bytes);
        if ident.starts_with("_GLOBAL__N_") {
            return Ok(self.name_node("(anonymous namespace)"));
        }
        Ok(self.name_node(&ident))
    }

    fn parse_abi_tags(&mut self, mut node: NodeId) -> Result<NodeId> {
        while self.input.peek() == Some(b'B')
            && matches!(self.input.peek_at(1), Some(b'0'..=b'9'))
        {
            self.input.take();
            let len = self.parse_number_digits()?;
            if len == 0 {
                return self.fail("expected positive number");
            }
            let bytes = match self.input.take_slice(len) {
                Some(b) => b,
                None => return self.fail("name exceeds remaining input"),
            };
            let tag = String::from_utf8_lossy(bytes).into_owned();
            node = self.alloc(Node::Tagged {
                name: node,
                tag: tag.into(),
            });
        }
        Ok(node)
    }

    fn parse_operator_name(&mut self) -> Result<NodeId> {
        let rest = self.input.rest();
        if rest.starts_with(b"cv") {
            self.input.eat_slice(b"cv");
            let was = self.in_conversion;
            self.in_conversion = true;
            let to = self.parse_type();
            self.in_conversion = was;
            let to = to?;
            return Ok(self.alloc(Node::Conversion { to }));
        }
        if rest.starts_with(b"li") {
            self.input.eat_slice(b"li");
            let suffix = self.parse_source_name()?;
            return Ok(self.alloc(Node::LiteralOp { suffix }));
        }
        if rest.first() == Some(&b'v') && matches!(rest.get(1), Some(b'0'..=b'9')) {
            // Vendor extended operator: `v <digit> <source-name>`.
            self.input.take();
            self.input.take();
            let name = self.parse_source_name()?;
            let text = match self.arena.get(name) {
                Node::Name(s) => format!("operator {s}"),
                _ => unreachable!(),
            };
            return Ok(self.name_node(&text));
        }
        if rest.len() >= 2 {
            if let Some(op) = ops::by_code(&rest[..2]) {
                self.input.take();
                self.input.take();
                return Ok(self.alloc(Node::Operator(op)));
            }
        }
        self.fail("expected prefix")
    }

    /// The name a constructor or destructor repeats: the rightmost source
    /// component of its scope, without template arguments.
    fn leaf_name(&self, mut id: NodeId) -> NodeId {
        loop {
            match self.arena.get(id) {
                Node::Qualified { name, .. } => id = *name,
                Node::Template { name, .. } => id = *name,
                _ => return id,
            }
        }
    }

    // ---- closures and unnamed types -----------------------------------

    fn parse_closure(&mut self) -> Result<NodeId> {
        self.input.eat_slice(b"Ul");
        let tpl = self.parse_template_param_decls()?;
        let pushed = if !tpl.is_empty() {
            self.scopes.push(Frame {
                count: tpl.len(),
                lambda: true,
            });
            true
        } else {
            false
        };

        let mut sig = Vec::new();
        let mut result = Ok(());
        while self.input.peek() != Some(b'E') {
            match self.parse_type() {
                Ok(ty) => sig.push(ty),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
            if self.input.is_empty() {
                result = Err(Error::parse("expected E after lambda signature", self.input.offset()));
                break;
            }
        }
        if pushed {
            self.scopes.pop();
        }
        result?;
        self.input.take();

        let num = self.parse_optional_seq_num()?;
        Ok(self.alloc(Node::Closure { sig, tpl, num }))
    }

    /// `Ty`, `Tn <type>`, `Tt <decls> E` and `Tp`-prefixed generic lambda
    /// parameter declarations.
    fn parse_template_param_decls(&mut self) -> Result<Vec<NodeId>> {
        let mut decls = Vec::new();
        loop {
            let rest = self.input.rest();
            if rest.starts_with(b"Ty") {
                self.input.eat_slice(b"Ty");
                decls.push(self.name_node("typename $T"));
            } else if rest.starts_with(b"Tn") {
                self.input.eat_slice(b"Tn");
                let ty = self.parse_type()?;
                decls.push(ty);
            } else if rest.starts_with(b"Tp") {
                self.input.eat_slice(b"Tp");
                continue;
            } else if rest.starts_with(b"Tt") {
                self.input.eat_slice(b"Tt");
                while self.input.peek() != Some(b'E') {
                    if self.input.is_empty() {
                        return self.fail("expected E after template template parameter");
                    }
                    let inner = self.parse_template_param_decls()?;
                    if inner.is_empty() {
                        break;
                    }
                }
                if !self.input.eat(b'E') {
                    return self.fail("expected E after template template parameter");
                }
                decls.push(self.name_node("template<...> typename $TT"));
            } else {
                return Ok(decls);
            }
        }
    }

    fn parse_unnamed_type(&mut self) -> Result<NodeId> {
        self.input.eat_slice(b"Ut");
        let num = self.parse_optional_seq_num()?;
        Ok(self.alloc(Node::UnnamedType { num }))
    }

    /// `_` for the first entity, `<n>_` for the n+2nd.
    fn parse_optional_seq_num(&mut self) -> Result<Option<usize>> {
        let num = match self.input.peek() {
            Some(b'0'..=b'9') => Some(self.parse_number_digits()?),
            _ => None,
        };
        if !self.input.eat(b'_') {
            return self.fail("expected _ after index");
        }
        Ok(num)
    }

    // ---- template machinery -------------------------------------------

    fn parse_template_args(&mut self) -> Result<Vec<NodeId>> {
        if !self.input.eat(b'I') {
            return self.fail("expected template args");
        }
        let mut args = Vec::new();
        while self.input.peek() != Some(b'E') {
            if self.input.is_empty() {
                return self.fail("expected E after template args");
            }
            args.push(self.parse_template_arg()?);
        }
        self.input.take();

        // Conversion-operator forward references bind to the innermost
        // template argument list that completes after them.
        if !self.pending_forward.is_empty() {
            let pending = std::mem::take(&mut self.pending_forward);
            for (index, _) in pending {
                if index >= args.len() {
                    return self.fail("template index out of range");
                }
            }
        }
        Ok(args)
    }

    fn parse_template_arg(&mut self) -> Result<NodeId> {
        match self.input.peek() {
            Some(b'X') => {
                self.input.take();
                let expr = self.parse_expr()?;
                if !self.input.eat(b'E') {
                    return self.fail("expected E after expression");
                }
                Ok(expr)
            }
            Some(b'L') => self.parse_expr_primary(),
            Some(b'J') => {
                self.input.take();
                let mut args = Vec::new();
                while self.input.peek() != Some(b'E') {
                    if self.input.is_empty() {
                        return self.fail("expected E after template argument pack");
                    }
                    args.push(self.parse_template_arg()?);
                }
                self.input.take();
                Ok(self.alloc(Node::ArgPack { args }))
            }
            _ => self.parse_type(),
        }
    }

    fn parse_template_param(&mut self) -> Result<NodeId> {
        if !self.input.eat(b'T') {
            return self.fail("expected template parameter");
        }
        let (index, level) = if self.input.eat(b'L') {
            let l = self.parse_number_digits()?;
            if !self.input.eat(b'_') {
                return self.fail("expected _ after template parameter level");
            }
            let index = match self.input.peek() {
                Some(b'0'..=b'9') => self.parse_number_digits()? + 1,
                _ => 0,
            };
            if !self.input.eat(b'_') {
                return self.fail("expected _ after template parameter");
            }
            (index, Some(l))
        } else {
            let index = match self.input.peek() {
                Some(b'0'..=b'9') => self.parse_number_digits()? + 1,
                _ => 0,
            };
            if !self.input.eat(b'_') {
                return self.fail("expected _ after template parameter");
            }
            (index, None)
        };

        if level.is_none() {
            match self.scopes.last() {
                Some(frame) if frame.lambda => {
                    if index < frame.count {
                        return Ok(self.alloc(Node::LambdaAuto { index }));
                    }
                }
                Some(_) => {}
                None => {
                    if self.in_conversion {
                        self.pending_forward.push((index, self.input.offset()));
                    } else {
                        return Err(Error::TemplateParamOutOfScope {
                            offset: self.input.offset(),
                        });
                    }
                }
            }
        }
        Ok(self.alloc(Node::TemplateParam { index, level }))
    }

    // ---- substitutions ------------------------------------------------

    fn parse_substitution(&mut self) -> Result<NodeId> {
        if !self.input.eat(b'S') {
            return self.fail("expected substitution");
        }
        match self.input.peek() {
            Some(b't') => {
                self.input.take();
                Ok(self.name_node("std"))
            }
            Some(b'a') => {
                self.input.take();
                Ok(self.well_known("allocator"))
            }
            Some(b'b') => {
                self.input.take();
                Ok(self.well_known("basic_string"))
            }
            Some(b's') => {
                self.input.take();
                if self.opts.verbose() {
                    self.expanded_string()
                } else {
                    Ok(self.well_known("string"))
                }
            }
            Some(b'i') => {
                self.input.take();
                self.well_known_stream("istream", "basic_istream")
            }
            Some(b'o') => {
                self.input.take();
                self.well_known_stream("ostream", "basic_ostream")
            }
            Some(b'd') => {
                self.input.take();
                self.well_known_stream("iostream", "basic_iostream")
            }
            Some(b'_') => {
                self.input.take();
                self.lookup_substitution(0)
            }
            Some(b'0'..=b'9') | Some(b'A'..=b'Z') => {
                let mut digits = Vec::new();
                while matches!(self.input.peek(), Some(b'0'..=b'9') | Some(b'A'..=b'Z')) {
                    digits.push(self.input.take().unwrap());
                }
                if !self.input.eat(b'_') {
                    return self.fail("expected _ after substitution index");
                }
                let seq = match decode_seq_id(&digits) {
                    Some(n) => n,
                    None => return self.fail("expected substitution index"),
                };
                self.lookup_substitution(seq + 1)
            }
            _ => self.fail("expected substitution"),
        }
    }

    fn lookup_substitution(&mut self, seq: usize) -> Result<NodeId> {
        match self.subs.get(seq) {
            Some(id) => Ok(id),
            None => Err(Error::SubstitutionOutOfRange {
                offset: self.input.offset(),
            }),
        }
    }

    fn well_known(&mut self, name: &str) -> NodeId {
        let std = self.name_node("std");
        let name = self.name_node(name);
        self.qualified(std, name)
    }

    /// `std::basic_string<char, std::char_traits<char>, std::allocator<char> >`.
    fn expanded_string(&mut self) -> Result<NodeId> {
        let base = self.well_known("basic_string");
        let ch = self.alloc(Node::Builtin(builtin(b'c').unwrap()));
        let traits_base = self.well_known("char_traits");
        let traits = self.alloc(Node::Template {
            name: traits_base,
            args: vec![ch],
        });
        let alloc_base = self.well_known("allocator");
        let alloc = self.alloc(Node::Template {
            name: alloc_base,
            args: vec![ch],
        });
        Ok(self.alloc(Node::Template {
            name: base,
            args: vec![ch, traits, alloc],
        }))
    }

    fn well_known_stream(&mut self, short: &str, long: &str) -> Result<NodeId> {
        if !self.opts.verbose() {
            return Ok(self.well_known(short));
        }
        let base = self.well_known(long);
        let ch = self.alloc(Node::Builtin(builtin(b'c').unwrap()));
        let traits_base = self.well_known("char_traits");
        let traits = self.alloc(Node::Template {
            name: traits_base,
            args: vec![ch],
        });
        Ok(self.alloc(Node::Template {
            name: base,
            args: vec![ch, traits],
        }))
    }

    // ---- types --------------------------------------------------------

    fn parse_type(&mut self) -> Result<NodeId> {
        self.enter()?;
        let result = self.parse_type_inner();
        self.exit();
        result
    }

    fn parse_type_inner(&mut self) -> Result<NodeId> {
        let byte = match self.input.peek() {
            Some(b) => b,
            None => return self.fail("expected type"),
        };

        // Qualifier cluster: `r`, `V`, `K` and vendor `U<name>` compose onto
        // the type that follows and form a single substitution candidate.
        if matches!(byte, b'r' | b'V' | b'K' | b'U')
            && !(byte == b'U' && matches!(self.input.peek_at(1), Some(b'l') | Some(b't')))
        {
            let mut quals = CvQuals::empty();
            let mut vendor: Vec<(Box<str>, Vec<NodeId>)> = Vec::new();
            loop {
                match self.input.peek() {
                    Some(b'r') => {
                        self.input.take();
                        quals |= CvQuals::RESTRICT;
                    }
                    Some(b'V') => {
                        self.input.take();
                        quals |= CvQuals::VOLATILE;
                    }
                    Some(b'K') => {
                        self.input.take();
                        quals |= CvQuals::CONST;
                    }
                    Some(b'U') => {
                        self.input.take();
                        let name = self.parse_source_name()?;
                        let name = match self.arena.get(name) {
                            Node::Name(s) => s.clone(),
                            _ => unreachable!(),
                        };
                        let args = if self.input.peek() == Some(b'I') {
                            self.parse_template_args()?
                        } else {
                            Vec::new()
                        };
                        vendor.push((name, args));
                    }
                    _ => break,
                }
            }
            let mut node = self.parse_type()?;
            for (name, args) in vendor.into_iter().rev() {
                node = self.alloc(Node::VendorQual {
                    name,
                    args,
                    inner: node,
                });
            }
            if !quals.is_empty() {
                node = self.alloc(Node::Qual { quals, inner: node });
            }
            self.subs.push(node);
            return Ok(node);
        }

        match byte {
            b'P' => {
                self.input.take();
                let inner = self.parse_type()?;
                let node = self.alloc(Node::Pointer { inner });
                self.subs.push(node);
                Ok(node)
            }
            b'R' => {
                self.input.take();
                let inner = self.parse_type()?;
                let node = self.alloc(Node::LvalueRef { inner });
                self.subs.push(node);
                Ok(node)
            }
            b'O' => {
                self.input.take();
                let inner = self.parse_type()?;
                let node = self.alloc(Node::RvalueRef { inner });
                self.subs.push(node);
                Ok(node)
            }
            b'C' => {
                self.input.take();
                let inner = self.parse_type()?;
                let node = self.alloc(Node::Complex { inner });
                self.subs.push(node);
                Ok(node)
            }
            b'G' => {
                self.input.take();
                let inner = self.parse_type()?;
                let node = self.alloc(Node::Imaginary { inner });
                self.subs.push(node);
                Ok(node)
            }
            b'F' => {
                let node = self.parse_function_type(None, false)?;
                self.subs.push(node);
                Ok(node)
            }
            b'A' => self.parse_array_type(),
            b'M' => {
                self.input.take();
                let class = self.parse_type()?;
                let member = self.parse_type()?;
                let node = self.alloc(Node::PtrMem { class, member });
                self.subs.push(node);
                Ok(node)
            }
            b'T' => {
                let tp = self.parse_template_param()?;
                self.subs.push(tp);
                if self.input.peek() == Some(b'I') {
                    let args = self.parse_template_args()?;
                    let node = self.alloc(Node::Template { name: tp, args });
                    self.subs.push(node);
                    return Ok(node);
                }
                Ok(tp)
            }
            b'D' => self.parse_d_type(),
            b'u' => {
                self.input.take();
                let node = self.parse_source_name()?;
                self.subs.push(node);
                Ok(node)
            }
            b'S' => {
                match self.input.peek_at(1) {
                    Some(b't') | Some(b'a') | Some(b'b') | Some(b's') | Some(b'i')
                    | Some(b'o') | Some(b'd') => {
                        // A well-known or `std::`-scoped class-enum type.
                        let name = self.parse_name()?;
                        if !name.from_subst {
                            self.subs.push(name.node);
                        }
                        Ok(name.node)
                    }
                    _ => {
                        let node = self.parse_substitution()?;
                        if self.input.peek() == Some(b'I') {
                            let args = self.parse_template_args()?;
                            let out = self.alloc(Node::Template { name: node, args });
                            self.subs.push(out);
                            return Ok(out);
                        }
                        Ok(node)
                    }
                }
            }
            b'N' | b'Z' | b'0'..=b'9' | b'L' => {
                let name = self.parse_name()?;
                self.subs.push(name.node);
                Ok(name.node)
            }
            _ => {
                if let Some(b) = builtin(byte) {
                    self.input.take();
                    return Ok(self.alloc(Node::Builtin(b)));
                }
                self.fail("expected type")
            }
        }
    }

    fn parse_array_type(&mut self) -> Result<NodeId> {
        self.input.take();
        let len = match self.input.peek() {
            Some(b'0'..=b'9') => {
                let digits = self.parse_raw_digits()?;
                Some(self.name_node(&digits))
            }
            Some(b'_') => None,
            _ => Some(self.parse_expr()?),
        };
        if !self.input.eat(b'_') {
            return self.fail("expected _ after array length");
        }
        let elem = self.parse_type()?;
        let node = self.alloc(Node::Array { len, elem });
        self.subs.push(node);
        Ok(node)
    }

    fn parse_function_type(
        &mut self,
        exception: Option<NodeId>,
        _transaction: bool,
    ) -> Result<NodeId> {
        if !self.input.eat(b'F') {
            return self.fail("expected function type");
        }
        let extern_c = self.input.eat(b'Y');
        let ret = self.parse_type()?;
        let mut params = Vec::new();
        let mut ref_qual = RefQual::None;
        loop {
            match self.input.peek() {
                Some(b'E') => {
                    self.input.take();
                    break;
                }
                Some(b'R') if self.input.peek_at(1) == Some(b'E') => {
                    self.input.take();
                    ref_qual = RefQual::LValue;
                }
                Some(b'O') if self.input.peek_at(1) == Some(b'E') => {
                    self.input.take();
                    ref_qual = RefQual::RValue;
                }
                None => return self.fail("expected E after function type"),
                _ => params.push(self.parse_type()?),
            }
        }
        Ok(self.alloc(Node::Function {
            ret: Some(ret),
            params,
            cv: CvQuals::empty(),
            ref_qual,
            exception,
            extern_c,
        }))
    }

    fn parse_decltype(&mut self) -> Result<NodeId> {
        // `Dt <expression> E` / `DT <expression> E`
        self.input.take();
        self.input.take();
        let expr = self.parse_expr()?;
        if !self.input.eat(b'E') {
            return self.fail("expected E after decltype");
        }
        let node = self.alloc(Node::Decltype { expr });
        Ok(node)
    }

    fn parse_d_type(&mut self) -> Result<NodeId> {
        let second = match self.input.peek_at(1) {
            Some(b) => b,
            None => return self.fail("expected type"),
        };
        match second {
            b'd' | b'e' | b'h' | b'i' | b's' | b'u' | b'a' | b'c' | b'n' => {
                self.input.take();
                self.input.take();
                let b = builtin_d(second).expect("covered by match");
                Ok(self.alloc(Node::Builtin(b)))
            }
            b'F' => {
                // `DF <bits> _`: _FloatN
                self.input.take();
                self.input.take();
                let digits = self.parse_raw_digits()?;
                if !self.input.eat(b'_') {
                    return self.fail("expected _ after float bits");
                }
                Ok(self.name_node(&format!("_Float{digits}")))
            }
            b'B' | b'U' => {
                self.input.take();
                self.input.take();
                let signed = second == b'B';
                let size = match self.input.peek() {
                    Some(b'0'..=b'9') => {
                        let digits = self.parse_raw_digits()?;
                        self.name_node(&digits)
                    }
                    _ => self.parse_expr()?,
                };
                if !self.input.eat(b'_') {
                    return self.fail("expected _ after bit-precise size");
                }
                let node = self.alloc(Node::BitInt { size, signed });
                self.subs.push(node);
                Ok(node)
            }
            b't' | b'T' => {
                let node = self.parse_decltype()?;
                self.subs.push(node);
                Ok(node)
            }
            b'p' => {
                self.input.take();
                self.input.take();
                let pattern = self.parse_type()?;
                let node = self.alloc(Node::PackExpansion { pattern });
                Ok(node)
            }
            b'v' => {
                self.input.take();
                self.input.take();
                let len = match self.input.peek() {
                    Some(b'0'..=b'9') => {
                        let digits = self.parse_raw_digits()?;
                        Some(self.name_node(&digits))
                    }
                    Some(b'_') => {
                        self.input.take();
                        let expr = self.parse_expr()?;
                        Some(expr)
                    }
                    _ => None,
                };
                if !self.input.eat(b'_') {
                    return self.fail("expected _ after vector length");
                }
                let elem = self.parse_type()?;
                let node = self.alloc(Node::Vector { len, elem });
                self.subs.push(node);
                Ok(node)
            }
            b'x' => {
                // Transaction-safe function type.
                self.input.take();
                self.input.take();
                let node = self.parse_function_type(None, true)?;
                self.subs.push(node);
                Ok(node)
            }
            b'o' => {
                self.input.take();
                self.input.take();
                let spec = self.alloc(Node::NoexceptSpec { expr: None });
                let node = self.parse_function_type(Some(spec), false)?;
                self.subs.push(node);
                Ok(node)
            }
            b'O' => {
                self.input.take();
                self.input.take();
                let expr = self.parse_expr()?;
                if !self.input.eat(b'E') {
                    return self.fail("expected E after noexcept expression");
                }
                let spec = self.alloc(Node::NoexceptSpec { expr: Some(expr) });
                let node = self.parse_function_type(Some(spec), false)?;
                self.subs.push(node);
                Ok(node)
            }
            b'w' => {
                self.input.take();
                self.input.take();
                let mut types = Vec::new();
                while self.input.peek() != Some(b'E') {
                    if self.input.is_empty() {
                        return self.fail("expected E after throw spec");
                    }
                    types.push(self.parse_type()?);
                }
                self.input.take();
                let spec = self.alloc(Node::ThrowSpec { types });
                let node = self.parse_function_type(Some(spec), false)?;
                self.subs.push(node);
                Ok(node)
            }
            b'C' => {
                // Structured binding in type position.
                let comp = self.parse_unqualified_component(None)?;
                Ok(comp.node)
            }
            _ => self.fail("expected type"),
        }
    }

    // ---- expressions --------------------------------------------------

    fn parse_expr(&mut self) -> Result<NodeId> {
        self.enter()?;
        let result = self.parse_expr_inner();
        self.exit();
        result
    }

    fn parse_expr_inner(&mut self) -> Result<NodeId> {
        let rest = self.input.rest();
        let byte = match rest.first() {
            Some(b) => *b,
            None => return self.fail("expected expression"),
        };

        match byte {
            b'L' => return self.parse_expr_primary(),
            b'T' => return self.parse_template_param(),
            b'S' if !matches!(rest.get(1), Some(b'r')) => {
                let name = self.parse_name()?;
                return Ok(name.node);
            }
            b'0'..=b'9' => return self.parse_simple_id(),
            _ => {}
        }

        let code = match rest.get(..2) {
            Some(c) => c,
            None => return self.fail("expected expression"),
        };
        match code {
            b"cl" => {
                self.input.eat_slice(b"cl");
                let callee = self.parse_expr()?;
                let mut args = Vec::new();
                while self.input.peek() != Some(b'E') {
                    if self.input.is_empty() {
                        return self.fail("expected expression");
                    }
                    args.push(self.parse_expr()?);
                }
                self.input.take();
                Ok(self.alloc(Node::Call { callee, args }))
            }
            b"cv" => {
                self.input.eat_slice(b"cv");
                let was = self.in_conversion;
                self.in_conversion = true;
                let to = self.parse_type();
                self.in_conversion = was;
                let to = to?;
                let args = if self.input.eat(b'_') {
                    let mut args = Vec::new();
                    while self.input.peek() != Some(b'E') {
                        if self.input.is_empty() {
                            return self.fail("expected expression");
                        }
                        args.push(self.parse_expr()?);
                    }
                    self.input.take();
                    args
                } else {
                    vec![self.parse_expr()?]
                };
                Ok(self.alloc(Node::Cast { to, args }))
            }
            b"dc" | b"sc" | b"cc" | b"rc" => {
                let name = match code {
                    b"dc" => "dynamic_cast",
                    b"sc" => "static_cast",
                    b"cc" => "const_cast",
                    _ => "reinterpret_cast",
                };
                self.input.take();
                self.input.take();
                let to = self.parse_type()?;
                let expr = self.parse_expr()?;
                Ok(self.alloc(Node::NamedCast { name, to, expr }))
            }
            b"tl" | b"il" => {
                let typed = code == b"tl";
                self.input.take();
                self.input.take();
                let ty = if typed { Some(self.parse_type()?) } else { None };
                let mut values = Vec::new();
                while self.input.peek() != Some(b'E') {
                    if self.input.is_empty() {
                        return self.fail("expected expression");
                    }
                    values.push(self.parse_expr()?);
                }
                self.input.take();
                Ok(self.alloc(Node::InitList { ty, values }))
            }
            b"gs" => {
                self.input.eat_slice(b"gs");
                let rest = self.input.rest();
                match rest.get(..2) {
                    Some(b"nw") | Some(b"na") => self.parse_new(true),
                    Some(b"dl") | Some(b"da") => self.parse_delete(true),
                    _ => self.fail("expected expression"),
                }
            }
            b"nw" | b"na" => self.parse_new(false),
            b"dl" | b"da" => self.parse_delete(false),
            b"dt" | b"pt" | b"ds" => {
                let kind = match code {
                    b"dt" => MemberKind::Dot,
                    b"pt" => MemberKind::Arrow,
                    _ => MemberKind::DotStar,
                };
                self.input.take();
                self.input.take();
                let object = self.parse_expr()?;
                let member = self.parse_unresolved_name()?;
                Ok(self.alloc(Node::Member {
                    kind,
                    object,
                    member,
                }))
            }
            b"ix" => {
                self.input.eat_slice(b"ix");
                let op = ops::by_code(b"ix").expect("table entry");
                let left = self.parse_expr()?;
                let right = self.parse_expr()?;
                Ok(self.alloc(Node::Binary { op, left, right }))
            }
            b"qu" => {
                self.input.eat_slice(b"qu");
                let cond = self.parse_expr()?;
                let then = self.parse_expr()?;
                let els = self.parse_expr()?;
                Ok(self.alloc(Node::Trinary { cond, then, els }))
            }
            b"st" | b"at" | b"ti" => {
                let keyword = match code {
                    b"st" => "sizeof ",
                    b"at" => "alignof ",
                    _ => "typeid ",
                };
                self.input.take();
                self.input.take();
                let ty = self.parse_type()?;
                Ok(self.alloc(Node::KeywordExpr {
                    keyword,
                    operand: ty,
                }))
            }
            b"sz" | b"az" | b"te" | b"nx" => {
                let keyword = match code {
                    b"sz" => "sizeof ",
                    b"az" => "alignof ",
                    b"te" => "typeid ",
                    _ => "noexcept ",
                };
                self.input.take();
                self.input.take();
                let expr = self.parse_expr()?;
                Ok(self.alloc(Node::KeywordExpr {
                    keyword,
                    operand: expr,
                }))
            }
            b"sZ" => {
                self.input.eat_slice(b"sZ");
                let pack = match self.input.peek() {
                    Some(b'T') => self.parse_template_param()?,
                    Some(b'f') => self.parse_function_param()?,
                    _ => return self.fail("missing argument pack"),
                };
                Ok(self.alloc(Node::SizeofPack { pack }))
            }
            b"sP" => {
                self.input.eat_slice(b"sP");
                let mut args = Vec::new();
                while self.input.peek() != Some(b'E') {
                    if self.input.is_empty() {
                        return self.fail("expected E after argument pack");
                    }
                    args.push(self.parse_template_arg()?);
                }
                self.input.take();
                let pack = self.alloc(Node::ArgPack { args });
                Ok(self.alloc(Node::SizeofPack { pack }))
            }
            b"sp" => {
                self.input.eat_slice(b"sp");
                let pattern = self.parse_expr()?;
                Ok(self.alloc(Node::PackExpansion { pattern }))
            }
            b"sr" => self.parse_unresolved_name(),
            b"on" => self.parse_unresolved_name(),
            b"dn" => self.parse_unresolved_name(),
            b"tw" => {
                self.input.eat_slice(b"tw");
                let operand = self.parse_expr()?;
                Ok(self.alloc(Node::Throw {
                    operand: Some(operand),
                }))
            }
            b"tr" => {
                self.input.eat_slice(b"tr");
                Ok(self.alloc(Node::Throw { operand: None }))
            }
            b"fp" => self.parse_function_param(),
            b"fL" if matches!(rest.get(2), Some(b'0'..=b'9')) => self.parse_function_param(),
            b"fl" | b"fr" | b"fL" | b"fR" => {
                let (left, binary) = match code {
                    b"fl" => (true, false),
                    b"fr" => (false, false),
                    b"fL" => (true, true),
                    _ => (false, true),
                };
                self.input.take();
                self.input.take();
                let op = {
                    let rest = self.input.rest();
                    let code = match rest.get(..2) {
                        Some(c) => c,
                        None => return self.fail("expected expression"),
                    };
                    match ops::by_code(code) {
                        Some(op) => {
                            self.input.take();
                            self.input.take();
                            op
                        }
                        None => return self.fail("expected expression"),
                    }
                };
                let first = self.parse_expr()?;
                let second = if binary { Some(self.parse_expr()?) } else { None };
                let (init, pack) = if binary {
                    if left {
                        (Some(first), second.expect("binary fold"))
                    } else {
                        (second, first)
                    }
                } else {
                    (None, first)
                };
                Ok(self.alloc(Node::Fold {
                    left,
                    op,
                    init,
                    pack,
                }))
            }
            _ => {
                if let Some(op) = ops::by_code(code) {
                    self.input.take();
                    self.input.take();
                    match op.arity {
                        1 => {
                            // Prefix increment/decrement carry a marker.
                            if matches!(code, b"pp" | b"mm") {
                                self.input.eat(b'_');
                            }
                            let operand = self.parse_expr()?;
                            Ok(self.alloc(Node::Unary { op, operand }))
                        }
                        2 => {
                            let left = self.parse_expr()?;
                            let right = self.parse_expr()?;
                            Ok(self.alloc(Node::Binary { op, left, right }))
                        }
                        _ => self.fail("expected expression"),
                    }
                } else {
                    self.fail("expected expression")
                }
            }
        }
    }

    fn parse_new(&mut self, global: bool) -> Result<NodeId> {
        let array = self.input.rest().starts_with(b"na");
        self.input.take();
        self.input.take();
        let mut place = Vec::new();
        while self.input.peek() != Some(b'_') {
            if self.input.is_empty() {
                return self.fail("expected _ after placement arguments");
            }
            place.push(self.parse_expr()?);
        }
        self.input.take();
        let ty = self.parse_type()?;
        let init = if self.input.eat_slice(b"pi") {
            let mut args = Vec::new();
            while self.input.peek() != Some(b'E') {
                if self.input.is_empty() {
                    return self.fail("expected E after initializer");
                }
                args.push(self.parse_expr()?);
            }
            self.input.take();
            Some(args)
        } else if self.input.eat(b'E') {
            None
        } else {
            return self.fail("expected E after new expression");
        };
        Ok(self.alloc(Node::New {
            global,
            array,
            place,
            ty,
            init,
        }))
    }

    fn parse_delete(&mut self, global: bool) -> Result<NodeId> {
        let array = self.input.rest().starts_with(b"da");
        self.input.take();
        self.input.take();
        let operand = self.parse_expr()?;
        Ok(self.alloc(Node::Delete {
            global,
            array,
            operand,
        }))
    }

    fn parse_function_param(&mut self) -> Result<NodeId> {
        if self.input.eat_slice(b"fpT") {
            return Ok(self.alloc(Node::FunctionParam { index: None }));
        }
        if self.input.eat_slice(b"fL") {
            self.parse_number_digits()?;
            if !self.input.eat(b'p') {
                return self.fail("expected function parameter");
            }
        } else if !self.input.eat_slice(b"fp") {
            return self.fail("expected function parameter");
        }
        self.parse_cv_quals();
        let index = match self.input.peek() {
            Some(b'0'..=b'9') => self.parse_number_digits()? + 1,
            _ => 0,
        };
        if !self.input.eat(b'_') {
            return self.fail("expected _ after function parameter");
        }
        Ok(self.alloc(Node::FunctionParam { index: Some(index) }))
    }

    /// `<simple-id>`: a source name with optional template arguments, used
    /// in expression position.
    fn parse_simple_id(&mut self) -> Result<NodeId> {
        let name = self.parse_source_name()?;
        if self.input.peek() == Some(b'I') {
            let args = self.parse_template_args()?;
            return Ok(self.alloc(Node::Template { name, args }));
        }
        Ok(name)
    }

    fn parse_unresolved_name(&mut self) -> Result<NodeId> {
        let rest = self.input.rest();
        if rest.starts_with(b"on") {
            self.input.eat_slice(b"on");
            let op = self.parse_operator_name()?;
            if self.input.peek() == Some(b'I') {
                let args = self.parse_template_args()?;
                return Ok(self.alloc(Node::Template { name: op, args }));
            }
            return Ok(op);
        }
        if rest.starts_with(b"dn") {
            self.input.eat_slice(b"dn");
            let name = match self.input.peek() {
                Some(b'0'..=b'9') => self.parse_simple_id()?,
                _ => self.parse_type()?,
            };
            let leaf = self.leaf_name(name);
            return Ok(self.alloc(Node::Dtor {
                name: leaf,
                kind: DtorKind::Complete,
            }));
        }
        if rest.starts_with(b"sr") {
            self.input.eat_slice(b"sr");
            match self.input.peek() {
                Some(b'T') | Some(b'D') | Some(b'S') => {
                    // `sr <unresolved-type> <base-unresolved-name>`
                    let scope = self.parse_type()?;
                    let base = self.parse_base_unresolved_name()?;
                    return Ok(self.qualified(scope, base));
                }
                Some(b'N') => {
                    self.input.take();
                    let mut scope = self.parse_type()?;
                    while self.input.peek() != Some(b'E') {
                        if self.input.is_empty() {
                            return self.fail("expected E after unresolved name");
                        }
                        let level = self.parse_simple_id()?;
                        scope = self.qualified(scope, level);
                    }
                    self.input.take();
                    let base = self.parse_base_unresolved_name()?;
                    return Ok(self.qualified(scope, base));
                }
                _ => {
                    // `sr <unresolved-qualifier-level>+ E <base-unresolved-name>`
                    let mut scope: Option<NodeId> = None;
                    loop {
                        if self.input.eat(b'E') {
                            break;
                        }
                        if self.input.is_empty() {
                            return self.fail("expected E after unresolved name");
                        }
                        let level = self.parse_simple_id()?;
                        scope = Some(match scope {
                            None => level,
                            Some(prior) => self.qualified(prior, level),
                        });
                    }
                    let scope = match scope {
                        Some(s) => s,
                        None => return self.fail("expected unresolved qualifier"),
                    };
                    let base = self.parse_base_unresolved_name()?;
                    return Ok(self.qualified(scope, base));
                }
            }
        }
        self.parse_base_unresolved_name()
    }

    fn parse_base_unresolved_name(&mut self) -> Result<NodeId> {
        match self.input.peek() {
            Some(b'0'..=b'9') => self.parse_simple_id(),
            Some(b'o') if self.input.peek_at(1) == Some(b'n') => {
                self.input.eat_slice(b"on");
                let op = self.parse_operator_name()?;
                if self.input.peek() == Some(b'I') {
                    let args = self.parse_template_args()?;
                    return Ok(self.alloc(Node::Template { name: op, args }));
                }
                Ok(op)
            }
            Some(b'd') if self.input.peek_at(1) == Some(b'n') => self.parse_unresolved_name(),
            _ => self.fail("expected unresolved name"),
        }
    }

    fn parse_expr_primary(&mut self) -> Result<NodeId> {
        if !self.input.eat(b'L') {
            return self.fail("expected literal");
        }
        if self.input.rest().starts_with(b"_Z") {
            self.input.eat_slice(b"_Z");
            let enc = self.parse_encoding()?;
            if !self.input.eat(b'E') {
                return self.fail("expected E after mangled name literal");
            }
            // External name literals print as the bare name.
            let name = match self.arena.get(enc) {
                Node::Encoding { name, .. } => *name,
                _ => enc,
            };
            return Ok(name);
        }

        let ty = self.parse_type()?;

        // `LDnE` and `LDn0E`: the null pointer literal.
        if let Node::Builtin(b) = self.arena.get(ty) {
            if b.gnu == "decltype(nullptr)" {
                self.input.eat(b'0');
                if !self.input.eat(b'E') {
                    return self.fail("expected E after literal");
                }
                return Ok(self.alloc(Node::NullPtr));
            }
        }

        let neg = self.input.eat(b'n');
        let mut value = String::new();
        if neg {
            value.push('-');
        }
        while let Some(b) = self.input.peek() {
            if b == b'E' {
                break;
            }
            value.push(self.input.take().unwrap() as char);
        }
        if !self.input.eat(b'E') {
            return self.fail("expected E after literal");
        }
        Ok(self.alloc(Node::Literal {
            ty,
            value: value.into(),
        }))
    }

    // ---- numbers ------------------------------------------------------

    fn parse_number_digits(&mut self) -> Result<usize> {
        let mut seen = false;
        let mut n: usize = 0;
        while let Some(b @ b'0'..=b'9') = self.input.peek() {
            seen = true;
            n = match n
                .checked_mul(10)
                .and_then(|n| n.checked_add((b - b'0') as usize))
            {
                Some(n) => n,
                None => return self.fail("number overflow"),
            };
            self.input.take();
        }
        if !seen {
            return self.fail("expected positive number");
        }
        Ok(n)
    }

    fn parse_raw_digits(&mut self) -> Result<String> {
        let mut digits = String::new();
        while let Some(b @ b'0'..=b'9') = self.input.peek() {
            digits.push(b as char);
            self.input.take();
        }
        if digits.is_empty() {
            return self.fail("expected positive number");
        }
        Ok(digits)
    }
}

struct Component {
    node: NodeId,
    no_return_type: bool,
}

impl Component {
    fn plain(node: NodeId) -> Component {
        Component {
            node,
            no_return_type: false,
        }
    }

    fn ctor_dtor(node: NodeId) -> Component {
        Component {
            node,
            no_return_type: true,
        }
    }
}

macro_rules! builtins {
    ( $( $code:literal => ($gnu:literal, $llvm:literal) ),* $(,)? ) => {
        pub(crate) fn builtin(code: u8) -> Option<&'static crate::ast::Builtin> {
            match code {
                $( $code => {
                    static B: crate::ast::Builtin = crate::ast::Builtin {
                        gnu: $gnu,
                        llvm: $llvm,
                    };
                    Some(&B)
                } )*
                _ => None,
            }
        }
    };
}

builtins! {
    b'v' => ("void", "void"),
    b'w' => ("wchar_t", "wchar_t"),
    b'b' => ("bool", "bool"),
    b'c' => ("char", "char"),
    b'a' => ("signed char", "signed char"),
    b'h' => ("unsigned char", "unsigned char"),
    b's' => ("short", "short"),
    b't' => ("unsigned short", "unsigned short"),
    b'i' => ("int", "int"),
    b'j' => ("unsigned int", "unsigned int"),
    b'l' => ("long", "long"),
    b'm' => ("unsigned long", "unsigned long"),
    b'x' => ("long long", "long long"),
    b'y' => ("unsigned long long", "unsigned long long"),
    b'n' => ("__int128", "__int128"),
    b'o' => ("unsigned __int128", "unsigned __int128"),
    b'f' => ("float", "float"),
    b'd' => ("double", "double"),
    b'e' => ("long double", "long double"),
    b'g' => ("__float128", "__float128"),
    b'z' => ("...", "..."),
}

macro_rules! builtins_d {
    ( $( $code:literal => ($gnu:literal, $llvm:literal) ),* $(,)? ) => {
        pub(crate) fn builtin_d(code: u8) -> Option<&'static crate::ast::Builtin> {
            match code {
                $( $code => {
                    static B: crate::ast::Builtin = crate::ast::Builtin {
                        gnu: $gnu,
                        llvm: $llvm,
                    };
                    Some(&B)
                } )*
                _ => None,
            }
        }
    };
}

builtins_d! {
    b'd' => ("decimal64", "decimal64"),
    b'e' => ("decimal128", "decimal128"),
    b'h' => ("half", "_Float16"),
    b'i' => ("char32_t", "char32_t"),
    b's' => ("char16_t", "char16_t"),
    b'u' => ("char8_t", "char8_t"),
    b'a' => ("auto", "auto"),
    b'c' => ("decltype(auto)", "decltype(auto)"),
    b'n' => ("decltype(nullptr)", "std::nullptr_t"),
}
