//! The formatter half: walks the arena and emits the demangled string.
//!
//! Types with declarators (`int (*)(char)`) are printed in two halves,
//! `type_pre` and `type_post`, because C declarator syntax wraps the inner
//! type around the outer one. Template parameters resolve against the stack
//! of template scopes live at the moment they are printed, which is what
//! makes shared substitution subtrees come out right.

use crate::ast::{Arena, CvQuals, MemberKind, Node, NodeId, RefQual};
use crate::error::{Error, Result};
use crate::{Flags, Options};

pub(crate) fn format(arena: &Arena, root: NodeId, opts: &Options) -> Result<String> {
    let mut fmt = Formatter::new(arena, opts);
    fmt.top(root);
    if let Some(err) = fmt.error.take() {
        return Err(err);
    }
    if fmt.truncated {
        return Err(Error::Truncated(fmt.out));
    }
    Ok(fmt.out)
}

/// How a function encoding prints.
#[derive(Clone, Copy, PartialEq)]
enum Mode {
    /// The symbol itself: `NoParams` strips it down to the bare name.
    Top,
    /// The function part of a local name: no return type, and
    /// `NoEnclosingParams` empties the parameter list.
    Enclosing,
    /// Anywhere else (thunk targets, global ctor bodies): always full.
    Inner,
}

struct Frame {
    args: Vec<NodeId>,
    /// Index of the argument this frame is currently printing, to refuse
    /// self-referential lookups.
    active: Option<usize>,
}

struct Formatter<'a> {
    arena: &'a Arena,
    opts: &'a Options,
    out: String,
    max: usize,
    truncated: bool,
    depth: u32,
    error: Option<Error>,
    scopes: Vec<Frame>,
    /// Which element of a resolved argument pack is being expanded.
    pack_index: Option<usize>,
    /// Rust: number of `for<...>` binders currently open.
    bound_lifetimes: u64,
    /// Rust: a generic path prints `path::<args>` in path position but
    /// `path<args>` in type position.
    rust_type_ctx: bool,
}

impl<'a> Formatter<'a> {
    fn new(arena: &'a Arena, opts: &'a Options) -> Formatter<'a> {
        Formatter {
            arena,
            opts,
            out: String::with_capacity(64),
            max: opts.max_bytes(),
            truncated: false,
            depth: 0,
            error: None,
            scopes: Vec::new(),
            pack_index: None,
            bound_lifetimes: 0,
            rust_type_ctx: false,
        }
    }

    fn llvm(&self) -> bool {
        self.opts.flags.contains(Flags::LLVM_STYLE)
    }

    fn flag(&self, flag: Flags) -> bool {
        self.opts.flags.contains(flag)
    }

    // ---- output buffer ------------------------------------------------

    fn push(&mut self, s: &str) {
        if self.truncated {
            return;
        }
        let room = self.max - self.out.len();
        if s.len() <= room {
            self.out.push_str(s);
            return;
        }
        let mut end = room;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        self.out.push_str(&s[..end]);
        self.truncated = true;
    }

    fn last_char(&self) -> Option<char> {
        self.out.chars().next_back()
    }

    fn ensure_space(&mut self) {
        if !matches!(self.last_char(), Some(' ') | Some('(') | None) {
            self.push(" ");
        }
    }

    fn open_template(&mut self) {
        if self.last_char() == Some('<') {
            self.push(" ");
        }
        self.push("<");
    }

    fn close_template(&mut self) {
        if !self.llvm() && self.last_char() == Some('>') {
            self.push(" ");
        }
        self.push(">");
    }

    // ---- node dispatch ------------------------------------------------

    fn top(&mut self, id: NodeId) {
        match self.arena.get(id) {
            Node::CloneSuffix { base, suffix } => {
                self.top(*base);
                if !self.flag(Flags::NO_CLONES) {
                    let text = format!(" [clone .{suffix}]");
                    self.push(&text);
                }
            }
            Node::VendorSuffix { base, suffix } => {
                self.top(*base);
                if !self.flag(Flags::NO_CLONES) {
                    let text = format!(".{suffix}");
                    self.push(&text);
                }
            }
            Node::Encoding {
                name,
                ret,
                params,
                cv,
                ref_qual,
            } => self.encoding(*name, *ret, params, *cv, *ref_qual, Mode::Top),
            Node::EnableIf { body, args } => {
                let args = args.clone();
                self.top(*body);
                self.push(" [enable_if:");
                let mut first = true;
                for arg in args {
                    if !first {
                        self.push(", ");
                    }
                    first = false;
                    self.node(arg);
                }
                self.push("]");
            }
            _ => self.node(id),
        }
    }

    fn enter(&mut self) -> bool {
        self.depth += 1;
        if self.depth >= self.opts.max_depth {
            if self.error.is_none() {
                self.error = Some(Error::RecursionLimit);
            }
            return false;
        }
        true
    }

    fn exit(&mut self) {
        self.depth -= 1;
    }

    fn node(&mut self, id: NodeId) {
        if self.truncated || self.error.is_some() {
            return;
        }
        if !self.enter() {
            return;
        }
        self.node_inner(id);
        self.exit();
    }

    fn node_inner(&mut self, id: NodeId) {
        match self.arena.get(id) {
            // ---- shared names ----
            Node::Name(s) => {
                let s = s.clone();
                self.push(&s);
            }
            Node::Qualified { scope, name } => {
                let (scope, name) = (*scope, *name);
                self.node(scope);
                self.push("::");
                self.node(name);
            }
            Node::Template { name, args } => {
                let (name, args) = (*name, args.clone());
                self.scopes.push(Frame {
                    args: args.clone(),
                    active: None,
                });
                self.node(name);
                self.scopes.pop();
                self.template_args(&args);
            }
            Node::TemplateParam { index, level } => {
                self.template_param(*index, *level);
            }
            Node::LambdaAuto { index } => {
                if self.llvm() {
                    self.push("auto");
                } else {
                    let text = format!("auto:{}", index + 1);
                    self.push(&text);
                }
            }
            Node::FunctionParam { index } => match index {
                None => self.push("this"),
                Some(n) => {
                    let text = format!("{{parm#{}}}", n + 1);
                    self.push(&text);
                }
            },
            Node::Encoding {
                name,
                ret,
                params,
                cv,
                ref_qual,
            } => self.encoding(
                *name,
                *ret,
                params,
                *cv,
                *ref_qual,
                Mode::Inner,
            ),
            Node::LocalName { function, entity } => {
                let (function, entity) = (*function, *entity);
                self.local_name(function, entity);
            }
            Node::Operator(op) => self.push(op.name),
            Node::Conversion { to } => {
                let to = *to;
                self.push("operator ");
                self.type_(to);
            }
            Node::LiteralOp { suffix } => {
                let suffix = *suffix;
                self.push("operator\"\" ");
                self.node(suffix);
            }
            Node::Ctor { name, .. } => {
                let name = *name;
                self.node(name);
            }
            Node::Dtor { name, .. } => {
                let name = *name;
                self.push("~");
                self.node(name);
            }
            Node::Closure { sig, num, tpl } => {
                let (sig, num, tpl) = (sig.clone(), *num, tpl.clone());
                self.closure(&sig, num, &tpl);
            }
            Node::UnnamedType { num } => {
                let text = if self.llvm() {
                    match num {
                        None => "'unnamed'".to_owned(),
                        Some(n) => format!("'unnamed{n}'"),
                    }
                } else {
                    format!("{{unnamed type#{}}}", num.map_or(0, |n| n + 1) + 1)
                };
                self.push(&text);
            }
            Node::StructuredBinding { names } => {
                let names = names.clone();
                self.push("[");
                let mut first = true;
                for name in names {
                    if !first {
                        self.push(", ");
                    }
                    first = false;
                    self.node(name);
                }
                self.push("]");
            }
            Node::Tagged { name, tag } => {
                let (name, tag) = (*name, tag.clone());
                self.node(name);
                let text = format!("[abi:{tag}]");
                self.push(&text);
            }
            Node::CloneSuffix { base, suffix } => {
                let (base, suffix) = (*base, suffix.clone());
                self.node(base);
                if !self.flag(Flags::NO_CLONES) {
                    let text = format!(" [clone .{suffix}]");
                    self.push(&text);
                }
            }
            Node::VendorSuffix { base, suffix } => {
                let (base, suffix) = (*base, suffix.clone());
                self.node(base);
                if !self.flag(Flags::NO_CLONES) {
                    let text = format!(".{suffix}");
                    self.push(&text);
                }
            }
            Node::GlobalCtorDtor { ctor, body } => {
                let body = *body;
                self.push(if *ctor {
                    "global constructors keyed to "
                } else {
                    "global destructors keyed to "
                });
                self.node(body);
            }
            Node::Special { prefix, body } => {
                let (prefix, body) = (*prefix, *body);
                self.push(prefix);
                self.node(body);
            }
            Node::ConstructionVtable { derived, base } => {
                let (derived, base) = (*derived, *base);
                self.push("construction vtable for ");
                self.type_(base);
                self.push("-in-");
                self.type_(derived);
            }
            Node::EnableIf { .. } => self.top(id),

            // ---- types ----
            Node::Builtin(_)
            | Node::BitInt { .. }
            | Node::Qual { .. }
            | Node::VendorQual { .. }
            | Node::Pointer { .. }
            | Node::LvalueRef { .. }
            | Node::RvalueRef { .. }
            | Node::Complex { .. }
            | Node::Imaginary { .. }
            | Node::Array { .. }
            | Node::Vector { .. }
            | Node::PtrMem { .. }
            | Node::Function { .. }
            | Node::Elaborated { .. } => {
                self.type_pre(id);
                self.type_post(id);
            }
            Node::Decltype { expr } => {
                let expr = *expr;
                self.push("decltype (");
                self.node(expr);
                self.push(")");
            }
            Node::PackExpansion { pattern } => {
                let pattern = *pattern;
                self.pack_expansion(pattern);
            }
            Node::ArgPack { args } => {
                let args = args.clone();
                let mut first = true;
                for arg in args {
                    if !first {
                        self.push(", ");
                    }
                    first = false;
                    self.node(arg);
                }
            }
            Node::ThrowSpec { types } => {
                let types = types.clone();
                self.push(" throw (");
                let mut first = true;
                for ty in types {
                    if !first {
                        self.push(", ");
                    }
                    first = false;
                    self.type_(ty);
                }
                self.push(")");
            }
            Node::NoexceptSpec { expr } => {
                let expr = *expr;
                self.push(" noexcept");
                if let Some(expr) = expr {
                    self.push("(");
                    self.node(expr);
                    self.push(")");
                }
            }

            // ---- expressions ----
            Node::Unary { op, operand } => {
                let (op, operand) = (*op, *operand);
                self.push(op.sym);
                self.operand(operand);
            }
            Node::Binary { op, left, right } => {
                let (op, left, right) = (*op, *left, *right);
                match op.code {
                    "ix" => {
                        self.operand(left);
                        self.push("[");
                        self.node(right);
                        self.push("]");
                    }
                    "gt" => {
                        self.push("(");
                        self.operand(left);
                        self.push(op.sym);
                        self.operand(right);
                        self.push(")");
                    }
                    "cm" => {
                        self.operand(left);
                        self.push(", ");
                        self.operand(right);
                    }
                    _ => {
                        self.operand(left);
                        self.push(op.sym);
                        self.operand(right);
                    }
                }
            }
            Node::Trinary { cond, then, els } => {
                let (cond, then, els) = (*cond, *then, *els);
                self.operand(cond);
                self.push("?");
                self.operand(then);
                self.push(":");
                self.operand(els);
            }
            Node::Call { callee, args } => {
                let (callee, args) = (*callee, args.clone());
                self.operand(callee);
                self.push("(");
                let mut first = true;
                for arg in args {
                    if !first {
                        self.push(", ");
                    }
                    first = false;
                    self.node(arg);
                }
                self.push(")");
            }
            Node::Cast { to, args } => {
                let (to, args) = (*to, args.clone());
                self.push("(");
                self.type_(to);
                self.push(")");
                if args.len() == 1 && !self.arena.get(args[0]).is_operator_expr() {
                    self.node(args[0]);
                } else {
                    self.push("(");
                    let mut first = true;
                    for arg in args {
                        if !first {
                            self.push(", ");
                        }
                        first = false;
                        self.node(arg);
                    }
                    self.push(")");
                }
            }
            Node::NamedCast { name, to, expr } => {
                let (name, to, expr) = (*name, *to, *expr);
                self.push(name);
                self.open_template();
                self.type_(to);
                self.close_template();
                self.push("(");
                self.node(expr);
                self.push(")");
            }
            Node::InitList { ty, values } => {
                let (ty, values) = (*ty, values.clone());
                if let Some(ty) = ty {
                    self.type_(ty);
                }
                self.push("{");
                let mut first = true;
                for value in values {
                    if !first {
                        self.push(", ");
                    }
                    first = false;
                    self.node(value);
                }
                self.push("}");
            }
            Node::New {
                global,
                array,
                place,
                ty,
                init,
            } => {
                let (global, array) = (*global, *array);
                let (place, ty, init) = (place.clone(), *ty, init.clone());
                if global {
                    self.push("::");
                }
                self.push(if array { "new[] " } else { "new " });
                if !place.is_empty() {
                    self.push("(");
                    let mut first = true;
                    for expr in place {
                        if !first {
                            self.push(", ");
                        }
                        first = false;
                        self.node(expr);
                    }
                    self.push(") ");
                }
                self.type_(ty);
                if let Some(init) = init {
                    self.push("(");
                    let mut first = true;
                    for expr in init {
                        if !first {
                            self.push(", ");
                        }
                        first = false;
                        self.node(expr);
                    }
                    self.push(")");
                }
            }
            Node::Delete {
                global,
                array,
                operand,
            } => {
                let (global, array, operand) = (*global, *array, *operand);
                if global {
                    self.push("::");
                }
                self.push(if array { "delete[] " } else { "delete " });
                self.node(operand);
            }
            Node::Member {
                kind,
                object,
                member,
            } => {
                let (kind, object, member) = (*kind, *object, *member);
                self.operand(object);
                self.push(match kind {
                    MemberKind::Dot => ".",
                    MemberKind::Arrow => "->",
                    MemberKind::DotStar => ".*",
                });
                self.node(member);
            }
            Node::KeywordExpr { keyword, operand } => {
                let (keyword, operand) = (*keyword, *operand);
                self.push(keyword);
                self.push("(");
                self.node(operand);
                self.push(")");
            }
            Node::SizeofPack { pack } => {
                let pack = *pack;
                self.push("sizeof...(");
                self.node(pack);
                self.push(")");
            }
            Node::Fold {
                left,
                op,
                init,
                pack,
            } => {
                let (left, op, init, pack) = (*left, *op, *init, *pack);
                self.push("(");
                match (left, init) {
                    (true, None) => {
                        self.push("...");
                        self.push(op.sym);
                        self.operand(pack);
                    }
                    (false, None) => {
                        self.operand(pack);
                        self.push(op.sym);
                        self.push("...");
                    }
                    (true, Some(init)) => {
                        self.operand(init);
                        self.push(op.sym);
                        self.push("...");
                        self.push(op.sym);
                        self.operand(pack);
                    }
                    (false, Some(init)) => {
                        self.operand(pack);
                        self.push(op.sym);
                        self.push("...");
                        self.push(op.sym);
                        self.operand(init);
                    }
                }
                self.push(")");
            }
            Node::Throw { operand } => match operand {
                Some(operand) => {
                    let operand = *operand;
                    self.push("throw ");
                    self.node(operand);
                }
                None => self.push("throw"),
            },
            Node::Literal { ty, value } => {
                let (ty, value) = (*ty, value.clone());
                self.literal(ty, &value);
            }
            Node::NullPtr => self.push("nullptr"),

            // ---- Rust ----
            Node::RustNested {
                scope,
                ident,
                ns,
                dis,
            } => {
                let (scope, ident, ns, dis) = (*scope, *ident, *ns, *dis);
                self.node(scope);
                if ns.is_ascii_uppercase() {
                    self.push("::{");
                    match ns {
                        b'C' => self.push("closure"),
                        b'S' => self.push("shim"),
                        _ => {
                            let text = (ns as char).to_string();
                            self.push(&text);
                        }
                    }
                    if let Some(ident) = ident {
                        self.push(":");
                        self.node(ident);
                    }
                    let text = format!("#{dis}");
                    self.push(&text);
                    self.push("}");
                } else if let Some(ident) = ident {
                    self.push("::");
                    self.node(ident);
                }
            }
            Node::RustInherent { ty } => {
                let ty = *ty;
                self.push("<");
                let was = std::mem::replace(&mut self.rust_type_ctx, true);
                self.type_(ty);
                self.rust_type_ctx = was;
                self.push(">");
            }
            Node::RustTraitImpl { ty, tr } => {
                let (ty, tr) = (*ty, *tr);
                self.push("<");
                let was = std::mem::replace(&mut self.rust_type_ctx, true);
                self.type_(ty);
                self.push(" as ");
                self.node(tr);
                self.rust_type_ctx = was;
                self.push(">");
            }
            Node::RustGeneric { path, args } => {
                let (path, args) = (*path, args.clone());
                let in_type = self.rust_type_ctx;
                self.node(path);
                self.push(if in_type { "<" } else { "::<" });
                if !self.flag(Flags::NO_TEMPLATE_PARAMS) {
                    let was = std::mem::replace(&mut self.rust_type_ctx, true);
                    let mut first = true;
                    for arg in args {
                        if !first {
                            self.push(", ");
                        }
                        first = false;
                        self.node(arg);
                    }
                    self.rust_type_ctx = was;
                }
                self.push(">");
            }
            Node::RustLifetime { index } => {
                let index = *index;
                self.lifetime(index);
            }
            Node::RustRef { lt, mutable, inner } => {
                let (lt, mutable, inner) = (*lt, *mutable, *inner);
                self.push("&");
                if let Some(lt) = lt {
                    if let Node::RustLifetime { index } = self.arena.get(lt) {
                        let index = *index;
                        if index != 0 {
                            self.lifetime(index);
                            self.push(" ");
                        }
                    }
                }
                if mutable {
                    self.push("mut ");
                }
                self.rust_type(inner);
            }
            Node::RustRawPtr { mutable, inner } => {
                let (mutable, inner) = (*mutable, *inner);
                self.push(if mutable { "*mut " } else { "*const " });
                self.rust_type(inner);
            }
            Node::RustArray { elem, len } => {
                let (elem, len) = (*elem, *len);
                self.push("[");
                self.rust_type(elem);
                self.push("; ");
                self.node(len);
                self.push("]");
            }
            Node::RustSlice { elem } => {
                let elem = *elem;
                self.push("[");
                self.rust_type(elem);
                self.push("]");
            }
            Node::RustTuple { elems } => {
                let elems = elems.clone();
                self.push("(");
                let was = std::mem::replace(&mut self.rust_type_ctx, true);
                let mut first = true;
                for elem in &elems {
                    if !first {
                        self.push(", ");
                    }
                    first = false;
                    self.type_(*elem);
                }
                self.rust_type_ctx = was;
                if elems.len() == 1 {
                    self.push(",");
                }
                self.push(")");
            }
            Node::RustFn {
                binder,
                is_unsafe,
                abi,
                params,
                ret,
            } => {
                let (binder, is_unsafe) = (*binder, *is_unsafe);
                let (abi, params, ret) = (abi.clone(), params.clone(), *ret);
                let closed = self.open_binder(binder);
                if is_unsafe {
                    self.push("unsafe ");
                }
                if let Some(abi) = abi {
                    let text = format!("extern \"{abi}\" ");
                    self.push(&text);
                }
                self.push("fn(");
                let was = std::mem::replace(&mut self.rust_type_ctx, true);
                let mut first = true;
                for param in params {
                    if !first {
                        self.push(", ");
                    }
                    first = false;
                    self.type_(param);
                }
                self.push(")");
                if !matches!(self.arena.get(ret), Node::Name(n) if &**n == "()") {
                    self.push(" -> ");
                    self.type_(ret);
                }
                self.rust_type_ctx = was;
                self.close_binder(closed);
            }
            Node::RustDyn { binder, bounds, lt } => {
                let (binder, bounds, lt) = (*binder, bounds.clone(), *lt);
                self.push("dyn ");
                let closed = self.open_binder(binder);
                let was = std::mem::replace(&mut self.rust_type_ctx, true);
                let mut first = true;
                for bound in bounds {
                    if !first {
                        self.push(" + ");
                    }
                    first = false;
                    self.node(bound);
                }
                self.rust_type_ctx = was;
                self.close_binder(closed);
                if let Node::RustLifetime { index } = self.arena.get(lt) {
                    let index = *index;
                    if index != 0 {
                        self.push(" + ");
                        self.lifetime(index);
                    }
                }
            }
            Node::RustAssoc { name, ty } => {
                let (name, ty) = (name.clone(), *ty);
                self.push(&name);
                self.push(" = ");
                self.rust_type(ty);
            }
            Node::RustConstBool(v) => self.push(if *v { "true" } else { "false" }),
            Node::RustConstChar(c) => {
                let text = format!("{:?}", c);
                self.push(&text);
            }
            Node::RustConstInt { neg, value } => {
                let text = if *neg {
                    format!("-{value}")
                } else {
                    format!("{value}")
                };
                self.push(&text);
            }
            Node::RustConstPlaceholder => self.push("_"),
        }
    }

    /// Print an expression operand, parenthesised when it is itself an
    /// operator expression.
    fn operand(&mut self, id: NodeId) {
        if self.arena.get(id).is_operator_expr() {
            self.push("(");
            self.node(id);
            self.push(")");
        } else {
            self.node(id);
        }
    }

    // ---- encodings ----------------------------------------------------

    fn encoding(
        &mut self,
        name: NodeId,
        ret: Option<NodeId>,
        params: &[NodeId],
        cv: CvQuals,
        ref_qual: RefQual,
        mode: Mode,
    ) {
        let params = params.to_vec();
        let frame = rightmost_template_args(self.arena, name);
        let pushed = match frame {
            Some(args) => {
                self.scopes.push(Frame { args, active: None });
                true
            }
            None => false,
        };

        if mode == Mode::Top && self.flag(Flags::NO_PARAMS) {
            self.node(name);
        } else {
            if mode != Mode::Enclosing {
                if let Some(ret) = ret {
                    self.type_(ret);
                    self.ensure_space();
                }
            }
            self.node(name);
            if mode == Mode::Enclosing && self.flag(Flags::NO_ENCLOSING_PARAMS) {
                self.push("()");
            } else {
                self.param_list(&params);
            }
            self.quals_suffix(cv, ref_qual);
        }

        if pushed {
            self.scopes.pop();
        }
    }

    fn local_name(&mut self, function: NodeId, entity: NodeId) {
        match self.arena.get(function) {
            Node::Encoding {
                name,
                ret,
                params,
                cv,
                ref_qual,
            } => {
                let (name, ret) = (*name, *ret);
                let (params, cv, ref_qual) = (params.clone(), *cv, *ref_qual);
                self.encoding(name, ret, &params, cv, ref_qual, Mode::Enclosing);
                self.push("::");
                let frame = rightmost_template_args(self.arena, name);
                let pushed = match frame {
                    Some(args) => {
                        self.scopes.push(Frame { args, active: None });
                        true
                    }
                    None => false,
                };
                self.node(entity);
                if pushed {
                    self.scopes.pop();
                }
            }
            _ => {
                self.node(function);
                self.push("::");
                self.node(entity);
            }
        }
    }

    fn param_list(&mut self, params: &[NodeId]) {
        self.push("(");
        // Print `()` rather than `(void)`.
        if params.len() == 1 {
            if let Node::Builtin(b) = self.arena.get(params[0]) {
                if b.gnu == "void" {
                    self.push(")");
                    return;
                }
            }
        }
        let mut first = true;
        for &param in params {
            if self.is_empty_pack(param) {
                continue;
            }
            if !first {
                self.push(", ");
            }
            first = false;
            self.type_(param);
        }
        self.push(")");
    }

    fn quals_suffix(&mut self, cv: CvQuals, ref_qual: RefQual) {
        if cv.contains(CvQuals::CONST) {
            self.push(" const");
        }
        if cv.contains(CvQuals::VOLATILE) {
            self.push(" volatile");
        }
        if cv.contains(CvQuals::RESTRICT) {
            self.push(" restrict");
        }
        match ref_qual {
            RefQual::None => {}
            RefQual::LValue => self.push(" &"),
            RefQual::RValue => self.push(" &&"),
        }
    }

    fn closure(&mut self, sig: &[NodeId], num: Option<usize>, tpl: &[NodeId]) {
        if self.llvm() {
            let text = match num {
                None => "'lambda'".to_owned(),
                Some(n) => format!("'lambda{n}'"),
            };
            self.push(&text);
            if !tpl.is_empty() {
                self.push("<");
                let mut first = true;
                for &decl in tpl {
                    if !first {
                        self.push(", ");
                    }
                    first = false;
                    self.node(decl);
                }
                self.push(">");
            }
            self.param_list(sig);
        } else {
            self.push("{lambda");
            self.param_list(sig);
            let text = format!("#{}}}", num.map_or(0, |n| n + 1) + 1);
            self.push(&text);
        }
    }

    // ---- template scope -----------------------------------------------

    fn template_args(&mut self, args: &[NodeId]) {
        if self.flag(Flags::NO_TEMPLATE_PARAMS) {
            return;
        }
        self.open_template();
        let mut first = true;
        for &arg in args {
            if self.is_empty_pack(arg) {
                continue;
            }
            if !first {
                self.push(", ");
            }
            first = false;
            self.node(arg);
        }
        self.close_template();
    }

    fn template_param(&mut self, index: usize, level: Option<usize>) {
        let lookup = match level {
            Some(l) => self
                .scopes
                .get(l)
                .and_then(|frame| frame.args.get(index).copied()),
            None => match self.scopes.last() {
                Some(frame) => {
                    if frame.active.is_some_and(|active| index >= active) {
                        None
                    } else {
                        frame.args.get(index).copied()
                    }
                }
                None => None,
            },
        };
        let arg = match lookup {
            Some(arg) => arg,
            None => {
                let text = match level {
                    Some(l) => format!("TL{l}_{index}_"),
                    None => format!("TL{index}_"),
                };
                self.push(&text);
                return;
            }
        };

        // While this argument prints, later arguments of the same frame are
        // not resolvable; that breaks substitution cycles.
        let saved = if level.is_none() {
            let frame = self.scopes.last_mut().expect("frame checked above");
            std::mem::replace(&mut frame.active, Some(index))
        } else {
            None
        };

        if let Node::ArgPack { args } = self.arena.get(arg) {
            let args = args.clone();
            match self.pack_index {
                Some(i) => {
                    if let Some(&elem) = args.get(i) {
                        let saved_pack = self.pack_index.take();
                        self.type_(elem);
                        self.pack_index = saved_pack;
                    }
                }
                None => {
                    let mut first = true;
                    for arg in args {
                        if !first {
                            self.push(", ");
                        }
                        first = false;
                        self.type_(arg);
                    }
                }
            }
        } else {
            self.type_(arg);
        }

        if level.is_none() {
            if let Some(frame) = self.scopes.last_mut() {
                frame.active = saved;
            }
        }
    }

    /// Resolve through template parameters without printing.
    fn resolve(&self, mut id: NodeId) -> NodeId {
        let mut fuel = 64;
        loop {
            fuel -= 1;
            if fuel == 0 {
                return id;
            }
            match self.arena.get(id) {
                Node::TemplateParam { index, level } => {
                    let arg = match level {
                        Some(l) => self
                            .scopes
                            .get(*l)
                            .and_then(|frame| frame.args.get(*index).copied()),
                        None => self
                            .scopes
                            .last()
                            .and_then(|frame| frame.args.get(*index).copied()),
                    };
                    match arg {
                        Some(arg) => id = arg,
                        None => return id,
                    }
                }
                Node::ArgPack { args } => match self.pack_index.and_then(|i| args.get(i)) {
                    Some(&elem) => id = elem,
                    None => return id,
                },
                _ => return id,
            }
        }
    }

    // ---- packs --------------------------------------------------------

    fn pack_expansion(&mut self, pattern: NodeId) {
        match self.find_pack_len(pattern, 16) {
            Some(len) => {
                let saved = self.pack_index;
                let mut first = true;
                for i in 0..len {
                    if !first {
                        self.push(", ");
                    }
                    first = false;
                    self.pack_index = Some(i);
                    self.type_(pattern);
                }
                self.pack_index = saved;
            }
            None => {
                self.type_(pattern);
                self.push("...");
            }
        }
    }

    fn is_empty_pack(&self, id: NodeId) -> bool {
        match self.arena.get(self.resolve(id)) {
            Node::ArgPack { args } => args.is_empty(),
            Node::PackExpansion { pattern } => self.find_pack_len(*pattern, 16) == Some(0),
            _ => false,
        }
    }

    fn find_pack_len(&self, id: NodeId, fuel: u32) -> Option<usize> {
        if fuel == 0 {
            return None;
        }
        let fuel = fuel - 1;
        let resolved = self.resolve(id);
        match self.arena.get(resolved) {
            Node::ArgPack { args } => Some(args.len()),
            Node::Pointer { inner }
            | Node::LvalueRef { inner }
            | Node::RvalueRef { inner }
            | Node::Complex { inner }
            | Node::Imaginary { inner }
            | Node::Qual { inner, .. }
            | Node::VendorQual { inner, .. } => self.find_pack_len(*inner, fuel),
            Node::Array { elem, .. } | Node::Vector { elem, .. } => {
                self.find_pack_len(*elem, fuel)
            }
            Node::PtrMem { class, member } => self
                .find_pack_len(*class, fuel)
                .or_else(|| self.find_pack_len(*member, fuel)),
            Node::Function { params, .. } => params
                .iter()
                .find_map(|&p| self.find_pack_len(p, fuel)),
            Node::Template { name, args } => self
                .find_pack_len(*name, fuel)
                .or_else(|| args.iter().find_map(|&a| self.find_pack_len(a, fuel))),
            Node::Qualified { scope, name } => self
                .find_pack_len(*scope, fuel)
                .or_else(|| self.find_pack_len(*name, fuel)),
            _ => None,
        }
    }

    // ---- C++ type printing --------------------------------------------

    fn type_(&mut self, id: NodeId) {
        if self.truncated || self.error.is_some() {
            return;
        }
        if !self.enter() {
            return;
        }
        match self.arena.get(id) {
            Node::Builtin(_)
            | Node::BitInt { .. }
            | Node::Qual { .. }
            | Node::VendorQual { .. }
            | Node::Pointer { .. }
            | Node::LvalueRef { .. }
            | Node::RvalueRef { .. }
            | Node::Complex { .. }
            | Node::Imaginary { .. }
            | Node::Array { .. }
            | Node::Vector { .. }
            | Node::PtrMem { .. }
            | Node::Function { .. }
            | Node::Elaborated { .. } => {
                self.type_pre(id);
                self.type_post(id);
            }
            _ => self.node_inner(id),
        }
        self.exit();
    }

    fn type_pre(&mut self, id: NodeId) {
        match self.arena.get(id) {
            Node::Builtin(b) => {
                let name = if self.llvm() { b.llvm } else { b.gnu };
                self.push(name);
            }
            Node::BitInt { size, signed } => {
                let (size, signed) = (*size, *signed);
                if !signed {
                    self.push("unsigned ");
                }
                self.push("_BitInt(");
                self.node(size);
                self.push(")");
            }
            Node::Qual { .. } => {
                // Qualifiers merge across template-parameter resolution so
                // `const` over a substituted `volatile double` prints
                // `double const volatile`.
                let (quals, base) = self.unwrap_quals(id);
                self.type_pre(base);
                if quals.contains(CvQuals::CONST) {
                    self.push(" const");
                }
                if quals.contains(CvQuals::VOLATILE) {
                    self.push(" volatile");
                }
                if quals.contains(CvQuals::RESTRICT) {
                    self.push(" restrict");
                }
            }
            Node::VendorQual { name, args, inner } => {
                let (name, args, inner) = (name.clone(), args.clone(), *inner);
                self.type_pre(inner);
                self.push(" ");
                self.push(&name);
                if !args.is_empty() {
                    self.template_args(&args);
                }
            }
            Node::Pointer { inner } => {
                let inner = self.resolve(*inner);
                self.declarator_pre(inner, "*");
            }
            Node::LvalueRef { inner } => {
                let inner = self.collapse_ref(*inner);
                self.declarator_pre(inner, "&");
            }
            Node::RvalueRef { inner } => {
                let resolved = self.resolve(*inner);
                if let Node::LvalueRef { .. } = self.arena.get(resolved) {
                    // Reference collapsing: `&& + & = &`.
                    self.type_pre(resolved);
                    return;
                }
                self.declarator_pre(resolved, "&&");
            }
            Node::Complex { inner } => {
                let inner = *inner;
                self.type_pre(inner);
                self.push(" _Complex");
            }
            Node::Imaginary { inner } => {
                let inner = *inner;
                self.type_pre(inner);
                self.push(" _Imaginary");
            }
            Node::Array { elem, .. } => {
                let elem = *elem;
                self.type_pre(elem);
            }
            Node::Vector { elem, .. } => {
                let elem = *elem;
                self.type_pre(elem);
            }
            Node::PtrMem { class, member } => {
                let (class, member) = (*class, *member);
                let (fun, _) = self.member_function(member);
                match fun {
                    Some(fun) => {
                        if let Node::Function { ret, .. } = self.arena.get(fun) {
                            if let Some(ret) = *ret {
                                self.type_(ret);
                                self.ensure_space();
                            }
                        }
                        self.push("(");
                        self.node(class);
                        self.push("::*");
                    }
                    None => {
                        self.type_pre(member);
                        self.ensure_space();
                        self.node(class);
                        self.push("::*");
                    }
                }
            }
            Node::Function { ret, .. } => {
                let ret = *ret;
                if let Some(ret) = ret {
                    self.type_(ret);
                    self.push(" ");
                }
            }
            Node::Elaborated { keyword, inner } => {
                let (keyword, inner) = (*keyword, *inner);
                self.push(keyword);
                self.push(" ");
                self.type_(inner);
            }
            _ => self.node(id),
        }
    }

    fn type_post(&mut self, id: NodeId) {
        match self.arena.get(id) {
            Node::Qual { .. } => {
                let (_, base) = self.unwrap_quals(id);
                self.type_post(base);
            }
            Node::VendorQual { inner, .. } => {
                let inner = *inner;
                self.type_post(inner);
            }
            Node::Pointer { inner } => {
                let inner = self.resolve(*inner);
                self.declarator_post(inner);
            }
            Node::LvalueRef { inner } => {
                let inner = self.collapse_ref(*inner);
                self.declarator_post(inner);
            }
            Node::RvalueRef { inner } => {
                let resolved = self.resolve(*inner);
                if let Node::LvalueRef { .. } = self.arena.get(resolved) {
                    self.type_post(resolved);
                    return;
                }
                self.declarator_post(resolved);
            }
            Node::Array { len, elem } => {
                let (len, elem) = (*len, *elem);
                self.push(" [");
                if let Some(len) = len {
                    self.node(len);
                }
                self.push("]");
                self.array_tail(elem);
            }
            Node::Vector { len, elem } => {
                let (len, elem) = (*len, *elem);
                self.push(" __vector(");
                if let Some(len) = len {
                    self.node(len);
                }
                self.push(")");
                self.type_post(elem);
            }
            Node::PtrMem { member, .. } => {
                let member = *member;
                let (fun, quals) = self.member_function(member);
                match fun {
                    Some(fun) => {
                        self.push(")");
                        if let Node::Function {
                            params,
                            ref_qual,
                            exception,
                            ..
                        } = self.arena.get(fun)
                        {
                            let (params, ref_qual, exception) =
                                (params.clone(), *ref_qual, *exception);
                            self.param_list(&params);
                            self.quals_suffix(quals, ref_qual);
                            if let Some(exception) = exception {
                                self.node(exception);
                            }
                        }
                    }
                    None => self.type_post(member),
                }
            }
            Node::Function {
                params,
                cv,
                ref_qual,
                exception,
                ..
            } => {
                let (params, cv, ref_qual, exception) =
                    (params.clone(), *cv, *ref_qual, *exception);
                self.param_list(&params);
                self.quals_suffix(cv, ref_qual);
                if let Some(exception) = exception {
                    self.node(exception);
                }
            }
            _ => {}
        }
    }

    /// Print the trailing `[n][m]` chain of a multidimensional array
    /// without the space that separates the first `[` from the type.
    fn array_tail(&mut self, id: NodeId) {
        if let Node::Array { len, elem } = self.arena.get(id) {
            let (len, elem) = (*len, *elem);
            self.push("[");
            if let Some(len) = len {
                self.node(len);
            }
            self.push("]");
            self.array_tail(elem);
        }
    }

    fn declarator_pre(&mut self, inner: NodeId, sym: &str) {
        let needs_paren = matches!(
            self.arena.get(inner),
            Node::Function { .. } | Node::Array { .. } | Node::PtrMem { .. }
        );
        self.type_pre(inner);
        if needs_paren {
            self.ensure_space();
            self.push("(");
        }
        self.push(sym);
    }

    fn declarator_post(&mut self, inner: NodeId) {
        let needs_paren = matches!(
            self.arena.get(inner),
            Node::Function { .. } | Node::Array { .. } | Node::PtrMem { .. }
        );
        if needs_paren {
            self.push(")");
        }
        self.type_post(inner);
    }

    /// Accumulate the qualifier chain (resolving template parameters along
    /// the way) down to the first unqualified base type.
    fn unwrap_quals(&self, id: NodeId) -> (CvQuals, NodeId) {
        let mut quals = CvQuals::empty();
        let mut id = self.resolve(id);
        let mut fuel = 64;
        while fuel > 0 {
            fuel -= 1;
            match self.arena.get(id) {
                Node::Qual { quals: q, inner } => {
                    quals |= *q;
                    id = self.resolve(*inner);
                }
                _ => break,
            }
        }
        (quals, id)
    }

    /// `& + && = &`: an lvalue reference wrapped around any reference chain
    /// collapses to the innermost non-reference with a single `&`.
    fn collapse_ref(&self, inner: NodeId) -> NodeId {
        let resolved = self.resolve(inner);
        match self.arena.get(resolved) {
            Node::LvalueRef { inner } | Node::RvalueRef { inner } => self.collapse_ref(*inner),
            _ => resolved,
        }
    }

    /// For pointer-to-member printing: the member function type and the cv
    /// qualifiers wrapped around it, if the member is a function.
    fn member_function(&self, member: NodeId) -> (Option<NodeId>, CvQuals) {
        match self.arena.get(member) {
            Node::Function { .. } => (Some(member), CvQuals::empty()),
            Node::Qual { quals, inner } => match self.arena.get(*inner) {
                Node::Function { .. } => (Some(*inner), *quals),
                _ => (None, CvQuals::empty()),
            },
            _ => (None, CvQuals::empty()),
        }
    }

    // ---- literals -----------------------------------------------------

    fn literal(&mut self, ty: NodeId, value: &str) {
        if let Node::Builtin(b) = self.arena.get(ty) {
            let suffix = match b.gnu {
                "int" => Some(""),
                "unsigned int" => Some("u"),
                "long" => Some("l"),
                "unsigned long" => Some("ul"),
                "long long" => Some("ll"),
                "unsigned long long" => Some("ull"),
                _ => None,
            };
            if let Some(suffix) = suffix {
                self.push(value);
                self.push(suffix);
                return;
            }
            if b.gnu == "bool" {
                match value {
                    "0" => return self.push("false"),
                    "1" => return self.push("true"),
                    _ => {}
                }
            }
        }
        self.push("(");
        self.type_(ty);
        self.push(")");
        self.push(value);
    }

    // ---- Rust helpers -------------------------------------------------

    fn rust_type(&mut self, id: NodeId) {
        let was = std::mem::replace(&mut self.rust_type_ctx, true);
        self.type_(id);
        self.rust_type_ctx = was;
    }

    fn lifetime(&mut self, index: u64) {
        if index == 0 {
            self.push("'_");
            return;
        }
        match self.bound_lifetimes.checked_sub(index) {
            Some(depth) if depth < 26 => {
                let text = format!("'{}", (b'a' + depth as u8) as char);
                self.push(&text);
            }
            Some(depth) => {
                let text = format!("'_{depth}");
                self.push(&text);
            }
            None => self.push("'_"),
        }
    }

    fn open_binder(&mut self, count: u64) -> u64 {
        if count == 0 {
            return 0;
        }
        self.push("for<");
        for i in 0..count {
            if i > 0 {
                self.push(", ");
            }
            self.bound_lifetimes += 1;
            self.lifetime(1);
        }
        self.push("> ");
        count
    }

    fn close_binder(&mut self, count: u64) {
        self.bound_lifetimes -= count;
    }
}

/// The template argument list of the rightmost template in a name, which is
/// the scope a function encoding's return and parameter types resolve
/// against.
fn rightmost_template_args(arena: &Arena, id: NodeId) -> Option<Vec<NodeId>> {
    match arena.get(id) {
        Node::Template { args, .. } => Some(args.clone()),
        Node::Qualified { name, .. } => rightmost_template_args(arena, *name),
        Node::LocalName { entity, .. } => rightmost_template_args(arena, *entity),
        Node::Tagged { name, .. } => rightmost_template_args(arena, *name),
        Node::CloneSuffix { base, .. } | Node::VendorSuffix { base, .. } => {
            rightmost_template_args(arena, *base)
        }
        Node::Encoding { name, .. } => rightmost_template_args(arena, *name),
        _ => None,
    }
}
