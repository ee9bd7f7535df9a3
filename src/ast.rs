//! The node algebra shared by both parsers.
//!
//! Nodes live in a per-call [`Arena`] and refer to each other through
//! [`NodeId`] indices, never owning pointers. Itanium substitutions and Rust
//! back-references therefore share subtrees by id; the tree is immutable once
//! parsing finishes and the formatter resolves scope-sensitive nodes
//! (template parameters, lambda autos, lifetimes) when it walks it.

use bitflags::bitflags;

use crate::itanium::ops::OpInfo;

/// Handle to a node in an [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeId(u32);

#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub(crate) fn new() -> Arena {
        Arena {
            nodes: Vec::with_capacity(32),
        }
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }
}

bitflags! {
    /// `const`/`volatile`/`restrict` qualifier set.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct CvQuals: u8 {
        const CONST = 1;
        const VOLATILE = 1 << 1;
        const RESTRICT = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RefQual {
    #[default]
    None,
    /// `&` member function ref-qualifier.
    LValue,
    /// `&&` member function ref-qualifier.
    RValue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CtorKind {
    Complete,
    Base,
    Allocating,
    Inheriting,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DtorKind {
    Deleting,
    Complete,
    Base,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    /// `a.b`
    Dot,
    /// `a->b`
    Arrow,
    /// `a.*b`
    DotStar,
}

/// A built-in type: its spelling in each output flavour.
#[derive(Debug, PartialEq, Eq)]
pub struct Builtin {
    pub gnu: &'static str,
    pub llvm: &'static str,
}

/// One node of the tree. Variants hold only `NodeId` handles, scalars and
/// short strings; equality is structural.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    // ---- names --------------------------------------------------------
    /// A source identifier, already UTF-8 (punycode decoded for Rust v0).
    Name(Box<str>),
    /// `scope::name`.
    Qualified { scope: NodeId, name: NodeId },
    /// `name<args...>`.
    Template { name: NodeId, args: Vec<NodeId> },
    /// An unresolved reference into the template scope live at format time.
    /// `level` is `Some` for `TL<l>_<n>_` references.
    TemplateParam {
        index: usize,
        level: Option<usize>,
    },
    /// A generic lambda parameter; renders as `auto`.
    LambdaAuto { index: usize },
    /// `fp_` / `fp<n>_` (`None` means `fpT`, the `this` parameter).
    FunctionParam { index: Option<usize> },
    /// A whole function symbol: name plus its bare function type.
    Encoding {
        name: NodeId,
        ret: Option<NodeId>,
        params: Vec<NodeId>,
        cv: CvQuals,
        ref_qual: RefQual,
    },
    /// `Z <function> E <entity>`; the discriminator is parsed but unprinted.
    LocalName { function: NodeId, entity: NodeId },
    /// `operator+` and friends; see the operator table.
    Operator(&'static OpInfo),
    /// `operator <type>`.
    Conversion { to: NodeId },
    /// `operator"" _suffix`.
    LiteralOp { suffix: NodeId },
    Ctor { name: NodeId, kind: CtorKind },
    Dtor { name: NodeId, kind: DtorKind },
    /// `Ul <sig> E <n>_`: a lambda closure type. `tpl` holds the explicit
    /// template parameter declarations of a generic lambda.
    Closure {
        sig: Vec<NodeId>,
        tpl: Vec<NodeId>,
        num: Option<usize>,
    },
    /// `Ut <n>_`.
    UnnamedType { num: Option<usize> },
    /// `DC <name>+ E`: structured binding `[a, b]`.
    StructuredBinding { names: Vec<NodeId> },
    /// ABI tag: renders `name[abi:tag]`.
    Tagged { name: NodeId, tag: Box<str> },
    /// GCC clone suffix: renders `base [clone .suffix]`.
    CloneSuffix { base: NodeId, suffix: Box<str> },
    /// Rust symbols keep their vendor suffix verbatim.
    VendorSuffix { base: NodeId, suffix: Box<str> },
    /// `_GLOBAL__I_` / `_GLOBAL__D_`.
    GlobalCtorDtor { ctor: bool, body: NodeId },
    /// vtable/VTT/typeinfo/guard/thunk/... : `<prefix><body>`.
    Special {
        prefix: &'static str,
        body: NodeId,
    },
    /// `TC`: renders `construction vtable for <base>-in-<derived>`.
    ConstructionVtable { derived: NodeId, base: NodeId },
    /// Clang `enable_if` attribute on a function.
    EnableIf { body: NodeId, args: Vec<NodeId> },

    // ---- types --------------------------------------------------------
    Builtin(&'static Builtin),
    /// `DB <size> _` / `DU <size> _`.
    BitInt { size: NodeId, signed: bool },
    Qual { quals: CvQuals, inner: NodeId },
    /// Vendor extended qualifier `U <name> [<args>]`.
    VendorQual {
        name: Box<str>,
        args: Vec<NodeId>,
        inner: NodeId,
    },
    Pointer { inner: NodeId },
    LvalueRef { inner: NodeId },
    RvalueRef { inner: NodeId },
    Complex { inner: NodeId },
    Imaginary { inner: NodeId },
    Array {
        len: Option<NodeId>,
        elem: NodeId,
    },
    Vector {
        len: Option<NodeId>,
        elem: NodeId,
    },
    PtrMem { class: NodeId, member: NodeId },
    Function {
        ret: Option<NodeId>,
        params: Vec<NodeId>,
        cv: CvQuals,
        ref_qual: RefQual,
        exception: Option<NodeId>,
        extern_c: bool,
    },
    /// `throw(<types>)` on a function type.
    ThrowSpec { types: Vec<NodeId> },
    /// `noexcept` / `noexcept(<expr>)` on a function type.
    NoexceptSpec { expr: Option<NodeId> },
    Decltype { expr: NodeId },
    /// `Dp <type>`: pattern with `...` appended.
    PackExpansion { pattern: NodeId },
    /// `J <args> E`: a template argument pack.
    ArgPack { args: Vec<NodeId> },
    /// `Ts`/`Tu`/`Te` elaborated type keyword.
    Elaborated {
        keyword: &'static str,
        inner: NodeId,
    },

    // ---- expressions --------------------------------------------------
    Unary {
        op: &'static OpInfo,
        operand: NodeId,
    },
    Binary {
        op: &'static OpInfo,
        left: NodeId,
        right: NodeId,
    },
    Trinary {
        cond: NodeId,
        then: NodeId,
        els: NodeId,
    },
    Call {
        callee: NodeId,
        args: Vec<NodeId>,
    },
    /// `(to)(args...)` conversion expression.
    Cast { to: NodeId, args: Vec<NodeId> },
    /// `tl`/`il` braced initializer list.
    InitList {
        ty: Option<NodeId>,
        values: Vec<NodeId>,
    },
    /// `dc`/`sc`/`cc`/`rc`: `static_cast<T>(expr)` and friends.
    NamedCast {
        name: &'static str,
        to: NodeId,
        expr: NodeId,
    },
    New {
        global: bool,
        array: bool,
        place: Vec<NodeId>,
        ty: NodeId,
        init: Option<Vec<NodeId>>,
    },
    Delete {
        global: bool,
        array: bool,
        operand: NodeId,
    },
    Member {
        kind: MemberKind,
        object: NodeId,
        member: NodeId,
    },
    /// `st`/`at`/`sz`/`az`/`ti`/`te`: keyword applied to a type or expression.
    KeywordExpr {
        keyword: &'static str,
        operand: NodeId,
    },
    /// `sZ`: `sizeof...(pack)`.
    SizeofPack { pack: NodeId },
    /// `fl`/`fr`/`fL`/`fR` fold expressions.
    Fold {
        left: bool,
        op: &'static OpInfo,
        init: Option<NodeId>,
        pack: NodeId,
    },
    Throw { operand: Option<NodeId> },
    /// `L <type> <value> E`. The value keeps its sign.
    Literal { ty: NodeId, value: Box<str> },
    /// `LDnE`.
    NullPtr,

    // ---- Rust v0 ------------------------------------------------------
    /// `N <ns> <scope> <ident>`. Uppercase namespaces render
    /// `{closure#d}`-style blocks, lowercase render `scope::ident`.
    RustNested {
        scope: NodeId,
        ident: Option<NodeId>,
        ns: u8,
        dis: u64,
    },
    /// `M`: `<Type>`.
    RustInherent { ty: NodeId },
    /// `X`/`Y`: `<Type as Trait>`.
    RustTraitImpl { ty: NodeId, tr: NodeId },
    /// `I <path> <args> E`; prints `path::<args>` in path position and
    /// `path<args>` in type position.
    RustGeneric { path: NodeId, args: Vec<NodeId> },
    /// De Bruijn index relative to the binders live at format time.
    RustLifetime { index: u64 },
    RustRef {
        lt: Option<NodeId>,
        mutable: bool,
        inner: NodeId,
    },
    RustRawPtr { mutable: bool, inner: NodeId },
    RustArray { elem: NodeId, len: NodeId },
    RustSlice { elem: NodeId },
    RustTuple { elems: Vec<NodeId> },
    RustFn {
        binder: u64,
        is_unsafe: bool,
        abi: Option<Box<str>>,
        params: Vec<NodeId>,
        ret: NodeId,
    },
    RustDyn {
        binder: u64,
        bounds: Vec<NodeId>,
        lt: NodeId,
    },
    /// `p <ident> <type>` associated-type binding inside `dyn` bounds.
    RustAssoc { name: Box<str>, ty: NodeId },
    RustConstBool(bool),
    RustConstChar(char),
    RustConstInt { neg: bool, value: u128 },
    /// `Kp`: an unknown const placeholder, `_`.
    RustConstPlaceholder,
}

impl Node {
    /// Whether an expression node spells an operator and therefore needs
    /// parentheses when used as an operand of another operator.
    pub(crate) fn is_operator_expr(&self) -> bool {
        matches!(
            self,
            Node::Unary { .. }
                | Node::Binary { .. }
                | Node::Trinary { .. }
                | Node::Call { .. }
                | Node::Cast { .. }
                | Node::Member { .. }
                | Node::Fold { .. }
                | Node::Throw { .. }
                | Node::New { .. }
                | Node::Delete { .. }
                | Node::NamedCast { .. }
        )
    }
}
