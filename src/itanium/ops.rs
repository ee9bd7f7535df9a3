//! The operator table: two-letter wire codes to source spellings.
//!
//! `sym` is the bare token used inside expressions, `name` the spelling in
//! name position. Codes with their own grammar (`cl`, `cv`, `nw`, `li`, ...)
//! are parsed specially and only consult this table for name position.

use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, PartialEq, Eq)]
pub struct OpInfo {
    pub code: &'static str,
    pub sym: &'static str,
    pub name: &'static str,
    pub arity: u8,
}

macro_rules! ops {
    ( $( ($code:literal, $sym:literal, $name:literal, $arity:literal) ),* $(,)? ) => {
        &[ $( OpInfo { code: $code, sym: $sym, name: $name, arity: $arity } ),* ]
    };
}

pub static OPS: &[OpInfo] = ops![
    ("aa", "&&", "operator&&", 2),
    ("ad", "&", "operator&", 1),
    ("an", "&", "operator&", 2),
    ("aN", "&=", "operator&=", 2),
    ("aS", "=", "operator=", 2),
    ("aw", "co_await ", "operator co_await", 1),
    ("cl", "()", "operator()", 2),
    ("cm", ",", "operator,", 2),
    ("co", "~", "operator~", 1),
    ("da", "delete[] ", "operator delete[]", 1),
    ("de", "*", "operator*", 1),
    ("dl", "delete ", "operator delete", 1),
    ("ds", ".*", "operator.*", 2),
    ("dt", ".", "operator.", 2),
    ("dv", "/", "operator/", 2),
    ("dV", "/=", "operator/=", 2),
    ("eo", "^", "operator^", 2),
    ("eO", "^=", "operator^=", 2),
    ("eq", "==", "operator==", 2),
    ("ge", ">=", "operator>=", 2),
    ("gt", ">", "operator>", 2),
    ("ix", "[]", "operator[]", 2),
    ("le", "<=", "operator<=", 2),
    ("ls", "<<", "operator<<", 2),
    ("lS", "<<=", "operator<<=", 2),
    ("lt", "<", "operator<", 2),
    ("mi", "-", "operator-", 2),
    ("mI", "-=", "operator-=", 2),
    ("ml", "*", "operator*", 2),
    ("mL", "*=", "operator*=", 2),
    ("mm", "--", "operator--", 1),
    ("na", "new[] ", "operator new[]", 3),
    ("ne", "!=", "operator!=", 2),
    ("ng", "-", "operator-", 1),
    ("nt", "!", "operator!", 1),
    ("nw", "new ", "operator new", 3),
    ("oo", "||", "operator||", 2),
    ("or", "|", "operator|", 2),
    ("oR", "|=", "operator|=", 2),
    ("pl", "+", "operator+", 2),
    ("pL", "+=", "operator+=", 2),
    ("pm", "->*", "operator->*", 2),
    ("pp", "++", "operator++", 1),
    ("ps", "+", "operator+", 1),
    ("pt", "->", "operator->", 2),
    ("qu", "?", "operator?:", 3),
    ("rm", "%", "operator%", 2),
    ("rM", "%=", "operator%=", 2),
    ("rs", ">>", "operator>>", 2),
    ("rS", ">>=", "operator>>=", 2),
    ("ss", "<=>", "operator<=>", 2),
];

static BY_CODE: Lazy<HashMap<&'static [u8], &'static OpInfo>> = Lazy::new(|| {
    OPS.iter().map(|op| (op.code.as_bytes(), op)).collect()
});

/// Look an operator up by its two-letter wire code.
pub fn by_code(code: &[u8]) -> Option<&'static OpInfo> {
    BY_CODE.get(code).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup() {
        assert_eq!(by_code(b"pl").unwrap().name, "operator+");
        assert_eq!(by_code(b"ss").unwrap().sym, "<=>");
        assert!(by_code(b"zz").is_none());
    }

    #[test]
    fn codes_are_unique() {
        assert_eq!(BY_CODE.len(), OPS.len());
    }
}
