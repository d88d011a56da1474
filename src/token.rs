use std::{fmt, ops::Range};

use crate::util::intern::Interned;

/// Maximum length, in bytes, of the raw text of a single token.
pub const MAX_TOKEN_LEN: usize = 63;

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    lo: usize,
    len: u32,
    pos: Position,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, pos: Position) -> Token {
        Token {
            kind,
            lo: span.lo,
            len: span.len,
            pos,
        }
    }

    pub fn span(&self) -> Span {
        Span {
            len: self.len,
            lo: self.lo,
        }
    }

    pub fn pos(&self) -> Position {
        self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Returns the source text this token was lexed from. Structural tokens
    /// (end of line, end of input, placeholders) have no raw text.
    pub fn raw<'src>(&self, src: &'src str) -> Option<&'src str> {
        match self.kind {
            TokenKind::Eol | TokenKind::Eof | TokenKind::Empty => None,
            _ if self.len == 0 => None,
            _ => Some(self.span().substr(src)),
        }
    }

    /// Turns this token into a consumed placeholder, to be dropped by the
    /// compaction pass.
    pub fn clear(&mut self) {
        self.kind = TokenKind::Empty;
        self.len = 0;
    }

    /// Extends this token's span so that it also covers `other`.
    pub fn extend_to(&mut self, other: &Token) {
        let hi = other.span().hi();
        debug_assert!(hi >= self.lo);
        self.len = u32::try_from(hi - self.lo).unwrap_or(u32::MAX);
    }

    /// Wraps the provided value with this token's location.
    pub fn wrap<T>(&self, inner: T) -> Spanned<T> {
        Spanned {
            span: self.span(),
            pos: self.pos,
            inner,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {}, {})", self.kind, self.span(), self.pos)
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub len: u32,
    pub lo: usize,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        Self::new_of_length(lo, u32::try_from(hi - lo).unwrap_or(u32::MAX))
    }

    pub fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    pub fn hi(&self) -> usize {
        self.lo + self.len as usize
    }

    pub fn range(&self) -> Range<usize> {
        self.lo..self.hi()
    }

    pub fn substr<'src>(&self, src: &'src str) -> &'src str {
        &src[self.range()]
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

/// A human-facing source location. Both fields are 1-based.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Position {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Some value tied to a location in the source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub pos: Position,
    pub inner: T,
}

/// The closed set of types a declaration may carry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VarType {
    Void,
    I32,
}

impl VarType {
    /// Size in bytes of a stack slot holding this type, if it has storage.
    pub const fn size(self) -> Option<u32> {
        match self {
            VarType::Void => None,
            VarType::I32 => Some(4),
        }
    }

    /// The operand size keyword used to address a slot of this type.
    pub const fn ptr_keyword(self) -> Option<&'static str> {
        match self {
            VarType::Void => None,
            VarType::I32 => Some("DWORD PTR"),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            VarType::Void => "void",
            VarType::I32 => "i32",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// A consumed token, waiting to be removed by compaction.
    Empty,
    Eol,
    Eof,
    /// `//`
    Comment,

    /// `@`
    At,
    Var,
    Mov,
    Add,
    Func,
    /// `<-`
    ArrowL,
    Comma,
    Colon,
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,

    TypeVoid,
    TypeI32,

    /// Any other word. Its text is the token's raw text.
    Symbol,

    // Produced by the recognizer.
    NewVar { name: Interned, ty: VarType },
    VarRef { name: Interned },
    LitI32(i32),
    FuncDecl { ret: VarType, label: Interned },
}

impl TokenKind {
    /// Returns the declared type if this is a type marker.
    pub const fn as_type(self) -> Option<VarType> {
        match self {
            TokenKind::TypeVoid => Some(VarType::Void),
            TokenKind::TypeI32 => Some(VarType::I32),
            _ => None,
        }
    }

    /// A short human-readable description, used in diagnostics.
    pub const fn describe(self) -> &'static str {
        use TokenKind::*;
        match self {
            Empty => "<empty>",
            Eol => "end of line",
            Eof => "end of input",
            Comment => "`//`",
            At => "`@`",
            Var => "`var`",
            Mov => "`mov`",
            Add => "`add`",
            Func => "`func`",
            ArrowL => "`<-`",
            Comma => "`,`",
            Colon => "`:`",
            Dot => "`.`",
            LParen => "`(`",
            RParen => "`)`",
            LBrace => "`{`",
            RBrace => "`}`",
            TypeVoid => "`void`",
            TypeI32 => "`i32`",
            Symbol => "symbol",
            NewVar { .. } => "variable declaration",
            VarRef { .. } => "variable reference",
            LitI32(_) => "integer literal",
            FuncDecl { .. } => "function declaration",
        }
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "//" => TokenKind::Comment,
    "func" => TokenKind::Func,
    "mov" => TokenKind::Mov,
    "add" => TokenKind::Add,
    "var" => TokenKind::Var,
    "<-" => TokenKind::ArrowL,
    "void" => TokenKind::TypeVoid,
    "i32" => TokenKind::TypeI32,
    "," => TokenKind::Comma,
    ":" => TokenKind::Colon,
    "." => TokenKind::Dot,
    "(" => TokenKind::LParen,
    ")" => TokenKind::RParen,
    "{" => TokenKind::LBrace,
    "}" => TokenKind::RBrace,
    "@" => TokenKind::At,
};

/// Characters that always form a token of their own, with or without
/// surrounding whitespace (`600,i32` lexes like `600 , i32`).
pub const fn is_punctuation(byte: u8) -> bool {
    matches!(
        byte,
        b'{' | b'}' | b'(' | b')' | b':' | b',' | b'.' | b'@'
    )
}
