use std::io;

use crate::{
    codegen::x86_64::Generator,
    config::Config,
    symtab,
    token::{Spanned, Token, VarType},
    util::intern::Interner,
};

mod x86_64;
mod x86_64_env;


/// Emits the assembly of a recognized token sequence into `writer`.
///
/// The returned diagnostics are non-fatal to the pass itself: every statement
/// is visited, so all resolution errors of a unit are reported together.
pub fn generate<W>(
    writer: W,
    ident_interner: &Interner,
    config: &Config,
    tokens: &[Token],
) -> io::Result<Vec<Spanned<Error>>>
where
    W: io::Write,
{
    type DarwinGenerator<'a, W> = Generator<'a, W, x86_64_env::Darwin>;
    type LinuxGenerator<'a, W> = Generator<'a, W, x86_64_env::Linux>;

    match config.target {
        Target::x86_64_darwin => {
            DarwinGenerator::new(writer, ident_interner, config).generate(tokens)
        }
        Target::x86_64_linux => {
            LinuxGenerator::new(writer, ident_interner, config).generate(tokens)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("variable `{name}` is not declared in this scope")]
    UndeclaredVariable { name: Box<str> },
    #[error("variable `{name}` is already declared in this scope")]
    DuplicateVariable { name: Box<str> },
    #[error("variable `{name}` is declared outside of a scope")]
    DeclarationOutsideScope { name: Box<str> },
    #[error("variable `{name}` has type {ty}, which has no storage")]
    NoStorage { name: Box<str>, ty: VarType },
    #[error("expected {expected}, but found {found}")]
    UnsupportedOperand {
        expected: &'static str,
        found: &'static str,
    },
    #[error("missing operand, expected {expected}")]
    MissingOperand { expected: &'static str },
    #[error("scopes cannot be nested")]
    NestedScope,
    #[error("`}}` does not close any scope")]
    UnbalancedClose,
    #[error("scope is never closed")]
    UnclosedScope,
    #[error("unexpected {found}")]
    Unexpected { found: &'static str },
    #[error(transparent)]
    SymbolTable(#[from] symtab::Error),
}

#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Target {
    x86_64_darwin,
    #[default]
    x86_64_linux,
}

impl Target {
    pub const ALL: &[Target] = &[Target::x86_64_darwin, Target::x86_64_linux];

    pub const fn triple(&self) -> &'static str {
        match self {
            Target::x86_64_darwin => "x86_64-apple-darwin",
            Target::x86_64_linux => "x86_64-unknown-linux-gnu",
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::x86_64_darwin => f.write_str("x86_64_darwin"),
            Target::x86_64_linux => f.write_str("x86_64_linux"),
        }
    }
}
