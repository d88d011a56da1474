use std::io;

use crate::{
    token::{Token, TokenKind},
    util::intern::Interner,
};

pub struct Context<'a> {
    pub ident_interner: &'a Interner,
    pub src: &'a str,
}

/// Analogous to [`std::fmt::Display`], but also contains the unit context,
/// such as the current [`Interner`].
pub trait Show {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result;

    /// Returns a type which can be displayed.
    fn display(&self, ctx: &Context<'_>) -> impl std::fmt::Display
    where
        Self: Sized,
    {
        Display(self, ctx)
    }
}

struct Display<'this, 'ctx, 'a, T: Show>(pub &'this T, pub &'ctx Context<'a>);

impl<T> std::fmt::Display for Display<'_, '_, '_, T>
where
    T: Show,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Display(this, ctx) = self;
        this.show(f, ctx)
    }
}

impl Show for Token {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        let name = |name| ctx.ident_interner.get(name);
        write!(f, "{:<7} ", self.pos().to_string())?;
        match self.kind {
            TokenKind::FuncDecl { ret, label } => write!(f, "func {}: {ret}", name(label)),
            TokenKind::NewVar { name: var, ty } => write!(f, "var {}: {ty}", name(var)),
            TokenKind::VarRef { name: var } => write!(f, "ref {}", name(var)),
            TokenKind::LitI32(value) => write!(f, "lit {value}"),
            TokenKind::Symbol => write!(f, "symbol {:?}", self.raw(ctx.src).unwrap_or_default()),
            other => f.write_str(other.describe()),
        }
    }
}

/// Lists one token per line, with its position.
pub fn print_tokens(w: &mut impl io::Write, ctx: &Context<'_>, tokens: &[Token]) -> io::Result<()> {
    for token in tokens {
        writeln!(w, "{}", token.display(ctx))?;
    }
    Ok(())
}

pub fn print_tokens_string(ctx: &Context<'_>, tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|token| format!("{}\n", token.display(ctx)))
        .collect()
}
