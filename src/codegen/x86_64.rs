use std::{format_args as f, io, marker::PhantomData};

use crate::{
    codegen::{x86_64_env, Error},
    config::Config,
    symtab::{self, SymbolTable},
    token::{Spanned, Token, TokenKind, VarType},
    util::intern::{Interned, Interner},
};

/// Initial number of buckets of a scope's symbol table.
const SCOPE_CAPACITY: usize = 32;

pub struct Generator<'a, W, E> {
    writer: W,
    ident_interner: &'a Interner,
    entry_label: &'a str,
    scope: Option<Scope>,
    errors: Vec<Spanned<Error>>,
    indent: bool,
    _env: PhantomData<E>,
}

/// The single active scope. It is allocated by the first `{` and reset, not
/// reallocated, by every `}`.
struct Scope {
    open: bool,
    /// Bytes allocated below the frame base so far.
    offset: u32,
    table: SymbolTable<'static, Interned, StackSlot>,
}

#[derive(Copy, Clone, Debug)]
struct StackSlot {
    offset: u32,
    ptr: &'static str,
}

impl<'a, W, E> Generator<'a, W, E>
where
    W: io::Write,
    E: x86_64_env::Env,
{
    pub fn new(writer: W, ident_interner: &'a Interner, config: &'a Config) -> Self {
        Generator {
            writer,
            ident_interner,
            entry_label: &config.entry_label,
            scope: None,
            errors: Vec::new(),
            indent: false,
            _env: PhantomData,
        }
    }

    /// Emits the whole unit. Statement-level errors do not stop generation;
    /// they are returned once the pass is over. Only sink failures abort.
    #[tracing::instrument(level = "debug", skip_all, fields(tokens = tokens.len()))]
    pub fn generate(mut self, tokens: &[Token]) -> io::Result<Vec<Spanned<Error>>> {
        self.g_program_prologue()?;

        let mut cursor = 0;
        while let Some(token) = tokens.get(cursor) {
            cursor += 1;
            match token.kind {
                TokenKind::FuncDecl { label, .. } => self.g_label(label)?,
                TokenKind::LBrace => self.g_scope_open(token)?,
                TokenKind::RBrace => self.g_scope_close(token)?,
                TokenKind::NewVar { name, ty } => self.declare(token, name, ty),
                TokenKind::Mov => cursor += self.g_mov(token, &tokens[cursor..])?,
                TokenKind::Eol | TokenKind::Empty => {}
                TokenKind::Eof => {
                    if self.scope.as_ref().is_some_and(|scope| scope.open) {
                        self.error(token, Error::UnclosedScope);
                    }
                }
                other => self.error(
                    token,
                    Error::Unexpected {
                        found: other.describe(),
                    },
                ),
            }
        }

        self.g_trampoline()?;
        self.writer.flush()?;
        tracing::debug!(errors = self.errors.len(), "generation finished");
        Ok(self.errors)
    }
}

/// Target-specific functions.
impl<W, E> Generator<'_, W, E>
where
    W: io::Write,
    E: x86_64_env::Env,
{
    fn g_program_prologue(&mut self) -> io::Result<()> {
        self.out(E::GLOBAL_PROLOGUE)?;
        self.out(f!(".section {}", E::SECTION_TEXT))?;
        self.out(f!(".global {}", E::START_SYMBOL))?;
        self.out_line()
    }

    fn g_label(&mut self, label: Interned) -> io::Result<()> {
        let label = self.ident_interner.get(label);
        self.out(f!("{label}:"))
    }

    fn g_scope_open(&mut self, token: &Token) -> io::Result<()> {
        let scope = match self.scope.take() {
            Some(scope) => scope,
            None => match SymbolTable::with_capacity(SCOPE_CAPACITY) {
                Ok(table) => Scope {
                    open: false,
                    offset: 0,
                    table,
                },
                Err(error) => {
                    self.error(token, error.into());
                    return Ok(());
                }
            },
        };
        let nested = scope.open;
        self.scope = Some(Scope { open: true, ..scope });
        if nested {
            self.error(token, Error::NestedScope);
            return Ok(());
        }

        self.indent = true;
        self.out("push rbp")?;
        self.out("mov rbp, rsp")
    }

    fn g_scope_close(&mut self, token: &Token) -> io::Result<()> {
        let Some(scope) = self.scope.as_mut().filter(|scope| scope.open) else {
            self.error(token, Error::UnbalancedClose);
            return Ok(());
        };
        scope.open = false;
        scope.offset = 0;
        scope.table.clear();

        self.out("pop rbp")?;
        self.out("ret")?;
        self.indent = false;
        self.out_line()
    }

    fn declare(&mut self, token: &Token, name: Interned, ty: VarType) {
        if let Err(error) = self.try_declare(name, ty) {
            self.error(token, error);
        }
    }

    fn try_declare(&mut self, name: Interned, ty: VarType) -> Result<(), Error> {
        let ident = self.ident_interner.get(name);
        let Some(scope) = self.scope.as_mut().filter(|scope| scope.open) else {
            return Err(Error::DeclarationOutsideScope { name: ident.into() });
        };
        let (Some(size), Some(ptr)) = (ty.size(), ty.ptr_keyword()) else {
            return Err(Error::NoStorage {
                name: ident.into(),
                ty,
            });
        };

        let offset = scope.offset + size;
        match scope.table.insert_owned(name, &StackSlot { offset, ptr }) {
            Ok(()) => {
                scope.offset = offset;
                tracing::trace!(name = ident, offset, "allocated stack slot");
                Ok(())
            }
            Err(symtab::Error::DuplicateKey) => {
                Err(Error::DuplicateVariable { name: ident.into() })
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Emits a `mov` whose operands start at `rest`. Returns how many tokens
    /// were consumed; a failing statement is consumed up to its end of line.
    fn g_mov(&mut self, mov: &Token, rest: &[Token]) -> io::Result<usize> {
        let statement_len = rest
            .iter()
            .position(|token| matches!(token.kind, TokenKind::Eol | TokenKind::Eof))
            .unwrap_or(rest.len());

        let Some((dst, name)) = rest.first().and_then(|token| match token.kind {
            TokenKind::VarRef { name } => Some((token, name)),
            _ => None,
        }) else {
            self.bad_operand(mov, rest.first(), "a variable reference");
            return Ok(statement_len);
        };
        let Some(slot) = self.lookup(name) else {
            let name = self.ident_interner.get(name).into();
            self.error(dst, Error::UndeclaredVariable { name });
            return Ok(statement_len);
        };
        let Some(value) = rest.get(1).and_then(|token| match token.kind {
            TokenKind::LitI32(value) => Some(value),
            _ => None,
        }) else {
            self.bad_operand(dst, rest.get(1), "an integer literal");
            return Ok(statement_len);
        };

        let StackSlot { offset, ptr } = slot;
        tracing::trace!(offset, value, "store");
        self.out(f!("mov {ptr} [rbp-{offset}], {value}"))?;
        Ok(2)
    }

    /// Emitted once, after every function body.
    fn g_trampoline(&mut self) -> io::Result<()> {
        let entry = self.entry_label;
        self.out(f!("{}:", E::START_SYMBOL))?;
        self.indent = true;
        self.out(f!("call {entry}"))?;
        self.out(f!("mov rax, {}", E::EXIT_SYSCALL))?;
        self.out("mov rdi, 0")?;
        self.out("syscall")?;
        self.indent = false;
        Ok(())
    }
}

/// Utility functions.
impl<W, E> Generator<'_, W, E>
where
    W: io::Write,
    E: x86_64_env::Env,
{
    /// Prints a line.
    fn out(&mut self, f: impl std::fmt::Display) -> io::Result<()> {
        let indent = if self.indent { "    " } else { "" };
        writeln!(self.writer, "{indent}{f}")
    }

    /// Prints an empty line.
    fn out_line(&mut self) -> io::Result<()> {
        writeln!(self.writer)
    }

    fn lookup(&self, name: Interned) -> Option<StackSlot> {
        let scope = self.scope.as_ref().filter(|scope| scope.open)?;
        scope.table.get(&name).copied()
    }

    /// Reports a missing or unsupported operand. A missing operand is
    /// reported at the token it should have followed.
    fn bad_operand(&mut self, prev: &Token, found: Option<&Token>, expected: &'static str) {
        match found {
            Some(token) if !matches!(token.kind, TokenKind::Eol | TokenKind::Eof) => {
                let found = token.kind.describe();
                self.error(token, Error::UnsupportedOperand { expected, found });
            }
            _ => self.error(prev, Error::MissingOperand { expected }),
        }
    }

    fn error(&mut self, token: &Token, error: Error) {
        tracing::trace!(pos = %token.pos(), %error, "codegen error");
        self.errors.push(token.wrap(error));
    }
}
