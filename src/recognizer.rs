use crate::{
    token::{Spanned, Token, TokenKind, VarType},
    util::intern::{Interned, Interner},
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("expected {expected}, but found {found}")]
    Unexpected {
        expected: &'static str,
        found: Box<str>,
    },
    #[error("symbol token has no data")]
    MissingData,
    #[error("integer literal {text} does not fit in 32 bits")]
    LiteralOutOfRange { text: Box<str> },
}

/// One position of a grammar window.
#[derive(Copy, Clone, Debug)]
enum Expect {
    Is(TokenKind),
    /// Any of the declared type markers.
    AnyType,
}

impl Expect {
    fn matches(self, kind: TokenKind) -> bool {
        match self {
            Expect::Is(expected) => expected == kind,
            Expect::AnyType => kind.as_type().is_some(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Expect::Is(expected) => expected.describe(),
            Expect::AnyType => "a type",
        }
    }
}

/// `var @ <name> , <type>`
const VAR_DECL: [Expect; 5] = [
    Expect::Is(TokenKind::Var),
    Expect::Is(TokenKind::At),
    Expect::Is(TokenKind::Symbol),
    Expect::Is(TokenKind::Comma),
    Expect::AnyType,
];

/// `@ <name> <-`
const VAR_REF: [Expect; 3] = [
    Expect::Is(TokenKind::At),
    Expect::Is(TokenKind::Symbol),
    Expect::Is(TokenKind::ArrowL),
];

/// `func : <type> . <name>`
const FUNC_DECL: [Expect; 5] = [
    Expect::Is(TokenKind::Func),
    Expect::Is(TokenKind::Colon),
    Expect::AnyType,
    Expect::Is(TokenKind::Dot),
    Expect::Is(TokenKind::Symbol),
];

/// Rewrites every recognized window of `tokens` into a single token carrying
/// the parsed payload. Consumed tokens are left behind as
/// [`TokenKind::Empty`] placeholders; see [`compact`].
///
/// On a mismatch the rest of the line is skipped and recognition resumes on
/// the next one, so that all errors of the unit are reported at once.
#[tracing::instrument(level = "debug", skip_all, fields(tokens = tokens.len()))]
pub fn recognize(
    src: &str,
    tokens: &mut [Token],
    ident_interner: &mut Interner,
) -> Result<(), Vec<Spanned<Error>>> {
    let mut r = Recognizer {
        src,
        tokens,
        ident_interner,
        cursor: 0,
        errors: Vec::new(),
    };
    r.run();
    tracing::debug!(errors = r.errors.len(), "recognition finished");
    if r.errors.is_empty() {
        Ok(())
    } else {
        Err(r.errors)
    }
}

/// Drops every placeholder left by [`recognize`], keeping the order of the
/// remaining tokens.
pub fn compact(tokens: &mut Vec<Token>) {
    let before = tokens.len();
    tokens.retain(|token| token.kind != TokenKind::Empty);
    tracing::trace!(removed = before - tokens.len(), "compacted token stream");
}

struct Recognizer<'src, 'tok, 'ident> {
    src: &'src str,
    tokens: &'tok mut [Token],
    ident_interner: &'ident mut Interner,
    cursor: usize,
    errors: Vec<Spanned<Error>>,
}

impl Recognizer<'_, '_, '_> {
    fn run(&mut self) {
        while let Some(token) = self.tokens.get(self.cursor) {
            let kind = token.kind;
            let result = match kind {
                TokenKind::Eof => break,
                TokenKind::Var => self.var_decl(),
                TokenKind::At => self.var_ref(),
                TokenKind::Func => self.func_decl(),
                TokenKind::Symbol => self.symbol(),
                TokenKind::Comment => {
                    self.comment();
                    Ok(())
                }
                _ => {
                    self.cursor += 1;
                    Ok(())
                }
            };
            if let Err(error) = result {
                self.errors.push(error);
                self.synchronize();
            }
        }
    }

    fn var_decl(&mut self) -> Result<()> {
        self.expect_window(&VAR_DECL)?;
        let name = self.name_at(self.cursor + 2)?;
        let ty = self.type_at(self.cursor + 4);
        self.rewrite(VAR_DECL.len(), TokenKind::NewVar { name, ty });
        Ok(())
    }

    fn var_ref(&mut self) -> Result<()> {
        self.expect_window(&VAR_REF)?;
        let name = self.name_at(self.cursor + 1)?;
        self.rewrite(VAR_REF.len(), TokenKind::VarRef { name });
        Ok(())
    }

    fn func_decl(&mut self) -> Result<()> {
        self.expect_window(&FUNC_DECL)?;
        let ret = self.type_at(self.cursor + 2);
        let label = self.name_at(self.cursor + 4)?;
        self.rewrite(FUNC_DECL.len(), TokenKind::FuncDecl { ret, label });
        Ok(())
    }

    /// Reclassifies all-digit symbols as integer literals. Other symbols are
    /// left for the code generator.
    fn symbol(&mut self) -> Result<()> {
        let token = &mut self.tokens[self.cursor];
        let Some(text) = token.raw(self.src) else {
            return Err(token.wrap(Error::MissingData));
        };
        if text.bytes().all(|b| b.is_ascii_digit()) {
            let value = text.parse().map_err(|_| {
                token.wrap(Error::LiteralOutOfRange { text: text.into() })
            })?;
            token.kind = TokenKind::LitI32(value);
        }
        self.cursor += 1;
        Ok(())
    }

    /// Blanks a comment up to the end of its line.
    fn comment(&mut self) {
        while let Some(token) = self.tokens.get_mut(self.cursor) {
            if matches!(token.kind, TokenKind::Eol | TokenKind::Eof) {
                break;
            }
            token.clear();
            self.cursor += 1;
        }
    }

    /// Checks that the tokens starting at the cursor match `pattern`.
    fn expect_window(&self, pattern: &[Expect]) -> Result<()> {
        for (offset, expect) in pattern.iter().enumerate() {
            let token = match self.tokens.get(self.cursor + offset) {
                Some(token) => token,
                // Only reachable on a stream missing its end-of-input token.
                None => {
                    let last = &self.tokens[self.tokens.len() - 1];
                    return Err(last.wrap(Error::Unexpected {
                        expected: expect.describe(),
                        found: TokenKind::Eof.describe().into(),
                    }));
                }
            };
            if !expect.matches(token.kind) {
                return Err(token.wrap(Error::Unexpected {
                    expected: expect.describe(),
                    found: self.found(token),
                }));
            }
        }
        Ok(())
    }

    /// Replaces the `width` tokens at the cursor with a single token of the
    /// provided kind, spanning all of them.
    fn rewrite(&mut self, width: usize, kind: TokenKind) {
        let window = &mut self.tokens[self.cursor..self.cursor + width];
        let last = window[width - 1];
        let (head, rest) = window.split_at_mut(1);
        head[0].kind = kind;
        head[0].extend_to(&last);
        for token in rest {
            token.clear();
        }
        self.cursor += width;
    }

    fn name_at(&mut self, index: usize) -> Result<Interned> {
        let token = &self.tokens[index];
        match token.raw(self.src) {
            Some(name) => Ok(self.ident_interner.intern(name)),
            None => Err(token.wrap(Error::MissingData)),
        }
    }

    fn type_at(&self, index: usize) -> VarType {
        match self.tokens[index].kind.as_type() {
            Some(ty) => ty,
            None => unreachable!("window already matched a type"),
        }
    }

    fn found(&self, token: &Token) -> Box<str> {
        match token.raw(self.src) {
            Some(text) => format!("\"{text}\"").into_boxed_str(),
            None => token.kind.describe().into(),
        }
    }

    /// Skips to the start of the next line.
    fn synchronize(&mut self) {
        while let Some(token) = self.tokens.get(self.cursor) {
            match token.kind {
                TokenKind::Eof => return,
                TokenKind::Eol => {
                    self.cursor += 1;
                    return;
                }
                _ => self.cursor += 1,
            }
        }
    }
}
