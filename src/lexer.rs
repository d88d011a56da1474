use crate::token::{is_punctuation, Position, Span, Spanned, Token, TokenKind, KEYWORDS, MAX_TOKEN_LEN};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 1_024;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("too long symbol \"{text}\" ({len} bytes, at most {MAX_TOKEN_LEN} allowed)")]
    TooLong { text: Box<str>, len: usize },
}

/// Lexes the provided string, producing the tokens into the provided buffer.
///
/// Lexing never stops at the first error; every too long symbol is reported.
/// Any previous content of the buffer is discarded. The buffer is always
/// terminated by a single end-of-input token, even on failure. A leading
/// byte order mark is skipped.
#[tracing::instrument(level = "debug", skip_all, fields(len = src.len()))]
pub fn lex(src: &str, tokens: &mut Vec<Token>) -> Result<(), Vec<Spanned<Error>>> {
    let mut lexer = Lexer::new(src, tokens);
    lexer.lex();
    tracing::debug!(
        tokens = lexer.tokens.len(),
        errors = lexer.errors.len(),
        "lexing finished"
    );
    if lexer.errors.is_empty() {
        Ok(())
    } else {
        Err(lexer.errors)
    }
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str) -> Result<Vec<Token>, Vec<Spanned<Error>>> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, &mut tokens)?;
    Ok(tokens)
}

const BOM: char = '\u{feff}';

struct Lexer<'src, 'tok> {
    src: &'src str,
    cursor: usize,
    line: u32,
    column: u32,
    /// Start of the pending symbol, if any.
    mark: Option<(usize, Position)>,
    tokens: &'tok mut Vec<Token>,
    errors: Vec<Spanned<Error>>,
}

impl Lexer<'_, '_> {
    /// Scans the source string until the input is exhausted.
    fn lex(&mut self) {
        self.tokens.clear();
        if self.src.starts_with(BOM) {
            self.cursor = BOM.len_utf8();
        }
        let bytes = self.src.as_bytes();
        while let Some(&byte) = bytes.get(self.cursor) {
            match byte {
                b'\n' => {
                    self.flush();
                    self.end_of_line();
                    self.cursor += 1;
                    self.line += 1;
                    self.column = 1;
                    continue;
                }
                b' ' | b'\t' | b'\r' => self.flush(),
                b if is_punctuation(b) => {
                    self.flush();
                    let span = Span::new_of_length(self.cursor, 1);
                    self.produce(span, self.here());
                }
                _ => {
                    if self.mark.is_none() {
                        self.mark = Some((self.cursor, self.here()));
                    }
                }
            }
            self.cursor += 1;
            self.column += 1;
        }
        self.flush();
        let eof = Token::new(
            TokenKind::Eof,
            Span::new_of_length(self.src.len(), 0),
            self.here(),
        );
        self.tokens.push(eof);
    }

    /// Emits the pending symbol, if there is one.
    fn flush(&mut self) {
        let Some((lo, pos)) = self.mark.take() else {
            return;
        };
        let span = Span::new_of_bounds(lo..self.cursor);
        if span.len as usize > MAX_TOKEN_LEN {
            let text = span.substr(self.src);
            tracing::trace!(%pos, len = text.len(), "symbol too long");
            self.errors.push(Spanned {
                span,
                pos,
                inner: Error::TooLong {
                    text: text.into(),
                    len: text.len(),
                },
            });
        }
        self.produce(span, pos);
    }

    /// Emits an end-of-line token, collapsing runs of blank lines into a
    /// single one.
    fn end_of_line(&mut self) {
        match self.tokens.last() {
            None => {}
            Some(last) if last.kind == TokenKind::Eol => {}
            Some(_) => {
                let span = Span::new_of_length(self.cursor, 0);
                self.tokens.push(Token::new(TokenKind::Eol, span, self.here()));
            }
        }
    }

    /// Classifies the text under `span` and produces a token for it.
    fn produce(&mut self, span: Span, pos: Position) {
        let text = span.substr(self.src);
        let kind = match KEYWORDS.get(text) {
            Some(&kind) => kind,
            // `//comment` opens a comment just like `// comment`.
            None if text.starts_with("//") => TokenKind::Comment,
            None => TokenKind::Symbol,
        };
        self.tokens.push(Token::new(kind, span, pos));
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

impl Lexer<'_, '_> {
    /// Constructs a new lexer with the default state.
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok mut Vec<Token>) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            cursor: 0,
            line: 1,
            column: 1,
            mark: None,
            tokens,
            errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex_in_new(src)
            .expect("lexes without errors")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_var_declaration() {
        use TokenKind::*;
        let src = "var @ x , i32";
        let tokens = lex_in_new(src).unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, [Var, At, Symbol, Comma, TypeI32, Eof]);
        assert_eq!(tokens[2].raw(src), Some("x"));
    }

    #[test]
    fn test_punctuation_needs_no_whitespace() {
        use TokenKind::*;
        assert_eq!(kinds("600,i32"), kinds("600 , i32"));
        assert_eq!(
            kinds("func:void.main{}"),
            [Func, Colon, TypeVoid, Dot, Symbol, LBrace, RBrace, Eof]
        );
        assert_eq!(kinds("mov @x <- 42"), [Mov, At, Symbol, ArrowL, Symbol, Eof]);
        assert_eq!(kinds("( )"), [LParen, RParen, Eof]);
    }

    #[test]
    fn test_symbols_keep_raw_text() {
        let src = "600 60a";
        let tokens = lex_in_new(src).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Symbol);
        assert_eq!(tokens[0].raw(src), Some("600"));
        assert_eq!(tokens[1].kind, TokenKind::Symbol);
        assert_eq!(tokens[1].raw(src), Some("60a"));
        assert_eq!(tokens[2].raw(src), None);
    }

    #[test]
    fn test_spans_and_positions() {
        let src = "var @x\n  mov";
        let tokens = lex_in_new(src).unwrap();
        let summary: Vec<_> = tokens
            .iter()
            .map(|t| (t.kind, t.span().range(), t.pos()))
            .collect();
        use TokenKind::*;
        assert_eq!(
            summary,
            [
                (Var, 0..3, Position::new(1, 1)),
                (At, 4..5, Position::new(1, 5)),
                (Symbol, 5..6, Position::new(1, 6)),
                (Eol, 6..6, Position::new(1, 7)),
                (Mov, 9..12, Position::new(2, 3)),
                (Eof, 12..12, Position::new(2, 6)),
            ]
        );
    }

    #[test]
    fn test_blank_lines_collapse() {
        use TokenKind::*;
        assert_eq!(kinds("\n\na\n\n\n  \nb\n"), [Symbol, Eol, Symbol, Eol, Eof]);
        assert_eq!(kinds("a\r\n\r\nb"), [Symbol, Eol, Symbol, Eof]);
    }

    #[test]
    fn test_single_eof_terminates() {
        for src in ["", "\n", "   ", "a b c", "{\n}\n", "// x"] {
            let tokens = lex_in_new(src).unwrap();
            let eofs = tokens.iter().filter(|t| t.is_eof()).count();
            assert_eq!(eofs, 1, "input {src:?}");
            assert!(tokens.last().unwrap().is_eof(), "input {src:?}");
        }
    }

    #[test]
    fn test_keywords_match_exactly() {
        use TokenKind::*;
        assert_eq!(
            kinds("var vars func mov add <- <-- void i32 i64 //"),
            [Var, Symbol, Func, Mov, Add, ArrowL, Symbol, TypeVoid, TypeI32, Symbol, Comment, Eof]
        );
        assert_eq!(kinds("//note"), [Comment, Eof]);
    }

    #[test]
    fn test_too_long_symbol() {
        let ok = "a".repeat(MAX_TOKEN_LEN);
        assert!(lex_in_new(&ok).is_ok());

        let long = "b".repeat(MAX_TOKEN_LEN + 1);
        let src = format!("x\n  {long} y {long}");
        let mut tokens = Vec::new();
        let errors = lex(&src, &mut tokens).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].pos, Position::new(2, 3));
        assert_eq!(
            errors[0].inner,
            Error::TooLong {
                text: long.clone().into(),
                len: MAX_TOKEN_LEN + 1
            }
        );
        assert_eq!(errors[1].pos, Position::new(2, 70));
        assert!(tokens.last().unwrap().is_eof());
    }

    #[test]
    fn test_leading_bom_is_skipped() {
        let plain = "func : void . entry";
        let with_bom = format!("\u{feff}{plain}");
        assert_eq!(kinds(&with_bom), kinds(plain));

        let tokens = lex_in_new(&with_bom).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Func);
        assert_eq!(tokens[0].span().range(), 3..7);
        assert_eq!(tokens[0].pos(), Position::new(1, 1));
    }

    #[test]
    fn test_reused_buffer_is_cleared() {
        let mut tokens = Vec::new();
        lex("var @x , i32\nmov @x <- 1", &mut tokens).unwrap();
        lex("add", &mut tokens).unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, [TokenKind::Add, TokenKind::Eof]);
    }
}
