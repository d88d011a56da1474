/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The recognizer rewrites known token windows into single annotated tokens,
/// in place.
pub mod recognizer;

/// The code generator walks the recognized tokens, emitting x86-64 assembly.
pub mod codegen;

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod sink;
pub mod source;
pub mod symtab;
pub mod token;

pub mod util {
    pub mod fmt;
    pub mod intern;
    #[cfg(test)]
    pub(crate) mod test_utils;
}

use std::io;

pub use crate::{
    config::Config,
    diagnostic::Diagnostic,
    error::{Error, Result, Stage},
    source::{read_source, Source},
};
use crate::{token::Token, util::intern::Interner};

/// Output of the front end: the compacted token sequence and the names its
/// payloads refer to.
#[derive(Debug)]
pub struct Recognized {
    pub tokens: Vec<Token>,
    pub ident_interner: Interner,
}

/// Lexes, recognizes and compacts a unit. The first stage with errors stops
/// the pipeline and all of its diagnostics are returned.
pub fn front_end(source: &Source) -> Result<Recognized> {
    let src = source.text();
    let mut tokens = Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY);
    lexer::lex(src, &mut tokens).map_err(|errors| fail(Stage::Lexing, errors))?;

    let mut ident_interner = Interner::with_capacity(64);
    recognizer::recognize(src, &mut tokens, &mut ident_interner)
        .map_err(|errors| fail(Stage::Recognition, errors))?;
    recognizer::compact(&mut tokens);

    tracing::debug!(tokens = tokens.len(), names = ident_interner.len(), "front end done");
    Ok(Recognized {
        tokens,
        ident_interner,
    })
}

/// Renders the assembly of a recognized unit in memory.
#[tracing::instrument(level = "debug", skip_all, fields(target = config.target.triple()))]
pub fn emit(recognized: &Recognized, config: &Config) -> Result<String> {
    let mut buf = Vec::with_capacity(recognized.tokens.len() * 16);
    let errors = codegen::generate(
        &mut buf,
        &recognized.ident_interner,
        config,
        &recognized.tokens,
    )?;
    if !errors.is_empty() {
        return Err(fail(Stage::CodeGeneration, errors));
    }
    String::from_utf8(buf).map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error).into())
}

/// Compiles a unit to assembly text.
pub fn compile(source: &Source, config: &Config) -> Result<String> {
    let recognized = front_end(source)?;
    emit(&recognized, config)
}

/// Compiles a unit and writes the assembly to `sink`. Nothing is written
/// unless every stage succeeds.
pub fn compile_to<W>(source: &Source, config: &Config, mut sink: W) -> Result<()>
where
    W: io::Write,
{
    let asm = compile(source, config)?;
    sink.write_all(asm.as_bytes())?;
    sink.flush()?;
    Ok(())
}

fn fail<E>(stage: Stage, errors: Vec<token::Spanned<E>>) -> Error
where
    E: std::fmt::Display,
{
    tracing::debug!(%stage, errors = errors.len(), "stage failed");
    Error::Compile {
        stage,
        diagnostics: errors.into_iter().map(Diagnostic::from).collect(),
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_compile_to_writes_only_on_success() {
        let config = Config::default();

        let mut out = Vec::new();
        let ok = Source::new("ok.slot", "func : void . entry\n{\n}\n");
        compile_to(&ok, &config, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("entry:\n"));

        let mut out = Vec::new();
        let bad = Source::new("bad.slot", "func : void . entry\n{\nmov @y <- 1\n}\n");
        let error = compile_to(&bad, &config, &mut out).unwrap_err();
        assert!(out.is_empty());
        assert!(matches!(
            error,
            Error::Compile {
                stage: Stage::CodeGeneration,
                ..
            }
        ));
    }

    #[test]
    fn test_first_failing_stage_stops_the_pipeline() {
        let long = "x".repeat(64);
        let source = Source::new("a.slot", format!("var @x , i32\n{long}\nvar @ , i32\n"));
        let error = compile(&source, &Config::default()).unwrap_err();

        assert_eq!(error.to_string(), "lexing failed with 1 error(s)");
        let messages: Vec<_> = error.diagnostics().iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            [format!("2:1: too long symbol \"{long}\" (64 bytes, at most 63 allowed)")]
        );
    }

    #[test]
    fn test_front_end_interns_names() {
        let source = Source::new(
            "a.slot",
            indoc! {"
                func : void . main
                {
                    var @x , i32
                    mov @x <- 1
                }
            "},
        );
        let recognized = front_end(&source).unwrap();
        assert_eq!(recognized.ident_interner.len(), 2);
        assert!(recognized.ident_interner.lookup("main").is_some());
        assert!(recognized.tokens.last().is_some_and(Token::is_eof));
    }
}
