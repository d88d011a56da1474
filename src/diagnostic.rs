use std::{fmt, io, ops::Range};

use ariadne::{Color, Label, Report, ReportKind};

use crate::{
    source::Source,
    token::{Position, Span, Spanned},
};

/// A located, already formatted compiler error, independent of the stage
/// that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub span: Span,
    /// Line and byte column of `span.lo`.
    pub pos: Position,
    pub message: String,
}

impl<E> From<Spanned<E>> for Diagnostic
where
    E: fmt::Display,
{
    fn from(spanned: Spanned<E>) -> Self {
        Diagnostic {
            span: spanned.span,
            pos: spanned.pos,
            message: spanned.inner.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}

/// Renders `diagnostics` as annotated source excerpts.
///
/// Header columns count characters, matching the excerpt. `Display` keeps
/// the byte column of [`Diagnostic::pos`].
pub fn report<W>(
    mut w: W,
    source: &Source,
    diagnostics: &[Diagnostic],
    color: bool,
) -> io::Result<()>
where
    W: io::Write,
{
    let name = source.name();
    let name: &str = &name;
    let text = source.text();
    for diagnostic in diagnostics {
        let range = char_range(text, diagnostic.span);
        let line = diagnostic.pos.line;
        let column = char_column(text, diagnostic.span.lo);
        Report::build(ReportKind::Error, name, range.start)
            .with_config(ariadne::Config::default().with_color(color))
            .with_message(format!("{name}:{line}:{column}: {}", diagnostic.message))
            .with_label(
                Label::new((name, range))
                    .with_message(&diagnostic.message)
                    .with_color(Color::Red),
            )
            .finish()
            .write((name, ariadne::Source::from(text)), &mut w)?;
    }
    Ok(())
}

// 1-based character column of the byte offset `lo`.
fn char_column(text: &str, lo: usize) -> usize {
    let lo = lo.min(text.len());
    let before = text.get(..lo).unwrap_or(text);
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    before[line_start..].chars().count() + 1
}

// Labels are addressed in characters. Empty spans (end of line, end of input)
// are widened to one character of the source so they stay visible.
fn char_range(text: &str, span: Span) -> Range<usize> {
    let hi = span.hi().min(text.len());
    let lo = span.lo.min(hi);
    let start = text[..lo].chars().count();
    let end = start + text[lo..hi].chars().count();
    if start < end {
        start..end
    } else if lo < text.len() {
        start..start + 1
    } else {
        start.saturating_sub(1)..start
    }
}
