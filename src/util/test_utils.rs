use crate::{Config, Error, Source};

/// Text preceding the first function body for the default configuration.
pub const LINUX_PROLOGUE: &str = concat!(
    ".intel_syntax noprefix\n",
    ".section .note.GNU-stack,\"\",@progbits\n",
    ".section .text\n",
    ".global _start\n",
    "\n",
);

/// Text following the last function body for the default configuration.
pub const LINUX_TRAMPOLINE: &str = concat!(
    "_start:\n",
    "    call entry\n",
    "    mov rax, 60\n",
    "    mov rdi, 0\n",
    "    syscall\n",
);

pub enum Assertion {
    /// The whole output.
    AsmOk(&'static str),
    /// The output between the prologue and the trampoline.
    BodyOk(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

/// Runs every stage on `input`. Returns the assembly (empty on failure) and
/// the formatted diagnostics.
#[track_caller]
pub fn run_pipeline(input: &str, config: &Config) -> (String, Vec<String>) {
    let source = Source::new("test.slot", input);
    match crate::compile(&source, config) {
        Ok(asm) => (asm, Vec::new()),
        Err(error @ Error::Compile { .. }) => (
            String::new(),
            error.diagnostics().iter().map(ToString::to_string).collect(),
        ),
        Err(error) => panic!("unexpected error: {error}"),
    }
}

#[track_caller]
pub fn body_of(asm: &str) -> &str {
    asm.strip_prefix(LINUX_PROLOGUE)
        .and_then(|rest| rest.strip_suffix(LINUX_TRAMPOLINE))
        .unwrap_or_else(|| panic!("missing prologue or trampoline in:\n{asm}"))
}

#[track_caller]
pub fn run_assertion(assertion: Assertion, actual_asm: &str, actual_errors: &[String]) {
    match assertion {
        Assertion::AsmOk(expected_asm) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(actual_asm, expected_asm);
        }
        Assertion::BodyOk(expected_body) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(body_of(actual_asm).trim(), expected_body.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(actual_errors, expected_errors);
        }
    }
}

macro_rules! asm_tests {
    (
        $(
            fn $test_name:ident() {
                let input = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let config = crate::Config::default();
                let (actual_asm, actual_errors) =
                    crate::util::test_utils::run_pipeline(::indoc::indoc! { $source }, &config);
                let ctx = (&actual_asm, &actual_errors);
                asm_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            asm_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        asm_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, asm_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::AsmOk(::indoc::indoc! { $expected })
    };
    (@@assertion, body_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::BodyOk(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };
}
pub(crate) use asm_tests;
