/// Target-specific assembler constants.
pub trait Env {
    /// Symbol of the process entry trampoline.
    const START_SYMBOL: &str;

    const GLOBAL_PROLOGUE: &str;

    const SECTION_TEXT: &str;

    /// Number loaded into `rax` to terminate the process.
    const EXIT_SYSCALL: &str;
}

impl Env for Darwin {
    const START_SYMBOL: &str = "_main";

    const GLOBAL_PROLOGUE: &str = ".intel_syntax noprefix";

    const SECTION_TEXT: &str = "__TEXT,__text,regular,pure_instructions";

    const EXIT_SYSCALL: &str = "0x2000001";
}

impl Env for Linux {
    const START_SYMBOL: &str = "_start";

    const GLOBAL_PROLOGUE: &str = concat!(
        ".intel_syntax noprefix\n",
        ".section .note.GNU-stack,\"\",@progbits",
    );

    const SECTION_TEXT: &str = ".text";

    const EXIT_SYSCALL: &str = "60";
}

pub struct Darwin;

pub struct Linux;
