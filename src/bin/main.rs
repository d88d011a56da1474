use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use slotc::{
    codegen, read_source,
    sink::Sink,
    util::fmt::{print_tokens, Context},
    Config, Error,
};

/// Compiles a slot source file into x86-64 assembly.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Source file to compile.
    input: PathBuf,

    /// File the assembly is appended to, or `-` for the standard output.
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = Target::Linux)]
    target: Target,

    /// Label called by the start trampoline.
    #[arg(long, default_value = slotc::config::DEFAULT_ENTRY_LABEL)]
    entry: String,

    /// Print the recognized tokens to the standard error.
    #[arg(long)]
    dump_tokens: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
enum Target {
    #[value(alias = "x86_64_linux")]
    Linux,
    #[value(alias = "x86_64_darwin")]
    Darwin,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Target::Linux => "linux",
            Target::Darwin => "darwin",
        })
    }
}

impl From<Target> for codegen::Target {
    fn from(value: Target) -> Self {
        match value {
            Target::Linux => codegen::Target::x86_64_linux,
            Target::Darwin => codegen::Target::x86_64_darwin,
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            let mut source = std::error::Error::source(&error);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let source = read_source(&args.input)?;
    let config = Config {
        target: args.target.into(),
        entry_label: args.entry.clone(),
    };

    let result = slotc::front_end(&source).and_then(|recognized| {
        if args.dump_tokens {
            let ctx = Context {
                ident_interner: &recognized.ident_interner,
                src: source.text(),
            };
            print_tokens(&mut io::stderr().lock(), &ctx, &recognized.tokens)?;
        }
        slotc::emit(&recognized, &config)
    });

    match result {
        Ok(asm) => {
            let mut sink = Sink::open(&args.output)?;
            sink.write_all(asm.as_bytes())?;
            sink.flush()?;
            Ok(())
        }
        Err(error) => {
            slotc::diagnostic::report(io::stderr().lock(), &source, error.diagnostics(), true)?;
            Err(error)
        }
    }
}

/// Installs a stderr subscriber, but only when `RUST_LOG` asks for one.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}
