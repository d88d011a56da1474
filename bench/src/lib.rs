use std::fmt::Write;

/// Builds a unit of `functions` functions, each declaring and assigning
/// `vars` variables.
pub fn generate_input(functions: usize, vars: usize) -> String {
    let mut out = String::with_capacity(functions * (vars * 40 + 48));
    for f in 0..functions {
        let label = if f == 0 { "entry".to_owned() } else { format!("f{f}") };
        _ = writeln!(out, "// function {f}");
        _ = writeln!(out, "func : void . {label}\n{{");
        for v in 0..vars {
            _ = writeln!(out, "    var @ v{v} , i32");
        }
        for v in 0..vars {
            _ = writeln!(out, "    mov @ v{v} <- {}", f * vars + v);
        }
        _ = writeln!(out, "}}\n");
    }
    out
}
