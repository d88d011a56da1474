use crate::codegen::Target;

/// Label the process trampoline calls when none is configured.
pub const DEFAULT_ENTRY_LABEL: &str = "entry";

/// Options that shape the emitted assembly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub target: Target,
    /// Function label called by the start trampoline.
    pub entry_label: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target: Target::default(),
            entry_label: DEFAULT_ENTRY_LABEL.to_owned(),
        }
    }
}
