use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

/// Where generated assembly ends up. Files are only ever appended to.
#[derive(Debug)]
pub enum Sink {
    Stdout(io::Stdout),
    File(File),
}

impl Sink {
    /// Path that selects the standard output.
    pub const STDOUT: &str = "-";

    pub fn open(path: &Path) -> Result<Sink> {
        if path.as_os_str() == Sink::STDOUT {
            return Ok(Sink::Stdout(io::stdout()));
        }
        open_append(path)
            .map(Sink::File)
            .map_err(|source| Error::Open {
                path: PathBuf::from(path),
                source,
            })
    }
}

#[cfg(unix)]
fn open_append(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o644)
        .open(path)
}

#[cfg(not(unix))]
fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Stdout(stdout) => stdout.write(buf),
            Sink::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Stdout(stdout) => stdout.flush(),
            Sink::File(file) => file.flush(),
        }
    }
}
