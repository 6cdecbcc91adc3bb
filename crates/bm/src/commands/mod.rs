//! CLI command implementations.

pub(crate) mod extract;
pub(crate) mod lint;
pub(crate) mod render;
pub(crate) mod themes;

use std::io::Read;
use std::path::Path;

pub(crate) use extract::ExtractArgs;
pub(crate) use lint::LintArgs;
pub(crate) use render::RenderArgs;
pub(crate) use themes::ThemesArgs;

/// Read raw input from `path`, or from stdin when no path is given.
pub(crate) fn read_input_bytes(path: Option<&Path>) -> std::io::Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().lock().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Read UTF-8 input from `path`, or from stdin when no path is given.
pub(crate) fn read_input(path: Option<&Path>) -> std::io::Result<String> {
    let bytes = read_input_bytes(path)?;
    String::from_utf8(bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
