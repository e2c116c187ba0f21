//! Compact, rustc-like error reporting for the CLI.

/// Print an "error:" diagnostic to stderr, with the source path when one
/// is known.
pub fn report_error(file: Option<&str>, message: &str) {
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    eprintln!("{red}error{reset}: {message}");
    if let Some(path) = file {
        eprintln!("  --> {path}");
    }
}
