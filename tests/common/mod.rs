use anyhow::Result;

/// Lex, parse and compile one source text to IR.
#[allow(dead_code)]
pub fn compile(src: &str) -> Result<String> {
    ternc::compile(src)
}

/// Collapse whitespace so tests compare instruction streams, not
/// indentation: lines are trimmed, inner runs of spaces collapsed, blank
/// lines dropped.
#[allow(dead_code)]
pub fn norm(s: &str) -> String {
    s.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compile `src` and compare against the expected IR, whitespace-
/// insensitively.
#[allow(dead_code)]
pub fn assert_ir(src: &str, expected: &str) {
    let ir = compile(src).expect("compile failed");
    assert_eq!(norm(&ir), norm(expected), "generated IR does not match");
}

/// Like `assert_ir`, with the source wrapped in `pub fn main() I32` and
/// the expected IR in the matching function shell.
#[allow(dead_code)]
pub fn assert_main_ir(src: &str, expected: &str) {
    let src = format!("pub fn main() I32 {{\n{src}\n\treturn 0\n}}\n");
    let expected = format!("export function w $main() {{\n@start\n{expected}\n\tret 0\n}}\n");
    assert_ir(&src, &expected);
}

/// Compile and return the error message, which must exist.
#[allow(dead_code)]
pub fn compile_err(src: &str) -> String {
    match compile(src) {
        Ok(ir) => panic!("expected a compile error, got IR:\n{ir}"),
        Err(err) => err.to_string(),
    }
}
