//! ternc — compiler for the Tern language.
//!
//! Tern is a small statically-typed systems language with C-like pointer
//! semantics, namespaces and composite types. The compiler lowers a parsed
//! program in a single pass to QBE-flavoured textual SSA IR, which an
//! external assembler turns into machine code.
//!
//! Pipeline: [`lexer`] → [`parser`] → [`codegen::Compiler::compile`].

pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod types;

use anyhow::Result;

/// Compile Tern source text to IR text in one step.
pub fn compile(src: &str) -> Result<String> {
    let tokens = lexer::tokenize(src)?;
    let prog = parser::parse(&tokens)?;
    codegen::Compiler::new().compile(&prog)
}
