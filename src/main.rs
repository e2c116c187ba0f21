use anyhow::{Context, Result};
use clap::Parser;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Tern compiler: reads one source file, writes QBE SSA IR.
#[derive(Parser)]
#[command(name = "ternc", about = "Compile Tern source to QBE SSA IR", version)]
struct Cli {
    /// Source file; reads standard input when omitted
    file: Option<PathBuf>,

    /// Write the IR here instead of standard output
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        let path = cli.file.as_ref().map(|p| p.display().to_string());
        ternc::diagnostics::report_error(path.as_deref(), &format!("{err}"));
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let src = match &cli.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read standard input")?;
            buf
        }
    };

    let ir = ternc::compile(&src)?;

    match &cli.output {
        Some(path) => std::fs::write(path, ir)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => std::io::stdout()
            .write_all(ir.as_bytes())
            .context("failed to write standard output")?,
    }
    Ok(())
}
