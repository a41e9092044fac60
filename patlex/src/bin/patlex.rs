//! Print the tokens a rule file produces for an input file.

use std::{
    io::{self, Write},
    path::PathBuf,
};

use clap::Parser;
use log::debug;
use patlex::{rules::RuleSet, LexError, Lexer, RegistryError};
use thiserror::Error;

/// Tokenize a file with the rules in a JSON rule file.
#[derive(Parser, Debug, Clone, PartialEq)]
struct Args {
    /// A JSON array of token and skip rules
    #[arg(short, long)]
    rules: PathBuf,

    /// The file to tokenize
    input: PathBuf,
}

#[derive(Debug, Error)]
enum Error {
    #[error("io failed for '{path}': '{source}'")]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write to stdout: '{0}'")]
    StdioWriteFail(#[source] io::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Lex(#[from] LexError),
}

fn main() -> Result<(), Error> {
    env_logger::builder()
        .format(|buf, record| {
            let ts = buf.timestamp_micros();
            writeln!(buf, "{}: {}: {}", ts, record.level(), record.args())
        })
        .init();

    let args = Args::parse();
    let stdout = io::stdout();
    run(&args, &mut stdout.lock())
}

/// Lex `args.input` and write one `start..end KIND "text"` line per token.
fn run(args: &Args, out: &mut impl Write) -> Result<(), Error> {
    let registry = RuleSet::load(&args.rules)?.into_registry()?;
    debug!("matcher: {}", registry.matcher_source());

    let input = std::fs::read_to_string(&args.input).map_err(|source| Error::FileIo {
        path: args.input.clone(),
        source,
    })?;

    let mut lexer = Lexer::new(&input, &registry);
    while let Some((kind, id)) = lexer.next_token()? {
        let range = lexer.range(id).unwrap_or_default();
        let text = lexer.text(id).unwrap_or_default();
        writeln!(out, "{}..{} {} {:?}", range.start, range.end, kind, text)
            .map_err(Error::StdioWriteFail)?;
    }
    Ok(())
}
