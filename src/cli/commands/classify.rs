//! Classify command implementation.

use crate::request::opcode::{self, OpCode};
use anyhow::Result;
use clap::Args;

/// Show how an operation code is classified.
#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Operation name (e.g. getData) or integer code (e.g. 4, -11).
    /// Omit to list every known operation.
    #[arg(allow_hyphen_values = true)]
    pub op: Option<String>,
}

/// Run the classify command.
pub fn run_classify(args: ClassifyArgs) -> Result<()> {
    match args.op {
        Some(op) => {
            let code = parse_op(&op)?;
            println!("{}", classification_line(code));
        }
        None => {
            for op in OpCode::all() {
                println!("{}", classification_line(op.code()));
            }
        }
    }
    Ok(())
}

/// Resolve an operation given by name or integer code.
pub(crate) fn parse_op(op: &str) -> Result<i32> {
    if let Ok(code) = op.parse::<i32>() {
        return Ok(code);
    }
    match OpCode::from_name(op) {
        Some(code) => Ok(code.code()),
        None => anyhow::bail!("unknown operation: {}", op),
    }
}

fn classification_line(code: i32) -> String {
    format!(
        "{:<22} code={:<4} valid={:<5} quorum(global)={:<5} quorum(local)={:<5} throttlable={}",
        opcode::op_name(code),
        code,
        opcode::is_valid(code),
        opcode::requires_quorum(code, false),
        opcode::requires_quorum(code, true),
        opcode::is_throttlable(code)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_codes() {
        assert_eq!(parse_op("getData").unwrap(), 4);
        assert_eq!(parse_op("-11").unwrap(), -11);
        assert_eq!(parse_op("999").unwrap(), 999);
        assert!(parse_op("frobnicate").is_err());
    }

    #[test]
    fn classification_line_reflects_locality() {
        let line = classification_line(OpCode::CreateSession.code());
        assert!(line.contains("quorum(global)=true"));
        assert!(line.contains("quorum(local)=false"));
        assert!(line.contains("throttlable=false"));
    }
}
