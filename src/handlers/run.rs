//! Runs code supplied directly, skipping generation.

use std::io::{self, Read};

use anyhow::{bail, Context, Result};

use super::{emit_result, Workbench};
use crate::execution::{ExecutionSession, Status};

pub struct RunHandler;

impl RunHandler {
    /// Executes the script at `path` ("-" reads stdin) and prints the result.
    /// Returns whether the run succeeded.
    pub async fn run(path: &str, bench: &Workbench) -> Result<bool> {
        let code = if path == "-" {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?
        };
        if code.trim().is_empty() {
            bail!("no code in {}", path);
        }

        let session = ExecutionSession::new(bench.mode, bench.resolver.clone());
        session.set_code(code);
        let result = session.run().await?;
        emit_result(&result, bench.presentation)?;
        Ok(result.status() == Status::Succeeded)
    }
}
