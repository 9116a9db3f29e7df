//! One-shot flow: generate code for a problem, then run it.

use anyhow::{bail, Result};
use owo_colors::OwoColorize;

use super::{emit_result, Workbench};
use crate::execution::{ExecutionSession, Status};
use crate::generation::CodeGenerator;
use crate::printer;

pub struct SolveHandler;

impl SolveHandler {
    pub async fn run(
        problem: &str,
        bench: &Workbench,
        generator: &dyn CodeGenerator,
        execute: bool,
    ) -> Result<bool> {
        if problem.trim().is_empty() {
            bail!("Provide a problem as an argument or via stdin");
        }
        let generated = generator.generate(problem, bench.mode).await?;
        let presentation = bench.presentation;

        if !presentation.json {
            printer::print_explanation(&generated.explanation, presentation.markdown);
            if presentation.show_code || !execute {
                printer::print_code(&generated.code);
            }
        }
        if !execute {
            if presentation.json {
                println!("{}", serde_json::json!({ "code": generated.code, "explanation": generated.explanation }));
            }
            return Ok(true);
        }

        let session = ExecutionSession::new(bench.mode, bench.resolver.clone());
        session.set_code(generated.code);
        let result = session.run().await?;
        emit_result(&result, presentation)?;
        if !presentation.json && result.status() == Status::Failed {
            eprintln!("{}", "The generated code did not run cleanly; try --repl to edit it.".yellow());
        }
        Ok(result.status() == Status::Succeeded)
    }
}
