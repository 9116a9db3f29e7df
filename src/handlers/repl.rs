//! Interactive workbench: generate once, then edit, regenerate and rerun.

use std::io::{self, Write};
use std::process::Command;

use anyhow::{bail, Context, Result};
use owo_colors::OwoColorize;

use super::{emit_result, Workbench};
use crate::execution::ExecutionSession;
use crate::generation::CodeGenerator;
use crate::printer;

pub struct ReplHandler;

impl ReplHandler {
    pub async fn run(
        problem: &str,
        bench: &Workbench,
        generator: &dyn CodeGenerator,
        initial_code: Option<String>,
    ) -> Result<()> {
        let session = ExecutionSession::new(bench.mode, bench.resolver.clone());
        let mut problem = problem.to_string();

        match initial_code {
            Some(code) => session.set_code(code),
            None if !problem.trim().is_empty() => regenerate(&session, generator, &problem, bench).await?,
            None => {}
        }
        printer::print_state(session.state());

        loop {
            print!("{}", "[R]un, [E]dit, [M]odify, [S]how code, [Q]uit: ".bold());
            io::stdout().flush().ok();
            let mut choice = String::new();
            if io::stdin().read_line(&mut choice)? == 0 {
                break;
            }

            match choice.trim().to_lowercase().as_str() {
                "r" | "" => match session.run().await {
                    Ok(result) => emit_result(&result, bench.presentation)?,
                    Err(e) => eprintln!("{}", e.to_string().yellow()),
                },
                "e" => {
                    let edited = edit_in_editor(&session.code())?;
                    session.set_code(edited);
                }
                "m" => {
                    let label = if problem.trim().is_empty() { "Problem: " } else { "Modify with instructions: " };
                    print!("{}", label);
                    io::stdout().flush().ok();
                    let mut add = String::new();
                    io::stdin().read_line(&mut add)?;
                    problem = if problem.trim().is_empty() {
                        add.trim().to_string()
                    } else {
                        format!("{}\n\n{}", problem, add.trim())
                    };
                    if let Err(e) = regenerate(&session, generator, &problem, bench).await {
                        eprintln!("{}", format!("{:#}", e).red());
                    }
                }
                "s" => {
                    let code = session.code();
                    if code.trim().is_empty() {
                        println!("{}", "(no code)".dimmed());
                    } else {
                        printer::print_code(&code);
                    }
                }
                "q" | "a" => break,
                other => eprintln!("unknown choice: {}", other),
            }
            printer::print_state(session.state());
        }
        Ok(())
    }
}

async fn regenerate(
    session: &ExecutionSession,
    generator: &dyn CodeGenerator,
    problem: &str,
    bench: &Workbench,
) -> Result<()> {
    let generated = generator.generate(problem, session.mode()).await?;
    printer::print_explanation(&generated.explanation, bench.presentation.markdown);
    if bench.presentation.show_code {
        printer::print_code(&generated.code);
    }
    session.set_code(generated.code);
    Ok(())
}

/// Opens `$VISUAL`/`$EDITOR` (falling back to `vi`) on a scratch `.js` file
/// and returns its contents after the editor exits.
fn edit_in_editor(code: &str) -> Result<String> {
    let editor = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_string());
    let mut file = tempfile::Builder::new()
        .prefix("mathpad-")
        .suffix(".js")
        .tempfile()?;
    file.write_all(code.as_bytes())?;
    file.flush()?;

    let status = Command::new(&editor)
        .arg(file.path())
        .status()
        .with_context(|| format!("failed to launch editor {}", editor))?;
    if !status.success() {
        bail!("editor {} exited with {}", editor, status);
    }
    std::fs::read_to_string(file.path()).context("failed to read edited code")
}
