pub mod repl;
pub mod run;
pub mod solve;

use std::sync::Arc;

use crate::execution::{BackendResolver, ExecutionResult, Mode};
use crate::printer;

/// Presentation switches shared by every handler.
#[derive(Debug, Clone, Copy)]
pub struct Presentation {
    pub markdown: bool,
    pub show_code: bool,
    pub json: bool,
}

/// Everything a handler needs to execute code for one mode.
#[derive(Clone)]
pub struct Workbench {
    pub mode: Mode,
    pub resolver: Arc<BackendResolver>,
    pub presentation: Presentation,
}

pub(crate) fn emit_result(result: &ExecutionResult, presentation: Presentation) -> anyhow::Result<()> {
    if presentation.json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        printer::print_result(result);
    }
    Ok(())
}
