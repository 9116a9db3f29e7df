//! Printers: text, markdown (termimad) and execution results.

use owo_colors::OwoColorize;
use termimad::MadSkin;

use crate::execution::{ExecutionResult, FailureKind, SessionState};

pub struct TextPrinter {
    pub color: Option<&'static str>,
}

impl TextPrinter {
    pub fn print(&self, text: &str) {
        if let Some(c) = self.color {
            match c {
                "green" => println!("{}", text.green()),
                "cyan" => println!("{}", text.cyan()),
                "magenta" => println!("{}", text.magenta()),
                "yellow" => println!("{}", text.yellow()),
                "red" => println!("{}", text.red()),
                _ => println!("{}", text),
            }
        } else {
            println!("{}", text);
        }
    }
}

pub struct MarkdownPrinter {
    pub skin: MadSkin,
}

impl Default for MarkdownPrinter {
    fn default() -> Self {
        Self { skin: MadSkin::default() }
    }
}

impl MarkdownPrinter {
    pub fn print(&self, text: &str) {
        self.skin.print_text(text);
        println!();
    }
}

/// Prints an explanation either rendered as markdown or as plain text.
pub fn print_explanation(text: &str, markdown: bool) {
    if text.trim().is_empty() {
        return;
    }
    if markdown {
        MarkdownPrinter::default().print(text);
    } else {
        println!("{}\n", text);
    }
}

pub fn print_code(code: &str) {
    println!("{}", "── code ──".dimmed());
    TextPrinter { color: Some("cyan") }.print(code);
    println!();
}

fn kind_label(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::LibraryLoad => "library",
        FailureKind::Compilation => "compile",
        FailureKind::Runtime => "runtime",
        FailureKind::UserReported => "reported",
    }
}

/// Plain-text rendering of a result, one section per captured part.
pub fn render_result(result: &ExecutionResult) -> String {
    let mut out = String::new();
    for line in result.logs() {
        out.push_str(line);
        out.push('\n');
    }
    if let Some(plot) = result.plot() {
        let traces = plot.series.as_array().map(Vec::len).unwrap_or(1);
        out.push_str(&format!("[plot: {} trace(s)]\n", traces));
    }
    if let Some(value) = result.returned_value() {
        out.push_str(&format!("=> {}\n", value));
    }
    if let Some(failure) = result.failure() {
        out.push_str(&format!("error ({}): {}\n", kind_label(failure.kind), failure.message));
    }
    out
}

pub fn print_result(result: &ExecutionResult) {
    for line in result.logs() {
        println!("{}", line);
    }
    if let Some(plot) = result.plot() {
        let traces = plot.series.as_array().map(Vec::len).unwrap_or(1);
        println!("{}", format!("[plot: {} trace(s)]", traces).magenta());
    }
    if let Some(value) = result.returned_value() {
        println!("{} {}", "=>".green(), value.green().bold());
    }
    if let Some(failure) = result.failure() {
        eprintln!("{} {}", format!("error ({}):", kind_label(failure.kind)).red().bold(), failure.message.red());
    }
}

pub fn print_state(state: SessionState) {
    println!("{}", format!("[{}]", state).dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{Failure, Plot};
    use serde_json::json;

    #[test]
    fn renders_every_section() {
        let ok = ExecutionResult::succeeded(
            vec!["sum 2".into()],
            Some(Plot { series: json!([{}, {}]), layout: json!({}) }),
            Some("4".into()),
        );
        assert_eq!(render_result(&ok), "sum 2\n[plot: 2 trace(s)]\n=> 4\n");

        let failed = ExecutionResult::failed(vec![], None, Failure::user_reported("bad"));
        assert_eq!(render_result(&failed), "error (reported): bad\n");
    }
}
