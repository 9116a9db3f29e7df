use clap::{ArgAction, ArgGroup, Parser};

use crate::execution::Mode;

#[derive(Parser, Debug, Clone)]
#[command(name = "mathpad", about = "Solve math problems by generating and running code", version)]
#[command(group(ArgGroup::new("md_switch").args(["md", "no_md"]).multiple(false)))]
#[command(group(ArgGroup::new("code_switch").args(["show_code", "hide_code"]).multiple(false)))]
#[command(group(ArgGroup::new("source").args(["file", "repl"]).multiple(false)))]
pub struct Cli {
    /// The problem to solve, in natural language.
    #[arg(value_name = "PROMPT")]
    pub prompt: Option<String>,

    /// Backend family: symbolic, numerical or reasoning.
    #[arg(long, short = 'm')]
    pub mode: Option<Mode>,

    /// Run code from a file instead of generating it ("-" reads stdin).
    #[arg(long, short = 'f', value_name = "PATH")]
    pub file: Option<String>,

    /// Generate code but do not run it.
    #[arg(long = "no-run")]
    pub no_run: bool,

    /// Print the execution result as JSON.
    #[arg(long)]
    pub json: bool,

    /// Open the interactive workbench.
    #[arg(long)]
    pub repl: bool,

    /// Large language model to use.
    #[arg(long)]
    pub model: Option<String>,

    /// Randomness of generated output.
    #[arg(long, default_value_t = 0.0, value_parser = clap::value_parser!(f32))]
    pub temperature: f32,

    /// Limits highest probable tokens (words).
    #[arg(long = "top-p", default_value_t = 1.0, value_parser = clap::value_parser!(f32))]
    pub top_p: f32,

    /// Render the model's explanation as Markdown.
    #[arg(long)]
    pub md: bool,
    /// Print the explanation as plain text.
    #[arg(long = "no-md")]
    pub no_md: bool,

    /// Print generated code before running it.
    #[arg(long = "show-code")]
    pub show_code: bool,
    /// Do not print generated code.
    #[arg(long = "hide-code")]
    pub hide_code: bool,

    /// List the binding names available in each mode and exit.
    #[arg(long = "list-bindings")]
    pub list_bindings: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_and_switches() {
        let cli = Cli::try_parse_from(["mathpad", "--mode", "symbolic", "-vv", "--no-md", "integrate x"]).unwrap();
        assert_eq!(cli.mode, Some(Mode::Symbolic));
        assert_eq!(cli.verbose, 2);
        assert!(cli.no_md);
        assert_eq!(cli.prompt.as_deref(), Some("integrate x"));
    }

    #[test]
    fn conflicting_switches_are_rejected() {
        assert!(Cli::try_parse_from(["mathpad", "--md", "--no-md"]).is_err());
        assert!(Cli::try_parse_from(["mathpad", "--repl", "--file", "a.js"]).is_err());
        assert!(Cli::try_parse_from(["mathpad", "--mode", "quantum"]).is_err());
    }
}
