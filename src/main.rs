use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{bail, Result};
use is_terminal::IsTerminal;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use mathpad::backends::default_resolver;
use mathpad::cli::Cli;
use mathpad::config::Config;
use mathpad::execution::Mode;
use mathpad::generation::LlmCodeGenerator;
use mathpad::handlers::{repl::ReplHandler, run::RunHandler, solve::SolveHandler, Presentation, Workbench};
use mathpad::llm::ChatOptions;

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "mathpad=debug",
        _ => "mathpad=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let cfg = Config::load();
    let resolver = Arc::new(default_resolver());

    if args.list_bindings {
        for mode in Mode::ALL {
            let names = resolver.binding_names(mode);
            println!("{}: {}", mode, if names.is_empty() { "(none)".to_string() } else { names.join(", ") });
        }
        return Ok(());
    }

    let mode = args.mode.unwrap_or_else(|| cfg.default_mode());
    let markdown = if args.no_md { false } else if args.md { true } else { cfg.get_bool("PRETTIFY_MARKDOWN") };
    let show_code = if args.hide_code { false } else if args.show_code { true } else { cfg.get_bool("SHOW_CODE") };
    let bench = Workbench {
        mode,
        resolver,
        presentation: Presentation { markdown, show_code, json: args.json },
    };
    debug!(%mode, markdown, show_code, "starting");

    if let Some(path) = args.file.as_deref() {
        let ok = RunHandler::run(path, &bench).await?;
        if !ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    // stdin is folded into the problem text unless the REPL needs the terminal
    let stdin_is_tty = io::stdin().is_terminal();
    let mut from_stdin = String::new();
    if !stdin_is_tty {
        if args.repl {
            bail!("--repl cannot be used with stdin input");
        }
        io::stdin().read_to_string(&mut from_stdin)?;
    }
    let arg_prompt = args.prompt.clone().unwrap_or_default();
    let problem = match (from_stdin.trim().is_empty(), arg_prompt.trim().is_empty()) {
        (false, false) => format!("{}\n\n{}", from_stdin.trim(), arg_prompt),
        (false, true) => from_stdin.trim().to_string(),
        _ => arg_prompt,
    };

    let options = ChatOptions {
        model: args.model.clone().or_else(|| cfg.get("DEFAULT_MODEL")).unwrap_or_else(|| "gpt-4o".to_string()),
        temperature: args.temperature,
        top_p: args.top_p,
        max_tokens: cfg.get_u32("MAX_TOKENS"),
    };
    let generator = LlmCodeGenerator::from_config(&cfg, options)?;

    if args.repl {
        return ReplHandler::run(&problem, &bench, &generator, None).await;
    }
    let ok = SolveHandler::run(&problem, &bench, &generator, !args.no_run).await?;
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
