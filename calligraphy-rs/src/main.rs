use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use calligraphy::cli::{CliArgs, Input, Mode};
use calligraphy::compiler::Compiler;
use calligraphy::config::{self, Config};
use calligraphy::explain::ExplainStyle;
use calligraphy::runner::Runner;
use calligraphy::runtime;

#[tokio::main]
async fn main() {
    let args = match CliArgs::try_parse() {
        Ok(a) => a,
        Err(e) => {
            // --help and --version land here too and are not failures.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // ── Logging ───────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(args.verbose >= 2)
        .with_line_number(args.verbose >= 3)
        .init();

    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("calligraphy: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(args: CliArgs) -> Result<i32> {
    let config = load_config();
    let input = args.input();
    let source = read_input(&input).await?;

    match args.mode() {
        Mode::Explain => {
            // SAFETY: isatty only inspects the descriptor.
            let is_tty = unsafe { libc::isatty(libc::STDOUT_FILENO) != 0 };
            let style = if config.color.enabled(is_tty) {
                ExplainStyle::Ansi
            } else {
                ExplainStyle::Plain
            };
            print!("{}", Compiler::from_config(&config).explain_str(&source, style));
            Ok(0)
        }
        Mode::Intermediate => {
            let body = compile(&config, &input, &source)?;
            print!("{}", runtime::program(&args.script, &args.args, &body));
            Ok(0)
        }
        Mode::Run => {
            let body = compile(&config, &input, &source)?;
            let program = runtime::program(&args.script, &args.args, &body);
            Runner::from_config(&config).run(&program).await
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load_config() -> Config {
    let mut config = Config::new();
    if let Some(path) = config::find_config() {
        match Config::load_file(&path) {
            Ok((loaded, errors)) => {
                for e in errors {
                    eprintln!("calligraphy: warning: {}: {e}", path.display());
                }
                config = loaded;
            }
            Err(e) => eprintln!("calligraphy: warning: {}: {e}", path.display()),
        }
        debug!(path = %path.display(), "loaded config");
    }
    config.apply_env();
    config
}

async fn read_input(input: &Input) -> Result<String> {
    match input {
        Input::Stdin => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("reading script from stdin")?;
            Ok(text)
        }
        Input::File(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display())),
    }
}

fn compile(config: &Config, input: &Input, source: &str) -> Result<String> {
    let mut compiler = Compiler::from_config(config);
    let body = match input {
        // Keeps the top-level script on the import stack.
        Input::File(path) => compiler.compile_source(source, path)?,
        Input::Stdin => compiler.compile_str(source, &input.base_dir())?,
    };
    Ok(body)
}
