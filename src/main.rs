//! Binary entry point: parses flags, loads `.env`, builds the agent loop
//! for the selected provider, and runs either a one-shot prompt or the
//! interactive REPL.

use chatcli::cli::app::App;
use chatcli::cli::Cli;
use clap::Parser;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    std::process::exit(exit_code);
}

async fn run() -> i32 {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    chatcli::config::load_dotenv();
    let cli = Cli::parse();
    let one_shot = cli.prompt.is_some();

    let mut app = match App::build(cli.provider.as_deref(), cli.model.as_deref(), one_shot, cli.no_anim) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("{}", chatcli::sanitize::redact(&err.to_string()));
            return err.exit_code();
        }
    };

    if one_shot {
        let Some(prompt_text) = cli.resolve_prompt() else {
            eprintln!("{}", chatcli::ChatCliError::EmptyPrompt);
            return chatcli::ChatCliError::EmptyPrompt.exit_code();
        };
        app.run_one_shot(&prompt_text).await
    } else {
        app.run_interactive().await
    }
}
