//! Wires the core agent loop to a terminal: one-shot and interactive
//! entry points, slash-command dispatch, and chunk-queue driving.

use crate::agent::tools::SharedExecutor;
use crate::agent::AgentLoop;
use crate::chunk_queue::ChunkQueue;
use crate::cli::{
    provider, registry, session, slash::{parse_slash_command, SlashCommand}, TerminalConfirm,
    TerminalPolicyPrompt,
};
use crate::command_safety::CommandValidator;
use crate::config::{self, paths, Provider};
use crate::context::{process_special_commands, NullProgress, ProgressCallback};
use crate::executor::CommandExecutor;
use crate::policy::PolicyManager;
use crate::ChatCliError;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct App {
    agent: AgentLoop,
    executor: SharedExecutor,
    workdir: PathBuf,
    context_window: usize,
    chunk_queue: Option<ChunkQueue>,
    /// Set when `prepare_turn_input` just inlined a chunk's text (either
    /// the first chunk of a freshly-built queue, or one fetched by a
    /// slash command) so the caller knows to call `complete()` on the
    /// queue once the turn resolves.
    chunk_turn_in_flight: bool,
    /// `TerminalProgress` unless `--no-anim` asked for `NullProgress`.
    progress: Box<dyn ProgressCallback>,
    confirm: TerminalConfirm,
    policy_prompt: TerminalPolicyPrompt,
}

impl App {
    pub fn build(
        provider_flag: Option<&str>,
        model_flag: Option<&str>,
        one_shot: bool,
        no_anim: bool,
    ) -> Result<Self, ChatCliError> {
        let workdir = std::env::current_dir().map_err(|err| ChatCliError::Other(err.into()))?;
        let provider: Provider = provider::resolve_provider(provider_flag)?;
        let client = provider::build_client(provider, model_flag)?;
        let context_window = provider.context_window();

        let validator = CommandValidator::from_env();
        let policy = PolicyManager::new(paths::policy_rules_file());
        let executor: SharedExecutor =
            std::sync::Arc::new(tokio::sync::Mutex::new(CommandExecutor::new(workdir.clone())));
        let tools = registry::build_registry(&workdir, executor.clone());

        let agent = AgentLoop::new(
            policy,
            validator,
            tools,
            executor.clone(),
            client,
            context_window,
            false,
            one_shot,
        );

        let progress: Box<dyn ProgressCallback> = if no_anim {
            Box::new(NullProgress)
        } else {
            Box::new(crate::cli::prompts::TerminalProgress::new())
        };

        Ok(Self {
            agent,
            executor,
            workdir,
            context_window,
            chunk_queue: None,
            chunk_turn_in_flight: false,
            progress,
            confirm: TerminalConfirm,
            policy_prompt: TerminalPolicyPrompt,
        })
    }

    /// Runs exactly one turn, printing the result, and returns the
    /// process exit code.
    pub async fn run_one_shot(&mut self, prompt_text: &str) -> i32 {
        if prompt_text.trim().is_empty() {
            eprintln!("{}", ChatCliError::EmptyPrompt);
            return ChatCliError::EmptyPrompt.exit_code();
        }

        let cancel = CancellationToken::new();
        match self.prepare_turn_input(prompt_text, &cancel).await {
            Ok(input) => {
                let outcome = self
                    .agent
                    .run_turn(&input, None, &self.confirm, &self.policy_prompt, &cancel)
                    .await;
                self.complete_chunk_if_in_flight(outcome.is_ok());
                match outcome {
                    Ok(outcome) => {
                        println!("{}", outcome.assistant_text);
                        0
                    }
                    Err(err) => {
                        eprintln!("{}", crate::sanitize::redact(&err.to_string()));
                        err.exit_code()
                    }
                }
            }
            Err(err) => {
                eprintln!("{}", crate::sanitize::redact(&err.to_string()));
                err.exit_code()
            }
        }
    }

    fn complete_chunk_if_in_flight(&mut self, success: bool) {
        if std::mem::take(&mut self.chunk_turn_in_flight) {
            if let Some(queue) = self.chunk_queue.as_mut() {
                queue.complete(success);
            }
        }
    }

    /// Reads lines from stdin until EOF or a quit, dispatching slash
    /// commands to their own handlers and everything else to a turn.
    pub async fn run_interactive(&mut self) -> i32 {
        loop {
            print!("chatcli> ");
            use std::io::Write;
            let _ = std::io::stdout().flush();

            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
                return 0;
            }
            let line = line.trim_end_matches(['\n', '\r']).to_string();
            if line.trim().is_empty() {
                continue;
            }

            if let Some(command) = parse_slash_command(&line) {
                self.handle_slash(command).await;
                continue;
            }

            let cancel = CancellationToken::new();
            match self.prepare_turn_input(&line, &cancel).await {
                Ok(input) => {
                    let outcome = self
                        .agent
                        .run_turn(&input, None, &self.confirm, &self.policy_prompt, &cancel)
                        .await;
                    self.complete_chunk_if_in_flight(outcome.is_ok());
                    match outcome {
                        Ok(outcome) if outcome.cancelled => println!("operation cancelled"),
                        Ok(outcome) => println!("{}", outcome.assistant_text),
                        Err(err) => println!("{}", crate::sanitize::redact(&err.to_string())),
                    }
                }
                Err(err) => println!("{}", crate::sanitize::redact(&err.to_string())),
            }
        }
    }

    /// Resolves `@`-directives in `text`, attaching the result as a single
    /// string the agent loop treats as one user message.
    async fn prepare_turn_input(&mut self, text: &str, cancel: &CancellationToken) -> Result<String, ChatCliError> {
        let mut executor = self.executor.lock().await;
        let (cleaned, resolved) = process_special_commands(
            text,
            &self.workdir,
            self.context_window,
            &mut executor,
            self.progress.as_ref(),
            Duration::from_secs(5),
            cancel,
        )
        .await?;
        drop(executor);

        if resolved.queued_chunks.is_some() {
            self.chunk_queue = resolved.queued_chunks;
            self.chunk_turn_in_flight = true;
        }

        let mut parts = Vec::new();
        parts.extend(resolved.system_blocks);
        parts.push(cleaned);
        parts.extend(resolved.user_blocks);
        Ok(parts.join("\n\n"))
    }

    async fn handle_slash(&mut self, command: SlashCommand) {
        match command {
            SlashCommand::Agent(task) | SlashCommand::Run(task) => {
                let cancel = CancellationToken::new();
                if let Some(task) = task {
                    match self.prepare_turn_input(&task, &cancel).await {
                        Ok(input) => {
                            if let Ok(outcome) = self
                                .agent
                                .run_turn(&input, None, &self.confirm, &self.policy_prompt, &cancel)
                                .await
                            {
                                println!("{}", outcome.assistant_text);
                            }
                        }
                        Err(err) => println!("{}", crate::sanitize::redact(&err.to_string())),
                    }
                }
            }
            SlashCommand::Coder(task) => {
                self.agent.set_persona(None);
                if let Some(task) = task {
                    let cancel = CancellationToken::new();
                    if let Ok(input) = self.prepare_turn_input(&task, &cancel).await {
                        let _ = self
                            .agent
                            .run_turn(&input, None, &self.confirm, &self.policy_prompt, &cancel)
                            .await;
                    }
                }
            }
            SlashCommand::NewSession => {
                println!("(session reset is handled by the session-management collaborator)");
            }
            SlashCommand::NextChunk => self.drive_chunk_queue(ChunkAction::Next).await,
            SlashCommand::Retry => self.drive_chunk_queue(ChunkAction::RetryLast).await,
            SlashCommand::RetryAll => self.drive_chunk_queue(ChunkAction::RetryAll).await,
            SlashCommand::SkipChunk => {
                if let Some(queue) = self.chunk_queue.as_mut() {
                    queue.skip();
                }
            }
            SlashCommand::Reload => config::load_dotenv(),
            SlashCommand::Switch { .. } => {
                println!("(switching provider/model mid-session is an external collaborator concern)");
            }
        }
    }

    async fn drive_chunk_queue(&mut self, action: ChunkAction) {
        let Some(queue) = self.chunk_queue.as_mut() else {
            println!("no chunk queue is active");
            return;
        };
        let next_text = match action {
            ChunkAction::Next => queue.next(),
            ChunkAction::RetryLast => queue.retry_last(),
            ChunkAction::RetryAll => queue.retry_all(),
        };
        let Some(text) = next_text else {
            println!("nothing to send");
            return;
        };

        let cancel = CancellationToken::new();
        let outcome = self
            .agent
            .run_turn(&text, None, &self.confirm, &self.policy_prompt, &cancel)
            .await;
        let success = outcome.is_ok();
        if let Ok(outcome) = &outcome {
            println!("{}", outcome.assistant_text);
        }
        if let Some(queue) = self.chunk_queue.as_mut() {
            queue.complete(success);
        }
    }

    /// Persists the current conversation to `~/.chatcli/sessions/<name>.json`.
    pub fn save_session(&self, name: &str) -> std::io::Result<()> {
        session::save(&paths::session_file(name), self.agent.history())
    }
}

enum ChunkAction {
    Next,
    RetryLast,
    RetryAll,
}
