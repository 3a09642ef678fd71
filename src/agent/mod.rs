//! Agent Loop (C8): the turn state machine that ties every other
//! component together — prompt assembly, the LLM client, C3's tool-call
//! and legacy fenced-block parsing, C6's plan tracking, C1's validator,
//! C7's policy manager, and C2/the internal tool registry, built as a
//! turn loop out of small owned collaborators rather than one monolithic
//! function.

pub mod interactive_menu;
pub mod prompt;
pub mod tools;

use crate::command_safety::CommandValidator;
use crate::error::{ChatCliError, LlmError};
use crate::llm::LlmClient;
use crate::message::{Message, Role};
use crate::parser::{
    block_is_dangerous, extract_command_blocks, parse_tool_calls, CommandBlock, ToolCall,
};
use crate::policy::{canonical_call, PolicyManager, PolicyPrompt};
use crate::sanitize::redact;
use crate::task_tracker::{self, TaskTracker};
use async_trait::async_trait;
use prompt::{build_system_prompt, build_user_message, Persona};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tools::{InternalTool, SharedExecutor};

/// The exact consent phrase required to run a dangerous command.
/// Localized equivalents are an external-collaborator concern; the core
/// only ever checks this string.
pub const DANGEROUS_CONFIRMATION_PHRASE: &str = "sim, quero executar conscientemente";

/// Safety rail against a model that keeps emitting tool calls forever;
/// not named anywhere in the turn contract, just a backstop.
const MAX_DISPATCH_ROUNDS: u32 = 25;

/// Asks the user to type the exact confirmation phrase before a dangerous
/// command (or block containing one) runs, and to approve/deny switching
/// a command into interactive (TTY-wired) mode.
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    async fn confirm_dangerous(&self, commands: &[String]) -> bool;
    async fn confirm_interactive(&self, command: &str) -> bool;
}

/// Emitted at 70%/90% of the active model's context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextWarning {
    Approaching,
    Critical,
}

/// What one call to [`AgentLoop::run_turn`] produced.
#[derive(Debug, Default)]
pub struct TurnOutcome {
    pub assistant_text: String,
    pub tool_messages: Vec<Message>,
    pub warnings: Vec<ContextWarning>,
    pub cancelled: bool,
}

/// Owns everything the turn state machine touches: conversation history,
/// the active plan, the policy engine, the validator, the shared command
/// executor, the internal tool registry, and the active LLM client.
pub struct AgentLoop {
    history: Vec<Message>,
    tasks: TaskTracker,
    policy: PolicyManager,
    validator: CommandValidator,
    tools: HashMap<&'static str, Arc<dyn InternalTool>>,
    /// Same handle the `exec`/`rollback`/`clean` tools share; used
    /// directly by script-block dispatch, which needs
    /// `CommandExecutor::execute_script` rather than the one-command-at-a-
    /// time `exec` tool.
    executor: SharedExecutor,
    client: Arc<dyn LlmClient>,
    persona: Option<Persona>,
    coder_mode: bool,
    context_window: usize,
    turn_count: u32,
    one_shot: bool,
}

impl AgentLoop {
    pub fn new(
        policy: PolicyManager,
        validator: CommandValidator,
        tools: HashMap<&'static str, Arc<dyn InternalTool>>,
        executor: SharedExecutor,
        client: Arc<dyn LlmClient>,
        context_window: usize,
        coder_mode: bool,
        one_shot: bool,
    ) -> Self {
        Self {
            history: Vec::new(),
            tasks: TaskTracker::new(),
            policy,
            validator,
            tools,
            executor,
            client,
            persona: None,
            coder_mode,
            context_window,
            turn_count: 0,
            one_shot,
        }
    }

    pub fn set_persona(&mut self, persona: Option<Persona>) {
        self.persona = persona;
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Drives one full turn: build prompt, call the LLM, parse and
    /// dispatch tool calls, and repeat while the model keeps issuing
    /// tool calls in the same turn.
    pub async fn run_turn(
        &mut self,
        user_input: &str,
        watcher_snapshot: Option<&str>,
        confirm: &dyn ConfirmPrompt,
        policy_prompt: &dyn PolicyPrompt,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, ChatCliError> {
        let system_prompt = build_system_prompt(self.persona.as_ref(), self.coder_mode);
        let user_message = build_user_message(user_input, watcher_snapshot);

        let history_mark = self.history.len();
        self.history.push(Message::user(user_message));

        let mut warnings = Vec::new();
        let mut rounds = 0u32;

        loop {
            self.turn_count += 1;
            rounds += 1;

            // The newest entry (the user message on round one, or the
            // latest tool result on a continuation round) is sent as
            // `prompt`; everything before it is `history`, so the model
            // always sees every prior tool result.
            let latest = self.history.last().expect("just pushed").content.clone();
            let call_history = self.history[..self.history.len() - 1].to_vec();

            let deadline = crate::config::turn_deadline(self.one_shot);
            let response = match self.call_llm(&system_prompt, &call_history, &latest, deadline, cancel).await {
                LlmTurn::Ok(response) => response,
                LlmTurn::Cancelled => {
                    self.history.truncate(history_mark);
                    return Ok(TurnOutcome {
                        cancelled: true,
                        ..Default::default()
                    });
                }
                LlmTurn::Err(err) => {
                    // Drop the pending user message so history stays
                    // consistent.
                    self.history.truncate(history_mark);
                    return Err(ChatCliError::from(err));
                }
            };

            self.history.push(Message::assistant(response.text.clone()));
            self.account_usage(response.usage, &mut warnings);

            self.update_plan(&response.text);

            let tool_calls = parse_tool_calls(&response.text);
            let command_blocks = if tool_calls.is_empty() {
                extract_command_blocks(&response.text)
            } else {
                Vec::new()
            };

            if tool_calls.is_empty() && command_blocks.is_empty() {
                break;
            }

            // One-shot mode has no terminal to confirm a dangerous command
            // against: abort the whole turn instead of prompting. No
            // process is spawned.
            if self.one_shot {
                if let Some(offending) = self.find_one_shot_dangerous(&tool_calls, &command_blocks) {
                    self.history.truncate(history_mark);
                    return Err(ChatCliError::DangerousCommandAborted(offending));
                }
            }

            let mut dispatched_any = false;
            let mut failed = false;

            for call in &tool_calls {
                dispatched_any = true;
                let outcome = match call {
                    Ok(tool_call) => {
                        self.dispatch_tool_call(tool_call, confirm, policy_prompt, cancel).await
                    }
                    Err(err) => Err(format!("refused: {err}")),
                };
                failed = outcome.is_err();
                self.history.push(Message::tool(into_content(outcome)));
                if failed {
                    break;
                }
            }

            if !failed {
                for block in &command_blocks {
                    dispatched_any = true;
                    let outcome = self.dispatch_command_block(block, confirm, policy_prompt, cancel).await;
                    failed = outcome.is_err();
                    self.history.push(Message::tool(into_content(outcome)));
                    if failed {
                        break;
                    }
                }
            }

            if !dispatched_any || rounds >= MAX_DISPATCH_ROUNDS {
                break;
            }

            // The model batched tool calls in one response; re-enter the
            // loop immediately so it sees the latest tool result as the
            // next prompt.
        }

        let assistant_text = self
            .history
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        Ok(TurnOutcome {
            assistant_text,
            tool_messages: self.history[history_mark..].to_vec(),
            warnings,
            cancelled: false,
        })
    }

    async fn call_llm(
        &self,
        system_prompt: &str,
        history: &[Message],
        prompt: &str,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> LlmTurn {
        tokio::select! {
            result = tokio::time::timeout(deadline, self.client.send_prompt(system_prompt, history, prompt, 4096)) => {
                match result {
                    Ok(Ok(response)) => LlmTurn::Ok(response),
                    Ok(Err(err)) => LlmTurn::Err(err),
                    Err(_elapsed) => LlmTurn::Err(LlmError::Network("llm call exceeded the turn deadline".to_string())),
                }
            }
            _ = cancel.cancelled() => LlmTurn::Cancelled,
        }
    }

    fn account_usage(&self, usage: crate::llm::TokenUsage, warnings: &mut Vec<ContextWarning>) {
        let used = usage.total() as f64;
        let budget = self.context_window as f64;
        if budget <= 0.0 {
            return;
        }
        let ratio = used / budget;
        if ratio >= 0.9 {
            warnings.push(ContextWarning::Critical);
        } else if ratio >= 0.7 {
            warnings.push(ContextWarning::Approaching);
        }
    }

    /// Differing signature replans (preserving completed tasks); same
    /// signature patches statuses from checkbox markers in place.
    fn update_plan(&self, response_text: &str) {
        let Some(reasoning) = extract_reasoning(response_text) else {
            return;
        };
        let new_signature = task_tracker::reasoning_signature(&reasoning);
        if new_signature != self.tasks.get_plan().plan_signature {
            self.tasks.reset_plan_from_reasoning(&reasoning, true);
        } else {
            self.tasks.update_statuses_from_reasoning(&reasoning);
        }
        if self.tasks.needs_replanning() {
            self.tasks.reset_plan();
        }
    }

    /// Finds the first dangerous exec call or command block in this
    /// round, if any, for the one-shot abort check above.
    fn find_one_shot_dangerous(
        &self,
        tool_calls: &[Result<ToolCall, crate::error::ParseError>],
        command_blocks: &[CommandBlock],
    ) -> Option<String> {
        for call in tool_calls {
            if let Ok(tool_call) = call {
                let tool_name = tool_call.name.trim_start_matches('@');
                if tool_name == "exec" && self.validator.is_dangerous(&tool_call.args) {
                    return Some(tool_call.args.clone());
                }
            }
        }
        for block in command_blocks {
            if block_is_dangerous(block, &self.validator) {
                return Some(block.commands.join("; "));
            }
        }
        None
    }

    /// Dispatches one structured `<tool_call>`: dangerous-command
    /// confirmation (exec only) → policy check → internal-tool lookup →
    /// execute.
    async fn dispatch_tool_call(
        &self,
        call: &ToolCall,
        confirm: &dyn ConfirmPrompt,
        policy_prompt: &dyn PolicyPrompt,
        cancel: &CancellationToken,
    ) -> Result<String, String> {
        let tool_name = call.name.trim_start_matches('@');

        if tool_name == "exec" {
            if self.validator.is_dangerous(&call.args) {
                if !confirm.confirm_dangerous(std::slice::from_ref(&call.args)).await {
                    return Err(
                        "refused: dangerous command requires the explicit confirmation phrase".to_string(),
                    );
                }
            }
            if self.validator.is_likely_interactive(&call.args) && !confirm.confirm_interactive(&call.args).await {
                return Err("refused: interactive command declined by user".to_string());
            }
        }

        if let Err(denied) = self.policy.resolve(tool_name, &call.args, policy_prompt).await {
            return Err(format!("denied by policy: {}", denied.reason));
        }

        let Some(tool) = self.tools.get(tool_name) else {
            return Err(format!("unknown tool: {tool_name}"));
        };

        tool.execute(&call.args, cancel).await.map_err(|err| redact(&err.to_string()))
    }

    /// Dispatches a legacy fenced `CommandBlock`: one aggregate dangerous
    /// confirmation for the whole block (rather than per-line), since the
    /// block is presented to the user as a single unit of work — see
    /// DESIGN.md for the corresponding Open Question on batched
    /// confirmations. Non-script blocks run their lines through the
    /// `exec` internal tool so `cd` tracking stays shared with
    /// `<tool_call name="@exec">` dispatch; script-tagged blocks hand off
    /// to `dispatch_script_block` instead.
    async fn dispatch_command_block(
        &self,
        block: &CommandBlock,
        confirm: &dyn ConfirmPrompt,
        policy_prompt: &dyn PolicyPrompt,
        cancel: &CancellationToken,
    ) -> Result<String, String> {
        if block_is_dangerous(block, &self.validator)
            && !confirm.confirm_dangerous(&block.commands).await
        {
            return Err("refused: dangerous command requires the explicit confirmation phrase".to_string());
        }

        if block.is_script {
            return self.dispatch_script_block(block, policy_prompt, cancel).await;
        }

        let Some(exec_tool) = self.tools.get("exec") else {
            return Err("unknown tool: exec".to_string());
        };

        let mut outputs = Vec::with_capacity(block.commands.len());
        for command in &block.commands {
            if self.validator.is_likely_interactive(command) && !confirm.confirm_interactive(command).await {
                return Err("refused: interactive command declined by user".to_string());
            }
            if let Err(denied) = self.policy.resolve("exec", command, policy_prompt).await {
                return Err(format!("denied by policy: {}", denied.reason));
            }
            match exec_tool.execute(command, cancel).await {
                Ok(output) => outputs.push(output),
                Err(err) => return Err(redact(&err.to_string())),
            }
        }
        Ok(outputs.join("\n"))
    }

    /// Writes a script-tagged block's lines to a temp file and runs them
    /// as one interpreted script rather than line-by-line shell commands.
    /// One policy check covers the whole body, since there is no useful
    /// per-line granularity for a script's lines.
    async fn dispatch_script_block(
        &self,
        block: &CommandBlock,
        policy_prompt: &dyn PolicyPrompt,
        cancel: &CancellationToken,
    ) -> Result<String, String> {
        let body = block.commands.join("\n");
        if let Err(denied) = self.policy.resolve("exec", &body, policy_prompt).await {
            return Err(format!("denied by policy: {}", denied.reason));
        }
        let mut executor = self.executor.lock().await;
        let result = executor
            .execute_script(&body, block.script_type.as_deref(), cancel.clone())
            .await;
        Ok(tools::format_execution_result(&result))
    }
}

enum LlmTurn {
    Ok(crate::llm::LlmResponse),
    Err(LlmError),
    Cancelled,
}

fn into_content(outcome: Result<String, String>) -> String {
    match outcome {
        Ok(text) => text,
        Err(text) => text,
    }
}

/// Pulls the `<reasoning>...</reasoning>` block out of model output, if
/// present.
fn extract_reasoning(text: &str) -> Option<String> {
    let start = text.find("<reasoning>")? + "<reasoning>".len();
    let end = text[start..].find("</reasoning>")? + start;
    Some(text[start..end].to_string())
}

/// Canonical policy call string for a tool call, exposed for callers
/// (e.g. the interactive prompt renderer) that want to show the user
/// what is about to be checked against the policy rules.
pub fn describe_call(tool: &str, args: &str) -> String {
    canonical_call(tool, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, TokenUsage};
    use crate::message::Message as Msg;
    use crate::policy::PromptChoice;
    use std::sync::Mutex;

    struct ScriptedClient {
        responses: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        fn model_name(&self) -> &str {
            "scripted-test-model"
        }

        async fn send_prompt(
            &self,
            _system_prompt: &str,
            _history: &[Msg],
            _prompt: &str,
            _max_tokens: u32,
        ) -> Result<LlmResponse, LlmError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Ok(LlmResponse {
                    text: String::new(),
                    usage: TokenUsage::default(),
                });
            }
            let text = responses.remove(0);
            Ok(LlmResponse {
                text: text.clone(),
                usage: TokenUsage::estimate("prompt", &text),
            })
        }
    }

    struct AlwaysConfirm;

    #[async_trait]
    impl ConfirmPrompt for AlwaysConfirm {
        async fn confirm_dangerous(&self, _commands: &[String]) -> bool {
            true
        }
        async fn confirm_interactive(&self, _command: &str) -> bool {
            true
        }
    }

    struct AllowOncePrompt;

    #[async_trait]
    impl PolicyPrompt for AllowOncePrompt {
        async fn ask(&self, _tool: &str, _args: &str, _suggested_pattern: &str) -> PromptChoice {
            PromptChoice::RunOnce
        }
    }

    fn test_loop(
        client: ScriptedClient,
        tools_dir: &std::path::Path,
        one_shot: bool,
    ) -> (AgentLoop, std::path::PathBuf) {
        let rules_path = tools_dir.join("rules");
        let policy = PolicyManager::new(rules_path.clone());
        let validator = CommandValidator::default();
        let executor = Arc::new(tokio::sync::Mutex::new(crate::executor::CommandExecutor::new(
            tools_dir.to_path_buf(),
        )));
        let mut tools: HashMap<&'static str, Arc<dyn InternalTool>> = HashMap::new();
        tools.insert("exec", Arc::new(tools::ExecTool { executor: executor.clone() }));
        let agent = AgentLoop::new(
            policy,
            validator,
            tools,
            executor,
            Arc::new(client),
            8_000,
            false,
            one_shot,
        );
        (agent, rules_path)
    }

    #[tokio::test]
    async fn plain_text_response_ends_turn_without_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient {
            responses: Mutex::new(vec!["just some prose, no tools".to_string()]),
        };
        let (mut agent, _rules) = test_loop(client, dir.path(), false);
        let confirm = AlwaysConfirm;
        let prompt = AllowOncePrompt;
        let cancel = CancellationToken::new();

        let outcome = agent
            .run_turn("hello", None, &confirm, &prompt, &cancel)
            .await
            .unwrap();

        assert!(!outcome.cancelled);
        assert_eq!(outcome.assistant_text, "just some prose, no tools");
        assert!(agent.tasks().get_plan().tasks.is_empty());
    }

    #[tokio::test]
    async fn tool_call_executes_and_feeds_result_back_into_next_round() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient {
            responses: Mutex::new(vec![
                r#"<tool_call name="@exec" args="echo hi" />"#.to_string(),
                "done".to_string(),
            ]),
        };
        let (mut agent, _rules) = test_loop(client, dir.path(), false);
        let confirm = AlwaysConfirm;
        let prompt = AllowOncePrompt;
        let cancel = CancellationToken::new();

        let outcome = agent
            .run_turn("run echo", None, &confirm, &prompt, &cancel)
            .await
            .unwrap();

        assert_eq!(outcome.assistant_text, "done");
        let tool_msg = agent
            .history()
            .iter()
            .find(|m| m.role == Role::Tool)
            .expect("a tool message should have been appended");
        assert!(tool_msg.content.contains("hi"));
    }

    #[tokio::test]
    async fn reasoning_plan_is_installed_from_first_response() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient {
            responses: Mutex::new(vec![
                "<reasoning>1. Step one\n2. Step two</reasoning>\nok".to_string(),
            ]),
        };
        let (mut agent, _rules) = test_loop(client, dir.path(), false);
        let confirm = AlwaysConfirm;
        let prompt = AllowOncePrompt;
        let cancel = CancellationToken::new();

        agent.run_turn("plan it", None, &confirm, &prompt, &cancel).await.unwrap();
        let plan = agent.tasks().get_plan();
        assert_eq!(plan.tasks.len(), 2);
    }

    #[tokio::test]
    async fn dangerous_command_without_confirmation_is_refused() {
        struct NeverConfirm;
        #[async_trait]
        impl ConfirmPrompt for NeverConfirm {
            async fn confirm_dangerous(&self, _commands: &[String]) -> bool {
                false
            }
            async fn confirm_interactive(&self, _command: &str) -> bool {
                true
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient {
            responses: Mutex::new(vec![
                r#"<tool_call name="@exec" args="rm -rf /" />"#.to_string(),
                "stopped".to_string(),
            ]),
        };
        let (mut agent, _rules) = test_loop(client, dir.path(), false);
        let confirm = NeverConfirm;
        let prompt = AllowOncePrompt;
        let cancel = CancellationToken::new();

        agent.run_turn("clean up", None, &confirm, &prompt, &cancel).await.unwrap();
        let tool_msg = agent.history().iter().find(|m| m.role == Role::Tool).unwrap();
        assert!(tool_msg.content.contains("refused"));
    }

    #[tokio::test]
    async fn one_shot_dangerous_command_aborts_the_turn_without_prompting() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient {
            responses: Mutex::new(vec![r#"<tool_call name="@exec" args="rm -rf /tmp" />"#.to_string()]),
        };
        let (mut agent, _rules) = test_loop(client, dir.path(), true);
        let confirm = AlwaysConfirm;
        let prompt = AllowOncePrompt;
        let cancel = CancellationToken::new();
        let history_before = agent.history().len();

        let err = agent
            .run_turn("delete the tmp folder", None, &confirm, &prompt, &cancel)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("potencialmente perigoso"));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(agent.history().len(), history_before);
    }

    #[tokio::test]
    async fn cancellation_before_response_rolls_back_the_user_message() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient {
            responses: Mutex::new(vec!["unused".to_string()]),
        };
        let (mut agent, _rules) = test_loop(client, dir.path(), false);
        let confirm = AlwaysConfirm;
        let prompt = AllowOncePrompt;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let history_before = agent.history().len();
        let outcome = agent
            .run_turn("will be cancelled", None, &confirm, &prompt, &cancel)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(agent.history().len(), history_before);
    }

    #[test]
    fn extract_reasoning_returns_none_without_a_block() {
        assert_eq!(extract_reasoning("no reasoning here"), None);
    }

    #[test]
    fn extract_reasoning_returns_inner_text() {
        let text = "<reasoning>1. Do it</reasoning>\nsure";
        assert_eq!(extract_reasoning(text), Some("1. Do it".to_string()));
    }
}
