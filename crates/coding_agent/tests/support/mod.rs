#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

use agent_provider::{CancelSignal, Message, TurnProvider};
use agent_provider_mock::{MockProvider, ScriptedTurn};
use coding_agent::agent::Agent;
use coding_agent::approval::{ApprovalMode, ApprovalPolicy};
use coding_agent::runner::{AgentLoop, LoopOutcome, TurnHooks};
use coding_agent::tools::{tool_definitions, BuiltinToolExecutor};
use tempfile::TempDir;

/// Counts hook calls and checks they stay balanced.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    pub started: usize,
    pub finished: usize,
    pub max_open: usize,
}

impl TurnHooks for RecordingHooks {
    fn turn_started(&mut self) {
        self.started += 1;
        self.max_open = self.max_open.max(self.started - self.finished);
    }

    fn turn_finished(&mut self) {
        self.finished += 1;
    }
}

/// Everything observable after one loop run.
pub struct LoopRun {
    pub outcome: LoopOutcome,
    pub console: String,
    pub streamed: String,
    pub hooks: RecordingHooks,
    pub agent: Agent,
}

impl LoopRun {
    pub fn messages(&self) -> &[Message] {
        self.agent.conversation().messages()
    }
}

/// A scripted provider, a scratch workspace and in-memory approval IO.
pub struct LoopFixture {
    pub workspace: TempDir,
    pub provider: Arc<MockProvider>,
    pub cancel: CancelSignal,
    mode: ApprovalMode,
    allowlist: Vec<String>,
    answers: String,
    show_tool_output: bool,
}

impl LoopFixture {
    pub fn new(script: Vec<ScriptedTurn>) -> Self {
        Self {
            workspace: tempfile::tempdir().expect("temp workspace"),
            provider: Arc::new(MockProvider::new(script)),
            cancel: Arc::new(AtomicBool::new(false)),
            mode: ApprovalMode::Auto,
            allowlist: Vec::new(),
            answers: String::new(),
            show_tool_output: false,
        }
    }

    pub fn with_approval(mut self, mode: ApprovalMode, allowlist: &[&str]) -> Self {
        self.mode = mode;
        self.allowlist = allowlist.iter().map(|pattern| pattern.to_string()).collect();
        self
    }

    pub fn with_answers(mut self, answers: &str) -> Self {
        self.answers = answers.to_string();
        self
    }

    pub fn with_tool_output(mut self) -> Self {
        self.show_tool_output = true;
        self
    }

    pub fn run(&self, prompt: &str) -> LoopRun {
        let provider: Arc<dyn TurnProvider> = Arc::clone(&self.provider) as Arc<dyn TurnProvider>;
        let mut agent = Agent::new(provider, None, tool_definitions(&["*".to_string()]));
        let mut executor = BuiltinToolExecutor::new(self.workspace.path())
            .expect("workspace root should be valid")
            .with_cancel_signal(Arc::clone(&self.cancel));
        let mut approval = ApprovalPolicy::new(self.mode, &self.allowlist);
        let mut prompt_input = Cursor::new(self.answers.clone().into_bytes());
        let mut console = Vec::new();
        let mut hooks = RecordingHooks::default();
        let streamed = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&streamed);
        let mut on_text = move |text: &str| lock_unpoisoned(&sink).push_str(text);

        let outcome = AgentLoop {
            executor: &mut executor,
            approval: &mut approval,
            prompt_input: &mut prompt_input,
            console: &mut console,
            hooks: &mut hooks,
            show_tool_output: self.show_tool_output,
        }
        .run(&mut agent, prompt, &self.cancel, &mut on_text);

        let streamed = lock_unpoisoned(&streamed).clone();
        LoopRun {
            outcome,
            console: String::from_utf8_lossy(&console).into_owned(),
            streamed,
            hooks,
            agent,
        }
    }
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub fn tool_results(messages: &[Message]) -> Vec<(String, String)> {
    messages
        .iter()
        .filter_map(|message| match message {
            Message::Tool {
                tool_call_id,
                content,
            } => Some((tool_call_id.clone(), content.clone())),
            _ => None,
        })
        .collect()
}
