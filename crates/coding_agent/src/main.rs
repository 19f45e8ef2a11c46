use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use artifice::platform::{self, InterruptGuard};
use artifice::{logging, EnvConfig, ProgressIndicator};
use clap::Parser;
use coding_agent::agent::Agent;
use coding_agent::approval::ApprovalPolicy;
use coding_agent::cli::Cli;
use coding_agent::input::{build_user_message, read_piped, PromptArgs};
use coding_agent::prompts::{DirPromptStore, PromptStore};
use coding_agent::providers::provider_for_settings;
use coding_agent::runner::{AgentLoop, LoopStatus, TurnHooks};
use coding_agent::settings::Settings;
use coding_agent::tools::{tool_definitions, BuiltinToolExecutor};
use coding_agent::transcript::{MarkdownTranscriptWriter, Transcript, TranscriptWriter};

const CONTROLLING_TTY: &str = "/dev/tty";

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.logging);

    let interrupted = Arc::new(AtomicBool::new(false));
    let code = run(&cli, &interrupted);

    if interrupted.load(Ordering::SeqCst) {
        if let Err(error) = platform::reraise_interrupt() {
            tracing::debug!(%error, "could not re-raise SIGINT");
        }
    }
    code
}

fn run(cli: &Cli, interrupted: &Arc<AtomicBool>) -> ExitCode {
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(error) => {
            eprintln!("Error: cannot determine current directory: {error}");
            return ExitCode::FAILURE;
        }
    };
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let prompt_store = DirPromptStore::default_locations(&cwd, home.as_deref());

    if cli.list_prompts {
        let mut stdout = io::stdout().lock();
        for name in prompt_store.list() {
            let _ = writeln!(stdout, "{name}");
        }
        return ExitCode::SUCCESS;
    }

    let settings = match Settings::from_env(&cli.settings_overrides()) {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("Configuration error: {error}");
            return ExitCode::FAILURE;
        }
    };

    let prompt_args = match PromptArgs::split(&cli.args) {
        Ok(args) => args,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };
    let piped = (!platform::stdin_is_terminal()).then(|| read_piped(&mut io::stdin()));
    let message =
        match build_user_message(&prompt_args.prompt(), &prompt_args.attachments, piped.as_deref())
        {
            Ok(message) => message,
            Err(error) => {
                eprintln!("{error}");
                return ExitCode::FAILURE;
            }
        };
    if message.is_empty() {
        return ExitCode::SUCCESS;
    }

    let system_prompt = if let Some(literal) = cli.system_prompt.clone() {
        Some(literal)
    } else if let Some(name) = cli.prompt_name.as_deref() {
        match prompt_store.load(name) {
            Some(text) => Some(text),
            None => {
                eprintln!("Error: Unknown prompt '{name}'");
                return ExitCode::FAILURE;
            }
        }
    } else {
        settings.system_prompt.clone()
    };

    let provider = match provider_for_settings(&settings) {
        Ok(provider) => provider,
        Err(error) => {
            eprintln!("Error: {error}");
            return ExitCode::FAILURE;
        }
    };

    let mut executor = match BuiltinToolExecutor::new(cwd.clone()) {
        Ok(executor) => executor.with_cancel_signal(Arc::clone(interrupted)),
        Err(error) => {
            eprintln!("Error: {error}");
            return ExitCode::FAILURE;
        }
    };
    let mut approval = ApprovalPolicy::new(settings.tool_approval, &settings.tool_allowlist);
    let mut agent = Agent::new(provider, system_prompt.clone(), tool_definitions(&settings.tools));
    let profile = agent.profile();

    let mut interrupt_guard = match InterruptGuard::install(Arc::clone(interrupted)) {
        Ok(guard) => Some(guard),
        Err(error) => {
            tracing::warn!(%error, "SIGINT handler not installed; Ctrl-C will terminate immediately");
            None
        }
    };

    let mut progress = start_progress();
    let mut prompt_input = approval_input();
    let mut console = io::stderr();
    let mut hooks = ProgressHooks(&progress);
    let mut on_text = |text: &str| progress.write_chunk(text);

    let outcome = AgentLoop {
        executor: &mut executor,
        approval: &mut approval,
        prompt_input: &mut *prompt_input,
        console: &mut console,
        hooks: &mut hooks,
        show_tool_output: cli.tool_output,
    }
    .run(&mut agent, &message, interrupted, &mut on_text);

    progress.stop();
    if let Some(guard) = interrupt_guard.as_mut() {
        guard.uninstall();
    }

    let was_interrupted = interrupted.load(Ordering::SeqCst);
    if was_interrupted || (!outcome.text.is_empty() && !outcome.text.ends_with('\n')) {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(b"\n").and_then(|()| stdout.flush());
    }
    tracing::debug!(
        input_tokens = outcome.usage.input_tokens,
        output_tokens = outcome.usage.output_tokens,
        status = ?outcome.status,
        "run finished"
    );

    match outcome.status {
        LoopStatus::Completed => {
            if settings.save_transcript {
                save_transcript(
                    home.as_deref(),
                    &Transcript {
                        prompt: &message,
                        system_prompt: system_prompt.as_deref(),
                        model: &profile.model_id,
                        provider: &profile.provider_id,
                        text: &outcome.text,
                    },
                );
            }
            ExitCode::SUCCESS
        }
        LoopStatus::Interrupted | LoopStatus::Aborted => ExitCode::SUCCESS,
        LoopStatus::Failed(_) => ExitCode::FAILURE,
    }
}

struct ProgressHooks<'a>(&'a ProgressIndicator);

impl TurnHooks for ProgressHooks<'_> {
    fn turn_started(&mut self) {
        self.0.turn_started();
    }

    fn turn_finished(&mut self) {
        self.0.turn_finished();
    }
}

/// Animated only when stderr is a terminal and the user has not opted out.
fn start_progress() -> ProgressIndicator {
    let env = EnvConfig::from_env();
    if env.no_progress || !platform::stderr_is_terminal() {
        return ProgressIndicator::passthrough(Box::new(io::stdout()));
    }
    match ProgressIndicator::start(env.heartbeat) {
        Ok(indicator) => indicator,
        Err(error) => {
            tracing::debug!(%error, "progress ticker unavailable");
            ProgressIndicator::passthrough(Box::new(io::stdout()))
        }
    }
}

/// Approval answers come from stdin, or from the controlling terminal when
/// stdin carried piped prompt text.
fn approval_input() -> Box<dyn BufRead> {
    if platform::stdin_is_terminal() {
        return Box::new(io::stdin().lock());
    }
    match File::open(CONTROLLING_TTY) {
        Ok(tty) => Box::new(BufReader::new(tty)),
        Err(error) => {
            tracing::debug!(%error, "no controlling terminal for approval prompts");
            Box::new(io::stdin().lock())
        }
    }
}

fn save_transcript(home: Option<&std::path::Path>, transcript: &Transcript<'_>) {
    let Some(home) = home else {
        tracing::debug!("HOME not set; transcript not saved");
        return;
    };
    match MarkdownTranscriptWriter::in_home(home).save(transcript) {
        Ok(path) => tracing::debug!(path = %path.display(), "transcript saved"),
        Err(error) => tracing::warn!(%error, "failed to save transcript"),
    }
}
