//! CLI — stdin/stdout REPL over a guide session.
//!
//! Plain lines answer intake questions. Once the pipeline is running the
//! slash commands drive it: `/next`, `/retry`, `/week`, `/month`, `/year`.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt, stream};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, Notify};

use crate::progress::ProgressTicker;
use crate::session::{GuideSession, SessionPhase};
use crate::stages::{Horizon, StageResult};

/// A parsed line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Next,
    Retry,
    Horizon(Horizon),
    Help,
    Quit,
    /// An unrecognized slash command.
    Unknown(String),
    /// Free text, used as an intake answer.
    Text(String),
}

impl CliCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some(command) = trimmed.strip_prefix('/') else {
            return Self::Text(trimmed.to_string());
        };
        match command.to_lowercase().as_str() {
            "next" | "n" => Self::Next,
            "retry" | "r" => Self::Retry,
            "help" | "h" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => match other.parse::<Horizon>() {
                Ok(horizon) => Self::Horizon(horizon),
                Err(_) => Self::Unknown(trimmed.to_string()),
            },
        }
    }
}

const HELP: &str = "\
Commands:
  /next              continue to the next stage
  /retry             try the current stage again after an error
  /week /month /year choose the roadmap horizon
  /quit              leave";

/// Runs the REPL until `/quit` or end of input.
pub struct CliRunner {
    session: Arc<Mutex<GuideSession>>,
    caption_interval: Duration,
}

impl CliRunner {
    pub fn new(session: Arc<Mutex<GuideSession>>, caption_interval: Duration) -> Self {
        Self {
            session,
            caption_interval,
        }
    }

    pub async fn run(&self) {
        if let Some(prompt) = self.session.lock().await.current_prompt() {
            println!("\n{}\n", prompt);
        }

        let mut lines = Box::pin(stdin_lines());
        // Captions for the stage being waited on; `None` when nothing is pending.
        let mut waiting: Option<ProgressTicker> = None;
        eprint!("> ");
        loop {
            let arrivals = self.session.lock().await.arrivals();
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, leaving");
                    break;
                }
                _ = arrival(arrivals), if waiting.is_some() => {
                    let mut session = self.session.lock().await;
                    session.drain_ready();
                    if let Some(view) = settled_view(&session) {
                        waiting = None;
                        println!("{}", view);
                        eprint!("> ");
                    }
                }
                line = lines.next() => {
                    let Some(line) = line else {
                        break;
                    };
                    let command = CliCommand::parse(&line);
                    if command == CliCommand::Quit {
                        break;
                    }
                    if command != CliCommand::Text(String::new()) {
                        let mut session = self.session.lock().await;
                        let shown = match session.phase() {
                            SessionPhase::Intake => self.handle_intake(&mut session, command).await,
                            _ => self.handle_pipeline(&mut session, command),
                        };
                        if shown {
                            waiting = self.show_stage(&session);
                        }
                    }
                    eprint!("> ");
                }
            }
        }
        tracing::info!("CLI session ended");
    }

    /// Returns true when a stage was started and should be shown.
    async fn handle_intake(&self, session: &mut GuideSession, command: CliCommand) -> bool {
        let text = match command {
            CliCommand::Text(text) => text,
            CliCommand::Help => {
                println!("{}", HELP);
                return false;
            }
            _ => {
                eprintln!("Please answer the question first.");
                return false;
            }
        };

        let reply = session.submit(&text);
        if !reply.accepted {
            return false;
        }
        if let Some(prompt) = reply.next_prompt {
            println!("\n{}\n", prompt);
        }
        reply.is_complete && session.hand_off().await
    }

    fn handle_pipeline(&self, session: &mut GuideSession, command: CliCommand) -> bool {
        let result = match command {
            CliCommand::Next => session.advance().map(|_| ()),
            CliCommand::Retry => session.retry(),
            CliCommand::Horizon(horizon) => session.select_horizon(horizon),
            CliCommand::Help => {
                println!("{}", HELP);
                return false;
            }
            CliCommand::Unknown(cmd) => {
                eprintln!("Unknown command: {}. Type /help for commands.", cmd);
                return false;
            }
            CliCommand::Text(_) => {
                eprintln!("Type /next to continue or /help for commands.");
                return false;
            }
            CliCommand::Quit => return false,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                eprintln!("{}", e);
                false
            }
        }
    }

    /// Print the active stage header. A settled stage is printed in full;
    /// a pending one gets a caption ticker, returned so the caller can stop
    /// it when the result arrives.
    fn show_stage(&self, session: &GuideSession) -> Option<ProgressTicker> {
        let pipeline = session.pipeline()?;
        let stage = pipeline.active_stage();
        match pipeline.horizon() {
            Some(horizon) => println!("\n== {} ({}) ==", stage.title(), horizon.label()),
            None => println!("\n== {} ==", stage.title()),
        }

        match settled_view(session) {
            Some(view) => {
                println!("{}", view);
                None
            }
            None => Some(ProgressTicker::spawn(
                stage,
                self.caption_interval,
                |caption| eprintln!("  {}", caption),
            )),
        }
    }
}

/// Resolves on the next stage arrival. Never resolves before the handoff.
async fn arrival(signal: Option<Arc<Notify>>) {
    match signal {
        Some(signal) => signal.notified().await,
        None => std::future::pending().await,
    }
}

/// Text for the active stage once it has settled; `None` while pending or
/// before the handoff.
fn settled_view(session: &GuideSession) -> Option<String> {
    let pipeline = session.pipeline()?;
    let stage = pipeline.active_stage();
    match pipeline.state() {
        StageResult::Pending => None,
        StageResult::Success(text) => {
            let mut view = format!("\n{}\n", text);
            if stage.takes_horizon() {
                view.push_str("\n/week /month /year to change horizon.");
            }
            if !stage.is_terminal() {
                view.push_str("\n/next to continue.");
            }
            Some(view)
        }
        StageResult::Failure(_) => Some(format!(
            "\nSomething went wrong while preparing your {}. Type /retry to try again.\n",
            stage.title()
        )),
    }
}

fn stdin_lines() -> impl Stream<Item = String> {
    let lines = BufReader::new(tokio::io::stdin()).lines();
    stream::unfold(lines, |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((line, lines)),
            Ok(None) => None,
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::time::timeout;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::stages::{GeneratorConfig, StageGenerator};

    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: "artifact".into(),
                input_tokens: 1,
                output_tokens: 1,
            })
        }
    }

    fn session() -> GuideSession {
        let generator = Arc::new(StageGenerator::new(
            Arc::new(EchoLlm),
            GeneratorConfig::default(),
        ));
        GuideSession::new(generator, Duration::ZERO)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(CliCommand::parse("/next"), CliCommand::Next);
        assert_eq!(CliCommand::parse(" /RETRY "), CliCommand::Retry);
        assert_eq!(CliCommand::parse("/q"), CliCommand::Quit);
        assert_eq!(CliCommand::parse("/help"), CliCommand::Help);
    }

    #[test]
    fn parses_horizons() {
        assert_eq!(CliCommand::parse("/week"), CliCommand::Horizon(Horizon::Week));
        assert_eq!(CliCommand::parse("/month"), CliCommand::Horizon(Horizon::Month));
        assert_eq!(CliCommand::parse("/yearly"), CliCommand::Horizon(Horizon::Year));
    }

    #[test]
    fn plain_text_is_an_answer() {
        assert_eq!(
            CliCommand::parse("  Asha  "),
            CliCommand::Text("Asha".to_string())
        );
        assert_eq!(CliCommand::parse("   "), CliCommand::Text(String::new()));
    }

    #[test]
    fn unknown_slash_command() {
        assert_eq!(
            CliCommand::parse("/dance"),
            CliCommand::Unknown("/dance".to_string())
        );
    }

    #[tokio::test]
    async fn nothing_to_render_before_handoff() {
        let session = session();
        assert!(settled_view(&session).is_none());
        assert!(session.arrivals().is_none());
    }

    #[tokio::test]
    async fn result_renders_without_holding_the_session() {
        let session = Arc::new(Mutex::new(session()));
        {
            let mut guard = session.lock().await;
            for answer in [
                "Asha",
                "12/05/1990, 14:30, Mumbai",
                "Pune; Career",
                "Job stress",
                "Mix",
            ] {
                guard.submit_and_hand_off(answer).await;
            }
            assert!(settled_view(&guard).is_none(), "analysis is still pending");
        }

        let signal = session.lock().await.arrivals();
        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                arrival(signal).await;
                let mut guard = session.lock().await;
                guard.drain_ready();
                settled_view(&guard)
            })
        };
        // Other callers can use the session while the result is outstanding.
        assert!(session.try_lock().is_ok());

        let view = timeout(Duration::from_secs(5), waiter)
            .await
            .expect("result never arrived")
            .unwrap()
            .expect("stage still pending");
        assert!(view.contains("artifact"));
        assert!(view.contains("/next to continue."));
    }
}
