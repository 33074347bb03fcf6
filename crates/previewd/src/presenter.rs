// Terminal presenter for the interactive prompt mode.
//
// Prompts are serialized so two updates never interleave on the terminal,
// and share one buffered stdin reader so no typed-ahead line is lost.
// Anything but an explicit "y"/"yes" counts as a dismissal.

use async_trait::async_trait;
use preview_core::prompt::{PromptResponse, UpdatePresenter};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::warn;
use url::Url;

#[derive(Debug)]
pub struct TerminalPresenter<R = Stdin> {
    input: Mutex<BufReader<R>>,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::with_input(tokio::io::stdin())
    }
}

impl<R: AsyncRead + Unpin> TerminalPresenter<R> {
    /// Presenter reading answers from `input` instead of stdin
    pub fn with_input(input: R) -> Self {
        Self {
            input: Mutex::new(BufReader::new(input)),
        }
    }
}

impl Default for TerminalPresenter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

const fn opener() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(windows) {
        "explorer"
    } else {
        "xdg-open"
    }
}

#[async_trait]
impl<R> UpdatePresenter for TerminalPresenter<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn present(&self, title: &str, message: &str) -> PromptResponse {
        let mut input = self.input.lock().await;

        let mut stdout = tokio::io::stdout();
        let question = format!("\n{title}\n{message} [y/N] ");
        if let Err(e) = stdout.write_all(question.as_bytes()).await {
            warn!("Failed to write prompt: {}", e);
            return PromptResponse::Dismiss;
        }
        let _ = stdout.flush().await;

        let mut answer = String::new();
        match input.read_line(&mut answer).await {
            Ok(read) if read > 0 && is_yes(&answer) => PromptResponse::Install,
            Ok(_) => PromptResponse::Dismiss,
            Err(e) => {
                warn!("Failed to read prompt answer: {}", e);
                PromptResponse::Dismiss
            }
        }
    }

    async fn open(&self, location: &Url) -> Result<(), preview_core::Error> {
        let status = tokio::process::Command::new(opener())
            .arg(location.as_str())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {}
            Ok(status) => {
                warn!("{} exited with {}; open the link manually", opener(), status);
                println!("{location}");
            }
            Err(e) => {
                warn!("Failed to launch {}: {}; open the link manually", opener(), e);
                println!("{location}");
            }
        }
        Ok(())
    }
}
