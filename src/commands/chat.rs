//! Terminal conversations: the interactive `chat` loop and one-shot `ask`.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use uuid::Uuid;

use crate::agent_core::{AgentRuntime, TurnResult};

const EXIT_WORDS: &[&str] = &["quit", "exit", "q"];

fn new_thread_id() -> String {
    format!("thread-{}", Uuid::new_v4())
}

/// Run the interactive loop until an exit word or end of input. Returns the
/// number of answered questions.
///
/// A failed turn is reported and the loop continues on the same thread.
pub async fn chat_loop<R, W>(
    runtime: &AgentRuntime,
    thread: Option<String>,
    input: R,
    out: &mut W,
) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let thread_id = thread.unwrap_or_else(new_thread_id);

    writeln!(out, "{}", "=".repeat(60))?;
    writeln!(out, "UK HOUSING AGENT")?;
    writeln!(out, "{}", "=".repeat(60))?;
    writeln!(out, "Ask your housing repair questions.")?;
    writeln!(out, "Type 'quit' to exit. Thread: {thread_id}")?;

    let mut lines = input.lines();
    let mut turn = 1usize;
    loop {
        write!(out, "\nQuestion #{turn}: ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };
        let question = line.trim();

        if EXIT_WORDS.contains(&question.to_lowercase().as_str()) {
            writeln!(out, "\nGoodbye!")?;
            break;
        }
        if question.is_empty() {
            writeln!(out, "Please enter a question.")?;
            continue;
        }

        match runtime.run_turn(&thread_id, question).await {
            Ok(result) => {
                print_answer(&result, out)?;
                turn += 1;
            }
            Err(e) => {
                writeln!(out, "Error getting response: {e}")?;
                writeln!(out, "Try again or type 'quit' to exit.")?;
            }
        }
    }
    Ok(turn - 1)
}

fn print_answer(result: &TurnResult, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "\nAgent response:")?;
    writeln!(out, "{}", "-".repeat(50))?;
    writeln!(out, "{}", result.answer)?;
    writeln!(out, "\n[Issue type detected: {}]", result.intent.as_str().to_uppercase())?;
    writeln!(out, "{}", "-".repeat(50))
}

/// Run one question and print the answer.
pub async fn ask(
    runtime: &AgentRuntime,
    message: &str,
    thread: Option<String>,
    out: &mut impl Write,
) -> anyhow::Result<TurnResult> {
    let thread_id = thread.unwrap_or_else(new_thread_id);
    let result = runtime.run_turn(&thread_id, message).await?;
    writeln!(out, "{}", result.answer)?;
    tracing::debug!(thread_id = %thread_id, intent = %result.intent, "ask finished");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::agent_core::agent_loop::tests::ScriptedModel;
    use crate::agent_core::ThreadStore;
    use crate::config::{AgentConfig, KnowledgeConfig, Secret};
    use crate::inference::{InferenceError, ModelResponse};
    use crate::tools::ToolRegistry;

    fn runtime(model: Arc<ScriptedModel>) -> AgentRuntime {
        let mut config = AgentConfig::default();
        config.telemetry.langsmith_api_key = Secret::new("");
        let registry = ToolRegistry::with_housing_tools(&KnowledgeConfig {
            host: String::new(),
            ..Default::default()
        })
        .unwrap();
        AgentRuntime::new(
            Arc::new(config),
            model,
            registry,
            ThreadStore::open_in_memory().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_chat_loop_answers_until_quit() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelResponse::text("Check the pressure gauge.")),
            Ok(ModelResponse::text("Call Gas Safe.")),
        ]));
        let rt = runtime(model.clone());
        let input: &[u8] = b"my boiler is off\n\n   \nI smell gas\nquit\nnever asked\n";
        let mut out = Vec::new();

        let answered = chat_loop(&rt, Some("cli".into()), input, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(answered, 2);
        assert_eq!(model.invocations(), 2);
        assert!(text.contains("Question #1:"));
        assert!(text.contains("Question #3:"));
        assert!(!text.contains("Question #4:"));
        assert_eq!(text.matches("Please enter a question.").count(), 2);
        assert!(text.contains("[Issue type detected: HEATING]"));
        assert!(text.contains("Goodbye!"));
        assert_eq!(rt.store().message_count("cli").unwrap(), 4);
    }

    #[tokio::test]
    async fn test_chat_loop_survives_failed_turn() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(InferenceError::Timeout { duration_secs: 1 }),
            Ok(ModelResponse::text("Fine now.")),
        ]));
        let rt = runtime(model);
        let input: &[u8] = b"damp patch\ndamp patch again\nEXIT\n";
        let mut out = Vec::new();

        let answered = chat_loop(&rt, None, input, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(answered, 1);
        assert!(text.contains("Error getting response"));
        assert!(text.contains("Fine now."));
    }

    #[tokio::test]
    async fn test_ask_prints_answer() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelResponse::text("Use a dehumidifier."))]));
        let rt = runtime(model);
        let mut out = Vec::new();
        let result = ask(&rt, "mould in the bathroom", Some("t".into()), &mut out)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Use a dehumidifier.\n");
        assert_eq!(result.intent.as_str(), "damp");
    }
}
