//! A terminal chat that shows how to use `toolstream` as a library.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::time::sleep;
use toolstream::SessionBuilder;
use toolstream::core::{AgentConfigBuilder, Event, TurnOptions};
use toolstream_openai_model::{OpenAIConfigBuilder, OpenAIProvider};

const BAR_CHAR: &str = "▎";

const SYSTEM_PROMPT: &str = "\
You are a helpful assistant with access to a few tools. Call them whenever \
they help to answer the user, several at once if the questions are \
independent, and keep your answers short.";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return;
    };
    let Ok(base_url) = env::var("OPENAI_BASE_URL") else {
        eprintln!("OPENAI_BASE_URL environment variable is not set");
        return;
    };
    let Ok(model) = env::var("OPENAI_MODEL") else {
        eprintln!("OPENAI_MODEL environment variable is not set");
        return;
    };

    let mut agent_config = AgentConfigBuilder::new();
    if let Ok(value) = env::var("TOOLSTREAM_TOOL_TIMEOUT_SECONDS") {
        let Some(timeout) = value
            .parse::<f64>()
            .ok()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        else {
            eprintln!("TOOLSTREAM_TOOL_TIMEOUT_SECONDS is invalid: {value}");
            return;
        };
        agent_config = agent_config.with_tool_timeout(timeout);
    }
    if let Ok(value) = env::var("TOOLSTREAM_MAX_PARALLEL_TOOLS") {
        let Ok(limit) = value.parse() else {
            eprintln!("TOOLSTREAM_MAX_PARALLEL_TOOLS is invalid: {value}");
            return;
        };
        agent_config = agent_config.with_concurrency_limit(limit);
    }

    let config = OpenAIConfigBuilder::with_api_key(api_key)
        .with_base_url(base_url)
        .with_model(model)
        .build();
    let model_provider = OpenAIProvider::new(config);

    let session = SessionBuilder::with_model_provider(model_provider)
        .with_system_prompt(SYSTEM_PROMPT)
        .with_config(agent_config.build())
        .build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let (message, options) = parse_input(line.trim());
        if message.is_empty() {
            continue;
        }
        let mut events = session.send_message(message, options);

        let mut progress_bar = None;
        // Whether an assistant line is being streamed.
        let mut line_open = false;

        loop {
            if !line_open {
                progress_bar
                    .get_or_insert_with(|| {
                        let progress_bar = ProgressBar::new_spinner();
                        progress_bar.set_style(progress_style.clone());
                        progress_bar.set_message("🤔 Thinking...");
                        progress_bar
                    })
                    .inc(1);
            }

            let sleep = sleep(Duration::from_millis(100));
            let event = select! {
                event = events.next_event() => {
                    let Some(event) = event else {
                        break;
                    };
                    event
                },
                _ = sleep => {
                    continue;
                }
            };

            // Finish the progress bar before printing anything else.
            if let Some(progress_bar) = progress_bar.take() {
                progress_bar.finish_and_clear();
            }

            if line_open && !matches!(event, Event::Content { .. }) {
                println!();
                line_open = false;
            }

            match event {
                Event::Content { text } => {
                    if !line_open {
                        print!("{}🤖 ", BAR_CHAR.bright_cyan());
                        line_open = true;
                    }
                    print!("{}", text.bright_white());
                    std::io::stdout().flush().ok();
                }
                Event::ToolCall {
                    name, arguments, ..
                } => {
                    println!(
                        "{}🔧 {}{}",
                        BAR_CHAR.bright_yellow(),
                        name.bright_white().bold(),
                        format!("({arguments})").dimmed()
                    );
                }
                Event::ToolResult {
                    result, success, ..
                } => {
                    if success {
                        println!("{}✅ {result}", BAR_CHAR.bright_green());
                    } else {
                        println!("{}❌ {}", BAR_CHAR.bright_red(), result.red());
                    }
                }
                Event::TurnComplete {
                    tool_call_count, ..
                } => {
                    if tool_call_count > 0 {
                        let summary =
                            format!("({tool_call_count} tool calls)");
                        println!("{}", summary.dimmed());
                    }
                    break;
                }
                Event::Error { message, code } => {
                    eprintln!(
                        "{}{}",
                        BAR_CHAR.bright_red(),
                        format!("{code:?}: {message}").red()
                    );
                    break;
                }
            }
        }
        println!();
    }
}

/// Splits the `/reset` and `/seq` commands off a line of input.
fn parse_input(line: &str) -> (&str, TurnOptions) {
    let mut options = TurnOptions::default();
    let mut message = line;
    loop {
        if let Some(rest) = message.strip_prefix("/reset ") {
            options.reset_history = true;
            message = rest.trim_start();
        } else if let Some(rest) = message.strip_prefix("/seq ") {
            options.parallel_tools = false;
            message = rest.trim_start();
        } else {
            return (message, options);
        }
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("hi"), ("hi", TurnOptions::default()));

        let (message, options) = parse_input("/seq /reset  weather?");
        assert_eq!(message, "weather?");
        assert!(options.reset_history);
        assert!(!options.parallel_tools);

        // Only a leading command counts.
        let (message, options) = parse_input("say /reset");
        assert_eq!(message, "say /reset");
        assert_eq!(options, TurnOptions::default());
    }
}
