use super::{Services, ui};
use crate::core::error::with_timeout;
use crate::streams::chat::{ChatMessage, ChatSession};
use crate::streams::forex::CurrencyPair;
use anyhow::{Context, Result, anyhow, bail};
use std::io::Write;

pub async fn ask(services: &Services, question: &str, stream: bool) -> Result<()> {
    let session = ChatSession::new(services.assistant()?);
    if question.trim().is_empty() {
        bail!("Question must not be empty");
    }
    if stream {
        return ask_streaming(session, question).await;
    }

    let spinner = ui::new_spinner("Thinking");
    let reply = session.send_message(question).await;
    spinner.finish_and_clear();
    print_reply(&session, reply)
}

/// Prints the reply as it grows, chunk by chunk.
async fn ask_streaming(session: ChatSession, question: &str) -> Result<()> {
    let mut rx = session.subscribe();
    let printer = tokio::spawn(async move {
        let mut printed = 0;
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if let Some(reply) = snapshot.messages.last().filter(|m| !m.from_user) {
                if reply.text.len() > printed {
                    print!("{}", &reply.text[printed..]);
                    std::io::stdout().flush()?;
                    printed = reply.text.len();
                }
            }
        }
        Ok::<_, std::io::Error>(printed)
    });

    let reply = session.stream_message(question).await;
    // Closing the channel ends the printer
    drop(session);
    let printed = printer
        .await
        .context("Reply printer failed")?
        .context("Failed to write reply")?;
    if let Some(reply) = reply {
        if reply.text.len() > printed {
            print!("{}", &reply.text[printed..]);
        }
    }
    println!();
    Ok(())
}

pub async fn analyze(services: &Services, pair: &str) -> Result<()> {
    let pair: CurrencyPair = pair.parse().map_err(|e: String| anyhow!(e))?;
    let session = ChatSession::new(services.assistant()?);

    let spinner = ui::new_spinner(&format!("Analyzing {pair}"));
    let rates = with_timeout(services.timeout(), services.rates.fetch_rates(&pair.from)).await;
    let rates = match rates {
        Ok(rates) => rates,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e).with_context(|| format!("Failed to fetch the {pair} rate"));
        }
    };
    let reply = session
        .analyze_pair(&pair.from, &pair.to, rates.rate_to(&pair.to))
        .await;
    spinner.finish_and_clear();
    print_reply(&session, reply)
}

pub async fn tips(services: &Services) -> Result<()> {
    let session = ChatSession::new(services.assistant()?);
    let spinner = ui::new_spinner("Gathering tips");
    let reply = session.forex_tips().await;
    spinner.finish_and_clear();
    print_reply(&session, reply)
}

fn print_reply(session: &ChatSession, reply: Option<ChatMessage>) -> Result<()> {
    match reply {
        Some(message) => {
            println!("{}", message.text);
            Ok(())
        }
        None => {
            let snapshot = session.snapshot();
            bail!(
                "{}",
                snapshot.error.as_deref().unwrap_or("The assistant did not reply")
            )
        }
    }
}
