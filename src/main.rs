//! Daybook chat - terminal client
//!
//! Opens today's chat session against the configured backend and relays
//! lines from stdin as turns.

use daybook_chat::{
    activate, ChannelDispatcher, ConnectionState, LoggingDispatcher, Message, Role,
    SessionConfig, SessionUpdate, TransitionError,
};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "daybook_chat=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so they never interleave with the conversation
    if std::env::var("DAYBOOK_LOG_FORMAT").is_ok_and(|f| f == "pretty") {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn print_message(message: &Message) {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "daybook",
    };
    println!("{who}> {}", message.content);
}

fn describe_rejection(reason: TransitionError) -> &'static str {
    match reason {
        TransitionError::EmptyMessage => "nothing to send",
        TransitionError::NotConnected => "not connected yet, try again in a moment",
        TransitionError::TurnInFlight => "still waiting for the last reply (/reset to give up on it)",
        TransitionError::Deactivated => "session is closed",
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = SessionConfig::from_env()?;
    let today = chrono::Local::now().date_naive();
    tracing::info!(ws_url = %config.chat_url(), api_url = %config.api_url, date = %today, "Starting daybook chat");

    let (dispatcher, mut topics_rx) = ChannelDispatcher::channel();
    let session = activate(&config, today, LoggingDispatcher::new(dispatcher)).await?;

    for message in session.transcript().await {
        print_message(&message);
    }

    // Nothing here caches backend data; drain so the channel never grows
    tokio::spawn(async move { while topics_rx.recv().await.is_some() {} });

    let mut updates = Box::pin(session.updates());
    tokio::spawn(async move {
        while let Some(update) = updates.next().await {
            match update {
                SessionUpdate::MessageAppended { message } if message.role == Role::Assistant => {
                    print_message(&message);
                }
                SessionUpdate::StateChanged {
                    connection: ConnectionState::Open,
                } => eprintln!("[connected]"),
                SessionUpdate::ReconnectScheduled { delay, retry_count } => {
                    eprintln!(
                        "[connection lost, retry {retry_count} in {:.1}s]",
                        delay.as_secs_f64()
                    );
                }
                SessionUpdate::SubmitRejected { reason } => {
                    eprintln!("[{}]", describe_rejection(reason));
                }
                _ => {}
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = line.trim();
        if command == "/quit" {
            break;
        } else if command == "/reset" {
            session.reset().await?;
        } else {
            session.submit(line).await?;
        }
    }

    session.deactivate().await;
    Ok(())
}
