//! Echo bot example
//!
//! Joins a channel and answers `!echo <text>` with `<text>`. Whispers to the
//! bot are echoed back as whispers.
//!
//! Usage:
//!   TWITCH_CHANNEL=mychannel TWITCH_NICK=mybot TWITCH_TOKEN=oauth:... \
//!     cargo run --example echo_bot
//!
//! Set `RUST_LOG=twirc=debug` to watch the connection lifecycle.

use std::env;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use twirc::event::{ChatMessage, Whisper};
use twirc::{ClientConfig, DisconnectReason, EventListener, TwitchClient};

enum Reply {
    Channel(String),
    Whisper(String, String),
}

struct EchoBot {
    replies: mpsc::UnboundedSender<Reply>,
}

impl EventListener for EchoBot {
    fn on_private_message(&self, message: &ChatMessage) {
        if let Some(text) = message.text.strip_prefix("!echo ") {
            let _ = self.replies.send(Reply::Channel(text.to_string()));
        }
    }

    fn on_whisper(&self, whisper: &Whisper) {
        let _ = self.replies.send(Reply::Whisper(
            whisper.sender.login.clone(),
            whisper.text.clone(),
        ));
    }

    fn on_connect(&self) {
        println!("✓ Logged in");
    }

    fn on_disconnect(&self, reason: &DisconnectReason) {
        println!("✗ Disconnected: {reason}");
    }
}

fn required(name: &str) -> Result<String, Box<dyn std::error::Error>> {
    env::var(name).map_err(|_| format!("{name} is not set").into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "twirc=info".into()))
        .init();

    let channel = required("TWITCH_CHANNEL")?;
    let nick = required("TWITCH_NICK")?;
    let token = required("TWITCH_TOKEN")?;
    let owner = env::var("TWITCH_OWNER").unwrap_or_else(|_| channel.clone());

    let config = ClientConfig::new(&channel, &nick, token).with_owner(owner);
    let client = TwitchClient::new(config);

    let (tx, mut replies) = mpsc::unbounded_channel();
    client.add_listener(EchoBot { replies: tx });

    client.connect().await?;
    println!("Joined #{}", client.config().channel);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = client.closed() => break,
            Some(reply) = replies.recv() => {
                let sent = match reply {
                    Reply::Channel(text) => client.channel_message(&text),
                    Reply::Whisper(user, text) => client.whisper(&user, &text),
                };
                if let Err(e) = sent {
                    eprintln!("Send failed: {e}");
                }
            }
        }
    }

    client.close().await;
    Ok(())
}
