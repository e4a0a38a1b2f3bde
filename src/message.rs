//! Wire protocol definitions
//!
//! The protocol is plain UTF-8 text with no framing beyond newlines.
//! Inbound chunks are classified by [`Inbound`]; everything the server
//! writes is a [`ServerMessage`] rendered through `Display`.

use std::fmt;

use chrono::{DateTime, Local};

/// Command a client sends to leave the chat
pub const EXIT_COMMAND: &str = "/exit";

/// Client → Server chunk, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The exit command; never relayed
    Exit,
    /// Only whitespace
    Empty,
    /// Chat text, already trimmed
    Text(String),
}

impl Inbound {
    /// Classify one received chunk
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn parse(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim();

        if text == EXIT_COMMAND {
            Inbound::Exit
        } else if text.is_empty() {
            Inbound::Empty
        } else {
            Inbound::Text(text.to_string())
        }
    }
}

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Sent immediately after accept
    UsernamePrompt,
    /// Sent to the joining client only
    Welcome { username: String },
    /// Someone joined
    Joined { username: String },
    /// Someone left
    Left { username: String },
    /// Relayed chat line
    Chat {
        timestamp: String,
        from: String,
        content: String,
    },
    /// Capacity rejection, followed by close
    ServerFull,
    /// Sent to everyone when the server stops
    ShuttingDown,
}

impl ServerMessage {
    /// Build a chat line stamped with the current local time
    pub fn chat(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self::chat_at(Local::now(), from, content)
    }

    /// Build a chat line stamped with the given time
    pub fn chat_at(
        at: DateTime<Local>,
        from: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        ServerMessage::Chat {
            timestamp: at.format("%H:%M").to_string(),
            from: from.into(),
            content: content.into(),
        }
    }

    /// Rendered wire bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::UsernamePrompt => write!(f, "Please enter your username: "),
            ServerMessage::Welcome { username } => writeln!(
                f,
                "Welcome {}! You are now connected to the chat server.",
                username
            ),
            ServerMessage::Joined { username } => {
                writeln!(f, "SERVER: {} has joined the chat.", username)
            }
            ServerMessage::Left { username } => {
                writeln!(f, "SERVER: {} has left the chat.", username)
            }
            ServerMessage::Chat {
                timestamp,
                from,
                content,
            } => writeln!(f, "[{}] {}: {}", timestamp, from, content),
            ServerMessage::ServerFull => write!(f, "Server is full. Try again later."),
            ServerMessage::ShuttingDown => {
                writeln!(f, "SERVER: Server is shutting down. Goodbye!")
            }
        }
    }
}
