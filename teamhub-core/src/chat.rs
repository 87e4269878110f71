//! Chat notifications.
//!
//! Messages are built as plain data ([`ChatMessage`]) and handed to a
//! [`ChatClient`]. Sending is best-effort: it is not transactional with
//! store writes, and a failed post never undoes one.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{HubError, HubResult};

const SLACK_POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// A text element in the chat's block layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Text {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Markdown { text: String },
}

impl Text {
    pub fn plain(text: impl Into<String>) -> Self {
        Text::Plain { text: text.into() }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Text::Markdown { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Text::Plain { text } | Text::Markdown { text } => text,
        }
    }
}

/// Layout block, serialized in the chat API's block-kit shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        text: Text,
    },
    Section {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<Text>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        fields: Vec<Text>,
    },
    Context {
        elements: Vec<Text>,
    },
    Actions {
        elements: Vec<Button>,
    },
    Divider,
}

/// A link button inside an actions block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "button")]
pub struct Button {
    pub text: Text,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl Button {
    /// The highlighted call-to-action style.
    pub fn primary(text: impl Into<String>, url: impl Into<String>) -> Self {
        Button {
            text: Text::plain(text),
            url: url.into(),
            style: Some("primary".into()),
        }
    }
}

impl Block {
    pub fn header(text: impl Into<String>) -> Self {
        Block::Header {
            text: Text::plain(text),
        }
    }

    pub fn section(text: Text) -> Self {
        Block::Section {
            text: Some(text),
            fields: Vec::new(),
        }
    }

    pub fn fields(fields: Vec<Text>) -> Self {
        Block::Section { text: None, fields }
    }

    pub fn context(text: Text) -> Self {
        Block::Context {
            elements: vec![text],
        }
    }

    pub fn button(button: Button) -> Self {
        Block::Actions {
            elements: vec![button],
        }
    }
}

/// What to post. `text` is the notification fallback for clients that
/// do not render blocks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

impl ChatMessage {
    pub fn new(text: impl Into<String>) -> Self {
        ChatMessage {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_blocks(mut self, blocks: Vec<Block>) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn in_thread(mut self, ts: impl Into<String>) -> Self {
        self.thread_ts = Some(ts.into());
        self
    }

    /// All visible text, for logs and tests.
    pub fn rendered(&self) -> String {
        let mut out = vec![self.text.clone()];
        for block in &self.blocks {
            match block {
                Block::Header { text } => out.push(text.as_str().to_string()),
                Block::Section { text, fields } => {
                    out.extend(text.iter().map(|t| t.as_str().to_string()));
                    out.extend(fields.iter().map(|t| t.as_str().to_string()));
                }
                Block::Context { elements } => {
                    out.extend(elements.iter().map(|t| t.as_str().to_string()))
                }
                Block::Actions { elements } => out.extend(
                    elements
                        .iter()
                        .map(|b| format!("{} {}", b.text.as_str(), b.url)),
                ),
                Block::Divider => {}
            }
        }
        out.join("\n")
    }
}

/// The one chat capability the hub needs.
pub trait ChatClient: Send + Sync {
    /// Post to `channel` and return the posted message's timestamp id.
    fn post_message(&self, channel: &str, message: &ChatMessage) -> HubResult<String>;
}

/// Post and log the outcome. Returns the timestamp when it went through.
pub fn post_best_effort(
    client: &dyn ChatClient,
    channel: &str,
    message: &ChatMessage,
) -> Option<String> {
    match client.post_message(channel, message) {
        Ok(ts) => {
            info!(channel, ts = %ts, "posted chat message");
            Some(ts)
        }
        Err(e) => {
            error!(channel, error = %e, "chat message failed");
            None
        }
    }
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    #[serde(flatten)]
    message: &'a ChatMessage,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Slack Web API client (`chat.postMessage` only).
pub struct SlackClient {
    http: reqwest::blocking::Client,
    token: String,
    endpoint: String,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> HubResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HubError::Chat(format!("could not build HTTP client: {e}")))?;
        Ok(SlackClient {
            http,
            token: token.into(),
            endpoint: SLACK_POST_MESSAGE_URL.to_string(),
        })
    }

    /// Point the client at another endpoint (for a proxy or a local mock).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl ChatClient for SlackClient {
    fn post_message(&self, channel: &str, message: &ChatMessage) -> HubResult<String> {
        let response: PostMessageResponse = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&PostMessageRequest { channel, message })
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| HubError::Chat(e.to_string()))?;

        if !response.ok {
            return Err(HubError::Chat(
                response.error.unwrap_or_else(|| "unknown error".into()),
            ));
        }
        response
            .ts
            .ok_or_else(|| HubError::Chat("response carried no message timestamp".into()))
    }
}

/// Writes messages to the log instead of posting them. Used when no chat
/// token is configured.
#[derive(Debug, Default)]
pub struct LogChat {
    counter: Mutex<u64>,
}

impl LogChat {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatClient for LogChat {
    fn post_message(&self, channel: &str, message: &ChatMessage) -> HubResult<String> {
        let mut counter = self
            .counter
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *counter += 1;
        info!(channel, thread = ?message.thread_ts, text = %message.rendered(), "chat message (not sent)");
        Ok(format!("log.{counter:06}"))
    }
}
