use crate::domain::now_rfc3339;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageKind {
    System,
    User,
    Assistant,
    Result,
}

impl MessageKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Result => "result",
        }
    }
}

/// One block of a message's `content` array, in emission order.
#[derive(Clone, Debug, PartialEq)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: Option<String>,
        content: Value,
        is_error: bool,
    },
    /// Block types this crate does not interpret. The raw JSON is preserved so
    /// the log stays ground truth for whatever the agent emitted.
    Other {
        block_type: String,
        raw: Value,
    },
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// One entry in the conversation log, parsed from a single stream-JSON event
/// or history JSONL line of the agent CLI.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub kind: MessageKind,
    pub subtype: Option<String>,
    pub content: Vec<ContentBlock>,
    pub usage: Option<Usage>,
    pub session_id: Option<String>,
    pub is_meta: bool,
    pub leaf_uuid: Option<String>,
    pub summary: Option<String>,
    pub timestamp: Option<String>,
}

impl Message {
    /// True for the initialization-class system record that announces the
    /// session identifier for a turn.
    pub fn is_init(&self) -> bool {
        self.kind == MessageKind::System && self.subtype.as_deref() == Some("init")
    }

    /// The locally-echoed prompt appended when a turn is dispatched. The CLI
    /// does not repeat prompts back on its stream.
    pub fn user_prompt(text: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            kind: MessageKind::User,
            subtype: None,
            content: vec![ContentBlock::Text { text: text.into() }],
            usage: None,
            session_id,
            is_meta: false,
            leaf_uuid: None,
            summary: None,
            timestamp: Some(now_rfc3339()),
        }
    }

    /// Terminal system entry recorded when an in-flight turn is cancelled.
    pub fn cancelled_notice() -> Self {
        Self {
            kind: MessageKind::System,
            subtype: Some("cancelled".to_string()),
            content: vec![ContentBlock::Text {
                text: "Session cancelled by user".to_string(),
            }],
            usage: None,
            session_id: None,
            is_meta: false,
            leaf_uuid: None,
            summary: None,
            timestamp: Some(now_rfc3339()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseMessageError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record has no type field")]
    MissingKind,

    #[error("unknown record type: {0}")]
    UnknownKind(String),
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "type")]
    kind: Option<String>,

    #[serde(default)]
    subtype: Option<String>,

    // Stream events spell it `session_id`; history lines spell it `sessionId`.
    #[serde(alias = "sessionId", default)]
    session_id: Option<String>,

    #[serde(rename = "isMeta", default)]
    is_meta: bool,

    #[serde(rename = "leafUuid", default)]
    leaf_uuid: Option<String>,

    #[serde(default)]
    summary: Option<String>,

    #[serde(default)]
    timestamp: Option<String>,

    #[serde(default)]
    message: Option<Value>,

    // `result` records carry their final text at the top level.
    #[serde(default)]
    result: Option<Value>,

    #[serde(default)]
    usage: Option<Usage>,
}

pub fn parse_stream_message(payload: &str) -> Result<Message, ParseMessageError> {
    let record: RawRecord = serde_json::from_str(payload)?;
    message_from_record(record)
}

pub fn parse_stream_value(value: &Value) -> Result<Message, ParseMessageError> {
    let record: RawRecord = serde_json::from_value(value.clone())?;
    message_from_record(record)
}

fn message_from_record(record: RawRecord) -> Result<Message, ParseMessageError> {
    let kind_field = record.kind.ok_or(ParseMessageError::MissingKind)?;
    let (kind, subtype, summary) = match kind_field.as_str() {
        "system" => (MessageKind::System, record.subtype, record.summary),
        "user" => (MessageKind::User, record.subtype, record.summary),
        "assistant" => (MessageKind::Assistant, record.subtype, record.summary),
        "result" => (MessageKind::Result, record.subtype, record.summary),
        // History logs interleave summary records; they surface through the
        // meta display rule via their `summary`/`leafUuid` fields.
        "summary" => (
            MessageKind::System,
            Some("summary".to_string()),
            record.summary,
        ),
        other => return Err(ParseMessageError::UnknownKind(other.to_string())),
    };

    let mut content = record
        .message
        .as_ref()
        .and_then(|message| message.get("content"))
        .map(parse_content_blocks)
        .unwrap_or_default();

    if content.is_empty() {
        if let Some(result) = &record.result {
            if let Some(text) = result.as_str() {
                content.push(ContentBlock::Text {
                    text: text.to_string(),
                });
            }
        }
    }

    let usage = record
        .message
        .as_ref()
        .and_then(|message| message.get("usage"))
        .and_then(|value| serde_json::from_value::<Usage>(value.clone()).ok())
        .or(record.usage);

    let is_meta = record.is_meta || kind_field == "summary";

    Ok(Message {
        kind,
        subtype,
        content,
        usage,
        session_id: record.session_id,
        is_meta,
        leaf_uuid: record.leaf_uuid,
        summary,
        timestamp: record.timestamp,
    })
}

fn parse_content_blocks(content: &Value) -> Vec<ContentBlock> {
    match content {
        Value::String(text) => vec![ContentBlock::Text {
            text: text.to_string(),
        }],
        Value::Array(items) => items.iter().map(parse_content_block).collect(),
        _ => Vec::new(),
    }
}

fn parse_content_block(block: &Value) -> ContentBlock {
    let block_type = block.get("type").and_then(|v| v.as_str()).unwrap_or("");
    match block_type {
        "text" => ContentBlock::Text {
            text: block
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
        },
        "thinking" => ContentBlock::Thinking {
            thinking: block
                .get("thinking")
                .or_else(|| block.get("text"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
        },
        "tool_use" => ContentBlock::ToolUse {
            id: block
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            name: block
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("tool")
                .to_string(),
            input: block.get("input").cloned().unwrap_or(Value::Null),
        },
        "tool_result" => ContentBlock::ToolResult {
            tool_use_id: block
                .get("tool_use_id")
                .or_else(|| block.get("toolUseId"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            content: block.get("content").cloned().unwrap_or(Value::Null),
            is_error: block
                .get("is_error")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        },
        other => ContentBlock::Other {
            block_type: other.to_string(),
            raw: block.clone(),
        },
    }
}
