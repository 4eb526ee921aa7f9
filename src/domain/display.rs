use crate::domain::{ContentBlock, Message, MessageKind};
use std::collections::BTreeSet;

/// Policy table deciding which tool-result records are redundant on screen.
///
/// A tool whose invocation widget already renders its own result does not need
/// the raw tool-result echoed by the agent as a separate user record. The set
/// is configurable because it tracks the tool surface of the agent CLI, not
/// anything this crate controls; tools not in the table default to showing
/// their result.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DisplayPolicy {
    self_displaying: BTreeSet<String>,
    extension_prefixes: Vec<String>,
}

impl Default for DisplayPolicy {
    fn default() -> Self {
        Self::new(
            [
                "task",
                "bash",
                "glob",
                "grep",
                "ls",
                "read",
                "edit",
                "multiedit",
                "write",
                "todowrite",
                "todoread",
            ],
            ["mcp__"],
        )
    }
}

impl DisplayPolicy {
    pub fn new(
        self_displaying: impl IntoIterator<Item = impl Into<String>>,
        extension_prefixes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            self_displaying: self_displaying
                .into_iter()
                .map(|name| name.into().to_lowercase())
                .collect(),
            extension_prefixes: extension_prefixes
                .into_iter()
                .map(|prefix| prefix.into())
                .collect(),
        }
    }

    pub fn is_self_displaying(&self, tool_name: &str) -> bool {
        let lowered = tool_name.to_lowercase();
        if self.self_displaying.contains(&lowered) {
            return true;
        }
        self.extension_prefixes
            .iter()
            .any(|prefix| lowered.starts_with(prefix.as_str()))
    }
}

/// Computes the displayable subsequence of `entries`.
///
/// Pure over the log and the policy: re-running it over the same log always
/// yields the same subsequence, in log order.
pub fn displayable<'a>(entries: &'a [Message], policy: &DisplayPolicy) -> Vec<&'a Message> {
    entries
        .iter()
        .enumerate()
        .filter(|(index, _)| is_displayable(entries, *index, policy))
        .map(|(_, message)| message)
        .collect()
}

pub fn is_displayable(entries: &[Message], index: usize, policy: &DisplayPolicy) -> bool {
    let Some(message) = entries.get(index) else {
        return false;
    };

    // Meta bookkeeping records surface only when they carry something to show.
    if message.is_meta && message.leaf_uuid.is_none() && message.summary.is_none() {
        return false;
    }

    if message.kind != MessageKind::User {
        return true;
    }

    if message.content.is_empty() {
        return false;
    }

    message.content.iter().any(|block| match block {
        ContentBlock::ToolResult { tool_use_id, .. } => {
            !is_redundant_tool_result(entries, index, tool_use_id.as_deref(), policy)
        }
        _ => true,
    })
}

/// Scans backward from the candidate record through prior assistant messages
/// for the tool-use this result refers to. Unmatched ids and unknown tool
/// names both default to showing the result.
fn is_redundant_tool_result(
    entries: &[Message],
    index: usize,
    tool_use_id: Option<&str>,
    policy: &DisplayPolicy,
) -> bool {
    let Some(tool_use_id) = tool_use_id else {
        return false;
    };
    let Some(tool_name) = tool_use_name_before(entries, index, tool_use_id) else {
        return false;
    };
    policy.is_self_displaying(tool_name)
}

fn tool_use_name_before<'a>(
    entries: &'a [Message],
    index: usize,
    tool_use_id: &str,
) -> Option<&'a str> {
    entries[..index]
        .iter()
        .rev()
        .filter(|message| message.kind == MessageKind::Assistant)
        .find_map(|message| {
            message.content.iter().find_map(|block| match block {
                ContentBlock::ToolUse { id, name, .. } if id == tool_use_id => {
                    Some(name.as_str())
                }
                _ => None,
            })
        })
}
