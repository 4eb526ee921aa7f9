use crate::domain::Message;

/// Append-only ordered sequence of conversation entries; the single source of
/// truth for what has been said.
///
/// Entries are only ever removed by `truncate`/`replace` (checkpoint restore)
/// or `clear` (lineage switch). Display filtering is a projection over
/// `entries` and never mutates the log.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageLog {
    entries: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.entries.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.entries.extend(messages);
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn replace(&mut self, entries: Vec<Message>) {
        self.entries = entries;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Message;

    #[test]
    fn push_preserves_arrival_order() {
        let mut log = MessageLog::new();
        log.push(Message::user_prompt("first", None));
        log.push(Message::user_prompt("second", None));
        log.push(Message::user_prompt("third", None));

        let texts: Vec<_> = log
            .entries()
            .iter()
            .map(|message| match &message.content[0] {
                crate::domain::ContentBlock::Text { text } => text.clone(),
                other => panic!("unexpected block {other:?}"),
            })
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn truncate_and_replace_adjust_length() {
        let mut log = MessageLog::new();
        for n in 0..5 {
            log.push(Message::user_prompt(format!("m{n}"), None));
        }
        log.truncate(2);
        assert_eq!(log.len(), 2);

        log.replace(vec![Message::user_prompt("only", None)]);
        assert_eq!(log.len(), 1);

        log.clear();
        assert!(log.is_empty());
    }
}
