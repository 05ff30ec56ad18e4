use super::{remove_message_files, Access, Filter, Mailbox, Message, MessageId, MessageList};
use crate::error::{Error, Result};
use mail_parser::mailbox::maildir::{Flag, MessageIterator};
use std::path::PathBuf;

pub struct Maildir {
    identifier: String,
    access: Access,
    messages: MessageList,
    /// File of each message, indexed the same way as `messages`.
    files: Vec<PathBuf>,
}

impl Maildir {
    /// Reads the messages in `cur` and `new`, ordered by file path. Only
    /// messages with the `S` flag count as seen, which leaves out every
    /// message still in `new`.
    pub fn open(identifier: &str, access: Access) -> Result<Self> {
        let open_error = |source| Error::Open {
            identifier: identifier.to_string(),
            source,
        };
        let mut found = vec![];
        for raw in MessageIterator::new(PathBuf::from(identifier)).map_err(open_error)? {
            let raw = raw.map_err(open_error)?;
            let file = raw.path().to_path_buf();
            let name = match file.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            if name.starts_with('.') {
                continue;
            }
            let seen = raw.flags().iter().any(|flag| matches!(flag, Flag::Seen));
            found.push((file, name, seen, raw.contents().to_vec()));
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));

        let mut messages = MessageList::default();
        let mut files = vec![];
        for (file, name, seen, content) in found {
            messages.push(Message::new(name, content).with_seen(seen));
            files.push(file);
        }
        Ok(Maildir {
            identifier: identifier.to_string(),
            access,
            messages,
            files,
        })
    }
}

impl Mailbox for Maildir {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn messages(&self, filter: Filter) -> Vec<MessageId> {
        self.messages.snapshot(filter)
    }

    fn message(&self, id: MessageId) -> &Message {
        self.messages.get(id)
    }

    fn mark_deleted(&mut self, id: MessageId) {
        self.messages.mark_deleted(id);
    }

    fn append(&mut self, _message: &Message) -> Result<()> {
        Err(Error::Unsupported {
            identifier: self.identifier.clone(),
            format: "maildir",
        })
    }

    fn write(&mut self) -> Result<()> {
        if self.access == Access::ReadOnly {
            return Err(Error::ReadOnly(self.identifier.clone()));
        }
        remove_message_files(&self.identifier, &self.messages, &self.files)?;
        self.messages.commit_deletes();
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        if self.access == Access::ReadWrite && self.messages.has_pending_deletes() {
            self.write()?;
        }
        Ok(())
    }
}
