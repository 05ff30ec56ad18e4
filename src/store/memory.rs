//! Mailboxes kept in memory, which record what happens to them.

use super::{Access, Filter, MailStore, Mailbox, Message, MessageId, MessageList, Status};
use crate::error::{Error, Result};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open(String, Access),
    Create(String),
    Write(String),
    Close(String),
}

#[derive(Default)]
struct Shared {
    /// What each mailbox holds durably, i.e. as of its last write.
    mailboxes: BTreeMap<String, Vec<Message>>,
    journal: Vec<Event>,
    failing_writes: BTreeSet<String>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Rc<RefCell<Shared>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mailbox(&self, identifier: &str, messages: Vec<Message>) {
        self.shared
            .borrow_mut()
            .mailboxes
            .insert(identifier.to_string(), messages);
    }

    /// Content of the messages durably stored in a mailbox, or `None` if
    /// the mailbox does not exist.
    pub fn contents(&self, identifier: &str) -> Option<Vec<Vec<u8>>> {
        self.shared.borrow().mailboxes.get(identifier).map(|messages| {
            messages
                .iter()
                .map(|msg| msg.content().to_vec())
                .collect()
        })
    }

    pub fn mailboxes(&self) -> Vec<String> {
        self.shared.borrow().mailboxes.keys().cloned().collect()
    }

    pub fn journal(&self) -> Vec<Event> {
        self.shared.borrow().journal.clone()
    }

    pub fn writes(&self, identifier: &str) -> usize {
        let expected = Event::Write(identifier.to_string());
        self.shared
            .borrow()
            .journal
            .iter()
            .filter(|event| **event == expected)
            .count()
    }

    pub fn fail_writes(&self, identifier: &str) {
        self.shared
            .borrow_mut()
            .failing_writes
            .insert(identifier.to_string());
    }
}

impl MailStore for MemoryStore {
    fn open(
        &mut self,
        identifier: &str,
        access: Access,
        create: bool,
    ) -> Result<Box<dyn Mailbox>> {
        let mut shared = self.shared.borrow_mut();
        if !shared.mailboxes.contains_key(identifier) {
            if !create {
                return Err(Error::Open {
                    identifier: identifier.to_string(),
                    source: io::Error::new(io::ErrorKind::NotFound, "no such mailbox"),
                });
            }
            shared.mailboxes.insert(identifier.to_string(), vec![]);
            shared.journal.push(Event::Create(identifier.to_string()));
        }
        shared
            .journal
            .push(Event::Open(identifier.to_string(), access));
        let mut messages = MessageList::default();
        for message in shared.mailboxes[identifier].iter() {
            messages.push(message.clone());
        }
        Ok(Box::new(MemoryMailbox {
            identifier: identifier.to_string(),
            access,
            written: messages.len(),
            messages,
            shared: Rc::clone(&self.shared),
        }))
    }

    fn backing_file(&self, _identifier: &str) -> Option<PathBuf> {
        None
    }
}

struct MemoryMailbox {
    identifier: String,
    access: Access,
    messages: MessageList,
    written: usize,
    shared: Rc<RefCell<Shared>>,
}

impl MemoryMailbox {
    fn is_dirty(&self) -> bool {
        self.written < self.messages.len() || self.messages.has_pending_deletes()
    }
}

impl Mailbox for MemoryMailbox {
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

    fn append(&mut self, message: &Message) -> Result<()> {
        if self.access == Access::ReadOnly {
            return Err(Error::ReadOnly(self.identifier.clone()));
        }
        let mut message = message.clone();
        message.status = Status::Active;
        self.messages.push(message);
        Ok(())
    }

    fn write(&mut self) -> Result<()> {
        if self.access == Access::ReadOnly {
            return Err(Error::ReadOnly(self.identifier.clone()));
        }
        let mut shared = self.shared.borrow_mut();
        shared.journal.push(Event::Write(self.identifier.clone()));
        if shared.failing_writes.contains(&self.identifier) {
            return Err(Error::Write {
                identifier: self.identifier.clone(),
                source: io::Error::new(io::ErrorKind::Other, "disk full"),
            });
        }
        let kept = self.messages.kept().map(|(_, msg)| msg.clone()).collect();
        shared.mailboxes.insert(self.identifier.clone(), kept);
        drop(shared);
        self.messages.commit_deletes();
        self.written = self.messages.len();
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        if self.access == Access::ReadWrite && self.is_dirty() {
            self.write()?;
        }
        self.shared
            .borrow_mut()
            .journal
            .push(Event::Close(self.identifier.clone()));
        Ok(())
    }
}
