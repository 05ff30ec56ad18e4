//! Mailboxes on disk, and the interface the archiver sees them through.

mod maildir;
mod mbox;
#[cfg(test)]
pub mod memory;
mod mh;

pub use self::maildir::Maildir;
pub use self::mbox::Mbox;
pub use self::mh::Mh;

use crate::collect;
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    All,
    SeenOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Active,
    /// Marked for deletion, gone from disk once the mailbox is written.
    PendingDelete,
    Removed,
}

/// Index of a message inside the mailbox which handed it out. It stays
/// valid for the lifetime of the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(usize);

/// The `From ` line a message had in an mbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub sender: String,
    pub date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone)]
pub struct Message {
    id: String,
    envelope: Option<Envelope>,
    timestamp: Option<DateTime<FixedOffset>>,
    seen: bool,
    content: Vec<u8>,
    status: Status,
}

impl Message {
    pub fn new(fallback_id: String, content: Vec<u8>) -> Self {
        let (timestamp, id) = collect::get_date_and_id(&content);
        Message {
            id: id.unwrap_or(fallback_id),
            envelope: None,
            timestamp,
            seen: false,
            content,
            status: Status::Active,
        }
    }

    pub fn with_seen(mut self, seen: bool) -> Self {
        self.seen = seen;
        self
    }

    /// Keeps the `From ` line the message had in an mbox. Its date is used
    /// when the message has no usable `Date` header.
    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        if self.timestamp.is_none() {
            self.timestamp = envelope.date;
        }
        self.envelope = Some(envelope);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.timestamp
    }

    pub fn seen(&self) -> bool {
        self.seen
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

/// Messages of a mailbox together with their deletion state.
#[derive(Debug, Default)]
pub struct MessageList {
    messages: Vec<Message>,
}

impl MessageList {
    pub fn push(&mut self, message: Message) -> MessageId {
        self.messages.push(message);
        MessageId(self.messages.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn snapshot(&self, filter: Filter) -> Vec<MessageId> {
        self.iter()
            .filter(|(_, msg)| msg.status == Status::Active)
            .filter(|(_, msg)| filter == Filter::All || msg.seen)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn get(&self, id: MessageId) -> &Message {
        &self.messages[id.0]
    }

    pub fn mark_deleted(&mut self, id: MessageId) {
        let message = &mut self.messages[id.0];
        if message.status == Status::Active {
            message.status = Status::PendingDelete;
        }
    }

    pub fn has_pending_deletes(&self) -> bool {
        self.messages
            .iter()
            .any(|msg| msg.status == Status::PendingDelete)
    }

    /// Messages which are still in the mailbox after pending deletes.
    pub fn kept(&self) -> impl Iterator<Item = (MessageId, &Message)> {
        self.iter().filter(|(_, msg)| msg.status == Status::Active)
    }

    pub fn pending_deletes(&self) -> impl Iterator<Item = (MessageId, &Message)> {
        self.iter()
            .filter(|(_, msg)| msg.status == Status::PendingDelete)
    }

    /// Records that pending deletes have reached the disk.
    pub fn commit_deletes(&mut self) {
        for message in self.messages.iter_mut() {
            if message.status == Status::PendingDelete {
                message.status = Status::Removed;
            }
        }
    }

    fn iter(&self) -> impl Iterator<Item = (MessageId, &Message)> {
        self.messages
            .iter()
            .enumerate()
            .map(|(i, msg)| (MessageId(i), msg))
    }
}

/// An open mailbox.
pub trait Mailbox {
    fn identifier(&self) -> &str;

    /// Fixed list of messages currently in the mailbox. Messages added
    /// afterwards are not part of it.
    fn messages(&self, filter: Filter) -> Vec<MessageId>;

    fn message(&self, id: MessageId) -> &Message;

    /// Marks the message to be deleted on the next `write`.
    fn mark_deleted(&mut self, id: MessageId);

    /// Copies the message into this mailbox. It reaches the disk on the next
    /// `write`.
    fn append(&mut self, message: &Message) -> Result<()>;

    /// Makes every pending change durable.
    fn write(&mut self) -> Result<()>;

    /// Writes pending changes, if the mailbox is writable, and releases it.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Where mailboxes come from.
pub trait MailStore {
    /// Opens the mailbox named `identifier`. With `create`, a missing
    /// mailbox is created in the archive format, and an existing one must
    /// already be in that format.
    fn open(&mut self, identifier: &str, access: Access, create: bool)
        -> Result<Box<dyn Mailbox>>;

    /// The file holding the whole mailbox, if it is stored in one.
    fn backing_file(&self, identifier: &str) -> Option<PathBuf>;

    /// A name which is the same for every identifier of one mailbox.
    fn canonical(&self, identifier: &str) -> String {
        identifier.to_string()
    }
}

/// Mailboxes in the local file system. The format of an existing mailbox is
/// detected from its path: a file is an mbox, a directory with `cur` is a
/// maildir, and any other directory is an MH folder. Archives are mboxes.
#[derive(Debug, Default)]
pub struct FsStore;

impl FsStore {
    pub fn new() -> Self {
        FsStore
    }
}

impl MailStore for FsStore {
    fn open(
        &mut self,
        identifier: &str,
        access: Access,
        create: bool,
    ) -> Result<Box<dyn Mailbox>> {
        let path = Path::new(identifier);
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {
                if create {
                    Err(Error::Format {
                        identifier: identifier.to_string(),
                        expected: "an mbox",
                    })
                } else if path.join("cur").is_dir() {
                    Ok(Box::new(Maildir::open(identifier, access)?))
                } else {
                    Ok(Box::new(Mh::open(identifier, access)?))
                }
            }
            Ok(_) if create => Ok(Box::new(Mbox::open_for_append(identifier)?)),
            Ok(_) => Ok(Box::new(Mbox::open(identifier, access)?)),
            Err(ref e) if e.kind() == io::ErrorKind::NotFound && create => {
                Ok(Box::new(Mbox::create(identifier)?))
            }
            Err(source) => Err(Error::Open {
                identifier: identifier.to_string(),
                source,
            }),
        }
    }

    fn backing_file(&self, identifier: &str) -> Option<PathBuf> {
        let path = Path::new(identifier);
        if path.is_file() {
            Some(path.to_path_buf())
        } else {
            None
        }
    }

    /// Resolves the path through symbolic links and `..`. For a path which
    /// does not exist yet, its deepest existing ancestor is resolved.
    fn canonical(&self, identifier: &str) -> String {
        let mut existing = Path::new(identifier);
        let mut missing = vec![];
        loop {
            if let Ok(mut resolved) = fs::canonicalize(existing) {
                resolved.extend(missing.iter().rev());
                return resolved.to_string_lossy().into_owned();
            }
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name);
                    existing = if parent.as_os_str().is_empty() {
                        Path::new(".")
                    } else {
                        parent
                    };
                }
                _ => return identifier.to_string(),
            }
        }
    }
}

/// Reads a whole message file, attributing failures to the mailbox.
fn read_message_file(identifier: &str, path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| Error::Open {
        identifier: identifier.to_string(),
        source,
    })
}

/// Removes the files of messages pending deletion. A file which is already
/// gone counts as removed.
fn remove_message_files(
    identifier: &str,
    messages: &MessageList,
    files: &[PathBuf],
) -> Result<()> {
    for (MessageId(i), _) in messages.pending_deletes() {
        match fs::remove_file(&files[i]) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(Error::Write {
                    identifier: identifier.to_string(),
                    source,
                })
            }
        }
    }
    Ok(())
}
