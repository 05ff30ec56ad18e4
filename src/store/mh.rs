use super::{
    read_message_file, remove_message_files, Access, Filter, Mailbox, Message, MessageId,
    MessageList,
};
use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

const SEQUENCES_FILE: &str = ".mh_sequences";

/// An MH folder: one file per message, named by its number.
pub struct Mh {
    identifier: String,
    access: Access,
    messages: MessageList,
    files: Vec<PathBuf>,
}

/// Parses a sequence value like `1-3 7 9-10`. Malformed parts are ignored.
fn parse_sequence(value: &str) -> Vec<RangeInclusive<u32>> {
    value
        .split_whitespace()
        .filter_map(|part| match part.split_once('-') {
            Some((start, end)) => Some(start.parse().ok()?..=end.parse().ok()?),
            None => part.parse().ok().map(|n| n..=n),
        })
        .collect()
}

fn read_unseen(identifier: &str, path: &Path) -> Result<Vec<RangeInclusive<u32>>> {
    let sequences = match fs::read_to_string(path.join(SEQUENCES_FILE)) {
        Ok(sequences) => sequences,
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
        Err(source) => {
            return Err(Error::Open {
                identifier: identifier.to_string(),
                source,
            })
        }
    };
    Ok(sequences
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(name, _)| name.trim() == "unseen")
        .flat_map(|(_, value)| parse_sequence(value))
        .collect())
}

impl Mh {
    pub fn open(identifier: &str, access: Access) -> Result<Self> {
        let path = Path::new(identifier);
        let open_error = |source| Error::Open {
            identifier: identifier.to_string(),
            source,
        };
        let mut numbered = vec![];
        for entry in fs::read_dir(path).map_err(open_error)? {
            let entry = entry.map_err(open_error)?;
            let number = entry.file_name().to_str().and_then(|name| {
                if name.bytes().all(|b| b.is_ascii_digit()) {
                    name.parse::<u32>().ok()
                } else {
                    None
                }
            });
            if let Some(number) = number {
                numbered.push((number, entry.path()));
            }
        }
        numbered.sort();

        let unseen = read_unseen(identifier, path)?;
        let mut messages = MessageList::default();
        let mut files = vec![];
        for (number, file) in numbered {
            let seen = !unseen.iter().any(|range| range.contains(&number));
            let content = read_message_file(identifier, &file)?;
            messages.push(Message::new(number.to_string(), content).with_seen(seen));
            files.push(file);
        }
        Ok(Mh {
            identifier: identifier.to_string(),
            access,
            messages,
            files,
        })
    }
}

impl Mailbox for Mh {
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
            format: "MH",
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
