use super::{Access, Envelope, Filter, Mailbox, Message, MessageId, MessageList, Status};
use crate::collect;
use crate::datetime;
use crate::error::{Error, Result};
use chrono::Utc;
use fs2::FileExt;
use mail_parser::mailbox::mbox::MessageIterator;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::SystemTime;

const ENVELOPE_PREFIX: &[u8] = b"From ";
const ASCTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";
/// How much of an existing archive is read to check its format.
const HEAD_LEN: u64 = 4096;

/// A mailbox in mboxrd format: messages start with a `From ` envelope line
/// and body lines matching `>*From ` are quoted with one more `>`.
///
/// A writable mbox holds an exclusive `flock` until it is dropped.
pub struct Mbox {
    identifier: String,
    path: PathBuf,
    access: Access,
    messages: MessageList,
    /// Messages before this index are already in the file.
    written: usize,
    /// What to write before appending so that the next envelope line
    /// follows an empty line.
    padding: &'static [u8],
    lock: Option<File>,
    /// Size and modification time of the file as last read or written.
    stamp: Stamp,
}

type Stamp = (u64, Option<SystemTime>);

fn stamp_of(file: &File) -> io::Result<Stamp> {
    let meta = file.metadata()?;
    Ok((meta.len(), meta.modified().ok()))
}

fn format_error(identifier: &str) -> Error {
    Error::Format {
        identifier: identifier.to_string(),
        expected: "an mbox",
    }
}

/// Whether `head`, the start of a file, can start an mbox. Empty lines
/// before the first envelope are tolerated.
fn looks_like_mbox(head: &[u8]) -> bool {
    let start = head
        .iter()
        .position(|&b| b != b'\n' && b != b'\r')
        .unwrap_or(head.len());
    let head = &head[start..];
    head.is_empty() || head.starts_with(ENVELOPE_PREFIX)
}

fn padding_after(tail: &[u8]) -> &'static [u8] {
    if tail.is_empty() || tail.ends_with(b"\n\n") {
        b""
    } else if tail.ends_with(b"\n") {
        b"\n"
    } else {
        b"\n\n"
    }
}

fn is_quoted_envelope(line: &[u8]) -> bool {
    let unquoted = line.iter().position(|&b| b != b'>').unwrap_or(line.len());
    line[unquoted..].starts_with(ENVELOPE_PREFIX)
}

fn parse(identifier: &str, data: &[u8]) -> Result<MessageList> {
    if !looks_like_mbox(data) {
        return Err(format_error(identifier));
    }
    let mut messages = MessageList::default();
    for raw in MessageIterator::new(data) {
        let raw = raw.map_err(|_| Error::Open {
            identifier: identifier.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidData, "malformed mbox"),
        })?;
        let envelope = Envelope {
            sender: raw.from().to_string(),
            date: datetime::from_unix(raw.internal_date()),
        };
        let content = raw.contents().to_vec();
        let seen = collect::is_seen(&content);
        let fallback_id = format!("{}:{}", identifier, messages.len() + 1);
        let message = Message::new(fallback_id, content)
            .with_envelope(envelope)
            .with_seen(seen);
        messages.push(message);
    }
    Ok(messages)
}

fn write_message(writer: &mut impl Write, message: &Message) -> io::Result<()> {
    let envelope = message.envelope();
    let sender = envelope
        .map(|envelope| envelope.sender.as_str())
        .filter(|sender| !sender.is_empty())
        .unwrap_or("MAILER-DAEMON");
    let date = envelope
        .and_then(|envelope| envelope.date)
        .or_else(|| message.timestamp())
        .map_or_else(Utc::now, |ts| ts.with_timezone(&Utc));
    writeln!(writer, "From {} {}", sender, date.format(ASCTIME_FORMAT))?;

    let content = message.content();
    for line in content.split_inclusive(|&b| b == b'\n') {
        if is_quoted_envelope(line) {
            writer.write_all(b">")?;
        }
        writer.write_all(line)?;
    }
    if !content.is_empty() && !content.ends_with(b"\n") {
        writer.write_all(b"\n")?;
    }
    writer.write_all(b"\n")
}

#[cfg(unix)]
fn set_archive_permission(file: &File) -> io::Result<()> {
    let mut perms = file.metadata()?.permissions();
    let mode = (perms.mode() & !0o777) | 0o600;
    perms.set_mode(mode);
    file.set_permissions(perms)
}

fn lock(identifier: &str, file: &File) -> Result<()> {
    file.try_lock_exclusive().map_err(|source| Error::Locked {
        identifier: identifier.to_string(),
        source,
    })
}

impl Mbox {
    /// Reads the whole mbox. A writable one is locked before it is read.
    pub fn open(identifier: &str, access: Access) -> Result<Self> {
        let path = PathBuf::from(identifier);
        let open_error = |source| Error::Open {
            identifier: identifier.to_string(),
            source,
        };
        let mut file = File::open(&path).map_err(open_error)?;
        if access == Access::ReadWrite {
            lock(identifier, &file)?;
        }
        let mut data = vec![];
        file.read_to_end(&mut data).map_err(open_error)?;
        let stamp = stamp_of(&file).map_err(open_error)?;
        let messages = parse(identifier, &data)?;
        Ok(Mbox {
            identifier: identifier.to_string(),
            path,
            access,
            written: messages.len(),
            messages,
            padding: padding_after(&data),
            lock: match access {
                Access::ReadWrite => Some(file),
                Access::ReadOnly => None,
            },
            stamp,
        })
    }

    /// Opens an existing mbox to append messages to it. Only its start and
    /// its last bytes are read, so it lists no messages but appended ones.
    pub fn open_for_append(identifier: &str) -> Result<Self> {
        let path = PathBuf::from(identifier);
        let open_error = |source| Error::Open {
            identifier: identifier.to_string(),
            source,
        };
        let mut file = File::open(&path).map_err(open_error)?;
        lock(identifier, &file)?;

        let mut head = vec![];
        (&file)
            .take(HEAD_LEN)
            .read_to_end(&mut head)
            .map_err(open_error)?;
        if !looks_like_mbox(&head) {
            return Err(format_error(identifier));
        }
        let stamp = stamp_of(&file).map_err(open_error)?;
        let mut tail = vec![];
        file.seek(SeekFrom::Start(stamp.0.saturating_sub(2)))
            .and_then(|_| file.read_to_end(&mut tail))
            .map_err(open_error)?;
        Ok(Mbox {
            identifier: identifier.to_string(),
            path,
            access: Access::ReadWrite,
            messages: MessageList::default(),
            written: 0,
            padding: padding_after(&tail),
            lock: Some(file),
            stamp,
        })
    }

    /// Creates an empty mbox readable only by its owner, along with any
    /// missing parent directory.
    pub fn create(identifier: &str) -> Result<Self> {
        let path = PathBuf::from(identifier);
        let open_error = |source| Error::Open {
            identifier: identifier.to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_error)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(open_error)?;
        #[cfg(unix)]
        set_archive_permission(&file).map_err(open_error)?;
        lock(identifier, &file)?;
        let stamp = stamp_of(&file).map_err(open_error)?;
        Ok(Mbox {
            identifier: identifier.to_string(),
            path,
            access: Access::ReadWrite,
            messages: MessageList::default(),
            written: 0,
            padding: b"",
            lock: Some(file),
            stamp,
        })
    }

    fn is_dirty(&self) -> bool {
        self.written < self.messages.len() || self.messages.has_pending_deletes()
    }

    fn append_unwritten(&mut self) -> io::Result<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(self.padding)?;
        for (_, message) in self.messages.kept().skip_while(|(id, _)| id.0 < self.written) {
            write_message(&mut writer, message)?;
        }
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        self.stamp = stamp_of(&file)?;
        Ok(())
    }

    /// Writes the kept messages into a temporary file beside the mbox and
    /// moves it over the mbox. The temporary file is locked before it takes
    /// the place of the mbox, and the lock on the old file is let go after.
    fn rewrite(&mut self) -> Result<()> {
        let write_error = |source| Error::Write {
            identifier: self.identifier.clone(),
            source,
        };
        let current = fs::metadata(&self.path).map_err(write_error)?;
        if (current.len(), current.modified().ok()) != self.stamp {
            return Err(Error::Changed(self.identifier.clone()));
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);
        let tmp_file = File::create(&tmp_path).map_err(write_error)?;
        lock(&self.identifier, &tmp_file)?;
        tmp_file
            .set_permissions(current.permissions())
            .map_err(write_error)?;

        let mut writer = BufWriter::new(tmp_file);
        for (_, message) in self.messages.kept() {
            write_message(&mut writer, message).map_err(write_error)?;
        }
        let file = writer
            .into_inner()
            .map_err(|e| write_error(e.into_error()))?;
        file.sync_all().map_err(write_error)?;
        fs::rename(&tmp_path, &self.path).map_err(write_error)?;
        self.stamp = stamp_of(&file).map_err(write_error)?;
        self.lock = Some(file);
        Ok(())
    }
}

impl Mailbox for Mbox {
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
        if !self.is_dirty() {
            return Ok(());
        }
        if self.messages.has_pending_deletes() {
            self.rewrite()?;
        } else {
            self.append_unwritten().map_err(|source| Error::Write {
                identifier: self.identifier.clone(),
                source,
            })?;
        }
        self.messages.commit_deletes();
        self.written = self.messages.len();
        self.padding = b"";
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        if self.access == Access::ReadWrite {
            self.write()?;
        }
        Ok(())
    }
}
