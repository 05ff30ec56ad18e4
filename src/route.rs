use crate::error::{Error, Result};
use crate::store::{Access, MailStore, Mailbox, Message};
use std::collections::btree_map::{BTreeMap, Entry};
use std::collections::BTreeSet;

/// An archive mailbox messages are routed to. In a dry run nothing is
/// opened and everything sent to it is dropped.
pub struct Destination {
    identifier: String,
    /// Canonical name the destination is registered under.
    key: String,
    handle: Option<Box<dyn Mailbox>>,
}

impl Destination {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn append(&mut self, message: &Message) -> Result<()> {
        match self.handle.as_mut() {
            Some(handle) => handle.append(message),
            None => Ok(()),
        }
    }

    pub fn write(&mut self) -> Result<()> {
        match self.handle.as_mut() {
            Some(handle) => handle.write(),
            None => Ok(()),
        }
    }

    fn close(self) -> Result<()> {
        match self.handle {
            Some(handle) => handle.close(),
            None => Ok(()),
        }
    }
}

/// Archive mailboxes opened during a run, by canonical name. Each one is
/// opened the first time a message is routed to it and stays open until the
/// end of the run, so that every source mailbox shares it.
///
/// Routing to one of the source mailboxes of the run is refused: the source
/// would overwrite the archived messages when its deletions are written.
pub struct Router {
    dry_run: bool,
    sources: BTreeSet<String>,
    destinations: BTreeMap<String, Destination>,
}

impl Router {
    /// `sources` are the canonical names of the source mailboxes.
    pub fn new(dry_run: bool, sources: BTreeSet<String>) -> Self {
        Router {
            dry_run,
            sources,
            destinations: BTreeMap::new(),
        }
    }

    pub fn route_to(
        &mut self,
        store: &mut dyn MailStore,
        identifier: &str,
    ) -> Result<&mut Destination> {
        match self.destinations.entry(store.canonical(identifier)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                if self.sources.contains(entry.key()) {
                    return Err(Error::ArchiveIsSource(identifier.to_string()));
                }
                let handle = if self.dry_run {
                    info!("Would open archive {}", identifier);
                    None
                } else {
                    info!("Opening archive {}", identifier);
                    Some(store.open(identifier, Access::ReadWrite, true)?)
                };
                let key = entry.key().clone();
                Ok(entry.insert(Destination {
                    identifier: identifier.to_string(),
                    key,
                    handle,
                }))
            }
        }
    }

    /// Writes the destination registered under `key` if it has been opened.
    pub fn flush(&mut self, key: &str) -> Result<()> {
        match self.destinations.get_mut(key) {
            Some(destination) => destination.write(),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn close_all(self) -> Result<()> {
        for (_, destination) in self.destinations {
            debug!("Closing archive {}", destination.identifier());
            destination.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{Event, MemoryStore};

    fn message(subject: &str) -> Message {
        Message::new(subject.to_string(), format!("Subject: {}\n\n", subject).into_bytes())
    }

    #[test]
    fn test_opens_each_destination_once() {
        let mut store = MemoryStore::new();
        let mut router = Router::new(false, BTreeSet::new());
        router.route_to(&mut store, "2020-01").unwrap().append(&message("a")).unwrap();
        router.route_to(&mut store, "2020-02").unwrap().append(&message("b")).unwrap();
        router.route_to(&mut store, "2020-01").unwrap().append(&message("c")).unwrap();
        assert_eq!(router.len(), 2);
        assert_eq!(
            store.journal(),
            vec![
                Event::Create("2020-01".to_string()),
                Event::Open("2020-01".to_string(), Access::ReadWrite),
                Event::Create("2020-02".to_string()),
                Event::Open("2020-02".to_string(), Access::ReadWrite),
            ]
        );

        router.flush("2020-01").unwrap();
        assert_eq!(store.contents("2020-01").unwrap().len(), 2);
        assert_eq!(store.contents("2020-02").unwrap().len(), 0);
        // Flushing something never routed to is a no-op.
        router.flush("2021-01").unwrap();

        router.close_all().unwrap();
        assert_eq!(store.contents("2020-02").unwrap().len(), 1);
        assert_eq!(store.writes("2020-01"), 1);
        assert_eq!(store.writes("2020-02"), 1);
    }

    #[test]
    fn test_refuses_source_as_destination() {
        let mut store = MemoryStore::new();
        store.add_mailbox("inbox", vec![message("a")]);
        let sources: BTreeSet<String> = vec!["inbox".to_string()].into_iter().collect();
        for dry_run in &[false, true] {
            let mut router = Router::new(*dry_run, sources.clone());
            match router.route_to(&mut store, "inbox") {
                Err(Error::ArchiveIsSource(identifier)) => assert_eq!(identifier, "inbox"),
                _ => panic!("routed to a source mailbox"),
            }
            assert_eq!(router.len(), 0);
        }
        assert!(store.journal().is_empty());
    }

    #[test]
    fn test_dry_run_opens_nothing() {
        let mut store = MemoryStore::new();
        let mut router = Router::new(true, BTreeSet::new());
        let destination = router.route_to(&mut store, "2020-01").unwrap();
        assert_eq!(destination.identifier(), "2020-01");
        destination.append(&message("a")).unwrap();
        destination.write().unwrap();
        router.close_all().unwrap();
        assert!(store.journal().is_empty());
        assert!(store.mailboxes().is_empty());
    }
}
