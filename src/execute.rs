use crate::args::Args;
use crate::classify::Cutoff;
use crate::error::Result;
use crate::route::Router;
use crate::store::{Access, Filter, MailStore};
use crate::template;
use crate::utils::{self, Timestamps};
use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::AddAssign;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    /// Size of the message snapshot.
    pub considered: usize,
    pub archived: usize,
    pub kept: usize,
}

impl AddAssign for Counts {
    fn add_assign(&mut self, other: Counts) {
        self.considered += other.considered;
        self.archived += other.archived;
        self.kept += other.kept;
    }
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} messages considered, {} archived, {} kept",
            self.considered, self.archived, self.kept
        )
    }
}

/// Moves the messages of one source mailbox which pass the cutoff into
/// their archive mailboxes.
///
/// A message is copied before it is marked deleted, and archives are
/// written before the source, so a failure at any point leaves a message
/// in two places rather than in none.
fn archive_mailbox(
    args: &Args,
    cutoff: &Cutoff,
    now: DateTime<Local>,
    store: &mut dyn MailStore,
    router: &mut Router,
    identifier: &str,
) -> Result<Counts> {
    // Reading the mailbox updates its access time, so take them first. They
    // are put back even if archiving fails.
    let timestamps = match store.backing_file(identifier) {
        Some(path) if args.preserve_timestamp => Some(Timestamps::capture(&path)?),
        _ => None,
    };

    let access = if args.dry_run {
        Access::ReadOnly
    } else {
        Access::ReadWrite
    };
    info!("Opening {}", identifier);
    let mut source = store.open(identifier, access, false)?;

    let filter = if args.only_read {
        Filter::SeenOnly
    } else {
        Filter::All
    };
    let snapshot = source.messages(filter);
    let mut counts = Counts {
        considered: snapshot.len(),
        ..Counts::default()
    };
    let mut touched = BTreeSet::new();

    let progress = utils::create_progress_bar(args, snapshot.len());
    for id in snapshot {
        progress.inc(1);
        let message = source.message(id);
        let timestamp = match message.timestamp() {
            Some(ts) => ts.with_timezone(&Local),
            None => {
                trace!("{} has no date, treating it as current", message.id());
                now
            }
        };
        if !cutoff.includes(timestamp, now) {
            trace!("Keeping {}", message.id());
            counts.kept += 1;
            continue;
        }

        let name = template::resolve(&args.output_box, &timestamp);
        trace!("Archiving {} to {}", message.id(), name);
        let destination = router.route_to(store, &name)?;
        if !args.dry_run {
            destination.append(message)?;
            source.mark_deleted(id);
        }
        counts.archived += 1;
        let key = destination.key().to_string();
        if args.delete_immediately && !args.dry_run {
            debug!("Writing {} and {}", name, identifier);
            destination.write()?;
            source.write()?;
        }
        touched.insert(key);
    }
    progress.finish_and_clear();

    if !args.delete_immediately && !args.dry_run {
        for key in &touched {
            debug!("Writing {}", key);
            router.flush(key)?;
        }
    }

    debug!("Closing {}", identifier);
    source.close()?;
    if let Some(timestamps) = timestamps {
        timestamps.restore()?;
    }
    Ok(counts)
}

/// Archives every mailbox given on the command line, in order, stopping at
/// the first failure. Archive mailboxes are shared by all of them and
/// closed at the end.
pub fn archive_all(args: &Args, store: &mut dyn MailStore) -> Result<Vec<Counts>> {
    let cutoff = args.cutoff();
    let now = Local::now();
    debug!("Archiving with cutoff {:?}", cutoff);

    let sources = args
        .mailboxes
        .iter()
        .map(|identifier| store.canonical(identifier))
        .collect();
    let mut router = Router::new(args.dry_run, sources);
    let mut result = Vec::with_capacity(args.mailboxes.len());
    for identifier in args.mailboxes.iter() {
        let counts = archive_mailbox(args, &cutoff, now, store, &mut router, identifier)?;
        if args.should_report() {
            let prefix = if args.dry_run { "(dry run) " } else { "" };
            println!("{}{}: {}", prefix, identifier, counts);
        }
        result.push(counts);
    }
    if result.len() > 1 {
        let mut total = Counts::default();
        for counts in result.iter() {
            total += *counts;
        }
        info!("Total: {}", total);
    }

    debug!("Closing {} archive mailboxes", router.len());
    router.close_all()?;
    Ok(result)
}
