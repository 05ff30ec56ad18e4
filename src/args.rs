use crate::classify::Cutoff;
use crate::datetime;
use chrono::{DateTime, Local};
use clap::{ArgAction, Parser};
use log::LevelFilter;

fn parse_date(s: &str) -> Result<DateTime<Local>, String> {
    datetime::parse_cutoff(s).ok_or_else(|| format!("unrecognized date {:?}", s))
}

#[derive(Debug, Parser)]
#[clap(name = "chewmail")]
#[clap(author, version, about)]
#[clap(after_help = "Without --days or --date, every message is archived.")]
pub struct Args {
    /// Archive mailbox for each message, with strftime(3) conversions
    /// expanded against the date of the message, e.g. `archive/%Y-%m`.
    #[clap(short, long, value_name = "TEMPLATE")]
    pub output_box: String,
    /// Only archive messages older than this many days.
    #[clap(short, long, value_name = "N")]
    pub days: Option<u32>,
    /// Only archive messages older than this date. Takes precedence over
    /// --days.
    #[clap(short = 'D', long, value_name = "DATE", value_parser = parse_date)]
    pub date: Option<DateTime<Local>>,
    /// Only consider messages which have been read.
    #[clap(short = 'R', long)]
    pub only_read: bool,
    /// Write both mailboxes after every archived message.
    #[clap(long)]
    pub delete_immediately: bool,
    /// Keep access and modification times of mbox files unchanged.
    #[clap(long)]
    pub preserve_timestamp: bool,
    /// Show what would be archived without changing any mailbox.
    #[clap(short = 'n', long)]
    pub dry_run: bool,
    /// Print more about what is going on. Repeat for even more.
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    /// Do not print the summary of each mailbox.
    #[clap(short, long)]
    pub quiet: bool,
    /// Mailboxes to archive messages from.
    #[clap(value_name = "MAILBOX", required = true)]
    pub mailboxes: Vec<String>,
}

impl Args {
    pub fn cutoff(&self) -> Cutoff {
        Cutoff::new(self.date, self.days)
    }

    pub fn should_report(&self) -> bool {
        !self.quiet || self.verbose > 0
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse() {
        let args = Args::try_parse_from(&[
            "chewmail", "-o", "%Y-%m", "-d", "30", "-R", "-vv", "-n", "inbox", "lists",
        ])
        .unwrap();
        assert_eq!(args.output_box, "%Y-%m");
        assert_eq!(args.cutoff(), Cutoff::OlderThanDays(30));
        assert!(args.only_read);
        assert!(args.dry_run);
        assert!(!args.delete_immediately);
        assert_eq!(args.log_level(), LevelFilter::Debug);
        assert_eq!(args.mailboxes, vec!["inbox", "lists"]);
    }

    #[test]
    fn test_date_wins_over_days() {
        let args = Args::try_parse_from(&[
            "chewmail",
            "--output-box=%Y",
            "--days=30",
            "--date=2020-03-01",
            "inbox",
        ])
        .unwrap();
        let date = Local.with_ymd_and_hms(2020, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(args.cutoff(), Cutoff::Before(date));
    }

    #[test]
    fn test_report() {
        let args = Args::try_parse_from(&["chewmail", "-o", "x", "-q", "inbox"]).unwrap();
        assert!(!args.should_report());
        assert_eq!(args.cutoff(), Cutoff::Everything);
        let args = Args::try_parse_from(&["chewmail", "-o", "x", "-q", "-v", "inbox"]).unwrap();
        assert!(args.should_report());
    }

    #[test]
    fn test_invalid() {
        // No output box.
        assert!(Args::try_parse_from(&["chewmail", "inbox"]).is_err());
        // No mailbox.
        assert!(Args::try_parse_from(&["chewmail", "-o", "x"]).is_err());
        assert!(Args::try_parse_from(&["chewmail", "-o", "x", "-D", "someday", "inbox"]).is_err());
        assert!(Args::try_parse_from(&["chewmail", "-o", "x", "-d", "-1", "inbox"]).is_err());
    }
}
