use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tanbih", version, author, about = "A terminal prayer companion that tracks prayer windows and reminds you until you pray")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// First-run setup wizard (location, calculation method, reminders)
    Setup {
        /// Reset existing configuration
        #[arg(long)]
        reset: bool,
    },
    /// Show today's prayer times and window statuses
    Times,
    /// Show the next pending prayer and the countdown to it
    Next,
    /// Acknowledge a prayer (marks it completed and stops its reminders)
    Mark {
        /// Prayer name (fajr, dhuhr, asr, maghrib, isha)
        prayer: String,
    },
    /// Show the alert schedule computed for today
    Alerts,
    /// Show completion history for recorded days
    History,
    /// Follow-up reminder settings
    Remind {
        #[command(subcommand)]
        action: RemindCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum RemindCommands {
    /// Set the minutes between follow-up reminders
    Interval {
        /// Minutes between follow-ups (minimum 1)
        minutes: u32,
    },
    /// Enable follow-up reminders
    On,
    /// Disable follow-up reminders (opening alerts stay on)
    Off,
    /// Show the current reminder settings
    Status,
}
