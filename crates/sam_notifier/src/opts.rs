use std::time::Duration;

use clap::{Parser, Subcommand};
use sam_tracker::{dbus, BusKind, SessionConfig};

/// Struct that gets generated from `RawOpt`.
#[derive(Debug, PartialEq, Eq)]
pub struct Opt {
    pub log_debug: bool,
    pub session: SessionConfig,
    pub action: Action,
}

/// Show the progress of the App Manager install queue as a desktop notification.
#[derive(Parser, Debug, PartialEq, Eq)]
#[command(version, about)]
pub struct RawOpt {
    /// Write out debug logs.
    #[arg(long = "debug", global = true)]
    log_debug: bool,

    /// Look for the queue service on the session bus instead of the system bus.
    #[arg(long, global = true)]
    session_bus: bool,

    /// Bus name of the queue service.
    #[arg(long, global = true, default_value = dbus::SAM_SERVICE_BUS)]
    service: String,

    /// Object path of the queue service.
    #[arg(long, global = true, default_value = dbus::SAM_SERVICE_OBJECT)]
    object_path: String,

    /// How long to wait for the queue service to answer, in milliseconds.
    #[arg(long, global = true, default_value_t = 5000)]
    fetch_timeout: u64,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Action {
    /// Keep a notification up to date with the queue until interrupted. This is the default.
    #[command(name = "watch", alias = "w")]
    Watch,

    /// Print the current contents of the queue and exit.
    #[command(name = "queue", alias = "q")]
    Queue {
        /// Print the queue as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a shell completion script
    ShellCompletions {
        #[arg(short, long)]
        shell: clap_complete::shells::Shell,
    },
}

impl Opt {
    pub fn from_env() -> Self {
        let raw: RawOpt = RawOpt::parse();
        raw.into()
    }
}

impl From<RawOpt> for Opt {
    fn from(other: RawOpt) -> Self {
        let RawOpt { log_debug, session_bus, service, object_path, fetch_timeout, action } = other;
        Opt {
            log_debug,
            session: SessionConfig {
                bus: if session_bus { BusKind::Session } else { BusKind::System },
                service,
                object_path,
                fetch_timeout: Duration::from_millis(fetch_timeout),
            },
            action: action.unwrap_or(Action::Watch),
        }
    }
}
