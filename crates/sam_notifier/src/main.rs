use anyhow::{Context, Result};
use clap::CommandFactory as _;
use sam_tracker::{Session, SessionConfig};

mod application_lifecycle;
mod client;
mod notifications;
mod opts;

fn main() {
    let opts: opts::Opt = opts::Opt::from_env();

    let log_level_filter = if opts.log_debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::init_timed();
    } else {
        pretty_env_logger::formatted_timed_builder()
            .filter(Some("sam_notifier"), log_level_filter)
            .filter(Some("sam_tracker"), log_level_filter)
            .init();
    }

    if let opts::Action::ShellCompletions { shell } = opts.action {
        clap_complete::generate(shell, &mut opts::RawOpt::command(), "sam-notifier", &mut std::io::stdout());
        return;
    }

    if let Err(err) = run(opts) {
        log::error!("{:?}", err);
        std::process::exit(1);
    }
}

fn run(opts: opts::Opt) -> Result<()> {
    // Everything runs on this one thread, events are handled one after another.
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().context("Failed to initialize tokio runtime")?;
    let local = tokio::task::LocalSet::new();

    local.block_on(&rt, async move {
        match opts.action {
            opts::Action::ShellCompletions { .. } => unreachable!(),
            opts::Action::Queue { json } => client::print_queue(&opts.session, json).await,
            opts::Action::Watch => watch(opts.session).await,
        }
    })
}

/// Track the queue until the process is asked to terminate.
async fn watch(config: SessionConfig) -> Result<()> {
    let mut exit = application_lifecycle::exit_receiver();
    application_lifecycle::handle_termination_signals();

    log::info!("Watching {} at {} on the {:?} bus", config.service, config.object_path, config.bus);
    let mut session = Session::new(config);
    session.start(notifications::FdoPresenter::new).await.context("Failed to start tracking the queue")?;

    let received = exit.recv().await;
    session.stop().await;
    received.context("Failed to receive lifecycle event")?;
    Ok(())
}
