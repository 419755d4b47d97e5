use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stockwatch::app::AppContext;
use stockwatch::cli::{commands, Cli, Commands, DaemonAction};
use stockwatch::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stockwatch=info")))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(workers) = cli.workers {
        config.monitor.max_workers = workers;
    }

    // These two only talk to the PID file
    match cli.command {
        Commands::Daemon {
            action: DaemonAction::Stop,
        } => {
            commands::stop_daemon()?;
            return Ok(());
        }
        Commands::Daemon {
            action: DaemonAction::Status,
        } => {
            commands::daemon_status();
            return Ok(());
        }
        _ => {}
    }

    let ctx = AppContext::new(cli.db, config)?;

    match cli.command {
        Commands::Add {
            url,
            user,
            chat,
            sizes,
        } => {
            commands::add_subscription(&ctx, &url, user, chat, sizes.as_deref())?;
        }
        Commands::List { user, status } => {
            commands::list_subscriptions(&ctx, user, status)?;
        }
        Commands::Remove(args) => match (args.id, args.all_for) {
            (Some(id), _) => commands::remove_subscription(&ctx, id)?,
            (None, Some(user)) => {
                commands::remove_all_for_user(&ctx, user)?;
            }
            (None, None) => anyhow::bail!("Nothing to remove"),
        },
        Commands::Pause { id } => {
            commands::set_active(&ctx, id, false)?;
        }
        Commands::Resume { id } => {
            commands::set_active(&ctx, id, true)?;
        }
        Commands::Sizes { id, sizes } => {
            commands::set_sizes(&ctx, id, sizes.as_deref())?;
        }
        Commands::Check { urls } => {
            commands::check_urls(&ctx, urls).await?;
        }
        Commands::Pass { dry_run } => {
            commands::run_pass(&ctx, dry_run).await?;
        }
        Commands::Daemon { action } => match action {
            DaemonAction::Start {
                interval,
                no_initial_pass,
                dry_run,
            } => {
                commands::start_daemon(&ctx, interval.as_deref(), no_initial_pass, dry_run).await?;
            }
            DaemonAction::Stop | DaemonAction::Status => {}
        },
    }

    Ok(())
}
