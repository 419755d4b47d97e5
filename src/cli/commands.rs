use std::time::Instant;

use tracing::info;

use crate::app::{AppContext, Result, StockwatchError};
use crate::checker::channel;
use crate::daemon::{self, Daemon, DaemonConfig};
use crate::domain::{available_sizes, Brand, Subscription, WantedSizes};
use crate::store::SubscriptionStore;

pub fn add_subscription(
    ctx: &AppContext,
    url: &str,
    user_id: i64,
    chat_id: Option<i64>,
    sizes: Option<&str>,
) -> Result<Option<i64>> {
    let url = url::Url::parse(url.trim())?.to_string();
    if Brand::detect(&url).is_none() {
        return Err(StockwatchError::Other(format!(
            "Only Zara and Bershka pages are supported: {}",
            url
        )));
    }

    let mut sub = Subscription::new(user_id, chat_id.unwrap_or(user_id), url);
    if let Some(sizes) = sizes {
        sub = sub.with_sizes(sizes);
    }

    match ctx.store.add_subscription(&sub)? {
        Some(id) => {
            println!("Subscribed #{}: {} ({})", id, sub.url, sizes_label(&sub));
            Ok(Some(id))
        }
        None => {
            println!("Already subscribed: {}", sub.url);
            Ok(None)
        }
    }
}

pub fn list_subscriptions(ctx: &AppContext, user_id: Option<i64>, show_status: bool) -> Result<()> {
    let subs = match user_id {
        Some(user_id) => ctx.store.list_for_user(user_id)?,
        None => ctx.store.list_all()?,
    };

    if subs.is_empty() {
        println!("No subscriptions");
        return Ok(());
    }

    for sub in subs {
        println!("{}", describe(&sub));
        if show_status {
            match sub.last_status.as_deref() {
                Some(status) if !status.trim().is_empty() => {
                    for line in status.lines() {
                        println!("    {}", line);
                    }
                }
                _ => println!("    (not checked yet)"),
            }
        }
    }

    Ok(())
}

pub fn remove_subscription(ctx: &AppContext, id: i64) -> Result<()> {
    if !ctx.store.delete_subscription(id)? {
        return Err(StockwatchError::SubscriptionNotFound(id));
    }
    println!("Removed subscription #{}", id);
    Ok(())
}

pub fn remove_all_for_user(ctx: &AppContext, user_id: i64) -> Result<usize> {
    let removed = ctx.store.delete_all_for_user(user_id)?;
    println!("Removed {} subscriptions of user {}", removed, user_id);
    Ok(removed)
}

pub fn set_active(ctx: &AppContext, id: i64, is_active: bool) -> Result<()> {
    ctx.store.set_active(id, is_active)?;
    println!(
        "Subscription #{} {}",
        id,
        if is_active { "resumed" } else { "paused" }
    );
    Ok(())
}

pub fn set_sizes(ctx: &AppContext, id: i64, sizes: Option<&str>) -> Result<()> {
    let wanted = WantedSizes::parse(sizes);
    ctx.store.set_sizes(id, wanted.to_storage().as_deref())?;
    match wanted {
        WantedSizes::Any => println!("Subscription #{} now watches every size", id),
        WantedSizes::Only(sizes) => println!(
            "Subscription #{} now watches {}",
            id,
            sizes.into_iter().collect::<Vec<_>>().join(", ")
        ),
    }
    Ok(())
}

/// Check `urls` once, printing each status block as it arrives.
pub async fn check_urls(ctx: &AppContext, urls: Vec<String>) -> Result<()> {
    let pool = ctx.worker_pool();
    let (sink, mut stream) = channel();

    let print = async {
        while let Some(result) = stream.next().await {
            let sizes: Vec<String> = available_sizes(&result.text).into_iter().collect();
            println!("== {}", result.url);
            println!("{}", result.text);
            if !sizes.is_empty() {
                println!("-> available: {}", sizes.join(", "));
            }
            println!();
        }
    };

    let (report, ()) = tokio::join!(pool.run(urls, sink), print);
    println!(
        "Checked {} pages: {} ok, {} failed, {} skipped",
        report.urls, report.checked, report.errored, report.skipped
    );
    Ok(())
}

pub async fn run_pass(ctx: &AppContext, dry_run: bool) -> Result<()> {
    let start = Instant::now();
    let report = ctx.monitor(dry_run).run_pass().await?;

    println!(
        "Pass complete: {} chats, {} pages, {} updated, {} notified, {} failed sends ({:.1}s)",
        report.groups,
        report.urls,
        report.updated,
        report.notified,
        report.failed_sends,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

pub async fn start_daemon(
    ctx: &AppContext,
    interval: Option<&str>,
    no_initial_pass: bool,
    dry_run: bool,
) -> Result<()> {
    let interval_secs = match interval {
        Some(s) => DaemonConfig::parse_interval(s).map_err(StockwatchError::Config)?,
        None => ctx.config.monitor.interval().as_secs(),
    };

    let config = DaemonConfig {
        interval_secs,
        update_on_start: ctx.config.monitor.update_on_start && !no_initial_pass,
    };
    info!(?config, dry_run, "Starting daemon");

    Daemon::new(ctx.monitor(dry_run), config).run().await
}

pub fn stop_daemon() -> Result<()> {
    daemon::stop_daemon().map_err(StockwatchError::Other)?;
    println!("Daemon stopped");
    Ok(())
}

pub fn daemon_status() {
    println!("{}", daemon::daemon_status());
}

fn sizes_label(sub: &Subscription) -> String {
    match sub.wanted_sizes() {
        WantedSizes::Any => "all sizes".to_string(),
        WantedSizes::Only(sizes) => sizes.into_iter().collect::<Vec<_>>().join(", "),
    }
}

fn describe(sub: &Subscription) -> String {
    format!(
        "#{} {} {} user={} chat={} [{}] {}",
        sub.id,
        if sub.is_active { "active" } else { "paused" },
        sub.brand_label(),
        sub.user_id,
        sub.chat_id,
        sizes_label(sub),
        sub.url
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const SHIRT: &str = "https://www.zara.com/ua/uk/shirt-p1.html";

    fn ctx() -> AppContext {
        AppContext::in_memory(Config::default()).unwrap()
    }

    #[test]
    fn test_add_and_duplicate() {
        let ctx = ctx();
        let id = add_subscription(&ctx, SHIRT, 5, None, Some("l, m")).unwrap().unwrap();

        let sub = ctx.store.get_subscription(id).unwrap().unwrap();
        assert_eq!(sub.chat_id, 5);
        assert_eq!(sub.sizes.as_deref(), Some("L,M"));
        assert_eq!(sub.brand.as_deref(), Some("zara"));

        assert_eq!(add_subscription(&ctx, SHIRT, 5, Some(9), None).unwrap(), None);
    }

    #[test]
    fn test_add_rejects_other_shops() {
        let ctx = ctx();
        assert!(matches!(
            add_subscription(&ctx, "https://shop.example.com/p/1", 5, None, None),
            Err(StockwatchError::Other(_))
        ));
        assert!(matches!(
            add_subscription(&ctx, "not a url", 5, None, None),
            Err(StockwatchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_pause_resume_and_sizes() {
        let ctx = ctx();
        let id = add_subscription(&ctx, SHIRT, 5, None, None).unwrap().unwrap();

        set_active(&ctx, id, false).unwrap();
        assert!(ctx.store.list_active().unwrap().is_empty());
        set_active(&ctx, id, true).unwrap();
        assert_eq!(ctx.store.list_active().unwrap().len(), 1);

        set_sizes(&ctx, id, Some("xl")).unwrap();
        let sub = ctx.store.get_subscription(id).unwrap().unwrap();
        assert_eq!(sub.sizes.as_deref(), Some("XL"));

        set_sizes(&ctx, id, None).unwrap();
        let sub = ctx.store.get_subscription(id).unwrap().unwrap();
        assert_eq!(sub.wanted_sizes(), WantedSizes::Any);
    }

    #[test]
    fn test_remove() {
        let ctx = ctx();
        let id = add_subscription(&ctx, SHIRT, 5, None, None).unwrap().unwrap();
        add_subscription(&ctx, "https://www.bershka.com/ua/jeans-c0p2.html", 5, None, None).unwrap();

        remove_subscription(&ctx, id).unwrap();
        assert!(matches!(
            remove_subscription(&ctx, id),
            Err(StockwatchError::SubscriptionNotFound(_))
        ));
        assert_eq!(remove_all_for_user(&ctx, 5).unwrap(), 1);
        assert!(ctx.store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_describe() {
        let mut sub = Subscription::new(5, 7, SHIRT.to_string()).with_sizes("m");
        sub.id = 3;
        assert_eq!(describe(&sub), format!("#3 active Zara user=5 chat=7 [M] {}", SHIRT));
    }
}
