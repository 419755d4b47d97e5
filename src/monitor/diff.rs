use std::collections::BTreeSet;

use crate::domain::available_sizes;
use crate::domain::status::product_name;
use crate::domain::Subscription;
use crate::notify::Notification;

/// Outcome of comparing one fresh result against a subscription's stored status.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decision {
    /// New raw text to store, when it differs from the stored one.
    pub persist: Option<String>,
    pub notify: Option<Notification>,
}

impl Decision {
    pub fn is_noop(&self) -> bool {
        self.persist.is_none() && self.notify.is_none()
    }
}

/// Decide what a new status text means for `sub`.
///
/// Only a change in the set of available sizes can notify, and only when
/// sizes appeared that the subscriber wants. A blank result is ignored.
pub fn evaluate(sub: &Subscription, new_text: &str) -> Decision {
    if new_text.trim().is_empty() {
        return Decision::default();
    }

    let old_text = sub.last_status_text();
    let mut decision = Decision {
        persist: (new_text != old_text).then(|| new_text.to_string()),
        notify: None,
    };

    let new_available = available_sizes(new_text);
    if new_available == available_sizes(old_text) || new_available.is_empty() {
        return decision;
    }

    let wanted = sub.wanted_sizes();
    if wanted.matches(&new_available) {
        decision.notify = Some(notification(sub, new_text, &new_available));
    }

    decision
}

fn notification(sub: &Subscription, text: &str, available: &BTreeSet<String>) -> Notification {
    let brand = sub.brand_label();
    let title = match product_name(text) {
        Some(name) => format!("{} — {}", brand, name),
        None => brand,
    };

    Notification {
        title,
        url: sub.url.clone(),
        sizes: sub.wanted_sizes().shown(available),
    }
}
