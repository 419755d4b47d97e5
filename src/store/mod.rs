pub mod sqlite;

use crate::app::Result;
use crate::domain::Subscription;

pub use sqlite::SqliteStore;

pub trait SubscriptionStore {
    /// Insert a subscription. Returns `None` when the user already follows this URL.
    fn add_subscription(&self, subscription: &Subscription) -> Result<Option<i64>>;
    fn get_subscription(&self, id: i64) -> Result<Option<Subscription>>;
    fn list_active(&self) -> Result<Vec<Subscription>>;
    fn list_all(&self) -> Result<Vec<Subscription>>;
    fn list_for_user(&self, user_id: i64) -> Result<Vec<Subscription>>;

    /// Replace the last known status block of a subscription.
    fn update_status(&self, id: i64, status: &str) -> Result<()>;
    fn set_active(&self, id: i64, is_active: bool) -> Result<()>;
    fn set_sizes(&self, id: i64, sizes: Option<&str>) -> Result<()>;

    fn delete_subscription(&self, id: i64) -> Result<bool>;
    fn delete_all_for_user(&self, user_id: i64) -> Result<usize>;
}
