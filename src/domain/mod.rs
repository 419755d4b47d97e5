pub mod availability;
pub mod brand;
pub mod status;
pub mod subscription;

pub use availability::{available_sizes, WantedSizes};
pub use brand::Brand;
pub use status::{Sentinel, SizeEntry, StatusBlock, Stock};
pub use subscription::Subscription;
