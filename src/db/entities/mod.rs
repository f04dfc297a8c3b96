pub mod setting;
pub mod site;

pub use setting::Model as Setting;
pub use site::{SiteStatusUpdate, TrackedSite};
