pub mod site_admin_service;

pub use site_admin_service::{AdminError, SiteAdminService};
