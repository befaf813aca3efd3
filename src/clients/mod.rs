pub mod site_client;

pub use site_client::SiteClient;
