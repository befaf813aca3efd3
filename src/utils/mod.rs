pub mod logging;
pub mod scrape;
pub mod session;
