//! 输入文件加载器

pub mod sheet_loader;

pub use sheet_loader::load_account_sheet;
