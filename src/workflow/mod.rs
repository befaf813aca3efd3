pub mod account_ctx;
pub mod login_flow;

pub use account_ctx::AccountCtx;
pub use login_flow::LoginFlow;
