pub mod error;
pub mod handlers;
pub mod logging;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use server::{app_config, default_data_dir, resolve_store_path, run_server};
pub use state::AppState;
