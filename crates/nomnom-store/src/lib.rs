pub mod config;
pub mod error;
pub mod json_bridge;
pub mod schema;
pub mod store;

pub use config::{
    CONFIG_FILE, DATA_DIR_ENV, DB_FILE, config_path, db_path, default_base_dir, load_config,
    save_config,
};
pub use error::{Result, StoreError};
pub use store::{ImportSummary, Store, StoreStats};
