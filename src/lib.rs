pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod info_log;
pub mod logging;
pub mod presenter;
pub mod traits;

pub use config::BackendConfig;
pub use error::{GfxError, GfxResult};
pub use info_log::{shader_info_log, InfoLogQuery};
pub use presenter::ViewportPresenter;
