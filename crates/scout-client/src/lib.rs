pub mod http_driver;

#[cfg(feature = "browser")]
pub mod browser_driver;

#[cfg(feature = "browser")]
pub use browser_driver::{BrowserDriver, BrowserDriverFactory};
pub use http_driver::{HttpDriver, HttpDriverFactory};
