pub mod chromium;
pub mod mock_driver;
pub mod stealth;

mod driver;
pub use chromium::ChromiumDriver;
pub use driver::PageDriver;
pub use mock_driver::{MockDriver, MockPage};
