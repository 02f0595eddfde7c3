pub mod launch;

pub use launch::{kill_existing_browsers, launch_browser};
