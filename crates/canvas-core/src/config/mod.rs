mod settings;

pub use settings::{ClientSettings, Settings};
