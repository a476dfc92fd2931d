pub mod commands;
pub mod progress;
pub mod ui;
pub mod util;

pub use progress::UploadProgress;
pub use util::CommandContext;
