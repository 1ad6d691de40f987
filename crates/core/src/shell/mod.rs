//! Platform-independent parts of the native app shell.

mod chooser;
mod download;
mod fallback;

pub use chooser::{FileChooser, PickerKind, PickerPlan, validate_selection};
pub use download::{DownloadRequest, Downloader};
pub use fallback::{BackAction, connection_error_page, on_back, should_show_fallback};
