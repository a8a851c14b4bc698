//! Optional interactive display of rendered figures.

use std::path::Path;
use tracing::{info, warn};

/// Whether a graphical session is likely to be able to show an image.
pub fn display_available() -> bool {
    if cfg!(any(target_os = "macos", target_os = "windows")) {
        return true;
    }
    ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .any(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()))
}

/// Open `path` in the platform image viewer.
///
/// Returns whether a viewer was launched. Failures are logged and never
/// abort the caller; the figure is already on disk.
pub fn show_figure(path: &Path) -> bool {
    if !display_available() {
        info!(path = %path.display(), "No display available, skipping figure preview");
        return false;
    }
    match open::that(path) {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to open figure viewer");
            false
        }
    }
}
