use arboard::Clipboard;

use super::errors::{InfrastructureError, InfrastructureResult};

/// Thin wrapper over the system clipboard.
pub struct ClipboardService;

impl ClipboardService {
    pub fn copy_text(text: &str) -> InfrastructureResult<()> {
        let mut clipboard = Clipboard::new().map_err(|e| InfrastructureError::Clipboard(e.to_string()))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| InfrastructureError::Clipboard(e.to_string()))
    }

    pub fn paste_text() -> InfrastructureResult<String> {
        let mut clipboard = Clipboard::new().map_err(|e| InfrastructureError::Clipboard(e.to_string()))?;
        let text = clipboard
            .get_text()
            .map_err(|e| InfrastructureError::Clipboard(e.to_string()))?;
        // only the first line fits in a cell
        Ok(text.lines().next().unwrap_or_default().to_string())
    }
}
