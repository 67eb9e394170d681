//! Event printers shared by both execution modes.

use k8swatcher::{K8sEventHandler, WatchEvent, WatcherError};
use std::io::Write;

/// Pretty JSON rendering of one event.
pub fn render(event: &WatchEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(event)
}

/// Write one event to stdout, holding the lock so concurrent printers do not interleave.
pub fn print_event(event: &WatchEvent) -> Result<(), WatcherError> {
    let rendered = render(event).map_err(|e| WatcherError::Handler(e.to_string()))?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "{rendered}")?;
    out.flush()?;
    Ok(())
}

/// Handler for the `asyncio-watch` mode.
#[derive(Debug, Default)]
pub struct PrintHandler;

#[async_trait::async_trait]
impl K8sEventHandler for PrintHandler {
    async fn handle(&self, event: WatchEvent) -> Result<(), WatcherError> {
        print_event(&event)
    }
}
