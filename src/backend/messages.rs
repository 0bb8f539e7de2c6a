//! Message-only backend: services are skipped entirely

use super::Backend;

/// Style name
pub const STYLE: &str = "messages";

/// Backend implementing none of the RPC operations
#[derive(Debug, Default, Clone, Copy)]
pub struct MessagesBackend;

impl Backend for MessagesBackend {
    fn name(&self) -> &'static str {
        STYLE
    }
}
