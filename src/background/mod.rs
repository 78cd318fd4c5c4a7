pub mod removebg;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::scratch::{ScratchDir, ScratchFile};

pub use removebg::RemoveBgClient;

/// Replaces everything but the subject with a flat colour.
#[async_trait]
pub trait BackgroundReplacer: Send + Sync {
    /// Returns a new scratch file holding the processed image.
    async fn replace_background(&self, image_path: &Path, scratch: &ScratchDir)
        -> Result<ScratchFile>;

    fn provider_name(&self) -> &str;
}
