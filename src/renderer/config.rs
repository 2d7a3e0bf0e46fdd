//! Configuration for template rendering

use crate::template::WhitespaceControl;

/// Configuration options for the render engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderConfig {
    /// Whitespace handling applied when templates are parsed
    pub whitespace: WhitespaceControl,
}

impl RenderConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the first newline after a block tag is dropped
    pub fn with_trim_blocks(mut self, trim: bool) -> Self {
        self.whitespace.trim_blocks = trim;
        self
    }

    /// Set whether indentation before a block tag is stripped
    pub fn with_lstrip_blocks(mut self, lstrip: bool) -> Self {
        self.whitespace.lstrip_blocks = lstrip;
        self
    }

    /// Set whether a single trailing newline is kept at the end of output
    pub fn with_keep_trailing_newline(mut self, keep: bool) -> Self {
        self.whitespace.keep_trailing_newline = keep;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert!(config.whitespace.trim_blocks);
        assert!(config.whitespace.lstrip_blocks);
        assert!(config.whitespace.keep_trailing_newline);
    }

    #[test]
    fn test_builder_pattern() {
        let config = RenderConfig::new()
            .with_trim_blocks(false)
            .with_lstrip_blocks(false)
            .with_keep_trailing_newline(false);

        assert!(!config.whitespace.trim_blocks);
        assert!(!config.whitespace.lstrip_blocks);
        assert!(!config.whitespace.keep_trailing_newline);
    }
}
