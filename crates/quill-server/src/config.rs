//! Coordinator configuration.

/// Configuration for the coordinator and its listener.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub bind_addr: String,
    /// Maximum number of sessions attached to one document.
    pub max_sessions_per_document: usize,
    /// Keep a blank line at the end of every document by appending a
    /// corrective revision after edits that remove it.
    pub blank_line_padding: bool,
    /// Text of newly created documents.
    pub default_text: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9001".to_string(),
            max_sessions_per_document: 64,
            blank_line_padding: false,
            default_text: String::new(),
        }
    }
}

/// Builder for server configuration.
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    pub fn max_sessions_per_document(mut self, max: usize) -> Self {
        self.config.max_sessions_per_document = max;
        self
    }

    pub fn blank_line_padding(mut self, enabled: bool) -> Self {
        self.config.blank_line_padding = enabled;
        self
    }

    pub fn default_text(mut self, text: impl Into<String>) -> Self {
        self.config.default_text = text.into();
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
