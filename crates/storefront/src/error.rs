use orderwatch_core_types::Region;

/// Failure of a single storefront read.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// Credentials for the region are absent; raised before any request is made.
    #[error("{region} store credentials are not configured (missing {missing})")]
    Config { region: Region, missing: &'static str },

    #[error("{region} store API returned HTTP {status}: {body}")]
    Upstream {
        region: Region,
        status: u16,
        body: String,
    },

    #[error("{region} store request failed class={class} endpoint={endpoint}")]
    Transport {
        region: Region,
        class: &'static str,
        endpoint: String,
    },

    #[error("{region} store returned malformed orders: {detail}")]
    Decode { region: Region, detail: String },
}

impl StoreError {
    pub fn region(&self) -> Region {
        match self {
            Self::Config { region, .. }
            | Self::Upstream { region, .. }
            | Self::Transport { region, .. }
            | Self::Decode { region, .. } => *region,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Upstream { .. } => "upstream",
            Self::Transport { .. } => "transport",
            Self::Decode { .. } => "decode",
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Transport failures, throttling and server errors may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            Self::Config { .. } | Self::Decode { .. } => false,
        }
    }
}
