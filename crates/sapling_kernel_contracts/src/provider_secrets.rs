#![forbid(unsafe_code)]

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderSecretId {
    EsignApiKey,
    EsignClientId,
}

impl ProviderSecretId {
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::EsignApiKey => "SAPLING_ESIGN_API_KEY",
            Self::EsignClientId => "SAPLING_ESIGN_CLIENT_ID",
        }
    }
}
