//! Response shapes returned by the Cosmos staking and gravity REST endpoints.

use serde::Deserialize;

pub const BONDED_VALIDATORS_PATH: &str = "/cosmos/staking/v1beta1/validators";
pub const DELEGATE_KEYS_PATH: &str = "/gravity/v1beta/query_delegate_keys_by_validator";
pub const EVENT_NONCE_PATH: &str = "/gravity/v1beta/oracle/eventnonce";
pub const BOND_STATUS_BONDED: &str = "BOND_STATUS_BONDED";

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorsResponse {
    pub validators: Vec<ValidatorEntry>,
    #[serde(default)]
    pub pagination: Option<PageResponse>,
}

impl ValidatorsResponse {
    /// Key for the next page, if the node reported one.
    pub fn next_key(&self) -> Option<&str> {
        self.pagination
            .as_ref()
            .and_then(|page| page.next_key.as_deref())
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorEntry {
    pub operator_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageResponse {
    #[serde(default)]
    pub next_key: Option<String>,
    #[serde(default)]
    pub total: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelegateKeysResponse {
    #[serde(default)]
    pub eth_address: String,
    #[serde(default)]
    pub orchestrator_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventNonceResponse {
    pub event_nonce: String,
}

impl EventNonceResponse {
    pub fn parse_nonce(&self) -> Option<u64> {
        self.event_nonce.trim().parse().ok()
    }
}
