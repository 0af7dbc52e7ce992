use async_trait::async_trait;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::{BlockSigner, SignOutcome};
use crate::domain::entities::StateBlock;
use crate::shared::constants::SIGNATURE_SIZE;
use crate::shared::error::WalletError;
use crate::shared::types::PublicKey;
use crate::shared::WalletResult;

/// Requests sent to a hardware device, correlated by account index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceRequest {
    AccountQuery { index: u32 },
    /// The frontier the next block extends, so the device can display and check it
    CachePrefill { index: u32, block: StateBlock },
    SignBlock { index: u32, block: StateBlock },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceResponse {
    Account { index: u32, public_key: PublicKey },
    CacheReady { index: u32 },
    Signature { index: u32, signature: [u8; SIGNATURE_SIZE] },
    /// The user rejected the request on the device
    Denied { index: u32 },
}

impl DeviceResponse {
    pub fn index(&self) -> u32 {
        match self {
            DeviceResponse::Account { index, .. }
            | DeviceResponse::CacheReady { index }
            | DeviceResponse::Signature { index, .. }
            | DeviceResponse::Denied { index } => *index,
        }
    }
}

/// Request/response channel to the device (USB, BLE, ...)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    async fn exchange(&self, request: DeviceRequest) -> WalletResult<DeviceResponse>;
}

pub struct HardwareSigner {
    transport: Arc<dyn DeviceTransport>,
    keys: Mutex<HashMap<u32, PublicKey>>,
}

impl HardwareSigner {
    pub fn new(transport: Arc<dyn DeviceTransport>) -> Self {
        Self {
            transport,
            keys: Mutex::new(HashMap::new()),
        }
    }

    async fn request(&self, index: u32, request: DeviceRequest) -> WalletResult<DeviceResponse> {
        let response = self.transport.exchange(request).await?;
        if response.index() != index {
            return Err(WalletError::crypto(format!(
                "Device answered for index {} while index {} was requested",
                response.index(),
                index
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl BlockSigner for HardwareSigner {
    async fn public_key(&self, index: u32) -> WalletResult<PublicKey> {
        let cached = self
            .keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&index)
            .copied();
        if let Some(key) = cached {
            return Ok(key);
        }

        match self.request(index, DeviceRequest::AccountQuery { index }).await? {
            DeviceResponse::Account { public_key, .. } => {
                self.keys
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(index, public_key);
                Ok(public_key)
            }
            DeviceResponse::Denied { .. } => Err(WalletError::SigningDenied(index)),
            other => Err(WalletError::crypto(format!("Unexpected device response {:?}", other))),
        }
    }

    async fn prepare(&self, index: u32, frontier: &StateBlock) -> WalletResult<()> {
        let request = DeviceRequest::CachePrefill { index, block: frontier.clone() };
        match self.request(index, request).await? {
            DeviceResponse::CacheReady { .. } => Ok(()),
            DeviceResponse::Denied { .. } => Err(WalletError::SigningDenied(index)),
            other => Err(WalletError::crypto(format!("Unexpected device response {:?}", other))),
        }
    }

    async fn sign(&self, index: u32, block: &StateBlock) -> WalletResult<SignOutcome> {
        info!("Waiting for device confirmation of block for index {}", index);
        let request = DeviceRequest::SignBlock { index, block: block.clone() };
        match self.request(index, request).await? {
            DeviceResponse::Signature { signature, .. } => Ok(SignOutcome::Signed(signature)),
            DeviceResponse::Denied { .. } => {
                warn!("Signing denied on device for index {}", index);
                Ok(SignOutcome::Denied)
            }
            other => Err(WalletError::crypto(format!("Unexpected device response {:?}", other))),
        }
    }
}
