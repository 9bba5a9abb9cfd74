//! Wallet accounts and the persisted connection.
//!
//! The wallet owns a set of local signers. The session tracks which of them is
//! connected and remembers it across restarts in a small JSON file keyed by
//! `connectedAccount`. A remembered account is only restored if the wallet
//! still holds it; nothing is ever connected without the user asking.

use std::{
    path::PathBuf,
    str::FromStr,
};

use alloy::{
    network::EthereumWallet,
    primitives::Address,
    signers::local::PrivateKeySigner,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Well-known development keys (anvil / hardhat accounts 0..2).
pub const DEV_PRIVATE_KEYS: [&str; 3] = [
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
];

#[derive(Clone, Debug)]
pub struct LocalWallet {
    signers: Vec<PrivateKeySigner>,
}

impl LocalWallet {
    pub fn from_private_keys<S: AsRef<str>>(keys: &[S]) -> Result<Self, SessionError> {
        let signers = keys
            .iter()
            .map(|k| PrivateKeySigner::from_str(k.as_ref().trim()))
            .collect::<Result<Vec<_>, _>>()?;
        if signers.is_empty() {
            return Err(SessionError::NoWallet);
        }
        Ok(Self { signers })
    }

    pub fn random(count: usize) -> Self {
        Self {
            signers: (0..count).map(|_| PrivateKeySigner::random()).collect(),
        }
    }

    pub fn accounts(&self) -> Vec<Address> {
        self.signers.iter().map(|s| s.address()).collect()
    }

    pub fn contains(&self, account: &Address) -> bool {
        self.signers.iter().any(|s| &s.address() == account)
    }

    /// All signers registered in one [`EthereumWallet`]; the first is the default.
    pub fn ethereum_wallet(&self) -> Result<EthereumWallet, SessionError> {
        let mut signers = self.signers.iter().cloned();
        let mut wallet = EthereumWallet::from(signers.next().ok_or(SessionError::NoWallet)?);
        for signer in signers {
            wallet.register_signer(signer);
        }
        Ok(wallet)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSession {
    #[serde(rename = "connectedAccount", skip_serializing_if = "Option::is_none")]
    connected_account: Option<String>,
}

pub struct WalletSession {
    wallet: Option<LocalWallet>,
    connected: Option<Address>,
    path: PathBuf,
}

impl WalletSession {
    pub fn new(wallet: Option<LocalWallet>, path: impl Into<PathBuf>) -> Self {
        Self {
            wallet,
            connected: None,
            path: path.into(),
        }
    }

    pub fn connected(&self) -> Option<Address> {
        self.connected
    }

    pub fn has_wallet(&self) -> bool {
        self.wallet.is_some()
    }

    pub fn accounts(&self) -> Result<Vec<Address>, SessionError> {
        self.wallet
            .as_ref()
            .map(LocalWallet::accounts)
            .ok_or(SessionError::NoWallet)
    }

    /// Silently restores the remembered account. The saved entry is dropped if
    /// the wallet no longer holds it or it cannot be read.
    pub fn restore(&mut self) -> Option<Address> {
        let saved = match self.load() {
            Ok(saved) => saved,
            Err(e) => {
                warn!("[restore] Discarding unreadable session file: {e}");
                self.clear_persisted();
                return None;
            }
        };
        let raw = saved.connected_account?;
        let account = match Address::from_str(&raw) {
            Ok(account) => account,
            Err(e) => {
                warn!("[restore] Discarding invalid account {raw}: {e}");
                self.clear_persisted();
                return None;
            }
        };
        match &self.wallet {
            Some(wallet) if wallet.contains(&account) => {
                info!("[restore] Restored connection to {account}");
                self.connected = Some(account);
                Some(account)
            }
            _ => {
                info!("[restore] Account {account} is no longer available");
                self.clear_persisted();
                None
            }
        }
    }

    /// Connects `account`, or the first wallet account when `None`.
    pub fn connect(&mut self, account: Option<Address>) -> Result<Address, SessionError> {
        let wallet = self.wallet.as_ref().ok_or(SessionError::NoWallet)?;
        let account = match account {
            Some(account) if wallet.contains(&account) => account,
            Some(account) => return Err(SessionError::UnknownAccount(account.to_string())),
            None => *wallet
                .accounts()
                .first()
                .ok_or(SessionError::NoWallet)?,
        };
        self.connected = Some(account);
        self.persist(account)?;
        info!("[connect] Connected {account}");
        Ok(account)
    }

    pub fn switch(&mut self, account: Address) -> Result<Address, SessionError> {
        let previous = self.connected;
        let account = self.connect(Some(account))?;
        info!("[switch] Account changed from {previous:?} to {account}");
        Ok(account)
    }

    pub fn disconnect(&mut self) {
        if let Some(account) = self.connected.take() {
            info!("[disconnect] Disconnected {account}");
        }
        self.clear_persisted();
    }

    fn load(&self) -> Result<PersistedSession, SessionError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedSession::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, account: Address) -> Result<(), SessionError> {
        let session = PersistedSession {
            connected_account: Some(account.to_string()),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&session)?)?;
        Ok(())
    }

    fn clear_persisted(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("[clear_persisted] Failed to remove {}: {e}", self.path.display());
            }
        }
    }
}
