use std::path::PathBuf;

use de_vote::session::{LocalWallet, WalletSession, DEV_PRIVATE_KEYS};

fn temp_session_file() -> PathBuf {
    std::env::temp_dir().join(format!("de-vote-session-test-{}.json", uuid::Uuid::new_v4()))
}

fn dev_wallet() -> LocalWallet {
    LocalWallet::from_private_keys(&DEV_PRIVATE_KEYS).expect("Failed to load dev keys")
}

#[test]
fn test_connected_account_is_persisted_and_restored() {
    let path = temp_session_file();
    let wallet = dev_wallet();
    let second = wallet.accounts()[1];

    let mut session = WalletSession::new(Some(wallet.clone()), &path);
    assert_eq!(session.restore(), None);
    session.switch(second).expect("Failed to switch account");

    let raw = std::fs::read_to_string(&path).expect("Failed to read session file");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("Invalid session json");
    assert_eq!(json["connectedAccount"], second.to_string());

    let mut restarted = WalletSession::new(Some(wallet), &path);
    assert_eq!(restarted.restore(), Some(second));
    assert_eq!(restarted.connected(), Some(second));

    restarted.disconnect();
    assert!(!path.exists());
    assert_eq!(restarted.connected(), None);
}

#[test]
fn test_restore_drops_account_missing_from_wallet() {
    let path = temp_session_file();
    let mut session = WalletSession::new(Some(dev_wallet()), &path);
    session.connect(None).expect("Failed to connect");
    assert!(path.exists());

    let mut other = WalletSession::new(Some(LocalWallet::random(2)), &path);
    assert_eq!(other.restore(), None);
    assert!(!path.exists());
}

#[test]
fn test_restore_without_wallet_is_silent() {
    let path = temp_session_file();
    let mut session = WalletSession::new(Some(dev_wallet()), &path);
    session.connect(None).expect("Failed to connect");

    let mut no_wallet = WalletSession::new(None, &path);
    assert_eq!(no_wallet.restore(), None);
    assert!(no_wallet.accounts().is_err());
}

#[test]
fn test_corrupt_session_file_is_discarded() {
    let path = temp_session_file();
    std::fs::write(&path, "{ not json").expect("Failed to write session file");
    let mut session = WalletSession::new(Some(dev_wallet()), &path);
    assert_eq!(session.restore(), None);
    assert!(!path.exists());
}

#[test]
fn test_connect_defaults_to_first_account() {
    let path = temp_session_file();
    let wallet = dev_wallet();
    let first = wallet.accounts()[0];
    let mut session = WalletSession::new(Some(wallet), &path);
    assert_eq!(session.connect(None).expect("Failed to connect"), first);
    session.disconnect();
}
