//! One handler per sub-command. Handlers write their report to `out`.

use crate::config::Config;
use crate::directory::{Directory, DIRECTORY_FILE};
use anyhow::{anyhow, bail, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use wallet::{
    constructor_args, create_account, delete_account, import_account, parse_address, Address,
    HttpConnector, KeyVault, Wallet, DEFAULT_TOKEN_SYMBOL, U256,
};

/// Compiled token contract, hex encoded.
const TOKEN_BYTECODE: &str = include_str!("../contracts/mytoken.bin");

/// Vault and directory for one data directory.
///
/// The directory database is opened per operation and closed again before
/// any key derivation or network round trip, so concurrent invocations only
/// contend for it briefly.
pub struct App {
    config: Config,
    vault: KeyVault,
    directory_path: PathBuf,
}

impl App {
    pub fn open(config: Config) -> Result<Self> {
        let vault = KeyVault::open(&config.data_dir)
            .with_context(|| format!("opening vault in {}", config.data_dir.display()))?
            .with_kdf_params(config.kdf_params()?);
        let directory_path = config.data_dir.join(DIRECTORY_FILE);

        Ok(App {
            config,
            vault,
            directory_path,
        })
    }

    fn directory(&self) -> Result<Directory> {
        Directory::open(&self.directory_path).context("opening account directory")
    }

    fn ensure_name_free(&self, name: &str) -> Result<()> {
        if !name.is_empty() && self.directory()?.exists(name)? {
            bail!("name already in use: {}", name);
        }
        Ok(())
    }

    fn register(&self, name: &str, address: &Address) -> Result<String> {
        let name = if name.is_empty() {
            address.to_checksum(None)
        } else {
            name.to_string()
        };
        let directory = self.directory()?;
        if directory.exists(&name)? {
            bail!("name already in use: {}", name);
        }
        directory.put(&name, address)?;
        Ok(name)
    }

    /// Register a freshly stored account, removing it from the vault again
    /// if the name cannot be recorded.
    fn register_or_discard(
        &self,
        name: &str,
        address: &Address,
        passphrase: &str,
    ) -> Result<String> {
        self.register(name, address).map_err(|e| {
            if let Err(discard) = self.vault.delete(passphrase, address) {
                log::warn!(
                    "Could not remove unregistered account {}: {}",
                    address.to_checksum(None),
                    discard
                );
            }
            e.context("registering account name")
        })
    }

    fn lookup(&self, name: &str) -> Result<Address> {
        self.directory()?
            .get(name)
            .with_context(|| format!("looking up account {:?}", name))
    }

    fn load(&self, name: &str, passphrase: &str) -> Result<Wallet<HttpConnector>> {
        let address = self.lookup(name)?;
        let wallet = Wallet::load(self.vault.clone(), address, passphrase, self.config.node())?
            .with_connector(HttpConnector::new(self.config.request_timeout()));
        Ok(wallet)
    }

    pub fn create(&self, out: &mut dyn Write, passphrase: &str, name: &str) -> Result<()> {
        self.ensure_name_free(name)?;
        let created = create_account(&self.vault, passphrase).context("creating account")?;
        let name = self.register_or_discard(name, &created.account.address, passphrase)?;

        writeln!(out, "Created account {}", name)?;
        writeln!(out, "Address: {}", created.account.address.to_checksum(None))?;
        writeln!(out, "Recovery phrase (write it down, it is not stored):")?;
        writeln!(out, "{}", created.mnemonic)?;
        Ok(())
    }

    pub fn show(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "Wallet List")?;
        writeln!(out)?;
        writeln!(out, "\tName \tAddress")?;
        writeln!(out, "----------------------------------")?;
        for (name, address) in self.directory()?.list_all()? {
            writeln!(out, "\t{} \t{}", name, address.to_checksum(None))?;
        }
        Ok(())
    }

    pub fn delete(&self, out: &mut dyn Write, passphrase: &str, name: &str) -> Result<()> {
        let address = self.lookup(name)?;
        delete_account(&self.vault, passphrase, &address).context("deleting account")?;
        self.directory()?.delete(name)?;

        writeln!(out, "Deleted account {}", name)?;
        Ok(())
    }

    pub fn import(&self, out: &mut dyn Write, passphrase: &str, name: &str, words: &str) -> Result<()> {
        self.ensure_name_free(name)?;
        let account = import_account(&self.vault, words, passphrase).context("importing account")?;
        let name = self.register_or_discard(name, &account.address, passphrase)?;

        writeln!(out, "Imported account {}", name)?;
        writeln!(out, "Address: {}", account.address.to_checksum(None))?;
        Ok(())
    }

    pub fn balance(&self, out: &mut dyn Write, passphrase: &str, name: &str) -> Result<()> {
        let wallet = self.load(name, passphrase)?;
        let balance = wallet.balance().context("querying balance")?;
        writeln!(out, "Balance: {}", balance)?;
        Ok(())
    }

    pub fn transfer(
        &self,
        out: &mut dyn Write,
        passphrase: &str,
        name: &str,
        to: &str,
        value: &str,
    ) -> Result<()> {
        let wallet = self.load(name, passphrase)?;
        let hash = wallet.transfer_native(to, value).context("transfer failed")?;
        writeln!(out, "Transfer submitted: {}", hash)?;
        Ok(())
    }

    pub fn deploy_token(&self, out: &mut dyn Write, passphrase: &str, name: &str) -> Result<()> {
        let bytecode = hex::decode(TOKEN_BYTECODE.trim()).context("decoding token bytecode")?;
        let wallet = self.load(name, passphrase)?;
        let deployment = wallet
            .token()
            .deploy(&bytecode, &constructor_args(DEFAULT_TOKEN_SYMBOL))
            .context("deploying token")?;

        writeln!(out, "Token Address: {}", deployment.contract_address.to_checksum(None))?;
        writeln!(out, "Transaction: {}", deployment.tx_hash)?;
        Ok(())
    }

    pub fn mint_token(
        &self,
        out: &mut dyn Write,
        passphrase: &str,
        name: &str,
        to: &str,
        value: &str,
    ) -> Result<()> {
        let contract = self.config.token_address()?;
        let to = parse_address(to)?;
        let amount = parse_token_amount(value)?;

        let wallet = self.load(name, passphrase)?;
        let hash = wallet
            .token()
            .mint(contract, to, amount)
            .context("minting token")?;
        writeln!(out, "Transaction: {}", hash)?;
        Ok(())
    }

    pub fn send_token(
        &self,
        out: &mut dyn Write,
        passphrase: &str,
        name: &str,
        to: &str,
        value: &str,
    ) -> Result<()> {
        let contract = self.config.token_address()?;
        let to = parse_address(to)?;
        let amount = parse_token_amount(value)?;

        let wallet = self.load(name, passphrase)?;
        let hash = wallet
            .token()
            .transfer_token(contract, to, amount)
            .context("sending token")?;
        writeln!(out, "Transaction: {}", hash)?;
        Ok(())
    }

    pub fn balance_token(&self, out: &mut dyn Write, name: &str) -> Result<()> {
        let contract = self.config.token_address()?;
        // read-only call, no passphrase needed
        let wallet = self.load(name, "")?;
        let balance = wallet
            .token()
            .balance_of(contract, wallet.address())
            .context("querying token balance")?;
        writeln!(out, "Balance Token: {}", balance)?;
        Ok(())
    }
}

/// Raw token units: a non-negative decimal integer.
fn parse_token_amount(value: &str) -> Result<U256> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        bail!("invalid token amount {:?}: expected a whole number", value);
    }
    U256::from_str_radix(value, 10).map_err(|_| anyhow!("token amount too large: {}", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const ABANDON_ADDRESS: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";

    fn test_app() -> (TempDir, App) {
        let dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            kdf: "light".to_string(),
            eth_url: "http://127.0.0.1:1".to_string(),
            request_timeout_secs: 2,
            ..Config::default()
        };
        let app = App::open(config).unwrap();
        (dir, app)
    }

    fn output(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_bundled_bytecode_decodes() {
        let bytecode = hex::decode(TOKEN_BYTECODE.trim()).unwrap();
        assert!(!bytecode.is_empty());
    }

    #[test]
    fn test_import_and_show() {
        let (_dir, app) = test_app();
        let mut out = Vec::new();
        app.import(&mut out, "pass", "alice", ABANDON).unwrap();
        assert!(output(out).contains(ABANDON_ADDRESS));

        let mut out = Vec::new();
        app.show(&mut out).unwrap();
        let listing = output(out);
        assert!(listing.contains("alice"));
        assert!(listing.contains(ABANDON_ADDRESS));
    }

    #[test]
    fn test_empty_name_defaults_to_address() {
        let (_dir, app) = test_app();
        app.import(&mut Vec::new(), "pass", "", ABANDON).unwrap();
        assert!(app.directory().unwrap().exists(ABANDON_ADDRESS).unwrap());
    }

    #[test]
    fn test_duplicate_name_rejected_before_keygen() {
        let (_dir, app) = test_app();
        app.import(&mut Vec::new(), "pass", "alice", ABANDON).unwrap();

        assert!(app.create(&mut Vec::new(), "pass", "alice").is_err());
        assert_eq!(app.vault.list().unwrap().len(), 1);
    }

    #[test]
    fn test_create_prints_phrase() {
        let (_dir, app) = test_app();
        let mut out = Vec::new();
        app.create(&mut out, "pass", "bob").unwrap();

        let address = app.directory().unwrap().get("bob").unwrap();
        assert!(app.vault.contains(&address));
        let text = output(out);
        let phrase = text.lines().last().unwrap();
        assert_eq!(phrase.split_whitespace().count(), 24);
    }

    #[test]
    fn test_delete_requires_passphrase() {
        let (_dir, app) = test_app();
        app.import(&mut Vec::new(), "pass", "alice", ABANDON).unwrap();

        assert!(app.delete(&mut Vec::new(), "wrong", "alice").is_err());
        assert!(app.directory().unwrap().exists("alice").unwrap());

        app.delete(&mut Vec::new(), "pass", "alice").unwrap();
        assert!(!app.directory().unwrap().exists("alice").unwrap());
        assert!(app.vault.list().unwrap().is_empty());
    }

    #[test]
    fn test_transfer_unreachable_node() {
        let (_dir, app) = test_app();
        app.import(&mut Vec::new(), "pass", "alice", ABANDON).unwrap();
        let result = app.transfer(
            &mut Vec::new(),
            "pass",
            "alice",
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "1.0",
        );
        assert!(result.is_err());
        assert!(app.directory().unwrap().exists("alice").unwrap());
        assert_eq!(app.vault.list().unwrap().len(), 1);
    }

    #[test]
    fn test_token_commands_need_contract_address() {
        let (_dir, app) = test_app();
        app.import(&mut Vec::new(), "pass", "alice", ABANDON).unwrap();
        assert!(app.balance_token(&mut Vec::new(), "alice").is_err());
    }

    #[test]
    fn test_parse_token_amount() {
        assert_eq!(parse_token_amount("1000").unwrap(), U256::from(1000u32));
        assert!(parse_token_amount("1.5").is_err());
        assert!(parse_token_amount("-1").is_err());
        assert!(parse_token_amount("").is_err());
    }

    #[test]
    fn test_name_clash_after_store_discards_account() {
        let (_dir, app) = test_app();
        let address = parse_address(ABANDON_ADDRESS).unwrap();
        // another account already goes by this address's default name
        app.directory()
            .unwrap()
            .put(ABANDON_ADDRESS, &Address::repeat_byte(0x01))
            .unwrap();

        assert!(app.import(&mut Vec::new(), "pass", "", ABANDON).is_err());
        assert!(!app.vault.contains(&address));
        assert!(app.vault.list().unwrap().is_empty());

        // the phrase can be imported again under a free name
        app.import(&mut Vec::new(), "pass", "alice", ABANDON).unwrap();
        assert_eq!(app.directory().unwrap().get("alice").unwrap(), address);
    }

    #[test]
    fn test_directory_released_between_commands() {
        let (dir, app) = test_app();
        app.import(&mut Vec::new(), "pass", "alice", ABANDON).unwrap();

        // a second process can open the directory while this one is alive
        let other = Directory::open_with_timeout(
            dir.path().join(DIRECTORY_FILE),
            std::time::Duration::from_millis(200),
        )
        .unwrap();
        assert!(other.exists("alice").unwrap());
        drop(other);

        let second = App::open(Config {
            data_dir: dir.path().to_path_buf(),
            kdf: "light".to_string(),
            ..Config::default()
        })
        .unwrap();
        let mut out = Vec::new();
        second.show(&mut out).unwrap();
        app.show(&mut Vec::new()).unwrap();
        assert!(output(out).contains("alice"));
    }
}
