use wallet::{
    create_account, import_account, list_accounts, KdfParams, KeyVault, UnsignedTransaction, U256,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== ethkeep Vault Example ===\n");

    let dir = std::env::temp_dir().join(format!("ethkeep-example-{}", std::process::id()));
    let vault = KeyVault::open(&dir)?.with_kdf_params(KdfParams::light());
    println!("Vault directory: {}\n", dir.display());

    // Create a new account
    println!("Creating account...");
    let created = create_account(&vault, "example passphrase")?;
    println!("✓ Address: {}", created.account.address.to_checksum(None));
    println!("  Recovery phrase ({} words): {}\n", created.mnemonic.word_count(), created.mnemonic);

    // Import the well-known test phrase
    println!("Importing test account...");
    let imported = import_account(
        &vault,
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
        "example passphrase",
    )?;
    println!("✓ Address: {}\n", imported.address.to_checksum(None));

    println!("Accounts in vault:");
    for address in list_accounts(&vault)? {
        println!("  {}", address.to_checksum(None));
    }
    println!();

    // Sign a transfer offline
    println!("Signing 1 ETH transfer on chain 1337...");
    let key = vault.unlock("example passphrase", &imported.address)?;
    let tx = UnsignedTransaction::native_transfer(
        1337,
        0,
        1_000_000_000,
        created.account.address,
        U256::from(1_000_000_000_000_000_000u128),
    );
    let signed = tx.sign(&key)?;
    println!("✓ Transaction hash: {}", signed.hash);
    println!("  Raw: 0x{}\n", hex::encode(&signed.raw));

    std::fs::remove_dir_all(&dir)?;
    println!("=== Example Complete ===");
    Ok(())
}
