/*!
 * Init command: bootstrap the ledger database and configuration
 *
 * Creates the SQLite database with both ledger tables and their
 * append-only triggers, and optionally writes a starter config file.
 */

use std::path::Path;

use tracing::info;

use crate::config::CoreConfig;
use crate::error::Result;
use crate::store::Store;

/// Create the ledger database and optionally persist a config template.
pub fn run_init(config: &CoreConfig, write_config_to: Option<&Path>) -> Result<()> {
    let existed = config.db_path.exists();
    let _store = Store::open(&config.db_path, config.busy_timeout_ms)?;

    if existed {
        println!(
            "Ledger database already present at {} (schema verified)",
            config.db_path.display()
        );
    } else {
        println!("Ledger database created at {}", config.db_path.display());
    }
    info!(db_path = %config.db_path.display(), existed, "ledger initialized");

    if let Some(path) = write_config_to {
        config.to_file(path)?;
        println!("Configuration written to {}", path.display());
    }

    println!();
    println!("Next steps:");
    println!("  1. Record a mutation:  custodia record --help");
    println!("  2. Inspect the ledger: custodia events");
    println!("  3. Run an audit:       custodia audit");
    Ok(())
}
