//! `leash tools` — List the assembled tool registry.

use leash_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = leash_tools::build_registry(&config.search, &config.crm);

    println!("Available tools ({})", registry.len());
    println!("====================");
    for def in registry.definitions() {
        println!("  {:<14} {}", def.name, def.description);
    }

    Ok(())
}
