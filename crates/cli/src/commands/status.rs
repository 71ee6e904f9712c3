//! `leash status` — Show resolved configuration.

use leash_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("Leash Status");
    println!("============");
    println!("  Config dir:    {}", AppConfig::config_dir().display());
    println!("  Provider:      {}", config.default_provider);
    println!("  Model:         {}", config.default_model);
    println!("  Temperature:   {}", config.default_temperature);
    println!("  Max tokens:    {}", config.default_max_tokens);
    println!("  Tool budget:   {} calls per conversation", config.limits.max_tool_calls);
    println!("  Hard ceiling:  {} loop iterations", config.limits.max_iterations);
    println!(
        "  API key:       {}",
        if config.has_api_key() { "configured" } else { "missing" }
    );
    println!(
        "  Search:        {}",
        if config.search.api_key.is_some() { "live (Tavily)" } else { "stub (no key)" }
    );
    println!(
        "  CRM bridge:    {}",
        if config.crm.is_configured() { "configured" } else { "not configured (tools omitted)" }
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found at {}", config_path.display());
    } else {
        println!("\n  No config file — defaults in effect. Example config:");
        println!();
        for line in AppConfig::default_toml().lines() {
            println!("    {line}");
        }
    }

    Ok(())
}
