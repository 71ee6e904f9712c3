//! `leash doctor` — Diagnose configuration and connectivity.

use leash_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Leash Doctor — Diagnostics");
    println!("==========================\n");

    let mut issues = 0;

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  [ok]   Configuration valid");
            config
        }
        Err(e) => {
            println!("  [fail] Configuration invalid: {e}");
            return Err("Fix the configuration and run doctor again.".into());
        }
    };

    if config.has_api_key() {
        println!("  [ok]   Model API key configured");
    } else {
        println!("  [warn] No model API key — chat will not work");
        issues += 1;
    }

    if config.search.api_key.is_some() {
        println!("  [ok]   Search API key configured (live search)");
    } else {
        println!("  [warn] No search API key — search degrades to a stub");
        issues += 1;
    }

    if config.crm.is_configured() {
        println!("  [ok]   CRM bridge configured");
    } else {
        println!("  [info] CRM bridge not configured — CRM tools omitted");
    }

    // Registry assembly must always yield at least the help tool.
    let registry = leash_tools::build_registry(&config.search, &config.crm);
    if registry.is_empty() {
        println!("  [fail] Tool registry is empty");
        issues += 1;
    } else {
        println!("  [ok]   Tool registry: {}", registry.names().join(", "));
    }

    // Provider reachability
    if config.has_api_key() {
        let router = leash_providers::router::build_from_config(&config);
        match router.default() {
            Some(provider) => match provider.health_check().await {
                Ok(true) => {
                    println!("  [ok]   Provider '{}' reachable", provider.name());
                    match provider.list_models().await {
                        Ok(models) if !models.is_empty() => {
                            println!("  [ok]   {} models visible", models.len());
                        }
                        Ok(_) => println!("  [info] Provider lists no models"),
                        Err(e) => println!("  [warn] Model listing failed: {e}"),
                    }
                }
                Ok(false) | Err(_) => {
                    println!("  [warn] Provider '{}' not reachable", provider.name());
                    issues += 1;
                }
            },
            None => {
                println!("  [fail] No default provider configured");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
