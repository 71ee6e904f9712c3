//! `leash chat` — Interactive or single-message chat mode.

use std::io::{BufRead, Write};
use std::sync::Arc;

use leash_agent::AgentLoop;
use leash_config::AppConfig;
use leash_core::event::EventBus;
use leash_core::message::{Conversation, Message};

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early — give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY      (for OpenAI direct)");
        eprintln!("    OPENROUTER_API_KEY  (for OpenRouter)");
        eprintln!("    LEASH_API_KEY       (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let agent = build_agent(&config)?;

    if let Some(msg) = message {
        // Single message mode
        let mut conv = Conversation::new();
        conv.push(Message::user(&msg));

        eprint!("  Thinking...");
        let response = agent.process(&mut conv).await?;
        eprint!("\r              \r");
        println!("{response}");
        return Ok(());
    }

    // Interactive mode
    let registry = leash_tools::build_registry(&config.search, &config.crm);
    println!();
    println!("  Leash — Interactive Mode");
    println!("  ------------------------");
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.default_model);
    println!("  Tools:        {}", registry.names().join(", "));
    println!(
        "  Limits:       {} tool calls / {} iterations",
        config.limits.max_tool_calls, config.limits.max_iterations
    );
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut conv = Conversation::new();
    let stdin = std::io::stdin();

    print!("  You > ");
    std::io::stdout().flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        conv.push(Message::user(input));

        eprint!("  ...");
        match agent.process(&mut conv).await {
            Ok(response) => {
                eprint!("\r     \r");
                println!();
                for out in response.lines() {
                    println!("  Assistant > {out}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

fn build_agent(config: &AppConfig) -> Result<AgentLoop, Box<dyn std::error::Error>> {
    let router = leash_providers::router::build_from_config(config);
    let provider = router.default().ok_or("No default provider configured")?;

    let tools = Arc::new(leash_tools::build_registry(&config.search, &config.crm));
    let event_bus = Arc::new(EventBus::default());

    let mut agent = AgentLoop::new(
        provider,
        &config.default_model,
        config.default_temperature,
        tools,
        event_bus,
    )
    .with_max_tokens(config.default_max_tokens)
    .with_max_tool_calls(config.limits.max_tool_calls)
    .with_max_iterations(config.limits.max_iterations);

    if let Some(prompt) = &config.system_prompt_override {
        agent = agent.with_system_prompt(prompt);
    }

    Ok(agent)
}
