//! Built-in tool implementations for Leash.
//!
//! Three families of tools back the assistant:
//! - `search` — web search, degrading to an explanatory stub when no API
//!   key is configured
//! - `crm_*` — a bridge to a CRM integration process, silently omitted
//!   when credentials are absent
//! - `help` — a self-describing capability listing, always registered
//!
//! Registry assembly upholds one invariant: the registry is **never
//! empty**. An executor bound to zero tools changes model behavior
//! unpredictably, so even if every optional tool fails to configure, the
//! `help` tool is still there.

pub mod capabilities;
pub mod crm;
pub mod web_search;

use leash_config::{CrmConfig, SearchConfig};
use leash_core::tool::ToolRegistry;
use tracing::{info, warn};

pub use capabilities::HelpTool;
pub use crm::{CrmBridge, CrmDescribeTool, CrmQueryTool, CrmStatusTool};
pub use web_search::SearchTool;

/// Assemble the tool registry for a session.
///
/// Registration order is fixed: search, CRM tools (when configured),
/// help. Optional tools that fail to configure are skipped with a
/// warning — assembly itself never fails.
pub fn build_registry(search: &SearchConfig, crm: &CrmConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Box::new(SearchTool::from_config(search)));

    if crm.is_configured() {
        let bridge = CrmBridge::from_config(crm);
        registry.register(Box::new(CrmStatusTool::new(crm)));
        registry.register(Box::new(CrmQueryTool::new(bridge.clone())));
        registry.register(Box::new(CrmDescribeTool::new(bridge)));
        info!("CRM bridge configured, registered crm_status/crm_query/crm_describe");
    } else {
        warn!("CRM not configured, skipping CRM tools");
    }

    // Always last, and always present: the non-empty guarantee.
    let entries: Vec<(String, String)> = registry
        .definitions()
        .into_iter()
        .map(|d| (d.name, d.description))
        .collect();
    registry.register(Box::new(HelpTool::new(entries)));

    registry
}
