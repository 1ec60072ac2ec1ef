//! Evaluate which rules apply to a learner right now

use tutorflow_core::{error::Result, ContextSnapshot};

use super::helpers::{parse_json_arg, print_json, CliContext};

/// Handle evaluate command
///
/// `context_json` is a context snapshot; omitted hour and weekday default
/// to the local clock.
pub async fn handle(user: String, context_json: String, json: bool, ctx: &CliContext) -> Result<()> {
    let context: ContextSnapshot = parse_json_arg(&context_json, "context")?;
    let engine = ctx.open_engine().await?;
    let selected = engine.evaluate_rules(&user, &context).await?;

    if json {
        return print_json(&selected);
    }

    if selected.is_empty() {
        println!("No rules apply to {}", user);
        return Ok(());
    }

    println!("{} rule(s) apply to {}:", selected.len(), user);
    for (i, rule) in selected.iter().enumerate() {
        println!(
            "  {}. {} (priority {}, {})",
            i + 1,
            rule.name,
            rule.configuration.priority,
            rule.category
        );
        println!("     actions: {}", serde_json::to_string(&rule.actions)?);
    }
    Ok(())
}
