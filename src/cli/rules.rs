//! Adaptation rule administration

use clap::Subcommand;
use tutorflow_core::{
    error::Result, EngineStore, Rule, RuleCategory, RuleId, RuleQuery,
};

use super::helpers::{parse_json_arg, print_json, CliContext};

#[derive(Subcommand)]
pub enum RuleAction {
    /// Add a rule from JSON (inline or @file)
    Add {
        /// Rule definition
        json: String,
    },

    /// List rules
    List {
        /// Only rules in this category
        #[arg(short, long)]
        category: Option<String>,

        /// Include disabled rules
        #[arg(long)]
        all: bool,

        /// Only rules that can apply to this learner
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show one rule by id or name
    Show { rule: String },

    /// Disable a rule (rules are never deleted)
    Disable { rule: String },

    /// Re-enable a rule
    Enable { rule: String },

    /// Record the outcome of applying a rule
    Outcome {
        rule: String,

        /// The adaptation helped the learner
        #[arg(long)]
        success: bool,
    },
}

/// Look a rule up by id, falling back to its unique name
async fn find_rule(store: &dyn EngineStore, key: &str) -> Result<Rule> {
    match RuleId::from_string(key) {
        Ok(id) => store.get_rule(&id).await,
        Err(_) => store.get_rule_by_name(key).await,
    }
}

/// Handle rule command
pub async fn handle(action: RuleAction, ctx: &CliContext) -> Result<()> {
    let engine = ctx.open_engine().await?;
    let store = engine.store().clone();

    match action {
        RuleAction::Add { json } => {
            let rule: Rule = parse_json_arg(&json, "rule")?;
            let rule = engine.add_rule(rule).await?;
            println!("Added rule '{}' ({})", rule.name, rule.id);
            Ok(())
        }
        RuleAction::List {
            category,
            all,
            user,
        } => {
            let category = category
                .map(|c| c.parse::<RuleCategory>())
                .transpose()?;
            let rules = store
                .list_rules(&RuleQuery {
                    category,
                    active_only: !all,
                    user_id: user,
                })
                .await?;

            if rules.is_empty() {
                println!("No rules found");
                return Ok(());
            }
            for rule in rules {
                println!(
                    "{}  {:<28} {:<20} priority {:>2}  success {:>5.1}%  {}",
                    rule.id,
                    rule.name,
                    rule.category,
                    rule.configuration.priority,
                    rule.success_rate(),
                    if rule.is_active { "active" } else { "disabled" }
                );
            }
            Ok(())
        }
        RuleAction::Show { rule } => {
            let rule = find_rule(store.as_ref(), &rule).await?;
            print_json(&rule)
        }
        RuleAction::Disable { rule } => {
            let rule = find_rule(store.as_ref(), &rule).await?;
            store.set_rule_active(&rule.id, false).await?;
            println!("Disabled rule '{}'", rule.name);
            Ok(())
        }
        RuleAction::Enable { rule } => {
            let rule = find_rule(store.as_ref(), &rule).await?;
            store.set_rule_active(&rule.id, true).await?;
            println!("Enabled rule '{}'", rule.name);
            Ok(())
        }
        RuleAction::Outcome { rule, success } => {
            let rule = find_rule(store.as_ref(), &rule).await?;
            let rule = engine.record_rule_outcome(&rule.id, success).await?;
            let effectiveness = rule.configuration.effectiveness;
            println!(
                "Rule '{}': {}/{} successful ({:.1}%)",
                rule.name,
                effectiveness.successful_adaptations,
                effectiveness.total_triggers,
                rule.success_rate()
            );
            Ok(())
        }
    }
}
