//! Tutor prompt administration, selection and rendering

use clap::Subcommand;
use std::collections::HashMap;
use tutorflow_core::{
    error::Result, ContextSnapshot, EngineStore, Prompt, PromptContext, PromptId,
};

use super::helpers::{parse_json_arg, parse_key_values, print_json, CliContext};

#[derive(Subcommand)]
pub enum PromptAction {
    /// Add a prompt from JSON (inline or @file)
    Add { json: String },

    /// List prompts
    List {
        #[arg(short, long)]
        personality: Option<String>,

        /// explanation, hint, feedback, encouragement, assessment or general_chat
        #[arg(short = 't', long)]
        context_type: Option<String>,
    },

    /// Pick the prompt to use for a personality and context type
    Select {
        #[arg(short, long)]
        personality: String,

        #[arg(short = 't', long)]
        context_type: String,
    },

    /// Render a prompt with variable values
    Render {
        id: String,

        /// Variable value as key=value (repeatable)
        #[arg(short, long = "var")]
        vars: Vec<String>,

        /// Context snapshot JSON used for adaptations (inline or @file)
        #[arg(short, long)]
        context: Option<String>,
    },

    /// Record one use of a prompt
    Usage {
        id: String,

        /// Learner rating, 1 to 5
        #[arg(short, long)]
        rating: Option<u8>,

        /// The interaction did not help
        #[arg(long)]
        failed: bool,
    },

    /// Deactivate a prompt
    Disable { id: String },
}

/// Handle prompt command
pub async fn handle(action: PromptAction, ctx: &CliContext) -> Result<()> {
    let engine = ctx.open_engine().await?;

    match action {
        PromptAction::Add { json } => {
            let prompt: Prompt = parse_json_arg(&json, "prompt")?;
            let prompt = engine.add_prompt(prompt).await?;
            println!("Added prompt '{}' ({})", prompt.name, prompt.id);
            Ok(())
        }
        PromptAction::List {
            personality,
            context_type,
        } => {
            let context_type = context_type
                .map(|c| c.parse::<PromptContext>())
                .transpose()?;
            let prompts = engine
                .store()
                .list_prompts(personality.as_deref(), context_type)
                .await?;
            for prompt in prompts {
                println!(
                    "{}  {:<24} {:<12} {:<14} weight {:>5.1}  uses {:>4}  effectiveness {:>5.1}  {}",
                    prompt.id,
                    prompt.name,
                    prompt.personality,
                    prompt.context_type,
                    prompt.test_weight,
                    prompt.metrics.use_count,
                    prompt.metrics.effectiveness_score,
                    if prompt.is_active { "active" } else { "disabled" }
                );
            }
            Ok(())
        }
        PromptAction::Select {
            personality,
            context_type,
        } => {
            let context_type: PromptContext = context_type.parse()?;
            let prompt = engine.select_prompt(&personality, context_type).await?;
            print_json(&prompt)
        }
        PromptAction::Render { id, vars, context } => {
            let id = PromptId::from_string(&id)?;
            let values: HashMap<String, String> = parse_key_values(&vars)?.into_iter().collect();
            let context = match context {
                Some(raw) => parse_json_arg(&raw, "context")?,
                None => ContextSnapshot::at(&chrono::Local::now()),
            };
            let rendered = engine.render_prompt(&id, &values, &context).await?;
            println!("--- system ---\n{}\n--- user ---\n{}", rendered.system, rendered.user);
            Ok(())
        }
        PromptAction::Usage {
            id,
            rating,
            failed,
        } => {
            let id = PromptId::from_string(&id)?;
            let prompt = engine.record_prompt_usage(&id, rating, !failed).await?;
            let metrics = prompt.metrics;
            println!(
                "Prompt '{}': {} uses, avg rating {:.2}, success {:.1}%, effectiveness {:.1}",
                prompt.name,
                metrics.use_count,
                metrics.average_rating,
                metrics.success_rate,
                metrics.effectiveness_score
            );
            Ok(())
        }
        PromptAction::Disable { id } => {
            let id = PromptId::from_string(&id)?;
            engine.store().set_prompt_active(&id, false).await?;
            println!("Disabled prompt {}", id);
            Ok(())
        }
    }
}
