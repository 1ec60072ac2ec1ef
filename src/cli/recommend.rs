//! Recommendation generation and learner responses

use clap::Subcommand;
use tutorflow_core::{
    error::Result, ContextSnapshot, EngineStore, Recommendation, RecommendationId,
    RecommendationStatus, ResponseOutcome, UserResponse,
};

use super::helpers::{parse_json_arg, print_json, CliContext};

#[derive(Subcommand)]
pub enum RecommendAction {
    /// Generate and store recommendations from a context snapshot
    Generate {
        #[arg(short, long)]
        user: String,

        /// Context snapshot JSON (inline or @file)
        #[arg(short, long)]
        context: String,
    },

    /// List a learner's recommendations
    List {
        #[arg(short, long)]
        user: String,

        /// pending, viewed, accepted, declined, dismissed or expired
        #[arg(short, long)]
        status: Option<String>,

        /// Print full JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark a recommendation as viewed
    View { id: String },

    /// Record a learner response
    Respond {
        id: String,

        /// accepted, declined, not_interested, later, already_known, ...
        #[arg(short, long)]
        response: String,

        /// Free-text feedback stored verbatim
        #[arg(short, long)]
        feedback: Option<String>,
    },

    /// Expire overdue pending/viewed recommendations now
    Sweep {
        /// Maximum recommendations to expire
        #[arg(short, long, default_value = "1000")]
        limit: usize,
    },
}

fn print_summary(recommendation: &Recommendation) {
    println!(
        "{}  [{}] {:<36} score {:>3}  {}  valid until {}",
        recommendation.id,
        recommendation.kind,
        recommendation.title,
        recommendation.overall_score(),
        recommendation.status(),
        recommendation.valid_until.format("%Y-%m-%d %H:%M")
    );
}

/// Handle recommend command
pub async fn handle(action: RecommendAction, ctx: &CliContext) -> Result<()> {
    let engine = ctx.open_engine().await?;

    match action {
        RecommendAction::Generate { user, context } => {
            let context: ContextSnapshot = parse_json_arg(&context, "context")?;
            let generated = engine.generate_recommendations(&user, &context).await?;
            if generated.is_empty() {
                println!("No recommendations for {}", user);
            }
            for recommendation in &generated {
                print_summary(recommendation);
            }
            Ok(())
        }
        RecommendAction::List { user, status, json } => {
            let status = status
                .map(|s| s.parse::<RecommendationStatus>())
                .transpose()?;
            let recommendations = engine.store().list_recommendations(&user, status).await?;
            if json {
                return print_json(&recommendations);
            }
            for recommendation in &recommendations {
                print_summary(recommendation);
            }
            Ok(())
        }
        RecommendAction::View { id } => {
            let id = RecommendationId::from_string(&id)?;
            let recommendation = engine.mark_viewed(&id).await?;
            print_summary(&recommendation);
            Ok(())
        }
        RecommendAction::Respond {
            id,
            response,
            feedback,
        } => {
            let id = RecommendationId::from_string(&id)?;
            let response: UserResponse = response.parse()?;
            let (recommendation, outcome) = engine.respond(&id, response, feedback).await?;
            match outcome {
                ResponseOutcome::Applied(status) => {
                    println!("Recommendation {} is now {}", recommendation.id, status)
                }
                ResponseOutcome::Stale => println!(
                    "Recommendation {} had already expired; response recorded as stale",
                    recommendation.id
                ),
            }
            Ok(())
        }
        RecommendAction::Sweep { limit } => {
            let expired = engine.sweep_expired(limit).await?;
            println!("Expired {} recommendation(s)", expired);
            Ok(())
        }
    }
}
