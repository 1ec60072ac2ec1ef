//! Adaptive rules: data model, condition evaluation, selection and
//! effectiveness tracking.
//!
//! # Flow
//!
//! 1. A `ContextSnapshot` is built for the learner
//! 2. `select_applicable` filters candidate rules (active, targeted,
//!    applicable, not cooling down) and keeps those whose `ConditionSet`
//!    matches
//! 3. Survivors are ranked by priority, ties in input order
//! 4. Applying a rule records its outcome, which stamps `last_triggered`
//!    and feeds the success rate back into candidate ordering

pub mod conditions;
pub mod content;
pub mod effectiveness;
pub mod rule;
pub mod selector;

pub use conditions::{
    all_match, matches, AdaptiveCondition, AiInteractionConditions, ConditionSet,
    EngagementConditions, HourWindow, Operator, PerformanceConditions, TimingConditions,
};
pub use content::{applicable_adaptations, ContentAction, ContentAdaptation};
pub use effectiveness::record_outcome;
pub use rule::{
    ActionSet, Applicability, ContentActions, DifficultyChange, Effectiveness,
    InterventionActions, PacingActions, PersonalityActions, Rule, RuleCategory,
    RuleConfiguration, RuleScope, TriggerType,
};
pub use selector::{exclusion_reason, select_applicable, Exclusion};
