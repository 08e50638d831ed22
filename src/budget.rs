//! Context-budget validation and conversation pruning.
//!
//! [`Pruner::prune`] runs a small state machine:
//!
//! ```text
//! Checking ──count < max──▶ Fits
//!    ▲   └───count >= max──▶ Overflowing ──drop oldest──┐
//!    └──────────────────────────────────────────────────┘
//! ```
//!
//! Each overflow drops `floor(overage × coefficient)` of the oldest messages,
//! where the coefficient starts at 0.01 and grows by 0.01 per step. The drop
//! offset is measured against the original conversation and accumulates. In
//! pin-first mode the original first message is always put back in front.

use thiserror::Error;

use crate::limits::ModelLimits;
use crate::message::ChatMessage;
use crate::tokenizer::{TokenCounter, TokenizerError};

/// Default cap on pruning steps before giving up.
pub const DEFAULT_MAX_ITERATIONS: usize = 200;

/// Coefficient is tracked in hundredths so `floor(overage × coefficient)` is
/// exact integer arithmetic.
const COEFFICIENT_START: usize = 1;
const COEFFICIENT_STEP: usize = 1;

#[derive(Error, Debug)]
pub enum BudgetError {
    #[error("The number of tokens ({count}) exceeds the maximum allowed ({max}).")]
    TokenBudgetExceeded { count: usize, max: usize },
    #[error(
        "Cannot fit conversation into {max} tokens: still {count} tokens across {remaining} messages after {iterations} pruning steps"
    )]
    CannotSatisfyBudget {
        iterations: usize,
        count: usize,
        max: usize,
        remaining: usize,
    },
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),
}

/// `Err(TokenBudgetExceeded)` when a limit exists and `count >= max`.
/// A count equal to the limit does not fit.
pub fn check_budget(count: usize, max: Option<usize>) -> Result<(), BudgetError> {
    match max {
        Some(max) if count >= max => Err(BudgetError::TokenBudgetExceeded { count, max }),
        _ => Ok(()),
    }
}

/// Validate a plain prompt against `model`'s limit. Returns the token count.
pub fn validate_prompt<C: TokenCounter + ?Sized>(
    counter: &C,
    limits: &ModelLimits,
    prompt: &str,
    model: &str,
) -> Result<usize, BudgetError> {
    let count = counter.count_text(prompt)?;
    check_budget(count, limits.max_tokens(model))?;
    Ok(count)
}

/// Validate a framed conversation against `model`'s limit. Returns the token
/// count.
pub fn validate_messages<C: TokenCounter + ?Sized>(
    counter: &C,
    limits: &ModelLimits,
    messages: &[ChatMessage],
    model: &str,
) -> Result<usize, BudgetError> {
    let count = counter.count_messages(messages)?;
    check_budget(count, limits.max_tokens(model))?;
    Ok(count)
}

/// One overflow handled by the pruner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneStep {
    /// Tokens over the limit (`count - max`).
    pub overage: usize,
    /// Messages dropped in this step.
    pub removed: usize,
    /// Removal coefficient used, in hundredths.
    pub coefficient: usize,
}

impl std::fmt::Display for PruneStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Max tokens exceeded by {}. Removing {} messages and retrying.",
            self.overage, self.removed
        )
    }
}

/// A conversation that fits its model's budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pruned {
    pub messages: Vec<ChatMessage>,
    pub steps: Vec<PruneStep>,
    /// Final token count; `None` when the model has no limit and nothing was
    /// measured.
    pub token_count: Option<usize>,
}

enum State {
    Checking,
    Overflowing { count: usize, max: usize },
    Fits { count: Option<usize> },
}

pub struct Pruner<'a, C: ?Sized> {
    counter: &'a C,
    limits: &'a ModelLimits,
    pin_first: bool,
    max_iterations: usize,
}

impl<'a, C: TokenCounter + ?Sized> Pruner<'a, C> {
    pub fn new(counter: &'a C, limits: &'a ModelLimits) -> Self {
        Pruner {
            counter,
            limits,
            pin_first: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Keep the original first message (usually the system prompt) in front.
    pub fn pin_first(mut self, pin: bool) -> Self {
        self.pin_first = pin;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Drop the oldest messages until the conversation fits `model`.
    ///
    /// Each overflowing step drops `floor(overage × coefficient)` messages,
    /// except when the count equals the limit exactly (overage 0): that step
    /// drops one message, and its [`PruneStep`] records `removed: 1`.
    ///
    /// Never reorders or edits messages and never returns more messages than
    /// it was given.
    pub fn prune(&self, model: &str, messages: &[ChatMessage]) -> Result<Pruned, BudgetError> {
        let max = self.limits.max_tokens(model);
        let mut current = messages.to_vec();
        let mut steps: Vec<PruneStep> = Vec::new();
        let mut offset = 0;
        let mut coefficient = COEFFICIENT_START;
        let mut state = State::Checking;

        loop {
            state = match state {
                State::Checking => match max {
                    None => State::Fits { count: None },
                    Some(max) => {
                        let count = self.counter.count_messages(&current)?;
                        match check_budget(count, Some(max)) {
                            Ok(()) => State::Fits { count: Some(count) },
                            Err(BudgetError::TokenBudgetExceeded { count, max }) => {
                                State::Overflowing { count, max }
                            }
                            Err(e) => return Err(e),
                        }
                    }
                },
                State::Overflowing { count, max } => {
                    if steps.len() >= self.max_iterations {
                        tracing::warn!(
                            model,
                            count,
                            max,
                            remaining = current.len(),
                            "giving up on pruning"
                        );
                        return Err(BudgetError::CannotSatisfyBudget {
                            iterations: steps.len(),
                            count,
                            max,
                            remaining: current.len(),
                        });
                    }
                    let overage = count - max;
                    // At exactly the limit no coefficient can drop anything,
                    // so drop the single oldest message.
                    let removed = if overage == 0 {
                        1
                    } else {
                        overage * coefficient / 100
                    };
                    let step = PruneStep {
                        overage,
                        removed,
                        coefficient,
                    };
                    tracing::debug!("{}", step);
                    steps.push(step);

                    offset = (offset + step.removed).min(messages.len());
                    current = self.retained(messages, offset);
                    coefficient += COEFFICIENT_STEP;
                    State::Checking
                }
                State::Fits { count } => {
                    return Ok(Pruned {
                        messages: current,
                        steps,
                        token_count: count,
                    })
                }
            };
        }
    }

    fn retained(&self, original: &[ChatMessage], offset: usize) -> Vec<ChatMessage> {
        let mut kept = Vec::with_capacity(original.len() - offset + 1);
        if self.pin_first && offset > 0 {
            if let Some(first) = original.first() {
                kept.push(first.clone());
            }
        }
        kept.extend_from_slice(&original[offset..]);
        kept
    }
}
