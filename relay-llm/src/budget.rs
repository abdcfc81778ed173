use crate::client::LlmClient;
use crate::error::{LlmError, Result};
use crate::types::{ChatMessage, ChatResponse, Usage};
use serde::Serialize;

pub const DEFAULT_ALLOWANCE: u64 = 1_000_000;

/// Token-spend bookkeeping for one service/model pairing.
///
/// The budget goes on hold when the allowance is exhausted; `bump` raises
/// the allowance and lifts the hold.
#[derive(Debug, Clone)]
pub struct TokenBudget {
    tokens_in: u64,
    tokens_out: u64,
    allowance: u64,
    on_hold: bool,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWANCE)
    }
}

impl TokenBudget {
    pub fn new(allowance: u64) -> Self {
        Self {
            tokens_in: 0,
            tokens_out: 0,
            allowance,
            on_hold: allowance == 0,
        }
    }

    /// Record one response's token usage.
    pub fn record(&mut self, usage: &Usage) {
        self.tokens_in += u64::from(usage.prompt_tokens);
        self.tokens_out += u64::from(usage.completion_tokens);
        if self.remaining() == 0 && !self.on_hold {
            self.on_hold = true;
            tracing::warn!(
                tokens_in = self.tokens_in,
                tokens_out = self.tokens_out,
                "token budget exhausted; going on hold"
            );
        }
    }

    pub fn remaining(&self) -> u64 {
        self.allowance.saturating_sub(self.tokens_in + self.tokens_out)
    }

    pub fn is_available(&self) -> bool {
        !self.on_hold
    }

    /// Raise the allowance and lift the hold.
    pub fn bump(&mut self, extra: u64) {
        self.allowance += extra;
        if self.remaining() > 0 {
            self.on_hold = false;
        }
    }

    pub fn status(&self) -> BudgetStatus {
        BudgetStatus {
            tokens_in: self.tokens_in,
            tokens_out: self.tokens_out,
            remaining: self.remaining(),
            on_hold: self.on_hold,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub remaining: u64,
    pub on_hold: bool,
}

/// An [`LlmClient`] metered by a [`TokenBudget`].
pub struct BudgetedClient {
    client: LlmClient,
    budget: TokenBudget,
}

impl BudgetedClient {
    pub fn new(client: LlmClient, budget: TokenBudget) -> Self {
        Self { client, budget }
    }

    /// Chat through the underlying client, recording usage. Refused with
    /// `BudgetExhausted` while the budget is on hold.
    pub async fn chat(&mut self, messages: &[ChatMessage]) -> Result<ChatResponse> {
        if !self.budget.is_available() {
            return Err(LlmError::BudgetExhausted(format!(
                "model {} is on hold; bump the budget to resume",
                self.client.model()
            )));
        }

        let response = self.client.chat(messages).await?;
        self.budget.record(&response.usage);
        Ok(response)
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    pub fn budget_mut(&mut self) -> &mut TokenBudget {
        &mut self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_past_the_allowance_puts_the_budget_on_hold() {
        let mut budget = TokenBudget::new(100);
        budget.record(&Usage {
            prompt_tokens: 60,
            completion_tokens: 30,
        });
        assert!(budget.is_available());
        assert_eq!(budget.remaining(), 10);

        budget.record(&Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
        });
        assert!(!budget.is_available());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn bump_lifts_the_hold() {
        let mut budget = TokenBudget::new(10);
        budget.record(&Usage {
            prompt_tokens: 10,
            completion_tokens: 0,
        });
        assert!(!budget.is_available());

        budget.bump(1_000);
        assert!(budget.is_available());
        assert_eq!(budget.remaining(), 1_000);
    }

    #[test]
    fn a_zero_allowance_starts_on_hold() {
        let budget = TokenBudget::new(0);
        assert!(!budget.is_available());
    }

    #[test]
    fn status_snapshots_the_counters() {
        let mut budget = TokenBudget::new(1_000);
        budget.record(&Usage {
            prompt_tokens: 12,
            completion_tokens: 7,
        });

        let status = budget.status();
        assert_eq!(status.tokens_in, 12);
        assert_eq!(status.tokens_out, 7);
        assert_eq!(status.remaining, 981);
        assert!(!status.on_hold);
    }

    #[tokio::test]
    async fn an_exhausted_budget_refuses_to_chat() {
        let mut client = BudgetedClient::new(LlmClient::new("sk-test", "gpt-4"), TokenBudget::new(0));
        let err = client.chat(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LlmError::BudgetExhausted(_)));
    }
}
