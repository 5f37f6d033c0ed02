//! Previous question/answer exchanges of one host session.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{Answer, ConversationTurn};

/// Exchanges kept in memory; only the most recent few are ever sent.
const MAX_EXCHANGES: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

/// Rolling window of exchanges.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    exchanges: VecDeque<Exchange>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, question: impl Into<String>, answer: &Answer) {
        self.exchanges.push_back(Exchange {
            question: question.into(),
            answer: answer.answer.clone(),
        });
        while self.exchanges.len() > MAX_EXCHANGES {
            self.exchanges.pop_front();
        }
    }

    /// User/assistant turns for the last `n` exchanges, oldest first.
    pub fn recent_turns(&self, n: usize) -> Vec<ConversationTurn> {
        let skip = self.exchanges.len().saturating_sub(n);
        self.exchanges
            .iter()
            .skip(skip)
            .flat_map(|e| {
                [
                    ConversationTurn::user(e.question.clone()),
                    ConversationTurn::assistant(e.answer.clone()),
                ]
            })
            .collect()
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }
}
