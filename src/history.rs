//! Token-bounded conversation log. System turns are never evicted, so a
//! budget smaller than the system prompts alone stays exceeded.

use crate::model::{Message, MessageRole};
use crate::tokens::TokenCounter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: MessageRole,
    pub content: String,
    pub token_count: usize,
}

pub struct ConversationHistory<'a> {
    counter: &'a dyn TokenCounter,
    max_tokens: usize,
    system_prompts: Vec<String>,
    turns: Vec<Turn>,
    total_tokens: usize,
}

impl<'a> ConversationHistory<'a> {
    pub fn new(counter: &'a dyn TokenCounter, max_tokens: usize, system_prompts: Vec<String>) -> Self {
        let mut history = Self {
            counter,
            max_tokens,
            system_prompts,
            turns: Vec::new(),
            total_tokens: 0,
        };
        history.clear();
        history
    }

    pub fn add(&mut self, role: MessageRole, content: &str) {
        let content = match role {
            MessageRole::System => content.to_string(),
            MessageRole::User | MessageRole::Assistant => normalize(content),
        };
        let token_count = self.counter.count(&content);
        self.total_tokens += token_count;
        self.turns.push(Turn {
            role,
            content,
            token_count,
        });
        self.enforce_budget();
    }

    fn enforce_budget(&mut self) {
        while self.total_tokens > self.max_tokens {
            let Some(idx) = self
                .turns
                .iter()
                .position(|turn| turn.role != MessageRole::System)
            else {
                break;
            };
            let evicted = self.turns.remove(idx);
            self.total_tokens -= evicted.token_count;
        }
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.total_tokens = 0;
        let prompts = self.system_prompts.clone();
        for prompt in &prompts {
            self.add(MessageRole::System, prompt);
        }
    }

    pub fn get(&self) -> Vec<Message> {
        self.turns
            .iter()
            .map(|turn| Message {
                role: turn.role,
                content: turn.content.clone(),
            })
            .collect()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last_assistant_turn(&self) -> Option<&Turn> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role == MessageRole::Assistant)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
