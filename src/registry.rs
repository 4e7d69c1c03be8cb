// File: src/registry.rs
use crate::core::types::{Parameters, ResolvedCommand};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What a handler receives when its command fires.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerContext {
    pub parameters: Parameters,
    /// Tokens of the segment that matched, as spoken.
    pub command: Vec<String>,
    /// The whole utterance the command was cut from.
    pub request: String,
}

impl From<&ResolvedCommand> for HandlerContext {
    fn from(resolved: &ResolvedCommand) -> Self {
        Self {
            parameters: resolved.parameters.clone(),
            command: resolved.matched_tokens.clone(),
            request: resolved.original_request_text.clone(),
        }
    }
}

/// A handler may return text to be spoken back.
pub type Handler = Arc<dyn Fn(&HandlerContext) -> Option<String> + Send + Sync>;

/// Action name to handler, filled by each plugin's own registration call.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Handler>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry").field("actions", &self.names()).finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `action`, replacing any previous one.
    pub fn register<F>(&mut self, action: impl Into<String>, handler: F)
    where
        F: Fn(&HandlerContext) -> Option<String> + Send + Sync + 'static,
    {
        self.handlers.insert(action.into(), Arc::new(handler));
    }

    pub fn get(&self, action: &str) -> Option<Handler> {
        self.handlers.get(action).cloned()
    }

    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_call() {
        let mut registry = ActionRegistry::new();
        registry.register("echo", |ctx| Some(ctx.command[1..].join(" ")));

        let handler = registry.get("echo").unwrap();
        let ctx = HandlerContext {
            parameters: Parameters::new(),
            command: vec!["say".into(), "hello".into(), "there".into()],
            request: "say hello there".into(),
        };
        assert_eq!(handler(&ctx), Some("hello there".to_string()));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_names_are_sorted() {
        let mut registry = ActionRegistry::new();
        registry.register("zoom", |_| None);
        registry.register("click", |_| None);
        assert_eq!(registry.names(), vec!["click", "zoom"]);
        assert!(registry.contains("zoom"));
    }
}
