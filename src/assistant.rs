// File: src/assistant.rs
use crate::config::{AnswersConfig, Config, TriggerMode};
use crate::core::engine::{CommandEngine, Interpretation};
use crate::core::types::{tokenize, ResolvedCommand};
use crate::registry::{ActionRegistry, HandlerContext};
use rand::seq::SliceRandom;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action name that replays the previous request instead of reaching a handler.
pub const REPEAT_ACTION: &str = "repeat";

/// Text-to-speech boundary.
pub trait Speaker: Send + Sync {
    fn say(&self, text: &str);
}

/// Called when an utterance holds no command at all, e.g. to forward it to a chat model.
pub trait Fallback: Send + Sync {
    fn respond(&self, request: &str) -> Option<String>;
}

/// Fallback that stays quiet.
pub struct Silence;

impl Fallback for Silence {
    fn respond(&self, _request: &str) -> Option<String> {
        None
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// A trigger word was required and absent, or nothing was said.
    Ignored,
    /// Only the trigger word was heard.
    Greeted,
    /// No word opened a command; the fallback answered (or not).
    Fallback { reply: Option<String> },
    /// Segments were found but none named a registered command.
    Unresolved,
    /// Handlers were started, one thread each, in utterance order.
    Dispatched {
        commands: Vec<ResolvedCommand>,
        handles: Vec<JoinHandle<()>>,
    },
}

impl Outcome {
    /// Waits for every started handler. Returns the dispatched commands.
    pub fn wait(self) -> Vec<ResolvedCommand> {
        match self {
            Outcome::Dispatched { commands, handles } => {
                for handle in handles {
                    if handle.join().is_err() {
                        warn!("a command handler panicked");
                    }
                }
                commands
            }
            _ => Vec::new(),
        }
    }
}

/// Returns the words following the first trigger phrase found in `text`.
pub fn strip_trigger(text: &str, triggers: &[String]) -> Option<String> {
    let words = tokenize(text);
    for trigger in triggers {
        let trigger = tokenize(trigger);
        if trigger.is_empty() || trigger.len() > words.len() {
            continue;
        }
        if let Some(start) = words.windows(trigger.len()).position(|w| w == trigger.as_slice()) {
            return Some(words[start + trigger.len()..].join(" "));
        }
    }
    None
}

/// Caller side of the engine: decides what to say, logs, and runs handlers.
pub struct Assistant {
    engine: Arc<RwLock<CommandEngine>>,
    registry: ActionRegistry,
    speaker: Arc<dyn Speaker>,
    fallback: Box<dyn Fallback>,
    answers: AnswersConfig,
    trigger_words: Vec<String>,
    trigger_mode: TriggerMode,
    trigger_window: Duration,
    trigger_free_until: Option<Instant>,
    history: VecDeque<String>,
    history_size: usize,
}

impl Assistant {
    pub fn new(
        engine: Arc<RwLock<CommandEngine>>,
        registry: ActionRegistry,
        speaker: Arc<dyn Speaker>,
        config: &Config,
    ) -> Self {
        Self {
            engine,
            registry,
            speaker,
            fallback: Box::new(Silence),
            answers: config.answers.clone(),
            trigger_words: config.trigger.words.clone(),
            trigger_mode: config.trigger.mode,
            trigger_window: Duration::from_secs(config.trigger.timed_seconds),
            trigger_free_until: None,
            history: VecDeque::with_capacity(config.history.max_length),
            history_size: config.history.max_length,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn Fallback>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn history(&self) -> &VecDeque<String> {
        &self.history
    }

    /// Entry point for raw recognized text: applies the trigger policy first.
    pub fn hear(&mut self, text: &str) -> Outcome {
        match self.trigger_mode {
            TriggerMode::Disabled => self.handle(text),
            TriggerMode::Always => match strip_trigger(text, &self.trigger_words) {
                Some(request) => self.handle(&request),
                None => Outcome::Ignored,
            },
            TriggerMode::Timed => {
                let now = Instant::now();
                let stripped = strip_trigger(text, &self.trigger_words);
                if self.trigger_free_until.is_some_and(|until| now < until) {
                    let request = stripped.unwrap_or_else(|| text.to_string());
                    return self.handle(&request);
                }
                match stripped {
                    Some(request) => {
                        self.trigger_free_until = Some(now + self.trigger_window);
                        info!(seconds = self.trigger_window.as_secs(), "trigger window opened");
                        self.handle(&request)
                    }
                    None => Outcome::Ignored,
                }
            }
        }
    }

    /// Handles an already trigger-stripped request.
    pub fn handle(&mut self, request: &str) -> Outcome {
        let request = request.trim();
        if request.is_empty() {
            if self.trigger_mode == TriggerMode::Disabled {
                return Outcome::Ignored;
            }
            self.say_one_of(&self.answers.default);
            return Outcome::Greeted;
        }

        let interpretation = self.read_engine().interpret(request);
        let previous = self.history.back().cloned();
        // Requests asking for a repeat are not recorded, so a replay never replays itself.
        if !interpretation.commands.iter().any(|c| c.action == REPEAT_ACTION) {
            self.remember(request);
        }
        self.process(request, interpretation, previous.as_deref())
    }

    fn process(&self, request: &str, interpretation: Interpretation, previous: Option<&str>) -> Outcome {
        if interpretation.is_unrecognized() {
            let reply = self.fallback.respond(request);
            if let Some(text) = &reply {
                self.speaker.say(text);
            }
            return Outcome::Fallback { reply };
        }

        let mut multi = interpretation.is_multi();
        let mut commands = Vec::with_capacity(interpretation.commands.len());
        for command in interpretation.commands {
            if command.action != REPEAT_ACTION {
                commands.push(command);
                continue;
            }
            // A repeat takes the place of the previous request's commands.
            let Some(previous) = previous else {
                debug!("nothing to repeat");
                continue;
            };
            info!(request = %previous, "repeating previous request");
            let replay = self.read_engine().interpret(previous);
            multi |= replay.is_multi();
            commands.extend(replay.commands.into_iter().filter(|c| c.action != REPEAT_ACTION));
        }
        if commands.is_empty() {
            debug!(request, "segments resolved to no command");
            return Outcome::Unresolved;
        }

        if multi {
            self.say_one_of(&self.answers.multi);
        }

        let mut handles = Vec::with_capacity(commands.len());
        for command in &commands {
            if let Some(handle) = self.dispatch(command, multi) {
                handles.push(handle);
            }
        }
        Outcome::Dispatched { commands, handles }
    }

    /// Speak, log, then run the handler on its own thread.
    fn dispatch(&self, command: &ResolvedCommand, multi: bool) -> Option<JoinHandle<()>> {
        let Some(handler) = self.registry.get(&command.action) else {
            warn!(action = %command.action, "no handler registered for action");
            return None;
        };

        let confirmed = if multi || command.inside_speech {
            false
        } else {
            self.say_one_of(&command.responses)
        };
        info!(action = %command.action, command = %command.matched_tokens.join(" "), "dispatching command");

        let speak_output = !multi && !confirmed;
        let context = HandlerContext::from(command);
        let speaker = Arc::clone(&self.speaker);
        let spawned = thread::Builder::new()
            .name(format!("handler-{}", command.action))
            .spawn(move || {
                if let Some(text) = handler(&context) {
                    if speak_output {
                        speaker.say(&text);
                    }
                }
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(action = %command.action, error = %err, "could not start handler thread");
                None
            }
        }
    }

    fn say_one_of(&self, lines: &[String]) -> bool {
        match lines.choose(&mut rand::thread_rng()) {
            Some(line) => {
                self.speaker.say(line);
                true
            }
            None => false,
        }
    }

    fn remember(&mut self, request: &str) {
        if self.history_size == 0 {
            return;
        }
        if self.history.len() == self.history_size {
            self.history.pop_front();
        }
        self.history.push_back(request.to_string());
    }

    fn read_engine(&self) -> std::sync::RwLockReadGuard<'_, CommandEngine> {
        self.engine.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HistoryConfig, TriggerConfig};
    use crate::core::segmenter::SegmentationConfig;
    use crate::core::types::CommandDefinition;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<String>>,
    }

    impl Speaker for Recorder {
        fn say(&self, text: &str) {
            self.lines.lock().unwrap().push(text.to_string());
        }
    }

    impl Recorder {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    struct Echo;

    impl Fallback for Echo {
        fn respond(&self, request: &str) -> Option<String> {
            Some(format!("you said {request}"))
        }
    }

    fn config(mode: TriggerMode) -> Config {
        Config {
            trigger: TriggerConfig { words: vec!["hey stewart".into()], mode, timed_seconds: 60 },
            answers: AnswersConfig { default: vec!["Yes?".into()], multi: vec!["On it".into()] },
            history: HistoryConfig { max_length: 2 },
            ..Config::default()
        }
    }

    fn assistant(mode: TriggerMode) -> (Assistant, Arc<Recorder>, Arc<Mutex<Vec<String>>>) {
        let mut engine = CommandEngine::new(SegmentationConfig {
            slurp_rest: ["say".to_string()].into_iter().collect(),
            ..SegmentationConfig::default()
        });
        engine
            .load(&[
                CommandDefinition::new(["open", "browser"], "browser_open").with_responses(["Opening"]),
                CommandDefinition::new(["say"], "say").with_inside_speech(true),
                CommandDefinition::new(["time"], "tell_time"),
                CommandDefinition::new(["click"], "click").with_responses(["Clicked"]),
                CommandDefinition::new(["again"], REPEAT_ACTION),
                CommandDefinition::new(["dance"], "dance"),
                CommandDefinition::new(["scroll"], "scroll"),
            ])
            .unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ActionRegistry::new();
        for action in ["browser_open", "click", "scroll"] {
            let calls = Arc::clone(&calls);
            registry.register(action, move |ctx| {
                calls.lock().unwrap().push(ctx.command.join(" "));
                Some("handler output".to_string())
            });
        }
        registry.register("say", |ctx| Some(ctx.command[1..].join(" ")));
        registry.register("tell_time", |_| Some("noon".to_string()));

        let speaker = Arc::new(Recorder::default());
        let assistant = Assistant::new(
            Arc::new(RwLock::new(engine)),
            registry,
            Arc::clone(&speaker) as Arc<dyn Speaker>,
            &config(mode),
        );
        (assistant, speaker, calls)
    }

    #[test]
    fn test_strip_trigger() {
        let triggers = vec!["hey stewart".to_string(), "stewart".to_string()];
        assert_eq!(strip_trigger("well hey stewart open browser", &triggers), Some("open browser".into()));
        assert_eq!(strip_trigger("stewart", &triggers), Some(String::new()));
        assert_eq!(strip_trigger("open browser", &triggers), None);
    }

    #[test]
    fn test_single_command_speaks_response_not_output() {
        let (mut assistant, speaker, calls) = assistant(TriggerMode::Disabled);
        let commands = assistant.handle("open the browser").wait();
        assert_eq!(commands.len(), 1);
        assert_eq!(*calls.lock().unwrap(), vec!["open browser".to_string()]);
        assert_eq!(speaker.lines(), vec!["Opening".to_string()]);
    }

    #[test]
    fn test_handler_output_spoken_without_response() {
        let (mut assistant, speaker, _) = assistant(TriggerMode::Disabled);
        assistant.handle("time").wait();
        assert_eq!(speaker.lines(), vec!["noon".to_string()]);
    }

    #[test]
    fn test_inside_speech_skips_confirmation() {
        let (mut assistant, speaker, _) = assistant(TriggerMode::Disabled);
        assistant.handle("say hello").wait();
        assert_eq!(speaker.lines(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_multi_command_speaks_once() {
        let (mut assistant, speaker, calls) = assistant(TriggerMode::Disabled);
        let commands = assistant.handle("open browser and click").wait();
        assert_eq!(commands.len(), 2);
        assert_eq!(speaker.lines(), vec!["On it".to_string()]);
        let mut seen = calls.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["click".to_string(), "open browser".to_string()]);
    }

    #[test]
    fn test_unrecognized_goes_to_fallback() {
        let (assistant, speaker, _) = assistant(TriggerMode::Disabled);
        let mut assistant = assistant.with_fallback(Box::new(Echo));
        match assistant.handle("how tall is everest") {
            Outcome::Fallback { reply } => assert_eq!(reply.as_deref(), Some("you said how tall is everest")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(speaker.lines(), vec!["you said how tall is everest".to_string()]);
    }

    #[test]
    fn test_missing_handler_is_skipped() {
        let (mut assistant, _, _) = assistant(TriggerMode::Disabled);
        match assistant.handle("dance") {
            Outcome::Dispatched { commands, handles } => {
                assert_eq!(commands.len(), 1);
                assert!(handles.is_empty());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_trigger_always() {
        let (mut assistant, speaker, calls) = assistant(TriggerMode::Always);
        assert!(matches!(assistant.hear("click"), Outcome::Ignored));
        assert!(matches!(assistant.hear("hey stewart"), Outcome::Greeted));
        assert_eq!(speaker.lines(), vec!["Yes?".to_string()]);
        assistant.hear("hey stewart click").wait();
        assert_eq!(*calls.lock().unwrap(), vec!["click".to_string()]);
    }

    #[test]
    fn test_trigger_timed_window() {
        let (mut assistant, _, calls) = assistant(TriggerMode::Timed);
        assert!(matches!(assistant.hear("click"), Outcome::Ignored));
        assistant.hear("hey stewart click").wait();
        assistant.hear("click").wait();
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_repeat_replays_previous_request() {
        let (mut assistant, _, calls) = assistant(TriggerMode::Disabled);
        assistant.handle("click").wait();
        assistant.handle("again").wait();
        assert_eq!(calls.lock().unwrap().len(), 2);
        assert_eq!(assistant.history().iter().collect::<Vec<_>>(), vec!["click"]);
    }

    #[test]
    fn test_repeat_keeps_other_commands_in_utterance() {
        let (mut assistant, speaker, calls) = assistant(TriggerMode::Disabled);
        assistant.handle("click").wait();
        calls.lock().unwrap().clear();

        let actions: Vec<String> = assistant.handle("scroll and again").wait().into_iter().map(|c| c.action).collect();
        assert_eq!(actions, vec!["scroll".to_string(), "click".to_string()]);
        let mut seen = calls.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["click".to_string(), "scroll".to_string()]);
        assert_eq!(speaker.lines().last().map(String::as_str), Some("On it"));
        assert_eq!(assistant.history().iter().collect::<Vec<_>>(), vec!["click"]);
    }

    #[test]
    fn test_repeat_with_empty_history_is_unresolved() {
        let (mut assistant, _, calls) = assistant(TriggerMode::Disabled);
        assert!(matches!(assistant.handle("again"), Outcome::Unresolved));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_history_is_bounded() {
        let (mut assistant, _, _) = assistant(TriggerMode::Disabled);
        for request in ["click", "time", "open browser"] {
            assistant.handle(request).wait();
        }
        assert_eq!(assistant.history().iter().collect::<Vec<_>>(), vec!["time", "open browser"]);
    }
}
