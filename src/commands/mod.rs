use crate::error::BotError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub mod builtin;

/// Backend connection details handed to commands registered with `needs_internals`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Internals {
    pub multiplexing: bool,
    /// Backend base URL, ending in a slash.
    pub backend_url: String,
}

/// Arguments a command is invoked with.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandInput<'a> {
    pub internals: Option<&'a Internals>,
    pub message: Option<&'a str>,
}

#[async_trait]
pub trait Command: Send + Sync {
    /// Run the command and return the text to send back.
    async fn run(&self, input: CommandInput<'_>) -> Result<String, BotError>;
}

/// A command backed by a synchronous closure.
pub struct FnCommand<F>(F);

impl<F> FnCommand<F>
where
    F: for<'a> Fn(CommandInput<'a>) -> Result<String, BotError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Command for FnCommand<F>
where
    F: for<'a> Fn(CommandInput<'a>) -> Result<String, BotError> + Send + Sync,
{
    async fn run(&self, input: CommandInput<'_>) -> Result<String, BotError> {
        (self.0)(input)
    }
}

#[derive(Clone)]
pub struct CommandEntry {
    handler: Arc<dyn Command>,
    internals: Option<Internals>,
    passes_raw_message: bool,
}

impl CommandEntry {
    pub fn needs_internals(&self) -> bool {
        self.internals.is_some()
    }

    pub fn passes_raw_message(&self) -> bool {
        self.passes_raw_message
    }

    /// Call the handler with whatever this entry was registered to receive.
    pub async fn invoke(&self, raw_message: &str) -> Result<String, BotError> {
        let input = CommandInput {
            internals: self.internals.as_ref(),
            message: self.passes_raw_message.then_some(raw_message),
        };
        self.handler.run(input).await
    }
}

impl std::fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEntry")
            .field("internals", &self.internals)
            .field("passes_raw_message", &self.passes_raw_message)
            .finish_non_exhaustive()
    }
}

/// Name-keyed `!command` handlers. Registering an existing name replaces it.
pub struct CommandRegistry {
    commands: HashMap<String, CommandEntry>,
    internals: Internals,
}

impl CommandRegistry {
    pub fn new(internals: Internals) -> Self {
        Self {
            commands: HashMap::new(),
            internals,
        }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn Command>,
        needs_internals: bool,
        passes_raw_message: bool,
    ) {
        // Internal commands never see the message text.
        let entry = if needs_internals {
            CommandEntry {
                handler,
                internals: Some(self.internals.clone()),
                passes_raw_message: false,
            }
        } else {
            CommandEntry {
                handler,
                internals: None,
                passes_raw_message,
            }
        };
        self.commands.insert(name.into(), entry);
    }

    pub fn resolve(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.get(name)
    }

    /// Registered names, sorted for a stable help listing.
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

impl std::fmt::Display for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "command registry with {} commands", self.commands.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every input it is called with.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(Option<Internals>, Option<String>)>>,
    }

    #[async_trait]
    impl Command for Recorder {
        async fn run(&self, input: CommandInput<'_>) -> Result<String, BotError> {
            self.calls.lock().unwrap().push((
                input.internals.cloned(),
                input.message.map(str::to_string),
            ));
            Ok("pong".to_string())
        }
    }

    fn internals() -> Internals {
        Internals {
            multiplexing: true,
            backend_url: "http://localhost:2001/".to_string(),
        }
    }

    #[tokio::test]
    async fn plain_command_gets_no_arguments() {
        let recorder = Arc::new(Recorder::default());
        let mut registry = CommandRegistry::new(internals());
        registry.register("ping", recorder.clone(), false, false);

        let entry = registry.resolve("ping").unwrap();
        assert!(!entry.needs_internals());
        assert!(!entry.passes_raw_message());
        assert_eq!(entry.invoke("!ping now").await.unwrap(), "pong");

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (None, None));
    }

    #[tokio::test]
    async fn raw_message_command_gets_text() {
        let recorder = Arc::new(Recorder::default());
        let mut registry = CommandRegistry::new(internals());
        registry.register("echo", recorder.clone(), false, true);

        let entry = registry.resolve("echo").unwrap();
        assert!(entry.passes_raw_message());
        entry.invoke("!echo hi").await.unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls[0], (None, Some("!echo hi".to_string())));
    }

    #[tokio::test]
    async fn internal_command_never_gets_text() {
        let recorder = Arc::new(Recorder::default());
        let mut registry = CommandRegistry::new(internals());
        registry.register("words", recorder.clone(), true, true);

        let entry = registry.resolve("words").unwrap();
        assert!(entry.needs_internals());
        assert!(!entry.passes_raw_message());
        entry.invoke("!words please").await.unwrap();

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls[0], (Some(internals()), None));
    }

    #[test]
    fn lookup_is_exact_and_last_registration_wins() {
        let mut registry = CommandRegistry::new(internals());
        registry.register("info", Arc::new(Recorder::default()), false, false);
        registry.register("info", Arc::new(Recorder::default()), false, true);
        registry.register("about", Arc::new(Recorder::default()), false, false);

        assert_eq!(registry.len(), 2);
        assert!(registry.resolve("info").unwrap().passes_raw_message());
        assert!(registry.resolve("Info").is_none());
        assert!(registry.resolve("inf").is_none());
        assert_eq!(registry.list_names(), vec!["about", "info"]);
        assert_eq!(registry.to_string(), "command registry with 2 commands");
    }
}
