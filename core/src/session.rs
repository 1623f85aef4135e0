// core/src/session.rs
use crate::compose::{compose, EmbedConfiguration};
use crate::debounce::Debouncer;
use crate::error::{ConfigError, ValidationFailure};
use crate::lookup::{Category, LookupError, RepositoryInfo, RepositoryLookup};
use crate::mapping::{Mapping, MappingSelector};
use crate::theme::{DirectConfig, Theme};
use crate::validator::{LookupTicket, RepositoryValidator, Resolution, ValidationState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Something the user did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    RepositoryInput { value: String },
    SelectCategory { id: String },
    SetMapping { mapping: Mapping },
    SetTerm { term: String },
    SetTheme { theme: Theme },
    SetReactions { enabled: bool },
}

/// Everything that can move the configurator: user commands, the debounce
/// timer settling, and lookups coming back.
#[derive(Debug)]
pub enum Event {
    Command(Command),
    Settled(String),
    LookupFinished {
        ticket: LookupTicket,
        outcome: Result<RepositoryInfo, LookupError>,
    },
}

/// Work the driver must start on behalf of the configurator, or the
/// verdict on a lookup that came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Debounce(String),
    Lookup(LookupTicket),
    Resolved {
        identifier: String,
        resolution: Resolution,
        succeeded: bool,
    },
}

/// Serializable view of the whole configurator after an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub input: String,
    pub status: &'static str,
    pub categories: Vec<Category>,
    pub configuration: EmbedConfiguration,
    pub complete: bool,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The single owner of validator, mapping and toggle state.
#[derive(Debug, Clone, Default)]
pub struct Configurator {
    input: String,
    validator: RepositoryValidator,
    mapping: MappingSelector,
    direct: DirectConfig,
}

impl Configurator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_direct(direct: DirectConfig) -> Self {
        Self {
            direct,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, event: Event) -> Result<Option<Effect>, ConfigError> {
        match event {
            Event::Command(command) => self.apply_command(command),
            Event::Settled(value) => Ok(self.validator.submit(&value).map(Effect::Lookup)),
            Event::LookupFinished { ticket, outcome } => {
                let resolution = self.validator.resolve(&ticket, outcome);
                let succeeded = resolution == Resolution::Applied
                    && matches!(self.validator.state(), ValidationState::Success { .. });
                Ok(Some(Effect::Resolved {
                    identifier: ticket.identifier().to_string(),
                    resolution,
                    succeeded,
                }))
            }
        }
    }

    fn apply_command(&mut self, command: Command) -> Result<Option<Effect>, ConfigError> {
        match command {
            Command::RepositoryInput { value } => {
                self.input = value.clone();
                return Ok(Some(Effect::Debounce(value)));
            }
            Command::SelectCategory { id } => self.validator.select_category(&id)?,
            Command::SetMapping { mapping } => self.mapping.set_mapping(mapping),
            Command::SetTerm { term } => self.mapping.set_term(term),
            Command::SetTheme { theme } => self.direct.theme = theme,
            Command::SetReactions { enabled } => self.direct.reactions_enabled = enabled,
        }
        Ok(None)
    }

    /// Looks `identifier` up inline, bypassing the debounce. Used by one-shot
    /// callers that already have the final identifier.
    pub async fn validate_now(
        &mut self,
        lookup: &dyn RepositoryLookup,
        identifier: &str,
    ) -> Result<(), ValidationFailure> {
        self.input = identifier.to_string();
        let Some(ticket) = self.validator.submit(identifier) else {
            return match self.validator.state() {
                ValidationState::Success { .. } => Ok(()),
                ValidationState::Idle => Err(ValidationFailure::EmptyIdentifier),
                _ => Err(ValidationFailure::Rejected(format!(
                    "lookup for {identifier} already {}",
                    self.validator.state().name()
                ))),
            };
        };

        let outcome = lookup.lookup(ticket.identifier()).await;
        let failure = match &outcome {
            Ok(info) if info.categories.is_empty() => Some(ValidationFailure::NoCategories),
            Ok(_) => None,
            Err(e) => Some(ValidationFailure::Rejected(e.to_string())),
        };
        self.validator.resolve(&ticket, outcome);

        failure.map_or(Ok(()), Err)
    }

    pub fn select_category_by_name(&mut self, name: &str) -> Result<(), ConfigError> {
        self.validator.select_category_by_name(name)
    }

    pub fn validator(&self) -> &RepositoryValidator {
        &self.validator
    }

    pub fn configuration(&self) -> EmbedConfiguration {
        compose(&self.validator, &self.mapping, &self.direct)
    }

    pub fn snapshot(&self) -> Snapshot {
        let configuration = self.configuration();
        Snapshot {
            input: self.input.clone(),
            status: self.validator.state().name(),
            categories: self.validator.categories().to_vec(),
            complete: configuration.is_complete(),
            snippet: configuration.render_snippet(),
            configuration,
            error: None,
        }
    }
}

/// Hooks for counting what a session does. All methods default to no-ops.
#[async_trait]
pub trait SessionObserver: Send + Sync {
    async fn lookup_issued(&self, _identifier: &str) {}

    async fn lookup_resolved(&self, _identifier: &str, _resolution: Resolution, _succeeded: bool) {}
}

pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Handle to a running session. Dropping every clone ends the session and
/// discards any pending debounce.
#[derive(Clone)]
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Snapshot>,
}

impl Session {
    /// Starts the session loop on its own task.
    pub fn spawn(
        lookup: Arc<dyn RepositoryLookup>,
        observer: Arc<dyn SessionObserver>,
        debounce: Duration,
        direct: DirectConfig,
    ) -> (Self, JoinHandle<()>) {
        let configurator = Configurator::with_direct(direct);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(configurator.snapshot());

        let handle = tokio::spawn(run(
            configurator,
            lookup,
            observer,
            debounce,
            commands_rx,
            snapshot_tx,
        ));

        let session = Self {
            commands: commands_tx,
            snapshots: snapshot_rx,
        };
        (session, handle)
    }

    /// Queues a command. Returns false once the session loop has stopped.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }
}

async fn run(
    mut configurator: Configurator,
    lookup: Arc<dyn RepositoryLookup>,
    observer: Arc<dyn SessionObserver>,
    debounce: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<Snapshot>,
) {
    let (mut debouncer, mut settled) = Debouncer::new(debounce);
    let (finished_tx, mut finished) =
        mpsc::unbounded_channel::<(LookupTicket, Result<RepositoryInfo, LookupError>)>();

    loop {
        let event = tokio::select! {
            command = commands.recv() => match command {
                Some(command) => Event::Command(command),
                None => break,
            },
            Some(value) = settled.recv() => Event::Settled(value),
            Some((ticket, outcome)) = finished.recv() => Event::LookupFinished { ticket, outcome },
        };

        let mut error = None;
        match configurator.apply(event) {
            Ok(Some(Effect::Debounce(value))) => debouncer.update(value),
            Ok(Some(Effect::Lookup(ticket))) => {
                observer.lookup_issued(ticket.identifier()).await;
                let lookup = Arc::clone(&lookup);
                let finished_tx = finished_tx.clone();
                tokio::spawn(async move {
                    let outcome = lookup.lookup(ticket.identifier()).await;
                    // the session may be gone; the result is moot then
                    let _ = finished_tx.send((ticket, outcome));
                });
            }
            Ok(Some(Effect::Resolved {
                identifier,
                resolution,
                succeeded,
            })) => {
                observer.lookup_resolved(&identifier, resolution, succeeded).await;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Command rejected");
                error = Some(e.to_string());
            }
        }

        let mut snapshot = configurator.snapshot();
        snapshot.error = error;
        snapshots.send_replace(snapshot);
    }

    debug!("Session closed");
}
