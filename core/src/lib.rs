//! Debounced repository validation and embed snippet composition for a
//! discussion widget.
//!
//! Keystrokes go through a [`Debouncer`], the settled identifier drives a
//! [`RepositoryValidator`] lookup, and [`compose`] turns the validator,
//! [`MappingSelector`] and [`DirectConfig`] into an [`EmbedConfiguration`].
//! [`Session`] runs all of it on one task.

pub mod compose;
pub mod debounce;
pub mod error;
pub mod lookup;
pub mod mapping;
pub mod session;
pub mod settings;
pub mod theme;
pub mod validator;

pub use compose::{compose, EmbedConfiguration};
pub use debounce::Debouncer;
pub use error::{ConfigError, ValidationFailure};
pub use lookup::{Category, HttpLookup, LookupError, RepositoryInfo, RepositoryLookup};
pub use mapping::{Mapping, MappingSelector};
pub use session::{Command, Configurator, Effect, Event, NoopObserver, Session, SessionObserver, Snapshot};
pub use settings::Settings;
pub use theme::{DirectConfig, Theme};
pub use validator::{LookupTicket, RepositoryValidator, Resolution, ValidationState};

/// Builds the HTTP lookup client described by `settings`.
pub fn lookup_from_settings(settings: &Settings) -> Result<HttpLookup, LookupError> {
    HttpLookup::new(&settings.lookup_url, settings.lookup_timeout)
}
