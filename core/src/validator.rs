// core/src/validator.rs
use crate::error::ConfigError;
use crate::lookup::{Category, LookupError, RepositoryInfo};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Where the lookup for the current repository identifier stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ValidationState {
    Idle,
    Pending {
        epoch: u64,
    },
    #[serde(rename_all = "camelCase")]
    Success {
        repository_id: String,
        categories: Vec<Category>,
    },
    Error,
}

impl ValidationState {
    pub fn name(&self) -> &'static str {
        match self {
            ValidationState::Idle => "idle",
            ValidationState::Pending { .. } => "pending",
            ValidationState::Success { .. } => "success",
            ValidationState::Error => "error",
        }
    }
}

/// Handed out by [`RepositoryValidator::submit`]; the lookup result must be
/// returned together with it so stale results can be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTicket {
    epoch: u64,
    identifier: String,
}

impl LookupTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    /// A newer identifier was submitted after this ticket; nothing changed.
    Stale,
}

/// Owns the validation state machine for the repository identifier.
///
/// Every submission bumps the epoch. A lookup result is applied only while its
/// ticket's epoch is current, so results for superseded identifiers are
/// dropped no matter what order they arrive in.
#[derive(Debug, Clone)]
pub struct RepositoryValidator {
    repository: String,
    epoch: u64,
    state: ValidationState,
    category_id: String,
}

impl Default for RepositoryValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryValidator {
    pub fn new() -> Self {
        Self {
            repository: String::new(),
            epoch: 0,
            state: ValidationState::Idle,
            category_id: String::new(),
        }
    }

    /// Handles a settled identifier.
    ///
    /// Returns a ticket when a lookup must be issued. An empty identifier moves
    /// to `Idle`; re-submitting the identifier already being tracked is a no-op.
    pub fn submit(&mut self, identifier: &str) -> Option<LookupTicket> {
        let identifier = identifier.trim();

        if identifier == self.repository && !matches!(self.state, ValidationState::Idle) {
            debug!(repo = identifier, "Identifier unchanged, no new lookup");
            return None;
        }

        self.epoch += 1;
        self.repository = identifier.to_string();
        self.category_id.clear();

        if identifier.is_empty() {
            self.state = ValidationState::Idle;
            debug!(epoch = self.epoch, "Identifier cleared");
            return None;
        }

        self.state = ValidationState::Pending { epoch: self.epoch };
        info!(repo = identifier, epoch = self.epoch, "Repository lookup issued");

        Some(LookupTicket {
            epoch: self.epoch,
            identifier: identifier.to_string(),
        })
    }

    /// Applies a lookup outcome if its ticket is still current.
    pub fn resolve(
        &mut self,
        ticket: &LookupTicket,
        outcome: Result<RepositoryInfo, LookupError>,
    ) -> Resolution {
        if ticket.epoch != self.epoch || !matches!(self.state, ValidationState::Pending { .. }) {
            debug!(
                repo = %ticket.identifier,
                ticket_epoch = ticket.epoch,
                current_epoch = self.epoch,
                "Discarding stale lookup result"
            );
            return Resolution::Stale;
        }

        self.category_id.clear();
        self.state = match outcome {
            Ok(info) if info.categories.is_empty() => {
                warn!(repo = %ticket.identifier, "Repository has no discussion categories");
                ValidationState::Error
            }
            Ok(info) => {
                let categories = dedup_categories(info.categories);
                info!(
                    repo = %ticket.identifier,
                    repository_id = %info.repository_id,
                    categories = categories.len(),
                    "Repository validated"
                );
                ValidationState::Success {
                    repository_id: info.repository_id,
                    categories,
                }
            }
            Err(e) => {
                warn!(repo = %ticket.identifier, error = %e, "Repository lookup failed");
                ValidationState::Error
            }
        };

        Resolution::Applied
    }

    pub fn select_category(&mut self, id: &str) -> Result<(), ConfigError> {
        if id.is_empty() {
            self.category_id.clear();
            return Ok(());
        }

        let ValidationState::Success { categories, .. } = &self.state else {
            return Err(ConfigError::CategoriesUnavailable);
        };

        if !categories.iter().any(|c| c.id == id) {
            return Err(ConfigError::UnknownCategory(id.to_string()));
        }

        self.category_id = id.to_string();
        Ok(())
    }

    /// Selects a category by display name, ignoring case.
    pub fn select_category_by_name(&mut self, name: &str) -> Result<(), ConfigError> {
        let id = self
            .categories()
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
            .map(|c| c.id.clone());

        match id {
            Some(id) => self.select_category(&id),
            None if self.categories().is_empty() => Err(ConfigError::CategoriesUnavailable),
            None => Err(ConfigError::UnknownCategory(name.to_string())),
        }
    }

    pub fn state(&self) -> &ValidationState {
        &self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn repository_id(&self) -> &str {
        match &self.state {
            ValidationState::Success { repository_id, .. } => repository_id,
            _ => "",
        }
    }

    pub fn categories(&self) -> &[Category] {
        match &self.state {
            ValidationState::Success { categories, .. } => categories,
            _ => &[],
        }
    }

    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    pub fn selected_category(&self) -> Option<&Category> {
        self.categories().iter().find(|c| c.id == self.category_id)
    }
}

fn dedup_categories(categories: Vec<Category>) -> Vec<Category> {
    let mut seen = HashSet::new();
    categories
        .into_iter()
        .filter(|c| {
            let fresh = seen.insert(c.id.clone());
            if !fresh {
                warn!(category_id = %c.id, "Dropping duplicate category id");
            }
            fresh
        })
        .collect()
}
