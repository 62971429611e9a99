use dialoguer::{theme::ColorfulTheme, Confirm};
use strsim::levenshtein;

use crate::{
    config::{Config, ConfigManager},
    core::services::SettingsService,
    errors::Result as FinanceResult,
    ledger::Settings,
    storage::{JsonLedgerStore, LedgerStore},
};

use super::commands::{all_definitions, CommandDefinition, CommandRegistry};
use super::errors::{CliError, CommandError, CommandResult};
use super::output;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Interactive,
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Exit,
}

/// Session state handed to every command handler.
pub struct ShellContext {
    pub mode: CliMode,
    pub registry: CommandRegistry,
    pub store: Box<dyn LedgerStore>,
    pub config: Config,
    pub settings: Settings,
    pub theme: ColorfulTheme,
    pub last_command: Option<String>,
    pub running: bool,
}

impl ShellContext {
    /// Opens the configured JSON store and seeds default settings.
    pub fn new(mode: CliMode) -> Result<Self, CliError> {
        let manager = ConfigManager::new()?;
        let config = manager.load()?;
        crate::init_with_filter(config.log_filter.as_deref());
        let store = JsonLedgerStore::new(manager.store_path(&config))?;
        tracing::debug!(path = %store.path().display(), "ledger store opened");
        Self::with_store(mode, Box::new(store), config).map_err(CliError::from)
    }

    pub fn with_store(
        mode: CliMode,
        store: Box<dyn LedgerStore>,
        config: Config,
    ) -> FinanceResult<Self> {
        SettingsService::ensure_defaults(store.as_ref())?;
        let settings = SettingsService::load(store.as_ref())?;
        Ok(Self {
            mode,
            registry: CommandRegistry::new(all_definitions()),
            store,
            config,
            settings,
            theme: ColorfulTheme::default(),
            last_command: None,
            running: true,
        })
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    /// Re-reads settings after a command changed them.
    pub fn refresh_settings(&mut self) -> CommandResult {
        self.settings = SettingsService::load(self.store())?;
        Ok(())
    }

    pub fn prompt(&self) -> String {
        "finance> ".to_string()
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.registry.names().collect()
    }

    pub fn command(&self, name: &str) -> Option<&CommandDefinition> {
        self.registry.get(name)
    }

    pub(crate) fn dispatch(
        &mut self,
        command: &str,
        raw: &str,
        args: &[&str],
    ) -> Result<LoopControl, CommandError> {
        let Some(handler) = self.registry.get(command).map(|entry| entry.handler) else {
            self.suggest_command(raw);
            return Ok(LoopControl::Continue);
        };
        match handler(self, args) {
            Ok(()) => Ok(LoopControl::Continue),
            Err(CommandError::ExitRequested) => Ok(LoopControl::Exit),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn suggest_command(&self, input: &str) {
        output::warning(format!(
            "Unknown command `{}`. Type `help` to see available commands.",
            input
        ));
        let needle = input.to_lowercase();
        let best = self
            .registry
            .names()
            .map(|name| (levenshtein(name, &needle), name))
            .min_by_key(|(distance, _)| *distance);
        if let Some((distance, name)) = best {
            if distance <= 3 {
                output::hint(format!("Did you mean `{}`?", name));
            }
        }
    }

    /// Asks before a destructive step. Script mode never blocks on a prompt.
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool, CommandError> {
        if self.mode == CliMode::Script {
            return Ok(true);
        }
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }

    pub(crate) fn confirm_exit(&self) -> Result<bool, CliError> {
        if self.mode == CliMode::Script {
            return Ok(true);
        }
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt("Exit shell?")
            .default(true)
            .interact()?)
    }

    pub(crate) fn report_error(&self, err: CommandError) {
        match err {
            CommandError::ExitRequested => {}
            CommandError::InvalidArguments(message) => {
                output::error(message);
                output::hint("Use `help <command>` for usage details.");
            }
            other => output::error(other),
        }
    }

    #[cfg(test)]
    pub(crate) fn process_line(&mut self, line: &str) -> Result<LoopControl, CommandError> {
        super::shell::handle_line(self, line)
    }
}

#[cfg(test)]
pub(crate) fn script_context() -> ShellContext {
    ShellContext::with_store(
        CliMode::Script,
        Box::new(crate::storage::MemoryLedgerStore::new()),
        Config::default(),
    )
    .expect("script context")
}
