use std::collections::HashMap;

pub mod month;
pub mod report;
pub mod settings;
pub mod system;

use crate::ledger::{settings::parse_amount, EntryLine, MonthKey};

use super::context::ShellContext;
use super::errors::{CommandError, CommandResult};

pub(crate) fn all_definitions() -> Vec<CommandDefinition> {
    let mut commands = Vec::new();
    commands.extend(month::definitions());
    commands.extend(report::definitions());
    commands.extend(settings::definitions());
    commands.extend(system::definitions());
    commands
}

pub type CommandHandler = fn(&mut ShellContext, &[&str]) -> CommandResult;

#[derive(Clone)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    pub handler: CommandHandler,
}

impl CommandDefinition {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        usage: &'static str,
        handler: CommandHandler,
    ) -> Self {
        Self {
            name,
            description,
            usage,
            handler,
        }
    }
}

pub struct CommandRegistry {
    commands: HashMap<&'static str, CommandDefinition>,
    order: Vec<&'static str>,
}

impl CommandRegistry {
    pub fn new(definitions: Vec<CommandDefinition>) -> Self {
        let mut commands = HashMap::new();
        let mut order = Vec::new();
        for definition in definitions {
            order.push(definition.name);
            commands.insert(definition.name, definition);
        }
        Self { commands, order }
    }

    pub fn get(&self, name: &str) -> Option<&CommandDefinition> {
        self.commands.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDefinition> {
        self.order
            .iter()
            .filter_map(move |name| self.commands.get(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.order.iter().copied()
    }
}

pub(crate) fn month_arg(args: &[&str], usage: &str) -> Result<MonthKey, CommandError> {
    let raw = args
        .first()
        .ok_or_else(|| CommandError::invalid(format!("usage: {}", usage)))?;
    Ok(MonthKey::parse(raw)?)
}

pub(crate) fn number_arg(raw: &str, what: &str) -> Result<f64, CommandError> {
    parse_amount(raw).map_err(|_| CommandError::invalid(format!("{} must be a number, got `{}`", what, raw)))
}

/// Parses `category=amount`.
pub(crate) fn entry_arg(raw: &str) -> Result<EntryLine, CommandError> {
    let (category, amount) = raw
        .rsplit_once('=')
        .ok_or_else(|| CommandError::invalid(format!("expected category=amount, got `{}`", raw)))?;
    let category = category.trim();
    if category.is_empty() {
        return Err(CommandError::invalid(format!("missing category in `{}`", raw)));
    }
    Ok(EntryLine::new(category, number_arg(amount, category)?))
}
