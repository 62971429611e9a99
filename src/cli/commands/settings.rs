use crate::{
    cli::{
        context::ShellContext,
        errors::{CommandError, CommandResult},
        output,
    },
    core::services::SettingsService,
    currency::format_eur,
    ledger::{settings::split_list, FlowType},
};

use super::{number_arg, CommandDefinition};

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "settings",
            "Show starting savings, category lists and people",
            "settings",
            cmd_settings,
        ),
        CommandDefinition::new(
            "set-savings",
            "Set the savings balance before the first month",
            "set-savings <amount>",
            cmd_set_savings,
        ),
        CommandDefinition::new(
            "set-categories",
            "Replace the suggested categories for a flow",
            "set-categories <income|expense> <name,name,...>",
            cmd_set_categories,
        ),
        CommandDefinition::new(
            "set-people",
            "Replace the people tracked with separate expense ledgers",
            "set-people <name,name,...>",
            cmd_set_people,
        ),
    ]
}

fn listed(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

/// Joins the remaining arguments so both `a,b` and `a, b` work.
fn list_arg(args: &[&str]) -> Vec<String> {
    split_list(&args.join(","))
}

fn cmd_settings(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    context.refresh_settings()?;
    let settings = &context.settings;
    output::section("Settings");
    output::info(format!("Starting savings : {}", format_eur(settings.starting_savings)));
    output::info(format!("Income categories: {}", listed(&settings.income_categories)));
    output::info(format!("Expense categories: {}", listed(&settings.expense_categories)));
    output::info(format!("People           : {}", listed(&settings.expense_people)));
    Ok(())
}

fn cmd_set_savings(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let raw = args
        .first()
        .ok_or_else(|| CommandError::invalid("usage: set-savings <amount>"))?;
    let amount = number_arg(raw, "starting savings")?;
    SettingsService::set_starting_savings(context.store(), amount)?;
    context.refresh_settings()?;
    output::success(format!("Starting savings set to {}.", format_eur(amount)));
    Ok(())
}

fn cmd_set_categories(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let usage = "usage: set-categories <income|expense> <name,name,...>";
    let flow = match args.first().map(|raw| raw.to_ascii_lowercase()).as_deref() {
        Some("income") => FlowType::Income,
        Some("expense") => FlowType::Expense,
        _ => return Err(CommandError::invalid(usage)),
    };
    let categories = list_arg(&args[1..]);
    if categories.is_empty() {
        return Err(CommandError::invalid(usage));
    }
    SettingsService::set_categories(context.store(), &flow, &categories)?;
    context.refresh_settings()?;
    output::success(format!("{} categories: {}", flow, categories.join(", ")));
    Ok(())
}

fn cmd_set_people(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let people = list_arg(args);
    if people.is_empty()
        && !context.confirm("Clear the list of people?", false)?
    {
        return Ok(());
    }
    SettingsService::set_people(context.store(), &people)?;
    context.refresh_settings()?;
    output::success(format!("People: {}", listed(&people)));
    Ok(())
}
