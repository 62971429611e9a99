use std::collections::BTreeMap;

use crate::{
    cli::{
        context::ShellContext,
        errors::{CommandError, CommandResult},
        output,
        table::{Table, TableColumn},
    },
    core::services::{ExpenseInput, LedgerService, MonthEntry},
    currency::{format_eur, format_number},
    ledger::{EntryLine, FlowType},
};

use super::{entry_arg, month_arg, number_arg, CommandDefinition};

const ADD_MONTH_USAGE: &str = "add-month <YYYY-MM> [--fx RATE] [--income cat=amt ...] \
[--expense cat=amt ...] [--person NAME cat=amt ...]";

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "add-month",
            "Enter or replace the totals of one month",
            ADD_MONTH_USAGE,
            cmd_add_month,
        ),
        CommandDefinition::new(
            "show-month",
            "Show the stored lines of one month",
            "show-month <YYYY-MM>",
            cmd_show_month,
        ),
        CommandDefinition::new(
            "set-fx",
            "Record the RUB to EUR rate (EUR per RUB) for a month",
            "set-fx <YYYY-MM> <rate>",
            cmd_set_fx,
        ),
        CommandDefinition::new("months", "List months with entries", "months", cmd_months),
    ]
}

enum Section {
    None,
    Income,
    Expense,
    Person(String),
}

fn parse_entry(args: &[&str]) -> Result<MonthEntry, CommandError> {
    let month = month_arg(args, ADD_MONTH_USAGE)?;
    let mut entry = MonthEntry::new(month);
    let mut combined: Vec<EntryLine> = Vec::new();
    let mut people: BTreeMap<String, Vec<EntryLine>> = BTreeMap::new();
    let mut section = Section::None;

    let mut tokens = args.iter().skip(1);
    while let Some(token) = tokens.next() {
        match *token {
            "--fx" => {
                let raw = tokens
                    .next()
                    .ok_or_else(|| CommandError::invalid("--fx needs a rate"))?;
                entry.fx_rate = Some(number_arg(raw, "exchange rate")?);
            }
            "--income" => section = Section::Income,
            "--expense" => section = Section::Expense,
            "--person" => {
                let name = tokens
                    .next()
                    .ok_or_else(|| CommandError::invalid("--person needs a name"))?;
                people.entry(name.to_string()).or_default();
                section = Section::Person(name.to_string());
            }
            pair => {
                let line = entry_arg(pair)?;
                match &section {
                    Section::None => {
                        return Err(CommandError::invalid(format!(
                            "`{}` must follow --income, --expense or --person",
                            pair
                        )))
                    }
                    Section::Income => entry.income.push(line),
                    Section::Expense => combined.push(line),
                    Section::Person(name) => people.entry(name.clone()).or_default().push(line),
                }
            }
        }
    }

    entry.expenses = match (combined.is_empty(), people.is_empty()) {
        (_, true) => ExpenseInput::Combined(combined),
        (true, false) => ExpenseInput::PerPerson(people),
        (false, false) => {
            return Err(CommandError::invalid(
                "use either --expense or --person, not both",
            ))
        }
    };
    Ok(entry)
}

fn warn_unknown_categories(context: &ShellContext, entry: &MonthEntry) {
    let expense_lines: Vec<&EntryLine> = match &entry.expenses {
        ExpenseInput::Combined(lines) => lines.iter().collect(),
        ExpenseInput::PerPerson(people) => people.values().flatten().collect(),
    };
    let checks = entry
        .income
        .iter()
        .map(|line| (FlowType::Income, line))
        .chain(expense_lines.into_iter().map(|line| (FlowType::Expense, line)));
    for (flow, line) in checks {
        if context.settings.is_known_category(&flow, &line.category) {
            continue;
        }
        match context.settings.suggest_category(&flow, &line.category) {
            Some(known) => output::warning(format!(
                "`{}` is not a listed {} category. Did you mean `{}`?",
                line.category, flow, known
            )),
            None => output::info(format!(
                "`{}` is not a listed {} category; it will be stored as entered.",
                line.category, flow
            )),
        }
    }
}

fn cmd_add_month(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let entry = parse_entry(args)?;
    warn_unknown_categories(context, &entry);

    if LedgerService::month_exists(context.store(), &entry.month)?
        && !context.confirm(&format!("{} already has entries. Replace them?", entry.month), false)?
    {
        output::info(format!("{} left unchanged.", entry.month));
        return Ok(());
    }

    let preview = LedgerService::save_month(context.store(), &entry)?;
    output::success(format!(
        "Saved {}: income {}, expense {}, net {}",
        preview.month,
        format_eur(preview.total_income),
        format_eur(preview.total_expense),
        format_eur(preview.net)
    ));
    if preview.foreign_income_eur != 0.0 {
        output::info(format!(
            "RUB income converted: {}",
            format_eur(preview.foreign_income_eur)
        ));
    }
    if preview.has_negative_expenses {
        output::info("Negative expense lines reduce total expenses (refunds or corrections).");
    }
    Ok(())
}

fn cmd_show_month(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let month = month_arg(args, "show-month <YYYY-MM>")?;
    let items = context.store().load_line_items(&month)?;
    if items.is_empty() {
        output::info(format!("No entries for {}.", month));
        return Ok(());
    }

    output::section(format!("Entries for {}", month));
    let mut table = Table::new(vec![
        TableColumn::left("Flow"),
        TableColumn::left("Category"),
        TableColumn::right("Amount"),
        TableColumn::left("Currency"),
    ]);
    let mut sorted = items;
    sorted.sort_by(|a, b| a.flow_type.cmp(&b.flow_type));
    for item in &sorted {
        table.push(vec![
            item.flow_type.to_string(),
            item.category.clone(),
            format_number(item.amount, 2),
            item.currency.code().to_string(),
        ]);
    }
    output::block(&table.render());

    match context.store().get_fx_rate(&month)? {
        Some(rate) => output::info(format!("RUB to EUR rate: {}", rate)),
        None if sorted.iter().any(|item| item.is_foreign()) => {
            output::warning(format!("No RUB to EUR rate recorded for {}.", month))
        }
        None => {}
    }
    Ok(())
}

fn cmd_set_fx(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let month = month_arg(args, "set-fx <YYYY-MM> <rate>")?;
    let raw = args
        .get(1)
        .ok_or_else(|| CommandError::invalid("usage: set-fx <YYYY-MM> <rate>"))?;
    let rate = number_arg(raw, "exchange rate")?;
    LedgerService::set_fx_rate(context.store(), &month, rate)?;
    output::success(format!("Rate for {} set to {}.", month, rate));
    Ok(())
}

fn cmd_months(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let months = context.store().list_months()?;
    if months.is_empty() {
        output::info("No months recorded yet. Use `add-month` to enter one.");
        return Ok(());
    }
    output::section(format!("{} month(s)", months.len()));
    for month in months {
        output::block(&format!("  {}", month));
    }
    Ok(())
}
