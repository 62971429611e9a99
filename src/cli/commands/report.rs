use crate::{
    cli::{
        context::ShellContext,
        errors::{CommandError, CommandResult},
        output,
        table::{Table, TableColumn},
    },
    core::services::{ForecastRequest, ForecastService, SummaryService},
    currency::format_number,
    errors::FinanceError,
    forecast::{ForecastMode, Scenario, MAX_FORECAST_PERIODS},
    ledger::{FlowType, MonthKey},
};

use super::{number_arg, CommandDefinition};

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "summary",
            "Monthly totals and running savings in EUR",
            "summary",
            cmd_summary,
        ),
        CommandDefinition::new(
            "breakdown",
            "Per-category EUR amounts by month",
            "breakdown <income|expense>",
            cmd_breakdown,
        ),
        CommandDefinition::new(
            "forecast",
            "Project savings forward with an optional growth scenario",
            "forecast [months] [income%] [expense%]",
            cmd_forecast,
        ),
    ]
}

fn money(value: f64) -> String {
    format_number(value, 2)
}

fn warn_missing_rates(months: &[MonthKey]) {
    if months.is_empty() {
        return;
    }
    let listed: Vec<String> = months.iter().map(ToString::to_string).collect();
    output::warning(format!(
        "RUB lines counted as 0 EUR, no rate for: {}",
        listed.join(", ")
    ));
    output::hint("Record a rate with `set-fx <YYYY-MM> <rate>`.");
}

fn cmd_summary(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let report = SummaryService::summary(context.store())?;
    if report.rows.is_empty() {
        output::info("No months recorded yet. Use `add-month` to enter one.");
        return Ok(());
    }

    output::section("Monthly summary (EUR)");
    let mut table = Table::new(vec![
        TableColumn::left("Month"),
        TableColumn::right("Income"),
        TableColumn::right("Expense"),
        TableColumn::right("Net"),
        TableColumn::right("Savings"),
    ]);
    for row in &report.rows {
        table.push(vec![
            row.month.to_string(),
            money(row.total_income),
            money(row.total_expense),
            money(row.net),
            money(row.savings_end),
        ]);
    }
    output::block(&table.render());
    output::info(format!(
        "Starting savings {}, current savings {}",
        money(report.starting_savings),
        money(report.current_savings())
    ));
    warn_missing_rates(&report.missing_fx_months);
    Ok(())
}

fn cmd_breakdown(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let flow = match args.first().map(|raw| raw.to_ascii_lowercase()).as_deref() {
        Some("income") => FlowType::Income,
        Some("expense") => FlowType::Expense,
        _ => return Err(CommandError::invalid("usage: breakdown <income|expense>")),
    };
    let breakdown = SummaryService::breakdown(context.store(), &flow)?;
    if breakdown.is_empty() {
        output::info(format!("No {} lines recorded.", flow));
        return Ok(());
    }

    output::section(format!("{} by category (EUR)", flow));
    let mut columns = vec![TableColumn::left("Month")];
    columns.extend(
        breakdown
            .categories
            .iter()
            .map(|category| TableColumn::right(category.as_str())),
    );
    let mut table = Table::new(columns);
    for month in breakdown.months.keys() {
        let mut row = vec![month.to_string()];
        row.extend(
            breakdown
                .categories
                .iter()
                .map(|category| money(breakdown.amount(month, category))),
        );
        table.push(row);
    }
    let mut totals = vec!["Total".to_string()];
    totals.extend(
        breakdown
            .categories
            .iter()
            .map(|category| money(breakdown.category_total(category))),
    );
    table.push(totals);
    output::block(&table.render());
    Ok(())
}

fn parse_request(context: &ShellContext, args: &[&str]) -> Result<ForecastRequest, CommandError> {
    let mut request = ForecastRequest::from_config(&context.config);
    if let Some(raw) = args.first() {
        let periods = raw
            .parse::<usize>()
            .ok()
            .filter(|periods| (1..=MAX_FORECAST_PERIODS).contains(periods))
            .ok_or_else(|| {
                CommandError::invalid(format!(
                    "months must be a whole number from 1 to {}, got `{}`",
                    MAX_FORECAST_PERIODS, raw
                ))
            })?;
        request = request.with_periods(periods);
    }
    if args.len() > 1 {
        let income = number_arg(args[1], "income growth")?;
        let expense = match args.get(2) {
            Some(raw) => number_arg(raw, "expense growth")?,
            None => 0.0,
        };
        request = request.with_scenario(Scenario::new(income, expense));
    }
    Ok(request)
}

fn cmd_forecast(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let request = parse_request(context, args)?;
    let report = match ForecastService::forecast(context.store(), &request) {
        Ok(report) => report,
        Err(FinanceError::InsufficientHistory { required, available }) => {
            output::warning(format!(
                "Forecast needs at least {} months of history, found {}.",
                required, available
            ));
            output::hint(format!(
                "Add at least {} more month(s) with `add-month`.",
                required - available
            ));
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let forecast = &report.forecast;
    let mode = match forecast.mode {
        ForecastMode::Separable => "income and expense modelled separately",
        ForecastMode::NetOnly => "net modelled directly",
    };
    output::section(format!("Forecast, {} month(s) ({})", request.periods, mode));
    if let Some(scenario) = request.scenario {
        output::info(format!(
            "Scenario: income {:+}%, expense {:+}%",
            scenario.income_growth_pct, scenario.expense_growth_pct
        ));
    }

    let mut table = Table::new(vec![
        TableColumn::left("Month"),
        TableColumn::right("Income"),
        TableColumn::right("Expense"),
        TableColumn::right("Net"),
        TableColumn::right("Savings"),
        TableColumn::right("Low"),
        TableColumn::right("High"),
    ]);
    let optional = |value: Option<f64>| value.map(money).unwrap_or_else(|| "-".to_string());
    for row in forecast.projected() {
        table.push(vec![
            row.month.to_string(),
            optional(row.total_income),
            optional(row.total_expense),
            money(row.net),
            money(row.savings_end),
            optional(row.lower),
            optional(row.upper),
        ]);
    }
    output::block(&table.render());

    if let Some(final_savings) = report.final_savings() {
        output::info(format!("Projected savings: {}", money(final_savings)));
    }
    if forecast.degraded {
        output::warning("Model fit failed; showing a flat continuation of the last month.");
    }
    warn_missing_rates(&report.missing_fx_months);
    Ok(())
}
