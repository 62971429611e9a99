use std::io::{self, BufRead};

use rustyline::{
    completion::{Completer, Pair},
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    history::DefaultHistory,
    validate::Validator,
    Cmd, Context as ReadlineContext, Editor, Helper, KeyEvent,
};

use crate::ledger::MonthKey;

use super::context::{CliMode, LoopControl, ShellContext};
use super::errors::{CliError, CommandError};
use super::output;

/// Set to any value to read commands from stdin without prompts or colours.
pub const SCRIPT_ENV: &str = "HOUSEHOLD_FINANCE_CLI_SCRIPT";

const ENTRY_FLAGS: [&str; 4] = ["--fx", "--income", "--expense", "--person"];

pub fn run_cli() -> Result<(), CliError> {
    let mode = if std::env::var_os(SCRIPT_ENV).is_some() {
        output::set_plain(true);
        CliMode::Script
    } else {
        CliMode::Interactive
    };

    let mut context = ShellContext::new(mode)?;
    tracing::debug!(?mode, "shell started");

    match mode {
        CliMode::Interactive => run_interactive(&mut context),
        CliMode::Script => run_script(&mut context),
    }
}

fn run_interactive(context: &mut ShellContext) -> Result<(), CliError> {
    let mut editor = Editor::<CommandHelper, DefaultHistory>::new()?;
    editor.set_helper(Some(CommandHelper::from_context(context)));
    editor.bind_sequence(KeyEvent::from('?'), Cmd::Complete);

    while context.running {
        match editor.readline(&context.prompt()) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line).ok();

                let outcome = handle_line(context, line);
                // Saved months and edited settings feed the next completion.
                if let Some(helper) = editor.helper_mut() {
                    *helper = CommandHelper::from_context(context);
                }
                match outcome {
                    Ok(LoopControl::Continue) => {}
                    Ok(LoopControl::Exit) => break,
                    Err(err) => context.report_error(err),
                }
            }
            Err(ReadlineError::Interrupted) => {
                if context.confirm_exit()? {
                    break;
                }
            }
            Err(ReadlineError::Eof) => {
                output::info("Exiting shell.");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn run_script(context: &mut ShellContext) -> Result<(), CliError> {
    for line in io::stdin().lock().lines() {
        if !context.running {
            break;
        }
        match handle_line(context, &line?) {
            Ok(LoopControl::Continue) => {}
            Ok(LoopControl::Exit) => break,
            Err(err) => context.report_error(err),
        }
    }
    Ok(())
}

pub(crate) fn handle_line(
    context: &mut ShellContext,
    line: &str,
) -> Result<LoopControl, CommandError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(LoopControl::Continue);
    }
    let tokens = match shell_words::split(line) {
        Ok(tokens) => tokens,
        Err(err) => {
            output::warning(format!("Could not parse input: {}", err));
            return Ok(LoopControl::Continue);
        }
    };
    let Some((raw, rest)) = tokens.split_first() else {
        return Ok(LoopControl::Continue);
    };
    let args: Vec<&str> = rest.iter().map(String::as_str).collect();

    context.last_command = Some(line.to_string());
    let control = context.dispatch(&raw.to_lowercase(), raw, &args)?;
    if control == LoopControl::Exit {
        context.running = false;
    }
    Ok(control)
}

/// Completion words captured from the store and settings.
#[derive(Debug, Default)]
struct CommandHelper {
    commands: Vec<String>,
    months: Vec<String>,
    income_categories: Vec<String>,
    expense_categories: Vec<String>,
    people: Vec<String>,
}

impl CommandHelper {
    fn from_context(context: &ShellContext) -> Self {
        let mut commands: Vec<String> = context
            .command_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        commands.sort();

        // Stored months plus last month, the usual next entry. Newest first.
        let mut months = context.store().list_months().unwrap_or_default();
        months.push(MonthKey::previous_to_today());
        months.sort();
        months.dedup();
        let months = months.iter().rev().map(ToString::to_string).collect();

        let settings = &context.settings;
        Self {
            commands,
            months,
            income_categories: settings.income_categories.clone(),
            expense_categories: settings.expense_categories.clone(),
            people: settings.expense_people.clone(),
        }
    }

    /// Candidates for `partial`, given the complete words typed before it.
    fn candidates(&self, words: &[&str], partial: &str) -> Vec<String> {
        let pool = match words {
            [] => self.commands.clone(),
            [command] => match command.to_ascii_lowercase().as_str() {
                "add-month" | "show-month" | "set-fx" => self.months.clone(),
                "breakdown" | "set-categories" => vec!["income".into(), "expense".into()],
                "help" => self.commands.clone(),
                _ => Vec::new(),
            },
            [command, _month, rest @ ..] if command.eq_ignore_ascii_case("add-month") => {
                self.entry_candidates(rest, partial)
            }
            _ => Vec::new(),
        };

        let needle = partial.trim_start_matches('"').to_lowercase();
        pool.into_iter()
            .filter(|word| {
                word.trim_start_matches('"')
                    .to_lowercase()
                    .starts_with(&needle)
            })
            .collect()
    }

    /// Flags, person names or `category=` stubs for the tail of `add-month`.
    fn entry_candidates(&self, words: &[&str], partial: &str) -> Vec<String> {
        let mut categories: Option<&[String]> = None;
        let mut awaiting: Option<&str> = None;
        for word in words {
            if let Some(flag) = awaiting.take() {
                if flag == "--person" {
                    categories = Some(self.expense_categories.as_slice());
                }
                continue;
            }
            match *word {
                "--fx" | "--person" => awaiting = Some(*word),
                "--income" => categories = Some(self.income_categories.as_slice()),
                "--expense" => categories = Some(self.expense_categories.as_slice()),
                _ => {}
            }
        }

        let flags = || ENTRY_FLAGS.iter().map(|flag| flag.to_string()).collect::<Vec<_>>();
        match (awaiting, categories) {
            (Some("--person"), _) => self.people.iter().map(|name| quoted(name)).collect(),
            (Some(_), _) => Vec::new(),
            _ if partial.starts_with('-') => flags(),
            // An amount is being typed.
            _ if partial.contains('=') => Vec::new(),
            (None, Some(categories)) => categories
                .iter()
                .map(|category| format!("{}=", quoted(category)))
                .collect(),
            (None, None) => flags(),
        }
    }
}

fn quoted(word: &str) -> String {
    if word.contains(char::is_whitespace) {
        format!("\"{}\"", word)
    } else {
        word.to_string()
    }
}

impl Helper for CommandHelper {}

impl Completer for CommandHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &ReadlineContext<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let prefix = &line[..pos];
        let start = prefix
            .rfind(char::is_whitespace)
            .map(|idx| idx + 1)
            .unwrap_or(0);
        let words: Vec<&str> = prefix[..start].split_whitespace().collect();

        let pairs = self
            .candidates(&words, &prefix[start..])
            .into_iter()
            .map(|word| Pair {
                display: word.clone(),
                replacement: word,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for CommandHelper {
    type Hint = String;
}

impl Highlighter for CommandHelper {}

impl Validator for CommandHelper {}
