mod common;

use assert_cmd::Command;
use predicates::str::contains;

fn cli(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("household_finance_cli").unwrap();
    cmd.env("HOUSEHOLD_FINANCE_HOME", home)
        .env("HOUSEHOLD_FINANCE_CLI_SCRIPT", "1")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn script_mode_saves_and_summarizes() {
    let home = common::temp_base();
    let input = "\
set-savings 1000
add-month 2025-01 --income Salary=3000 --expense Rent=1200 Groceries=300
add-month 2025-02 --fx 0.01 --income Salary=3000 salary_moscow=20000 --expense Rent=1200
summary
exit
";
    cli(&home)
        .write_stdin(input)
        .assert()
        .success()
        .stdout(contains("SUCCESS: Saved 2025-01"))
        .stdout(contains("Monthly summary"))
        .stdout(contains("2025-02"));

    assert!(home.join("data").join("ledger.json").exists());

    cli(&home)
        .write_stdin("months\nforecast 3\n")
        .assert()
        .success()
        .stdout(contains("2 month(s)"))
        .stdout(contains("2025-05"));
}

#[test]
fn script_mode_reports_errors_and_keeps_going() {
    let home = common::temp_base();
    cli(&home)
        .write_stdin("add-month 2025-13\nsumary\nforecast\nversion\n")
        .assert()
        .success()
        .stdout(contains("ERROR: Malformed month `2025-13`"))
        .stdout(contains("Did you mean `summary`?"))
        .stdout(contains("Forecast needs at least 2 months"))
        .stdout(contains("household_finance"));
}
