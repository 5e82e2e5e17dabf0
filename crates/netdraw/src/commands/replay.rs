//! `netdraw replay`: recorded test cases run offline through the editor.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tabled::Tabled;
use tracing::info;

use netdraw_core::{Editor, EditorConfig, TestCase, TestOutcome, TestResult};

use super::util::read_document;
use crate::cli::{GlobalOpts, ReplayArgs};
use crate::error::CliError;
use crate::output;

/// A fixture file holds one test case or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum Fixture {
    Many(Vec<TestCase>),
    One(Box<TestCase>),
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Ran")]
    ran: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

fn outcome_word(outcome: TestOutcome) -> &'static str {
    outcome.into()
}

fn ran_at(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn load_cases(args: &ReplayArgs) -> Result<Vec<TestCase>, CliError> {
    let mut cases = Vec::new();
    for path in &args.files {
        match read_document::<Fixture>(path)? {
            Fixture::Many(many) => cases.extend(many),
            Fixture::One(one) => cases.push(*one),
        }
    }
    Ok(cases)
}

/// Run `cases` to completion and return their results in order.
pub fn run_cases(cases: Vec<TestCase>) -> Result<Vec<TestResult>, CliError> {
    let mut editor = Editor::new(EditorConfig::default())?;
    editor.load_tests(cases);
    Ok(editor.run_tests()?.to_vec())
}

pub fn handle(args: &ReplayArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cases = load_cases(args)?;
    let total = cases.len();
    info!(total, "replaying test cases");

    let results = run_cases(cases)?;
    let color = output::should_color(global.color);
    let rendered = output::render_list(
        global.output,
        &results,
        |r| ResultRow {
            id: r.id,
            name: r.name.clone(),
            result: output::status(outcome_word(r.result), color),
            ran: ran_at(r.date),
            detail: match r.errors.as_slice() {
                [] => String::new(),
                [only] => only.clone(),
                [first, rest @ ..] => format!("{first} (+{} more)", rest.len()),
            },
        },
        |r| format!("{}\t{}", r.name, outcome_word(r.result)),
    )?;
    output::print_output(&rendered, global.quiet);

    let failed = results
        .iter()
        .filter(|r| r.result != TestOutcome::Passed)
        .count();
    if failed > 0 {
        return Err(CliError::TestsFailed { failed, total });
    }
    Ok(())
}
