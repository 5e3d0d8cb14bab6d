// crates/aludel-cli/src/commands/check.rs
//
// `aludel check <scenario>`: parse and validate a scenario without running it.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{format_json, format_table, Field, OutputFormat};
use crate::scenario::Scenario;

#[derive(Debug, Args)]
pub struct CheckCmd {
    /// Path to the scenario TOML file.
    pub scenario: PathBuf,
}

#[derive(Debug, Serialize, Tabled)]
struct StepRow {
    step: usize,
    action: String,
    staker: String,
    expect_error: String,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    program: Vec<Field>,
    steps: Vec<StepRow>,
}

/// Run the check command.
pub fn run(cmd: &CheckCmd, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = Scenario::load(&cmd.scenario)?;
    let report = summarize(&scenario)?;

    match format {
        OutputFormat::Json => println!("{}", format_json(&report)),
        OutputFormat::Table => {
            println!("Scenario: {}", scenario.name);
            if !scenario.description.is_empty() {
                println!("  {}", scenario.description);
            }
            println!();
            println!("{}", format_table(&report.program));
            println!();
            println!("{}", format_table(&report.steps));
            println!();
            println!("Scenario OK: {} steps", report.steps.len());
        }
    }
    Ok(())
}

fn summarize(scenario: &Scenario) -> Result<CheckReport, Box<dyn std::error::Error>> {
    let scaling = scenario.reward_scaling()?;
    let program = &scenario.program;
    let hook = match (&program.timelock, &program.whitelist) {
        (Some(lock), _) => format!("timelock {}s", lock.0),
        (_, Some(names)) => format!("whitelist [{}]", names.join(", ")),
        _ => "none".to_string(),
    };

    let fields = vec![
        Field::new("name", &program.name),
        Field::new("genesis", scenario.genesis()?),
        Field::new(
            "scaling",
            format!("floor {} ceiling {} time {}s", scaling.floor, scaling.ceiling, scaling.time),
        ),
        Field::new("fee_bps", program.fee_bps),
        Field::new("hook", hook),
        Field::new("bonus_tokens", program.bonus_tokens.join(", ")),
        Field::new("stakers", scenario.stakers.len()),
    ];

    let steps = scenario
        .steps
        .iter()
        .enumerate()
        .map(|(step, s)| StepRow {
            step,
            action: s.action.label().to_string(),
            staker: s.action.staker().unwrap_or("-").to_string(),
            expect_error: s.expect_error.clone().unwrap_or_default(),
        })
        .collect();

    Ok(CheckReport {
        program: fields,
        steps,
    })
}
