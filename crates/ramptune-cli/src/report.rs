//! Final result formatting.

use clap::ValueEnum;
use ramptune_controller::RunOutcome;

/// Output format for the final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Render the run outcome in the requested format.
pub fn render(outcome: &RunOutcome, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text => Ok(format_text(outcome)),
    }
}

fn format_text(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Converged { rate, cycles } => {
            format!("Converged after {cycles} cycles. Optimal rate is {rate} rps.")
        }
        RunOutcome::Stopped {
            last_rate,
            best_rate,
            cycles,
        } => format!(
            "Stopped after {cycles} cycles at {last_rate} rps. \
             Last rate that met the goal was {best_rate} rps."
        ),
    }
}
