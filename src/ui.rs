use std::io::{self, Write};

use colored::*;

use crate::error::EstimateError;
use crate::pipeline::Estimate;

/// Terminal rendering for submissions, estimates, and errors.
pub struct UiHandler;

impl UiHandler {
    pub fn new(colorful: bool) -> Self {
        if !colorful {
            colored::control::set_override(false);
        }
        Self
    }

    pub fn banner(&self) {
        println!("{}", "=".repeat(72).bright_blue());
        println!(
            "{}",
            "pacecast - half-marathon finish-time estimator"
                .bright_white()
                .bold()
        );
        println!("{}", "=".repeat(72).bright_blue());
        println!(
            "Describe yourself (age, sex, recent 5 km time), e.g. \
             \"I'm a 24 year old man and run 5km in 26:13\"."
        );
        println!("Commands: {} quits, {} clears the screen.", ":quit".cyan(), ":clear".cyan());
        println!();
    }

    /// Print the input prompt and flush so it appears before the read.
    pub fn prompt(&self) {
        print!("{} ", ">".bright_green());
        let _ = io::stdout().flush();
    }

    pub fn clear_screen(&self) {
        // ANSI clear + home; good enough for the terminals we target.
        print!("\x1b[2J\x1b[H");
        let _ = io::stdout().flush();
    }

    pub fn show_estimate(&self, estimate: &Estimate) {
        println!(
            "{} {}",
            "Estimated half-marathon time:".bright_white(),
            estimate.time.to_string().bright_green().bold()
        );
        println!(
            "  {} {} year old {}, 5 km in {} ({:.0} s/km pace)",
            "based on:".dimmed(),
            estimate.profile.age,
            estimate.profile.sex,
            estimate.profile.five_km_time,
            estimate.features.pace_seconds_per_km
        );
    }

    pub fn show_error(&self, err: &EstimateError) {
        match err {
            EstimateError::EmptyInput => {
                println!("{}", "Enter some text describing yourself first.".yellow());
            }
            EstimateError::Extraction { raw } => {
                println!("{}", "Could not parse the model response as JSON.".red());
                println!("{}", "The model replied:".dimmed());
                for line in raw.lines() {
                    println!("  {}", line.dimmed());
                }
            }
            other => {
                println!("{}", other.to_string().red());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_disables_color_globally() {
        let _ui = UiHandler::new(false);
        assert!(!colored::control::SHOULD_COLORIZE.should_colorize());
    }
}
