//! Marker and config subcommand handlers.

use chrono::Utc;

use sheetstream_config::{Config, ConfigValidator};
use sheetstream_exclusive::{ClaimState, ExclusiveGuard};

use crate::cli::{ConfigAction, MarkerAction};

/// Handle marker subcommands.
pub(crate) fn handle_marker_command(
    config: &Config,
    action: MarkerAction,
) -> Result<(), Box<dyn std::error::Error>> {
    let guard = ExclusiveGuard::new(&config.exclusive)?;
    match action {
        MarkerAction::Create { feature } => {
            println!("{}", guard.claim_marker(feature.as_deref()));
        }
        MarkerAction::Check { marker, feature } => {
            let Some(parsed) = guard.parse(&marker) else {
                println!("Not a structured marker; treated as timed out.");
                return Ok(());
            };
            let feature = feature.as_deref().or(parsed.feature.as_deref());
            let timeout = guard.timeout_for(feature);
            println!("Worker:   {}", parsed.worker_id);
            println!("Written:  {}", parsed.timestamp);
            println!("Feature:  {}", feature.unwrap_or("none"));
            println!("Age:      {}s", parsed.age(Utc::now()).as_secs());
            println!("Timeout:  {}s", timeout.as_secs());
            if guard.is_timeout(&marker, feature) {
                println!("Status:   timed out");
            } else {
                let wait = guard.recommended_wait_time(&marker, feature);
                println!("Status:   live, {}s remaining", wait.as_secs());
            }
            if let ClaimState::Own = guard.evaluate(&marker, Utc::now()) {
                println!("Held by this worker.");
            }
        }
    }
    Ok(())
}

/// Handle config subcommands.
pub(crate) fn handle_config_command(
    config: &Config,
    action: ConfigAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Validate => {
            let result = ConfigValidator::validate(config);
            for warning in &result.warnings {
                println!("warning: {}: {}", warning.path, warning.message);
            }
            for error in &result.errors {
                println!("error: {}: {}", error.path, error.message);
            }
            if result.is_valid() {
                println!("Configuration is valid.");
                Ok(())
            } else {
                Err(format!("{} configuration error(s)", result.errors.len()).into())
            }
        }
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}
