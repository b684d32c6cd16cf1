//! Configuration validation.

use url::Url;

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Collapse into the first error, if any.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(e) => Err(ConfigError::InvalidValue {
                field: e.path,
                message: e.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_scheduler(config, &mut result);
        Self::validate_exclusive(config, &mut result);
        Self::validate_structure(config, &mut result);
        Self::validate_urls(config, &mut result);

        result
    }

    fn validate_scheduler(config: &Config, result: &mut ValidationResult) {
        let scheduler = &config.scheduler;

        if scheduler.max_concurrent_windows == 0 {
            result.add_error(ValidationError::new(
                "scheduler.max_concurrent_windows",
                "max_concurrent_windows must be greater than 0",
            ));
        } else if scheduler.max_concurrent_windows > 4 {
            result.add_warning(ValidationWarning::new(
                "scheduler.max_concurrent_windows",
                "more than 4 windows no longer fit the quadrant layout and will overlap",
            ));
        }

        if scheduler.max_consecutive_errors == 0 {
            result.add_error(ValidationError::new(
                "scheduler.max_consecutive_errors",
                "max_consecutive_errors must be greater than 0",
            ));
        }

        if scheduler.ready_poll_retries == 0 {
            result.add_error(ValidationError::new(
                "scheduler.ready_poll_retries",
                "ready_poll_retries must be greater than 0",
            ));
        }

        if scheduler.test_delay_min_ms > scheduler.test_delay_max_ms {
            result.add_error(ValidationError::new(
                "scheduler.test_delay_min_ms",
                "test_delay_min_ms cannot exceed test_delay_max_ms",
            ));
        }
    }

    fn validate_exclusive(config: &Config, result: &mut ValidationResult) {
        let exclusive = &config.exclusive;

        if exclusive.prefix.is_empty() {
            result.add_error(ValidationError::new(
                "exclusive.prefix",
                "Marker prefix cannot be empty",
            ));
        } else if exclusive.prefix.contains('_') {
            result.add_error(ValidationError::new(
                "exclusive.prefix",
                "Marker prefix cannot contain '_'",
            ));
        }

        if let Some(ref worker) = exclusive.worker_id {
            if worker.is_empty() || worker.contains('_') {
                result.add_error(ValidationError::new(
                    "exclusive.worker_id",
                    "worker_id must be non-empty and cannot contain '_'",
                ));
            }
        }

        if !(-12..=14).contains(&exclusive.utc_offset_hours) {
            result.add_error(ValidationError::new(
                "exclusive.utc_offset_hours",
                "utc_offset_hours must be between -12 and 14",
            ));
        }

        if exclusive.default_timeout_secs == 0 {
            result.add_warning(ValidationWarning::new(
                "exclusive.default_timeout_secs",
                "a zero default timeout lets any worker reclaim cells immediately",
            ));
        }

        for (feature, secs) in &exclusive.timeouts {
            if *secs == 0 {
                result.add_warning(ValidationWarning::new(
                    format!("exclusive.timeouts.{}", feature),
                    "zero timeout, cells using this feature are always reclaimable",
                ));
            }
        }
    }

    fn validate_structure(config: &Config, result: &mut ValidationResult) {
        let structure = &config.structure;

        let control = &structure.control_column;
        if control.is_empty() || !control.chars().all(|c| c.is_ascii_alphabetic()) {
            result.add_error(ValidationError::new(
                "structure.control_column",
                format!("'{}' is not a column letter", control),
            ));
        }

        if structure.max_prompt_columns == 0 {
            result.add_error(ValidationError::new(
                "structure.max_prompt_columns",
                "max_prompt_columns must be greater than 0",
            ));
        }

        let labels = [
            ("structure.prompt_label", &structure.prompt_label),
            ("structure.answer_label", &structure.answer_label),
            ("structure.report_label", &structure.report_label),
            ("structure.log_label", &structure.log_label),
        ];
        for (path, label) in labels {
            if label.trim().is_empty() {
                result.add_error(ValidationError::new(path, "Label cannot be empty"));
            }
        }

        if structure.scan_rows == 0 {
            result.add_warning(ValidationWarning::new(
                "structure.scan_rows",
                "scan_rows is 0, default row positions will always be used",
            ));
        }
    }

    fn validate_urls(config: &Config, result: &mut ValidationResult) {
        let urls = [
            ("urls.chatgpt", &config.urls.chatgpt),
            ("urls.claude", &config.urls.claude),
            ("urls.gemini", &config.urls.gemini),
            ("urls.genspark", &config.urls.genspark),
        ];
        for (path, url) in urls {
            match Url::parse(url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => result.add_error(ValidationError::new(
                    path,
                    format!("URL scheme must be http or https, got {}", parsed.scheme()),
                )),
                Err(e) => result.add_error(ValidationError::new(path, format!("Invalid URL: {e}"))),
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
