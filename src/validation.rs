use crate::errors::{DomainError, DomainResult, ValidationError};
use chrono::{NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// A trait that entities should implement for validation.
pub trait Validate {
    /// Validates the entity and returns an error if validation fails.
    fn validate(&self) -> DomainResult<()>;
}

// Common regex patterns
fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap())
}

fn phone_regex() -> &'static Regex {
    static PHONE_REGEX: OnceLock<Regex> = OnceLock::new();
    PHONE_REGEX.get_or_init(|| Regex::new(r"^\+?[0-9 ()\-.]{7,20}$").unwrap())
}

fn ssn_regex() -> &'static Regex {
    static SSN_REGEX: OnceLock<Regex> = OnceLock::new();
    SSN_REGEX.get_or_init(|| Regex::new(r"^\d{3}-?\d{2}-?\d{4}$").unwrap())
}

/// Struct for configuring validations in a fluent style
pub struct ValidationBuilder<T> {
    field_name: String,
    value: Option<T>,
    errors: Vec<ValidationError>,
}

/// Collects errors from several builders so a nested payload reports every
/// problem at once.
#[derive(Debug, Default)]
pub struct NestedValidator {
    errors: Vec<ValidationError>,
}

impl NestedValidator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Run a builder and keep whatever it found
    pub fn check<T>(&mut self, builder: ValidationBuilder<T>) {
        self.errors.extend(builder.into_errors());
    }

    pub fn validate(self) -> DomainResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::ValidationFailed(self.errors))
        }
    }
}

/// Generic validation implementations
impl<T> ValidationBuilder<T> {
    pub fn new(field_name: &str, value: Option<T>) -> Self {
        Self {
            field_name: field_name.to_string(),
            value,
            errors: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self
    where T: Default + PartialEq {
        if self.value.is_none() || self.value == Some(T::default()) {
            self.errors.push(ValidationError::required(&self.field_name));
        }
        self
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    /// Complete validation and return result
    pub fn validate(self) -> DomainResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::ValidationFailed(self.errors))
        }
    }
}

/// String-specific validations
impl ValidationBuilder<String> {
    pub fn max_length(mut self, max: usize) -> Self {
        if let Some(value) = &self.value {
            if value.chars().count() > max {
                self.errors.push(ValidationError::max_length(&self.field_name, max));
            }
        }
        self
    }

    pub fn matches_pattern(mut self, pattern: &Regex, message: &str) -> Self {
        if let Some(value) = &self.value {
            if !value.is_empty() && !pattern.is_match(value) {
                self.errors.push(ValidationError::format(&self.field_name, message));
            }
        }
        self
    }

    pub fn email(self) -> Self {
        self.matches_pattern(email_regex(), "must be a valid email address")
    }

    pub fn phone(self) -> Self {
        self.matches_pattern(phone_regex(), "must be a valid phone number")
    }

    pub fn social_security_number(self) -> Self {
        self.matches_pattern(ssn_regex(), "must look like 123-45-6789")
    }

    /// Calendar date in `YYYY-MM-DD` form that is not in the future
    pub fn past_date(mut self) -> Self {
        if let Some(value) = &self.value {
            if value.is_empty() {
                return self;
            }
            match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
                Ok(date) if date > Utc::now().date_naive() => {
                    self.errors.push(ValidationError::invalid_value(
                        &self.field_name,
                        "cannot be in the future",
                    ));
                }
                Ok(_) => {}
                Err(_) => {
                    self.errors.push(ValidationError::format(
                        &self.field_name,
                        "must be in YYYY-MM-DD format",
                    ));
                }
            }
        }
        self
    }
}
