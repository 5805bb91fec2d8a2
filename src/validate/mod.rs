use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::num::IntErrorKind;
use std::path::Path;
use std::sync::OnceLock;

/// Thresholds both front doors enforce before a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// Item count must be strictly greater than this
    pub min_items_exclusive: u32,

    /// Trim duration in seconds must be strictly greater than this
    pub min_duration_exclusive: u64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_items_exclusive: 10,
            min_duration_exclusive: 20,
        }
    }
}

/// One violated input rule
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Singer name cannot be empty.")]
    EmptySubject,

    #[error("Number of videos must be an integer, got '{0}'.")]
    CountNotInteger(String),

    #[error("Number of videos must be greater than {min}.")]
    CountTooSmall { min: u32 },

    #[error("Duration must be an integer number of seconds, got '{0}'.")]
    DurationNotInteger(String),

    #[error("Duration must be greater than {min} seconds.")]
    DurationTooShort { min: u64 },

    #[error("Number of videos must be at most {max}.")]
    CountTooLarge { max: u32 },

    #[error("Output file name must end with .mp3 or .zip and contain no directories, got '{0}'.")]
    BadOutputName(String),

    #[error("Please enter a valid email ID, got '{0}'.")]
    InvalidEmail(String),
}

/// Parameters that passed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRequest {
    pub subject: String,
    pub item_count: u32,
    pub duration_secs: u64,
}

/// What the command-line output name refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputTarget {
    /// Name of the composed audio file
    Audio(String),
    /// Name of the delivery archive
    Archive(String),
}

/// Raw values collected by the interactive form
#[derive(Debug, Clone, Default)]
pub struct FormInput {
    pub subject: String,
    pub item_count: String,
    pub duration: String,
    pub email: String,
}

pub fn validate_subject(subject: &str) -> Result<String, ValidationError> {
    let trimmed = subject.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptySubject);
    }
    Ok(trimmed.to_string())
}

pub fn validate_item_count(raw: &str, policy: &ValidationPolicy) -> Result<u32, ValidationError> {
    let too_small = ValidationError::CountTooSmall {
        min: policy.min_items_exclusive,
    };
    let too_large = ValidationError::CountTooLarge { max: u32::MAX };

    let value: i64 = match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            return Err(match e.kind() {
                IntErrorKind::PosOverflow => too_large,
                IntErrorKind::NegOverflow => too_small,
                _ => ValidationError::CountNotInteger(raw.to_string()),
            })
        }
    };

    if value <= i64::from(policy.min_items_exclusive) {
        return Err(too_small);
    }

    u32::try_from(value).map_err(|_| too_large)
}

pub fn validate_duration(raw: &str, policy: &ValidationPolicy) -> Result<u64, ValidationError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::DurationNotInteger(raw.to_string()))?;

    // Negative values fall below any threshold
    if value < 0 || (value as u64) <= policy.min_duration_exclusive {
        return Err(ValidationError::DurationTooShort {
            min: policy.min_duration_exclusive,
        });
    }

    Ok(value as u64)
}

pub fn validate_output_name(name: &str) -> Result<OutputTarget, ValidationError> {
    // Outputs always land directly inside the output directory
    if Path::new(name).file_name() != Some(OsStr::new(name)) {
        return Err(ValidationError::BadOutputName(name.to_string()));
    }

    let lower = name.to_lowercase();
    let has_stem = |ext: &str| lower.len() > ext.len() && lower.ends_with(ext);

    if has_stem(".mp3") {
        Ok(OutputTarget::Audio(name.to_string()))
    } else if has_stem(".zip") {
        Ok(OutputTarget::Archive(name.to_string()))
    } else {
        Err(ValidationError::BadOutputName(name.to_string()))
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email pattern is a valid regex")
    })
}

pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();
    if email_pattern().is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}

/// Validate the positional command-line arguments, stopping at the first violation
pub fn validate_command_line(
    subject: &str,
    item_count: &str,
    duration: &str,
    output: &str,
    policy: &ValidationPolicy,
) -> Result<(ValidatedRequest, OutputTarget), ValidationError> {
    let subject = validate_subject(subject)?;
    let item_count = validate_item_count(item_count, policy)?;
    let duration_secs = validate_duration(duration, policy)?;
    let target = validate_output_name(output)?;

    Ok((
        ValidatedRequest {
            subject,
            item_count,
            duration_secs,
        },
        target,
    ))
}

/// Validate the interactive form, collecting every violated rule
pub fn validate_form(
    input: &FormInput,
    policy: &ValidationPolicy,
) -> Result<(ValidatedRequest, String), Vec<ValidationError>> {
    let subject = validate_subject(&input.subject);
    let item_count = validate_item_count(&input.item_count, policy);
    let duration = validate_duration(&input.duration, policy);
    let email = validate_email(&input.email);

    match (subject, item_count, duration, email) {
        (Ok(subject), Ok(item_count), Ok(duration_secs), Ok(email)) => Ok((
            ValidatedRequest {
                subject,
                item_count,
                duration_secs,
            },
            email,
        )),
        (subject, item_count, duration, email) => {
            let mut errors = Vec::new();
            errors.extend(subject.err());
            errors.extend(item_count.err());
            errors.extend(duration.err());
            errors.extend(email.err());
            Err(errors)
        }
    }
}
