//! Interactive front door: prompts for the parameters on the terminal, runs the
//! pipeline and mails the archive to the recipient.

use anyhow::Result;
use console::{style, Term};
use std::path::Path;

use crate::config::Config;
use crate::delivery;
use crate::pipeline::{MashupPipeline, PipelineRequest};
use crate::validate::{self, FormInput, ValidationError};
use crate::MashupError;

const FIELDS: [&str; 4] = [
    "Singer Name",
    "Number of Videos",
    "Duration of each video (seconds)",
    "Email ID",
];

/// Fill a form by asking for each field in turn
pub fn collect_with(mut ask: impl FnMut(&str) -> Result<String>) -> Result<FormInput> {
    Ok(FormInput {
        subject: ask(FIELDS[0])?,
        item_count: ask(FIELDS[1])?,
        duration: ask(FIELDS[2])?,
        email: ask(FIELDS[3])?,
    })
}

pub struct InteractiveForm {
    term: Term,
}

impl InteractiveForm {
    pub fn new() -> Self {
        Self { term: Term::stdout() }
    }

    fn ask(&self, label: &str) -> Result<String> {
        self.term.write_str(&format!("{}: ", style(label).bold()))?;
        Ok(self.term.read_line()?)
    }

    pub fn collect(&self) -> Result<FormInput> {
        self.term.write_line(&style("Mashup").bold().underlined().to_string())?;
        self.term.write_line("Enter Mashup Details")?;
        collect_with(|label| self.ask(label))
    }

    pub fn show_errors(&self, errors: &[ValidationError]) -> Result<()> {
        for err in errors {
            self.term.write_line(&style(format!("✗ {}", err)).red().to_string())?;
        }
        Ok(())
    }

    pub fn show_success(&self, message: &str) -> Result<()> {
        self.term.write_line(&style(format!("✓ {}", message)).green().to_string())?;
        Ok(())
    }

    pub fn show_failure(&self, message: &str) -> Result<()> {
        self.term.write_line(&style(format!("✗ {}", message)).red().to_string())?;
        Ok(())
    }

    /// Collect, validate, build and deliver
    pub async fn run(&self, config: &Config, work_dir: Option<&Path>, show_progress: bool) -> Result<()> {
        let input = self.collect()?;

        let (params, email) = match validate::validate_form(&input, &config.policy) {
            Ok(valid) => valid,
            Err(mut errors) => {
                self.show_errors(&errors)?;
                let first = errors.remove(0);
                return Err(anyhow::Error::new(MashupError::Validation(first))
                    .context(format!("{} field(s) failed validation", errors.len() + 1)));
            }
        };

        self.term.write_line("Generating mashup. Please wait...")?;

        let pipeline = MashupPipeline::from_config(config, work_dir).with_progress(show_progress);
        let request = PipelineRequest::new(params, None, &config.output);
        let report = match pipeline.run(&request).await {
            Ok(report) => report,
            Err(e) => {
                self.show_failure(&format!("{:#}", e))?;
                return Err(e);
            }
        };

        let delivered = delivery::deliver(&config.mail, &email, &report.archive).await;

        match &delivered {
            Ok(()) => self.show_success("Mashup generated and sent to your email successfully!")?,
            Err(e) => self.show_failure(&format!("{:#}", e))?,
        }

        self.term.write_line("ZIP file created at:")?;
        self.term.write_line(&report.archive.display().to_string())?;

        delivered
    }
}

impl Default for InteractiveForm {
    fn default() -> Self {
        Self::new()
    }
}
