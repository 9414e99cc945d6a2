//! Email delivery of finished reports.
//!
//! No mail transport ships with the crate. Deployments implement [`Mailer`]
//! for their server and hand it to [`deliver_report`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::reports::{ReportRow, ReportTable};

/// Errors raised while preparing or sending an email.
#[derive(Debug, Error)]
pub enum MailError {
    /// The message has no recipient.
    #[error("No recipients given")]
    NoRecipients,

    /// An attachment path does not point to a file.
    #[error("Attachment '{name}' not found at {}", .path.display())]
    MissingAttachment {
        /// Attachment name shown to the recipient.
        name: String,
        /// Path the attachment is read from.
        path: PathBuf,
    },

    /// The report export could not be written.
    #[error("Failed to write attachment: {0}")]
    Io(#[from] std::io::Error),

    /// The transport refused the message.
    #[error("Mail transport error: {0}")]
    Transport(String),
}

/// An email with file attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Plain text body.
    pub body: String,
    /// Subject line.
    pub subject: String,
    /// Attachment name → file path.
    pub attachments: BTreeMap<String, PathBuf>,
    /// Keep a copy in the sender's sent folder.
    pub save: bool,
}

impl EmailMessage {
    /// Check the message can be sent.
    ///
    /// # Errors
    ///
    /// Returns `MailError::NoRecipients` for an empty recipient list and
    /// `MailError::MissingAttachment` for the first attachment that is not a
    /// file.
    pub fn validate(&self) -> Result<(), MailError> {
        if self.to.iter().all(|addr| addr.trim().is_empty()) {
            return Err(MailError::NoRecipients);
        }

        for (name, path) in &self.attachments {
            if !path.is_file() {
                return Err(MailError::MissingAttachment {
                    name: name.clone(),
                    path: path.clone(),
                });
            }
        }

        Ok(())
    }
}

/// A mail transport.
pub trait Mailer {
    /// Send a message. Implementations may assume it has been validated.
    fn send_email(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Export a report as JSON into `output_dir` and mail it.
///
/// The export is written to `<output_dir>/<report>.json` and attached under
/// that file name; the body carries the report summary. Returns the path of
/// the export.
#[instrument(skip(mailer, table), fields(report = %table.kind))]
pub fn deliver_report<M, R>(
    mailer: &M,
    table: &ReportTable<R>,
    to: &[String],
    output_dir: &Path,
) -> Result<PathBuf, MailError>
where
    M: Mailer + ?Sized,
    R: ReportRow + Serialize,
{
    if to.iter().all(|addr| addr.trim().is_empty()) {
        return Err(MailError::NoRecipients);
    }

    let file_name = format!("{}.json", table.kind.file_stem());
    let path = output_dir.join(&file_name);

    let mut writer = BufWriter::new(File::create(&path)?);
    table.write_json(&mut writer).map_err(std::io::Error::from)?;
    writer.flush()?;

    let summary = table.summary();
    let message = EmailMessage {
        to: to.to_vec(),
        body: summary.to_string(),
        subject: format!("{} report", table.kind),
        attachments: BTreeMap::from([(file_name, path.clone())]),
        save: true,
    };
    message.validate()?;

    mailer.send_email(&message)?;
    info!("Sent {} rows to {} recipients", summary.rows, message.to.len());

    Ok(path)
}
