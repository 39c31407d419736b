// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages.
//
// Every failure that reaches the user is converted to plain English with a
// clear suggestion. The severity levels drive how the UI presents the
// message (inline hint, banner, or blocking dialog).

use crate::error::BildwerkError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Worth trying again as-is.
    Transient,
    /// User must change something (remove a failed image, pick other files).
    ActionRequired,
    /// Cannot be fixed by retrying — damaged file, unsupported format.
    Permanent,
}

/// A human-readable error with a plain English message and a suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether retrying the same action can succeed.
    pub retriable: bool,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

/// Convert a `BildwerkError` into a `HumanError`.
pub fn humanize_error(err: &BildwerkError) -> HumanError {
    match err {
        BildwerkError::IngestRejected(detail) => HumanError {
            message: "Some of those items couldn't be added.".into(),
            suggestion: format!("Only image files can be added. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        BildwerkError::Enhancement(_) => HumanError {
            message: "This picture couldn't be enhanced.".into(),
            suggestion: "The original is still shown. Remove it and paste it again to retry, or use it as-is via a file.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        BildwerkError::Assembly(detail) => HumanError {
            message: "The document couldn't be created.".into(),
            suggestion: format!("Your images are unchanged — try again. ({detail})"),
            retriable: true,
            severity: Severity::Transient,
        },

        BildwerkError::Precondition(detail) => HumanError {
            message: "The document isn't ready to be created yet.".into(),
            suggestion: format!("{detail}"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        BildwerkError::ImageError(_) => HumanError {
            message: "There's a problem with this image.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try saving it as a JPEG or PNG first.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        BildwerkError::PdfError(_) => HumanError {
            message: "There was a problem building the PDF.".into(),
            suggestion: "Try again. If this keeps happening, one of the images may be damaged.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        BildwerkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your device's storage may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }
    }
}
