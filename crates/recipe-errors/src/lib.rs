/*
 * Error reporting for packaging runs.
 *
 * This version uses:
 * 1. rootcause: For tree-based error propagation with stage context.
 * 2. tracing: For automatic structured logging.
 * 3. serde: For machine-readable error serialization.
 */

pub mod types;

use miette::{Diagnostic, SourceCode};
use nanoid::nanoid;
use rootcause::Report;
use serde::{Serialize, Serializer};
use tracing::error;

pub use miette::Result as CliResult;
pub use rootcause;
pub use types::*;

#[derive(Debug)]
pub struct LibReport(pub Report<LibError>);

pub type LibResult<T> = std::result::Result<T, LibReport>;

impl LibReport {
    /// Attach a human-readable context line (stage, path, collaborator).
    pub fn attach(self, note: impl Into<String>) -> Self {
        LibReport(self.0.attach(note.into()))
    }

    /// The error kind at the top of the report.
    pub fn kind(&self) -> &LibError {
        self.0.current_context()
    }
}

impl From<LibError> for LibReport {
    fn from(err: LibError) -> Self {
        LibReport(Report::new(err))
    }
}

/// Attach context to any fallible result whose error converts into a report.
pub trait Annotate<T> {
    fn annotate(self, note: impl Into<String>) -> LibResult<T>;
}

impl<T, E: Into<LibReport>> Annotate<T> for std::result::Result<T, E> {
    fn annotate(self, note: impl Into<String>) -> LibResult<T> {
        self.map_err(|e| e.into().attach(note))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorFrame {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub git_hash: String,
    pub docs_url: String,
    pub correlation_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(serialize_with = "serialize_history_flat")]
    pub history: Vec<ErrorFrame>,
}

fn serialize_history_flat<S>(history: &[ErrorFrame], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let flat: Vec<&str> = history.iter().map(|f| f.message.as_str()).collect();
    flat.serialize(serializer)
}

/* * DIAGNOSTIC IMPLEMENTATION * */
impl Diagnostic for LibReport {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.0.current_context().code()
    }

    fn severity(&self) -> Option<miette::Severity> {
        self.0.current_context().severity()
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.0.current_context().help()
    }

    /* Maps the error code to a clickable link in the terminal. */
    fn url<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let base = env!("ERROR_DOCS_URL");
        self.code().map(|c| {
            let link = format!("{}/#{}", base, c);
            Box::new(link) as Box<dyn std::fmt::Display>
        })
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.0.current_context().source_code()
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        self.0.current_context().labels()
    }
}

impl std::fmt::Display for LibReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for LibReport {}

pub trait ReportExt {
    fn to_api_error(&self) -> ApiError;
}

impl ReportExt for LibReport {
    fn to_api_error(&self) -> ApiError {
        let mut history = Vec::new();
        for node in self.0.iter_reports() {
            for attachment in node.attachments().iter() {
                history.push(ErrorFrame {
                    message: attachment.to_string(),
                });
            }
        }

        let ctx = self.0.current_context();
        let api_err = ApiError {
            git_hash: env!("GIT_HASH").to_string(),
            docs_url: env!("ERROR_DOCS_URL").to_string(),
            correlation_id: nanoid!(8),
            title: ctx.to_string(),
            code: LibError::code(ctx).map(|c| c.to_string()),
            help: LibError::help(ctx).map(|h| h.to_string()),
            history,
        };

        error!(
            hash = %api_err.git_hash,
            id = %api_err.correlation_id,
            title = %api_err.title,
            code = api_err.code.as_deref(),
            history = ?api_err.history.iter().map(|h| &h.message).collect::<Vec<_>>(),
            "Packaging run failed"
        );

        api_err
    }
}
