//! Serializing the forest as CSV or as a nested HTML document.

pub mod csv;
pub mod html;

use thiserror::Error;

use crate::extras::ExtraField;
use crate::forest::Forest;
use crate::graph::{Task, TaskGraph};

pub use self::csv::CsvRenderer;
pub use self::html::HtmlRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Html,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "html" => Ok(OutputFormat::Html),
            _ => Err(format!("Unknown format: {}. Use 'csv' or 'html'.", s)),
        }
    }
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub trait Renderer {
    /// Produce the whole document. Nothing is written anywhere until the
    /// caller has the finished string.
    fn render(&self, forest: &Forest<'_>, extras: &[ExtraField]) -> Result<String, RenderError>;
}

/// Whole estimates print without a fractional part.
pub fn format_points(points: Option<f64>) -> String {
    match points {
        Some(p) if p.fract() == 0.0 && p.abs() < 1e15 => format!("{}", p as i64),
        Some(p) => format!("{}", p),
        None => String::new(),
    }
}

/// `@username` of the task's owner, when it resolved.
pub fn owner_handle(task: &Task, graph: &TaskGraph) -> Option<String> {
    task.owner()
        .and_then(|phid| graph.user(phid))
        .map(|user| user.handle())
}

/// `name (column)` for every resolved project of the task; the column
/// part only when the task sits on that project's board.
pub fn project_labels(task: &Task, graph: &TaskGraph) -> Vec<String> {
    task.project_phids
        .iter()
        .filter_map(|phid| {
            let project = graph.project(phid)?;
            let column = task
                .columns
                .get(phid)
                .and_then(|col| graph.column(col))
                .map(|col| col.name.as_str());
            Some(match column {
                Some(column) => format!("{} ({})", project.display_name(), column),
                None => project.display_name().to_string(),
            })
        })
        .collect()
}
