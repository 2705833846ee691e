use chrono::{DateTime, Utc};

use crate::extras::{ExtraField, task_record};
use crate::forest::{Forest, WalkEvent};
use crate::graph::{Task, TaskGraph};

use super::{RenderError, Renderer, format_points, owner_handle, project_labels};

/// Stylesheet and filter script used when no `--assets` file is given.
pub const DEFAULT_ASSETS: &str = include_str!("assets/report.html");

/// A standalone HTML page: the forest as nested lists, with filter
/// checkboxes per project and per priority.
#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    assets: String,
    generated: DateTime<Utc>,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_ASSETS)
    }
}

impl HtmlRenderer {
    /// `assets` goes into `<head>` as is.
    pub fn new(assets: impl Into<String>) -> Self {
        Self {
            assets: assets.into(),
            generated: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, generated: DateTime<Utc>) -> Self {
        self.generated = generated;
        self
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, forest: &Forest<'_>, extras: &[ExtraField]) -> Result<String, RenderError> {
        let graph = forest.graph();
        let mut lines = Vec::new();

        lines.push("<!DOCTYPE html>".to_string());
        lines.push("<html>".to_string());
        lines.push("<head>".to_string());
        lines.push("<meta charset=\"utf-8\">".to_string());
        lines.push("<title>Task dump</title>".to_string());
        lines.push(self.assets.trim_end().to_string());
        lines.push("</head>".to_string());

        let open_statuses: Vec<&str> = graph.open_statuses().iter().map(String::as_str).collect();
        lines.push(format!(
            "<body data-open-statuses=\"{}\">",
            escape_html(&open_statuses.join(","))
        ));
        lines.push(format!(
            "<p class=\"summary\">{} tasks, {} open</p>",
            graph.len(),
            graph.open_count()
        ));

        lines.push("<form class=\"filters\">".to_string());
        lines.push("<fieldset class=\"projects\"><legend>Projects</legend>".to_string());
        // unresolved projects are listed by their PHID
        for phid in graph.project_phids() {
            let label = graph
                .project(&phid)
                .map(|project| project.display_name())
                .unwrap_or(phid.as_str());
            lines.push(format!(
                "<label><input type=\"checkbox\" name=\"project\" value=\"{}\" checked> {}</label>",
                escape_html(&phid),
                escape_html(label)
            ));
        }
        lines.push("</fieldset>".to_string());
        lines.push("<fieldset class=\"priorities\"><legend>Priorities</legend>".to_string());
        for (color, name) in graph.priorities() {
            lines.push(format!(
                "<label class=\"priority-{0}\"><input type=\"checkbox\" name=\"priority\" value=\"{0}\" checked> {1}</label>",
                escape_html(color),
                escape_html(name)
            ));
        }
        lines.push("</fieldset>".to_string());
        lines.push("</form>".to_string());

        lines.push("<ul class=\"forest\">".to_string());
        let events = forest.walk();
        // whether each open <li> also opened a nested <ul>
        let mut nested: Vec<bool> = Vec::new();
        for (i, event) in events.iter().enumerate() {
            match event {
                WalkEvent::Enter(visit) => {
                    let task = visit.task;
                    let state = if task.is_closed { "closed" } else { "open" };
                    lines.push(format!(
                        "<li data-state=\"{}\" data-status=\"{}\" data-priority=\"{}\" data-root=\"{}\" data-toplevel=\"{}\" data-projects=\"{}\">",
                        state,
                        escape_html(&task.status),
                        escape_html(&task.priority_color),
                        visit.parent.is_none(),
                        visit.root.id,
                        escape_html(&task.project_phids.join(","))
                    ));
                    lines.push(task_summary(task, graph));
                    if !extras.is_empty() {
                        lines.extend(extras_block(task, graph, extras));
                    }

                    let has_children = matches!(events.get(i + 1), Some(WalkEvent::Enter(_)));
                    if has_children {
                        lines.push("<ul>".to_string());
                    }
                    nested.push(has_children);
                }
                WalkEvent::Leave(_) => {
                    if nested.pop().unwrap_or(false) {
                        lines.push("</ul>".to_string());
                    }
                    lines.push("</li>".to_string());
                }
            }
        }
        lines.push("</ul>".to_string());

        lines.push(format!(
            "<footer>Generated {}</footer>",
            self.generated.format("%Y-%m-%d %H:%M UTC")
        ));
        lines.push("</body>".to_string());
        lines.push("</html>".to_string());

        let mut out = lines.join("\n");
        out.push('\n');
        Ok(out)
    }
}

fn task_summary(task: &Task, graph: &TaskGraph) -> String {
    let mut parts = vec![format!(
        "<a href=\"{}\">{}</a>",
        escape_html(&task.uri),
        task.monogram()
    )];
    parts.push(format!("<span class=\"title\">{}</span>", escape_html(&task.title)));
    parts.push(format!(
        "<span class=\"status\">{}</span>",
        escape_html(&task.status_name)
    ));
    let points = format_points(task.points);
    if !points.is_empty() {
        parts.push(format!("<span class=\"points\">{}</span>", points));
    }
    if let Some(owner) = owner_handle(task, graph) {
        parts.push(format!("<span class=\"owner\">{}</span>", escape_html(&owner)));
    }
    for label in project_labels(task, graph) {
        parts.push(format!("<span class=\"project\">{}</span>", escape_html(&label)));
    }
    parts.join(" ")
}

fn extras_block(task: &Task, graph: &TaskGraph, extras: &[ExtraField]) -> Vec<String> {
    let record = task_record(task, graph);
    let entries: Vec<String> = extras
        .iter()
        .filter_map(|field| {
            field.extract(&record).map(|value| {
                format!(
                    "<dt>{}</dt><dd>{}</dd>",
                    escape_html(&field.name),
                    escape_html(&value)
                )
            })
        })
        .collect();
    if entries.is_empty() {
        return Vec::new();
    }

    let mut block = vec!["<dl class=\"extras\">".to_string()];
    block.extend(entries);
    block.push("</dl>".to_string());
    block
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
