use crate::extras::{ExtraField, task_record};
use crate::forest::Forest;

use super::{RenderError, Renderer, format_points, owner_handle, project_labels};

const HEADER: [&str; 9] = [
    "Toplevel", "Task", "Parent", "Points", "Priority", "Status", "Title", "Owner", "Projects",
];

/// One row per task visit, in walk order.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvRenderer;

impl Renderer for CsvRenderer {
    fn render(&self, forest: &Forest<'_>, extras: &[ExtraField]) -> Result<String, RenderError> {
        let graph = forest.graph();
        let mut writer = ::csv::Writer::from_writer(Vec::new());

        let mut header: Vec<&str> = HEADER.to_vec();
        header.extend(extras.iter().map(|f| f.name.as_str()));
        writer.write_record(&header)?;

        for visit in forest.visits() {
            let task = visit.task;
            let mut row = vec![
                visit.root.id.to_string(),
                task.id.to_string(),
                visit.parent.map(|p| p.id.to_string()).unwrap_or_default(),
                format_points(task.points),
                task.priority.clone(),
                task.status_name.clone(),
                task.title.clone(),
                owner_handle(task, graph).unwrap_or_default(),
                project_labels(task, graph).join(", "),
            ];
            if !extras.is_empty() {
                let record = task_record(task, graph);
                row.extend(extras.iter().map(|f| f.extract(&record).unwrap_or_default()));
            }
            writer.write_record(&row)?;
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TaskGraph;
    use crate::test_helpers::{make_task, make_task_with_deps, make_user};

    fn render(graph: &TaskGraph, extras: &[ExtraField]) -> Vec<String> {
        let out = CsvRenderer.render(&Forest::new(graph), extras).unwrap();
        out.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_header_and_rows() {
        let mut graph = TaskGraph::new();
        let mut five = make_task_with_deps(5, "Five", &[3]);
        five.points = Some(2.0);
        graph.insert_task(five);
        graph.insert_task(make_task(3, "Three"));

        let lines = render(&graph, &[]);
        assert_eq!(
            lines,
            vec![
                "Toplevel,Task,Parent,Points,Priority,Status,Title,Owner,Projects",
                "5,5,,2,Normal,Open,Five,,",
                "5,3,5,,Normal,Open,Three,,",
            ]
        );
    }

    #[test]
    fn test_extras_columns() {
        let mut graph = TaskGraph::new();
        graph.insert_user(make_user("PHID-USER-1", "alice"));
        let mut owned = make_task(2, "Owned");
        owned.owner_phid = Some("PHID-USER-1".to_string());
        graph.insert_task(owned);
        graph.insert_task(make_task(1, "Unowned"));

        let extras: Vec<ExtraField> = vec!["Login:owner.userName".parse().unwrap()];
        let lines = render(&graph, &extras);
        assert_eq!(lines[0], "Toplevel,Task,Parent,Points,Priority,Status,Title,Owner,Projects,Login");
        assert_eq!(lines[1], "2,2,,,Normal,Open,Owned,@alice,,alice");
        assert_eq!(lines[2], "1,1,,,Normal,Open,Unowned,,,");
    }

    #[test]
    fn test_fields_are_quoted() {
        let mut graph = TaskGraph::new();
        graph.insert_task(make_task(1, "Fix \"quotes\", commas"));

        let lines = render(&graph, &[]);
        assert_eq!(lines[1], "1,1,,,Normal,Open,\"Fix \"\"quotes\"\", commas\",,");
    }

    #[test]
    fn test_empty_graph_is_just_the_header() {
        let lines = render(&TaskGraph::new(), &[]);
        assert_eq!(lines.len(), 1);
    }
}
