pub mod check;
pub mod closure;
pub mod conduit;
pub mod config;
pub mod extras;
pub mod forest;
pub mod graph;
pub mod logging;
pub mod pagination;
pub mod pipeline;
pub mod references;
pub mod render;
pub mod repository;
pub mod retry;
pub mod transactions;

#[cfg(any(test, feature = "test-support"))]
pub mod test_helpers;

pub use check::{CheckResult, check_all, check_cycles, check_dangling};
pub use closure::ClosureMode;
pub use conduit::{ConduitClient, ConduitError};
pub use config::{Arcrc, Config, Credentials, resolve_credentials};
pub use extras::{ExtraField, ExtraFieldError};
pub use forest::{Forest, Visit, WalkEvent};
pub use graph::{Column, Project, Task, TaskGraph, User};
pub use pipeline::{PipelineOptions, assemble};
pub use render::{CsvRenderer, HtmlRenderer, OutputFormat, RenderError, Renderer};
pub use repository::{SearchHit, TaskLookup, TaskRepository};
pub use retry::{MaxAttempts, NoRetry, RetryOnTimeout, RetryPolicy};
