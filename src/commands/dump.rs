use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use dumph::check::check_all;
use dumph::render::html::DEFAULT_ASSETS;
use dumph::{
    ClosureMode, CsvRenderer, ExtraField, Forest, HtmlRenderer, OutputFormat, PipelineOptions,
    Renderer, RetryOnTimeout, TaskGraph, TaskRepository, assemble,
};

/// Options for the dump command
pub struct DumpOptions {
    pub query: String,
    pub extras: Vec<ExtraField>,
    pub format: Option<OutputFormat>,
    pub recursive: bool,
    pub assets: Option<PathBuf>,
    pub host: Option<String>,
    pub config: Option<PathBuf>,
}

pub fn run(options: DumpOptions) -> Result<()> {
    let (config, arcrc) = super::load_settings(options.config.as_deref())?;

    let format = match options.format {
        Some(format) => format,
        None => config
            .output
            .format
            .parse::<OutputFormat>()
            .map_err(anyhow::Error::msg)
            .context("Invalid [output] format in config")?,
    };
    // Read the assets before any request so a bad path fails fast.
    let renderer = renderer_for(
        format,
        options.assets.as_deref().or(config.output.assets.as_deref()),
    )?;

    let client = super::connect(options.host.as_deref(), &config, &arcrc)?;
    let pipeline = PipelineOptions {
        query_key: options.query,
        mode: if options.recursive {
            ClosureMode::Transitive
        } else {
            ClosureMode::Immediate
        },
        batch_size: config.conduit.batch_size,
    };

    let output = generate(&client, &pipeline, renderer.as_ref(), &options.extras)?;
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(output.as_bytes())
        .context("Failed to write output")?;
    stdout.flush()?;
    Ok(())
}

fn renderer_for(format: OutputFormat, assets: Option<&Path>) -> Result<Box<dyn Renderer>> {
    Ok(match format {
        OutputFormat::Csv => Box::new(CsvRenderer),
        OutputFormat::Html => {
            let assets = match assets {
                Some(path) => fs::read_to_string(path)
                    .with_context(|| format!("Failed to read assets from {}", path.display()))?,
                None => DEFAULT_ASSETS.to_string(),
            };
            Box::new(HtmlRenderer::new(assets))
        }
    })
}

/// Fetch, check and render. The document is complete before anything
/// is written.
fn generate(
    repo: &dyn TaskRepository,
    pipeline: &PipelineOptions,
    renderer: &dyn Renderer,
    extras: &[ExtraField],
) -> Result<String> {
    let graph = assemble(repo, &RetryOnTimeout, pipeline)
        .with_context(|| format!("Failed to fetch query '{}'", pipeline.query_key))?;
    report_issues(&graph);

    let forest = Forest::new(&graph);
    let output = renderer
        .render(&forest, extras)
        .context("Failed to render output")?;
    Ok(output)
}

fn report_issues(graph: &TaskGraph) {
    let result = check_all(graph);
    if result.ok {
        return;
    }

    for cycle in &result.cycles {
        let tasks: Vec<String> = cycle
            .iter()
            .filter_map(|phid| graph.get_task(phid))
            .map(|t| t.monogram())
            .collect();
        tracing::warn!("dependency cycle: {}", tasks.join(" -> "));
    }
    for dangling in &result.dangling_refs {
        tracing::debug!(
            from = %dangling.from,
            to = %dangling.to,
            relation = ?dangling.relation,
            "unresolved reference"
        );
    }
    if !result.dangling_refs.is_empty() {
        tracing::info!(
            count = result.dangling_refs.len(),
            "some references did not resolve and are left out of the output"
        );
    }

    let hidden: Vec<String> = Forest::new(graph)
        .unreachable()
        .iter()
        .map(|t| t.monogram())
        .collect();
    if !hidden.is_empty() {
        tracing::warn!(
            "not rendered, only reachable through a dependency cycle: {}",
            hidden.join(", ")
        );
    }
}
