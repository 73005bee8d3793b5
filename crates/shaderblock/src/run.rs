use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use embedconfig::{BlockSource, EmbedConfig};
use renderer::{ComposedSources, EmbedOptions, InstanceContext, InstanceManager, MarkupDocument};
use tracing_subscriber::EnvFilter;

use crate::cli::{ComposeArgs, ConfigArgs, MarkupArgs};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

pub fn compose(args: ComposeArgs) -> Result<()> {
    let body = read_input(&args.input)?;
    let sources = ComposedSources::new(&body);
    let text = if args.vertex {
        sources.vertex.to_string()
    } else {
        sources.fragment
    };
    tracing::debug!(
        input = %args.input.display(),
        vertex = args.vertex,
        bytes = text.len(),
        "composed shader source"
    );
    write_output(args.output.as_deref(), &text)
}

pub fn markup(args: MarkupArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some((width, height)) = args.size {
        config.surface.width = width;
        config.surface.height = height;
    }
    let base = config_dir(&args.config);

    let ids =
        InstanceContext::with_prefix(config.surface.id_prefix.as_str()).starting_at(args.first_id);
    let mut manager = InstanceManager::new(ids, MarkupDocument::new(), embed_options(&config));
    for block in config.resolved_blocks() {
        let index = block.index;
        let source = load_block_source(block.source.relative_to(&base))
            .with_context(|| format!("failed to load shader for block {index}"))?;
        let id = manager.create_instance_with_size(source, (block.width, block.height));
        tracing::debug!(block = index, id = %id, "placed shader block");
    }

    if manager.pending_count() == 0 {
        tracing::warn!(config = %args.config.display(), "config defines no blocks");
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for fragment in manager.document().fragments() {
        writeln!(out, "{fragment}")?;
    }
    Ok(())
}

pub fn config(args: ConfigArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let rendered = if args.json {
        let mut text = serde_json::to_string_pretty(&config)
            .context("failed to serialise config as JSON")?;
        text.push('\n');
        text
    } else {
        config
            .to_toml_string()
            .context("failed to serialise config as TOML")?
    };
    tracing::info!(
        config = %args.config.display(),
        blocks = config.blocks.len(),
        "configuration is valid"
    );
    write_output(None, &rendered)
}

/// Maps the page-level configuration onto the options every instance uses.
pub fn embed_options(config: &EmbedConfig) -> EmbedOptions {
    EmbedOptions {
        surface_size: config.surface_size(),
        canvas_class: config.surface.class.clone(),
        frame_interval: config.render.interval,
        time_wrap: config.render.time_wrap,
        clear_colour: config.render.clear_colour,
    }
}

fn load_config(path: &Path) -> Result<EmbedConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    EmbedConfig::from_toml_str(&raw)
        .with_context(|| format!("failed to load config {}", path.display()))
}

fn config_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn load_block_source(source: BlockSource) -> Result<String> {
    match source {
        BlockSource::Inline(body) => Ok(body),
        BlockSource::Path(path) => fs::read_to_string(&path)
            .with_context(|| format!("failed to read shader {}", path.display())),
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut body = String::new();
        io::stdin()
            .read_to_string(&mut body)
            .context("failed to read shader from stdin")?;
        return Ok(body);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read shader {}", path.display()))
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote output");
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            out.write_all(text.as_bytes())?;
            out.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn maps_config_onto_embed_options() {
        let config = EmbedConfig::from_toml_str(
            r#"
version = 1
[surface]
width = 320
height = 200
class = "hero"
[render]
interval = "40ms"
time_wrap = "10s"
clear_colour = [0.1, 0.2, 0.3, 1.0]
"#,
        )
        .unwrap();
        let options = embed_options(&config);
        assert_eq!(options.surface_size, (320, 200));
        assert_eq!(options.canvas_class, "hero");
        assert_eq!(options.frame_interval, Duration::from_millis(40));
        assert_eq!(options.time_wrap, Duration::from_secs(10));
        assert_eq!(options.clear_colour, [0.1, 0.2, 0.3, 1.0]);
    }

    #[test]
    fn default_config_matches_renderer_defaults() {
        let config = EmbedConfig::from_toml_str("version = 1").unwrap();
        assert_eq!(embed_options(&config), EmbedOptions::default());
    }

    #[test]
    fn config_dir_is_parent_of_file() {
        assert_eq!(config_dir(Path::new("site.toml")), PathBuf::from(""));
        assert_eq!(config_dir(Path::new("/srv/site.toml")), PathBuf::from("/srv"));
    }
}
