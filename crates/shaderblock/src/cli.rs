use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "shaderblock",
    author,
    version,
    about = "Compose ShaderToy-style shaders and emit embed markup"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the complete GLSL ES 3.00 source generated for a `mainImage` body.
    Compose(ComposeArgs),
    /// Emit one canvas placeholder per configured block.
    Markup(MarkupArgs),
    /// Validate a config file and print it with every default filled in.
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct ComposeArgs {
    /// File holding the `mainImage` body; `-` reads standard input.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Print the shared vertex shader instead of the fragment shader.
    #[arg(long)]
    pub vertex: bool,

    /// Write the result to PATH instead of standard output.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct MarkupArgs {
    /// Embed configuration TOML file.
    #[arg(long, value_name = "FILE", env = "SHADERBLOCK_CONFIG")]
    pub config: PathBuf,

    /// Number the generated element ids from N.
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub first_id: u64,

    /// Override the default canvas size (e.g. `800x450`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_dimensions)]
    pub size: Option<(u32, u32)>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Embed configuration TOML file.
    #[arg(long, value_name = "FILE", env = "SHADERBLOCK_CONFIG")]
    pub config: PathBuf,

    /// Print JSON instead of TOML.
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_dimensions(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height".to_string())?;
    if width == 0 || height == 0 {
        return Err("dimensions must be greater than zero".into());
    }
    Ok((width, height))
}
