use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "packscout",
    version,
    about = "Buildpack detection and release manifest rendering",
    long_about = "packscout classifies a source tree into a buildpack from file signals \
                  and renders release manifests (such as a Homebrew formula) from \
                  templates, with golden snapshot verification of the rendered output."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Enable verbose logging (equivalent to --log-level debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Render a release manifest from a template",
        long_about = "Renders a release manifest from a template and release metadata.\n\n\
                      Examples:\n  \
                      packscout render --binary jx --version 1.0.2 --checksum abc123 \\\n    \
                      --url-template 'https://example.com/{{binary_name}}-{{version}}.tar.gz' \\\n    \
                      --field description='CLI tool' --field homepage=https://example.com \\\n    \
                      --shell bash --shell zsh\n  \
                      packscout render --template formula.rb.tmpl --artifact dist/jx.tar.gz ..."
    )]
    Render(RenderArgs),

    #[command(
        about = "Compare current output against golden artifacts",
        long_about = "Compares every current file against its golden counterpart and reports \
                      all mismatches. Exits 1 if any pair differs.\n\n\
                      Examples:\n  \
                      packscout verify --current out/jx.rb --golden golden/jx.rb\n  \
                      packscout verify --current out/ --golden golden/ --format json"
    )]
    Verify(VerifyArgs),

    #[command(
        about = "Overwrite golden artifacts with current output",
        long_about = "Copies current output over the golden artifacts. This is the only \
                      command that writes goldens.\n\n\
                      Examples:\n  \
                      packscout regenerate --current out/ --golden golden/"
    )]
    Regenerate(RegenerateArgs),

    #[command(
        about = "Classify a project into a buildpack",
        long_about = "Scans a project directory and prints the selected buildpack, or \
                      'unknown'. Exits 2 when the best candidates tie.\n\n\
                      Examples:\n  \
                      packscout classify\n  \
                      packscout classify /path/to/repo --format json\n  \
                      packscout classify . --pack go"
    )]
    Classify(ClassifyArgs),

    #[command(
        about = "Print the raw signals found in a project",
        long_about = "Scans a project directory and prints every signal and every file \
                      that was skipped, without classifying.\n\n\
                      Examples:\n  \
                      packscout scan /path/to/repo --format yaml"
    )]
    Scan(ScanArgs),

    #[command(about = "Print the sha256 digest of a file")]
    Checksum(ChecksumArgs),

    #[command(about = "Print the effective configuration")]
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct RenderArgs {
    /// Template file, or `builtin` for the Homebrew formula
    #[arg(short, long, default_value = "builtin")]
    pub template: String,

    #[arg(short, long)]
    pub binary: String,

    #[arg(long = "version")]
    pub release_version: String,

    /// Precomputed checksum of the release artifact
    #[arg(long, required_unless_present = "artifact", conflicts_with = "artifact")]
    pub checksum: Option<String>,

    /// Local artifact to hash with sha256
    #[arg(long)]
    pub artifact: Option<PathBuf>,

    /// Download URL template; may reference {{binary_name}} and {{version}}
    #[arg(short, long)]
    pub url_template: String,

    #[arg(long, default_value = "sha256")]
    pub checksum_algorithm: String,

    /// Shell to install completions for (repeatable)
    #[arg(short, long = "shell", value_enum)]
    pub shells: Vec<ShellArg>,

    /// Extra header field as key=value (repeatable)
    #[arg(short = 'F', long = "field", value_parser = parse_key_value)]
    pub fields: Vec<(String, String)>,

    /// Reject supplied fields the template never references
    #[arg(long)]
    pub strict: bool,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Current output file or directory
    #[arg(long)]
    pub current: PathBuf,

    /// Golden artifact file or directory
    #[arg(long)]
    pub golden: PathBuf,

    /// Context lines around each diff hunk
    #[arg(long, default_value_t = crate::golden::DEFAULT_CONTEXT_LINES)]
    pub context: usize,

    #[arg(short, long, value_enum, default_value = "human")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug)]
pub struct RegenerateArgs {
    #[arg(long)]
    pub current: PathBuf,

    #[arg(long)]
    pub golden: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ClassifyArgs {
    /// Project directory (defaults to the current directory)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Force a buildpack instead of detecting one
    #[arg(short, long)]
    pub pack: Option<String>,

    /// Registry file (YAML or TOML) overriding PACKSCOUT_REGISTRY
    #[arg(short, long)]
    pub registry: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "human")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug)]
pub struct ScanArgs {
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    #[arg(short, long)]
    pub registry: Option<PathBuf>,

    /// Walk top-level directories on separate threads
    #[arg(long)]
    pub parallel: bool,

    #[arg(short, long, value_enum, default_value = "human")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug)]
pub struct ChecksumArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[arg(short, long, value_enum, default_value = "human")]
    pub format: OutputFormatArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShellArg {
    Bash,
    Zsh,
    Fish,
}

impl From<ShellArg> for crate::manifest::Shell {
    fn from(arg: ShellArg) -> Self {
        match arg {
            ShellArg::Bash => crate::manifest::Shell::Bash,
            ShellArg::Zsh => crate::manifest::Shell::Zsh,
            ShellArg::Fish => crate::manifest::Shell::Fish,
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}
