use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "fasttrack", about = "Task tracker API with realtime notifications")]
pub struct Cli {
    /// Path to a settings file; defaults to settings/dev.toml or settings/release.toml.
    #[arg(long)]
    pub settings: Option<String>,
}
