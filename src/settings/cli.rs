use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "latchkey", about = "Token lifecycle service")]
pub struct Cli {
    /// Path to a settings file, overriding the build-profile default.
    #[arg(long)]
    pub settings: Option<String>,
}
