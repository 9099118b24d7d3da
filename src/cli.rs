use clap::Parser;

/// Runs declarative HTTP checks against a service and fails on the first
/// response that does not match.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Test configuration, JSON or TOML (by extension)
    #[arg(short, long, default_value = "integration-tests/config.json")]
    pub path: String,

    /// Don't start the service, test an instance that is already running
    #[arg(long)]
    pub no_start: bool,

    /// Seconds to wait for the service to accept connections
    #[arg(long, default_value_t = 30)]
    pub ready_timeout: u64,

    /// App stdout and stderr at the end
    #[arg(short = 'o', long)]
    pub app_output: bool,

    /// If this is set by running --stream-app, the output from the application
    /// will be printed as it comes
    #[arg(long)]
    pub stream_app: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}
