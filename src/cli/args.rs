//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::path::PathBuf;

/// Live LaTeX sync: compile remotely, preview locally
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Project directory (default: current directory)
    #[arg(value_name = "PROJECT_DIR", value_hint = clap::ValueHint::DirPath)]
    pub path: Option<PathBuf>,

    /// Keep running: serve a live preview and resync on every change
    #[arg(short, long)]
    pub watch: bool,

    /// Output PDF file name (relative to project root)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    /// Compile service WebSocket URL
    #[arg(short, long, value_name = "URL")]
    pub server: Option<String>,

    /// Base port of the preview server
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Config file path (default: <PROJECT_DIR>/qtex.toml)
    #[arg(short = 'C', long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Print debug output
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    #[test]
    fn test_command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_flag_is_not_verbose() {
        let err = Cli::try_parse_from(["qtex", "-V"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);

        let cli = Cli::try_parse_from(["qtex", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["qtex"]).unwrap();
        assert!(cli.path.is_none());
        assert!(!cli.watch);
        assert!(cli.config.is_none());
        assert_eq!(cli.color, ColorChoice::Auto);
    }

    #[test]
    fn test_watch_with_overrides() {
        let cli = Cli::try_parse_from([
            "qtex", "paper", "-w", "-o", "paper.pdf", "-s", "ws://localhost:9000/ws", "-p",
            "5000", "-v",
        ])
        .unwrap();
        assert_eq!(cli.path, Some(PathBuf::from("paper")));
        assert!(cli.watch);
        assert_eq!(cli.output.as_deref(), Some("paper.pdf"));
        assert_eq!(cli.server.as_deref(), Some("ws://localhost:9000/ws"));
        assert_eq!(cli.port, Some(5000));
        assert!(cli.verbose);
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(Cli::try_parse_from(["qtex", "-p", "70000"]).is_err());
    }
}
