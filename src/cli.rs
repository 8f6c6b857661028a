use clap::Parser;
use std::path::PathBuf;

// Build version with runtime info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Media:  local files (image, video)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Headless story feed player
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Story feed JSON (list of user groups)
    #[arg(value_name = "FEED")]
    pub feed: PathBuf,

    /// Story to open at (0-based, across all groups)
    #[arg(short = 's', long = "start", value_name = "N", default_value_t = 0)]
    pub start: usize,

    /// Start with sound on (default: muted)
    #[arg(short = 'u', long = "unmuted")]
    pub unmuted: bool,

    /// Progress tick interval in ms (overrides settings)
    #[arg(long = "tick-ms", value_name = "MS")]
    pub tick_ms: Option<u64>,

    /// Base directory for relative media paths (default: feed's directory)
    #[arg(short = 'r', long = "root", value_name = "DIR")]
    pub media_root: Option<PathBuf>,

    /// Enable debug logging to file (default: storyplay.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["storyplay", "feed.json"]).unwrap();
        assert_eq!(args.feed, PathBuf::from("feed.json"));
        assert_eq!(args.start, 0);
        assert!(!args.unmuted);
        assert!(args.log_file.is_none());
        assert_eq!(args.verbosity, 0);
    }

    #[test]
    fn test_flags() {
        let args = Args::try_parse_from([
            "storyplay", "feed.json", "--start", "3", "--unmuted", "--tick-ms", "50", "-vv", "--log",
        ])
        .unwrap();
        assert_eq!(args.start, 3);
        assert!(args.unmuted);
        assert_eq!(args.tick_ms, Some(50));
        assert_eq!(args.verbosity, 2);
        assert_eq!(args.log_file, Some(None));
    }

    #[test]
    fn test_feed_is_required() {
        assert!(Args::try_parse_from(["storyplay"]).is_err());
    }
}
