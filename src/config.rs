//! Command line configuration

use std::ffi::OsString;

use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};

use crate::action::ActionConfig;
use crate::hotkey::keys::KEY_NAME_HELP;
use crate::hotkey::{codes, parse_key_name, KeyCode};

#[derive(Parser, Debug)]
#[command(name = "hyperkey")]
#[command(version, about = "Remap Caps Lock to a hyper key (Cmd+Ctrl+Opt) with a quick-press action")]
#[command(after_help = KEY_NAME_HELP)]
struct Cli {
    /// Disable quick press functionality; Caps Lock only acts as a hyper key
    #[arg(long, action = ArgAction::SetTrue)]
    no_quick_press: bool,

    /// Include Shift in the hyper key (Cmd+Ctrl+Opt+Shift)
    #[arg(long, action = ArgAction::SetTrue)]
    include_shift: bool,

    /// Send KEY on a quick press instead of toggling Caps Lock
    #[arg(long, value_name = "KEY", value_parser = parse_custom_key)]
    custom_key: Option<KeyCode>,

    /// Stray words are ignored; only unknown flags are errors
    #[arg(hide = true)]
    _extra: Vec<OsString>,
}

fn parse_custom_key(input: &str) -> Result<KeyCode, String> {
    let code = parse_key_name(input).ok_or_else(|| format!("invalid key code '{input}'"))?;
    if code == codes::F18 {
        return Err(format!("key code {code} is reserved for the hyper trigger"));
    }
    Ok(code)
}

/// Immutable runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Run the quick-press action on an uninterrupted tap
    pub normal_quick_press: bool,
    /// Fold Shift into the hyper combination
    pub include_shift: bool,
    /// What a quick press does
    pub action: ActionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            normal_quick_press: true,
            include_shift: false,
            action: ActionConfig::default(),
        }
    }
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            normal_quick_press: !cli.no_quick_press,
            include_shift: cli.include_shift,
            action: cli
                .custom_key
                .map(ActionConfig::EmitKey)
                .unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load configuration from the process arguments
    pub fn from_args() -> Result<Self, clap::Error> {
        Self::try_parse_from(std::env::args_os())
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        match Cli::try_parse_from(args.clone()) {
            Ok(cli) => Ok(cli.into()),
            Err(e) if e.use_stderr() => Err(help_or_version(&args).unwrap_or(e)),
            Err(e) => Err(e),
        }
    }
}

/// Help and version win over usage errors, wherever they appear
fn help_or_version(args: &[OsString]) -> Option<clap::Error> {
    let (bin, rest) = args.split_first()?;
    let flag = rest
        .iter()
        .find(|arg| matches!(arg.to_str(), Some("--help" | "-h" | "--version" | "-V")))?;
    Cli::try_parse_from([bin.clone(), flag.clone()]).err()
}

/// Print a parse outcome that stops startup and return the exit code.
///
/// Help and version exit with 0, usage errors with 1.
pub fn report_parse_error(err: &clap::Error) -> i32 {
    let _ = err.print();
    if !err.use_stderr() {
        return 0;
    }
    if matches!(err.kind(), ErrorKind::InvalidValue | ErrorKind::ValueValidation) {
        eprintln!("\n{}\n\n{}", Cli::command().render_usage(), KEY_NAME_HELP);
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, clap::Error> {
        Config::try_parse_from(std::iter::once("hyperkey").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.action, ActionConfig::ToggleExclusiveLock);
        assert!(config.normal_quick_press);
        assert!(!config.include_shift);
    }

    #[test]
    fn test_flags() {
        let config = parse(&["--no-quick-press", "--include-shift"]).unwrap();
        assert!(!config.normal_quick_press);
        assert!(config.include_shift);
    }

    #[test]
    fn test_custom_key_by_name() {
        let config = parse(&["--custom-key", "Escape"]).unwrap();
        assert_eq!(config.action, ActionConfig::EmitKey(codes::ESCAPE));
    }

    #[test]
    fn test_custom_key_numeric() {
        let config = parse(&["--custom-key", "49"]).unwrap();
        assert_eq!(config.action, ActionConfig::EmitKey(codes::SPACE));
    }

    #[test]
    fn test_invalid_custom_key() {
        let err = parse(&["--custom-key", "zz"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(err.use_stderr());

        let err = parse(&["--custom-key", "128"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_trigger_code_rejected() {
        let err = parse(&["--custom-key", "79"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_missing_custom_key_value() {
        let err = parse(&["--custom-key"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_unknown_flag() {
        let err = parse(&["--bogus"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_help_and_version_are_not_errors() {
        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert!(!err.use_stderr());

        let err = parse(&["--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
        assert!(!err.use_stderr());
    }

    #[test]
    fn test_positional_words_are_ignored() {
        assert_eq!(parse(&["extra"]).unwrap(), Config::default());

        let config = parse(&["--include-shift", "foo", "bar"]).unwrap();
        assert!(config.include_shift);
    }

    #[test]
    fn test_help_wins_over_usage_errors() {
        let err = parse(&["--custom-key", "zz", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);

        let err = parse(&["--bogus", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
        assert!(!err.use_stderr());

        let err = parse(&["--custom-key", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }
}
