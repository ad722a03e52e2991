//! Command-line handling for the `tcl` shell.
//!
//! Usage:
//!   tcl [-d] [-f[<rcfile>]] [-c<cmd>]... [<script> [<arg>...]]

use std::path::PathBuf;

use directories::BaseDirs;

/// Name of the per-user startup file.
const RC_FILE: &str = ".tclshrc";

/// Prompt used when `TCL_PROMPT` is unset.
const DEFAULT_PROMPT: &str = "% ";

// ── Public types ──────────────────────────────────────────────────────────────

/// Everything the shell takes from its command line.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Startup-file specification.
    pub config: ConfigFile,
    /// Commands to evaluate after the startup file (`-c<cmd>`, repeatable).
    pub commands: Vec<String>,
    /// Debug tracing (`-d`).
    pub debug: bool,
    /// Script to run instead of the interactive loop.
    pub script: Option<PathBuf>,
    /// Arguments passed to the script as `argv`.
    pub script_args: Vec<String>,
}

/// How to choose the startup file.
#[derive(Debug, Default)]
pub enum ConfigFile {
    /// Search `~/.tclshrc`, then `./.tclshrc` (default).
    #[default]
    Search,
    /// `-f` with no file argument: skip the startup file.
    Skip,
    /// `-f<file>` or `-f <file>`.
    Explicit(PathBuf),
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse the process arguments.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse `argv` without the program name.
///
/// Option processing stops at the first positional argument (the script),
/// so everything after it belongs to the script.
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // Anything after `--` is positional.
        if arg == "--" {
            i += 1;
            break;
        }

        // The script path; options after it belong to the script.
        if !arg.starts_with('-') || arg == "-" {
            break;
        }

        // Single-letter flags may be bundled: `-dcputs hi`.
        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => args.debug = true,

                // -f[<file>]
                'f' => {
                    if j + 1 < chars.len() {
                        let file: String = chars[j + 1..].iter().collect();
                        args.config = ConfigFile::Explicit(PathBuf::from(file));
                        j = chars.len();
                    } else if i + 1 < argv.len() && !argv[i + 1].starts_with('-') {
                        i += 1;
                        args.config = ConfigFile::Explicit(PathBuf::from(&argv[i]));
                    } else {
                        // bare -f
                        args.config = ConfigFile::Skip;
                    }
                }

                // -c<cmd>
                'c' => {
                    let cmd = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err("-c requires a command argument".to_owned());
                    };
                    args.commands.push(cmd);
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    if let Some((script, rest)) = argv.get(i..).unwrap_or_default().split_first() {
        args.script = Some(PathBuf::from(script));
        args.script_args = rest.to_vec();
    }

    Ok(args)
}

// ── Environment helpers ───────────────────────────────────────────────────────

/// The first existing startup file: `~/.tclshrc`, then `./.tclshrc`.
pub fn find_user_config() -> Option<PathBuf> {
    let home = BaseDirs::new().map(|b| b.home_dir().join(RC_FILE));
    home.into_iter()
        .chain(std::iter::once(PathBuf::from(".").join(RC_FILE)))
        .find(|p| p.exists())
}

/// The interactive prompt: `TCL_PROMPT`, or `"% "`.
pub fn prompt() -> String {
    std::env::var("TCL_PROMPT").unwrap_or_else(|_| DEFAULT_PROMPT.to_owned())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
