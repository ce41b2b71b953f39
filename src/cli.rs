use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// safe-buffers CLI options.
#[derive(Debug, Parser)]
#[command(
    name = "safe-buffers",
    version,
    about = "Find unsafe buffer usage in exported C/C++ syntax trees",
    args_conflicts_with_subcommands = true,
    subcommand_precedence_over_arg = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub check: CheckArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze exported translation units.
    Check(CheckArgs),

    /// List finding categories.
    Categories,
}

#[derive(Debug, Clone, ClapArgs)]
pub struct CheckArgs {
    /// Syntax-tree exports (`*.json`) or directories containing them.
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Path to a safe-buffers.toml; discovered from the first PATH otherwise.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Analyze as this language regardless of what the export records.
    #[arg(long, value_enum)]
    pub language: Option<LanguageArg>,

    /// Report unsafe operations only; never compute fixes.
    #[arg(long)]
    pub no_suggestions: bool,

    /// Apply suggested fixes to the analyzed source files.
    #[arg(long)]
    pub fix: bool,

    /// With --fix, print a unified diff instead of writing files.
    #[arg(long, requires = "fix")]
    pub diff: bool,

    /// With --fix, also apply edits that contain `<# ... #>` placeholders.
    #[arg(long, requires = "fix")]
    pub allow_placeholders: bool,

    /// Exit with code 1 if any diagnostics are emitted.
    #[arg(long)]
    pub deny_warnings: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
    Github,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LanguageArg {
    #[value(name = "c++", alias = "cxx", alias = "cpp")]
    Cxx,
    C,
}

impl From<LanguageArg> for crate::ast::Language {
    fn from(arg: LanguageArg) -> Self {
        match arg {
            LanguageArg::Cxx => crate::ast::Language::Cxx,
            LanguageArg::C => crate::ast::Language::C,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_paths_mean_check() {
        let args = Args::try_parse_from(["safe-buffers", "out/a.json", "--format", "json"])
            .expect("parses");
        assert!(args.command.is_none());
        assert_eq!(args.check.paths, vec![PathBuf::from("out/a.json")]);
        assert!(matches!(args.check.format, OutputFormat::Json));
    }

    #[test]
    fn diff_requires_fix() {
        assert!(Args::try_parse_from(["safe-buffers", "check", "a.json", "--diff"]).is_err());
        let args = Args::try_parse_from([
            "safe-buffers",
            "check",
            "a.json",
            "--fix",
            "--diff",
            "--language",
            "c++",
        ])
        .expect("parses");
        let Some(Command::Check(check)) = args.command else {
            panic!("expected check subcommand");
        };
        assert!(check.fix && check.diff);
        assert_eq!(check.language, Some(LanguageArg::Cxx));
    }
}
