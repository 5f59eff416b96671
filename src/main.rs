use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::{miette, IntoDiagnostic, Result};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

use rulegate::authz::{parse_text_rule, PolicyEnforcer};
use rulegate::settings::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "rulegate",
    version,
    about = "Policy-as-code authorization engine"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a rule; exits non-zero when denied
    Check {
        /// Rule name to enforce
        rule: String,
        /// Target attributes as a JSON object
        #[arg(long, default_value = "{}")]
        target: String,
        /// Credentials as a JSON object, e.g. '{"roles": ["admin"]}'
        #[arg(long, default_value = "{}")]
        creds: String,
    },
    /// Print the canonical form of a rule string
    Parse {
        text: String,
    },
    /// Print the loaded rules in canonical form
    Show {
        /// Only this rule
        name: Option<String>,
    },
}

#[derive(Serialize)]
struct CheckResponse<'a> {
    rule: &'a str,
    allowed: bool,
}

fn main() -> Result<ExitCode> {
    // logging goes to stderr, results to stdout
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Parse { text } = &cli.command {
        println!("{}", parse_text_rule(text));
        return Ok(ExitCode::SUCCESS);
    }

    let settings = Settings::load(&cli.config)?;
    tracing::debug!(?settings, "Loaded configuration");

    let enforcer = PolicyEnforcer::from_opts(&settings.policy)?;

    match cli.command {
        Command::Check {
            rule,
            target,
            creds,
        } => {
            let target: Value = serde_json::from_str(&target).into_diagnostic()?;
            let creds: Value = serde_json::from_str(&creds).into_diagnostic()?;
            let allowed = enforcer.enforce(&rule, &target, &creds);
            let response = CheckResponse {
                rule: &rule,
                allowed,
            };
            println!("{}", serde_json::to_string(&response).into_diagnostic()?);
            Ok(if allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Show { name } => {
            let store = enforcer.snapshot();
            match name {
                Some(name) => {
                    let check = store
                        .get(&name)
                        .ok_or_else(|| miette!("rule `{name}` is not defined"))?;
                    println!("{check}");
                }
                None => {
                    let rendered = serde_json::to_string_pretty(&store.to_json()).into_diagnostic()?;
                    println!("{rendered}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Parse { .. } => Ok(ExitCode::SUCCESS),
    }
}
