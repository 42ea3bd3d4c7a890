use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use privacy_guard::{
    CopyRedactedRequest, Guardian, GuardianConfig, ListDirRequest, ReadResourceRequest,
    SafeReadRequest, ScanTextRequest, SetPolicyRequest,
};
use tracing_subscriber::EnvFilter;

mod error;
mod input;
mod serve;

use error::CliError;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ErrorFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "privacy-guard")]
#[command(
    about = "Sandboxed file access with PII detection, redaction, and a hash-chained audit log."
)]
struct Cli {
    /// Policy file (JSON, or TOML with a `.toml` extension). Missing means defaults.
    #[arg(long, env = "PRIVACY_GUARD_POLICY", default_value = "policy.json")]
    policy: PathBuf,

    #[arg(long, env = "PRIVACY_GUARD_AUDIT_LOG", default_value = "logs/requests.jsonl")]
    audit_log: PathBuf,

    /// Destination directory for redacted copies.
    #[arg(long, env = "PRIVACY_GUARD_OUTPUT_DIR", default_value = "redacted")]
    output_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = ErrorFormat::Text)]
    error_format: ErrorFormat,

    /// Pretty-print JSON results.
    #[arg(long, default_value_t = false)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    GetPolicy,
    /// Shallow-merge a JSON object into the policy and persist it.
    SetPolicy {
        patch: String,
    },
    ListDir {
        #[arg(default_value = "")]
        relpath: String,
    },
    /// Scan literal text, or a file / stdin (`-`) with `--file`.
    ScanText {
        #[arg(required_unless_present = "file")]
        text: Option<String>,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
    Read {
        relpath: String,
        #[arg(long)]
        max_bytes: Option<u64>,
        /// Override the policy's `redact_on_read`.
        #[arg(long)]
        redact: Option<bool>,
    },
    CopyRedacted {
        relpath: String,
        #[arg(long)]
        out: Option<String>,
    },
    /// Content of `privacy://<relpath>`.
    Resource {
        uri: String,
    },
    /// Recompute every hash in the audit log; exits 2 when the chain is broken.
    VerifyAudit,
    /// Serve newline-delimited JSON requests on stdin, responses on stdout.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let error_format = cli.error_format;
    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            match error_format {
                ErrorFormat::Text => eprintln!("{err}"),
                ErrorFormat::Json => {
                    let out = error::render_json_error(&err);
                    match serde_json::to_string(&out) {
                        Ok(text) => eprintln!("{text}"),
                        Err(_) => eprintln!("{err}"),
                    }
                }
            }
            std::process::exit(1);
        }
    }
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<(), CliError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

fn parse_patch(raw: &str) -> Result<serde_json::Map<String, serde_json::Value>, CliError> {
    match serde_json::from_str(raw)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(CliError::Input("policy patch must be a JSON object".to_string())),
    }
}

fn run(cli: &Cli) -> Result<i32, CliError> {
    if let Command::VerifyAudit = &cli.command {
        let report = privacy_guard::verify_chain(&cli.audit_log)?;
        print_json(&serde_json::to_value(&report)?, cli.pretty)?;
        return Ok(if report.is_intact() { 0 } else { 2 });
    }

    let guardian = Guardian::new(GuardianConfig {
        policy_path: cli.policy.clone(),
        audit_path: cli.audit_log.clone(),
        output_dir: cli.output_dir.clone(),
    })?;

    let value = match &cli.command {
        Command::GetPolicy => serde_json::to_value(guardian.get_policy()?)?,
        Command::SetPolicy { patch } => serde_json::to_value(guardian.set_policy(SetPolicyRequest {
            patch: parse_patch(patch)?,
        })?)?,
        Command::ListDir { relpath } => serde_json::to_value(guardian.list_dir(ListDirRequest {
            relpath: relpath.clone(),
        })?)?,
        Command::ScanText { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => text.clone(),
                (None, Some(file)) => {
                    input::load_text_limited(file, guardian.policy_store().get().max_bytes)?
                }
                (None, None) => {
                    return Err(CliError::Input("no text to scan".to_string()));
                }
            };
            serde_json::to_value(guardian.scan_text(ScanTextRequest { text })?)?
        }
        Command::Read {
            relpath,
            max_bytes,
            redact,
        } => serde_json::to_value(guardian.safe_read_file(SafeReadRequest {
            relpath: relpath.clone(),
            max_bytes: *max_bytes,
            redact: *redact,
        })?)?,
        Command::CopyRedacted { relpath, out } => {
            serde_json::to_value(guardian.copy_redacted_file(CopyRedactedRequest {
                relpath: relpath.clone(),
                out_relpath: out.clone(),
            })?)?
        }
        Command::Resource { uri } => serde_json::Value::String(
            guardian.read_resource(ReadResourceRequest { uri: uri.clone() })?,
        ),
        Command::Serve => {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            serve::serve(&guardian, stdin.lock(), stdout.lock())?;
            return Ok(0);
        }
        Command::VerifyAudit => return Ok(0),
    };

    print_json(&value, cli.pretty)?;
    Ok(0)
}
