use std::process::ExitCode;

use common::types::Health;
use dotenvy::dotenv;
use models::Target;
use service::{ProviderRegistry, TargetService};
use tracing::{error, info};

const USAGE: &str = "usage: promhsd <health|list|get <id>|export <id>|delete <id>>";

fn init_logging() {
    // load .env first so RUST_LOG, LOG_FORMAT and PROMHSD_* take effect
    dotenv().ok();
    if wants_json_logs(std::env::var("LOG_FORMAT").ok().as_deref()) {
        common::utils::logging::init_logging_json();
    } else {
        common::utils::logging::init_logging_default();
    }
}

fn wants_json_logs(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.trim().eq_ignore_ascii_case("json"))
}

enum Command {
    Health,
    List,
    Get(String),
    Export(String),
    Delete(String),
}

impl Command {
    fn parse(mut args: impl Iterator<Item = String>) -> Option<Self> {
        let cmd = args.next()?;
        let id = args.next();
        match (cmd.as_str(), id) {
            ("health", None) => Some(Command::Health),
            ("list", None) => Some(Command::List),
            ("get", Some(id)) => Some(Command::Get(id)),
            ("export", Some(id)) => Some(Command::Export(id)),
            ("delete", Some(id)) => Some(Command::Delete(id)),
            _ => None,
        }
    }
}

async fn run(cmd: Command) -> anyhow::Result<serde_json::Value> {
    let cfg = configs::AppConfig::load_and_validate()?;
    let registry = ProviderRegistry::with_builtin();
    info!(kind = %cfg.storage.kind, available = ?registry.kinds(), "opening storage");
    let svc = TargetService::from_registry(&registry, &cfg.storage.kind, &cfg.storage.args).await?;

    let out = match cmd {
        Command::Health => serde_json::to_value(Health::from_check(svc.is_healthy().await))?,
        Command::List => {
            let targets = svc.list().await?;
            serde_json::json!({ "targets": targets })
        }
        Command::Get(id) => {
            let mut target = Target::with_id(id);
            svc.get(&mut target).await?;
            serde_json::json!({ "target": target })
        }
        Command::Export(id) => {
            let mut target = Target::with_id(id);
            svc.get(&mut target).await?;
            target.static_configs()
        }
        Command::Delete(id) => {
            let target = Target::with_id(id);
            svc.delete(&target).await?;
            serde_json::json!({ "id": target.id })
        }
    };
    Ok(out)
}

fn main() -> ExitCode {
    init_logging();

    let Some(cmd) = Command::parse(std::env::args().skip(1)) else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cmd)) {
        Ok(out) => {
            println!("{out}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(event = "command_failed", error = %e, "command failed");
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
