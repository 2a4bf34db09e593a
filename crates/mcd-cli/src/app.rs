use anyhow::{Context, Result};
use clap::parser::ValueSource;
use clap::ArgMatches;
use mcd_core::plugin::{FEATURE_ID, TUNE_ACTION};
use mcd_core::service::SERVICE_ID;
use mcd_core::{AppConfig, MemcachedPlugin, Registry, ServiceAction};
use mcd_exec::{CommandExecutor, DryRunExecutor, LocalExecutor, SshExecutor};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Load configuration, build the executor and run the chosen subcommand
pub(crate) async fn run(matches: &ArgMatches) -> Result<String> {
    let config = load_config(matches)?;

    if matches.get_flag("dry-run") {
        let recorder = Arc::new(DryRunExecutor::new());
        let mut output = execute(matches, recorder.clone(), &config).await?;
        for recorded in recorder.take() {
            output.push_str(&format!("\n[dry-run] {}: {}", recorded.label, recorded.command));
        }
        return Ok(output.trim_start().to_string());
    }

    execute(matches, executor(&config), &config).await
}

fn load_config(matches: &ArgMatches) -> Result<AppConfig> {
    let path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(mcd_core::DEFAULT_CONFIG_FILE));

    let config = if matches.value_source("config") == Some(ValueSource::CommandLine) {
        AppConfig::load(&path)
    } else {
        AppConfig::load_or_default(&path)
    };
    config.with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// SSH when a host is configured, local shell otherwise
pub(crate) fn executor(config: &AppConfig) -> Arc<dyn CommandExecutor> {
    let timeout = config.target.timeout();
    match config.target.ssh_target() {
        Some(target) => {
            tracing::debug!(destination = %target.destination(), "using ssh executor");
            Arc::new(SshExecutor::new(target).with_timeout(timeout))
        }
        None => {
            tracing::debug!("using local executor");
            Arc::new(LocalExecutor::new().with_timeout(timeout))
        }
    }
}

/// Run the subcommand in `matches` against `exec`
pub(crate) async fn execute(
    matches: &ArgMatches,
    exec: Arc<dyn CommandExecutor>,
    config: &AppConfig,
) -> Result<String> {
    let plugin = MemcachedPlugin::new(exec, config.memcached.clone());
    let mut registry = Registry::new();
    registry.boot(&plugin).context("Failed to register plugin")?;
    let service = registry.service_type(SERVICE_ID)?.handler();

    let Some((name, args)) = matches.subcommand() else {
        anyhow::bail!("no subcommand given");
    };

    match name {
        "status" => Ok(service.status().await.to_string()),
        "version" => Ok(service.version().await),
        "installed" => Ok(service.is_installed().await.to_string()),
        "manifest" => serde_json::to_string_pretty(&registry.manifest())
            .context("Failed to serialize manifest"),
        "tune" => {
            let input: BTreeMap<String, String> = [
                ("memory_mb", "memory-mb"),
                ("port", "port"),
                ("listen", "listen"),
            ]
            .into_iter()
            .filter_map(|(field, arg)| {
                args.get_one::<String>(arg)
                    .map(|value| (field.to_string(), value.clone()))
            })
            .collect();

            let outcome = registry
                .run_action(FEATURE_ID, TUNE_ACTION, &input)
                .await
                .context("Tuning failed")?;
            Ok(outcome.message)
        }
        other => {
            let action: ServiceAction = other.parse().map_err(anyhow::Error::msg)?;
            let event = action
                .perform(service.as_ref())
                .await
                .with_context(|| format!("memcached {action} failed"))?;

            match event {
                Some(event) => {
                    registry.dispatch(&event);
                    Ok(format!("memcached {action}: done"))
                }
                None if action == ServiceAction::Uninstall => {
                    Ok("memcached is not installed, nothing to remove".to_string())
                }
                None => Ok(format!("memcached {action}: done")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::command;
    use mcd_test_utils::FakeHost;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> ArgMatches {
        let mut argv = vec!["mcd"];
        argv.extend_from_slice(args);
        command().try_get_matches_from(argv).unwrap()
    }

    async fn run_on(host: &Arc<FakeHost>, args: &[&str]) -> Result<String> {
        execute(&parse(args), host.clone(), &AppConfig::default()).await
    }

    #[tokio::test]
    async fn test_status_and_version() {
        let host = Arc::new(FakeHost::with_memcached());
        assert_eq!(run_on(&host, &["status"]).await.unwrap(), "running");
        assert_eq!(run_on(&host, &["version"]).await.unwrap(), "1.6.14");
        assert_eq!(run_on(&host, &["installed"]).await.unwrap(), "true");
    }

    #[tokio::test]
    async fn test_install_then_uninstall() {
        let host = Arc::new(FakeHost::new());
        assert_eq!(
            run_on(&host, &["uninstall"]).await.unwrap(),
            "memcached is not installed, nothing to remove"
        );
        assert_eq!(run_on(&host, &["install"]).await.unwrap(), "memcached install: done");
        assert!(host.has_package("memcached"));
        assert_eq!(run_on(&host, &["uninstall"]).await.unwrap(), "memcached uninstall: done");
        assert!(!host.has_package("memcached"));
    }

    #[tokio::test]
    async fn test_tune_with_flags() {
        let host = Arc::new(FakeHost::with_memcached());
        let message = run_on(&host, &["tune", "--memory-mb", "512", "--listen", "0.0.0.0"])
            .await
            .unwrap();

        assert_eq!(
            message,
            "Memcached tuning applied: memory=512MB, port=11211, listen=0.0.0.0"
        );
        assert!(host
            .file_lines("/etc/memcached.conf")
            .contains(&"-m 512".to_string()));
    }

    #[tokio::test]
    async fn test_tune_validation_error_is_reported() {
        let host = Arc::new(FakeHost::with_memcached());
        let err = run_on(&host, &["tune", "--port", "70000"]).await.unwrap_err();

        assert!(format!("{err:#}").contains("port must be between 1 and 65535"));
        assert!(host.issued().is_empty());
    }

    #[tokio::test]
    async fn test_manifest_is_json() {
        let host = Arc::new(FakeHost::new());
        let json: serde_json::Value =
            serde_json::from_str(&run_on(&host, &["manifest"]).await.unwrap()).unwrap();
        assert_eq!(json["features"][0]["id"], "memcached");
        assert!(host.issued().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_lists_commands() {
        let matches = parse(&["restart", "--dry-run"]);

        let output = run(&matches).await.unwrap();
        assert_eq!(
            output,
            "memcached restart: done\n[dry-run] memcached-restart: sudo systemctl restart memcached"
        );
    }

    #[tokio::test]
    async fn test_explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let matches = command()
            .try_get_matches_from(["mcd", "status", "--config", missing.to_str().unwrap()])
            .unwrap();

        let err = run(&matches).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to load configuration"));
    }
}
