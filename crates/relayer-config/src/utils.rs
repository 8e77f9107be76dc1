use config::{Config, File};
use std::path::{Path, PathBuf};

use super::*;

/// A helper function that will search for all config files in the given directory and return them as a vec
/// of the paths.
///
/// Supported file extensions are:
/// - `.toml`.
/// - `.json`.
pub fn search_config_files<P: AsRef<Path>>(
    base_dir: P,
) -> bridge_relayer_utils::Result<Vec<PathBuf>> {
    // A pattern that covers all toml or json files in the config directory and subdirectories.
    let toml_pattern = format!("{}/**/*.toml", base_dir.as_ref().display());
    let json_pattern = format!("{}/**/*.json", base_dir.as_ref().display());
    tracing::trace!(
        "Loading config files from {} and {}",
        toml_pattern,
        json_pattern
    );
    let toml_files = glob::glob(&toml_pattern)?;
    let json_files = glob::glob(&json_pattern)?;
    toml_files
        .chain(json_files)
        .map(|v| v.map_err(bridge_relayer_utils::Error::from))
        .collect()
}

/// Try to parse the [`BridgeRelayerConfig`] from the given config file(s).
pub fn parse_from_files(
    files: &[PathBuf],
) -> bridge_relayer_utils::Result<BridgeRelayerConfig> {
    let mut builder = Config::builder();
    for config_file in files {
        tracing::trace!("Loading config file: {}", config_file.display());
        let ext = config_file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let format = match ext {
            "toml" => config::FileFormat::Toml,
            "json" => config::FileFormat::Json,
            _ => {
                tracing::warn!("Unknown file extension: {}", ext);
                continue;
            }
        };
        builder = builder
            .add_source(File::from(config_file.as_path()).format(format));
    }

    // also merge in the environment (with a prefix of BRIDGE).
    let builder = builder
        .add_source(config::Environment::with_prefix("BRIDGE").separator("_"));
    let cfg = builder.build()?;
    // and finally deserialize the config and post-process it
    let config: Result<
        BridgeRelayerConfig,
        serde_path_to_error::Error<config::ConfigError>,
    > = serde_path_to_error::deserialize(cfg);
    match config {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Load the configuration files and
///
/// Returns `Ok(BridgeRelayerConfig)` on success, or `Err(Error)` on failure.
///
/// # Arguments
///
/// * `path` - The path to the configuration directory
///
/// # Example
///
/// ```no_run
/// use bridge_relayer_config::utils::load;
///
/// let path = "/path/to/config";
/// let _ = load(path);
/// ```
///
/// it is the same as using the [`search_config_files`] and [`parse_from_files`] functions combined.
pub fn load<P: AsRef<Path>>(
    path: P,
) -> bridge_relayer_utils::Result<BridgeRelayerConfig> {
    parse_from_files(&search_config_files(path)?)
}

/// The postloading_process exists to validate configuration and standardize
/// the format of the configuration
pub fn postloading_process(
    mut config: BridgeRelayerConfig,
) -> bridge_relayer_utils::Result<BridgeRelayerConfig> {
    tracing::trace!("Checking configration sanity ...");
    for v in config.validators.iter_mut() {
        v.address = v.address.trim().to_lowercase();
    }
    config.tendermint.bridge_exec_address =
        config.tendermint.bridge_exec_address.trim().to_owned();
    if config.oracle_mode == OracleMode::Remote && !config.validators.is_empty()
    {
        tracing::warn!(
            "!!WARNING!!: validators are ignored when the oracle is remote"
        );
    }
    if config.evm.enabled && config.evm.bridge_registry.is_none() {
        tracing::warn!(
            "!!WARNING!!: no bridge-registry configured for ({}), \
            bridge-bank and oracle must be set explicitly",
            config.evm.name
        );
    }
    config.verify()?;

    tracing::trace!(
        "postloaded config: {}",
        serde_json::to_string_pretty(&config)?
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        port = 9000
        consensus-threshold = 80

        [[validators]]
        address = " 0xABC "
        power = 100

        [evm]
        name = "ganache"
        enabled = true
        http-endpoint = "http://localhost:8545"
        ws-endpoint = "ws://localhost:8545"
        chain-id = 1337
        bridge-registry = "0x5e8fa0ba8e39a6a4a32d2dea6b6a5e3f3bd3d4e3"

        [evm.events-watcher]
        polling-interval = 1000
        start-cursor = { height = 12, index = 3 }

        [tendermint]
        name = "chain33"
        enabled = true
        rpc-endpoint = "http://localhost:8801"
        chain-id = 33
        bridge-exec-address = "1BqP2vHkYNjSgdnTqm7pGbnphLhtEhuJFi"
    "#;

    #[test]
    fn parse_from_files_should_work() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.toml"), CONFIG).unwrap();
        let files = search_config_files(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        let config = parse_from_files(&files).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.consensus_threshold, 80);
        assert_eq!(config.validators[0].address, "0xabc");
        assert!(config.evm.ws_endpoint.is_some());
        assert_eq!(config.evm.events_watcher.polling_interval, 1000);
        assert_eq!(
            config.evm.events_watcher.start_cursor,
            Some(crate::event_watcher::StartCursor {
                height: 12,
                index: 3
            })
        );
        assert_eq!(config.tendermint.events_watcher.polling_interval, 5000);
    }

    #[test]
    fn invalid_config_should_fail() {
        let dir = tempfile::tempdir().unwrap();
        let bad = CONFIG.replace("consensus-threshold = 80", "consensus-threshold = 0");
        std::fs::write(dir.path().join("main.toml"), bad).unwrap();
        assert!(matches!(
            load(dir.path()),
            Err(bridge_relayer_utils::Error::InvalidConfig(_))
        ));
    }
}
