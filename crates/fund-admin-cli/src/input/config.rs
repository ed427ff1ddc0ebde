use fund_admin_core::EngineConfig;
use log::debug;

use super::file;

/// Load engine settings from a YAML or JSON file, chosen by extension.
/// Without a path the built-in defaults apply.
pub fn load_config(path: Option<&str>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };

    let contents = file::read_text(path)?;
    let lower = path.to_ascii_lowercase();
    let config: EngineConfig = if lower.ends_with(".yaml") || lower.ends_with(".yml") {
        serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", path, e))?
    } else {
        serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse '{}': {}", path, e))?
    };
    config.validate()?;

    debug!("engine config loaded from {path}: {config:?}");
    Ok(config)
}
