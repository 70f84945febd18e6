//! Seed file loading
//!
//! Seeds are an ordered YAML list of crawl entry points. Any failure to read
//! or parse the file aborts crawl start and names the offending path.

use crate::model::SeedTarget;
use crate::ConfigError;
use std::path::Path;
use url::Url;

/// Loads the seed list from a YAML file
///
/// An empty file is valid and yields no seeds.
pub fn load_seeds(path: &Path) -> Result<Vec<SeedTarget>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| seed_error(path, e.to_string()))?;
    let seeds = parse_seeds(&content).map_err(|reason| seed_error(path, reason))?;

    if seeds.is_empty() {
        tracing::warn!("No seeds found in {}", path.display());
    } else {
        tracing::info!("Loaded {} seeds from {}", seeds.len(), path.display());
    }

    Ok(seeds)
}

/// Parses and validates seed YAML content
pub fn parse_seeds(content: &str) -> Result<Vec<SeedTarget>, String> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let seeds: Option<Vec<SeedTarget>> =
        serde_yaml::from_str(content).map_err(|e| format!("malformed YAML: {}", e))?;
    let seeds = seeds.unwrap_or_default();

    for (index, seed) in seeds.iter().enumerate() {
        let url = Url::parse(&seed.url)
            .map_err(|e| format!("seed #{} has invalid url '{}': {}", index + 1, seed.url, e))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(format!(
                "seed #{} url '{}' must use http or https",
                index + 1,
                seed.url
            ));
        }
    }

    Ok(seeds)
}

fn seed_error(path: &Path, reason: String) -> ConfigError {
    ConfigError::Seeds {
        path: path.to_path_buf(),
        reason,
    }
}
