//! INI parsing logic for converting `Ini` → `TileChainConfig`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use super::{ChainLayout, ConfigError, TileChainConfig};
use crate::provider::PoolConfig;
use crate::tile::MAXIMUM_ZOOM;

/// Parse an `Ini` object into a `TileChainConfig`.
///
/// Starts from `TileChainConfig::default()` and overlays any values found.
pub(super) fn parse_ini(ini: &Ini) -> Result<TileChainConfig, ConfigError> {
    let mut config = TileChainConfig::default();

    // [source] section
    if let Some(section) = ini.section(Some("source")) {
        if let Some(v) = section.get("name") {
            let v = v.trim();
            if v.is_empty() || v.contains('/') {
                return Err(invalid("source", "name", v, "must be non-empty and contain no '/'"));
            }
            config.source.name = v.to_string();
        }
        if let Some(v) = section.get("url") {
            config.source.url_template = v.trim().to_string();
        }
        if let Some(v) = section.get("min_zoom") {
            config.source.min_zoom = parse_zoom("source", "min_zoom", v)?;
        }
        if let Some(v) = section.get("max_zoom") {
            config.source.max_zoom = parse_zoom("source", "max_zoom", v)?;
        }
        if config.source.min_zoom > config.source.max_zoom {
            return Err(invalid(
                "source",
                "min_zoom",
                &config.source.min_zoom.to_string(),
                "must not exceed max_zoom",
            ));
        }
    }

    // [storage] section
    if let Some(section) = ini.section(Some("storage")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.storage.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("extension") {
            config.storage.extension = v.trim().to_string();
        }
        if let Some(v) = section.get("archive_directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.storage.archive_directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("expiry_days") {
            let days: u64 = parse_number("storage", "expiry_days", v)?;
            config.storage.expiry = Duration::from_secs(days * 24 * 60 * 60);
        }
    }

    // [memory_cache] section
    if let Some(section) = ini.section(Some("memory_cache")) {
        if let Some(v) = section.get("max_size") {
            config.memory_cache_bytes =
                parse_size(v).map_err(|reason| invalid("memory_cache", "max_size", v, &reason))?;
        }
    }

    // [chain] section
    if let Some(section) = ini.section(Some("chain")) {
        if let Some(v) = section.get("layout") {
            config.layout = ChainLayout::from_str(v)
                .map_err(|_| invalid("chain", "layout", v, "must be 'smart' or 'layered'"))?;
        }
    }

    // [pools] section
    if let Some(section) = ini.section(Some("pools")) {
        let mut fs_threads = config.filesystem_pool.threads;
        let mut fs_queue = config.filesystem_pool.queue_capacity;
        let mut dl_threads = config.download_pool.threads;
        let mut dl_queue = config.download_pool.queue_capacity;

        if let Some(v) = section.get("filesystem_threads") {
            fs_threads = parse_positive("pools", "filesystem_threads", v)?;
        }
        if let Some(v) = section.get("filesystem_queue") {
            fs_queue = parse_positive("pools", "filesystem_queue", v)?;
        }
        if let Some(v) = section.get("download_threads") {
            dl_threads = parse_positive("pools", "download_threads", v)?;
        }
        if let Some(v) = section.get("download_queue") {
            dl_queue = parse_positive("pools", "download_queue", v)?;
        }

        config.filesystem_pool = PoolConfig::new(fs_threads, fs_queue);
        config.download_pool = PoolConfig::new(dl_threads, dl_queue);
    }

    // [download] section
    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = section.get("timeout") {
            config.download.timeout_secs = parse_positive::<u64>("download", "timeout", v)?;
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if !v.is_empty() {
                config.download.user_agent = v.to_string();
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a non-negative integer"))
}

fn parse_positive<T: FromStr + PartialEq + Default>(
    section: &str,
    key: &str,
    value: &str,
) -> Result<T, ConfigError> {
    match value.trim().parse::<T>() {
        Ok(n) if n != T::default() => Ok(n),
        _ => Err(invalid(section, key, value, "must be a positive integer")),
    }
}

fn parse_zoom(section: &str, key: &str, value: &str) -> Result<u8, ConfigError> {
    match value.trim().parse::<u8>() {
        Ok(zoom) if zoom <= MAXIMUM_ZOOM => Ok(zoom),
        _ => Err(invalid(
            section,
            key,
            value,
            &format!("must be between 0 and {}", MAXIMUM_ZOOM),
        )),
    }
}

/// Parse a human-readable size like `256MB`, `2G` or `1024`.
///
/// Suffixes are binary (`KB` = 1024 bytes) and case-insensitive.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let upper = s.to_uppercase();

    // Longest suffixes first, so "MB" is not read as "B".
    const SUFFIXES: [(&str, u64); 7] = [
        ("GB", 1 << 30),
        ("G", 1 << 30),
        ("MB", 1 << 20),
        ("M", 1 << 20),
        ("KB", 1 << 10),
        ("K", 1 << 10),
        ("B", 1),
    ];

    let (digits, multiplier) = SUFFIXES
        .iter()
        .find(|(suffix, _)| upper.ends_with(suffix))
        .map(|(suffix, mult)| (s[..s.len() - suffix.len()].trim(), *mult))
        .unwrap_or((s, 1));

    let number: u64 = digits
        .parse()
        .map_err(|_| "expected format like '256MB', '2GB', or '1024KB'".to_string())?;
    number
        .checked_mul(multiplier)
        .ok_or_else(|| "size is too large".to_string())
}

/// Format a byte count with a binary unit, e.g. `1.5 GB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Expand ~ to home directory in paths.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<TileChainConfig, ConfigError> {
        parse_ini(&Ini::load_from_str(text).unwrap())
    }

    #[test]
    fn test_empty_ini_is_default() {
        assert_eq!(parse("").unwrap(), TileChainConfig::default());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("4KB").unwrap(), 4096);
        assert_eq!(parse_size("256mb").unwrap(), 256 * 1024 * 1024);
        assert_eq!(parse_size(" 2G ").unwrap(), 2 * 1024 * 1024 * 1024);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(256 * 1024 * 1024), "256.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024 / 2), "1.5 GB");
    }

    #[test]
    fn test_memory_cache_size() {
        let config = parse("[memory_cache]\nmax_size = 64MB\n").unwrap();
        assert_eq!(config.memory_cache_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_memory_cache_size() {
        let err = parse("[memory_cache]\nmax_size = huge\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref section, ref key, .. }
                if section == "memory_cache" && key == "max_size"
        ));
    }

    #[test]
    fn test_pools() {
        let config = parse(
            "[pools]\nfilesystem_threads = 4\nfilesystem_queue = 10\ndownload_threads = 1\n",
        )
        .unwrap();
        assert_eq!(config.filesystem_pool, PoolConfig::new(4, 10));
        assert_eq!(config.download_pool, PoolConfig::new(1, 40));
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(parse("[pools]\ndownload_threads = 0\n").is_err());
    }

    #[test]
    fn test_source_section() {
        let config = parse(
            "[source]\nname = Topo\nurl = https://topo.example.org/{z}/{x}/{y}.png\nmin_zoom = 3\nmax_zoom = 17\n",
        )
        .unwrap();
        assert_eq!(config.source.name, "Topo");
        assert_eq!(config.source.min_zoom, 3);
        assert_eq!(config.source.max_zoom, 17);
    }

    #[test]
    fn test_reversed_zoom_rejected() {
        assert!(parse("[source]\nmin_zoom = 12\nmax_zoom = 4\n").is_err());
    }

    #[test]
    fn test_zoom_above_maximum_rejected() {
        assert!(parse("[source]\nmax_zoom = 30\n").is_err());
    }

    #[test]
    fn test_source_name_with_slash_rejected() {
        assert!(parse("[source]\nname = a/b\n").is_err());
    }

    #[test]
    fn test_invalid_layout() {
        let err = parse("[chain]\nlayout = sideways\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: chain.layout = 'sideways' - must be 'smart' or 'layered'"
        );
    }

    #[test]
    fn test_download_section() {
        let config = parse("[download]\ntimeout = 5\nuser_agent = my-app/2\n").unwrap();
        assert_eq!(config.download.timeout_secs, 5);
        assert_eq!(config.download.user_agent, "my-app/2");
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/tiles"), home.join("tiles"));
        }
        assert_eq!(expand_tilde("/abs/tiles"), PathBuf::from("/abs/tiles"));
    }
}
