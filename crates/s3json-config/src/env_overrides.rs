use super::{LogFormat, RuntimeConfig};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "S3JSON_";

/// Abstraction over environment-variable lookups so tests (and embedders)
/// can supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the S3JSON_ prefix
    /// Used for AWS standard variables (AWS_REGION, AWS_ENDPOINT_URL)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Storage location
    if let Some(bucket) = get_env_string(env, "BUCKET") {
        config.storage.bucket = bucket;
    }
    if let Some(prefix) = get_env_string(env, "PREFIX") {
        config.storage.prefix = prefix;
    }

    // Prefixed values win over the AWS standard ones
    if let Some(region) = get_env_string(env, "REGION").or_else(|| env.get_raw("AWS_REGION")) {
        config.storage.region = Some(region);
    }
    if let Some(endpoint) =
        get_env_string(env, "ENDPOINT").or_else(|| env.get_raw("AWS_ENDPOINT_URL"))
    {
        config.storage.endpoint = Some(endpoint);
    }
    if let Some(val) = get_env_bool(env, "FORCE_PATH_STYLE")? {
        config.storage.force_path_style = val;
    }
    if let Some(key) = get_env_string(env, "ACCESS_KEY_ID") {
        config.storage.access_key_id = Some(key);
    }
    if let Some(secret) = get_env_string(env, "SECRET_ACCESS_KEY") {
        config.storage.secret_access_key = Some(secret);
    }

    // Listing
    if let Some(val) = get_env_parsed::<E, i32>(env, "LIST_PAGE_SIZE")? {
        config.list.page_size = val;
    }

    // Requests
    if let Some(val) = get_env_parsed::<E, u64>(env, "OPERATION_TIMEOUT_SECS")? {
        config.request.operation_timeout_secs = val;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.logging.format = format
            .parse::<LogFormat>()
            .context("Invalid S3JSON_LOG_FORMAT value")?;
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key).filter(|val| !val.is_empty())
}

fn get_env_parsed<E, T>(env: &E, key: &str) -> Result<Option<T>>
where
    E: EnvSource,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<T>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(anyhow!(
                        "Failed to parse {}{} (expected bool): {}",
                        ENV_PREFIX,
                        key,
                        val
                    ))
                }
            };
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
