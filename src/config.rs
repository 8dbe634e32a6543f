use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::AnalysisError;
use crate::token::{SessionToken, TokenProvider};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ComplereConfig {
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
    #[serde(rename = "serverUrl")]
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "organizationId")]
    pub organization_id: Option<String>,
    #[serde(rename = "organizationName")]
    pub organization_name: Option<String>,
}

impl TokenProvider for ComplereConfig {
    fn session_token(&self) -> Option<SessionToken> {
        self.api_key.as_deref().map(SessionToken::new)
    }
}

pub fn get_config_dir() -> Result<PathBuf, AnalysisError> {
    if let Some(home_dir) = dirs::home_dir() {
        Ok(home_dir.join(".complere"))
    } else {
        Err(AnalysisError::Config(
            "Could not find home directory".to_string(),
        ))
    }
}

pub fn get_config_file_path() -> Result<PathBuf, AnalysisError> {
    Ok(get_config_dir()?.join("config.json"))
}

pub fn ensure_config_dir() -> Result<(), AnalysisError> {
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;

        // Set permissions to 700 (read/write/execute for owner only) on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(&config_dir)?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o700);
            fs::set_permissions(&config_dir, permissions)?;
        }
    }
    Ok(())
}

pub fn load_config() -> Result<ComplereConfig, AnalysisError> {
    ensure_config_dir()?;

    let config_file = get_config_file_path()?;

    if config_file.exists() {
        let content = fs::read_to_string(config_file)?;
        let config: ComplereConfig = serde_json::from_str(&content)?;
        Ok(config)
    } else {
        Ok(ComplereConfig::default())
    }
}

pub fn save_config(config: &ComplereConfig) -> Result<(), AnalysisError> {
    ensure_config_dir()?;

    let config_file = get_config_file_path()?;
    let content = serde_json::to_string_pretty(config)?;

    fs::write(&config_file, content)?;

    // Set permissions to 600 (read/write for owner only) on Unix systems
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(&config_file)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(&config_file, permissions)?;
    }

    Ok(())
}

pub fn clear_config() -> Result<(), AnalysisError> {
    let default_config = ComplereConfig::default();
    save_config(&default_config)
}

pub fn get_logs_dir() -> Result<PathBuf, AnalysisError> {
    Ok(get_config_dir()?.join("logs"))
}

pub fn ensure_logs_dir() -> Result<(), AnalysisError> {
    let logs_dir = get_logs_dir()?;
    if !logs_dir.exists() {
        fs::create_dir_all(&logs_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(&logs_dir)?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o700);
            fs::set_permissions(&logs_dir, permissions)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_uses_camel_case_keys() {
        let config = ComplereConfig {
            api_key: Some("key-123".to_string()),
            server_url: Some("https://app.complere.example".to_string()),
            username: Some("jordan".to_string()),
            name: None,
            organization_id: Some("org-9".to_string()),
            organization_name: None,
        };

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["apiKey"], "key-123");
        assert_eq!(json["serverUrl"], "https://app.complere.example");
        assert_eq!(json["organizationId"], "org-9");
        assert!(json.get("api_key").is_none());
    }

    #[test]
    fn test_config_session_token_from_api_key() {
        let mut config = ComplereConfig::default();
        assert!(config.session_token().is_none());

        config.api_key = Some("key-123".to_string());
        assert_eq!(config.session_token().unwrap().expose(), "key-123");
    }
}
