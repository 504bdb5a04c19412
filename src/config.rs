use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use ::config::{Config, File, FileFormat};
use log::info;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

const PASSWORD_MASK: &str = "********";

/// Contents of `config.yaml`: credentials plus the last saved form values.
///
/// Keys are only resolved when something needs them, so a document with
/// missing credentials still loads and can still be saved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved: Option<SavedForm>,

    /// Keys this tool does not know about, written back untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SavedForm {
    #[serde(default)]
    pub mailinglist_file: String,
    #[serde(default)]
    pub template_file: String,
    #[serde(default)]
    pub email_subject: String,
    #[serde(default)]
    pub email_content: String,
}

/// Everything the mail dispatcher needs, resolved from a [`ConfigDocument`].
#[derive(Clone, PartialEq)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub display_name: String,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &PASSWORD_MASK)
            .field("display_name", &self.display_name)
            .finish()
    }
}

impl ConfigDocument {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigMissing {
                path: path.to_path_buf(),
            });
        }

        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .build()?;
        let document: ConfigDocument = settings.try_deserialize()?;
        Ok(document)
    }

    /// Writes the whole document to `path`, replacing the file in one rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let write_err = |source| Error::ConfigWrite {
            path: path.to_path_buf(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(yaml.as_bytes()).map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    pub fn saved(&self) -> SavedForm {
        self.saved.clone().unwrap_or_default()
    }

    pub fn smtp_settings(&self) -> Result<SmtpSettings> {
        fn required<T: Clone>(value: &Option<T>, key: &'static str) -> Result<T> {
            value.clone().ok_or(Error::ConfigIncomplete { key })
        }

        Ok(SmtpSettings {
            server: required(&self.smtp_server, "smtp-server")?,
            port: required(&self.smtp_port, "smtp-port")?,
            username: required(&self.username, "username")?,
            password: required(&self.password, "password")?,
            display_name: self.display_name.clone().unwrap_or_default(),
        })
    }

    /// Copy safe to hand to the logger.
    pub fn redacted(&self) -> Self {
        let mut document = self.clone();
        if document.password.is_some() {
            document.password = Some(PASSWORD_MASK.to_string());
        }
        document
    }
}

/// Materializes the config file from its template on first run.
pub fn bootstrap(config_path: &Path, template_path: &Path) -> Result<()> {
    if !config_path.exists() && template_path.exists() {
        info!("Creating new config file from template");
        fs::copy(template_path, config_path)?;
    }

    if !config_path.exists() {
        return Err(Error::ConfigMissing {
            path: config_path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use testresult::TestResult;

    use super::*;

    const SAMPLE: &str = "\
smtp-server: smtp.example.com
smtp-port: 465
username: me@example.com
password: hunter2
display-name: Example Club
signature: keep me
";

    fn write_sample(dir: &TempDir) -> TestResult<std::path::PathBuf> {
        let path = dir.path().join("config.yaml");
        fs::write(&path, SAMPLE)?;
        Ok(path)
    }

    #[test]
    fn test_load_missing_file() -> TestResult {
        let dir = TempDir::new()?;
        let result = ConfigDocument::load(&dir.path().join("config.yaml"));
        assert!(matches!(result, Err(Error::ConfigMissing { .. })));
        Ok(())
    }

    #[test]
    fn test_load_malformed_yaml_is_parse_error() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.yaml");
        fs::write(&path, "smtp-server: [smtp.example.com\nsmtp-port: 465\n")?;

        let result = ConfigDocument::load(&path);
        assert!(matches!(result, Err(Error::ConfigParse(_))));
        Ok(())
    }

    #[test]
    fn test_save_into_missing_dir_is_write_error() -> TestResult {
        let dir = TempDir::new()?;
        let path = write_sample(&dir)?;

        let mut document = ConfigDocument::load(&path)?;
        document.saved = Some(SavedForm {
            email_subject: "Not written".into(),
            ..SavedForm::default()
        });
        let result = document.save(&dir.path().join("missing").join("config.yaml"));

        assert!(matches!(result, Err(Error::ConfigWrite { .. })));
        assert_eq!(fs::read_to_string(&path)?, SAMPLE);
        Ok(())
    }

    #[test]
    fn test_failed_replace_leaves_directory_untouched() -> TestResult {
        let dir = TempDir::new()?;
        let path = write_sample(&dir)?;
        let occupied = dir.path().join("occupied");
        fs::create_dir(&occupied)?;
        fs::write(occupied.join("keep.txt"), "keep")?;

        let document = ConfigDocument::load(&path)?;
        let result = document.save(&occupied);

        assert!(matches!(result, Err(Error::ConfigWrite { .. })));
        assert_eq!(fs::read_to_string(occupied.join("keep.txt"))?, "keep");
        assert_eq!(fs::read_to_string(&path)?, SAMPLE);
        // the temp file is cleaned up with the failed rename
        assert_eq!(fs::read_dir(dir.path())?.count(), 2);
        Ok(())
    }

    #[test]
    fn test_load_reads_credentials() -> TestResult {
        let dir = TempDir::new()?;
        let document = ConfigDocument::load(&write_sample(&dir)?)?;

        let settings = document.smtp_settings()?;
        assert_eq!(settings.server, "smtp.example.com");
        assert_eq!(settings.port, 465);
        assert_eq!(settings.username, "me@example.com");
        assert_eq!(settings.password, "hunter2");
        assert_eq!(settings.display_name, "Example Club");
        assert_eq!(document.saved(), SavedForm::default());
        Ok(())
    }

    #[test]
    fn test_save_then_load_keeps_saved_form() -> TestResult {
        let dir = TempDir::new()?;
        let path = write_sample(&dir)?;

        let mut document = ConfigDocument::load(&path)?;
        let form = SavedForm {
            mailinglist_file: "/home/me/list.txt".into(),
            template_file: "".into(),
            email_subject: "Meeting on Friday".into(),
            email_content: "Hi all,\n\nsee you there.".into(),
        };
        document.saved = Some(form.clone());
        document.save(&path)?;

        let reloaded = ConfigDocument::load(&path)?;
        assert_eq!(reloaded.saved(), form);
        assert_eq!(reloaded.password.as_deref(), Some("hunter2"));
        assert_eq!(
            reloaded.extra.get("signature"),
            Some(&serde_yaml::Value::String("keep me".into()))
        );
        Ok(())
    }

    #[test]
    fn test_partial_saved_section_defaults_to_empty() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.yaml");
        fs::write(&path, "username: me@example.com\nsaved:\n  email-subject: Hello\n")?;

        let document = ConfigDocument::load(&path)?;
        let saved = document.saved();
        assert_eq!(saved.email_subject, "Hello");
        assert_eq!(saved.mailinglist_file, "");
        assert_eq!(saved.email_content, "");
        Ok(())
    }

    #[test]
    fn test_missing_credentials_are_a_config_error() -> TestResult {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.yaml");
        fs::write(&path, "smtp-server: smtp.example.com\nsmtp-port: 465\nusername: me@example.com\n")?;

        let document = ConfigDocument::load(&path)?;
        let result = document.smtp_settings();
        assert!(matches!(
            result,
            Err(Error::ConfigIncomplete { key: "password" })
        ));
        Ok(())
    }

    #[test]
    fn test_redacted_hides_password() -> TestResult {
        let dir = TempDir::new()?;
        let document = ConfigDocument::load(&write_sample(&dir)?)?;

        let json = serde_json::to_string(&document.redacted())?;
        assert!(!json.contains("hunter2"));
        assert!(json.contains(PASSWORD_MASK));
        assert!(!format!("{:?}", document.smtp_settings()?).contains("hunter2"));
        Ok(())
    }

    #[test]
    fn test_bootstrap_copies_template() -> TestResult {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("config.yaml");
        let template_path = dir.path().join("config.yaml.template");
        fs::write(&template_path, SAMPLE)?;

        bootstrap(&config_path, &template_path)?;

        assert_eq!(fs::read(&config_path)?, fs::read(&template_path)?);
        Ok(())
    }

    #[test]
    fn test_bootstrap_keeps_existing_config() -> TestResult {
        let dir = TempDir::new()?;
        let config_path = write_sample(&dir)?;
        let template_path = dir.path().join("config.yaml.template");
        fs::write(&template_path, "username: template@example.com\n")?;

        bootstrap(&config_path, &template_path)?;

        assert_eq!(fs::read_to_string(&config_path)?, SAMPLE);
        Ok(())
    }

    #[test]
    fn test_bootstrap_without_template_creates_nothing() -> TestResult {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("config.yaml");

        let result = bootstrap(&config_path, &dir.path().join("config.yaml.template"));

        assert!(matches!(result, Err(Error::ConfigMissing { .. })));
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }
}
