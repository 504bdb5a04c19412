use std::path::{Path, PathBuf};

use log::info;

use crate::config::{ConfigDocument, SavedForm};
use crate::controller::{Actions, FormState};
use crate::email::Dispatcher;
use crate::error::Result;
use crate::recipients::load_recipients;

/// State shared by the form handlers, created once at startup.
pub struct AppContext {
    config_path: PathBuf,
    document: ConfigDocument,
    dispatcher: Dispatcher,
}

impl AppContext {
    pub fn load(config_path: &Path, dispatcher: Dispatcher) -> Result<Self> {
        let document = ConfigDocument::load(config_path)?;
        info!("Loaded config from {}", config_path.display());
        Ok(Self {
            config_path: config_path.to_path_buf(),
            document,
            dispatcher,
        })
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }
}

impl Actions for AppContext {
    fn send(&mut self, form: &FormState) -> Result<()> {
        let settings = self.document.smtp_settings()?;
        info!("Mailing list file: {}", form.mailinglist_file);
        let recipients = load_recipients(&settings.username, &form.mailinglist_file)?;

        self.dispatcher
            .send(&settings, &form.subject, &form.content, &recipients)?;
        Ok(())
    }

    fn save(&mut self, form: &FormState) -> Result<()> {
        self.document.saved = Some(SavedForm::from(form));
        self.document.save(&self.config_path)?;

        let dump = serde_json::to_string(&self.document.redacted())
            .unwrap_or_else(|e| format!("<unprintable: {}>", e));
        info!("Saved data: {}", dump);
        Ok(())
    }
}
