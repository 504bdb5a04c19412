use std::fmt;
use std::str::FromStr;

use log::{debug, error, info, warn};

#[cfg(test)]
use mockall::automock;

use crate::config::SavedForm;
use crate::error::{Error, Result};

/// Values currently shown in the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub mailinglist_file: String,
    pub template_file: String,
    pub subject: String,
    pub content: String,
}

impl From<SavedForm> for FormState {
    fn from(saved: SavedForm) -> Self {
        Self {
            mailinglist_file: saved.mailinglist_file,
            template_file: saved.template_file,
            subject: saved.email_subject,
            content: saved.email_content,
        }
    }
}

impl From<&FormState> for SavedForm {
    fn from(form: &FormState) -> Self {
        Self {
            mailinglist_file: form.mailinglist_file.clone(),
            template_file: form.template_file.clone(),
            email_subject: form.subject.clone(),
            email_content: form.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormEvent {
    Send,
    Save,
    Cancel,
    Quit,
}

impl FormEvent {
    pub fn name(self) -> &'static str {
        match self {
            FormEvent::Send => "Send",
            FormEvent::Save => "Save",
            FormEvent::Cancel => "Cancel",
            FormEvent::Quit => "Quit",
        }
    }
}

impl fmt::Display for FormEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FormEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Send" => Ok(FormEvent::Send),
            "Save" => Ok(FormEvent::Save),
            "Cancel" => Ok(FormEvent::Cancel),
            "Quit" => Ok(FormEvent::Quit),
            other => Err(Error::UnknownEvent(other.to_string())),
        }
    }
}

/// Handlers behind the form's buttons. Each runs to completion before the
/// next event is read.
#[cfg_attr(test, automock)]
pub trait Actions {
    fn send(&mut self, form: &FormState) -> Result<()>;

    fn save(&mut self, form: &FormState) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Dispatching,
    Terminated,
}

#[derive(Debug)]
pub enum Outcome {
    Done(FormEvent),
    Failed(FormEvent, Error),
    Terminated,
    Ignored,
}

pub struct Controller<A> {
    actions: A,
    form: FormState,
    state: ControllerState,
}

impl<A: Actions> Controller<A> {
    pub fn new(actions: A, form: FormState) -> Self {
        Self {
            actions,
            form,
            state: ControllerState::Idle,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn form_mut(&mut self) -> &mut FormState {
        &mut self.form
    }

    #[allow(dead_code)]
    pub fn dispatch_named(&mut self, name: &str) -> Outcome {
        match name.parse::<FormEvent>() {
            Ok(event) => self.dispatch(event),
            Err(_) => {
                warn!("Event {} not in dispatch table", name);
                Outcome::Ignored
            }
        }
    }

    pub fn dispatch(&mut self, event: FormEvent) -> Outcome {
        if self.state == ControllerState::Terminated {
            debug!("ignoring {} after quit", event);
            return Outcome::Ignored;
        }

        let handler: fn(&mut A, &FormState) -> Result<()> = match event {
            FormEvent::Send => A::send,
            FormEvent::Save => A::save,
            FormEvent::Cancel | FormEvent::Quit => {
                info!("{} pressed, closing", event);
                self.state = ControllerState::Terminated;
                return Outcome::Terminated;
            }
        };

        self.state = ControllerState::Dispatching;
        let snapshot = self.form.clone();
        let result = handler(&mut self.actions, &snapshot);
        self.state = ControllerState::Idle;

        match result {
            Ok(()) => Outcome::Done(event),
            Err(e) => {
                error!("{} failed: {}", event, e);
                Outcome::Failed(event, e)
            }
        }
    }
}
