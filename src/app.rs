use crate::context::AppContext;
use crate::controller::{Controller, ControllerState, FormEvent, Outcome};
use eframe::egui;

const BUTTONS: [FormEvent; 3] = [FormEvent::Send, FormEvent::Save, FormEvent::Cancel];

pub struct MailingListApp {
    controller: Controller<AppContext>,
    sender: String,
    status_log: Vec<String>,
}

impl MailingListApp {
    pub fn new(context: AppContext) -> Self {
        let sender = context
            .document()
            .username
            .clone()
            .unwrap_or_else(|| "(no username in config)".to_string());
        let form = context.document().saved().into();

        Self {
            controller: Controller::new(context, form),
            sender,
            status_log: Vec::new(),
        }
    }

    /// Runs the handler for `event` on the UI thread; the window stays
    /// unresponsive until it returns.
    fn handle(&mut self, ctx: &egui::Context, event: FormEvent) {
        match self.controller.dispatch(event) {
            Outcome::Done(FormEvent::Send) => self.status_log.push("✓ Message sent".to_string()),
            Outcome::Done(FormEvent::Save) => self.status_log.push("✓ Form saved".to_string()),
            Outcome::Done(_) | Outcome::Ignored => {}
            Outcome::Failed(event, e) => {
                self.status_log.push(format!("✗ {} failed: {}", event, e));
            }
            Outcome::Terminated => ctx.send_viewport_cmd(egui::ViewportCommand::Close),
        }
    }
}

fn browse(field: &mut String) {
    if let Some(path) = rfd::FileDialog::new().pick_file() {
        *field = path.to_string_lossy().to_string();
    }
}

impl eframe::App for MailingListApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Title bar close counts as Quit.
        if ctx.input(|i| i.viewport().close_requested())
            && self.controller.state() != ControllerState::Terminated
        {
            self.controller.dispatch(FormEvent::Quit);
        }

        // --- Bottom Panel: Status Log ---
        egui::TopBottomPanel::bottom("status_log")
            .min_height(80.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for line in &self.status_log {
                            if line.starts_with('✓') {
                                ui.colored_label(egui::Color32::from_rgb(80, 200, 80), line);
                            } else if line.starts_with('✗') {
                                ui.colored_label(egui::Color32::from_rgb(220, 80, 80), line);
                            } else {
                                ui.label(line);
                            }
                        }
                    });
            });

        // --- Central Panel: Form ---
        let mut clicked: Option<FormEvent> = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.label("For more settings use the config.yaml file.");
            ui.add_space(5.0);

            egui::Grid::new("form_grid")
                .num_columns(2)
                .spacing([8.0, 6.0])
                .show(ui, |ui| {
                    ui.label("Sending from");
                    ui.label(self.sender.as_str());
                    ui.end_row();

                    let form = self.controller.form_mut();

                    ui.label("Mailing List File");
                    ui.horizontal(|ui| {
                        ui.text_edit_singleline(&mut form.mailinglist_file);
                        if ui.button("Browse").clicked() {
                            browse(&mut form.mailinglist_file);
                        }
                    });
                    ui.end_row();

                    ui.label("Template File (Opt.)");
                    ui.horizontal(|ui| {
                        ui.text_edit_singleline(&mut form.template_file);
                        if ui.button("Browse").clicked() {
                            browse(&mut form.template_file);
                        }
                    });
                    ui.end_row();

                    ui.label("Subject");
                    ui.add(egui::TextEdit::singleline(&mut form.subject).desired_width(f32::INFINITY));
                    ui.end_row();

                    ui.label("Content");
                    ui.add(
                        egui::TextEdit::multiline(&mut form.content)
                            .desired_width(f32::INFINITY)
                            .desired_rows(16),
                    );
                    ui.end_row();
                });

            ui.add_space(10.0);
            ui.horizontal(|ui| {
                for event in BUTTONS {
                    if ui.button(event.name()).clicked() {
                        clicked = Some(event);
                    }
                }
            });
        });

        if let Some(event) = clicked {
            self.handle(ctx, event);
        }
    }
}
