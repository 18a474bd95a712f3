use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use egui::{Button, ColorImage, Key, TextureHandle, TextureOptions, Vec2};
use log::{info, warn};

use crate::annotation::TargetPos;
use crate::canvas;
use crate::codegen;
use crate::editor::Editor;
use crate::geometry::Rect;
use crate::persist::{AnnotationFile, SaveWorker, Version};

#[derive(Clone, Debug, PartialEq)]
enum SaveStatus {
    Idle,
    Saving,
    Saved { version: usize },
    Failed(String),
}

/// One open screenshot plus everything editing it needs.
struct Session {
    image_path: PathBuf,
    file: AnnotationFile,
    editor: Editor,
    pixels: ColorImage,
    texture: Option<TextureHandle>,
    save_worker: SaveWorker,
    save_status: SaveStatus,
    label_buffer: String,
    label_buffer_id: Option<String>,
    versions: Vec<Version>,
    show_versions: bool,
}

impl Session {
    fn open(image_path: PathBuf) -> Result<Self> {
        let rgba = image::open(&image_path)
            .with_context(|| format!("opening {}", image_path.display()))?
            .to_rgba8();
        let (width, height) = rgba.dimensions();
        let pixels = ColorImage::from_rgba_unmultiplied(
            [width as usize, height as usize],
            rgba.as_raw(),
        );
        let source_size = Vec2::new(width as f32, height as f32);

        let file = AnnotationFile::for_image(&image_path);
        let data = file.load(Rect::new(0.0, 0.0, source_size.x, source_size.y))?;
        info!(
            "opened {} with {} annotations, {} versions",
            image_path.display(),
            data.current_annotations.len(),
            data.versions.len()
        );

        let script_image = image_path.clone();
        let script_id = file.screenshot_id().to_owned();
        let save_worker = SaveWorker::spawn(file.clone(), move |annotations, source_size| {
            // Script generation is best-effort; a failure never fails the
            // save itself.
            if let Err(err) =
                codegen::write_script(&script_image, &script_id, source_size, annotations)
            {
                warn!("target script generation failed: {err:#}");
            }
        });

        Ok(Self {
            image_path,
            file,
            editor: Editor::new(data.current_annotations, source_size),
            pixels,
            texture: None,
            save_worker,
            save_status: SaveStatus::Idle,
            label_buffer: String::new(),
            label_buffer_id: None,
            versions: data.versions,
            show_versions: false,
        })
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) -> TextureHandle {
        match &self.texture {
            Some(texture) => texture.clone(),
            None => {
                let texture =
                    ctx.load_texture("screenshot", self.pixels.clone(), TextureOptions::LINEAR);
                self.texture = Some(texture.clone());
                texture
            }
        }
    }

    fn source_rect(&self) -> Rect {
        let size = self.editor.source_size();
        Rect::new(0.0, 0.0, size.x, size.y)
    }

    /// Queue the current annotation set on the save worker. The UI never
    /// blocks on disk; the outcome lands in [`Session::poll_saves`].
    fn trigger_save(&mut self) {
        self.save_worker
            .request(self.editor.store.snapshot(), self.source_rect());
        self.save_status = SaveStatus::Saving;
    }

    fn poll_saves(&mut self) {
        let mut saved = false;
        while let Some(result) = self.save_worker.poll() {
            self.save_status = match result {
                Ok(version) => {
                    saved = true;
                    SaveStatus::Saved { version }
                }
                Err(err) => {
                    warn!("save failed: {err}");
                    SaveStatus::Failed(err)
                }
            };
        }
        // Keep an open version window in step with finished saves.
        if saved && self.show_versions {
            self.refresh_versions();
        }
    }

    fn refresh_versions(&mut self) {
        match self.file.versions() {
            Ok(versions) => self.versions = versions,
            Err(err) => warn!("reading versions failed: {err:#}"),
        }
    }

    fn rollback_to(&mut self, index: usize) {
        match self.file.rollback(index) {
            Ok(data) => {
                self.editor.reset_from(data.current_annotations.clone());
                self.save_status = SaveStatus::Saved {
                    version: data.versions.len(),
                };
                if let Err(err) = codegen::write_script(
                    &self.image_path,
                    self.file.screenshot_id(),
                    data.source_size,
                    &data.current_annotations,
                ) {
                    warn!("target script generation failed: {err:#}");
                }
                self.versions = data.versions;
            }
            Err(err) => {
                warn!("rollback failed: {err:#}");
                self.save_status = SaveStatus::Failed(format!("{err:#}"));
            }
        }
    }
}

/// Top-level eframe application. A failed load leaves the app in a viewable
/// error state instead of exiting.
pub struct UimarkApp {
    session: Option<Session>,
    load_error: Option<String>,
}

impl UimarkApp {
    pub fn open(image_path: PathBuf) -> Self {
        match Session::open(image_path) {
            Ok(session) => Self {
                session: Some(session),
                load_error: None,
            },
            Err(err) => Self {
                session: None,
                load_error: Some(format!("{err:#}")),
            },
        }
    }
}

impl eframe::App for UimarkApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let Some(session) = &mut self.session else {
            let message = self
                .load_error
                .clone()
                .unwrap_or_else(|| "nothing to edit".to_owned());
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.colored_label(egui::Color32::LIGHT_RED, message);
            });
            return;
        };

        session.poll_saves();

        let typing = ctx.wants_keyboard_input();
        let (undo, redo, space_down, delete) = ctx.input(|i| {
            let cmd = i.modifiers.command;
            (
                cmd && !i.modifiers.shift && i.key_pressed(Key::Z),
                cmd && (i.key_pressed(Key::Y) || (i.modifiers.shift && i.key_pressed(Key::Z))),
                i.key_down(Key::Space),
                i.key_pressed(Key::Delete) || i.key_pressed(Key::Backspace),
            )
        });
        if !typing {
            session.editor.set_pan_armed(space_down);
            if undo && session.editor.undo() {
                session.trigger_save();
            }
            if redo && session.editor.redo() {
                session.trigger_save();
            }
            if delete && session.editor.delete_selected() {
                session.trigger_save();
            }
        }

        toolbar(ctx, session);
        inspector(ctx, session);

        let texture = session.ensure_texture(ctx);
        egui::CentralPanel::default().show(ctx, |ui| {
            let outcome = canvas::show(ui, &mut session.editor, &texture);
            if outcome.committed {
                session.trigger_save();
            }
        });

        versions_window(ctx, session);
    }
}

fn toolbar(ctx: &egui::Context, session: &mut Session) {
    egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            let editor = &mut session.editor;
            let mut save_after = false;
            if ui
                .add_enabled(editor.history.can_undo(), Button::new("Undo"))
                .clicked()
            {
                save_after = editor.undo();
            }
            if ui
                .add_enabled(editor.history.can_redo(), Button::new("Redo"))
                .clicked()
            {
                save_after = editor.redo() || save_after;
            }
            ui.separator();
            if ui.button("Reset view").clicked() {
                editor.reset_view();
            }
            ui.label(format!("{:.0}%", editor.view.scale * 100.0));
            ui.separator();
            if ui.button("History").clicked() {
                session.refresh_versions();
                session.show_versions = true;
            }
            if save_after {
                session.trigger_save();
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                match &session.save_status {
                    SaveStatus::Idle => {}
                    SaveStatus::Saving => {
                        ui.label("Saving...");
                    }
                    SaveStatus::Saved { version } => {
                        ui.label(format!("Saved (version {version})"));
                    }
                    SaveStatus::Failed(err) => {
                        ui.colored_label(egui::Color32::LIGHT_RED, format!("Save failed: {err}"));
                    }
                }
            });
        });
    });
}

fn inspector(ctx: &egui::Context, session: &mut Session) {
    egui::SidePanel::right("inspector")
        .default_width(260.0)
        .show(ctx, |ui| {
            ui.heading("Annotations");
            let mut select: Option<String> = None;
            egui::ScrollArea::vertical().max_height(220.0).show(ui, |ui| {
                for annotation in session.editor.store.annotations() {
                    let selected =
                        session.editor.store.selected_id() == Some(annotation.id.as_str());
                    if ui.selectable_label(selected, &annotation.label).clicked() {
                        select = Some(annotation.id.clone());
                    }
                }
            });
            if let Some(id) = select {
                session.editor.store.select(&id);
            }

            ui.separator();
            selected_detail(ui, session);
        });
}

fn selected_detail(ui: &mut egui::Ui, session: &mut Session) {
    let Some(selected) = session.editor.store.selected() else {
        session.label_buffer_id = None;
        ui.weak("No annotation selected.");
        return;
    };
    let id = selected.id.clone();
    let rect = selected.rect;
    let target_pos = selected.target_pos;

    if session.label_buffer_id.as_deref() != Some(id.as_str()) {
        sync_label_buffer(session, &id);
    }

    ui.label("Label");
    let response = ui.text_edit_singleline(&mut session.label_buffer);
    if response.changed() {
        session.editor.rename_selected(session.label_buffer.clone());
    }
    if response.lost_focus() && session.editor.commit_selected_edit() {
        session.trigger_save();
    }

    ui.add_space(6.0);
    ui.label("Click target");
    let mut picked = None;
    egui::Grid::new("target-pos").show(ui, |ui| {
        for value in 1..=9u8 {
            let active = target_pos == TargetPos::new(value);
            if ui.selectable_label(active, value.to_string()).clicked() {
                picked = Some(TargetPos::new(value));
            }
            if value % 3 == 0 {
                ui.end_row();
            }
        }
    });
    if let Some(pos) = picked {
        if session.editor.set_target_pos_selected(pos) {
            session.trigger_save();
        }
    }

    ui.add_space(6.0);
    ui.label(format!(
        "x {:.0}  y {:.0}  w {:.0}  h {:.0}",
        rect.x, rect.y, rect.width, rect.height
    ));

    ui.add_space(6.0);
    if ui.button("Delete").clicked() && session.editor.delete_selected() {
        session.trigger_save();
    }
}

fn sync_label_buffer(session: &mut Session, id: &str) {
    if let Some(annotation) = session.editor.store.get(id) {
        session.label_buffer = annotation.label.clone();
        session.label_buffer_id = Some(id.to_owned());
    }
}

fn versions_window(ctx: &egui::Context, session: &mut Session) {
    if !session.show_versions {
        return;
    }
    let mut open = true;
    let mut restore: Option<usize> = None;
    egui::Window::new("Version history")
        .open(&mut open)
        .default_width(360.0)
        .show(ctx, |ui| {
            if session.versions.is_empty() {
                ui.weak("No saved versions yet.");
                return;
            }
            egui::ScrollArea::vertical().show(ui, |ui| {
                for (index, version) in session.versions.iter().enumerate().rev() {
                    ui.horizontal(|ui| {
                        ui.vertical(|ui| {
                            ui.label(&version.description);
                            ui.weak(format!(
                                "{}  ({} annotations)",
                                pretty_timestamp(&version.timestamp),
                                version.annotations.len()
                            ));
                        });
                        ui.with_layout(
                            egui::Layout::right_to_left(egui::Align::Center),
                            |ui| {
                                if ui.button("Restore").clicked() {
                                    restore = Some(index);
                                }
                            },
                        );
                    });
                    ui.separator();
                }
            });
        });
    if let Some(index) = restore {
        session.rollback_to(index);
    }
    session.show_versions = open;
}

fn pretty_timestamp(rfc3339: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(rfc3339)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| rfc3339.to_owned())
}

/// Pick an image file if none was given on the command line.
pub fn pick_image_path(arg: Option<String>) -> Option<PathBuf> {
    match arg {
        Some(path) => Some(PathBuf::from(path)),
        None => rfd::FileDialog::new()
            .add_filter("images", &["png", "jpg", "jpeg", "bmp", "webp"])
            .pick_file(),
    }
}

pub fn window_title(image_path: &Path) -> String {
    format!(
        "uimark - {}",
        image_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
    )
}
