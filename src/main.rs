mod annotation;
mod app;
mod canvas;
mod codegen;
mod editor;
mod geometry;
mod history;
mod persist;

use app::UimarkApp;

fn main() -> eframe::Result {
    env_logger::init();

    let Some(image_path) = app::pick_image_path(std::env::args().nth(1)) else {
        eprintln!("usage: uimark <screenshot.png>");
        return Ok(());
    };

    let title = app::window_title(&image_path);
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };
    eframe::run_native(
        &title,
        options,
        Box::new(move |_cc| Ok(Box::new(UimarkApp::open(image_path)))),
    )
}
