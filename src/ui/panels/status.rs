// LogPilot - ui/panels/status.rs
//
// Bottom status bar: session identity, the global streaming switch, the
// clear-all action and the warning count.

use crate::app::state::AppState;
use crate::ui::theme;

/// Render the status bar.
pub fn render(ui: &mut egui::Ui, state: &mut AppState) {
    ui.horizontal(|ui| {
        let streaming = state.session.streaming_enabled();
        if streaming {
            ui.label(
                egui::RichText::new(" \u{25cf} LIVE ")
                    .strong()
                    .color(theme::LIVE_COLOUR)
                    .background_color(egui::Color32::from_rgba_premultiplied(34, 197, 94, 30)),
            );
            ui.separator();
        }

        if state.debug_mode {
            ui.label(egui::RichText::new("DEBUG").monospace().weak());
            ui.separator();
        }
        ui.label(&state.status_message);

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let has_searches = !state.session.configs().is_empty();
            ui.add_enabled_ui(has_searches, |ui| {
                if ui
                    .small_button("Clear all")
                    .on_hover_text("Remove every search and stop streaming")
                    .clicked()
                {
                    state.clear_searches();
                }
            });

            let mut enabled = streaming;
            if ui.checkbox(&mut enabled, "Streaming").changed() {
                state.set_streaming(enabled);
            }

            ui.separator();
            ui.label(
                egui::RichText::new(format!("client {}", state.session.client_id()))
                    .monospace()
                    .weak(),
            );

            if !state.warnings.is_empty() {
                ui.separator();
                let text = format!("\u{26a0} {}", state.warnings.len());
                let colour = ui.style().visuals.warn_fg_color;
                ui.label(egui::RichText::new(text).color(colour))
                    .on_hover_ui(|ui| {
                        for w in state.warnings.iter().rev().take(10) {
                            ui.label(w);
                        }
                    });
            }
        });
    });
}
