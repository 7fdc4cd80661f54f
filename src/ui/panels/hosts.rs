// LogPilot - ui/panels/hosts.rs
//
// Host list for the left sidebar: every host the directory reported, plus
// hosts that still carry a search but have since dropped off the list.
// Clicking a host opens its search form.
//
// This panel writes `state.request_host_refresh`; gui.rs consumes it.

use crate::app::state::AppState;
use crate::ui::theme;

/// Render the host list.
pub fn render(ui: &mut egui::Ui, state: &mut AppState, fetching: bool) {
    ui.horizontal(|ui| {
        ui.heading("Hosts");
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            ui.add_enabled_ui(!fetching, |ui| {
                if ui
                    .small_button("\u{21bb}")
                    .on_hover_text("Reload the host list")
                    .clicked()
                {
                    state.request_host_refresh = true;
                }
            });
            if fetching {
                ui.spinner();
            }
        });
    });
    ui.separator();

    let mut listed: Vec<String> = state.hosts.clone();
    for host in state.session.hosts() {
        if !listed.contains(&host) {
            listed.push(host);
        }
    }

    if listed.is_empty() {
        ui.label(egui::RichText::new("No hosts available.").weak());
        return;
    }

    let mut clicked: Option<String> = None;
    for host in &listed {
        let has_search = state.session.config(host).is_some();
        let selected = state.selected_host.as_deref() == Some(host.as_str());
        let panel = state.panels.get(host);
        let connected = panel.map(|p| p.connected).unwrap_or(false);
        let failed = panel.map(|p| p.dial_error.is_some()).unwrap_or(false);

        ui.horizontal(|ui| {
            let dot = egui::RichText::new("\u{25cf}").color(if has_search {
                theme::connection_colour(connected, failed)
            } else {
                ui.style().visuals.weak_text_color()
            });
            ui.label(dot);

            let mut text = egui::RichText::new(host).monospace();
            if has_search {
                text = text.strong();
            }
            let response = ui.selectable_label(selected, text);
            let response = if !state.hosts.contains(host) {
                response.on_hover_text("No longer reported by the host directory")
            } else {
                response
            };
            if response.clicked() {
                clicked = Some(host.clone());
            }
        });
    }

    if let Some(host) = clicked {
        state.select_host(&host);
    }
}
