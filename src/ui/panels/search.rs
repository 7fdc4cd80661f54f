// LogPilot - ui/panels/search.rs
//
// Search form for the selected host. Edits the host's `SearchDraft`; the
// Search button submits the whole draft as the host's configuration.
//
// Service choices come from the unit catalog the host's agent reported.
// Until one arrives the service is a free-text token (see core::query).

use crate::app::state::AppState;
use crate::core::model::ServiceFilter;
use crate::core::severity::{display_level, Severity, LEVEL_ALL};

/// Render the search form.
pub fn render(ui: &mut egui::Ui, state: &mut AppState) {
    let Some(host) = state.selected_host.clone() else {
        ui.label(egui::RichText::new("Select a host to search its logs.").weak());
        return;
    };

    ui.heading(egui::RichText::new(&host).monospace());
    ui.separator();

    let units = state
        .panels
        .get(&host)
        .map(|p| p.units.clone())
        .unwrap_or_default();

    let Some(draft) = state.drafts.get_mut(&host) else {
        return;
    };

    egui::Grid::new("search_form")
        .num_columns(2)
        .spacing([8.0, 6.0])
        .show(ui, |ui| {
            ui.label("From (UTC):");
            ui.add_enabled(
                !draft.real_time,
                egui::TextEdit::singleline(&mut draft.since_text).desired_width(150.0),
            );
            ui.end_row();

            ui.label("To (UTC):");
            ui.add_enabled(
                !draft.real_time,
                egui::TextEdit::singleline(&mut draft.until_text).desired_width(150.0),
            );
            ui.end_row();

            ui.label("Level:");
            egui::ComboBox::from_id_salt("search_level")
                .selected_text(display_level(&draft.level))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut draft.level, LEVEL_ALL.to_string(), LEVEL_ALL);
                    for severity in Severity::all() {
                        ui.selectable_value(
                            &mut draft.level,
                            severity.code().to_string(),
                            format!("{} {}", severity.code(), severity.label()),
                        );
                    }
                });
            ui.end_row();

            ui.label("Service:");
            if units.is_empty() {
                let response = ui.add(
                    egui::TextEdit::singleline(&mut draft.service.value)
                        .hint_text("unit:sshd")
                        .desired_width(150.0),
                );
                if response.changed() {
                    draft.service.label = draft.service.value.clone();
                }
            } else {
                let selected = if draft.service.is_any() {
                    "any".to_string()
                } else {
                    draft.service.label.clone()
                };
                egui::ComboBox::from_id_salt("search_service")
                    .selected_text(selected)
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut draft.service, ServiceFilter::any(), "any");
                        for filter in units.filters() {
                            let label = filter.label.clone();
                            ui.selectable_value(&mut draft.service, filter, label);
                        }
                    });
            }
            ui.end_row();

            ui.label("Mode:");
            ui.checkbox(&mut draft.real_time, "Real time")
                .on_hover_text("Follow new records instead of querying the time range");
            ui.end_row();
        });

    if let Some(ref error) = draft.error {
        let colour = ui.style().visuals.error_fg_color;
        ui.colored_label(colour, error);
    }

    ui.add_space(6.0);
    let has_search = state.session.config(&host).is_some();
    let label = if has_search { "Update search" } else { "Search" };
    if ui.button(label).clicked() {
        state.submit_search(&host);
    }
}
