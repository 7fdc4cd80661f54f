// LogPilot - ui/panels/records.rs
//
// Central area: one collapsible panel per searched host, in the order the
// hosts were first searched. Each panel lists the records routed to it with
// `ScrollArea::show_rows`, so only visible rows are laid out.
//
// Timestamps are shown in local time; search forms stay in UTC. Static
// results are shown one page at a time with previous/next buttons.

use crate::app::state::{AppState, HostPanel};
use crate::core::datefmt::format_date;
use crate::core::model::{LogRecord, SearchConfig};
use crate::core::severity::display_level;
use crate::ui::theme;
use chrono::Local;
use egui::text::{LayoutJob, TextFormat};

const DISPLAY_TIME_PATTERN: &str = "YYYY-MM-DD HH:ii:ss";

/// Render all host panels.
pub fn render(ui: &mut egui::Ui, state: &mut AppState) {
    // (host, forward) of a clicked page button, applied after rendering.
    let mut turn: Option<(String, bool)> = None;

    let panels = state.panels_in_order();
    if panels.is_empty() {
        ui.centered_and_justified(|ui| {
            ui.label("No searches yet.\nPick a host on the left and press Search.");
        });
        return;
    }

    let streaming = state.session.streaming_enabled();
    egui::ScrollArea::vertical()
        .id_salt("host_panels")
        .auto_shrink([false; 2])
        .show(ui, |ui| {
            for (config, panel) in panels {
                if let Some(forward) = render_host(ui, config, panel, state.dark_mode, streaming) {
                    turn = Some((config.host.clone(), forward));
                }
                ui.add_space(4.0);
            }
        });

    if let Some((host, forward)) = turn {
        state.turn_page(&host, forward);
    }
}

/// Returns `Some(forward)` when a page button was clicked.
fn render_host(
    ui: &mut egui::Ui,
    config: &SearchConfig,
    panel: Option<&HostPanel>,
    dark_mode: bool,
    streaming: bool,
) -> Option<bool> {
    let mut turn = None;
    let service = if config.service.is_any() {
        "any service".to_string()
    } else {
        config.service.label.clone()
    };
    let mode = if config.real_time { "real time" } else { "range" };
    let heading = format!(
        "{}  \u{00b7}  level {}  \u{00b7}  {}  \u{00b7}  {}",
        config.host,
        config.level_label(),
        service,
        mode
    );

    egui::CollapsingHeader::new(egui::RichText::new(heading).strong())
        .id_salt(("host_panel", &config.host))
        .default_open(true)
        .show(ui, |ui| {
            let Some(panel) = panel else {
                ui.label(egui::RichText::new("Waiting for data...").weak());
                return;
            };

            ui.horizontal(|ui| {
                if panel.total.is_some() {
                    if ui
                        .add_enabled(panel.has_previous_page(), egui::Button::new("\u{25c0}").small())
                        .on_hover_text("Previous page")
                        .clicked()
                    {
                        turn = Some(false);
                    }
                    if ui
                        .add_enabled(panel.has_next_page(), egui::Button::new("\u{25b6}").small())
                        .on_hover_text("Next page")
                        .clicked()
                    {
                        turn = Some(true);
                    }
                    ui.separator();
                }
                let failed = panel.dial_error.is_some();
                ui.colored_label(
                    theme::connection_colour(panel.connected, failed),
                    "\u{25cf}",
                );
                if let Some(ref reason) = panel.dial_error {
                    ui.label(format!("Agent unreachable: {reason}"));
                } else if panel.connected {
                    ui.label("Connected");
                } else if !streaming {
                    ui.label(egui::RichText::new("Streaming off").weak());
                }
                ui.separator();
                match panel.total {
                    Some(total) => {
                        let first = (panel.page.from + 1).min(total);
                        let last = (panel.page.from + panel.records.len()).min(total);
                        ui.label(format!("{first}-{last} of {total} record(s)"))
                    }
                    None => ui.label(format!("{} record(s)", panel.records.len())),
                };
                if panel.dropped > 0 {
                    ui.label(
                        egui::RichText::new(format!("{} older dropped", panel.dropped)).weak(),
                    );
                }
            });

            if panel.records.is_empty() {
                return;
            }

            let row_height = theme::ROW_HEIGHT;
            egui::ScrollArea::vertical()
                .id_salt(("host_records", &config.host))
                .max_height(theme::HOST_PANEL_HEIGHT)
                .auto_shrink([false, true])
                .stick_to_bottom(config.real_time)
                .show_rows(ui, row_height, panel.records.len(), |ui, row_range| {
                    for idx in row_range {
                        if let Some(record) = panel.records.get(idx) {
                            let job = record_job(ui, record, dark_mode);
                            let response = ui.label(job);
                            response.on_hover_ui(|ui| {
                                ui.label(egui::RichText::new(&record.message).monospace());
                            });
                        }
                    }
                });
        });
    turn
}

/// Build one row: `time  level  target  message`, with only the level
/// coloured by severity.
fn record_job(ui: &egui::Ui, record: &LogRecord, dark_mode: bool) -> LayoutJob {
    let font = egui::FontId::monospace(12.0);
    let body = ui.style().visuals.text_color();

    let ts = record
        .timestamp
        .map(|t| format_date(&t.with_timezone(&Local), DISPLAY_TIME_PATTERN))
        .unwrap_or_else(|| "-------------------".to_string());
    let level = record
        .level
        .as_deref()
        .map(display_level)
        .unwrap_or_else(|| "-".to_string());
    let level_colour = theme::severity_colour(record.severity(), dark_mode).unwrap_or(body);
    let first_line = record.message.lines().next().unwrap_or("");

    let mut job = LayoutJob::default();
    job.append(
        &format!("{ts}  "),
        0.0,
        TextFormat {
            font_id: font.clone(),
            color: body,
            ..Default::default()
        },
    );
    job.append(
        &format!("{level:<13} "),
        0.0,
        TextFormat {
            font_id: font.clone(),
            color: level_colour,
            ..Default::default()
        },
    );
    job.append(
        &format!(
            "{:<20} {first_line}",
            record.target.as_deref().unwrap_or("")
        ),
        0.0,
        TextFormat {
            font_id: font,
            color: body,
            ..Default::default()
        },
    );
    job
}
