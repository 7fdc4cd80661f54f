// LogPilot - gui.rs
//
// Top-level eframe::App implementation.
// Wires together the UI panels, the host directory fetch, the stream
// coordinator and the log transport.
//
// Per-frame order:
//   1. host list results
//   2. session events (panels first, then the coordinator's transport calls),
//      then queued unit-list and page requests
//   3. transport frames, routed into host panels
//   4. panels, which may mutate the session for the next frame

use crate::app::hosts::{HostListManager, HostListProgress};
use crate::app::state::AppState;
use crate::app::stream::StreamCoordinator;
use crate::app::transport::{LogTransport, TransportEvent};
use crate::ui;
use crate::util::constants::{MAX_TRANSPORT_FRAMES_PER_FRAME, STREAM_REPAINT_INTERVAL_MS};

/// The LogPilot application.
pub struct LogPilotApp {
    pub state: AppState,
    coordinator: StreamCoordinator,
    transport: Box<dyn LogTransport>,
    host_manager: Option<HostListManager>,
}

impl LogPilotApp {
    /// Create the application. The host list fetch starts immediately when
    /// a directory is available.
    pub fn new(
        mut state: AppState,
        transport: Box<dyn LogTransport>,
        mut host_manager: Option<HostListManager>,
    ) -> Self {
        let coordinator = StreamCoordinator::attach(&mut state.session);
        match host_manager.as_mut() {
            Some(manager) => {
                tracing::info!(url = manager.url(), "Loading host list");
                manager.start_fetch();
            }
            None => state.status_message = "Host directory unavailable.".to_string(),
        }
        Self {
            state,
            coordinator,
            transport,
            host_manager,
        }
    }

    fn poll_hosts(&mut self) -> bool {
        let Some(manager) = self.host_manager.as_mut() else {
            return false;
        };
        if self.state.request_host_refresh {
            self.state.request_host_refresh = false;
            manager.start_fetch();
            self.state.status_message = "Loading host list...".to_string();
        }
        match manager.poll_progress() {
            Some(HostListProgress::Loaded(hosts)) => {
                self.state.set_hosts(hosts);
                true
            }
            Some(HostListProgress::Failed(error)) => {
                self.state.status_message = "Host list unavailable.".to_string();
                self.state.add_warning(format!("Host list: {error}"));
                true
            }
            None => manager.is_fetching(),
        }
    }

    fn pump_session(&mut self) {
        self.state.handle_session_events();
        let warnings = self
            .coordinator
            .pump(&self.state.session, self.transport.as_mut());
        for w in warnings {
            self.state.add_warning(w);
        }

        let requests = self.state.take_requests();
        if !requests.is_empty() {
            let warnings =
                self.coordinator
                    .dispatch(&self.state.session, self.transport.as_mut(), requests);
            for w in warnings {
                self.state.add_warning(w);
            }
        }
    }

    fn poll_transport(&mut self) -> bool {
        let events = self.transport.poll(MAX_TRANSPORT_FRAMES_PER_FRAME);
        let had_events = !events.is_empty();
        for event in events {
            if event == TransportEvent::Closed {
                self.coordinator.transport_closed();
            }
            self.state.apply_transport_event(event);
        }
        had_events
    }
}

impl eframe::App for LogPilotApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let fetching = self.poll_hosts();
        self.pump_session();
        let had_frames = self.poll_transport();
        // A transport close flips streaming off; settle it this frame.
        self.pump_session();

        ctx.set_visuals(if self.state.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        });

        // Top menu bar
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Reload hosts").clicked() {
                        self.state.request_host_refresh = true;
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Exit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.menu_button("View", |ui| {
                    if ui.checkbox(&mut self.state.dark_mode, "Dark mode").changed() {
                        ui.close_menu();
                    }
                    if ui.button("Clear warnings").clicked() {
                        self.state.warnings.clear();
                        ui.close_menu();
                    }
                });
            });
        });

        // Status bar
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui::panels::status::render(ui, &mut self.state);
        });

        // Left sidebar: host list above the search form.
        egui::SidePanel::left("sidebar")
            .default_width(ui::theme::SIDEBAR_WIDTH)
            .resizable(true)
            .show(ctx, |ui| {
                let available = ui.available_height();
                egui::ScrollArea::vertical()
                    .id_salt("sidebar_hosts")
                    .max_height(available * 0.45)
                    .show(ui, |ui| {
                        ui::panels::hosts::render(ui, &mut self.state, fetching);
                    });

                ui.separator();

                egui::ScrollArea::vertical()
                    .id_salt("sidebar_search")
                    .auto_shrink([false; 2])
                    .show(ui, |ui| {
                        ui::panels::search::render(ui, &mut self.state);
                    });
            });

        // Central panel (host record panels)
        egui::CentralPanel::default().show(ctx, |ui| {
            ui::panels::records::render(ui, &mut self.state);
        });

        if had_frames || fetching {
            ctx.request_repaint();
        } else if self.transport.is_open() {
            ctx.request_repaint_after(std::time::Duration::from_millis(
                STREAM_REPAINT_INTERVAL_MS,
            ));
        }
    }

    /// Called by eframe when the application window is about to close.
    ///
    /// Disposes the session so frames still in flight are recognised as
    /// stale, then lets the coordinator shut the transport down.
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.state.session.dispose();
        self.pump_session();
    }
}
