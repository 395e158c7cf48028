use eframe::egui::{
    self, Align2, ColorImage, FontId, Sense, TextureHandle, TextureOptions, ViewportBuilder,
    ViewportCommand,
};
use flickwav::{
    config::{Config, ConfigWatcher},
    engine::{self, MediaSource, TrackDescriptor, TrackKind},
    error::PlayerError,
    model::{PlayerModel, Severity},
    session::{MediaKind, PlayerHandle, PlayerRequest},
    stream::StreamResolver,
    tags::Artwork,
    transport::TransportCommand,
};
use std::{
    sync::mpsc::{self, TryRecvError},
    thread,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_TITLE: &str = "Flickwav - Media Player";
const SEEK_BAR_HEIGHT: f32 = 18.0;
const SEEK_FILL: egui::Color32 = egui::Color32::from_rgb(0x00, 0xcc, 0x00);
const ARTWORK_MAX_SIZE: f32 = 600.0;

type StreamResult = (u64, std::result::Result<String, PlayerError>);

struct App {
    model: PlayerModel,
    player: Option<PlayerHandle>,
    config: Config,
    config_watcher: Option<ConfigWatcher>,
    resolver: StreamResolver,
    location: String,
    artwork: Option<TextureHandle>,
    artwork_session: Option<u64>,
    stream_rx: Option<mpsc::Receiver<StreamResult>>,
    next_stream_request: u64,
    stream_inflight: Option<u64>,
    scrubbing: bool,
    last_scrub_offset: Option<f32>,
    volume: f64,
    title: String,
}

impl App {
    fn new(cc: &eframe::CreationContext<'_>, config: Config, initial: Option<String>) -> Self {
        let ctx = cc.egui_ctx.clone();
        let volume = config.playback.default_volume();
        let player = match PlayerHandle::spawn(
            engine::default_factory(),
            volume,
            config.playback.poll_interval(),
            move || ctx.request_repaint(),
        ) {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!("Failed to start player worker: {err}");
                None
            }
        };

        let config_watcher = Config::locate().and_then(|path| match ConfigWatcher::new(&path) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!("Config hot reload disabled: {err:?}");
                None
            }
        });

        let mut app = Self {
            model: PlayerModel::new(
                volume,
                config.playback.scrub_release,
                config.playback.autoplay,
            ),
            player,
            resolver: StreamResolver::from_config(&config.stream),
            config,
            config_watcher,
            location: String::new(),
            artwork: None,
            artwork_session: None,
            stream_rx: None,
            next_stream_request: 1,
            stream_inflight: None,
            scrubbing: false,
            last_scrub_offset: None,
            volume,
            title: DEFAULT_TITLE.to_string(),
        };

        if app.player.is_none() {
            app.model
                .notify_info("Playback is unavailable: the player thread could not start.");
        }

        if let Some(initial) = initial {
            app.location = initial.clone();
            app.open(MediaSource::parse(&initial));
        }
        app
    }

    fn send(&mut self, requests: Vec<PlayerRequest>) {
        let Some(player) = self.player.as_ref() else {
            return;
        };
        for request in requests {
            if !player.send(request) {
                error!("Player worker is gone");
                self.player = None;
                self.model
                    .notify_info("Playback stopped working; restart the application.");
                return;
            }
        }
    }

    fn open(&mut self, source: MediaSource) {
        info!(source = %source, "Open requested");
        let requests = self.model.open(source);
        self.send(requests);
    }

    fn close(&mut self) {
        let requests = self.model.close();
        self.send(requests);
    }

    fn command(&mut self, command: TransportCommand) {
        let requests = self.model.command(command);
        self.send(requests);
    }

    fn resolve_stream(&mut self, page_url: String) {
        let request_id = self.next_stream_request;
        self.next_stream_request += 1;
        self.stream_inflight = Some(request_id);

        let (tx, rx) = mpsc::channel();
        self.stream_rx = Some(rx);
        let resolver = self.resolver.clone();
        thread::spawn(move || {
            let res = resolver.resolve(&page_url);
            let _ = tx.send((request_id, res));
        });
        self.model.notify_info("Resolving stream...");
    }

    fn drain_stream_channel(&mut self) {
        let Some(rx) = self.stream_rx.as_ref() else {
            return;
        };
        let message = match rx.try_recv() {
            Ok(message) => message,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                self.stream_rx = None;
                self.stream_inflight = None;
                return;
            }
        };
        self.stream_rx = None;

        let (request_id, res) = message;
        if self.stream_inflight != Some(request_id) {
            return;
        }
        self.stream_inflight = None;
        match res {
            Ok(url) => {
                self.model.dismiss_notification();
                self.open(MediaSource::Url(url));
            }
            // The current media, if any, keeps playing.
            Err(err) => self.model.notify_error(&err),
        }
    }

    fn drain_player_events(&mut self) {
        let events = match self.player.as_ref() {
            Some(player) => player.drain(),
            None => return,
        };
        let now = Instant::now();
        for event in events {
            self.model.apply(event, now);
        }
    }

    fn maintain_config_watcher(&mut self) {
        let Some(watcher) = self.config_watcher.as_mut() else {
            return;
        };
        let Some(config) = watcher.poll() else {
            return;
        };
        info!(path = %watcher.path().display(), "Config reloaded");

        self.model.set_scrub_policy(config.playback.scrub_release);
        self.model.set_autoplay(config.playback.autoplay);
        self.resolver = StreamResolver::from_config(&config.stream);
        if config.playback.poll_interval() != self.config.playback.poll_interval() {
            self.send(vec![PlayerRequest::SetPollInterval(
                config.playback.poll_interval(),
            )]);
        }
        self.config = config;
    }

    fn sync_window_title(&mut self, ctx: &egui::Context) {
        let title = match self.model.media() {
            Some(media) => format!("Flickwav - {}", media.display_name),
            None => DEFAULT_TITLE.to_string(),
        };
        if title != self.title {
            ctx.send_viewport_cmd(ViewportCommand::Title(title.clone()));
            self.title = title;
        }
    }

    fn sync_artwork(&mut self, ctx: &egui::Context) {
        let media = self.model.media();
        let session = media.map(|media| media.session_id);
        if session == self.artwork_session {
            return;
        }
        self.artwork_session = session;
        self.artwork = media
            .and_then(|media| media.tags.artwork.as_ref())
            .map(|art| ctx.load_texture("album_art", artwork_to_image(art), TextureOptions::LINEAR));
    }

    fn handle_keyboard(&mut self, ctx: &egui::Context) {
        let typing = ctx.memory(|mem| mem.focused().is_some());
        if typing {
            return;
        }
        let toggle = ctx.input(|i| i.key_pressed(egui::Key::Space) || i.key_pressed(egui::Key::Enter));
        if toggle {
            let requests = self.model.toggle();
            self.send(requests);
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .find_map(|file| file.path.clone())
        });
        if let Some(path) = dropped {
            self.location = path.display().to_string();
            self.open(MediaSource::File(path));
        }
    }

    fn render_menu(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Open location").clicked() {
                    let source = MediaSource::parse(&self.location);
                    self.open(source);
                }
                if ui.button("Open stream").clicked() {
                    let page_url = self.location.trim().to_string();
                    self.resolve_stream(page_url);
                }
                let has_media = self.model.transport().has_media();
                if ui.add_enabled(has_media, egui::Button::new("Close file")).clicked() {
                    self.close();
                }
            });

            let field = ui.add(
                egui::TextEdit::singleline(&mut self.location)
                    .hint_text("File path or URL")
                    .desired_width(f32::INFINITY),
            );
            if field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                let source = MediaSource::parse(&self.location);
                self.open(source);
            }
        });
    }

    fn render_media_area(&mut self, ui: &mut egui::Ui) {
        let available = ui.available_size();
        ui.allocate_ui_with_layout(
            available,
            egui::Layout::centered_and_justified(egui::Direction::TopDown),
            |ui| match (self.model.media(), &self.artwork) {
                (Some(_), Some(texture)) => {
                    let side = available.min_elem().min(ARTWORK_MAX_SIZE);
                    ui.add(egui::Image::new(texture).max_size(egui::vec2(side, side)));
                }
                (Some(media), None) => {
                    let text = match (media.kind, media.tags.headline()) {
                        (MediaKind::Audio, Some(headline)) => headline,
                        (MediaKind::Audio, None) => media.display_name.clone(),
                        (MediaKind::Video, _) => format!("{} (video window)", media.display_name),
                    };
                    ui.label(egui::RichText::new(text).size(20.0));
                }
                (None, _) => {
                    ui.label(
                        egui::RichText::new("Open a file, paste a URL, or drop media here")
                            .size(18.0)
                            .weak(),
                    );
                }
            },
        );
    }

    fn render_seek_bar(&mut self, ui: &mut egui::Ui) {
        let width = ui.available_width().max(1.0);
        let (rect, response) =
            ui.allocate_exact_size(egui::vec2(width, SEEK_BAR_HEIGHT), Sense::click_and_drag());

        let pressed = response.is_pointer_button_down_on();
        if pressed {
            if let Some(pointer) = response.interact_pointer_pos() {
                let offset = pointer.x - rect.left();
                if self.last_scrub_offset != Some(offset) {
                    self.last_scrub_offset = Some(offset);
                    self.scrubbing = true;
                    let requests = self.model.scrub(offset, rect.width());
                    self.send(requests);
                }
            }
        } else if self.scrubbing {
            self.scrubbing = false;
            self.last_scrub_offset = None;
            let requests = self.model.release_scrub(Instant::now());
            self.send(requests);
        }

        let painter = ui.painter_at(rect);
        let track = rect.shrink2(egui::vec2(0.0, SEEK_BAR_HEIGHT / 3.0));
        painter.rect_filled(track, 3.0, ui.visuals().widgets.inactive.bg_fill);
        let fraction = (self.model.position().percent() / 100.0).clamp(0.0, 1.0) as f32;
        let mut filled = track;
        filled.set_right(track.left() + track.width() * fraction);
        painter.rect_filled(filled, 3.0, SEEK_FILL);
        if self.model.transport().has_media() {
            let knob = egui::pos2(filled.right(), rect.center().y);
            let (radius, color) = if self.model.position().is_interacting() {
                (SEEK_BAR_HEIGHT / 2.0, SEEK_FILL)
            } else {
                (SEEK_BAR_HEIGHT / 2.5, ui.visuals().widgets.active.fg_stroke.color)
            };
            painter.circle_filled(knob, radius, color);
        }

        ui.painter().text(
            egui::pos2(rect.right(), rect.bottom() + 2.0),
            Align2::RIGHT_TOP,
            self.model.position().label(),
            FontId::monospace(12.0),
            ui.visuals().text_color(),
        );
        ui.add_space(16.0);
    }

    fn render_controls(&mut self, ui: &mut egui::Ui) {
        let buttons = self.model.buttons();
        ui.horizontal(|ui| {
            if ui
                .add_enabled(buttons.play, egui::Button::new("▶"))
                .on_hover_text("Play")
                .clicked()
            {
                self.command(TransportCommand::Play);
            }
            if ui
                .add_enabled(buttons.pause, egui::Button::new("⏸"))
                .on_hover_text("Pause")
                .clicked()
            {
                self.command(TransportCommand::Pause);
            }
            if ui
                .add_enabled(buttons.stop, egui::Button::new("⏹"))
                .on_hover_text("Stop")
                .clicked()
            {
                self.command(TransportCommand::Stop);
            }

            ui.separator();

            let current_rate = self.model.transport().rate();
            let mut selected_rate = current_rate;
            egui::ComboBox::from_id_salt("speed")
                .selected_text(format!("{current_rate}x"))
                .show_ui(ui, |ui| {
                    for rate in &self.config.playback.rates {
                        ui.selectable_value(&mut selected_rate, *rate, format!("{rate}x"));
                    }
                });
            if selected_rate != current_rate {
                self.command(TransportCommand::SetRate(selected_rate));
            }

            ui.label("🔊");
            let volume = ui.add(
                egui::Slider::new(&mut self.volume, 0.0..=100.0)
                    .suffix("%")
                    .show_value(false),
            );
            if volume.changed() {
                self.command(TransportCommand::SetVolume(self.volume));
            }

            let audio = self.model.audio_tracks().to_vec();
            if let Some(id) = track_selector(ui, "audio_tracks", "Audio", &audio, false) {
                let requests = self.model.select_track(TrackKind::Audio, id);
                self.send(requests);
            }
            let subtitles = self.model.subtitle_tracks().to_vec();
            if let Some(id) = track_selector(ui, "subtitle_tracks", "Subtitles", &subtitles, true) {
                let requests = self.model.select_track(TrackKind::Subtitle, id);
                self.send(requests);
            }
        });
    }

    fn render_notification(&mut self, ui: &mut egui::Ui) {
        let Some(note) = self.model.notification().cloned() else {
            return;
        };
        let color = match note.severity {
            Severity::Info => egui::Color32::from_rgb(240, 200, 80),
            Severity::Error => egui::Color32::from_rgb(220, 80, 80),
        };
        ui.horizontal(|ui| {
            ui.colored_label(color, note.message);
            if ui.small_button("✖").clicked() {
                self.model.dismiss_notification();
            }
        });
    }
}

/// Returns the chosen track id when the user picks one. `-1` disables subtitles.
fn track_selector(
    ui: &mut egui::Ui,
    id_salt: &str,
    label: &str,
    tracks: &[TrackDescriptor],
    allow_off: bool,
) -> Option<i64> {
    if tracks.is_empty() {
        return None;
    }
    let mut picked = None;
    egui::ComboBox::from_id_salt(id_salt)
        .selected_text(label)
        .show_ui(ui, |ui| {
            if allow_off && ui.selectable_label(false, "Off").clicked() {
                picked = Some(-1);
            }
            for track in tracks {
                if ui.selectable_label(false, track.description.as_str()).clicked() {
                    picked = Some(track.id);
                }
            }
        });
    picked
}

fn artwork_to_image(art: &Artwork) -> ColorImage {
    ColorImage::from_rgba_unmultiplied([art.width as usize, art.height as usize], &art.rgba)
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.maintain_config_watcher();
        self.drain_player_events();
        self.drain_stream_channel();
        self.handle_dropped_files(ctx);
        self.handle_keyboard(ctx);
        self.sync_window_title(ctx);
        self.sync_artwork(ctx);

        egui::TopBottomPanel::top("menu").show(ctx, |ui| self.render_menu(ui));
        egui::TopBottomPanel::bottom("transport").show(ctx, |ui| {
            ui.add_space(6.0);
            self.render_notification(ui);
            self.render_seek_bar(ui);
            self.render_controls(ui);
            ui.add_space(6.0);
        });
        egui::CentralPanel::default().show(ctx, |ui| self.render_media_area(ui));

        // Worker events wake us up; this only covers config edits and stream results.
        ctx.request_repaint_after(Duration::from_millis(500));
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // Joins the worker, which releases the engine session.
        self.player.take();
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flickwav=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            warn!("Using default config: {err:?}");
            Config::default()
        }
    };
    let initial = std::env::args().nth(1);

    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_title(DEFAULT_TITLE)
            .with_inner_size([1000.0, 750.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };
    let run_res = eframe::run_native(
        DEFAULT_TITLE,
        native_options,
        Box::new(
            move |cc| -> std::result::Result<
                Box<dyn eframe::App>,
                Box<dyn std::error::Error + Send + Sync>,
            > { Ok(Box::new(App::new(cc, config, initial))) },
        ),
    );
    if let Err(e) = run_res {
        return Err(Box::new(e));
    }

    Ok(())
}
