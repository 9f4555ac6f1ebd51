use seqwall::cli::Args;
use seqwall::sequence;
use seqwall::wall::{Wall, TILE_BG};
use seqwall::workers::Workers;

use clap::Parser;
use eframe::egui;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Window background, darker than the tiles so the grid reads as a wall
const WINDOW_FILL: egui::Color32 = egui::Color32::from_rgb(0x11, 0x11, 0x11);
const TILE_FILL: egui::Color32 = egui::Color32::from_rgb(TILE_BG.0[0], TILE_BG.0[1], TILE_BG.0[2]);

const FPS_RANGE: std::ops::RangeInclusive<u32> = 1..=30;
const COLUMNS_RANGE: std::ops::RangeInclusive<usize> = 1..=24;
const TILE_SIZE_RANGE: std::ops::RangeInclusive<u32> = 80..=480;
const STEP_RANGE: std::ops::RangeInclusive<usize> = 1..=8;

/// Main application state
struct SeqWallApp {
    wall: Option<Wall>,
    /// GPU textures, one slot per tile, re-uploaded when the tile is dirty
    textures: Vec<Option<egui::TextureHandle>>,
    workers: Arc<Workers>,
    path_input: String,
    fps: u32,
    columns: usize,
    tile_size: u32,
    step: usize,
    playing: bool,
    error_msg: Option<String>,
    last_tick: Instant,
}

impl SeqWallApp {
    fn new(args: &Args) -> Self {
        let num_workers = args.workers.unwrap_or_else(Workers::default_threads);
        let workers = Arc::new(Workers::new(num_workers));

        let mut app = Self {
            wall: None,
            textures: Vec::new(),
            workers,
            path_input: String::new(),
            fps: args.fps.clamp(*FPS_RANGE.start(), *FPS_RANGE.end()),
            columns: args.columns.clamp(*COLUMNS_RANGE.start(), *COLUMNS_RANGE.end()),
            tile_size: args
                .tile_size
                .clamp(*TILE_SIZE_RANGE.start(), *TILE_SIZE_RANGE.end()),
            step: args.step.clamp(*STEP_RANGE.start(), *STEP_RANGE.end()),
            playing: args.autoplay,
            error_msg: None,
            last_tick: Instant::now(),
        };

        if let Some(root) = &args.root {
            app.path_input = root.display().to_string();
            app.load_root(root.clone());
        }

        app
    }

    /// Scan `root` and replace the current wall. Invalid roots fail
    /// synchronously with an inline error; an empty scan is a valid
    /// (empty) wall.
    fn load_root(&mut self, root: PathBuf) {
        if !root.is_dir() {
            let msg = format!("Not a directory: {}", root.display());
            warn!("{}", msg);
            self.error_msg = Some(msg);
            return;
        }

        let sequences = sequence::scan(&root);
        info!(
            "Loaded {} sequence(s) from {}",
            sequences.len(),
            root.display()
        );

        self.replace_wall(Wall::new(root, sequences, self.tile_size, Arc::clone(&self.workers)));
        self.error_msg = None;
    }

    fn replace_wall(&mut self, wall: Wall) {
        self.textures = (0..wall.tile_count()).map(|_| None).collect();
        self.wall = Some(wall);
        self.last_tick = Instant::now();
    }

    /// Tile size changed: same sequences, fresh wall and cache at the
    /// new size. In-flight jobs for the old wall complete into the old
    /// (dropped) channel and are discarded.
    fn rebuild_for_tile_size(&mut self) {
        let Some(wall) = &self.wall else { return };
        if wall.tile_size() == self.tile_size {
            return;
        }
        debug!("Rebuilding wall at tile size {}", self.tile_size);
        let root = wall.root().to_path_buf();
        let sequences = wall.sequences().to_vec();
        self.replace_wall(Wall::new(root, sequences, self.tile_size, Arc::clone(&self.workers)));
    }

    fn set_all_running(&mut self, running: bool) {
        let Some(wall) = &mut self.wall else { return };
        for idx in 0..wall.tile_count() {
            if let Some(tile) = wall.tile_mut(idx) {
                tile.running = running;
            }
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        let mut load_request = None;

        ui.horizontal(|ui| {
            ui.label("Folder:");
            let edit = ui.add(
                egui::TextEdit::singleline(&mut self.path_input).desired_width(280.0),
            );
            if edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                load_request = Some(PathBuf::from(self.path_input.trim()));
            }
            if ui.button("…").clicked() {
                if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                    self.path_input = dir.display().to_string();
                    load_request = Some(dir);
                }
            }
            if ui.button("Load").clicked() {
                load_request = Some(PathBuf::from(self.path_input.trim()));
            }

            ui.separator();

            ui.label("FPS:");
            ui.add(egui::DragValue::new(&mut self.fps).range(FPS_RANGE));
            ui.label("Cols:");
            ui.add(egui::DragValue::new(&mut self.columns).range(COLUMNS_RANGE));
            ui.label("Size:");
            ui.add(
                egui::Slider::new(&mut self.tile_size, TILE_SIZE_RANGE)
                    .step_by(10.0)
                    .show_value(true),
            );
            ui.label("Step:");
            ui.add(egui::DragValue::new(&mut self.step).range(STEP_RANGE));

            ui.separator();

            ui.checkbox(&mut self.playing, "Play");
            if ui.button("Play all").clicked() {
                self.set_all_running(true);
            }
            if ui.button("Pause all").clicked() {
                self.set_all_running(false);
            }
        });

        if let Some(root) = load_request {
            self.load_root(root);
        }
        self.rebuild_for_tile_size();
    }

    /// Render the tile grid, returning the per-tile visibility mask for
    /// the scheduler tick.
    fn grid(&mut self, ui: &mut egui::Ui) -> Vec<bool> {
        let Some(wall) = &mut self.wall else {
            ui.centered_and_justified(|ui| {
                ui.label("Pick a folder to scan for image sequences");
            });
            return Vec::new();
        };

        let count = wall.tile_count();
        let mut visible = vec![false; count];
        let ts = self.tile_size as f32;
        let caption_height = 18.0;

        egui::ScrollArea::vertical().show(ui, |ui| {
            for row_start in (0..count).step_by(self.columns) {
                let row_end = (row_start + self.columns).min(count);
                ui.horizontal(|ui| {
                    for idx in row_start..row_end {
                        ui.allocate_ui(egui::vec2(ts, ts + caption_height), |ui| {
                            ui.vertical(|ui| {
                                let (rect, response) = ui.allocate_exact_size(
                                    egui::vec2(ts, ts),
                                    egui::Sense::click(),
                                );
                                visible[idx] = ui.is_rect_visible(rect);

                                // Texture upload, only when the image changed
                                if let Some(tile) = wall.tile_mut(idx) {
                                    if tile.take_dirty() || self.textures[idx].is_none() {
                                        if let Some(img) = tile.image() {
                                            let (w, h) = img.dimensions();
                                            let color = egui::ColorImage::from_rgb(
                                                [w as usize, h as usize],
                                                img.as_raw(),
                                            );
                                            self.textures[idx] = Some(ui.ctx().load_texture(
                                                format!("tile-{}", idx),
                                                color,
                                                egui::TextureOptions::LINEAR,
                                            ));
                                        } else {
                                            self.textures[idx] = None;
                                        }
                                    }
                                }

                                let painter = ui.painter();
                                painter.rect_filled(rect, 2.0, TILE_FILL);
                                if let Some(tex) = &self.textures[idx] {
                                    painter.image(
                                        tex.id(),
                                        rect,
                                        egui::Rect::from_min_max(
                                            egui::pos2(0.0, 0.0),
                                            egui::pos2(1.0, 1.0),
                                        ),
                                        egui::Color32::WHITE,
                                    );
                                }

                                if let Some(tile) = wall.tile(idx) {
                                    if let Some(err) = tile.error() {
                                        painter.text(
                                            rect.center(),
                                            egui::Align2::CENTER_CENTER,
                                            err,
                                            egui::FontId::proportional(11.0),
                                            egui::Color32::from_rgb(220, 80, 80),
                                        );
                                    } else if tile.image().is_none() {
                                        painter.text(
                                            rect.center(),
                                            egui::Align2::CENTER_CENTER,
                                            "…",
                                            egui::FontId::proportional(16.0),
                                            egui::Color32::GRAY,
                                        );
                                    }
                                    if !tile.running {
                                        painter.text(
                                            rect.left_top() + egui::vec2(6.0, 6.0),
                                            egui::Align2::LEFT_TOP,
                                            "⏸",
                                            egui::FontId::proportional(14.0),
                                            egui::Color32::LIGHT_GRAY,
                                        );
                                    }
                                }

                                // Click anywhere on the tile toggles its pause flag
                                if response.clicked() {
                                    if let Some(tile) = wall.tile_mut(idx) {
                                        tile.toggle_running();
                                    }
                                }

                                ui.set_max_width(ts);
                                ui.add(
                                    egui::Label::new(
                                        egui::RichText::new(wall.sequences()[idx].caption())
                                            .size(11.0)
                                            .color(egui::Color32::LIGHT_GRAY),
                                    )
                                    .truncate(),
                                );
                            });
                        });
                    }
                });
            }
        });

        visible
    }

    fn status_line(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            match &self.wall {
                Some(wall) => {
                    let loaded = (0..wall.tile_count())
                        .filter(|&i| wall.tile(i).map(|t| t.is_loaded()).unwrap_or(false))
                        .count();
                    let stats = wall.cache().stats();
                    ui.label(format!(
                        "{} sequences | {} loaded | cache: {} entries, {} mem / {} disk hits, {} misses | {} renders",
                        wall.tile_count(),
                        loaded,
                        wall.cache().len(),
                        stats.mem_hits,
                        stats.disk_hits,
                        stats.misses,
                        wall.render_count(),
                    ));
                }
                None => {
                    ui.label("No folder loaded");
                }
            }
            if let Some(err) = &self.error_msg {
                ui.separator();
                ui.colored_label(egui::Color32::from_rgb(220, 80, 80), err);
            }
        });
    }
}

impl eframe::App for SeqWallApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = WINDOW_FILL;
        visuals.window_fill = WINDOW_FILL;
        ctx.set_visuals(visuals);

        // Apply finished worker jobs before painting
        if let Some(wall) = &mut self.wall {
            if wall.drain_results() > 0 {
                ctx.request_repaint();
            }
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.status_line(ui));

        let visible = egui::CentralPanel::default()
            .show(ctx, |ui| self.grid(ui))
            .inner;

        // Tick at the configured rate using the visibility mask from the
        // grid pass just rendered
        let period = Duration::from_secs_f64(1.0 / self.fps.max(1) as f64);
        if let Some(wall) = &mut self.wall {
            if self.last_tick.elapsed() >= period {
                wall.tick(&visible, self.playing, self.step);
                self.last_tick = Instant::now();
            }
            ctx.request_repaint_after(period.saturating_sub(self.last_tick.elapsed()));
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("seqwall.log"));
        let file = std::fs::File::create(&log_path)?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .filter_module("egui", log::LevelFilter::Info) // Suppress egui DEBUG spam
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .filter_module("egui", log::LevelFilter::Info) // Suppress egui DEBUG spam
            .format_timestamp_millis()
            .init();
    }

    info!("SeqWall starting...");
    debug!("Command-line args: {:?}", args);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!("SeqWall v{}", env!("CARGO_PKG_VERSION")))
            .with_inner_size(egui::vec2(1280.0, 800.0))
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(
        "SeqWall",
        native_options,
        Box::new(move |_cc| Ok(Box::new(SeqWallApp::new(&args)))),
    )?;

    info!("Application exiting");
    Ok(())
}
