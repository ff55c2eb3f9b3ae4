use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use eframe::{egui, NativeOptions};
use log::{error, info, warn};

use crate::states::LayoutParams;
use crate::{gui::DemeGraphGui, io, ui};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "demegraph",
    about = "Force-directed deme/transmission visualization for annotated phylogenies."
)]
pub struct AppConfig {
    /// Dataset to load (auspice-style JSON or plain Newick).
    #[arg(value_name = "DATASET")]
    pub dataset_path: Option<PathBuf>,

    /// Canvas width in pixels
    #[arg(long, default_value_t = 1100)]
    pub width: u32,

    /// Canvas height in pixels
    #[arg(long, default_value_t = 760)]
    pub height: u32,

    /// Scale factor applied to deme radii.
    #[arg(long)]
    pub deme_size: Option<f32>,

    /// Spring strength of transmission links in the layout.
    #[arg(long)]
    pub link_strength: Option<f32>,

    /// Run without launching the GUI; output a layout summary to stdout.
    #[arg(long)]
    pub headless: bool,

    /// Force launch of the egui window even when a dataset is provided.
    #[arg(long)]
    pub gui: bool,

    /// Ignore display detection safeguards and attempt to launch the GUI anyway.
    #[arg(long)]
    pub force_gui: bool,
}

impl AppConfig {
    pub fn layout_params(&self) -> LayoutParams {
        let mut params = LayoutParams::default();
        if let Some(scale) = self.deme_size {
            params.deme_count_multiplier *= scale;
        }
        if let Some(strength) = self.link_strength {
            params.link_strength = strength;
        }
        params
    }
}

#[cfg(target_os = "macos")]
mod macos {
    use std::ffi::c_uint;

    #[link(name = "CoreGraphics", kind = "framework")]
    extern "C" {
        fn CGMainDisplayID() -> c_uint;
        fn CGDisplayPixelsWide(display: c_uint) -> usize;
    }

    pub unsafe fn primary_display_width() -> Option<usize> {
        let id = CGMainDisplayID();
        if id == 0 {
            return None;
        }
        Some(CGDisplayPixelsWide(id))
    }
}

pub struct DemeGraphApp;

impl DemeGraphApp {
    pub fn run(config: &AppConfig) -> Result<()> {
        // Default to GUI mode unless explicitly headless
        let wants_gui = !config.headless || config.gui || config.force_gui;

        if !wants_gui {
            return Self::run_headless(config);
        }

        if !config.force_gui && !Self::display_available() {
            warn!("GUI requested but no display was detected; falling back to headless mode.");
            return Self::run_headless(config);
        }

        let mut native_options = NativeOptions::default();
        info!(
            "Launching egui window ({}x{}).",
            config.width, config.height
        );
        native_options.viewport = egui::ViewportBuilder::default()
            .with_title("demegraph")
            .with_inner_size(egui::vec2(config.width as f32, config.height as f32));

        let initial_config = config.clone();
        match eframe::run_native(
            "demegraph",
            native_options,
            Box::new(move |cc| Ok(Box::new(DemeGraphGui::new(cc, initial_config)))),
        ) {
            Ok(result) => Ok(result),
            Err(err) => {
                error!("Failed to launch egui window: {}", err);
                if config.dataset_path.is_some() {
                    warn!("Falling back to headless mode.");
                    Self::run_headless(config)
                } else {
                    Err(anyhow!(err.to_string()))
                }
            }
        }
    }

    fn display_available() -> bool {
        #[cfg(target_os = "macos")]
        {
            unsafe {
                macos::primary_display_width()
                    .map(|width| width > 0)
                    .unwrap_or(false)
            }
        }
        #[cfg(any(
            target_os = "linux",
            target_os = "freebsd",
            target_os = "dragonfly",
            target_os = "netbsd"
        ))]
        {
            std::env::var("DISPLAY").is_ok() || std::env::var("WAYLAND_DISPLAY").is_ok()
        }
        #[cfg(target_os = "windows")]
        {
            true
        }
        #[cfg(not(any(
            target_os = "macos",
            target_os = "linux",
            target_os = "freebsd",
            target_os = "dragonfly",
            target_os = "netbsd",
            target_os = "windows"
        )))]
        {
            false
        }
    }

    fn run_headless(config: &AppConfig) -> Result<()> {
        let dataset_path = config
            .dataset_path
            .clone()
            .ok_or_else(|| anyhow!("headless mode requires a DATASET argument"))?;

        let dataset = io::load_dataset(&dataset_path)?;
        ui::render_preview(&dataset, config);
        Ok(())
    }
}
