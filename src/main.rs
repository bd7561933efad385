use iced::widget::image::Handle;
use iced::widget::{button, column, container, horizontal_space, row, scrollable, text, Column};
use iced::{time, Alignment, Element, Length, Size, Subscription, Task, Theme};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

mod capture;
mod config;
mod error;
mod logging;
mod lookup;
mod state;
mod ui;

use capture::{
    choose_variant, Capabilities, CapabilityFlags, CapturePipeline, DetectedBarcode,
    PreviewFrame, StreamHandle, StreamRequest, UiVariant,
};
use config::{AppConfig, APP_DIR_NAME};
use error::{CaptureError, LookupError, ThumbnailError};
use lookup::{ProductLookup, Resolution};
use state::preference::{system_preference, PreferenceStore, ThemePreference};
use state::selection::{AddOutcome, SelectionStore};
use state::storage::LocalStorage;
use ui::thumbnail::{fetch_marker_image, MarkerImage};

/// Main application state
struct FoodComparator {
    config: AppConfig,
    /// Capability flags probed at startup
    flags: CapabilityFlags,
    /// Scanner screen or static fallback
    variant: UiVariant,
    pipeline: CapturePipeline,
    /// `None` when the HTTP client could not be built
    lookup: Option<Arc<ProductLookup>>,
    /// Barcodes with a lookup in flight
    pending: HashSet<String>,
    selection: SelectionStore,
    /// Marker images by product code
    thumbnails: HashMap<String, Handle>,
    /// Last frame shown in the scanner
    preview: Option<Handle>,
    preferences: PreferenceStore,
    /// Dismissible message shown above the comparison
    notice: Option<String>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// Scan button: start, or cancel a running scan
    ToggleScan,
    StreamAcquired(u64, Result<StreamHandle, CaptureError>),
    PreviewTick,
    PreviewReady(u64, Result<PreviewFrame, CaptureError>),
    SampleTick,
    Sampled(u64, Result<Vec<DetectedBarcode>, CaptureError>),
    /// Lookup finished for a detected barcode
    Resolved(String, Result<Resolution, LookupError>),
    ThumbnailLoaded(String, Result<MarkerImage, ThumbnailError>),
    RemoveProduct(String),
    ClearSelection,
    ToggleTheme,
    DismissNotice,
}

impl FoodComparator {
    fn new(config: AppConfig) -> (Self, Task<Message>) {
        let capabilities = Capabilities::probe(&config);
        let flags = capabilities.flags();
        let variant = choose_variant(flags);
        info!(?flags, ?variant, "Capabilities probed");

        let pipeline = CapturePipeline::new(&capabilities, StreamRequest::from_config(&config.camera));

        let mut notice = None;
        let lookup = match ProductLookup::new(&config.lookup) {
            Ok(lookup) => Some(Arc::new(lookup)),
            Err(e) => {
                error!(error = %e, "Product lookup unavailable");
                notice = Some(format!("Product lookup unavailable: {}", e));
                None
            }
        };

        let storage = LocalStorage::user_default().unwrap_or_else(|e| {
            let fallback = std::env::temp_dir().join(APP_DIR_NAME).join("preferences.json");
            warn!(error = %e, path = %fallback.display(), "Using temporary preference storage");
            LocalStorage::at(fallback)
        });
        let preferences = PreferenceStore::load(storage, system_preference);
        info!(theme = preferences.get_preference().as_str(), "Theme preference applied");

        (
            FoodComparator {
                config,
                flags,
                variant,
                pipeline,
                lookup,
                pending: HashSet::new(),
                selection: SelectionStore::new(),
                thumbnails: HashMap::new(),
                preview: None,
                preferences,
                notice,
            },
            Task::none(),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::ToggleScan => {
                if self.pipeline.is_active() {
                    self.stop_scanning();
                    return Task::none();
                }

                match self.pipeline.begin() {
                    Ok(acquisition) => {
                        let session = acquisition.session;
                        self.notice = None;
                        Task::perform(capture::acquire(acquisition), move |result| {
                            Message::StreamAcquired(session, result)
                        })
                    }
                    Err(e) => {
                        warn!(error = %e, "Scanner did not start");
                        self.notice = Some(e.to_string());
                        Task::none()
                    }
                }
            }
            Message::StreamAcquired(session, result) => {
                if let Err(e) = self.pipeline.stream_acquired(session, result) {
                    self.preview = None;
                    self.notice = Some(format!("Camera unavailable: {}", e));
                }
                Task::none()
            }
            Message::PreviewTick => match self.pipeline.preview_job() {
                Some(job) => {
                    let session = job.session;
                    Task::perform(capture::preview(job), move |result| {
                        Message::PreviewReady(session, result)
                    })
                }
                None => Task::none(),
            },
            Message::PreviewReady(session, result) => {
                match result {
                    Ok(frame) => {
                        if self.pipeline.frame_attached(session) {
                            self.preview =
                                Some(Handle::from_rgba(frame.width, frame.height, frame.pixels));
                        }
                    }
                    Err(e) => {
                        debug!(session, error = %e, "No preview frame");
                        self.pipeline.frame_failed(session);
                    }
                }
                Task::none()
            }
            Message::SampleTick => match self.pipeline.sample_job() {
                Some(job) => {
                    let session = job.session;
                    Task::perform(capture::sample(job), move |result| {
                        Message::Sampled(session, result)
                    })
                }
                None => Task::none(),
            },
            Message::Sampled(session, result) => {
                match self.pipeline.sample_finished(session, result) {
                    Some(barcode) => self.on_detection(barcode),
                    None => Task::none(),
                }
            }
            Message::Resolved(barcode, result) => {
                self.pending.remove(&barcode);
                match result {
                    Ok(Resolution::Found(product)) => return self.add_product(product),
                    Ok(Resolution::NotFound) => {
                        debug!(barcode = %barcode, "Product not found");
                    }
                    Err(e) => {
                        warn!(barcode = %barcode, error = %e, "Product lookup failed");
                        self.notice = Some(format!("Lookup failed for {}: {}", barcode, e));
                    }
                }
                Task::none()
            }
            Message::ThumbnailLoaded(code, result) => {
                match result {
                    // The product may have been removed while downloading
                    Ok(marker) if self.selection.contains(&code) => {
                        self.thumbnails.insert(code, marker.handle());
                    }
                    Ok(_) => {}
                    Err(e) => debug!(code = %code, error = %e, "Thumbnail unavailable"),
                }
                Task::none()
            }
            Message::RemoveProduct(code) => {
                if self.selection.remove(&code) {
                    self.thumbnails.remove(&code);
                    info!(code = %code, "Product removed");
                }
                Task::none()
            }
            Message::ClearSelection => {
                self.selection.clear();
                self.thumbnails.clear();
                info!("Selection cleared");
                Task::none()
            }
            Message::ToggleTheme => {
                match self.preferences.toggle() {
                    Ok(preference) => info!(theme = preference.as_str(), "Theme changed"),
                    Err(e) => warn!(error = %e, "Theme changed but not persisted"),
                }
                Task::none()
            }
            Message::DismissNotice => {
                self.notice = None;
                Task::none()
            }
        }
    }

    fn stop_scanning(&mut self) {
        self.pipeline.stop();
        self.preview = None;
    }

    /// A barcode was read from the camera
    fn on_detection(&mut self, barcode: DetectedBarcode) -> Task<Message> {
        info!(barcode = %barcode.raw_value, format = barcode.format.as_str(), "Barcode detected");

        if self.config.scanner.stop_after_detection {
            self.stop_scanning();
        }

        let code = barcode.catalog_code();
        if self.selection.contains(&code) || self.pending.contains(&code) {
            debug!(barcode = %code, "Already selected or being looked up");
            return Task::none();
        }

        let Some(lookup) = self.lookup.clone() else {
            return Task::none();
        };

        self.pending.insert(code.clone());
        let query = code.clone();
        Task::perform(async move { lookup.resolve(&query).await }, move |result| {
            Message::Resolved(code.clone(), result)
        })
    }

    /// Found product: add it and fetch its marker image
    fn add_product(&mut self, product: state::data::ProductRecord) -> Task<Message> {
        let code = product.code.clone();
        let name = product.display_name().to_string();
        let thumbnail_url = product.thumbnail_url.clone();

        match self.selection.add(product) {
            AddOutcome::Added => info!(code = %code, name = %name, "Product added"),
            AddOutcome::AlreadyPresent => {
                debug!(code = %code, "Product already selected");
                return Task::none();
            }
        }

        match (thumbnail_url, &self.lookup) {
            (Some(url), Some(lookup)) => {
                Task::perform(fetch_marker_image(lookup.http_client(), url), move |result| {
                    Message::ThumbnailLoaded(code.clone(), result)
                })
            }
            _ => Task::none(),
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let theme_label = match self.preferences.get_preference() {
            ThemePreference::Light => "Dark mode",
            ThemePreference::Dark => "Light mode",
        };

        let header = row![
            text("Food comparator").size(32),
            horizontal_space(),
            button(text(theme_label).size(14))
                .on_press(Message::ToggleTheme)
                .style(button::secondary),
        ]
        .align_y(Alignment::Center);

        let mut content: Column<Message> = column![header].spacing(20);

        match self.variant {
            UiVariant::Fallback => {
                content = content.push(ui::scanner::fallback_view(self.flags));
            }
            UiVariant::Scanner => {
                content = content.push(ui::scanner::scan_button(self.pipeline.is_active()));
                if self.pipeline.is_active() {
                    content = content.push(ui::scanner::camera_view(self.preview.as_ref()));
                }
            }
        }

        if let Some(notice) = &self.notice {
            content = content.push(
                container(
                    row![
                        text(notice).size(14),
                        horizontal_space(),
                        button(text("Dismiss").size(12))
                            .on_press(Message::DismissNotice)
                            .style(button::text),
                    ]
                    .align_y(Alignment::Center),
                )
                .padding(8)
                .style(container::rounded_box),
            );
        }

        if !self.pending.is_empty() {
            content = content.push(text(format!("Looking up {} product(s)…", self.pending.len())).size(13));
        }

        if self.variant == UiVariant::Scanner {
            content = content.push(ui::comparison::comparison_view(&self.selection, &self.thumbnails));
        }

        scrollable(
            container(content.padding(24).max_width(860))
                .width(Length::Fill)
                .center_x(Length::Fill),
        )
        .into()
    }

    /// Preview refresh while a stream is open, recognition once frames show
    fn subscription(&self) -> Subscription<Message> {
        if !self.pipeline.is_active() {
            return Subscription::none();
        }

        let mut subscriptions =
            vec![time::every(self.config.scanner.preview_interval()).map(|_| Message::PreviewTick)];
        if self.pipeline.is_detecting() {
            subscriptions.push(
                time::every(self.config.scanner.sample_interval()).map(|_| Message::SampleTick),
            );
        }

        Subscription::batch(subscriptions)
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        self.preferences.get_preference().theme()
    }
}

fn main() -> iced::Result {
    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    logging::init(&config.logging);
    if let Some(e) = config_error {
        error!(error = %e, "Ignoring config file, using defaults");
    }
    info!("Food comparator v{} starting", env!("CARGO_PKG_VERSION"));

    iced::application("Food comparator", FoodComparator::update, FoodComparator::view)
        .subscription(FoodComparator::subscription)
        .theme(FoodComparator::theme)
        .window_size(Size::new(900.0, 960.0))
        .centered()
        .run_with(move || FoodComparator::new(config))
}
