/// Scanner controls, live preview and the no-camera fallback screen
use iced::widget::image::Handle;
use iced::widget::{button, column, container, image, text};
use iced::{Alignment, Element, Length};

use crate::capture::CapabilityFlags;
use crate::config::{config_path, CONFIG_ENV_VAR};
use crate::Message;

/// Height of the live preview
const PREVIEW_HEIGHT: f32 = 320.0;

pub fn scan_button<'a>(active: bool) -> Element<'a, Message> {
    let (label, style): (&str, fn(&iced::Theme, button::Status) -> button::Style) = if active {
        ("Cancel scan", button::danger)
    } else {
        ("Scan a barcode", button::success)
    };

    button(text(label).size(16))
        .on_press(Message::ToggleScan)
        .style(style)
        .padding(10)
        .into()
}

/// Live camera image, or a placeholder until the first frame arrives
pub fn camera_view<'a>(preview: Option<&Handle>) -> Element<'a, Message> {
    let content: Element<'a, Message> = match preview {
        Some(handle) => image(handle.clone())
            .width(Length::Fill)
            .height(Length::Fixed(PREVIEW_HEIGHT))
            .into(),
        None => text("Starting camera…").size(16).into(),
    };

    container(content)
        .width(Length::Fill)
        .height(Length::Fixed(PREVIEW_HEIGHT))
        .center_x(Length::Fill)
        .center_y(Length::Fixed(PREVIEW_HEIGHT))
        .style(container::rounded_box)
        .into()
}

/// Shown instead of the scanner when capture cannot work on this machine
pub fn fallback_view<'a>(flags: CapabilityFlags) -> Element<'a, Message> {
    let reason = if !flags.barcode_detection {
        "Barcode recognition is disabled: no formats are configured under [scanner]."
    } else {
        "No camera was found on this machine."
    };

    let config_hint = match config_path() {
        Some(path) => format!("Config file: {} (or set {})", path.display(), CONFIG_ENV_VAR),
        None => format!("Set {} to point at a config file.", CONFIG_ENV_VAR),
    };

    column![
        text("The scanner needs a camera").size(24),
        text(reason).size(16),
        text("Point [camera] frames_dir at a folder of barcode photos,").size(16),
        text("or build with the `webcam` feature to use a native camera.").size(16),
        text(config_hint).size(13),
    ]
    .spacing(12)
    .padding(32)
    .width(Length::Fill)
    .align_x(Alignment::Center)
    .into()
}
