/// Comparison screen: selected product chips and one plot per metric
use iced::widget::image::Handle;
use iced::widget::{
    button, canvas, column, container, horizontal_space, image, row, text, tooltip, Column,
};
use iced::{Alignment, Element, Length};
use iced_aw::Wrap;
use std::collections::HashMap;

use crate::state::data::{NutrientMetric, SelectionEntry};
use crate::state::selection::SelectionStore;
use crate::ui::plot::{MetricPlot, PLOT_HEIGHT};
use crate::Message;

/// Chip thumbnail edge
const CHIP_IMAGE_SIZE: f32 = 32.0;

/// Everything below the scanner controls
pub fn comparison_view<'a>(
    selection: &'a SelectionStore,
    thumbnails: &'a HashMap<String, Handle>,
) -> Element<'a, Message> {
    if selection.is_empty() {
        return container(text("No items scanned").size(20))
            .width(Length::Fill)
            .center_x(Length::Fill)
            .padding(32)
            .into();
    }

    let header = row![
        text(format!("{} selected", selection.len())).size(14),
        horizontal_space(),
        button(text("Clear").size(14))
            .on_press(Message::ClearSelection)
            .style(button::secondary),
    ]
    .align_y(Alignment::Center);

    column![
        header,
        product_list(selection.current(), thumbnails),
        plots(selection.current(), thumbnails),
    ]
    .spacing(16)
    .into()
}

fn product_list<'a>(
    entries: &'a [SelectionEntry],
    thumbnails: &'a HashMap<String, Handle>,
) -> Element<'a, Message> {
    let chips: Vec<Element<'a, Message>> = entries
        .iter()
        .map(|entry| product_chip(entry, thumbnails.get(&entry.code)))
        .collect();

    Wrap::with_elements(chips).into()
}

fn product_chip<'a>(entry: &'a SelectionEntry, thumbnail: Option<&Handle>) -> Element<'a, Message> {
    let picture: Element<'a, Message> = match thumbnail {
        Some(handle) => image(handle.clone())
            .width(Length::Fixed(CHIP_IMAGE_SIZE))
            .height(Length::Fixed(CHIP_IMAGE_SIZE))
            .into(),
        None => container(text(""))
            .width(Length::Fixed(CHIP_IMAGE_SIZE))
            .height(Length::Fixed(CHIP_IMAGE_SIZE))
            .style(container::rounded_box)
            .into(),
    };

    let chip = row![
        picture,
        button(text("×").size(14))
            .on_press(Message::RemoveProduct(entry.code.clone()))
            .style(button::text)
            .padding(2),
    ]
    .align_y(Alignment::Center)
    .spacing(2);

    let details = column![
        text(entry.product.display_name()).size(14),
        text(format!(
            "{} · scanned {}",
            entry.code,
            entry.scanned_at.with_timezone(&chrono::Local).format("%H:%M:%S")
        ))
        .size(11),
    ];

    container(
        tooltip(
            chip,
            container(details).padding(8).style(container::rounded_box),
            tooltip::Position::Bottom,
        ),
    )
    .padding(4)
    .into()
}

fn plots<'a>(
    entries: &'a [SelectionEntry],
    thumbnails: &'a HashMap<String, Handle>,
) -> Element<'a, Message> {
    let mut plots: Column<'a, Message> = Column::new().spacing(24);

    for metric in NutrientMetric::ALL {
        let plot = canvas(MetricPlot {
            metric,
            entries,
            thumbnails,
        })
        .width(Length::Fill)
        .height(Length::Fixed(PLOT_HEIGHT));

        plots = plots.push(
            column![plot, text(metric.label()).size(13)]
                .align_x(Alignment::Center)
                .spacing(2),
        );
    }

    plots.into()
}
