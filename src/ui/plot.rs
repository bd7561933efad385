/// Per-metric comparison plot
/// Draws one horizontal scale with a marker per product
use iced::widget::canvas::{self, Path, Stroke, Text};
use iced::widget::image::Handle;
use iced::{alignment, Color, Pixels, Point, Rectangle, Size};
use std::collections::HashMap;

use crate::state::data::{NutrientMetric, SelectionEntry};
use crate::ui::chart::ChartLayout;
use crate::Message;

/// Canvas height of one plot
pub const PLOT_HEIGHT: f32 = 70.0;

const MARGIN_LEFT: f32 = 15.0;
const MARGIN_RIGHT: f32 = 15.0;

/// Vertical centre of the markers
const MARKER_Y: f32 = 15.0;
/// Baseline of the axis
const AXIS_Y: f32 = 35.0;
const TICK_SIZE: f32 = 6.0;

/// White contrast ring around each marker
const RING_RADIUS: f32 = 13.0;
const MARKER_RADIUS: f32 = 12.0;

/// Plot for one metric over the current selection
pub struct MetricPlot<'a> {
    pub metric: NutrientMetric,
    pub entries: &'a [SelectionEntry],
    pub thumbnails: &'a HashMap<String, Handle>,
}

impl<'a> canvas::Program<Message> for MetricPlot<'a> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &iced::Renderer,
        theme: &iced::Theme,
        bounds: Rectangle,
        _cursor: iced::mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        let inner_width = (bounds.width - MARGIN_LEFT - MARGIN_RIGHT).max(0.0);
        let layout = ChartLayout::compute(self.metric, self.entries, inner_width);

        let palette = theme.palette();
        let axis_color = Color {
            a: 0.7,
            ..palette.text
        };

        // Markers, in selection order so later scans sit on top
        for marker in &layout.markers {
            let center = Point::new(MARGIN_LEFT + marker.x, MARKER_Y);
            frame.fill(&Path::circle(center, RING_RADIUS), Color::WHITE);

            match self.thumbnails.get(&marker.code) {
                Some(handle) => {
                    let top_left = Point::new(center.x - MARKER_RADIUS, center.y - MARKER_RADIUS);
                    let size = Size::new(MARKER_RADIUS * 2.0, MARKER_RADIUS * 2.0);
                    frame.draw_image(Rectangle::new(top_left, size), handle);
                }
                None => frame.fill(&Path::circle(center, MARKER_RADIUS), palette.primary),
            }
        }

        // Axis line without outer ticks
        let axis = Path::line(
            Point::new(MARGIN_LEFT, AXIS_Y),
            Point::new(MARGIN_LEFT + inner_width, AXIS_Y),
        );
        frame.stroke(&axis, Stroke::default().with_color(axis_color).with_width(1.0));

        let mut ticks = canvas::path::Builder::new();
        for tick in &layout.ticks {
            let x = MARGIN_LEFT + tick.x;
            ticks.move_to(Point::new(x, AXIS_Y));
            ticks.line_to(Point::new(x, AXIS_Y + TICK_SIZE));

            frame.fill_text(Text {
                content: tick.label.clone(),
                position: Point::new(x, AXIS_Y + TICK_SIZE + 2.0),
                color: axis_color,
                size: Pixels(10.0),
                horizontal_alignment: alignment::Horizontal::Center,
                vertical_alignment: alignment::Vertical::Top,
                ..Text::default()
            });
        }
        frame.stroke(
            &ticks.build(),
            Stroke::default().with_color(axis_color).with_width(1.0),
        );

        vec![frame.into_geometry()]
    }
}
