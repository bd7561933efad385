/// Chart layout for one nutrient metric
///
/// Pure geometry: a linear scale from `[0, upper]` onto `[0, inner_width]`,
/// tick positions for the axis, and one marker per product that defines the
/// metric. Drawing happens in `plot.rs`.
use crate::state::data::{NutrientMetric, SelectionEntry};

/// Every chart shows at least this much of the domain
pub const MIN_UPPER_BOUND: f64 = 100.0;

/// Room left to the right of the largest value
pub const HEADROOM: f64 = 1.1;

/// Approximate number of axis ticks
pub const TICK_COUNT: usize = 10;

/// Linear mapping from a value domain onto a pixel range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f32, f32),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f32, f32)) -> Self {
        Self { domain, range }
    }

    #[cfg(test)]
    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    /// Position of `value`; not clamped
    pub fn map(&self, value: f64) -> f32 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if d1 == d0 {
            return r0;
        }
        let t = (value - d0) / (d1 - d0);
        r0 + (t as f32) * (r1 - r0)
    }

    /// Round tick values inside the domain, stepping by 1, 2 or 5 x 10^n
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        let (start, stop) = self.domain;
        if count == 0 || !(stop > start) {
            return vec![start];
        }

        let step = tick_step(start, stop, count);
        let first = (start / step).ceil() as i64;
        let last = (stop / step).floor() as i64;
        (first..=last).map(|i| i as f64 * step).collect()
    }
}

/// Tick spacing the way d3 picks it
fn tick_step(start: f64, stop: f64, count: usize) -> f64 {
    let raw = (stop - start) / count as f64;
    let power = raw.log10().floor();
    let base = 10f64.powf(power);
    let error = raw / base;

    let factor = if error >= 50f64.sqrt() {
        10.0
    } else if error >= 10f64.sqrt() {
        5.0
    } else if error >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };
    factor * base
}

/// Upper end of a metric's domain
pub fn upper_bound(values: impl IntoIterator<Item = f64>) -> f64 {
    values
        .into_iter()
        .map(|v| v * HEADROOM)
        .fold(MIN_UPPER_BOUND, f64::max)
}

/// Tick label: as many decimals as the step needs
pub fn format_tick(value: f64, step: f64) -> String {
    let decimals = if step >= 1.0 || step <= 0.0 {
        0
    } else {
        (-step.log10().floor()) as usize
    };
    format!("{:.*}", decimals, value)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub value: f64,
    pub x: f32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub code: String,
    pub value: f64,
    pub x: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartLayout {
    pub metric: NutrientMetric,
    pub scale: LinearScale,
    pub ticks: Vec<Tick>,
    pub markers: Vec<Marker>,
}

impl ChartLayout {
    /// Lay out one metric for the current selection
    ///
    /// Entries without a value for the metric get no marker and do not
    /// stretch the domain.
    pub fn compute(metric: NutrientMetric, entries: &[SelectionEntry], inner_width: f32) -> Self {
        let values: Vec<(&str, f64)> = entries
            .iter()
            .filter_map(|entry| {
                let value = entry.product.nutrient(metric)?;
                Some((entry.code.as_str(), value))
            })
            .collect();

        let upper = upper_bound(values.iter().map(|&(_, v)| v));
        let scale = LinearScale::new((0.0, upper), (0.0, inner_width.max(0.0)));

        let tick_values = scale.ticks(TICK_COUNT);
        let step = match tick_values.as_slice() {
            [a, b, ..] => b - a,
            _ => 1.0,
        };
        let ticks = tick_values
            .iter()
            .map(|&value| Tick {
                value,
                x: scale.map(value),
                label: format_tick(value, step),
            })
            .collect();

        let markers = values
            .into_iter()
            .map(|(code, value)| Marker {
                code: code.to_string(),
                value,
                x: scale.map(value),
            })
            .collect();

        Self {
            metric,
            scale,
            ticks,
            markers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::ProductRecord;
    use crate::state::selection::SelectionStore;
    use std::collections::BTreeMap;

    fn store(products: &[(&str, &[(NutrientMetric, f64)])]) -> SelectionStore {
        let mut store = SelectionStore::new();
        for (code, values) in products {
            let nutriments: BTreeMap<String, f64> = values
                .iter()
                .map(|(metric, value)| (metric.key().to_string(), *value))
                .collect();
            store.add(ProductRecord {
                code: code.to_string(),
                name: None,
                thumbnail_url: None,
                nutriments,
            });
        }
        store
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_upper_bound_floor() {
        assert_eq!(upper_bound([10.0, 20.0, 90.0]), 100.0);
        assert_eq!(upper_bound([]), 100.0);
    }

    #[test]
    fn test_upper_bound_headroom() {
        assert!(approx(upper_bound([10.0, 95.0]), 104.5));
    }

    #[test]
    fn test_missing_value_is_excluded() {
        let sugars = NutrientMetric::Sugars;
        let store = store(&[
            ("a", &[(sugars, 10.0)]),
            ("b", &[(NutrientMetric::Fat, 500.0)]),
            ("c", &[(sugars, 95.0)]),
        ]);

        let layout = ChartLayout::compute(sugars, store.current(), 470.0);
        let codes: Vec<&str> = layout.markers.iter().map(|m| m.code.as_str()).collect();
        assert_eq!(codes, vec!["a", "c"]);
        assert!(approx(layout.scale.domain().1, 104.5));

        // The fat outlier only stretches its own chart
        let fat = ChartLayout::compute(NutrientMetric::Fat, store.current(), 470.0);
        assert_eq!(fat.markers.len(), 1);
        assert!(approx(fat.scale.domain().1, 550.0));
    }

    #[test]
    fn test_zero_is_a_value() {
        let store = store(&[("a", &[(NutrientMetric::Fiber, 0.0)])]);
        let layout = ChartLayout::compute(NutrientMetric::Fiber, store.current(), 470.0);
        assert_eq!(layout.markers.len(), 1);
        assert_eq!(layout.markers[0].x, 0.0);
    }

    #[test]
    fn test_nutella_energy_marker() {
        let store = store(&[("3017620422003", &[(NutrientMetric::EnergyKcal, 539.0)])]);
        let layout = ChartLayout::compute(NutrientMetric::EnergyKcal, store.current(), 470.0);

        assert!(approx(layout.scale.domain().1, 539.0 * 1.1));
        assert_eq!(layout.markers.len(), 1);
        let expected = (539.0 / (539.0 * 1.1) * 470.0) as f32;
        assert!((layout.markers[0].x - expected).abs() < 0.01);
    }

    #[test]
    fn test_scale_maps_range() {
        let scale = LinearScale::new((0.0, 200.0), (0.0, 400.0));
        assert_eq!(scale.map(0.0), 0.0);
        assert_eq!(scale.map(50.0), 100.0);
        assert_eq!(scale.map(200.0), 400.0);
    }

    #[test]
    fn test_ticks() {
        let scale = LinearScale::new((0.0, 100.0), (0.0, 470.0));
        assert_eq!(
            scale.ticks(10),
            vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]
        );

        let scale = LinearScale::new((0.0, 592.9), (0.0, 470.0));
        let ticks = scale.ticks(10);
        assert_eq!(ticks.len(), 12);
        assert_eq!(ticks[1], 50.0);
        assert_eq!(ticks.last(), Some(&550.0));

        let scale = LinearScale::new((0.0, 104.5), (0.0, 470.0));
        assert_eq!(scale.ticks(10).last(), Some(&100.0));
    }

    #[test]
    fn test_tick_labels() {
        let store = store(&[("a", &[(NutrientMetric::Salt, 1.2)])]);
        let layout = ChartLayout::compute(NutrientMetric::Salt, store.current(), 470.0);
        assert_eq!(layout.ticks.first().map(|t| t.label.as_str()), Some("0"));
        assert_eq!(layout.ticks.last().map(|t| t.label.as_str()), Some("100"));

        assert_eq!(format_tick(0.5, 0.1), "0.5");
        assert_eq!(format_tick(0.25, 0.05), "0.25");
    }
}
