/// User interface module
///
/// - `chart.rs` - scale, ticks and marker positions (pure layout)
/// - `plot.rs` - canvas drawing of one metric
/// - `comparison.rs` - product chips and the list of plots
/// - `scanner.rs` - scan controls, live preview, fallback screen
/// - `thumbnail.rs` - disc-shaped product images

pub mod chart;
pub mod comparison;
pub mod plot;
pub mod scanner;
pub mod thumbnail;
