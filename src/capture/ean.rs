/// EAN-13 / EAN-8 / UPC-A recognizer
///
/// Scans a handful of horizontal lines across a grayscale frame. Each line is
/// binarized around its mid-range, run-length encoded and searched for the
/// start guard of a symbol. Digits are best-fit matched against the module
/// width tables and the result is accepted only if the guards line up and the
/// checksum holds. Lines are also read right-to-left so upside-down codes work.
use image::GrayImage;
use serde::Deserialize;

use super::{BarcodeRecognizer, DetectedBarcode};

/// Symbologies this recognizer can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum BarcodeFormat {
    #[serde(rename = "ean_13")]
    Ean13,
    #[serde(rename = "ean_8")]
    Ean8,
    #[serde(rename = "upc_a")]
    UpcA,
}

impl BarcodeFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            BarcodeFormat::Ean13 => "ean_13",
            BarcodeFormat::Ean8 => "ean_8",
            BarcodeFormat::UpcA => "upc_a",
        }
    }
}

/// Module widths of the L-code digits (space, bar, space, bar).
/// R-codes have the same widths with colors swapped; G-codes are reversed.
const DIGIT_WIDTHS: [[f32; 4]; 10] = [
    [3.0, 2.0, 1.0, 1.0],
    [2.0, 2.0, 2.0, 1.0],
    [2.0, 1.0, 2.0, 2.0],
    [1.0, 4.0, 1.0, 1.0],
    [1.0, 1.0, 3.0, 2.0],
    [1.0, 2.0, 3.0, 1.0],
    [1.0, 1.0, 1.0, 4.0],
    [1.0, 3.0, 1.0, 2.0],
    [1.0, 2.0, 1.0, 3.0],
    [3.0, 1.0, 1.0, 2.0],
];

/// EAN-13 leading digit encoded by the L/G parity of the left half
/// (bit set = G, most significant bit = first left digit)
const FIRST_DIGIT_PARITY: [u8; 10] = [
    0b000000, 0b001011, 0b001101, 0b001110, 0b010011, 0b011001, 0b011100, 0b010101, 0b010110,
    0b011010,
];

/// Summed absolute deviation (in modules) tolerated for one digit
const MAX_DIGIT_ERROR: f32 = 1.6;
/// Relative deviation tolerated for a single guard element
const MAX_GUARD_DEVIATION: f32 = 0.6;
/// Light margin before the start guard, in modules
const MIN_QUIET_ZONE: f32 = 2.0;
/// Rows whose dynamic range is below this carry no barcode
const MIN_CONTRAST: u8 = 40;

/// Layout of one symbology in run-length terms
struct Layout {
    format: BarcodeFormat,
    digits_per_half: usize,
    modules: f32,
}

const EAN13: Layout = Layout {
    format: BarcodeFormat::Ean13,
    digits_per_half: 6,
    modules: 95.0,
};

const EAN8: Layout = Layout {
    format: BarcodeFormat::Ean8,
    digits_per_half: 4,
    modules: 67.0,
};

impl Layout {
    /// guard + digits + middle guard + digits + guard
    fn runs(&self) -> usize {
        3 + self.digits_per_half * 4 + 5 + self.digits_per_half * 4 + 3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parity {
    L,
    G,
}

/// Built-in line-scan recognizer
#[derive(Debug, Clone)]
pub struct EanRecognizer {
    formats: Vec<BarcodeFormat>,
    scan_lines: u32,
}

impl EanRecognizer {
    pub fn new(formats: Vec<BarcodeFormat>, scan_lines: u32) -> Self {
        Self {
            formats,
            scan_lines: scan_lines.max(1),
        }
    }

    fn wants(&self, format: BarcodeFormat) -> bool {
        self.formats.contains(&format)
    }

    /// Map a raw decode onto the formats the caller asked for
    fn classify(&self, format: BarcodeFormat, digits: String) -> Option<DetectedBarcode> {
        match format {
            BarcodeFormat::Ean13 if digits.starts_with('0') && self.wants(BarcodeFormat::UpcA) => {
                Some(DetectedBarcode {
                    raw_value: digits[1..].to_string(),
                    format: BarcodeFormat::UpcA,
                })
            }
            BarcodeFormat::Ean13 if self.wants(BarcodeFormat::Ean13) => Some(DetectedBarcode {
                raw_value: digits,
                format: BarcodeFormat::Ean13,
            }),
            BarcodeFormat::Ean8 if self.wants(BarcodeFormat::Ean8) => Some(DetectedBarcode {
                raw_value: digits,
                format: BarcodeFormat::Ean8,
            }),
            _ => None,
        }
    }
}

impl BarcodeRecognizer for EanRecognizer {
    fn detect(&self, frame: &GrayImage) -> Vec<DetectedBarcode> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 || self.formats.is_empty() {
            return Vec::new();
        }

        let mut found: Vec<DetectedBarcode> = Vec::new();
        for line in 0..self.scan_lines {
            let y = (height as u64 * (line as u64 + 1) / (self.scan_lines as u64 + 1)) as u32;
            let y = y.min(height - 1);
            let row: Vec<u8> = (0..width).map(|x| frame.get_pixel(x, y)[0]).collect();

            for (format, digits) in decode_row(&row) {
                if let Some(barcode) = self.classify(format, digits) {
                    if !found.contains(&barcode) {
                        found.push(barcode);
                    }
                }
            }
        }

        found
    }
}

/// Decode every symbol found on one pixel row, in both directions
fn decode_row(row: &[u8]) -> Vec<(BarcodeFormat, String)> {
    let Some(runs) = run_lengths(row) else {
        return Vec::new();
    };

    let mut reversed = runs.clone();
    reversed.reverse();

    let mut results = Vec::new();
    for runs in [&runs, &reversed] {
        for result in decode_runs(runs) {
            if !results.contains(&result) {
                results.push(result);
            }
        }
    }
    results
}

/// Alternating run widths of the row, as (is_dark, width)
fn run_lengths(row: &[u8]) -> Option<Vec<(bool, u32)>> {
    let min = *row.iter().min()?;
    let max = *row.iter().max()?;
    if max - min < MIN_CONTRAST {
        return None;
    }
    let threshold = ((min as u16 + max as u16) / 2) as u8;

    let mut runs: Vec<(bool, u32)> = Vec::new();
    for &pixel in row {
        let dark = pixel < threshold;
        match runs.last_mut() {
            Some((last_dark, width)) if *last_dark == dark => *width += 1,
            _ => runs.push((dark, 1)),
        }
    }
    Some(runs)
}

fn decode_runs(runs: &[(bool, u32)]) -> Vec<(BarcodeFormat, String)> {
    let mut results = Vec::new();
    for start in 0..runs.len() {
        if !runs[start].0 {
            continue;
        }
        for layout in [&EAN13, &EAN8] {
            if let Some(digits) = decode_at(runs, start, layout) {
                results.push((layout.format, digits));
            }
        }
    }
    results
}

/// Try to read a full symbol whose start guard begins at `runs[start]`
fn decode_at(runs: &[(bool, u32)], start: usize, layout: &Layout) -> Option<String> {
    let end = start + layout.runs();
    if end > runs.len() {
        return None;
    }
    let widths: Vec<f32> = runs[start..end].iter().map(|&(_, w)| w as f32).collect();
    let module = widths.iter().sum::<f32>() / layout.modules;

    if start > 0 && (runs[start - 1].1 as f32) < MIN_QUIET_ZONE * module {
        return None;
    }

    let half = layout.digits_per_half * 4;
    let middle = 3 + half;
    let right = middle + 5;
    let end_guard = right + half;

    if !is_guard(&widths[..3], module)
        || !is_guard(&widths[middle..right], module)
        || !is_guard(&widths[end_guard..], module)
    {
        return None;
    }

    let mut digits: Vec<u8> = Vec::with_capacity(layout.digits_per_half * 2 + 1);
    let mut parity_bits: u8 = 0;

    for group in widths[3..middle].chunks(4) {
        let (digit, parity) = match_digit(group, layout.format == BarcodeFormat::Ean13)?;
        parity_bits = (parity_bits << 1) | u8::from(parity == Parity::G);
        digits.push(digit);
    }
    for group in widths[right..end_guard].chunks(4) {
        let (digit, parity) = match_digit(group, false)?;
        if parity != Parity::L {
            return None;
        }
        digits.push(digit);
    }

    if layout.format == BarcodeFormat::Ean13 {
        let first = FIRST_DIGIT_PARITY.iter().position(|&p| p == parity_bits)? as u8;
        digits.insert(0, first);
    }

    if !checksum_ok(&digits) {
        return None;
    }

    Some(digits.iter().map(|d| char::from(b'0' + d)).collect())
}

/// Every element of a guard pattern is one module wide
fn is_guard(widths: &[f32], module: f32) -> bool {
    widths
        .iter()
        .all(|&w| (w / module - 1.0).abs() <= MAX_GUARD_DEVIATION)
}

/// Best-fit a 4-element group against the digit tables
fn match_digit(group: &[f32], allow_g: bool) -> Option<(u8, Parity)> {
    let total: f32 = group.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let normalized: Vec<f32> = group.iter().map(|w| w * 7.0 / total).collect();

    let mut best: Option<(f32, u8, Parity)> = None;
    for (digit, pattern) in DIGIT_WIDTHS.iter().enumerate() {
        let mut candidates = vec![(deviation(&normalized, pattern.iter().copied()), Parity::L)];
        if allow_g {
            candidates.push((deviation(&normalized, pattern.iter().rev().copied()), Parity::G));
        }
        for (err, parity) in candidates {
            if best.map_or(true, |(best_err, _, _)| err < best_err) {
                best = Some((err, digit as u8, parity));
            }
        }
    }

    best.filter(|(err, _, _)| *err <= MAX_DIGIT_ERROR)
        .map(|(_, digit, parity)| (digit, parity))
}

fn deviation(normalized: &[f32], pattern: impl Iterator<Item = f32>) -> f32 {
    normalized
        .iter()
        .zip(pattern)
        .map(|(a, b)| (a - b).abs())
        .sum()
}

/// Modulo-10 check with weights 3,1,3,... counted from the right
pub fn checksum_ok(digits: &[u8]) -> bool {
    let Some((&check, data)) = digits.split_last() else {
        return false;
    };
    let sum: u32 = data
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| d as u32 * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    (10 - sum % 10) % 10 == check as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    const L_CODES: [&str; 10] = [
        "0001101", "0011001", "0010011", "0111101", "0100011", "0110001", "0101111", "0111011",
        "0110111", "0001011",
    ];

    fn r_code(digit: usize) -> String {
        L_CODES[digit]
            .chars()
            .map(|c| if c == '0' { '1' } else { '0' })
            .collect()
    }

    fn g_code(digit: usize) -> String {
        r_code(digit).chars().rev().collect()
    }

    fn digits_of(code: &str) -> Vec<usize> {
        code.chars().map(|c| c.to_digit(10).unwrap() as usize).collect()
    }

    /// Module string for an EAN-13 code
    fn ean13_modules(code: &str) -> String {
        let digits = digits_of(code);
        let parity = FIRST_DIGIT_PARITY[digits[0]];
        let mut modules = String::from("101");
        for (i, &d) in digits[1..7].iter().enumerate() {
            let is_g = parity & (1 << (5 - i)) != 0;
            modules += &if is_g { g_code(d) } else { L_CODES[d].to_string() };
        }
        modules += "01010";
        for &d in &digits[7..] {
            modules += &r_code(d);
        }
        modules += "101";
        modules
    }

    fn ean8_modules(code: &str) -> String {
        let digits = digits_of(code);
        let mut modules = String::from("101");
        for &d in &digits[..4] {
            modules += L_CODES[d];
        }
        modules += "01010";
        for &d in &digits[4..] {
            modules += &r_code(d);
        }
        modules += "101";
        modules
    }

    /// Render modules as a grayscale frame with a quiet zone
    fn render(modules: &str, module_px: u32, offset_px: u32) -> GrayImage {
        let quiet = 10 * module_px;
        let width = offset_px + quiet * 2 + modules.len() as u32 * module_px;
        let mut frame = GrayImage::from_pixel(width, 60, Luma([235]));
        for (i, bit) in modules.chars().enumerate() {
            if bit == '1' {
                let x0 = offset_px + quiet + i as u32 * module_px;
                for x in x0..x0 + module_px {
                    for y in 0..60 {
                        frame.put_pixel(x, y, Luma([20]));
                    }
                }
            }
        }
        frame
    }

    fn recognizer() -> EanRecognizer {
        EanRecognizer::new(
            vec![BarcodeFormat::Ean13, BarcodeFormat::Ean8, BarcodeFormat::UpcA],
            5,
        )
    }

    #[test]
    fn test_checksum() {
        assert!(checksum_ok(&[3, 0, 1, 7, 6, 2, 0, 4, 2, 2, 0, 0, 3]));
        assert!(!checksum_ok(&[3, 0, 1, 7, 6, 2, 0, 4, 2, 2, 0, 0, 4]));
        assert!(checksum_ok(&[9, 6, 3, 8, 5, 0, 7, 4]));
        assert!(!checksum_ok(&[]));
    }

    #[test]
    fn test_modules_have_expected_length() {
        assert_eq!(ean13_modules("3017620422003").len(), 95);
        assert_eq!(ean8_modules("96385074").len(), 67);
    }

    #[test]
    fn test_decodes_ean13() {
        let frame = render(&ean13_modules("3017620422003"), 3, 0);
        let detected = recognizer().detect(&frame);

        assert_eq!(
            detected,
            vec![DetectedBarcode {
                raw_value: "3017620422003".to_string(),
                format: BarcodeFormat::Ean13,
            }]
        );
    }

    #[test]
    fn test_decodes_upside_down() {
        let frame = render(&ean13_modules("5449000000996"), 2, 17);
        let flipped = image::imageops::rotate180(&frame);

        let detected = recognizer().detect(&flipped);
        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].raw_value, "5449000000996");
    }

    #[test]
    fn test_decodes_ean8() {
        let frame = render(&ean8_modules("96385074"), 3, 5);
        let detected = recognizer().detect(&frame);

        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].raw_value, "96385074");
        assert_eq!(detected[0].format, BarcodeFormat::Ean8);
    }

    #[test]
    fn test_leading_zero_reports_upc_a() {
        let frame = render(&ean13_modules("0012345678905"), 3, 0);

        let detected = recognizer().detect(&frame);
        assert_eq!(detected[0].raw_value, "012345678905");
        assert_eq!(detected[0].format, BarcodeFormat::UpcA);

        let ean_only = EanRecognizer::new(vec![BarcodeFormat::Ean13], 5);
        assert_eq!(ean_only.detect(&frame)[0].raw_value, "0012345678905");
    }

    #[test]
    fn test_unrequested_format_is_ignored() {
        let frame = render(&ean8_modules("96385074"), 3, 0);
        let ean13_only = EanRecognizer::new(vec![BarcodeFormat::Ean13], 5);
        assert!(ean13_only.detect(&frame).is_empty());
    }

    #[test]
    fn test_blank_frame_detects_nothing() {
        let frame = GrayImage::from_pixel(400, 100, Luma([128]));
        assert!(recognizer().detect(&frame).is_empty());
    }

    #[test]
    fn test_bad_checksum_is_rejected() {
        // Valid symbol structure, wrong check digit
        let frame = render(&ean13_modules("3017620422004"), 3, 0);
        assert!(recognizer().detect(&frame).is_empty());
    }
}
