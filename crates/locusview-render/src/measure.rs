use crate::geom::{Size, size};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_size: f64,
    pub font_weight: Option<String>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            font_weight: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
    pub line_count: usize,
}

/// Measures label text and tooltip bodies. Gene track assignment and every tooltip placement
/// depend on these sizes.
pub trait TextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics;

    /// Outer size of a tooltip box holding `html`.
    fn measure_tooltip(&self, html: &str) -> Size;
}

/// Character-count based measurement, stable across platforms.
#[derive(Debug, Clone, Default)]
pub struct DeterministicTextMeasurer {
    pub char_width_factor: f64,
    pub line_height_factor: f64,
    /// Padding added on each side of a tooltip body.
    pub tooltip_padding: f64,
}

impl DeterministicTextMeasurer {
    /// Splits markup into visible text lines: `<br>` variants break lines and other tags are
    /// dropped.
    pub fn visible_lines(text: &str) -> Vec<String> {
        let t = text
            .replace("<br/>", "\n")
            .replace("<br />", "\n")
            .replace("<br>", "\n");
        let mut plain = String::with_capacity(t.len());
        let mut in_tag = false;
        for ch in t.chars() {
            match ch {
                '<' => in_tag = true,
                '>' if in_tag => in_tag = false,
                _ if !in_tag => plain.push(ch),
                _ => {}
            }
        }
        plain.split('\n').map(|s| s.to_string()).collect()
    }
}

impl TextMeasurer for DeterministicTextMeasurer {
    fn measure(&self, text: &str, style: &TextStyle) -> TextMetrics {
        let char_width_factor = if self.char_width_factor == 0.0 {
            0.6
        } else {
            self.char_width_factor
        };
        let line_height_factor = if self.line_height_factor == 0.0 {
            1.2
        } else {
            self.line_height_factor
        };

        let lines = Self::visible_lines(text);
        let font_size = style.font_size.max(1.0);
        let max_chars = lines
            .iter()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);

        TextMetrics {
            width: max_chars as f64 * font_size * char_width_factor,
            height: lines.len() as f64 * font_size * line_height_factor,
            line_count: lines.len(),
        }
    }

    fn measure_tooltip(&self, html: &str) -> Size {
        let padding = if self.tooltip_padding == 0.0 {
            6.0
        } else {
            self.tooltip_padding
        };
        let metrics = self.measure(html, &TextStyle::default());
        size(metrics.width + 2.0 * padding, metrics.height + 2.0 * padding)
    }
}
