use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::chart::{NatalChart, ZodiacSign};

pub const DEFAULT_CHART_SIZE: u32 = 400;
const RIM_MARGIN: f64 = 30.0;
const RING_WIDTH: f64 = 80.0;
const BODY_OFFSET: f64 = 20.0;
const SIGN_INSET: f64 = 15.0;
const MAX_ASPECT_LINES: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartTheme {
    pub accent: String,
    pub foreground: String,
    pub background: String,
}

impl Default for ChartTheme {
    fn default() -> Self {
        Self {
            accent: "#FF6F1F".to_string(),
            foreground: "#FFFFFF".to_string(),
            background: "#000000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Wheel {
    cx: f64,
    cy: f64,
    outer: f64,
    inner: f64,
}

impl Wheel {
    fn new(width: u32, height: u32) -> Self {
        let outer = (f64::from(width) / 2.0 - RIM_MARGIN).max(0.0);
        Self {
            cx: f64::from(width) / 2.0,
            cy: f64::from(height) / 2.0,
            outer,
            inner: (outer - RING_WIDTH).max(0.0),
        }
    }

    /// Angle in degrees measured from +x, clockwise in screen space.
    fn point(&self, angle_degrees: f64, radius: f64) -> (f64, f64) {
        let radians = angle_degrees * PI / 180.0;
        (
            self.cx + radians.cos() * radius,
            self.cy + radians.sin() * radius,
        )
    }

    /// Ecliptic 0° sits at the top of the wheel.
    fn body_point(&self, ecliptic_degree: f64) -> (f64, f64) {
        self.point(ecliptic_degree - 90.0, self.inner + BODY_OFFSET)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChartRenderer {
    theme: ChartTheme,
}

impl ChartRenderer {
    pub fn new(theme: ChartTheme) -> Self {
        Self { theme }
    }

    /// Self-contained SVG: only inline defs, no external references.
    pub fn render(&self, chart: &NatalChart, width: u32, height: u32) -> String {
        let wheel = Wheel::new(width, height);
        let accent = escape_xml(&self.theme.accent);
        let foreground = escape_xml(&self.theme.foreground);
        let background = escape_xml(&self.theme.background);

        let mut svg = String::with_capacity(8 * 1024);
        svg.push_str(&format!(
            "<svg width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\" xmlns=\"http://www.w3.org/2000/svg\">"
        ));
        svg.push_str(&format!(
            "<defs><radialGradient id=\"chartGradient\" cx=\"50%\" cy=\"50%\" r=\"50%\">\
<stop offset=\"0%\" stop-color=\"{background}\" stop-opacity=\"1\"/>\
<stop offset=\"100%\" stop-color=\"{accent}\" stop-opacity=\"0.3\"/>\
</radialGradient>\
<filter id=\"glow\"><feGaussianBlur stdDeviation=\"3\" result=\"coloredBlur\"/>\
<feMerge><feMergeNode in=\"coloredBlur\"/><feMergeNode in=\"SourceGraphic\"/></feMerge></filter></defs>"
        ));

        svg.push_str(&format!(
            "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\" fill=\"url(#chartGradient)\" stroke=\"{accent}\" stroke-width=\"2\"/>",
            wheel.cx, wheel.cy, wheel.outer
        ));
        svg.push_str(&format!(
            "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\" fill=\"none\" stroke=\"{foreground}\" stroke-width=\"1\" opacity=\"0.5\"/>",
            wheel.cx, wheel.cy, wheel.inner
        ));

        for index in 0..12 {
            let angle = f64::from(index) * 30.0;
            let (x1, y1) = wheel.point(angle, wheel.inner);
            let (x2, y2) = wheel.point(angle, wheel.outer);
            svg.push_str(&line(x1, y1, x2, y2, &foreground, 1.0, 0.6));
        }

        for (index, sign) in ZodiacSign::ALL.iter().enumerate() {
            let angle = index as f64 * 30.0 + 15.0;
            let (x, y) = wheel.point(angle, (wheel.outer - SIGN_INSET).max(0.0));
            svg.push_str(&text(x, y, "middle", &accent, 16, sign.glyph()));
        }

        for position in &chart.bodies {
            let (x, y) = wheel.body_point(position.ecliptic_degree);
            svg.push_str(&format!(
                "<circle cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"8\" fill=\"{accent}\" stroke=\"{foreground}\" stroke-width=\"2\" filter=\"url(#glow)\"/>"
            ));
            svg.push_str(&text(x, y, "middle", &foreground, 12, position.body.glyph()));
        }

        // Aspects whose bodies are absent from the chart are skipped.
        for aspect in chart.aspects.iter().take(MAX_ASPECT_LINES) {
            let (Some(first), Some(second)) = (chart.body(aspect.first), chart.body(aspect.second))
            else {
                continue;
            };
            let (x1, y1) = wheel.body_point(first.ecliptic_degree);
            let (x2, y2) = wheel.body_point(second.ecliptic_degree);
            svg.push_str(&line(x1, y1, x2, y2, &accent, 1.0, 0.6));
        }

        svg.push_str(&format!(
            "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"4\" fill=\"{foreground}\" filter=\"url(#glow)\"/>",
            wheel.cx, wheel.cy
        ));

        svg.push_str(&line(
            wheel.cx + wheel.inner,
            wheel.cy,
            wheel.cx + wheel.outer,
            wheel.cy,
            &accent,
            3.0,
            1.0,
        ));
        svg.push_str(&text(
            wheel.cx + wheel.outer + 10.0,
            wheel.cy,
            "start",
            &accent,
            12,
            "ASC",
        ));

        svg.push_str("</svg>");
        svg
    }
}

pub fn render_chart_svg(chart: &NatalChart, width: u32, height: u32) -> String {
    ChartRenderer::default().render(chart, width, height)
}

fn line(x1: f64, y1: f64, x2: f64, y2: f64, stroke: &str, width: f64, opacity: f64) -> String {
    format!(
        "<line x1=\"{x1:.2}\" y1=\"{y1:.2}\" x2=\"{x2:.2}\" y2=\"{y2:.2}\" stroke=\"{stroke}\" stroke-width=\"{width}\" opacity=\"{opacity}\"/>"
    )
}

fn text(x: f64, y: f64, anchor: &str, fill: &str, size: u32, content: &str) -> String {
    format!(
        "<text x=\"{x:.2}\" y=\"{y:.2}\" text-anchor=\"{anchor}\" dominant-baseline=\"middle\" fill=\"{fill}\" font-size=\"{size}\" font-weight=\"bold\">{}</text>",
        escape_xml(content)
    )
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::chart::{CelestialBody, ChartGenerator};
    use crate::models::BirthParameters;

    fn sample_chart(seed: u64) -> NatalChart {
        let birth = BirthParameters {
            year: 1990,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            latitude: 0.0,
            longitude: 0.0,
        };
        ChartGenerator::default().generate(&birth, &mut ChaCha8Rng::seed_from_u64(seed))
    }

    fn count(svg: &str, needle: &str) -> usize {
        svg.matches(needle).count()
    }

    #[test]
    fn output_parses_as_xml_for_many_charts_and_sizes() {
        for seed in 0..20 {
            let chart = sample_chart(seed);
            for (width, height) in [(400, 400), (600, 300), (10, 10), (0, 0)] {
                let svg = render_chart_svg(&chart, width, height);
                let document = roxmltree::Document::parse(&svg).expect("well-formed svg");
                assert_eq!(document.root_element().tag_name().name(), "svg");
            }
        }
    }

    #[test]
    fn never_references_external_resources() {
        let svg = render_chart_svg(&sample_chart(1), 400, 400);
        assert!(!svg.contains("href"));
        for (index, _) in svg.match_indices("url(") {
            assert_eq!(&svg[index + 4..index + 5], "#");
        }
    }

    #[test]
    fn draws_dividers_signs_bodies_and_three_aspects() {
        let svg = render_chart_svg(&sample_chart(2), 400, 400);
        // 12 dividers + 3 aspects + ASC marker
        assert_eq!(count(&svg, "<line "), 16);
        // 12 signs + 10 bodies + ASC label
        assert_eq!(count(&svg, "<text "), 23);
        assert!(svg.contains(ZodiacSign::Aries.glyph()));
        assert!(svg.contains(CelestialBody::Pluto.glyph()));
    }

    #[test]
    fn zero_degree_body_renders_at_the_top() {
        let mut chart = sample_chart(3);
        chart.bodies.truncate(1);
        chart.bodies[0].ecliptic_degree = 0.0;
        let svg = render_chart_svg(&chart, 400, 400);
        // outer 170, inner 90, body radius 110 -> (200, 90)
        assert!(svg.contains("<circle cx=\"200.00\" cy=\"90.00\" r=\"8\""));
    }

    #[test]
    fn aspects_with_missing_bodies_are_omitted() {
        let mut chart = sample_chart(4);
        chart.bodies.retain(|position| position.body != CelestialBody::Moon);
        let svg = render_chart_svg(&chart, 400, 400);
        assert_eq!(count(&svg, "<line "), 12 + 2 + 1);
        assert!(roxmltree::Document::parse(&svg).is_ok());
    }

    #[test]
    fn theme_values_are_escaped() {
        let renderer = ChartRenderer::new(ChartTheme {
            accent: "\"><script>".to_string(),
            ..ChartTheme::default()
        });
        let svg = renderer.render(&sample_chart(5), 400, 400);
        assert!(!svg.contains("<script>"));
        assert!(roxmltree::Document::parse(&svg).is_ok());
    }
}
