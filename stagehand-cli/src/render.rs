//! Colored terminal output for multiplexed process lines.

use std::collections::HashMap;
use std::sync::Mutex;

use colored::{Color, Colorize};

use stagehand_supervisor::LineSink;

const PALETTE: [Color; 6] = [
    Color::Cyan,
    Color::Magenta,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::BrightCyan,
];

/// Stdout sink that gives each process prefix a stable color, assigned in
/// first-seen order.
#[derive(Default)]
pub struct ColorSink {
    assigned: Mutex<HashMap<String, Color>>,
}

impl ColorSink {
    fn color_for(&self, prefix: &str) -> Color {
        let mut assigned = match self.assigned.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(color) = assigned.get(prefix) {
            return *color;
        }
        let color = PALETTE[assigned.len() % PALETTE.len()];
        assigned.insert(prefix.to_string(), color);
        color
    }
}

impl LineSink for ColorSink {
    fn write_line(&self, prefix: &str, line: &str) {
        let label = format!("{prefix:>12} |");
        println!("{} {line}", label.color(self.color_for(prefix)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_colors_are_stable_across_calls() {
        let sink = ColorSink::default();
        let first = sink.color_for("watcher");
        let second = sink.color_for("extensions");
        assert_eq!(first, sink.color_for("watcher"));
        assert_ne!(first, second);
    }
}
