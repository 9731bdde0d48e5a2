//! Detected-text report accumulated over one video

use serde::Serialize;

/// Per-frame text blocks in frame order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextReport {
    frames: Vec<String>,
}

impl TextReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the text of the next frame (may be empty)
    pub fn push(&mut self, text: String) {
        self.frames.push(text);
    }

    /// Text blocks, one per processed frame
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// Frames that contributed any text
    pub fn frames_with_text(&self) -> usize {
        self.frames.iter().filter(|t| !t.is_empty()).count()
    }

    /// All frame blocks joined with newlines
    pub fn text(&self) -> String {
        self.frames.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_frames_become_bare_line_breaks() {
        let mut report = TextReport::new();
        report.push("STOP".to_string());
        report.push(String::new());
        report.push("EXIT\nLEFT".to_string());

        assert_eq!(report.text(), "STOP\n\nEXIT\nLEFT");
        assert_eq!(report.frames().len(), 3);
        assert_eq!(report.frames_with_text(), 2);
    }

    #[test]
    fn test_serializes_frames_in_order() {
        let mut report = TextReport::new();
        report.push("a".to_string());
        report.push("b".to_string());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["frames"], serde_json::json!(["a", "b"]));
    }
}
