//! Freehand stroke capture.

use crate::error::{EditorError, EditorResult};
use kurbo::Point;
use ps_core::{Color, Stroke};
use serde::{Deserialize, Serialize};

/// Colour and width for new strokes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenStyle {
    pub color: Color,
    pub width: f64,
}

impl Default for PenStyle {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            width: 3.0,
        }
    }
}

/// Collects points between pen-down and pen-up.
#[derive(Debug, Clone)]
pub struct PenTool {
    drawing: bool,
    points: Vec<Point>,
    style: PenStyle,
    /// Points closer than this to the previous one are dropped.
    min_spacing: f64,
}

impl Default for PenTool {
    fn default() -> Self {
        Self::new(PenStyle::default(), 1.0)
    }
}

impl PenTool {
    pub fn new(style: PenStyle, min_spacing: f64) -> Self {
        Self {
            drawing: false,
            points: Vec::new(),
            style,
            min_spacing: min_spacing.max(0.0),
        }
    }

    pub fn style(&self) -> PenStyle {
        self.style
    }

    /// Applies to the next stroke; a stroke in progress keeps its style.
    pub fn set_style(&mut self, style: PenStyle) {
        self.style = style;
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// Points of the stroke in progress (empty when idle).
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Start a new stroke, discarding any unfinished one.
    pub fn begin(&mut self, p: Point) {
        self.drawing = true;
        self.points.clear();
        self.points.push(p);
    }

    /// Returns whether the point was kept.
    pub fn append(&mut self, p: Point) -> EditorResult<bool> {
        if !self.drawing {
            return Err(EditorError::NoActiveStroke);
        }
        if !p.is_finite() {
            return Ok(false);
        }
        if let Some(last) = self.points.last()
            && last.distance(p) < self.min_spacing
        {
            return Ok(false);
        }
        self.points.push(p);
        Ok(true)
    }

    /// Finish the stroke. A tap (fewer than two points) yields `None`.
    pub fn finish(&mut self) -> EditorResult<Option<Stroke>> {
        if !self.drawing {
            return Err(EditorError::NoActiveStroke);
        }
        self.drawing = false;
        let points = std::mem::take(&mut self.points);
        if points.len() < 2 {
            return Ok(None);
        }
        Ok(Some(Stroke::new(points, self.style.color, self.style.width)))
    }

    pub fn cancel(&mut self) {
        self.drawing = false;
        self.points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_points_are_dropped() {
        let mut pen = PenTool::new(PenStyle::default(), 2.0);
        pen.begin(Point::new(0.0, 0.0));
        assert_eq!(pen.append(Point::new(1.0, 0.0)), Ok(false));
        assert_eq!(pen.append(Point::new(3.0, 0.0)), Ok(true));
        let stroke = pen.finish().unwrap().unwrap();
        assert_eq!(stroke.points, vec![Point::new(0.0, 0.0), Point::new(3.0, 0.0)]);
        assert!(!pen.is_drawing());
    }

    #[test]
    fn tap_makes_no_stroke() {
        let mut pen = PenTool::default();
        pen.begin(Point::new(5.0, 5.0));
        assert_eq!(pen.finish(), Ok(None));
    }

    #[test]
    fn append_without_begin_fails() {
        let mut pen = PenTool::default();
        assert_eq!(pen.append(Point::ORIGIN), Err(EditorError::NoActiveStroke));
        assert_eq!(pen.finish(), Err(EditorError::NoActiveStroke));
    }

    #[test]
    fn stroke_uses_style_at_begin() {
        let mut pen = PenTool::default();
        let red = PenStyle {
            color: Color::rgba(1.0, 0.0, 0.0, 1.0),
            width: 8.0,
        };
        pen.set_style(red);
        pen.begin(Point::new(0.0, 0.0));
        pen.append(Point::new(10.0, 0.0)).unwrap();
        let stroke = pen.finish().unwrap().unwrap();
        assert_eq!(stroke.color, red.color);
        assert_eq!(stroke.width, 8.0);
    }
}
