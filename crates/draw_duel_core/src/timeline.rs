//! crates/draw_duel_core/src/timeline.rs
//!
//! The Timeline Codec: shape validation and normalization of submitted
//! timelines, and tolerant replay of stored ones.
//!
//! The codec validates event *shape*, not stroke *balance*: a structurally
//! valid but unbalanced timeline (unterminated path, stray `End`) is accepted
//! as-is, and [`replay`] absorbs the imbalance instead. Stroke-balance repair
//! is explicitly out of scope.

use crate::domain::{StrokeEvent, Timeline};
use crate::ports::{Brush, Renderer};

/// Rejection reasons for a submitted timeline.
///
/// Unknown event types, modes, and brush styles never reach this stage; they
/// are rejected during deserialization by the closed [`StrokeEvent`] enum.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum TimelineError {
    #[error("timeline must not be empty")]
    Empty,
    #[error("event {index}: coordinates ({x}, {y}) must be finite and non-negative")]
    BadCoordinates { index: usize, x: f64, y: f64 },
    #[error("event {index}: brush size {size} must be a positive finite number")]
    BadSize { index: usize, size: f64 },
    #[error("event {index}: {color:?} is not a #rgb or #rrggbb color")]
    BadColor { index: usize, color: String },
}

impl Timeline {
    /// Validates the shape of every event: non-empty sequence, finite
    /// non-negative coordinates, positive brush size, well-formed color.
    pub fn validate(&self) -> Result<(), TimelineError> {
        if self.is_empty() {
            return Err(TimelineError::Empty);
        }
        for (index, event) in self.events().iter().enumerate() {
            match event {
                StrokeEvent::Start {
                    x, y, color, size, ..
                } => {
                    check_point(index, *x, *y)?;
                    if !size.is_finite() || *size <= 0.0 {
                        return Err(TimelineError::BadSize { index, size: *size });
                    }
                    if !is_valid_color(color) {
                        return Err(TimelineError::BadColor {
                            index,
                            color: color.clone(),
                        });
                    }
                }
                StrokeEvent::Draw { x, y } => check_point(index, *x, *y)?,
                StrokeEvent::End => {}
            }
        }
        Ok(())
    }

    /// Produces the canonical stored representation: colors trimmed and
    /// lowercased. Field order and naming are already stable because the
    /// events are typed; this only canonicalizes the free-form color string.
    pub fn into_normalized(mut self) -> Timeline {
        for event in &mut self.0 {
            if let StrokeEvent::Start { color, .. } = event {
                *color = color.trim().to_lowercase();
            }
        }
        self
    }
}

fn check_point(index: usize, x: f64, y: f64) -> Result<(), TimelineError> {
    if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
        return Err(TimelineError::BadCoordinates { index, x, y });
    }
    Ok(())
}

fn is_valid_color(color: &str) -> bool {
    let Some(hex) = color.trim().strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Replays a timeline through a renderer, tolerantly.
///
/// - end-of-sequence closes any open path (implicit `End`);
/// - a `Start` while a path is open closes the previous path first;
/// - a stray `End` with no open path is a no-op;
/// - a `Draw` with no open path is ignored.
///
/// Replay has no effect on stored state, and stepping through every event
/// produces the same final raster as skipping to the end.
pub fn replay<R: Renderer>(timeline: &Timeline, renderer: &mut R) {
    let mut path_open = false;
    for event in timeline.events() {
        match event {
            StrokeEvent::Start {
                x,
                y,
                color,
                size,
                mode,
                brush_style,
            } => {
                if path_open {
                    renderer.end_path();
                }
                renderer.begin_path(
                    *x,
                    *y,
                    Brush {
                        color,
                        size: *size,
                        mode: *mode,
                        style: *brush_style,
                    },
                );
                path_open = true;
            }
            StrokeEvent::Draw { x, y } => {
                if path_open {
                    renderer.line_to(*x, *y);
                }
            }
            StrokeEvent::End => {
                if path_open {
                    renderer.end_path();
                    path_open = false;
                }
            }
        }
    }
    if path_open {
        renderer.end_path();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BrushMode, BrushStyle};

    fn start(color: &str, size: f64) -> StrokeEvent {
        StrokeEvent::Start {
            x: 0.0,
            y: 0.0,
            color: color.to_string(),
            size,
            mode: BrushMode::Draw,
            brush_style: BrushStyle::Round,
        }
    }

    fn draw(x: f64, y: f64) -> StrokeEvent {
        StrokeEvent::Draw { x, y }
    }

    /// Records renderer calls as strings for assertion.
    #[derive(Default)]
    struct Recording {
        ops: Vec<String>,
    }

    impl Renderer for Recording {
        fn begin_path(&mut self, x: f64, y: f64, brush: Brush<'_>) {
            self.ops.push(format!("begin({x},{y},{})", brush.color));
        }

        fn line_to(&mut self, x: f64, y: f64) {
            self.ops.push(format!("line({x},{y})"));
        }

        fn end_path(&mut self) {
            self.ops.push("end".to_string());
        }
    }

    #[test]
    fn valid_timeline_passes() {
        let timeline = Timeline(vec![start("#000", 4.0), draw(5.0, 5.0), StrokeEvent::End]);
        assert_eq!(timeline.validate(), Ok(()));
    }

    #[test]
    fn empty_timeline_is_rejected() {
        assert_eq!(Timeline(vec![]).validate(), Err(TimelineError::Empty));
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let timeline = Timeline(vec![start("#000", 4.0), draw(f64::NAN, 1.0)]);
        assert!(matches!(
            timeline.validate(),
            Err(TimelineError::BadCoordinates { index: 1, .. })
        ));

        let timeline = Timeline(vec![start("#000", 4.0), draw(1.0, f64::INFINITY)]);
        assert!(timeline.validate().is_err());
    }

    #[test]
    fn negative_coordinates_are_rejected() {
        let timeline = Timeline(vec![start("#000", 4.0), draw(-1.0, 0.0)]);
        assert!(matches!(
            timeline.validate(),
            Err(TimelineError::BadCoordinates { index: 1, .. })
        ));
    }

    #[test]
    fn non_positive_size_is_rejected() {
        let timeline = Timeline(vec![start("#000", 0.0)]);
        assert!(matches!(
            timeline.validate(),
            Err(TimelineError::BadSize { index: 0, .. })
        ));
        let timeline = Timeline(vec![start("#000", -3.0)]);
        assert!(timeline.validate().is_err());
    }

    #[test]
    fn malformed_color_is_rejected() {
        for color in ["", "000", "#00", "#00000g", "#1234"] {
            let timeline = Timeline(vec![start(color, 4.0)]);
            assert!(
                matches!(timeline.validate(), Err(TimelineError::BadColor { .. })),
                "color {color:?} should be rejected"
            );
        }
    }

    #[test]
    fn unbalanced_timeline_is_accepted() {
        // Unterminated path: shape is fine, balance is the replayer's problem.
        let timeline = Timeline(vec![start("#000", 4.0), draw(1.0, 1.0)]);
        assert_eq!(timeline.validate(), Ok(()));

        // Stray End and Draw-before-Start are also accepted as-is.
        let timeline = Timeline(vec![StrokeEvent::End, draw(1.0, 1.0)]);
        assert_eq!(timeline.validate(), Ok(()));
    }

    #[test]
    fn normalization_canonicalizes_colors() {
        let timeline = Timeline(vec![start(" #A0B1C2 ", 4.0)]).into_normalized();
        match &timeline.events()[0] {
            StrokeEvent::Start { color, .. } => assert_eq!(color, "#a0b1c2"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn replay_closes_unterminated_path() {
        let timeline = Timeline(vec![start("#000", 4.0), draw(5.0, 5.0)]);
        let mut renderer = Recording::default();
        replay(&timeline, &mut renderer);
        assert_eq!(renderer.ops, vec!["begin(0,0,#000)", "line(5,5)", "end"]);
    }

    #[test]
    fn replay_ignores_stray_end() {
        let timeline = Timeline(vec![StrokeEvent::End, start("#000", 4.0), StrokeEvent::End]);
        let mut renderer = Recording::default();
        replay(&timeline, &mut renderer);
        assert_eq!(renderer.ops, vec!["begin(0,0,#000)", "end"]);
    }

    #[test]
    fn replay_ignores_draw_without_open_path() {
        let timeline = Timeline(vec![draw(1.0, 2.0), start("#000", 4.0), draw(3.0, 4.0)]);
        let mut renderer = Recording::default();
        replay(&timeline, &mut renderer);
        assert_eq!(renderer.ops, vec!["begin(0,0,#000)", "line(3,4)", "end"]);
    }

    #[test]
    fn replay_closes_previous_path_on_restart() {
        let timeline = Timeline(vec![start("#000", 4.0), draw(1.0, 1.0), start("#fff", 2.0)]);
        let mut renderer = Recording::default();
        replay(&timeline, &mut renderer);
        assert_eq!(
            renderer.ops,
            vec!["begin(0,0,#000)", "line(1,1)", "end", "begin(0,0,#fff)", "end"]
        );
    }
}
