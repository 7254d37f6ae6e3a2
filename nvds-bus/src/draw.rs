//! Overlay draw commands and their grouping.
//!
//! The overlay stage executes commands in groups; each group holds at most
//! [`GROUP_CAPACITY`] primitives of every kind.

use crate::hook::Point;

pub const GROUP_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(1.0, 1.0, 1.0, 1.0);
    pub const GRAY: Rgba = Rgba::new(0.7, 0.7, 0.7, 1.0);

    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f64) -> Self {
        Self { a, ..self }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RectCmd {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub border_width: u32,
    pub border_color: Rgba,
    /// `None` leaves the box unfilled.
    pub fill: Option<Rgba>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelCmd {
    pub text: String,
    pub x: u32,
    pub y: u32,
    pub font_size: u32,
    pub font_color: Rgba,
    pub background: Rgba,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircleCmd {
    pub xc: u32,
    pub yc: u32,
    pub radius: u32,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineCmd {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub width: u32,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawGroup {
    pub rects: Vec<RectCmd>,
    pub labels: Vec<LabelCmd>,
    pub circles: Vec<CircleCmd>,
    pub lines: Vec<LineCmd>,
}

impl DrawGroup {
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
            && self.labels.is_empty()
            && self.circles.is_empty()
            && self.lines.is_empty()
    }

    fn has_room_for_object(&self) -> bool {
        self.rects.len() < GROUP_CAPACITY && self.labels.len() < GROUP_CAPACITY
    }
}

/// Packs per-object boxes and labels, opening a new group whenever the
/// current one is full.
#[derive(Debug, Default)]
pub struct GroupPacker {
    done: Vec<DrawGroup>,
    current: DrawGroup,
}

impl GroupPacker {
    pub fn push_object(&mut self, rect: RectCmd, label: LabelCmd) {
        if !self.current.has_room_for_object() {
            self.done.push(std::mem::take(&mut self.current));
        }
        self.current.rects.push(rect);
        self.current.labels.push(label);
    }

    pub fn finish(mut self) -> Vec<DrawGroup> {
        if !self.current.is_empty() {
            self.done.push(self.current);
        }
        self.done
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailStyle {
    pub radius: u32,
    pub line_width: u32,
}

impl Default for TrailStyle {
    fn default() -> Self {
        Self {
            radius: 3,
            line_width: 2,
        }
    }
}

/// Renders a trail as a circle per point joined by line segments, oldest
/// point faintest. A new group starts every [`GROUP_CAPACITY`] points.
pub fn trail_groups(points: &[Point], color: Rgba, style: TrailStyle) -> Vec<DrawGroup> {
    points
        .chunks(GROUP_CAPACITY)
        .enumerate()
        .map(|(chunk, chunk_points)| {
            let base = chunk * GROUP_CAPACITY;
            let mut group = DrawGroup::default();
            for (offset, point) in chunk_points.iter().enumerate() {
                let i = base + offset;
                let color = color.with_alpha(fade(i, points.len()));
                group.circles.push(CircleCmd {
                    xc: px(point.x),
                    yc: px(point.y),
                    radius: style.radius,
                    color,
                });
                if let Some(next) = points.get(i + 1) {
                    group.lines.push(LineCmd {
                        x1: px(point.x),
                        y1: px(point.y),
                        x2: px(next.x),
                        y2: px(next.y),
                        width: style.line_width,
                        color,
                    });
                }
            }
            group
        })
        .collect()
}

fn fade(i: usize, len: usize) -> f64 {
    if len <= 1 {
        return 1.0;
    }
    0.3 + 0.7 * i as f64 / (len - 1) as f64
}

/// Pixel coordinate, negative values clamp to zero.
pub fn px(v: f32) -> u32 {
    if v.is_nan() || v <= 0.0 {
        0
    } else {
        v.round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<Point> {
        (0..n).map(|i| Point::new(i as f32 * 2.0, 100.0)).collect()
    }

    #[test]
    fn test_trail_of_33_points_makes_three_groups() {
        let groups = trail_groups(&line(33), Rgba::WHITE, TrailStyle::default());
        let sizes: Vec<usize> = groups.iter().map(|g| g.circles.len()).collect();
        assert_eq!(sizes, vec![16, 16, 1]);
        let lines: Vec<usize> = groups.iter().map(|g| g.lines.len()).collect();
        assert_eq!(lines, vec![16, 16, 0]);
    }

    #[test]
    fn test_trail_groups_respect_capacity() {
        for n in 0..70 {
            let groups = trail_groups(&line(n), Rgba::WHITE, TrailStyle::default());
            assert_eq!(groups.len(), n.div_ceil(GROUP_CAPACITY));
            for g in &groups {
                assert!(g.circles.len() <= GROUP_CAPACITY);
                assert!(g.lines.len() <= GROUP_CAPACITY);
            }
        }
    }

    #[test]
    fn test_trail_fades_towards_oldest() {
        let groups = trail_groups(&line(5), Rgba::WHITE, TrailStyle::default());
        let circles = &groups[0].circles;
        assert!(circles[0].color.a < circles[4].color.a);
        assert!((circles[4].color.a - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_packer_flushes_full_groups() {
        let mut packer = GroupPacker::default();
        for i in 0..17 {
            packer.push_object(
                RectCmd {
                    left: i as f32,
                    top: 0.0,
                    width: 1.0,
                    height: 1.0,
                    border_width: 1,
                    border_color: Rgba::WHITE,
                    fill: None,
                },
                LabelCmd {
                    text: format!("{}", i),
                    x: 0,
                    y: 0,
                    font_size: 8,
                    font_color: Rgba::WHITE,
                    background: Rgba::GRAY,
                },
            );
        }
        let groups = packer.finish();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].rects.len(), 16);
        assert_eq!(groups[1].labels.len(), 1);
    }

    #[test]
    fn test_px_clamps_negative() {
        assert_eq!(px(-4.2), 0);
        assert_eq!(px(f32::NAN), 0);
        assert_eq!(px(10.6), 11);
    }
}
