//! Viewport gating with hysteresis.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use viewer_core::config::ViewportConfig;
use viewer_core::InstanceId;

/// Axis-aligned rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Grow the rectangle by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Rect {
        Rect {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2.0 * margin,
            height: self.height + 2.0 * margin,
        }
    }

    /// Overlap with `other`, if any.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

/// One observation delivered by the intersection primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionEntry {
    pub id: InstanceId,
    /// Visible fraction of the element, 0.0 to 1.0.
    pub ratio: f64,
    /// Whether the element touches the margin-expanded viewport.
    pub is_intersecting: bool,
}

impl IntersectionEntry {
    pub fn new(id: impl Into<InstanceId>, ratio: f64, is_intersecting: bool) -> Self {
        Self {
            id: id.into(),
            ratio,
            is_intersecting,
        }
    }
}

/// Visibility change emitted by the gate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewportEvent {
    Enter(InstanceId),
    Exit(InstanceId),
}

impl ViewportEvent {
    pub fn id(&self) -> &InstanceId {
        match self {
            ViewportEvent::Enter(id) | ViewportEvent::Exit(id) => id,
        }
    }
}

/// The host's intersection-observation primitive.
///
/// The gate registers and unregisters elements through it; observations come
/// back through [`ViewportGate::process`].
pub trait IntersectionPrimitive: Send + Sync {
    fn observe(&self, id: &InstanceId);
    fn unobserve(&self, id: &InstanceId);
}

/// Turns raw intersection observations into enter/exit events.
///
/// An element enters once its visible fraction reaches the threshold and
/// exits only when it stops intersecting the margin-expanded viewport.
/// Fractions in between keep the previous state.
pub struct ViewportGate {
    threshold: f64,
    root_margin_px: f64,
    primitive: Option<Arc<dyn IntersectionPrimitive>>,
    visible: HashMap<InstanceId, bool>,
}

impl ViewportGate {
    /// Create a gate from viewport settings.
    pub fn new(config: &ViewportConfig) -> Self {
        Self {
            threshold: config.threshold,
            root_margin_px: config.root_margin_px,
            primitive: None,
            visible: HashMap::new(),
        }
    }

    /// Forward observe/unobserve calls to a host primitive.
    pub fn with_primitive(mut self, primitive: Arc<dyn IntersectionPrimitive>) -> Self {
        self.primitive = Some(primitive);
        self
    }

    pub fn set_primitive(&mut self, primitive: Arc<dyn IntersectionPrimitive>) {
        self.primitive = Some(primitive);
    }

    /// Start watching an element. It begins outside the viewport.
    pub fn observe(&mut self, id: &InstanceId) {
        if self.visible.insert(id.clone(), false).is_none() {
            if let Some(primitive) = &self.primitive {
                primitive.observe(id);
            }
        }
    }

    /// Stop watching an element.
    pub fn unobserve(&mut self, id: &InstanceId) {
        if self.visible.remove(id).is_some() {
            if let Some(primitive) = &self.primitive {
                primitive.unobserve(id);
            }
        }
    }

    pub fn is_observed(&self, id: &InstanceId) -> bool {
        self.visible.contains_key(id)
    }

    pub fn is_visible(&self, id: &InstanceId) -> bool {
        self.visible.get(id).copied().unwrap_or(false)
    }

    /// Apply a batch of observations, in order.
    ///
    /// Entries for elements that are not observed are ignored.
    pub fn process(&mut self, entries: &[IntersectionEntry]) -> Vec<ViewportEvent> {
        let mut events = Vec::new();

        for entry in entries {
            let Some(visible) = self.visible.get_mut(&entry.id) else {
                continue;
            };

            if !*visible && entry.is_intersecting && entry.ratio >= self.threshold {
                *visible = true;
                events.push(ViewportEvent::Enter(entry.id.clone()));
            } else if *visible && !entry.is_intersecting {
                *visible = false;
                events.push(ViewportEvent::Exit(entry.id.clone()));
            }
        }

        events
    }

    /// Compute an observation from element and viewport geometry.
    ///
    /// The ratio is measured against the viewport grown by the root margin.
    /// Empty elements never intersect.
    pub fn measure(&self, id: &InstanceId, element: Rect, viewport: Rect) -> IntersectionEntry {
        let root = viewport.expand(self.root_margin_px);
        let area = element.area();
        let overlap = element.intersection(&root);

        let (ratio, is_intersecting) = match overlap {
            Some(overlap) if area > 0.0 => ((overlap.area() / area).min(1.0), true),
            _ => (0.0, false),
        };

        IntersectionEntry {
            id: id.clone(),
            ratio,
            is_intersecting,
        }
    }

    /// Measure and process a set of element rectangles in one step.
    pub fn process_geometry(&mut self, viewport: Rect, elements: &[(InstanceId, Rect)]) -> Vec<ViewportEvent> {
        let entries: Vec<IntersectionEntry> = elements
            .iter()
            .map(|(id, rect)| self.measure(id, *rect, viewport))
            .collect();
        self.process(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn gate() -> ViewportGate {
        ViewportGate::new(&ViewportConfig::default())
    }

    fn id(s: &str) -> InstanceId {
        InstanceId::new(s)
    }

    #[test]
    fn test_enter_at_threshold() {
        let mut gate = gate();
        gate.observe(&id("rings#0"));

        assert!(gate.process(&[IntersectionEntry::new("rings#0", 0.05, true)]).is_empty());
        assert_eq!(
            gate.process(&[IntersectionEntry::new("rings#0", 0.1, true)]),
            vec![ViewportEvent::Enter(id("rings#0"))]
        );
        assert!(gate.is_visible(&id("rings#0")));
    }

    #[test]
    fn test_hysteresis_between_zero_and_threshold() {
        let mut gate = gate();
        gate.observe(&id("rings#0"));
        gate.process(&[IntersectionEntry::new("rings#0", 0.5, true)]);

        // Dropping below the threshold while still intersecting keeps it visible.
        assert!(gate.process(&[IntersectionEntry::new("rings#0", 0.02, true)]).is_empty());
        assert!(gate.is_visible(&id("rings#0")));

        assert_eq!(
            gate.process(&[IntersectionEntry::new("rings#0", 0.0, false)]),
            vec![ViewportEvent::Exit(id("rings#0"))]
        );
    }

    #[test]
    fn test_repeated_enter_emits_once() {
        let mut gate = gate();
        gate.observe(&id("rings#0"));
        let events = gate.process(&[
            IntersectionEntry::new("rings#0", 0.3, true),
            IntersectionEntry::new("rings#0", 0.9, true),
        ]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_unobserved_entries_ignored() {
        let mut gate = gate();
        assert!(gate.process(&[IntersectionEntry::new("rings#0", 1.0, true)]).is_empty());
    }

    #[test]
    fn test_measure_uses_root_margin() {
        let gate = gate();
        let viewport = Rect::new(0.0, 0.0, 1280.0, 800.0);

        // 150px below the fold: inside the 200px margin, fully "visible".
        let below = gate.measure(&id("a"), Rect::new(0.0, 950.0, 300.0, 40.0), viewport);
        assert!(below.is_intersecting);
        assert_eq!(below.ratio, 1.0);

        // Straddling the margin edge: half inside.
        let edge = gate.measure(&id("b"), Rect::new(0.0, 960.0, 300.0, 80.0), viewport);
        assert!((edge.ratio - 0.5).abs() < 1e-9);

        let far = gate.measure(&id("c"), Rect::new(0.0, 2000.0, 300.0, 300.0), viewport);
        assert!(!far.is_intersecting);
        assert_eq!(far.ratio, 0.0);
    }

    #[test]
    fn test_primitive_receives_observe_calls() {
        #[derive(Default)]
        struct Recorder(Mutex<Vec<String>>);

        impl IntersectionPrimitive for Recorder {
            fn observe(&self, id: &InstanceId) {
                self.0.lock().unwrap().push(format!("observe {}", id));
            }
            fn unobserve(&self, id: &InstanceId) {
                self.0.lock().unwrap().push(format!("unobserve {}", id));
            }
        }

        let recorder = Arc::new(Recorder::default());
        let mut gate = gate().with_primitive(recorder.clone());
        gate.observe(&id("rings#0"));
        gate.observe(&id("rings#0"));
        gate.unobserve(&id("rings#0"));
        gate.unobserve(&id("rings#0"));

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["observe rings#0".to_string(), "unobserve rings#0".to_string()]
        );
    }
}
