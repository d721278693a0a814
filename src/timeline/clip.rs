use crate::audio::track::AudioTrack;
use crate::effects::transitions::TransitionSpec;
use crate::foundation::error::{MontageError, MontageResult};
use crate::scene::element::Element;
use crate::timeline::expr::TimeConfig;

/// Scene length used when neither the scene nor its children pin one down.
pub const DEFAULT_SCENE_DURATION_SECS: f64 = 5.0;

/// Index of a node inside a [`ClipTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClipId(pub u32);

impl ClipId {
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Scene-only attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneProps {
    /// Transition on the edge to the next scene. Ignored on the last scene.
    pub transition: Option<TransitionSpec>,
    /// Scene-relative audio tracks.
    pub audio: Vec<AudioTrack>,
    /// Clear color for the scene's frames (straight RGBA8).
    pub background: Option<[u8; 4]>,
}

/// What a node is.
#[derive(Clone, Debug, PartialEq)]
pub enum ClipKind {
    /// The video itself. Owns the scenes.
    Root,
    /// One screen of the video.
    Scene(Box<SceneProps>),
    /// Anything placed inside a scene.
    Element(Element),
}

/// A node of the clip tree.
///
/// `parent`/`children` express ownership; `prev`/`next` are lookup links refreshed whenever the
/// parent's child list changes.
#[derive(Clone, Debug)]
pub struct ClipNode {
    /// Caller-provided identifier (scene ids name cache files).
    pub name: String,
    /// Node kind.
    pub kind: ClipKind,
    /// Raw time expressions.
    pub config: TimeConfig,
    parent: Option<ClipId>,
    children: Vec<ClipId>,
    prev: Option<ClipId>,
    next: Option<ClipId>,
}

/// Arena-backed video description tree with derived timing.
///
/// Time getters recompute from configuration and tree position on every call; nothing is
/// cached, so `set_config` is visible on the next read.
#[derive(Clone, Debug)]
pub struct ClipTree {
    nodes: Vec<ClipNode>,
    default_scene_duration: f64,
}

impl Default for ClipTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipTree {
    /// Empty tree holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![ClipNode {
                name: "root".to_owned(),
                kind: ClipKind::Root,
                config: TimeConfig::default(),
                parent: None,
                children: Vec::new(),
                prev: None,
                next: None,
            }],
            default_scene_duration: DEFAULT_SCENE_DURATION_SECS,
        }
    }

    /// Root id.
    pub fn root(&self) -> ClipId {
        ClipId(0)
    }

    /// Override the fallback scene duration.
    pub fn set_default_scene_duration(&mut self, secs: f64) {
        self.default_scene_duration = secs;
    }

    /// Append a scene after the existing ones.
    pub fn add_scene(
        &mut self,
        name: impl Into<String>,
        config: TimeConfig,
        props: SceneProps,
    ) -> ClipId {
        self.push_node(
            self.root(),
            name.into(),
            ClipKind::Scene(Box::new(props)),
            config,
        )
    }

    /// Append an element under a scene or a group.
    pub fn add_element(
        &mut self,
        parent: ClipId,
        name: impl Into<String>,
        config: TimeConfig,
        element: Element,
    ) -> MontageResult<ClipId> {
        let p = self.try_node(parent)?;
        let accepts = match &p.kind {
            ClipKind::Scene(_) => true,
            ClipKind::Element(e) => e.is_container(),
            ClipKind::Root => false,
        };
        if !accepts {
            return Err(MontageError::validation(format!(
                "clip '{}' cannot own elements",
                p.name
            )));
        }
        Ok(self.push_node(parent, name.into(), ClipKind::Element(element), config))
    }

    /// Detach `child` from `parent`. The arena slot stays allocated but unreachable.
    pub fn remove_child(&mut self, parent: ClipId, child: ClipId) -> MontageResult<()> {
        let pos = self
            .try_node(parent)?
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| MontageError::validation("clip is not a child of the given parent"))?;
        self.nodes[parent.idx()].children.remove(pos);
        let node = &mut self.nodes[child.idx()];
        node.parent = None;
        node.prev = None;
        node.next = None;
        self.relink(parent);
        Ok(())
    }

    fn push_node(
        &mut self,
        parent: ClipId,
        name: String,
        kind: ClipKind,
        config: TimeConfig,
    ) -> ClipId {
        let id = ClipId(self.nodes.len() as u32);
        self.nodes.push(ClipNode {
            name,
            kind,
            config,
            parent: Some(parent),
            children: Vec::new(),
            prev: None,
            next: None,
        });
        self.nodes[parent.idx()].children.push(id);
        self.relink(parent);
        id
    }

    fn relink(&mut self, parent: ClipId) {
        let children = self.nodes[parent.idx()].children.clone();
        for (i, &c) in children.iter().enumerate() {
            let node = &mut self.nodes[c.idx()];
            node.prev = i.checked_sub(1).map(|j| children[j]);
            node.next = children.get(i + 1).copied();
        }
    }

    fn try_node(&self, id: ClipId) -> MontageResult<&ClipNode> {
        self.nodes
            .get(id.idx())
            .ok_or_else(|| MontageError::validation(format!("unknown clip id {}", id.0)))
    }

    /// Borrow a node. Panics on ids not produced by this tree.
    pub fn node(&self, id: ClipId) -> &ClipNode {
        &self.nodes[id.idx()]
    }

    /// Replace a node's time configuration.
    pub fn set_config(&mut self, id: ClipId, config: TimeConfig) {
        self.nodes[id.idx()].config = config;
    }

    /// Mutable access to a node's time configuration.
    pub fn config_mut(&mut self, id: ClipId) -> &mut TimeConfig {
        &mut self.nodes[id.idx()].config
    }

    /// Owning parent.
    pub fn parent(&self, id: ClipId) -> Option<ClipId> {
        self.node(id).parent
    }

    /// Ordered children.
    pub fn children(&self, id: ClipId) -> &[ClipId] {
        &self.node(id).children
    }

    /// Previous sibling.
    pub fn prev_sibling(&self, id: ClipId) -> Option<ClipId> {
        self.node(id).prev
    }

    /// Next sibling.
    pub fn next_sibling(&self, id: ClipId) -> Option<ClipId> {
        self.node(id).next
    }

    /// Scenes in playback order.
    pub fn scenes(&self) -> &[ClipId] {
        self.children(self.root())
    }

    /// Scene attributes, when `id` is a scene.
    pub fn scene_props(&self, id: ClipId) -> Option<&SceneProps> {
        match &self.node(id).kind {
            ClipKind::Scene(p) => Some(p),
            _ => None,
        }
    }

    /// Element content, when `id` is an element.
    pub fn element(&self, id: ClipId) -> Option<&Element> {
        match &self.node(id).kind {
            ClipKind::Element(e) => Some(e),
            _ => None,
        }
    }

    fn is_scene(&self, id: ClipId) -> bool {
        matches!(self.node(id).kind, ClipKind::Scene(_))
    }

    /// Start time in seconds, relative to the parent (absolute for scenes).
    pub fn start_time(&self, id: ClipId) -> f64 {
        match &self.node(id).kind {
            ClipKind::Root => 0.0,
            ClipKind::Scene(_) => self.scene_offset(id),
            ClipKind::Element(_) => self.element_window(id).0,
        }
    }

    /// End time in seconds, in the same frame of reference as [`Self::start_time`].
    pub fn end_time(&self, id: ClipId) -> f64 {
        match &self.node(id).kind {
            ClipKind::Root | ClipKind::Scene(_) => self.start_time(id) + self.duration(id),
            ClipKind::Element(_) => self.element_window(id).1,
        }
    }

    /// Duration in seconds. Always `end_time - start_time`.
    pub fn duration(&self, id: ClipId) -> f64 {
        match &self.node(id).kind {
            ClipKind::Root => self.total_duration(),
            ClipKind::Scene(_) => self.scene_duration(id),
            ClipKind::Element(_) => {
                let (start, end) = self.element_window(id);
                end - start
            }
        }
    }

    // Walks the earlier siblings once, carrying each end forward as the next implicit start.
    fn element_window(&self, id: ClipId) -> (f64, f64) {
        let Some(parent) = self.parent(id) else {
            return self.element_window_with(id, f64::NAN, None);
        };
        let parent_dur = self.duration(parent);
        let mut prev_end = None;
        for &c in self.children(parent) {
            let window = self.element_window_with(c, parent_dur, prev_end);
            if c == id {
                return window;
            }
            prev_end = Some(window.1);
        }
        self.element_window_with(id, parent_dur, None)
    }

    fn element_window_with(&self, id: ClipId, parent_dur: f64, prev_end: Option<f64>) -> (f64, f64) {
        let node = self.node(id);
        let start = match node.config.start.map(|e| e.resolve(parent_dur)) {
            Some(t) if t.is_finite() => t,
            _ => prev_end.unwrap_or(0.0),
        };

        let explicit_end = node.config.end.map(|e| e.resolve(parent_dur));
        let explicit_dur = node.config.duration.map(|e| e.resolve(parent_dur));
        let mut end = match (explicit_end, explicit_dur) {
            (Some(e), _) if e.is_finite() => e,
            (_, Some(d)) if d.is_finite() => start + d,
            _ => parent_dur,
        };

        if end.is_nan() || end <= start {
            tracing::debug!(clip = %node.name, start, end, "clip window collapsed; flooring to 1s");
            end = start + 1.0;
        }
        if node.parent.is_some_and(|p| self.is_scene(p)) {
            end = end.min(parent_dur);
        }
        (start, end)
    }

    /// Scene length: explicit `duration`, else the latest explicit child end, else the default.
    pub fn scene_duration(&self, id: ClipId) -> f64 {
        if let Some(d) = self.node(id).config.duration.map(|e| e.resolve(f64::NAN))
            && d.is_finite()
            && d >= 0.0
        {
            return d;
        }

        let mut prev_end = Some(0.0);
        let mut derived = f64::NAN;
        for &c in self.children(id) {
            prev_end = self.intrinsic_end(c, prev_end);
            if let Some(end) = prev_end {
                derived = derived.max(end);
            }
        }
        if derived.is_finite() && derived > 0.0 {
            derived
        } else {
            self.default_scene_duration
        }
    }

    // End implied by a child's own absolute expressions, without consulting the scene length.
    // `prev_end` is the previous sibling's intrinsic end, `Some(0.0)` for the first child.
    fn intrinsic_end(&self, id: ClipId, prev_end: Option<f64>) -> Option<f64> {
        let cfg = &self.node(id).config;
        let start = match cfg.start.map(|e| e.resolve(f64::NAN)) {
            Some(t) if t.is_finite() => t,
            _ => prev_end?,
        };
        if let Some(e) = cfg.end.map(|e| e.resolve(f64::NAN))
            && e.is_finite()
        {
            return Some(e.max(start));
        }
        cfg.duration
            .map(|e| e.resolve(f64::NAN))
            .filter(|d| d.is_finite())
            .map(|d| start + d.max(0.0))
    }

    /// Length of the scene's outgoing transition, or 0 for the last scene.
    ///
    /// Never longer than either of the two scenes it joins.
    pub fn scene_transition_secs(&self, id: ClipId) -> f64 {
        match self.next_sibling(id) {
            Some(next) => {
                self.transition_secs_with(id, self.scene_duration(id), self.scene_duration(next))
            }
            None => 0.0,
        }
    }

    fn transition_secs_with(&self, id: ClipId, duration: f64, next_duration: f64) -> f64 {
        self.scene_props(id)
            .and_then(|p| p.transition.as_ref())
            .map_or(0.0, |t| t.duration_secs.min(duration).min(next_duration).max(0.0))
    }

    /// Scene duration minus its own outgoing transition.
    pub fn scene_real_duration(&self, id: ClipId) -> f64 {
        (self.scene_duration(id) - self.scene_transition_secs(id)).max(0.0)
    }

    // Real durations of every scene in order, each scene length resolved once.
    fn scene_real_durations(&self) -> Vec<f64> {
        let scenes = self.scenes();
        let durations: Vec<f64> = scenes.iter().map(|&s| self.scene_duration(s)).collect();
        scenes
            .iter()
            .zip(&durations)
            .enumerate()
            .map(|(i, (&s, &d))| {
                let trans = durations
                    .get(i + 1)
                    .map_or(0.0, |&next| self.transition_secs_with(s, d, next));
                (d - trans).max(0.0)
            })
            .collect()
    }

    fn scene_offset(&self, id: ClipId) -> f64 {
        self.scenes()
            .iter()
            .zip(self.scene_real_durations())
            .take_while(|&(&s, _)| s != id)
            .map(|(_, real)| real)
            .sum()
    }

    /// Length of the assembled video.
    pub fn total_duration(&self) -> f64 {
        self.scene_real_durations().into_iter().sum()
    }

    /// Compute absolute and visible windows for every reachable node.
    pub fn annotate(&self) -> TimelineAnnotation {
        let mut windows = vec![None; self.nodes.len()];
        let root = self.root();
        let real = self.scene_real_durations();
        let total: f64 = real.iter().sum();
        windows[root.idx()] = Some(NodeWindow {
            abs_start: 0.0,
            abs_end: total,
            show_start: 0.0,
            show_end: total,
        });
        let mut start = 0.0;
        for (&scene, real) in self.scenes().iter().zip(real) {
            let duration = self.scene_duration(scene);
            let end = start + duration;
            windows[scene.idx()] = Some(NodeWindow {
                abs_start: start,
                abs_end: end,
                show_start: start,
                show_end: end,
            });
            self.annotate_children(scene, start, duration, &mut windows);
            start += real;
        }
        TimelineAnnotation { windows }
    }

    fn annotate_children(
        &self,
        parent: ClipId,
        parent_abs: f64,
        parent_dur: f64,
        out: &mut [Option<NodeWindow>],
    ) {
        let children = self.children(parent);
        let mut local = Vec::with_capacity(children.len());
        let mut prev_end = None;
        for &c in children {
            let window = self.element_window_with(c, parent_dur, prev_end);
            prev_end = Some(window.1);
            local.push(window);
        }

        let is_marker = |i: usize| {
            children
                .get(i)
                .and_then(|&c| self.element(c))
                .is_some_and(Element::is_transition)
        };
        for (i, (&c, &(start, end))) in children.iter().zip(&local).enumerate() {
            let abs_start = parent_abs + start;
            let abs_end = parent_abs + end;
            let mut show_start = abs_start;
            let mut show_end = abs_end;
            if i > 0 && is_marker(i - 1) {
                let (s, e) = local[i - 1];
                show_start += e - s;
            }
            if is_marker(i + 1) {
                let (s, e) = local[i + 1];
                show_end -= e - s;
            }
            out[c.idx()] = Some(NodeWindow {
                abs_start,
                abs_end,
                show_start,
                show_end: show_end.max(show_start),
            });
            self.annotate_children(c, abs_start, end - start, out);
        }
    }
}

/// Absolute timing of one node for a render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeWindow {
    /// Absolute start in seconds.
    pub abs_start: f64,
    /// Absolute end in seconds.
    pub abs_end: f64,
    /// Start of the visible part (after an incoming transition marker).
    pub show_start: f64,
    /// End of the visible part (before an outgoing transition marker).
    pub show_end: f64,
}

/// Snapshot produced by [`ClipTree::annotate`].
#[derive(Clone, Debug)]
pub struct TimelineAnnotation {
    windows: Vec<Option<NodeWindow>>,
}

impl TimelineAnnotation {
    /// Window of a node, if it was reachable at annotation time.
    pub fn window(&self, id: ClipId) -> Option<&NodeWindow> {
        self.windows.get(id.idx()).and_then(Option::as_ref)
    }

    /// Draw/animate predicate over the untrimmed window.
    pub fn is_active(&self, id: ClipId, t: f64) -> bool {
        self.window(id)
            .is_some_and(|w| w.abs_start <= t && t < w.abs_end)
    }

    /// Display predicate over the transition-trimmed window.
    pub fn is_visible(&self, id: ClipId, t: f64) -> bool {
        self.window(id)
            .is_some_and(|w| w.show_start <= t && t < w.show_end)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/clip.rs"]
mod tests;
