// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph view: draws a [`GraphScene`] with egui and turns input into gestures.
//!
//! Features:
//! - Node rendering with ports
//! - Connection rendering (bezier curves)
//! - Pan/zoom navigation
//! - Click and box selection
//! - Connection drag-to-create and node placement
//! - Minimap
//!
//! The view never edits the model. Node drags are previewed locally and
//! reported once, when the drag stops.

use crate::event::Selection;
use crate::node::NodeId;
use crate::port::{PortDirection, PortId, PortType};
use crate::registry::{LiveItem, NodeItem, PortItem};
use crate::scene::{node_size, GraphScene, HoverTarget, NODE_HEADER_HEIGHT, NODE_WIDTH, PORT_HEIGHT};
use egui::{Color32, Pos2, Rect, Stroke, Vec2};
use serde::{Deserialize, Serialize};

const PORT_RADIUS: f32 = 6.0;
const PORT_PADDING: f32 = 12.0;
const NODE_ROUNDING: f32 = 6.0;
const NODE_SHADOW_OFFSET: f32 = 3.0;

/// Connection visual parameters
const BEZIER_CURVATURE: f32 = 50.0;
const CONNECTION_THICKNESS: f32 = 2.5;

/// Grid parameters
const GRID_SPACING: f32 = 20.0;

const MIN_ZOOM: f32 = 0.1;
const MAX_ZOOM: f32 = 4.0;

/// Persistent view settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    /// Pan offset (graph space)
    pub pan: [f32; 2],
    /// Zoom level
    pub zoom: f32,
    /// Show minimap
    pub show_minimap: bool,
    /// Show grid
    pub show_grid: bool,
    /// Snap dragged nodes to the grid
    pub snap_to_grid: bool,
    /// Grid size for snapping
    pub snap_size: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            pan: [0.0, 0.0],
            zoom: 1.0,
            show_minimap: true,
            show_grid: true,
            snap_to_grid: false,
            snap_size: GRID_SPACING,
        }
    }
}

/// Box selection state
#[derive(Debug, Clone)]
pub struct BoxSelection {
    /// Start position (screen space)
    pub start: Pos2,
    /// Current position (screen space)
    pub current: Pos2,
}

impl BoxSelection {
    /// Normalized screen rectangle
    pub fn rect(&self) -> Rect {
        Rect::from_two_pos(self.start, self.current)
    }
}

/// Graph view interaction mode
#[derive(Debug, Clone, Default)]
pub enum InteractionMode {
    /// Default mode - selecting and dragging
    #[default]
    Normal,
    /// Panning the view
    Panning,
    /// Dragging selected nodes; the offset is previewed until release
    DraggingNodes {
        /// Nodes being dragged
        ids: Vec<NodeId>,
        /// Accumulated offset (graph space)
        offset: Vec2,
    },
    /// Dragging a connection out of a port
    Connecting,
    /// Box selection
    BoxSelect(BoxSelection),
}

/// In-place rename editor
#[derive(Debug, Clone)]
struct RenameEdit {
    node: NodeId,
    text: String,
}

/// Graph view UI state
pub struct GraphView {
    /// Persistent settings
    pub state: ViewState,
    /// Current interaction mode
    pub mode: InteractionMode,
    last_mouse_pos: Pos2,
    rename: Option<RenameEdit>,
}

impl GraphView {
    /// Create a view with default settings
    pub fn new() -> Self {
        Self::with_state(ViewState::default())
    }

    /// Create a view from saved settings
    pub fn with_state(state: ViewState) -> Self {
        Self {
            state,
            mode: InteractionMode::Normal,
            last_mouse_pos: Pos2::ZERO,
            rename: None,
        }
    }

    fn pan(&self) -> Vec2 {
        Vec2::new(self.state.pan[0], self.state.pan[1])
    }

    fn zoom(&self) -> f32 {
        self.state.zoom
    }

    /// Convert screen position to graph position
    pub fn screen_to_graph(&self, screen_pos: Pos2, rect: Rect) -> Pos2 {
        let center = rect.center();
        let pan = self.pan();
        Pos2::new(
            (screen_pos.x - center.x) / self.zoom() - pan.x,
            (screen_pos.y - center.y) / self.zoom() - pan.y,
        )
    }

    /// Convert graph position to screen position
    pub fn graph_to_screen(&self, graph_pos: Pos2, rect: Rect) -> Pos2 {
        let center = rect.center();
        let pan = self.pan();
        Pos2::new(
            (graph_pos.x + pan.x) * self.zoom() + center.x,
            (graph_pos.y + pan.y) * self.zoom() + center.y,
        )
    }

    /// Snap position to grid
    pub fn snap_position(&self, pos: [f32; 2]) -> [f32; 2] {
        if self.state.snap_to_grid {
            let size = self.state.snap_size;
            [(pos[0] / size).round() * size, (pos[1] / size).round() * size]
        } else {
            pos
        }
    }

    /// Zoom by `factor` keeping the graph point under `anchor` fixed
    pub fn zoom_around(&mut self, factor: f32, anchor: Pos2, rect: Rect) {
        let old_zoom = self.zoom();
        let anchor_graph = self.screen_to_graph(anchor, rect);
        self.state.zoom = (old_zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        if self.state.zoom != old_zoom {
            let after = self.screen_to_graph(anchor, rect);
            self.state.pan[0] += after.x - anchor_graph.x;
            self.state.pan[1] += after.y - anchor_graph.y;
        }
    }

    /// Center the view on every node item
    pub fn frame_all(&mut self, scene: &GraphScene) {
        if let Some(bounds) = items_bounds(scene.node_items()) {
            let center = bounds.center();
            self.state.pan = [-center.x, -center.y];
        }
    }

    /// Start renaming a node in place
    pub fn begin_rename(&mut self, scene: &GraphScene, node: &NodeId) {
        if let Some(item) = scene.node_item(node) {
            self.rename = Some(RenameEdit {
                node: node.clone(),
                text: item.title.clone(),
            });
        }
    }

    /// Render the scene and forward gestures to it
    pub fn ui(&mut self, ui: &mut egui::Ui, scene: &mut GraphScene) {
        let rect = ui.available_rect_before_wrap();
        let response = ui.allocate_rect(rect, egui::Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        if self.state.show_grid {
            self.draw_grid(&painter, rect);
        }

        self.handle_input(ui, &response, rect, scene);

        // Connections below nodes
        self.draw_connections(&painter, rect, scene);
        self.draw_grabber(&painter, rect, scene);
        self.draw_nodes(&painter, rect, scene);

        if let InteractionMode::BoxSelect(ref selection) = self.mode {
            draw_box_selection(&painter, selection);
        }

        if self.state.show_minimap {
            self.draw_minimap(&painter, rect, scene);
        }

        self.rename_ui(ui, rect, scene);
        self.draw_status_bar(ui, rect, scene);
    }

    fn draw_grid(&self, painter: &egui::Painter, rect: Rect) {
        let spacing = GRID_SPACING * self.zoom();
        let major_spacing = spacing * 5.0;

        let grid_color_minor = Color32::from_rgba_unmultiplied(60, 60, 60, 100);
        let grid_color_major = Color32::from_rgba_unmultiplied(80, 80, 80, 150);

        let origin = self.graph_to_screen(Pos2::ZERO, rect);
        let offset_x = (origin.x - rect.left()).rem_euclid(major_spacing);
        let offset_y = (origin.y - rect.top()).rem_euclid(major_spacing);

        for (step, color) in [(spacing, grid_color_minor), (major_spacing, grid_color_major)] {
            let mut x = rect.left() + offset_x % step;
            while x < rect.right() {
                painter.line_segment(
                    [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
                    Stroke::new(1.0, color),
                );
                x += step;
            }

            let mut y = rect.top() + offset_y % step;
            while y < rect.bottom() {
                painter.line_segment(
                    [Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)],
                    Stroke::new(1.0, color),
                );
                y += step;
            }
        }

        // Origin axes
        if rect.contains(origin) {
            let axis = Stroke::new(2.0, Color32::from_rgba_unmultiplied(100, 100, 150, 180));
            painter.line_segment([Pos2::new(origin.x, rect.top()), Pos2::new(origin.x, rect.bottom())], axis);
            painter.line_segment([Pos2::new(rect.left(), origin.y), Pos2::new(rect.right(), origin.y)], axis);
        }
    }

    fn handle_input(&mut self, ui: &egui::Ui, response: &egui::Response, rect: Rect, scene: &mut GraphScene) {
        let mouse_pos = ui.input(|i| i.pointer.hover_pos().unwrap_or(self.last_mouse_pos));
        let delta = mouse_pos - self.last_mouse_pos;
        self.last_mouse_pos = mouse_pos;
        let graph_pos = self.screen_to_graph(mouse_pos, rect);
        let graph_point = [graph_pos.x, graph_pos.y];
        let shift_held = ui.input(|i| i.modifiers.shift);

        // Zoom with scroll wheel
        let scroll_delta = ui.input(|i| i.raw_scroll_delta.y);
        if scroll_delta != 0.0 && rect.contains(mouse_pos) {
            self.zoom_around(1.0 + scroll_delta * 0.001, mouse_pos, rect);
        }

        let hovered_port = scene.port_at(graph_point, PORT_RADIUS * 1.5);
        let hovered_node = scene.node_at(graph_point).map(|item| item.node.clone());
        if rect.contains(mouse_pos) {
            let target = hovered_port
                .clone()
                .map(HoverTarget::Port)
                .or_else(|| hovered_node.clone().map(HoverTarget::Node));
            scene.set_hover(target);
        } else {
            scene.set_hover(None);
        }

        if scene.grabber().is_some() {
            scene.move_grabber(graph_point);
        }

        match &mut self.mode {
            InteractionMode::Normal => {
                if response.dragged_by(egui::PointerButton::Middle) {
                    self.mode = InteractionMode::Panning;
                } else if response.double_clicked() {
                    if let Some(node) = hovered_node {
                        scene.double_click_node(node);
                    }
                } else if response.clicked() {
                    if matches!(scene.grabber(), Some(LiveItem::Node(_))) {
                        scene.request_placement(self.snap_position(graph_point));
                    } else {
                        let selection = click_selection(scene.selection(), hovered_node, shift_held);
                        scene.select(selection);
                    }
                } else if response.drag_started_by(egui::PointerButton::Primary) {
                    if let Some(port) = hovered_port {
                        scene.press_port(port);
                        self.mode = InteractionMode::Connecting;
                    } else if let Some(node) = hovered_node {
                        let mut selection = scene.selection();
                        if !selection.contains_node(&node) {
                            selection = click_selection(selection, Some(node), shift_held);
                            scene.select(selection.clone());
                        }
                        self.mode = InteractionMode::DraggingNodes {
                            ids: selection.nodes.into_iter().collect(),
                            offset: Vec2::ZERO,
                        };
                    } else {
                        self.mode = InteractionMode::BoxSelect(BoxSelection {
                            start: mouse_pos,
                            current: mouse_pos,
                        });
                    }
                }
            }

            InteractionMode::Panning => {
                if response.dragged() {
                    let graph_delta = delta / self.state.zoom;
                    self.state.pan[0] += graph_delta.x;
                    self.state.pan[1] += graph_delta.y;
                }
                if response.drag_stopped() {
                    self.mode = InteractionMode::Normal;
                }
            }

            InteractionMode::DraggingNodes { ids, offset } => {
                if response.dragged() {
                    *offset += delta / self.state.zoom;
                }
                if response.drag_stopped() {
                    let ids = std::mem::take(ids);
                    let offset = *offset;
                    let delta = self.snapped_delta(scene, &ids, offset);
                    scene.move_nodes(ids, delta);
                    self.mode = InteractionMode::Normal;
                }
            }

            InteractionMode::Connecting => {
                if response.drag_stopped() {
                    scene.release_connection(hovered_port);
                    self.mode = InteractionMode::Normal;
                }
            }

            InteractionMode::BoxSelect(selection) => {
                selection.current = mouse_pos;

                if response.drag_stopped() {
                    let screen_rect = selection.rect();
                    let min = self.screen_to_graph(screen_rect.min, rect);
                    let max = self.screen_to_graph(screen_rect.max, rect);
                    let boxed = nodes_in_rect(scene.node_items(), Rect::from_min_max(min, max));
                    let mut next = if shift_held { scene.selection() } else { Selection::default() };
                    next.nodes.extend(boxed);
                    scene.select(next);
                    self.mode = InteractionMode::Normal;
                }
            }
        }

        if self.rename.is_none() {
            ui.input(|i| {
                if i.key_pressed(egui::Key::Escape) {
                    scene.request_cancel();
                } else if i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace) {
                    scene.request_delete();
                }
            });
            if ui.input(|i| i.key_pressed(egui::Key::F2)) {
                if let [node] = scene.selected_nodes().as_slice() {
                    self.begin_rename(scene, node);
                }
            }
        }
    }

    /// Delta that lands the first dragged node on the grid
    fn snapped_delta(&self, scene: &GraphScene, ids: &[NodeId], offset: Vec2) -> [f32; 2] {
        let anchor = ids.first().and_then(|id| scene.node_item(id));
        match anchor {
            Some(item) if self.state.snap_to_grid => {
                let target = self.snap_position([item.position[0] + offset.x, item.position[1] + offset.y]);
                [target[0] - item.position[0], target[1] - item.position[1]]
            }
            _ => [offset.x, offset.y],
        }
    }

    /// Preview offset for an item being dragged
    fn drag_offset(&self, node: &NodeId) -> Vec2 {
        match &self.mode {
            InteractionMode::DraggingNodes { ids, offset } if ids.contains(node) => *offset,
            _ => Vec2::ZERO,
        }
    }

    fn port_screen_position(&self, scene: &GraphScene, port: &PortId, rect: Rect) -> Option<Pos2> {
        let [x, y] = scene.port_position(port)?;
        let offset = self.drag_offset(&port.node);
        Some(self.graph_to_screen(Pos2::new(x, y) + offset, rect))
    }

    fn draw_connections(&self, painter: &egui::Painter, rect: Rect, scene: &GraphScene) {
        let hovered = scene.hover();
        for connection in scene.connection_items() {
            let from = self.port_screen_position(scene, &connection.id.start, rect);
            let to = self.port_screen_position(scene, &connection.id.end, rect);
            let (Some(from), Some(to)) = (from, to) else {
                continue;
            };

            let port_type = scene
                .node_item(connection.id.start_node())
                .and_then(|item| item.port(&connection.id.start))
                .map(|port| &port.port_type);
            let is_hovered = matches!(hovered, Some(HoverTarget::Port(port)) if connection.id.involves_port(port));
            let color = if connection.selected {
                Color32::WHITE
            } else {
                match port_type {
                    Some(port_type) if is_hovered => brighten(port_color(port_type)),
                    Some(port_type) => port_color(port_type),
                    None => Color32::GRAY,
                }
            };

            self.draw_bezier_connection(painter, from, to, color);
        }
    }

    fn draw_bezier_connection(&self, painter: &egui::Painter, from: Pos2, to: Pos2, color: Color32) {
        let distance = (to.x - from.x).abs();
        let curvature = (BEZIER_CURVATURE * self.zoom()).min(distance * 0.5);

        let ctrl1 = Pos2::new(from.x + curvature, from.y);
        let ctrl2 = Pos2::new(to.x - curvature, to.y);

        let points = bezier_points(from, ctrl1, ctrl2, to, 32);
        for pair in points.windows(2) {
            painter.line_segment([pair[0], pair[1]], Stroke::new(CONNECTION_THICKNESS * self.zoom(), color));
        }
    }

    fn draw_grabber(&self, painter: &egui::Painter, rect: Rect, scene: &GraphScene) {
        match scene.grabber() {
            Some(LiveItem::Connection(live)) => {
                let Some(from) = self.port_screen_position(scene, &live.from, rect) else {
                    return;
                };
                let cursor = self.graph_to_screen(Pos2::new(live.cursor[0], live.cursor[1]), rect);
                let color = scene
                    .node_item(&live.from.node)
                    .and_then(|item| item.port(&live.from))
                    .map_or(Color32::GRAY, |port| port_color(&port.port_type));
                if live.from.direction == PortDirection::Input {
                    self.draw_bezier_connection(painter, cursor, from, color);
                } else {
                    self.draw_bezier_connection(painter, from, cursor, color);
                }
            }
            Some(LiveItem::Node(live)) => {
                let min = self.graph_to_screen(Pos2::new(live.position[0], live.position[1]), rect);
                let ghost = Rect::from_min_size(min, Vec2::new(NODE_WIDTH, NODE_HEADER_HEIGHT + PORT_HEIGHT) * self.zoom());
                painter.rect_filled(ghost, NODE_ROUNDING * self.zoom(), Color32::from_rgba_unmultiplied(70, 100, 130, 120));
                painter.text(
                    ghost.center(),
                    egui::Align2::CENTER_CENTER,
                    live.request.type_name(),
                    egui::FontId::proportional(12.0 * self.zoom()),
                    Color32::WHITE,
                );
            }
            None => {}
        }
    }

    fn draw_nodes(&self, painter: &egui::Painter, rect: Rect, scene: &GraphScene) {
        let hovered_port = match scene.hover() {
            Some(HoverTarget::Port(port)) => Some(port),
            _ => None,
        };

        for item in scene.node_items() {
            let [width, height] = node_size(item);
            let min = Pos2::new(item.position[0], item.position[1]) + self.drag_offset(&item.node);
            let screen_rect = Rect::from_min_size(self.graph_to_screen(min, rect), Vec2::new(width, height) * self.zoom());

            if !screen_rect.intersects(rect) {
                continue;
            }

            // Shadow
            let shadow_rect = screen_rect.translate(Vec2::new(NODE_SHADOW_OFFSET, NODE_SHADOW_OFFSET));
            painter.rect_filled(shadow_rect, NODE_ROUNDING * self.zoom(), Color32::from_rgba_unmultiplied(0, 0, 0, 60));

            let bg_color = if item.selected {
                Color32::from_rgb(60, 70, 90)
            } else {
                Color32::from_rgb(45, 45, 48)
            };
            painter.rect_filled(screen_rect, NODE_ROUNDING * self.zoom(), bg_color);

            let header_rect = Rect::from_min_size(
                screen_rect.min,
                Vec2::new(screen_rect.width(), NODE_HEADER_HEIGHT * self.zoom()),
            );
            let [r, g, b] = item.color;
            let header_color = if item.bypassed {
                Color32::from_rgb(r / 2, g / 2, b / 2)
            } else {
                Color32::from_rgb(r, g, b)
            };
            painter.rect_filled(
                header_rect,
                egui::Rounding {
                    nw: NODE_ROUNDING * self.zoom(),
                    ne: NODE_ROUNDING * self.zoom(),
                    sw: 0.0,
                    se: 0.0,
                },
                header_color,
            );

            painter.text(
                header_rect.center(),
                egui::Align2::CENTER_CENTER,
                &item.title,
                egui::FontId::proportional(12.0 * self.zoom()),
                if item.bypassed { Color32::from_gray(140) } else { Color32::WHITE },
            );

            if item.is_terminal {
                painter.circle_filled(
                    Pos2::new(header_rect.right() - 8.0 * self.zoom(), header_rect.center().y),
                    3.0 * self.zoom(),
                    Color32::from_rgb(120, 220, 120),
                );
            }

            if item.selected {
                painter.rect_stroke(
                    screen_rect,
                    NODE_ROUNDING * self.zoom(),
                    Stroke::new(2.0, Color32::from_rgb(100, 150, 255)),
                );
            }

            self.draw_ports(painter, screen_rect, &item.inputs, PortDirection::Input, hovered_port);
            self.draw_ports(painter, screen_rect, &item.outputs, PortDirection::Output, hovered_port);
        }
    }

    fn draw_ports(
        &self,
        painter: &egui::Painter,
        screen_rect: Rect,
        ports: &[PortItem],
        direction: PortDirection,
        hovered: Option<&PortId>,
    ) {
        let radius = PORT_RADIUS * self.zoom();
        for (i, port) in ports.iter().enumerate() {
            let y_offset = NODE_HEADER_HEIGHT + (i as f32 * PORT_HEIGHT) + PORT_HEIGHT / 2.0;
            let (x, label_x, align) = match direction {
                PortDirection::Output => (
                    screen_rect.right(),
                    screen_rect.right() - PORT_PADDING * self.zoom(),
                    egui::Align2::RIGHT_CENTER,
                ),
                _ => (
                    screen_rect.left(),
                    screen_rect.left() + PORT_PADDING * self.zoom(),
                    egui::Align2::LEFT_CENTER,
                ),
            };
            let pos = Pos2::new(x, screen_rect.top() + y_offset * self.zoom());

            let scale = if hovered == Some(&port.id) { 1.3 } else { 1.0 };
            painter.circle_filled(pos, radius * scale, port_color(&port.port_type));
            painter.circle_stroke(pos, radius, Stroke::new(1.0, Color32::from_gray(30)));

            painter.text(
                Pos2::new(label_x, pos.y),
                align,
                &port.label,
                egui::FontId::proportional(10.0 * self.zoom()),
                Color32::from_gray(200),
            );
        }
    }

    fn draw_minimap(&self, painter: &egui::Painter, rect: Rect, scene: &GraphScene) {
        let minimap_size = Vec2::new(150.0, 100.0);
        let minimap_rect = Rect::from_min_size(
            Pos2::new(rect.right() - minimap_size.x - 10.0, rect.bottom() - minimap_size.y - 10.0),
            minimap_size,
        );

        painter.rect_filled(minimap_rect, 4.0, Color32::from_rgba_unmultiplied(30, 30, 30, 200));
        painter.rect_stroke(minimap_rect, 4.0, Stroke::new(1.0, Color32::from_gray(60)));

        let Some(bounds) = items_bounds(scene.node_items()) else {
            return;
        };
        let bounds = bounds.expand(50.0);
        let scale = (minimap_rect.width() / bounds.width()).min(minimap_rect.height() / bounds.height());
        let to_minimap = |pos: Pos2| minimap_rect.min + (pos - bounds.min) * scale;

        for item in scene.node_items() {
            let [width, height] = node_size(item);
            let min = to_minimap(Pos2::new(item.position[0], item.position[1]));
            let color = if item.selected {
                Color32::from_rgb(100, 150, 255)
            } else {
                Color32::from_rgb(80, 80, 100)
            };
            painter.rect_filled(Rect::from_min_size(min, Vec2::new(width, height) * scale), 2.0, color);
        }

        // Viewport indicator
        let view_min = to_minimap(self.screen_to_graph(rect.min, rect));
        let view_max = to_minimap(self.screen_to_graph(rect.max, rect));
        painter.rect_stroke(
            Rect::from_min_max(view_min, view_max).intersect(minimap_rect),
            2.0,
            Stroke::new(1.0, Color32::WHITE),
        );
    }

    fn rename_ui(&mut self, ui: &mut egui::Ui, rect: Rect, scene: &mut GraphScene) {
        let Some(node) = self.rename.as_ref().map(|edit| edit.node.clone()) else {
            return;
        };
        let Some(item) = scene.node_item(&node) else {
            self.rename = None;
            return;
        };
        let anchor = self.graph_to_screen(Pos2::new(item.position[0], item.position[1]), rect);
        let Some(edit) = &mut self.rename else {
            return;
        };
        let mut finished = None;
        egui::Area::new(egui::Id::new("nodeweave_rename"))
            .fixed_pos(anchor)
            .show(ui.ctx(), |ui| {
                let response = ui.add(egui::TextEdit::singleline(&mut edit.text).desired_width(NODE_WIDTH));
                response.request_focus();
                if ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    finished = Some(true);
                } else if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
                    finished = Some(false);
                }
            });

        match finished {
            Some(true) => {
                if let Some(edit) = self.rename.take() {
                    scene.rename_node(edit.node, edit.text);
                }
            }
            Some(false) => self.rename = None,
            None => {}
        }
    }

    fn draw_status_bar(&self, ui: &mut egui::Ui, rect: Rect, scene: &GraphScene) {
        let status_rect = Rect::from_min_size(
            Pos2::new(rect.left() + 5.0, rect.bottom() - 20.0),
            Vec2::new(rect.width() - 10.0, 18.0),
        );

        let mut status = format!(
            "Nodes: {} | Connections: {} | Zoom: {:.0}% | Selected: {}",
            scene.node_items().count(),
            scene.connection_items().count(),
            self.zoom() * 100.0,
            scene.selected_nodes().len(),
        );
        if let Some(hint) = scene.hint_text() {
            status.push_str(" | ");
            status.push_str(&hint);
        }

        ui.painter().text(
            status_rect.left_center(),
            egui::Align2::LEFT_CENTER,
            status,
            egui::FontId::proportional(11.0),
            Color32::from_gray(150),
        );
    }
}

impl Default for GraphView {
    fn default() -> Self {
        Self::new()
    }
}

fn port_color(port_type: &PortType) -> Color32 {
    let [r, g, b] = port_type.color();
    Color32::from_rgb(r, g, b)
}

fn brighten(color: Color32) -> Color32 {
    Color32::from_rgb(
        color.r().saturating_add(50),
        color.g().saturating_add(50),
        color.b().saturating_add(50),
    )
}

fn draw_box_selection(painter: &egui::Painter, selection: &BoxSelection) {
    let rect = selection.rect();
    painter.rect_filled(rect, 0.0, Color32::from_rgba_unmultiplied(100, 150, 255, 30));
    painter.rect_stroke(rect, 0.0, Stroke::new(1.0, Color32::from_rgb(100, 150, 255)));
}

/// Selection after clicking `node` (or empty space)
fn click_selection(current: Selection, node: Option<NodeId>, add: bool) -> Selection {
    match (node, add) {
        (Some(node), true) => {
            let mut next = current;
            if !next.nodes.shift_remove(&node) {
                next.nodes.insert(node);
            }
            next
        }
        (Some(node), false) => Selection::from_nodes([node]),
        (None, true) => current,
        (None, false) => Selection::default(),
    }
}

/// Nodes whose origin lies inside a graph-space rectangle
fn nodes_in_rect<'a>(items: impl Iterator<Item = &'a NodeItem>, area: Rect) -> Vec<NodeId> {
    items
        .filter(|item| area.contains(Pos2::new(item.position[0], item.position[1])))
        .map(|item| item.node.clone())
        .collect()
}

/// Graph-space bounds of a set of node items
fn items_bounds<'a>(items: impl Iterator<Item = &'a NodeItem>) -> Option<Rect> {
    items
        .map(|item| {
            let [width, height] = node_size(item);
            Rect::from_min_size(Pos2::new(item.position[0], item.position[1]), Vec2::new(width, height))
        })
        .reduce(|a, b| a.union(b))
}

/// Generate points along a cubic bezier curve
fn bezier_points(p0: Pos2, p1: Pos2, p2: Pos2, p3: Pos2, segments: usize) -> Vec<Pos2> {
    let mut points = Vec::with_capacity(segments + 1);
    for i in 0..=segments {
        let t = i as f32 / segments as f32;
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        let x = mt3 * p0.x + 3.0 * mt2 * t * p1.x + 3.0 * mt * t2 * p2.x + t3 * p3.x;
        let y = mt3 * p0.y + 3.0 * mt2 * t * p1.y + 3.0 * mt * t2 * p2.y + t3 * p3.y;

        points.push(Pos2::new(x, y));
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ItemId, NodeItemKind};
    use nodeweave_document::DocPath;

    fn node(s: &str) -> NodeId {
        NodeId::new(DocPath::parse(s).unwrap())
    }

    fn item(name: &str, position: [f32; 2]) -> NodeItem {
        NodeItem {
            item_id: ItemId::new(),
            node: node(name),
            kind: NodeItemKind::Generic,
            title: name.to_string(),
            type_name: "Add".to_string(),
            position,
            color: [70, 100, 130],
            bypassed: false,
            is_terminal: false,
            selected: false,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    #[test]
    fn test_coordinate_round_trip() {
        let mut view = GraphView::new();
        view.state.pan = [30.0, -10.0];
        view.state.zoom = 2.0;
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0));

        let graph = Pos2::new(12.5, -40.0);
        let screen = view.graph_to_screen(graph, rect);
        assert_eq!(screen, Pos2::new(485.0, 200.0));
        let back = view.screen_to_graph(screen, rect);
        assert!((back - graph).length() < 1e-4);
    }

    #[test]
    fn test_zoom_keeps_anchor_fixed() {
        let mut view = GraphView::new();
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0));
        let anchor = Pos2::new(600.0, 100.0);
        let before = view.screen_to_graph(anchor, rect);

        view.zoom_around(1.5, anchor, rect);
        assert_eq!(view.state.zoom, 1.5);
        assert!((view.screen_to_graph(anchor, rect) - before).length() < 1e-3);

        view.zoom_around(100.0, anchor, rect);
        assert_eq!(view.state.zoom, MAX_ZOOM);
    }

    #[test]
    fn test_snap_position() {
        let mut view = GraphView::new();
        assert_eq!(view.snap_position([13.0, 27.0]), [13.0, 27.0]);
        view.state.snap_to_grid = true;
        assert_eq!(view.snap_position([13.0, 27.0]), [20.0, 20.0]);
    }

    #[test]
    fn test_bezier_endpoints() {
        let p0 = Pos2::new(0.0, 0.0);
        let p3 = Pos2::new(100.0, 50.0);
        let points = bezier_points(p0, Pos2::new(50.0, 0.0), Pos2::new(50.0, 50.0), p3, 8);
        assert_eq!(points.len(), 9);
        assert_eq!(points[0], p0);
        assert!((points[8] - p3).length() < 1e-4);
        assert!((points[4] - Pos2::new(50.0, 25.0)).length() < 1e-4);
    }

    #[test]
    fn test_click_selection() {
        let a = node("/G/A");
        let b = node("/G/B");
        let current = Selection::from_nodes([a.clone()]);

        assert_eq!(click_selection(current.clone(), Some(b.clone()), false), Selection::from_nodes([b.clone()]));
        assert_eq!(
            click_selection(current.clone(), Some(b.clone()), true),
            Selection::from_nodes([a.clone(), b])
        );
        assert!(click_selection(current.clone(), Some(a), true).is_empty());
        assert!(click_selection(current, None, false).is_empty());
    }

    #[test]
    fn test_box_and_bounds() {
        let items = [item("/G/A", [0.0, 0.0]), item("/G/B", [300.0, 100.0])];
        let inside = nodes_in_rect(items.iter(), Rect::from_min_max(Pos2::new(-10.0, -10.0), Pos2::new(100.0, 100.0)));
        assert_eq!(inside, vec![node("/G/A")]);

        let bounds = items_bounds(items.iter()).unwrap();
        assert_eq!(bounds.min, Pos2::ZERO);
        assert_eq!(bounds.max.x, 300.0 + NODE_WIDTH);
        assert!(items_bounds(std::iter::empty()).is_none());
    }
}
