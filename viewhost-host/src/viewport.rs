//! Viewport (carousel) collaborator.

use crate::error::ViewportError;
use serde::{Deserialize, Serialize};

/// Handle to the per-application container node inside the viewport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerNode {
    id: String,
}

impl ContainerNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// How the carousel centres items while navigating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemNav {
    Basic,
    Centered,
    #[default]
    ForceCentered,
}

/// Fixed layout of the application carousel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ViewportLayout {
    pub horizontal: bool,
    pub item_nav: ItemNav,
    pub smart: bool,
    pub activate_middle: bool,
    pub mouse_dragging: bool,
    pub touch_dragging: bool,
    pub release_swing: bool,
    pub start_at: u32,
    pub scroll_by: u32,
    /// Animation speed in milliseconds.
    pub speed_ms: u32,
    pub elastic_bounds: bool,
    pub easing: String,
    pub drag_handle: bool,
    pub dynamic_handle: bool,
    pub click_bar: bool,
}

impl Default for ViewportLayout {
    fn default() -> Self {
        Self {
            horizontal: true,
            item_nav: ItemNav::ForceCentered,
            smart: true,
            activate_middle: true,
            mouse_dragging: true,
            touch_dragging: true,
            release_swing: true,
            start_at: 0,
            scroll_by: 1,
            speed_ms: 300,
            elastic_bounds: true,
            easing: "easeOutExpo".to_string(),
            drag_handle: true,
            dynamic_handle: true,
            click_bar: true,
        }
    }
}

/// The widget that lays out application containers.
pub trait Viewport: Send {
    /// Binds the widget to the element matched by `selector`.
    fn mount(&mut self, selector: &str, layout: &ViewportLayout) -> Result<(), ViewportError>;

    fn init(&mut self) -> Result<(), ViewportError>;

    /// Appends a rendered fragment to the item list and returns the node
    /// carrying `container_class` inside it.
    fn append(
        &mut self,
        fragment: &str,
        container_class: &str,
    ) -> Result<ContainerNode, ViewportError>;

    /// Brings the item holding `container` to the front.
    fn activate(&mut self, container: &ContainerNode) -> Result<(), ViewportError>;

    /// Removes the item holding `container`.
    fn remove(&mut self, container: &ContainerNode) -> Result<(), ViewportError>;
}
