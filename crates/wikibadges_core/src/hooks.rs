//! Render-time extension point for the other-projects sidebar.

use crate::amender::OtherProjectsSidebarAmender;
use crate::ids::EntityId;
use crate::lookup::EntityLookup;
use crate::sidebar::Sidebar;

/// Called once per page render with the page's linked entity and the
/// sidebar about to be displayed.
pub trait OtherProjectsSidebarHook {
    fn on_other_projects_sidebar(&self, entity_id: &EntityId, sidebar: &mut Sidebar);
}

impl<L: EntityLookup> OtherProjectsSidebarHook for OtherProjectsSidebarAmender<L> {
    fn on_other_projects_sidebar(&self, entity_id: &EntityId, sidebar: &mut Sidebar) {
        self.amend(entity_id, sidebar);
    }
}

#[derive(Default)]
pub struct HookRegistry<'a> {
    sidebar_hooks: Vec<Box<dyn OtherProjectsSidebarHook + 'a>>,
}

impl<'a> HookRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: impl OtherProjectsSidebarHook + 'a) {
        self.sidebar_hooks.push(Box::new(hook));
    }

    pub fn len(&self) -> usize {
        self.sidebar_hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sidebar_hooks.is_empty()
    }

    /// Run every registered handler in registration order.
    pub fn run_other_projects_sidebar(&self, entity_id: &EntityId, sidebar: &mut Sidebar) {
        for hook in &self.sidebar_hooks {
            hook.on_other_projects_sidebar(entity_id, sidebar);
        }
    }
}
