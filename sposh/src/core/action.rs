use std::fmt;

use anyhow::Result;
use tracing::trace;

use crate::registry::{ActionFn, Capability};

/// A registered action. Stateless, so one instance per name is shared by
/// every plan element that names it.
pub struct Action {
    name: String,
    call: ActionFn,
}

impl Action {
    pub fn new(capability: &Capability<ActionFn>, action: &str) -> Self {
        Self {
            name: capability.qualified_name(action),
            call: capability.call.clone(),
        }
    }

    /// `Behaviour.action`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fire(&self) -> Result<bool> {
        let succeeded = (self.call)()?;
        trace!(action = %self.name, succeeded, "action fired");
        Ok(succeeded)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").field("name", &self.name).finish_non_exhaustive()
    }
}
