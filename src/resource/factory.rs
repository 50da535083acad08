//! Resource type registry entries.

use std::fmt;
use std::sync::Arc;

use crate::core::ControllerHandle;
use crate::resource::{standard_attributes, Attribute, ResourceCore, ResourceManager};
use crate::util::Guid;

type Constructor = dyn Fn(ResourceCore) -> Arc<dyn ResourceManager> + Send + Sync;

/// A registered resource type: its schema plus a constructor.
#[derive(Clone)]
pub struct ResourceFactory {
    rtype: String,
    help: String,
    attributes: Vec<Attribute>,
    traces: Vec<String>,
    constructor: Arc<Constructor>,
}

impl ResourceFactory {
    /// Factory for type `rtype`, building managers with `constructor`.
    ///
    /// The standard attributes (`critical`, `hardRelease`) are always declared.
    pub fn new<R, F>(rtype: impl Into<String>, constructor: F) -> Self
    where
        R: ResourceManager,
        F: Fn(ResourceCore) -> R + Send + Sync + 'static,
    {
        Self {
            rtype: rtype.into(),
            help: String::new(),
            attributes: standard_attributes(),
            traces: Vec::new(),
            constructor: Arc::new(move |core| Arc::new(constructor(core)) as Arc<dyn ResourceManager>),
        }
    }

    /// Set the help text.
    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Declare an attribute; a later declaration overrides a standard one.
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.retain(|a| a.name != attribute.name);
        self.attributes.push(attribute);
        self
    }

    /// Declare a trace.
    #[must_use]
    pub fn with_trace(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.traces.contains(&name) {
            self.traces.push(name);
        }
        self
    }

    /// Type tag.
    #[must_use]
    pub fn rtype(&self) -> &str {
        &self.rtype
    }

    /// Help text.
    #[must_use]
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Declared attributes.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Declared traces.
    #[must_use]
    pub fn traces(&self) -> &[String] {
        &self.traces
    }

    pub(crate) fn create(&self, guid: Guid, controller: ControllerHandle) -> Arc<dyn ResourceManager> {
        let core = ResourceCore::new(guid, &self.rtype, &self.attributes, &self.traces, controller);
        (self.constructor)(core)
    }
}

impl fmt::Debug for ResourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceFactory")
            .field("rtype", &self.rtype)
            .field("attributes", &self.attributes.len())
            .field("traces", &self.traces)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{AttrKind, AttrValue};

    struct Plain(ResourceCore);

    impl ResourceManager for Plain {
        fn core(&self) -> &ResourceCore {
            &self.0
        }
    }

    #[test]
    fn test_standard_attributes_are_declared() {
        let factory = ResourceFactory::new("plain", Plain);
        let names: Vec<_> = factory.attributes().iter().map(|a| a.name.as_str()).collect();
        assert!(names.contains(&"critical"));
        assert!(names.contains(&"hardRelease"));
    }

    #[test]
    fn test_attribute_override_replaces_standard() {
        let factory = ResourceFactory::new("plain", Plain)
            .with_attribute(Attribute::new("critical", AttrKind::Bool).with_default(false))
            .with_trace("stdout")
            .with_trace("stdout");
        let critical: Vec<_> = factory
            .attributes()
            .iter()
            .filter(|a| a.name == "critical")
            .collect();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].default, AttrValue::Bool(false));
        assert_eq!(factory.traces(), ["stdout".to_string()]);
    }

    #[test]
    fn test_create_builds_new_resource() {
        let factory = ResourceFactory::new("plain", Plain);
        let rm = factory.create(7, ControllerHandle::detached());
        assert_eq!(rm.guid(), 7);
        assert_eq!(rm.rtype(), "plain");
        assert_eq!(rm.state(), crate::resource::ResourceState::New);
        assert!(rm.core().is_critical());
    }
}
