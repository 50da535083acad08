//! Resource managers: lifecycle states, attributes, conditions and types.

pub mod attribute;
pub mod condition;
pub mod factory;
pub mod manager;
pub mod state;

pub use attribute::{standard_attributes, AttrKind, AttrValue, Attribute, AttributeSet, Flags};
pub use condition::Condition;
pub use factory::ResourceFactory;
pub use manager::{ResourceCore, ResourceManager, TraceAttr};
pub use state::{ResourceAction, ResourceState};
