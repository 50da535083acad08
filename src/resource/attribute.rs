//! Typed resource attributes validated against a per-type schema.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::{ControllerError, ControllerResult};

/// Kind of value an attribute holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrKind {
    /// Boolean.
    Bool,
    /// Signed integer.
    Int,
    /// Floating point.
    Float,
    /// String.
    Str,
    /// Unset value.
    Null,
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "string",
            Self::Null => "null",
        })
    }
}

/// Attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Unset.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// String.
    Str(String),
}

impl AttrValue {
    /// Kind of this value.
    #[must_use]
    pub const fn kind(&self) -> AttrKind {
        match self {
            Self::Null => AttrKind::Null,
            Self::Bool(_) => AttrKind::Bool,
            Self::Int(_) => AttrKind::Int,
            Self::Float(_) => AttrKind::Float,
            Self::Str(_) => AttrKind::Str,
        }
    }

    /// Boolean value, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value, if this is one.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float value; integers widen.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// String value, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// True when unset.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for AttrValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Attribute flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags(u8);

impl Flags {
    /// No restrictions.
    pub const NONE: Self = Self(0);
    /// Never settable by users.
    pub const READ_ONLY: Self = Self(1);
    /// Not settable once the resource is deployed.
    pub const EXEC_READ_ONLY: Self = Self(1 << 1);
    /// Describes the experiment design rather than runtime data.
    pub const DESIGN: Self = Self(1 << 2);
    /// Secret; left out of snapshots.
    pub const CREDENTIAL: Self = Self(1 << 3);

    /// True if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Declaration of one attribute in a resource type schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Declared kind.
    pub kind: AttrKind,
    /// Initial value.
    pub default: AttrValue,
    /// Flags.
    pub flags: Flags,
    /// Help text.
    pub help: String,
}

impl Attribute {
    /// Declare an attribute with no default.
    pub fn new(name: impl Into<String>, kind: AttrKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: AttrValue::Null,
            flags: Flags::NONE,
            help: String::new(),
        }
    }

    /// Set the default value.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<AttrValue>) -> Self {
        self.default = default.into();
        self
    }

    /// Set the flags.
    #[must_use]
    pub const fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the help text.
    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Coerce `value` to this attribute's kind, or explain why it does not fit.
    #[allow(clippy::cast_precision_loss)]
    fn accept(&self, value: AttrValue) -> ControllerResult<AttrValue> {
        match (self.kind, value) {
            (_, AttrValue::Null) => Ok(AttrValue::Null),
            (AttrKind::Float, AttrValue::Int(i)) => Ok(AttrValue::Float(i as f64)),
            (kind, value) if value.kind() == kind => Ok(value),
            (kind, value) => Err(ControllerError::AttributeKind {
                name: self.name.clone(),
                expected: kind,
                found: value.kind(),
            }),
        }
    }
}

/// Attributes every resource type carries.
#[must_use]
pub fn standard_attributes() -> Vec<Attribute> {
    vec![
        Attribute::new("critical", AttrKind::Bool)
            .with_default(true)
            .with_flags(Flags::DESIGN)
            .with_help("A failure of this resource aborts the experiment"),
        Attribute::new("hardRelease", AttrKind::Bool)
            .with_default(false)
            .with_flags(Flags::DESIGN)
            .with_help("Forget the resource once it is released"),
    ]
}

struct Slot {
    definition: Attribute,
    value: AttrValue,
    changed: bool,
}

/// Live attribute values of one resource.
pub struct AttributeSet {
    rtype: String,
    slots: RwLock<BTreeMap<String, Slot>>,
}

impl AttributeSet {
    /// Instantiate every declared attribute at its default.
    pub fn new(rtype: impl Into<String>, schema: &[Attribute]) -> Self {
        let slots = schema
            .iter()
            .map(|definition| {
                let slot = Slot {
                    value: definition.default.clone(),
                    definition: definition.clone(),
                    changed: false,
                };
                (definition.name.clone(), slot)
            })
            .collect();
        Self {
            rtype: rtype.into(),
            slots: RwLock::new(slots),
        }
    }

    /// Current value.
    ///
    /// # Errors
    ///
    /// `UnknownAttribute` if the schema has no such attribute.
    pub fn get(&self, name: &str) -> ControllerResult<AttrValue> {
        self.slots
            .read()
            .get(name)
            .map(|slot| slot.value.clone())
            .ok_or_else(|| self.unknown(name))
    }

    /// Set a value, checking kind and flags. `deployed` locks `EXEC_READ_ONLY`
    /// attributes.
    ///
    /// # Errors
    ///
    /// `UnknownAttribute`, `ReadOnlyAttribute` or `AttributeKind`.
    pub fn set(&self, name: &str, value: AttrValue, deployed: bool) -> ControllerResult<()> {
        let mut slots = self.slots.write();
        let slot = slots.get_mut(name).ok_or_else(|| self.unknown(name))?;
        let flags = slot.definition.flags;
        if flags.contains(Flags::READ_ONLY) || (deployed && flags.contains(Flags::EXEC_READ_ONLY)) {
            return Err(ControllerError::ReadOnlyAttribute(name.to_string()));
        }
        slot.value = slot.definition.accept(value)?;
        slot.changed = true;
        Ok(())
    }

    /// Set a value bypassing flags; used by resource implementations to
    /// publish read-only data.
    ///
    /// # Errors
    ///
    /// `UnknownAttribute` or `AttributeKind`.
    pub fn publish(&self, name: &str, value: AttrValue) -> ControllerResult<()> {
        let mut slots = self.slots.write();
        let slot = slots.get_mut(name).ok_or_else(|| self.unknown(name))?;
        slot.value = slot.definition.accept(value)?;
        slot.changed = true;
        Ok(())
    }

    /// True once the value has been set explicitly.
    #[must_use]
    pub fn has_changed(&self, name: &str) -> bool {
        self.slots.read().get(name).is_some_and(|slot| slot.changed)
    }

    /// Schema of this set.
    #[must_use]
    pub fn definitions(&self) -> Vec<Attribute> {
        self.slots.read().values().map(|slot| slot.definition.clone()).collect()
    }

    /// All values except credentials.
    #[must_use]
    pub fn values(&self) -> BTreeMap<String, AttrValue> {
        self.slots
            .read()
            .iter()
            .filter(|(_, slot)| !slot.definition.flags.contains(Flags::CREDENTIAL))
            .map(|(name, slot)| (name.clone(), slot.value.clone()))
            .collect()
    }

    fn unknown(&self, name: &str) -> ControllerError {
        ControllerError::UnknownAttribute {
            rtype: self.rtype.clone(),
            name: name.to_string(),
        }
    }
}
