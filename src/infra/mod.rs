//! Infrastructure adapters: experiment persistence backends.

pub mod serializer;

pub use serializer::{
    ExperimentSnapshot, InMemorySerializer, JsonSerializer, ResourceSnapshot, SerializeFormat,
    Serializer,
};
