//! Schema layer for settee
//!
//! This crate turns field descriptors into compiled schemas:
//! - PrimitiveType: scalar types and their coercion rules
//! - TypeNode / NodeKind: one compiled field and its closures
//! - Descriptor: the uncompiled field grammar, built in code or parsed from JSON
//! - FieldTree: the fixed shape of a schema
//! - SchemaBuilder / Schema: compilation and the compiled result
//! - HookQueue / Hookable: pre and post lifecycle hooks
//! - FieldAccess: how closures see a document

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod descriptor;
pub mod hooks;
pub mod inflect;
pub mod node;
pub mod primitive;
pub mod schema;
pub mod tree;

pub use compiler::{SchemaBuilder, DEFAULT_KEY_FIELD};
pub use descriptor::{parse_fields, Descriptor, FieldSpec, IndexOption};
pub use hooks::{HookQueue, Hookable, PostHookFn, PreHookFn};
pub use inflect::singularize;
pub use node::{
    DefaultFn, DefaultValue, FieldAccess, FieldOptions, MapFn, MethodFn, NodeKind, TypeNode,
    ValidatorFn, VirtualGetFn, VirtualSetFn,
};
pub use primitive::PrimitiveType;
pub use schema::{
    IndexKind, IndexSpec, RefSpec, Schema, SchemaOptions, SerializeOptions, TransformFn,
};
pub use tree::{FieldNode, FieldTree};
