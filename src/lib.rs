//! Filter engine: parses JSON filter trees, validates them against an entity
//! model and compiles them to SQL predicates over left-joined relations.

pub mod ast;
pub mod builder;
pub mod config;
pub mod demo;
pub mod error;
pub mod model;
pub mod parser;
pub mod service;
pub mod sql_compiler;
pub mod token;
pub mod validator;
pub mod value;
pub mod writer;

pub use ast::{FilterNode, ModelFilterNode, ValueFilterNode};
pub use builder::{concat, FilterBuilder};
pub use config::{ConfigError, FilterConfig, TableMapping};
pub use error::{FilterError, PayloadError};
pub use model::{Entity, EntityDescriptor, ModelMetadata, ModelRegistry, PropertyDescriptor, PropertyKind, ValueType};
pub use parser::parse;
pub use service::FilterService;
pub use sql_compiler::{CompiledFilter, FilterCompiler, MatchMode, Predicate};
pub use token::{ModelOperator, Operator, ValueOperator};
pub use validator::Validator;
pub use value::{Culture, FilterValue, TimeZoneSetting};
pub use writer::to_json;
