//! Facade bundling entity metadata with the engine configuration.

use crate::ast::ModelFilterNode;
use crate::builder::{self, FilterBuilder};
use crate::config::{ConfigError, FilterConfig, TableMapping};
use crate::error::FilterError;
use crate::model::{Entity, ModelMetadata};
use crate::parser;
use crate::sql_compiler::{CompiledFilter, FilterCompiler};
use crate::token::ModelOperator;
use crate::validator::Validator;
use crate::value::{Culture, TimeZoneSetting};
use crate::writer;

/// Parses, validates, compiles and combines filters for one model.
///
/// Holds no mutable state; every call works on its own tree and alias
/// registry, so a service can be shared between threads.
#[derive(Debug, Clone)]
pub struct FilterService<M> {
    metadata: M,
    config: FilterConfig,
    culture: Culture,
    zone: TimeZoneSetting,
}

impl<M: ModelMetadata> FilterService<M> {
    pub fn new(metadata: M, config: FilterConfig) -> Result<Self, ConfigError> {
        let culture = config.culture()?;
        let zone = config.zone()?;
        Ok(Self {
            metadata,
            config,
            culture,
            zone,
        })
    }

    pub fn with_defaults(metadata: M) -> Self {
        Self {
            metadata,
            config: FilterConfig::default(),
            culture: Culture::INVARIANT,
            zone: TimeZoneSetting::Local,
        }
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn table_mapping(&self) -> &TableMapping {
        &self.config.table_mapping
    }

    pub fn parse(&self, text: &str) -> Result<ModelFilterNode, FilterError> {
        parser::parse(text)
    }

    /// Parses `text` and validates the result against `entity`.
    pub fn parse_for(&self, text: &str, entity: &str) -> Result<ModelFilterNode, FilterError> {
        let node = self.parse(text)?;
        self.validate(&node, entity)?;
        Ok(node)
    }

    pub fn validate(&self, node: &ModelFilterNode, entity: &str) -> Result<(), FilterError> {
        Validator::new(&self.metadata, self.culture, self.zone).validate(node, entity)
    }

    pub fn compile(&self, node: &ModelFilterNode, entity: &str) -> Result<CompiledFilter, FilterError> {
        FilterCompiler::new(&self.metadata, self.culture, self.zone)
            .with_wildcard(self.config.like_wildcard)
            .compile(node, entity)
    }

    /// Compiles `node` and renders the select statement with the configured table names.
    pub fn to_sql(&self, node: &ModelFilterNode, entity: &str) -> Result<String, FilterError> {
        Ok(self.compile(node, entity)?.to_sql(self.table_mapping()))
    }

    pub fn concat<'a, I>(&self, trees: I, operator: ModelOperator) -> Result<ModelFilterNode, FilterError>
    where
        I: IntoIterator<Item = &'a ModelFilterNode>,
    {
        builder::concat(trees, operator)
    }

    pub fn to_json(&self, node: &ModelFilterNode) -> Result<String, FilterError> {
        writer::to_json(node)
    }

    /// Starts a typed `And` filter over `E`.
    pub fn filter<E: Entity>(&self) -> FilterBuilder<E> {
        FilterBuilder::and()
    }
}
