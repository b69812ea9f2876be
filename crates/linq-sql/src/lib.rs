//! # linq-sql
//!
//! Translates a parsed query model (from-clauses, where-clauses, orderings,
//! a selector and result operators such as `Take`, `Count` or `Contains`)
//! into parameterised SQL Server command text.
//!
//! The pipeline has four stages, each in its own module:
//!
//! - [`preparation`]: query model to an unresolved [`SqlStatement`]
//! - [`resolution`]: tables, members and entities resolved through a
//!   [`MappingResolver`]
//! - [`boolean`]: boolean expressions converted to predicate or value form
//! - [`generation`]: command text plus positional parameters
//!
//! [`SqlQueryGenerator`] runs all four and also returns the
//! [`ProjectionPlan`] that reads result rows back.
//!
//! ```rust,ignore
//! let schema = MappingSchema::from_toml_file("mapping.toml")?;
//! let generator = SqlQueryGenerator::new(Arc::new(SchemaMappingResolver::new(schema)?));
//! let command = generator.create_sql_query(&model)?;
//! println!("{}", command.command_text);
//! ```

pub mod boolean;
pub mod config;
pub mod context;
pub mod error;
pub mod expr;
pub mod generation;
pub mod identifiers;
pub mod mapping;
pub mod preparation;
pub mod projection;
pub mod query_model;
pub mod resolution;
pub mod statement;
pub mod types;

pub use boolean::{convert_boolean_expressions, BooleanSemantics};
pub use config::SqlBackendConfig;
pub use context::CompilationContext;
pub use error::{
    BooleanSemanticsError, ConfigError, GenerationError, MappingError, PreparationError,
    QueryError, ResolutionError, RowError,
};
pub use expr::Expr;
pub use generation::{CommandParameter, SqlGenerationStage};
pub use mapping::{MappingResolver, MappingSchema, SchemaMappingResolver};
pub use preparation::SqlPreparationStage;
pub use projection::{materialize_single, DatabaseResultRow, ProjectionPlan};
pub use query_model::QueryModel;
pub use resolution::MappingResolutionStage;
pub use statement::{DataInfo, SqlStatement};
pub use types::DataType;

use generation::MethodCallSqlGeneratorRegistry;
use preparation::{MethodCallTransformerRegistry, ResultOperatorHandlerRegistry};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Everything needed to execute a compiled query and read its result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlCommandData {
    pub command_text: String,
    pub parameters: Vec<CommandParameter>,
    pub data_info: DataInfo,
    pub projection: ProjectionPlan,
}

/// Compiles query models into SQL commands.
///
/// Holds only shared, read-only state; one instance can serve concurrent
/// compilations. Every call to [`create_sql_query`](Self::create_sql_query)
/// gets its own [`CompilationContext`].
pub struct SqlQueryGenerator {
    preparation: SqlPreparationStage,
    resolution: MappingResolutionStage,
    generation: SqlGenerationStage,
    config: SqlBackendConfig,
}

impl SqlQueryGenerator {
    /// Default registries and configuration.
    pub fn new(resolver: Arc<dyn MappingResolver>) -> Self {
        Self::with_config(resolver, SqlBackendConfig::default())
    }

    pub fn with_config(resolver: Arc<dyn MappingResolver>, config: SqlBackendConfig) -> Self {
        let method_call_transformers =
            MethodCallTransformerRegistry::for_like_escape(config.generation.like_escape_character);
        Self::with_registries(
            resolver,
            config,
            method_call_transformers,
            ResultOperatorHandlerRegistry::default_registry(),
            MethodCallSqlGeneratorRegistry::default_registry(),
        )
    }

    /// Use custom registries, e.g. with additional method translations.
    pub fn with_registries(
        resolver: Arc<dyn MappingResolver>,
        config: SqlBackendConfig,
        method_call_transformers: Arc<MethodCallTransformerRegistry>,
        result_operator_handlers: Arc<ResultOperatorHandlerRegistry>,
        sql_generators: Arc<MethodCallSqlGeneratorRegistry>,
    ) -> Self {
        Self {
            preparation: SqlPreparationStage::new(
                method_call_transformers,
                result_operator_handlers,
                Arc::clone(&sql_generators),
                &config,
            ),
            resolution: MappingResolutionStage::new(resolver, &config),
            generation: SqlGenerationStage::new(sql_generators, config.generation.clone()),
            config,
        }
    }

    pub fn config(&self) -> &SqlBackendConfig {
        &self.config
    }

    /// Compile `model` to command text, parameters and a projection plan.
    #[instrument(level = "debug", skip_all)]
    pub fn create_sql_query(&self, model: &QueryModel) -> Result<SqlCommandData, QueryError> {
        let mut context = CompilationContext::new();

        let prepared = self.preparation.prepare_sql_statement(model, &mut context)?;
        let resolved = self.resolution.resolve_sql_statement(prepared, &mut context)?;
        boolean::convert_tables(&mut context.tables)?;
        let statement = boolean::convert_statement(&resolved)?;

        let command = self
            .generation
            .generate_text_for_outer_statement(&statement, &context.tables)?;
        let projection = ProjectionPlan::from_projection(
            &statement.select_projection,
            &self.config.generation.value_column_name,
        );
        debug!(
            tables = context.tables.len(),
            parameters = command.parameters.len(),
            "compiled query model"
        );

        Ok(SqlCommandData {
            command_text: command.command_text,
            parameters: command.parameters,
            data_info: statement.data_info.clone(),
            projection,
        })
    }
}
