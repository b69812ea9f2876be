//! Declarative mapping schema and the resolver backed by it.
//!
//! ```toml
//! [[entity]]
//! type_name = "Cook"
//! table_name = "CookTable"
//! primary_key = "ID"
//! columns = [
//!     { member = "ID", type = "Int32" },
//!     { member = "KitchenID", type = { Nullable = "Int32" } },
//! ]
//! relations = [
//!     { member = "Kitchen", target_type = "Kitchen", cardinality = "One", left_key = "KitchenID", right_key = "ID" },
//! ]
//! ```

use super::MappingResolver;
use crate::config::SqlBackendConfig;
use crate::error::{ConfigError, MappedItemKind, MappingError, MappingResult};
use crate::expr::{
    ConstantExpression, EntityKind, Expr, SqlColumnExpression, SqlEntityConstantExpression,
    SqlEntityExpression, SqlEntityRefMemberExpression,
};
use crate::identifiers::UniqueIdentifierGenerator;
use crate::statement::{
    Cardinality, ResolvedJoinInfo, ResolvedSimpleTableInfo, TableKey, UnresolvedJoinInfo,
    UnresolvedTableInfo,
};
use crate::types::DataType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::trace;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnMapping {
    pub member: String,
    /// Defaults to the member name
    #[serde(default)]
    pub column: Option<String>,
    #[serde(rename = "type")]
    pub ty: DataType,
}

impl ColumnMapping {
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.member)
    }
}

/// A navigable member. Keys are member names: `left_key` on the declaring
/// entity, `right_key` on the target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationMapping {
    pub member: String,
    pub target_type: String,
    pub cardinality: Cardinality,
    pub left_key: String,
    pub right_key: String,
}

/// Rows of a derived type sharing its base type's table are told apart by
/// the value of one column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscriminatorMapping {
    pub member: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityMapping {
    pub type_name: String,
    pub table_name: String,
    pub primary_key: String,
    #[serde(default)]
    pub columns: Vec<ColumnMapping>,
    #[serde(default)]
    pub relations: Vec<RelationMapping>,
    #[serde(default)]
    pub discriminator: Option<DiscriminatorMapping>,
}

impl EntityMapping {
    fn column_index(&self, member: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.member == member)
    }

    fn relation(&self, member: &str) -> Option<&RelationMapping> {
        self.relations.iter().find(|r| r.member == member)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MappingSchema {
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityMapping>,
}

impl MappingSchema {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

/// [`MappingResolver`] answering from a validated [`MappingSchema`].
#[derive(Debug, Clone)]
pub struct SchemaMappingResolver {
    entities: HashMap<String, EntityMapping>,
    table_alias_prefix: String,
}

impl SchemaMappingResolver {
    /// Validate `schema`; table aliases use the default `t` prefix.
    pub fn new(schema: MappingSchema) -> MappingResult<Self> {
        let mut entities = HashMap::new();
        for entity in schema.entities {
            if entities.contains_key(&entity.type_name) {
                return Err(invalid(format!("type '{}' is mapped twice", entity.type_name)));
            }
            entities.insert(entity.type_name.clone(), entity);
        }
        for entity in entities.values() {
            validate_entity(entity, &entities)?;
        }
        Ok(Self {
            entities,
            table_alias_prefix: "t".to_string(),
        })
    }

    /// Validate `schema`, taking the alias prefix from `config`.
    pub fn from_config(schema: MappingSchema, config: &SqlBackendConfig) -> MappingResult<Self> {
        Ok(Self::new(schema)?.with_alias_prefix(config.identifiers.table_alias_prefix.clone()))
    }

    pub fn with_alias_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_alias_prefix = prefix.into();
        self
    }

    fn entity(&self, ty: &DataType) -> MappingResult<&EntityMapping> {
        ty.entity_name()
            .and_then(|name| self.entities.get(name))
            .ok_or_else(|| MappingError::unmapped(MappedItemKind::Type, ty.to_string()))
    }

    fn key_column(
        &self,
        entity: &EntityMapping,
        member: &str,
        table_alias: &str,
    ) -> MappingResult<SqlColumnExpression> {
        let column = entity
            .columns
            .iter()
            .find(|c| c.member == member)
            .ok_or_else(|| member_error(entity, member))?;
        Ok(SqlColumnExpression::definition(
            column.ty.clone(),
            table_alias,
            column.column_name(),
            member == entity.primary_key,
        ))
    }
}

fn invalid(message: String) -> MappingError {
    MappingError::InvalidSchema(message)
}

fn member_error(entity: &EntityMapping, member: &str) -> MappingError {
    MappingError::unmapped(
        MappedItemKind::Member,
        format!("{}.{}", entity.type_name, member),
    )
}

fn validate_entity(
    entity: &EntityMapping,
    entities: &HashMap<String, EntityMapping>,
) -> MappingResult<()> {
    if entity.column_index(&entity.primary_key).is_none() {
        return Err(invalid(format!(
            "primary key '{}' of '{}' is not a mapped column",
            entity.primary_key, entity.type_name
        )));
    }
    for relation in &entity.relations {
        let target = entities.get(&relation.target_type).ok_or_else(|| {
            invalid(format!(
                "relation '{}.{}' targets unmapped type '{}'",
                entity.type_name, relation.member, relation.target_type
            ))
        })?;
        if entity.column_index(&relation.left_key).is_none()
            || target.column_index(&relation.right_key).is_none()
        {
            return Err(invalid(format!(
                "relation '{}.{}' uses unmapped key columns",
                entity.type_name, relation.member
            )));
        }
    }
    if let Some(discriminator) = &entity.discriminator {
        if entity.column_index(&discriminator.member).is_none() {
            return Err(invalid(format!(
                "discriminator '{}' of '{}' is not a mapped column",
                discriminator.member, entity.type_name
            )));
        }
    }
    Ok(())
}

impl MappingResolver for SchemaMappingResolver {
    fn resolve_table_info(
        &self,
        table: &UnresolvedTableInfo,
        generator: &mut UniqueIdentifierGenerator,
    ) -> MappingResult<ResolvedSimpleTableInfo> {
        let entity = self.entity(&table.item_type)?;
        let table_alias = generator.get_unique_identifier(&self.table_alias_prefix);
        trace!(table = %entity.table_name, alias = %table_alias, "resolved table");
        Ok(ResolvedSimpleTableInfo {
            item_type: table.item_type.clone(),
            table_name: entity.table_name.clone(),
            table_alias,
        })
    }

    fn resolve_join_info(
        &self,
        join: &UnresolvedJoinInfo,
        generator: &mut UniqueIdentifierGenerator,
    ) -> MappingResult<ResolvedJoinInfo> {
        let origin = join.originating_entity.ty.clone();
        let origin_mapping = self.entity(&origin)?;
        let relation = origin_mapping.relation(&join.member).ok_or_else(|| {
            MappingError::unmapped(
                MappedItemKind::Relation,
                format!("{}.{}", origin_mapping.type_name, join.member),
            )
        })?;
        let target = self.entity(&DataType::entity(relation.target_type.clone()))?;

        // The originating entity may be a reference into a sub-statement, so
        // its key column is found by position rather than by name.
        let left_index = origin_mapping
            .column_index(&relation.left_key)
            .ok_or_else(|| member_error(origin_mapping, &relation.left_key))?;
        let left_key = join
            .originating_entity
            .columns()
            .get(left_index)
            .cloned()
            .ok_or_else(|| member_error(origin_mapping, &relation.left_key))?;

        let table_alias = generator.get_unique_identifier(&self.table_alias_prefix);
        let right_key = self.key_column(target, &relation.right_key, &table_alias)?;

        Ok(ResolvedJoinInfo {
            foreign_table_info: ResolvedSimpleTableInfo {
                item_type: DataType::entity(target.type_name.clone()),
                table_name: target.table_name.clone(),
                table_alias,
            },
            left_key: Expr::SqlColumn(left_key),
            right_key: Expr::SqlColumn(right_key),
        })
    }

    fn resolve_simple_table_info(
        &self,
        table: &ResolvedSimpleTableInfo,
        key: TableKey,
    ) -> MappingResult<SqlEntityExpression> {
        let entity = self.entity(&table.item_type)?;
        let columns = entity
            .columns
            .iter()
            .map(|c| {
                SqlColumnExpression::definition(
                    c.ty.clone(),
                    table.table_alias.clone(),
                    c.column_name(),
                    c.member == entity.primary_key,
                )
            })
            .collect();
        SqlEntityExpression::new(
            table.item_type.clone(),
            key,
            table.table_alias.clone(),
            None,
            columns,
            EntityKind::Definition,
        )
        .map_err(|err| invalid(err.to_string()))
    }

    fn resolve_member_expression(
        &self,
        entity: &SqlEntityExpression,
        member: &str,
    ) -> MappingResult<Expr> {
        let mapping = self.entity(&entity.ty)?;
        if let Some(index) = mapping.column_index(member) {
            let column = entity
                .columns()
                .get(index)
                .ok_or_else(|| member_error(mapping, member))?;
            return Ok(Expr::SqlColumn(column.clone()));
        }
        if let Some(relation) = mapping.relation(member) {
            let target = DataType::entity(relation.target_type.clone());
            let ty = match relation.cardinality {
                Cardinality::One => target,
                Cardinality::Many => DataType::sequence(target),
            };
            return Ok(Expr::SqlEntityRefMember(SqlEntityRefMemberExpression {
                ty,
                entity: entity.clone(),
                member: member.to_string(),
            }));
        }
        Err(member_error(mapping, member))
    }

    fn resolve_constant_expression(&self, constant: &ConstantExpression) -> MappingResult<Expr> {
        if !constant.ty.is_entity() {
            return Ok(Expr::Constant(constant.clone()));
        }
        let mapping = self.entity(&constant.ty)?;
        let key_column = mapping
            .columns
            .iter()
            .find(|c| c.member == mapping.primary_key)
            .ok_or_else(|| member_error(mapping, &mapping.primary_key))?;
        let key_value = match &constant.value {
            Value::Null => Value::Null,
            value => value.get(&mapping.primary_key).cloned().unwrap_or(Value::Null),
        };
        Ok(Expr::SqlEntityConstant(SqlEntityConstantExpression {
            ty: constant.ty.clone(),
            value: constant.value.clone(),
            primary_key: Box::new(Expr::constant(key_value, key_column.ty.clone())),
        }))
    }

    fn resolve_type_check(&self, expression: &Expr, desired_type: &DataType) -> MappingResult<Expr> {
        if expression.ty() == *desired_type {
            return Ok(Expr::bool(true));
        }
        let desired = self.entity(desired_type)?;
        let discriminator = desired.discriminator.as_ref().ok_or_else(|| {
            MappingError::unmapped(MappedItemKind::TypeCheck, desired.type_name.clone())
        })?;
        let column = match expression.unwrap_named() {
            Expr::SqlEntity(entity) => self.resolve_member_expression(entity, &discriminator.member)?,
            _ => {
                return Err(MappingError::unmapped(
                    MappedItemKind::TypeCheck,
                    format!("{} is {}", expression.ty(), desired.type_name),
                ))
            }
        };
        Ok(Expr::equal(column, Expr::string(discriminator.value.clone())))
    }
}
