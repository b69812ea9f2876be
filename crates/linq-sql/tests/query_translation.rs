//! End-to-end translation of query models to SQL command text.

mod common;

use common::*;
use insta::assert_snapshot;
use linq_sql::error::MappedItemKind;
use linq_sql::expr::{BinaryOp, MethodInfo};
use linq_sql::query_model::{FromClause, QueryModel, QueryOrdering, ResultOperator, Selector, SourceId};
use linq_sql::{
    materialize_single, DataInfo, DataType, Expr, MappingError, PreparationError, ProjectionPlan,
    QueryError, ResolutionError, RowError, SchemaMappingResolver, SqlBackendConfig,
    SqlQueryGenerator,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn parameter_values(command: &linq_sql::SqlCommandData) -> Vec<Value> {
    command.parameters.iter().map(|p| p.value.clone()).collect()
}

#[test]
fn test_select_member() {
    let command = generator()
        .create_sql_query(&cooks_select("FirstName", DataType::String))
        .unwrap();
    assert_snapshot!(command.command_text, @"SELECT [t0].[FirstName] AS [value] FROM [CookTable] AS [t0]");
    assert!(command.parameters.is_empty());
    assert_eq!(
        command.projection,
        ProjectionPlan::Value {
            column: "value".into(),
            ty: DataType::String
        }
    );
}

#[test]
fn test_where_comparison_uses_parameter() {
    let model = QueryModel::from(cooks_from(0)).with_where(Expr::equal(
        cook_member(0, "Name", DataType::String),
        Expr::string("Huber"),
    ));
    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT [t0].[ID],[t0].[FirstName],[t0].[Name],[t0].[IsStarred],[t0].[Age],[t0].[KitchenID],[t0].[Kind] FROM [CookTable] AS [t0] WHERE ([t0].[Name] = @1)"
    );
    assert_eq!(parameter_values(&command), vec![json!("Huber")]);
    assert!(matches!(command.projection, ProjectionPlan::Entity { ref columns, .. } if columns.len() == 7));
}

#[test]
fn test_contains_over_empty_constant_collection() {
    let ids = QueryModel::from(FromClause::new(
        SourceId(1),
        "id",
        DataType::Int32,
        Expr::constant(json!([]), DataType::sequence(DataType::Int32)),
    ))
    .with_result_operator(ResultOperator::Contains(cook_member(0, "ID", DataType::Int32)));
    let model = QueryModel::from(cooks_from(0))
        .with_where(Expr::sub_query(ids))
        .with_select(cook_member(0, "Name", DataType::String));

    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT [t0].[Name] AS [value] FROM [CookTable] AS [t0] WHERE [t0].[ID] IN (SELECT NULL WHERE 1 = 0)"
    );
}

#[test]
fn test_contains_over_constant_collection_binds_each_item() {
    let names = QueryModel::from(FromClause::new(
        SourceId(1),
        "n",
        DataType::String,
        Expr::constant(json!(["Hugo", "Sepp"]), DataType::sequence(DataType::String)),
    ))
    .with_result_operator(ResultOperator::Contains(cook_member(0, "Name", DataType::String)));
    let model = QueryModel::from(cooks_from(0))
        .with_where(Expr::sub_query(names))
        .with_select(cook_member(0, "ID", DataType::Int32));

    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT [t0].[ID] AS [value] FROM [CookTable] AS [t0] WHERE [t0].[Name] IN (@1, @2)"
    );
    assert_eq!(parameter_values(&command), vec![json!("Hugo"), json!("Sepp")]);
}

#[test]
fn test_take_then_distinct_nests_limited_statement() {
    let model = cooks_select("Name", DataType::String)
        .with_result_operator(ResultOperator::Take(Expr::int(5)))
        .with_result_operator(ResultOperator::Distinct);
    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT DISTINCT [q0].[value] AS [value] FROM (SELECT TOP (@1) [t1].[Name] AS [value] FROM [CookTable] AS [t1]) AS [q0]"
    );
    assert_eq!(parameter_values(&command), vec![json!(5)]);
}

#[test]
fn test_distinct_then_take_stays_flat() {
    let model = cooks_select("Name", DataType::String)
        .with_result_operator(ResultOperator::Distinct)
        .with_result_operator(ResultOperator::Take(Expr::int(5)));
    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT DISTINCT TOP (@1) [t0].[Name] AS [value] FROM [CookTable] AS [t0]"
    );
}

#[test]
fn test_contains_as_value_is_wrapped_in_case() {
    let model = cooks_select("Name", DataType::String)
        .with_result_operator(ResultOperator::Contains(Expr::string("Hugo")));
    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT CASE WHEN @1 IN (SELECT [t0].[Name] FROM [CookTable] AS [t0]) THEN 1 ELSE 0 END AS [value]"
    );
    assert_eq!(command.data_info, DataInfo::scalar(DataType::Boolean));
}

#[test]
fn test_contains_as_predicate_is_inlined() {
    let names = QueryModel::from(cooks_from(1))
        .with_select(cook_member(1, "Name", DataType::String))
        .with_result_operator(ResultOperator::Contains(cook_member(0, "FirstName", DataType::String)));
    let model = QueryModel::from(cooks_from(0))
        .with_where(Expr::sub_query(names))
        .with_select(cook_member(0, "ID", DataType::Int32));

    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT [t0].[ID] AS [value] FROM [CookTable] AS [t0] WHERE [t0].[FirstName] IN (SELECT [t1].[Name] FROM [CookTable] AS [t1])"
    );
}

#[test]
fn test_any_as_value() {
    let model = cooks_select("ID", DataType::Int32).with_result_operator(ResultOperator::Any);
    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT CASE WHEN EXISTS(SELECT [t0].[ID] FROM [CookTable] AS [t0]) THEN 1 ELSE 0 END AS [value]"
    );
}

#[test]
fn test_single_over_fetches_two_rows() {
    let model = cooks_select("Name", DataType::String)
        .with_result_operator(ResultOperator::Single { or_default: false });
    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT TOP (2) [t0].[Name] AS [value] FROM [CookTable] AS [t0]"
    );
    assert!(command.parameters.is_empty());

    let row = |name: &str| -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("value".into(), json!(name));
        row
    };
    assert_eq!(
        materialize_single(vec![row("Hugo"), row("Sepp")], &command.projection, &command.data_info),
        Err(RowError::MoreThanOneElement)
    );
    assert_eq!(
        materialize_single(vec![row("Hugo")], &command.projection, &command.data_info),
        Ok(json!("Hugo"))
    );
}

#[test]
fn test_first_uses_literal_top_one() {
    let model = cooks_select("Age", DataType::Int32)
        .with_result_operator(ResultOperator::First { or_default: true });
    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT TOP (1) [t0].[Age] AS [value] FROM [CookTable] AS [t0]"
    );
    assert_eq!(
        command.data_info,
        DataInfo::SingleValue {
            ty: DataType::nullable(DataType::Int32),
            return_default_when_empty: true
        }
    );
    let empty: Vec<Map<String, Value>> = Vec::new();
    assert_eq!(
        materialize_single(empty, &command.projection, &command.data_info),
        Ok(Value::Null)
    );
}

#[test]
fn test_count_after_take_counts_limited_rows() {
    let model = cooks_select("Name", DataType::String)
        .with_result_operator(ResultOperator::Take(Expr::int(3)))
        .with_result_operator(ResultOperator::Count);
    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT COUNT(*) AS [value] FROM (SELECT TOP (@1) [t1].[Name] AS [value] FROM [CookTable] AS [t1]) AS [q0]"
    );
}

#[test]
fn test_skip_numbers_rows() {
    let model = cooks_select("Name", DataType::String)
        .with_result_operator(ResultOperator::Skip(Expr::int(5)));
    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT [q0].[Key] AS [value] FROM (SELECT [t1].[Name] AS [Key],ROW_NUMBER() OVER (ORDER BY (SELECT @1) ASC) AS [Value] FROM [CookTable] AS [t1]) AS [q0] WHERE ([q0].[Value] > @2) ORDER BY [q0].[Value] ASC"
    );
    assert_eq!(parameter_values(&command), vec![json!(1), json!(5)]);
}

#[test]
fn test_member_join_and_aliases_are_unique() {
    let kitchen_name = Expr::member(
        cook_member(0, "Kitchen", kitchen()),
        "Name",
        DataType::String,
    );
    let model = QueryModel::from(cooks_from(0))
        .with_body_clause(linq_sql::query_model::BodyClause::AdditionalFrom(kitchens_from(1)))
        .with_select(Expr::new_record(
            "Names",
            vec![
                ("Cook".into(), cook_member(0, "Name", DataType::String)),
                ("Kitchen".into(), kitchen_name),
                (
                    "Other".into(),
                    Expr::member(Expr::source(SourceId(1), kitchen()), "Name", DataType::String),
                ),
            ],
        ));

    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT [t0].[Name] AS [Cook],[t2].[Name] AS [Kitchen],[t1].[Name] AS [Other] FROM [CookTable] AS [t0] LEFT OUTER JOIN [KitchenTable] AS [t2] ON ([t0].[KitchenID] = [t2].[ID]) CROSS JOIN [KitchenTable] AS [t1]"
    );
}

#[test]
fn test_collection_member_becomes_cross_join_with_condition() {
    let orders = FromClause::new(
        SourceId(1),
        "o",
        DataType::entity("Order"),
        cook_member(0, "Orders", DataType::sequence(DataType::entity("Order"))),
    );
    let model = QueryModel::from(cooks_from(0))
        .with_body_clause(linq_sql::query_model::BodyClause::AdditionalFrom(orders))
        .with_select(Expr::member(
            Expr::source(SourceId(1), DataType::entity("Order")),
            "Amount",
            DataType::Decimal,
        ));

    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT [t1].[Amount] AS [value] FROM [CookTable] AS [t0] CROSS JOIN [OrderTable] AS [t1] WHERE ([t0].[ID] = [t1].[CookID])"
    );
}

#[test]
fn test_boolean_columns_as_predicate_and_value() {
    let starred = || cook_member(0, "IsStarred", DataType::Boolean);
    let model = QueryModel::from(cooks_from(0))
        .with_where(Expr::not(starred()))
        .with_select(Expr::new_record(
            "Flags",
            vec![
                ("Starred".into(), starred()),
                (
                    "Senior".into(),
                    Expr::binary(
                        BinaryOp::GreaterThan,
                        cook_member(0, "Age", DataType::Int32),
                        Expr::int(60),
                    ),
                ),
            ],
        ));

    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT [t0].[IsStarred] AS [Starred],CASE WHEN ([t0].[Age] > @1) THEN 1 ELSE 0 END AS [Senior] FROM [CookTable] AS [t0] WHERE NOT ([t0].[IsStarred] = 1)"
    );
}

fn cooks_where_select_id(predicate: Expr) -> QueryModel {
    QueryModel::from(cooks_from(0))
        .with_where(predicate)
        .with_select(cook_member(0, "ID", DataType::Int32))
}

fn older_than(age: i64) -> Expr {
    Expr::binary(
        BinaryOp::GreaterThan,
        cook_member(0, "Age", DataType::Int32),
        Expr::int(age),
    )
}

#[test]
fn test_boolean_conditional_as_predicate_is_compared_with_one() {
    let model = cooks_where_select_id(Expr::conditional(
        older_than(5),
        Expr::bool(true),
        Expr::bool(false),
    ));
    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT [t0].[ID] AS [value] FROM [CookTable] AS [t0] WHERE (CASE WHEN ([t0].[Age] > @1) THEN 1 ELSE 0 END = 1)"
    );
    assert_eq!(parameter_values(&command), vec![json!(5)]);
}

#[test]
fn test_negated_boolean_conditional_with_column_branch() {
    let model = cooks_where_select_id(Expr::not(Expr::conditional(
        older_than(60),
        cook_member(0, "IsStarred", DataType::Boolean),
        Expr::bool(false),
    )));
    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT [t0].[ID] AS [value] FROM [CookTable] AS [t0] WHERE NOT (CASE WHEN ([t0].[Age] > @1) THEN [t0].[IsStarred] ELSE 0 END = 1)"
    );
}

#[test]
fn test_converted_boolean_as_predicate() {
    let to_boolean = MethodInfo::static_method("Convert", "ToBoolean", [DataType::Int32], DataType::Boolean);
    let model = cooks_where_select_id(Expr::static_call(
        to_boolean,
        vec![cook_member(0, "Age", DataType::Int32)],
    ));
    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT [t0].[ID] AS [value] FROM [CookTable] AS [t0] WHERE (CONVERT(BIT, [t0].[Age]) = 1)"
    );
}

#[test]
fn test_string_contains_becomes_like() {
    let contains = MethodInfo::instance("String", "Contains", [DataType::String], DataType::Boolean);
    let model = QueryModel::from(cooks_from(0))
        .with_where(Expr::call(
            cook_member(0, "Name", DataType::String),
            contains,
            vec![Expr::string("Hu_go")],
        ))
        .with_select(cook_member(0, "ID", DataType::Int32));

    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @r"SELECT [t0].[ID] AS [value] FROM [CookTable] AS [t0] WHERE [t0].[Name] LIKE @1 ESCAPE '\'"
    );
    assert_eq!(parameter_values(&command), vec![json!(r"%Hu\_go%")]);
}

#[test]
fn test_of_type_filters_on_discriminator() {
    let chef = DataType::entity("Chef");
    let model = QueryModel::from(cooks_from(0))
        .with_result_operator(ResultOperator::OfType(chef.clone()));
    let command = generator().create_sql_query(&model).unwrap();
    assert!(command.command_text.ends_with("FROM [CookTable] AS [t0] WHERE ([t0].[Kind] = @1)"));
    assert_eq!(parameter_values(&command), vec![json!("Chef")]);
    assert_eq!(command.data_info, DataInfo::sequence(chef.clone()));
    assert!(matches!(command.projection, ProjectionPlan::Entity { ref ty, .. } if *ty == chef));
}

#[test]
fn test_group_count_is_selected_from_grouping_statement() {
    let group_type = DataType::grouping(DataType::String, cook());
    let by_name = QueryModel::from(cooks_from(1)).with_result_operator(ResultOperator::GroupBy {
        key: Selector::new(
            SourceId(2),
            Expr::member(Expr::source(SourceId(2), cook()), "Name", DataType::String),
        ),
        element: Selector::new(SourceId(3), Expr::source(SourceId(3), cook())),
    });
    let count = QueryModel::from(FromClause::new(
        SourceId(4),
        "x",
        cook(),
        Expr::source(SourceId(0), group_type.clone()),
    ))
    .with_result_operator(ResultOperator::Count);
    let model = QueryModel::from(FromClause::new(
        SourceId(0),
        "g",
        group_type.clone(),
        Expr::sub_query(by_name),
    ))
    .with_select(Expr::new_record(
        "Summary",
        vec![
            (
                "Key".into(),
                Expr::member(Expr::source(SourceId(0), group_type), "Key", DataType::String),
            ),
            ("Count".into(), Expr::sub_query(count)),
        ],
    ));

    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT [q0].[key] AS [Key],[q0].[a0] AS [Count] FROM (SELECT [t1].[Name] AS [key],COUNT(*) AS [a0] FROM [CookTable] AS [t1] GROUP BY [t1].[Name]) AS [q0]"
    );
}

#[test]
fn test_order_by_later_clause_is_primary() {
    let model = cooks_select("Name", DataType::String)
        .with_order_by(vec![QueryOrdering::asc(cook_member(0, "Name", DataType::String))])
        .with_order_by(vec![QueryOrdering::desc(cook_member(0, "Age", DataType::Int32))]);
    let command = generator().create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT [t0].[Name] AS [value] FROM [CookTable] AS [t0] ORDER BY [t0].[Age] DESC, [t0].[Name] ASC"
    );
}

#[test]
fn test_unmapped_member_aborts_compilation() {
    let err = generator()
        .create_sql_query(&cooks_select("Salary", DataType::Decimal))
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::Resolution(ResolutionError::Mapping(MappingError::unmapped(
            MappedItemKind::Member,
            "Cook.Salary"
        )))
    );
}

#[test]
fn test_unhandled_operator_is_reported() {
    let model = QueryModel::from(cooks_from(0)).with_result_operator(ResultOperator::Reverse);
    let err = generator().create_sql_query(&model).unwrap_err();
    assert_eq!(
        err,
        QueryError::Preparation(PreparationError::UnsupportedOperator {
            operator: "Reverse".into()
        })
    );
}

#[test]
fn test_compilations_are_independent() {
    let generator = generator();
    let model = cooks_select("Name", DataType::String)
        .with_result_operator(ResultOperator::Take(Expr::int(2)))
        .with_result_operator(ResultOperator::Distinct);
    let first = generator.create_sql_query(&model).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| generator.create_sql_query(&model).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), first);
        }
    });
}

#[test]
fn test_configured_prefixes_and_value_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backend.toml");
    std::fs::write(
        &path,
        "[identifiers]\ntable_alias_prefix = \"x\"\n\n[generation]\nvalue_column_name = \"val\"\n",
    )
    .unwrap();
    let config = SqlBackendConfig::from_toml_file(&path).unwrap();

    let schema = linq_sql::MappingSchema::from_toml_file(fixture_path("cooks.toml")).unwrap();
    let resolver = SchemaMappingResolver::from_config(schema, &config).unwrap();
    let generator = SqlQueryGenerator::with_config(Arc::new(resolver), config);

    let command = generator
        .create_sql_query(&cooks_select("Name", DataType::String))
        .unwrap();
    assert_snapshot!(command.command_text, @"SELECT [x0].[Name] AS [val] FROM [CookTable] AS [x0]");
}

#[test]
fn test_configured_like_escape_character() {
    let config =
        SqlBackendConfig::from_toml_str("[generation]\nlike_escape_character = \"!\"\n").unwrap();
    let generator = SqlQueryGenerator::with_config(Arc::new(cook_resolver()), config);
    let contains = MethodInfo::instance("String", "Contains", [DataType::String], DataType::Boolean);
    let model = cooks_where_select_id(Expr::call(
        cook_member(0, "Name", DataType::String),
        contains,
        vec![Expr::string("a_b!")],
    ));

    let command = generator.create_sql_query(&model).unwrap();
    assert_snapshot!(
        command.command_text,
        @"SELECT [t0].[ID] AS [value] FROM [CookTable] AS [t0] WHERE [t0].[Name] LIKE @1 ESCAPE '!'"
    );
    assert_eq!(parameter_values(&command), vec![json!("%a!_b!!%")]);
}
