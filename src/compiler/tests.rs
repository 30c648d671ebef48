// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

use super::*;
use crate::{
    entity::Entity,
    expr::{case, col, field, func, null, raw, val},
    test_support::{Article, Tag, TestDialect},
    value::ValueKind
};

fn scope() -> TableScope {
    TableScope(Article::entity_type())
}

fn predicate(expr: Expr) -> (String, Vec<(String, Value)>) {
    let scope = scope();
    let mut buf = SqlBuffer::new();
    ExpressionCompiler::new(&TestDialect, &scope)
        .predicate(&expr, &mut buf)
        .unwrap();
    let stmt = buf.build();
    (stmt.text().to_string(), stmt.bound())
}

fn value(expr: Expr) -> String {
    let scope = scope();
    let mut buf = SqlBuffer::new();
    ExpressionCompiler::new(&TestDialect, &scope)
        .value(&expr, &mut buf)
        .unwrap();
    buf.text().to_string()
}

fn predicate_error(expr: Expr) -> Error {
    let scope = scope();
    let mut buf = SqlBuffer::new();
    ExpressionCompiler::new(&TestDialect, &scope)
        .predicate(&expr, &mut buf)
        .unwrap_err()
}

#[test]
fn null_comparison_becomes_is_null() {
    assert_eq!(predicate(col("Name").eq(null())).0, "[Name] IS NULL");
    assert_eq!(predicate(col("Name").ne(null())).0, "[Name] IS NOT NULL");
    assert_eq!(predicate(null().eq(col("Name"))).0, "[Name] IS NULL");
}

#[test]
fn nested_logical_operand_is_grouped() {
    let (sql, params) = predicate(
        col("Published").or(col("ViewCount").gt(1).and(col("Title").eq("rust")))
    );
    assert_eq!(sql, "[Published]=TRUE OR ([ViewCount]>@p0 AND [Title]=@p1)");
    assert_eq!(
        params,
        vec![
            ("p0".to_string(), Value::I32(1)),
            ("p1".to_string(), Value::String("rust".into()))
        ]
    );
}

#[test]
fn flat_chain_still_groups_each_nested_level() {
    let (sql, _) = predicate(col("Id").eq(1).and(col("Id").eq(2)).and(col("Id").eq(3)));
    assert_eq!(sql, "([Id]=@p0 AND [Id]=@p1) AND [Id]=@p2");
}

#[test]
fn boolean_column_gets_explicit_truth() {
    assert_eq!(predicate(col("Published")).0, "[Published]=TRUE");
    assert_eq!(predicate(!col("Published")).0, "[Published]=FALSE");
    assert_eq!(predicate(!!col("Published")).0, "[Published]=TRUE");
}

#[test]
fn constant_predicates_fold() {
    assert_eq!(predicate(val(true)).0, "1=1");
    assert_eq!(predicate(!val(true)).0, "1=0");
}

#[test]
fn negation_toggles_flags() {
    assert_eq!(predicate(!col("Name").is_null()).0, "[Name] IS NOT NULL");
    assert_eq!(predicate(!col("Id").is_in([1, 2])).0, "[Id] NOT IN (@p0, @p1)");
    assert_eq!(
        predicate(!col("Title").starts_with("a")).0,
        "[Title] NOT LIKE @p0 ESCAPE '\\'"
    );
    assert_eq!(predicate(!col("Name").eq(null())).0, "[Name] IS NOT NULL");
    assert_eq!(
        predicate(!col("Id").gt(3).or(col("Id").lt(1))).0,
        "NOT ([Id]>@p0 OR [Id]<@p1)"
    );
}

#[test]
fn arithmetic_grouping_follows_precedence() {
    assert_eq!(value((col("ViewCount") + 1) * 2), "([ViewCount]+@p0)*@p1");
    assert_eq!(value(col("ViewCount") + 1 * 2), "[ViewCount]+@p0");
    assert_eq!(value(col("ViewCount") - (col("Id") - 1)), "[ViewCount]-([Id]-@p0)");
    assert_eq!(value((col("ViewCount") - col("Id")) - 1), "[ViewCount]-[Id]-@p0");
    assert_eq!(value(-(col("Id") + 1)), "-([Id]+@p0)");
}

#[test]
fn comparison_with_arithmetic_operand() {
    assert_eq!(
        predicate((col("ViewCount") + 1).gt(col("Id") * 2)).0,
        "[ViewCount]+@p0>[Id]*@p1"
    );
}

#[test]
fn arithmetic_is_not_a_predicate() {
    assert!(predicate_error(col("ViewCount") + 1).is_translation());
    assert!(predicate_error(val(5)).is_translation());
}

#[test]
fn like_methods_escape_wildcards() {
    let (sql, params) = predicate(col("Title").contains("50%_off"));
    assert_eq!(sql, "[Title] LIKE @p0 ESCAPE '\\'");
    assert_eq!(params[0].1, Value::String("%50\\%\\_off%".into()));

    let (_, params) = predicate(col("Title").ends_with("rs"));
    assert_eq!(params[0].1, Value::String("%rs".into()));
}

#[test]
fn like_method_needs_constant_argument() {
    assert!(
        predicate_error(col("Title").contains(col("Name")))
            .is_translation()
    );
}

#[test]
fn string_methods_map_to_functions() {
    assert_eq!(value(col("Title").to_upper()), "UPPER([Title])");
    assert_eq!(value(col("Title").trim().to_lower()), "LOWER(TRIM([Title]))");
    assert_eq!(predicate(col("Title").length().gt(3)).0, "LENGTH([Title])>@p0");
    assert_eq!(predicate(col("Title").call("Equals", vec![val("x")])).0, "[Title]=@p0");
}

#[test]
fn unknown_method_is_rejected() {
    assert!(
        predicate_error(col("Title").call("Reverse", Vec::new()))
            .is_translation()
    );
}

#[test]
fn coalesce_and_cast() {
    assert_eq!(
        predicate(col("Name").coalesce("none").eq("x")).0,
        "COALESCE([Name], @p0)=@p1"
    );
    assert_eq!(value(col("Id").cast(ValueKind::String)), "CAST([Id] AS NVARCHAR(MAX))");
}

#[test]
fn unmapped_cast_target_is_configuration_error() {
    let scope = scope();
    let mut buf = SqlBuffer::new();
    let err = ExpressionCompiler::new(&TestDialect, &scope)
        .value(&col("Id").cast(ValueKind::Uuid), &mut buf)
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn conditional_renders_case() {
    assert_eq!(
        value(case(col("Published"), 1, 0)),
        "CASE WHEN [Published]=TRUE THEN @p0 ELSE @p1 END"
    );
    assert_eq!(
        predicate(case(col("Published"), col("Published"), val(false))).0,
        "(CASE WHEN [Published]=TRUE THEN [Published] ELSE @p0 END)=TRUE"
    );
}

#[test]
fn functions_and_raw_fragments() {
    assert_eq!(value(func("ABS", vec![col("ViewCount")])), "ABS([ViewCount])");
    assert_eq!(
        predicate(raw("[Id] > 3").and(col("Published"))).0,
        "([Id] > 3) AND [Published]=TRUE"
    );
    assert!(predicate_error(func("", Vec::new())).is_argument());
}

#[test]
fn empty_in_list_is_argument_error() {
    assert!(predicate_error(col("Id").is_in(Vec::<i32>::new())).is_argument());
}

#[test]
fn unknown_and_unmapped_properties_fail() {
    assert!(predicate_error(col("Missing").eq(1)).is_translation());
    assert!(predicate_error(col("Summary").eq("x")).is_translation());
}

#[test]
fn foreign_column_outside_scope_fails() {
    assert!(predicate_error(field::<Tag>("Flag")).is_translation());
}

#[test]
fn inline_mode_escapes_literals() {
    let scope = scope();
    let mut buf = SqlBuffer::new();
    ExpressionCompiler::new(&TestDialect, &scope)
        .with_mode(ParameterMode::Inline)
        .predicate(&col("Title").eq("O'Hara").and(col("Id").gt(3)), &mut buf)
        .unwrap();
    assert_eq!(buf.text(), "[Title]='O''Hara' AND [Id]>3");
    assert!(buf.parameters().is_empty());
}

#[test]
fn negated_comparison_flips_operator() {
    assert_eq!(predicate(!col("Id").gt(3)).0, "[Id]<=@p0");
    assert_eq!(predicate(!col("Title").eq("x")).0, "[Title]<>@p0");
    assert_eq!(predicate(!(col("ViewCount") + 1).lt(col("Id"))).0, "[ViewCount]+@p0>=[Id]");
}

#[test]
fn nested_minus_never_forms_a_comment() {
    assert_eq!(value(-(-col("ViewCount"))), "-(-[ViewCount])");
    assert_eq!(value(col("ViewCount") - (-col("Id"))), "[ViewCount]-(-[Id])");
    assert_eq!(
        value(col("ViewCount") - (-col("Id") * 2)),
        "[ViewCount]-(-[Id]*@p0)"
    );
    assert_eq!(value(-col("ViewCount") - col("Id")), "-[ViewCount]-[Id]");
}

#[test]
fn inline_negative_constant_after_minus_is_grouped() {
    let scope = scope();
    let mut buf = SqlBuffer::new();
    ExpressionCompiler::new(&TestDialect, &scope)
        .with_mode(ParameterMode::Inline)
        .predicate(
            &(col("ViewCount") - val(-1)).gt(0).and(col("Id").eq(2)),
            &mut buf
        )
        .unwrap();
    assert_eq!(buf.text(), "[ViewCount]-(-1)>0 AND [Id]=2");
    assert!(!buf.text().contains("--"));
}

#[test]
fn inline_mode_rejects_non_finite_floats() {
    let scope = scope();
    let mut buf = SqlBuffer::new();
    let err = ExpressionCompiler::new(&TestDialect, &scope)
        .with_mode(ParameterMode::Inline)
        .predicate(&col("ViewCount").gt(f64::NAN), &mut buf)
        .unwrap_err();
    assert!(err.is_argument());
}

#[test]
fn user_like_pattern_carries_escape_clause() {
    let (sql, params) = predicate(col("Title").like("a\\_%"));
    assert_eq!(sql, "[Title] LIKE @p0 ESCAPE '\\'");
    assert_eq!(params[0].1, Value::String("a\\_%".into()));
}

#[test]
fn generated_names_continue_after_existing_parameters() {
    let scope = scope();
    let mut buf = SqlBuffer::new();
    buf.declare("p0").unwrap();
    ExpressionCompiler::new(&TestDialect, &scope)
        .predicate(&col("Id").eq(4), &mut buf)
        .unwrap();
    assert_eq!(buf.text(), "[Id]=@p1");
}
